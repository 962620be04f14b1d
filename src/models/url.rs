use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Referrer recorded when the request carries no `Referer` header.
pub const DIRECT_REFERRER: &str = "direct";

/// Country recorded when geolocation has no answer.
pub const UNKNOWN_COUNTRY: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortUrlRecord {
    pub short_id: String,
    pub original_url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Chronological, append-only
    pub clicks: Vec<ClickEvent>,
}

impl ShortUrlRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub timestamp: DateTime<Utc>,
    pub referrer: String,
    pub ip: String,
    pub country: String,
}

/// Values needed to insert a fresh record.
#[derive(Debug, Clone)]
pub struct NewShortUrl {
    pub short_id: String,
    pub original_url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Body of `POST /shorturls`. `validity` stays untyped because anything
/// that is not a positive integer falls back to the default instead of
/// being rejected.
#[derive(Debug, Default, Deserialize)]
pub struct CreateShortUrlRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub validity: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub shortcode: Option<String>,
}

/// Accepts `"abc123"` as well as a bare JSON number such as `123`, which
/// becomes its decimal text and goes through the same code validation.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Shortcode {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Shortcode>::deserialize(deserializer)?.map(|code| match code {
        Shortcode::Text(text) => text,
        Shortcode::Number(number) => number.to_string(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShortUrlResponse {
    pub short_link: String,
    pub expiry: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    pub original_url: String,
    pub created_at: String,
    pub expiry: String,
    pub total_clicks: usize,
    pub clicks: Vec<ClickSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClickSummary {
    pub timestamp: String,
    pub referrer: String,
    pub country: String,
}

impl From<&ShortUrlRecord> for AnalyticsResponse {
    fn from(record: &ShortUrlRecord) -> Self {
        let clicks: Vec<ClickSummary> = record
            .clicks
            .iter()
            .map(|click| ClickSummary {
                timestamp: iso8601(click.timestamp),
                referrer: non_empty_or(&click.referrer, DIRECT_REFERRER),
                country: non_empty_or(&click.country, UNKNOWN_COUNTRY),
            })
            .collect();

        Self {
            original_url: record.original_url.clone(),
            created_at: iso8601(record.created_at),
            expiry: iso8601(record.expires_at),
            total_clicks: clicks.len(),
            clicks,
        }
    }
}

/// Format as `2024-01-01T00:30:00.000Z`.
pub fn iso8601(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record_with_clicks(clicks: Vec<ClickEvent>) -> ShortUrlRecord {
        let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ShortUrlRecord {
            short_id: "abc123".to_string(),
            original_url: "https://example.com".to_string(),
            created_at,
            expires_at: created_at + Duration::minutes(30),
            clicks,
        }
    }

    #[test]
    fn test_iso8601_uses_millis_and_z() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 30, 0).unwrap();
        assert_eq!(iso8601(at), "2024-01-01T00:30:00.000Z");
    }

    #[test]
    fn test_expiry_is_strictly_after() {
        let record = record_with_clicks(vec![]);
        assert!(!record.is_expired_at(record.expires_at));
        assert!(record.is_expired_at(record.expires_at + Duration::milliseconds(1)));
    }

    #[test]
    fn test_analytics_defaults_blank_click_fields() {
        let record = record_with_clicks(vec![ClickEvent {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap(),
            referrer: String::new(),
            ip: "203.0.113.9".to_string(),
            country: " ".to_string(),
        }]);

        let response = AnalyticsResponse::from(&record);
        assert_eq!(response.total_clicks, 1);
        assert_eq!(response.clicks[0].referrer, DIRECT_REFERRER);
        assert_eq!(response.clicks[0].country, UNKNOWN_COUNTRY);
        assert_eq!(response.expiry, "2024-01-01T00:30:00.000Z");
    }

    #[test]
    fn test_analytics_response_is_camel_case_without_ip() {
        let record = record_with_clicks(vec![]);
        let json = serde_json::to_value(AnalyticsResponse::from(&record)).unwrap();
        assert!(json.get("originalUrl").is_some());
        assert!(json.get("totalClicks").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(!json.to_string().contains("\"ip\""));
    }

    #[test]
    fn test_create_request_shortcode_accepts_numbers() {
        let request: CreateShortUrlRequest =
            serde_json::from_str(r#"{"url":"https://example.com","shortcode":123}"#).unwrap();
        assert_eq!(request.shortcode.as_deref(), Some("123"));

        let request: CreateShortUrlRequest =
            serde_json::from_str(r#"{"url":"https://example.com","shortcode":null}"#).unwrap();
        assert!(request.shortcode.is_none());

        assert!(serde_json::from_str::<CreateShortUrlRequest>(r#"{"shortcode":true}"#).is_err());
    }
}
