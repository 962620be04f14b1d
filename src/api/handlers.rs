use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

use super::shortcode::{allocate_generated_code, generate_short_code, is_valid_custom_code};
use crate::app::AppState;
use crate::error::ApiError;
use crate::models::{
    iso8601, AnalyticsResponse, CreateShortUrlRequest, CreateShortUrlResponse, NewShortUrl,
};
use crate::storage::StorageError;

/// Validity used when the request gives none or an unusable one
pub const DEFAULT_VALIDITY_MINUTES: i64 = 30;

const GENERATION_EXHAUSTED: &str = "Failed to generate unique shortcode, try again";

/// Create a new short URL
pub async fn create_short_url(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateShortUrlResponse>), ApiError> {
    let payload = parse_create_request(&body)?;

    let original_url = payload
        .url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ApiError::invalid_input("url is required"))?;

    if Url::parse(&original_url).is_err() {
        return Err(ApiError::invalid_input("Invalid URL format"));
    }

    let custom_code = payload.shortcode.filter(|code| !code.is_empty());

    if let Some(code) = custom_code.as_deref() {
        if !is_valid_custom_code(code) {
            return Err(ApiError::invalid_input("shortcode must be alphanumeric"));
        }
    }

    let short_id = match custom_code.as_deref() {
        Some(code) => {
            if state.storage.exists(code).await? {
                return Err(ApiError::Conflict("Shortcode already in use".to_string()));
            }
            code.to_string()
        }
        None => allocate_generated_code(state.storage.as_ref(), generate_short_code)
            .await?
            .ok_or_else(|| ApiError::ServerError(GENERATION_EXHAUSTED.to_string()))?,
    };

    let created_at = Utc::now();
    let minutes = validity_minutes(payload.validity.as_ref());
    let expires_at = expiry_after(created_at, minutes);

    let record = state
        .storage
        .create(&NewShortUrl {
            short_id,
            original_url,
            created_at,
            expires_at,
        })
        .await
        .map_err(|err| match err {
            StorageError::Conflict if custom_code.is_some() => {
                ApiError::Conflict("Shortcode already in use".to_string())
            }
            StorageError::Conflict => ApiError::ServerError(GENERATION_EXHAUSTED.to_string()),
            StorageError::Other(err) => ApiError::Internal(err),
        })?;

    tracing::info!(
        short_id = %record.short_id,
        expires_at = %iso8601(record.expires_at),
        "created short url"
    );

    let origin = request_origin(&headers, &state.public_host);

    Ok((
        StatusCode::CREATED,
        Json(CreateShortUrlResponse {
            short_link: format!("{}/{}", origin, record.short_id),
            expiry: iso8601(record.expires_at),
        }),
    ))
}

/// Click analytics for one short code. Expired records are still reported.
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    Path(shortcode): Path<String>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    let record = state
        .storage
        .get(&shortcode)
        .await?
        .ok_or_else(|| ApiError::not_found("Shortcode not found"))?;

    Ok(Json(AnalyticsResponse::from(&record)))
}

/// `GET /shorturls` is reserved for the API and never treated as a short code
pub async fn reserved_prefix() -> ApiError {
    ApiError::not_found("Not found")
}

/// An empty body counts as `{}`
fn parse_create_request(body: &[u8]) -> Result<CreateShortUrlRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CreateShortUrlRequest::default());
    }

    serde_json::from_slice(body)
        .map_err(|err| ApiError::invalid_input(format!("Invalid JSON body: {err}")))
}

/// Positive integer minutes, or `DEFAULT_VALIDITY_MINUTES` for anything else.
/// Integral floats such as `15.0` count as integers.
pub fn validity_minutes(validity: Option<&Value>) -> i64 {
    let minutes = match validity {
        Some(Value::Number(number)) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Some(Value::String(text)) => text.trim().parse::<i64>().ok(),
        _ => None,
    };

    minutes
        .filter(|minutes| *minutes > 0)
        .unwrap_or(DEFAULT_VALIDITY_MINUTES)
}

/// `created_at + minutes`, falling back to the default on overflow
pub fn expiry_after(created_at: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    Duration::try_minutes(minutes)
        .and_then(|validity| created_at.checked_add_signed(validity))
        .unwrap_or_else(|| created_at + Duration::minutes(DEFAULT_VALIDITY_MINUTES))
}

/// `scheme://host` as seen by the client, honouring proxy headers
fn request_origin(headers: &HeaderMap, fallback_host: &str) -> String {
    let scheme = first_header_value(headers, "x-forwarded-proto").unwrap_or("http");
    let host = first_header_value(headers, "x-forwarded-host")
        .or_else(|| first_header_value(headers, header::HOST.as_str()))
        .unwrap_or(fallback_host);

    format!("{scheme}://{host}")
}

fn first_header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
