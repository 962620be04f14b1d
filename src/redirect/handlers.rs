use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use chrono::Utc;
use std::sync::Arc;
use url::Url;

use crate::analytics::ip_extractor::ClientIp;
use crate::app::AppState;
use crate::error::ApiError;
use crate::models::{ClickEvent, DIRECT_REFERRER};

/// Record a click and redirect to the original URL.
///
/// The click is written before the redirect is sent, so a client that
/// followed the link is always counted.
pub async fn redirect_url(
    State(state): State<Arc<AppState>>,
    Path(short_id): Path<String>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let record = state
        .storage
        .get(&short_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Short URL not found"))?;

    let now = Utc::now();
    if record.is_expired_at(now) {
        return Err(ApiError::Gone("Short URL expired".to_string()));
    }

    let location = location_header(&record.original_url)?;

    let click = ClickEvent {
        timestamp: now,
        referrer: referrer(&headers),
        country: state.geoip.country_for(&ip),
        ip,
    };

    if !state.storage.append_click(&short_id, &click).await? {
        return Err(ApiError::not_found("Short URL not found"));
    }

    tracing::debug!(
        short_id = %short_id,
        country = %click.country,
        referrer = %click.referrer,
        "recorded click"
    );

    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

/// `Referer`, then `Referrer`, else "direct"
fn referrer(headers: &HeaderMap) -> String {
    [header::REFERER.as_str(), "referrer"]
        .into_iter()
        .filter_map(|name| headers.get(name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or(DIRECT_REFERRER)
        .to_string()
}

/// Stored URLs may hold non-ASCII text; fall back to the serialized form.
fn location_header(original_url: &str) -> Result<HeaderValue, ApiError> {
    if original_url.is_ascii() {
        if let Ok(value) = HeaderValue::from_str(original_url) {
            return Ok(value);
        }
    }

    let parsed = Url::parse(original_url)
        .map_err(|err| anyhow::anyhow!("stored url {original_url:?} no longer parses: {err}"))?;
    HeaderValue::from_str(parsed.as_str())
        .map_err(|err| ApiError::Internal(anyhow::anyhow!("invalid location header: {err}")))
}
