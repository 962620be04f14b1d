use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers::{create_short_url, get_analytics, reserved_prefix};
use crate::app::AppState;

/// Path segment owned by the API; the redirect route never sees it.
pub const API_PREFIX: &str = "shorturls";

pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("/{API_PREFIX}"),
            post(create_short_url).get(reserved_prefix),
        )
        .route(&format!("/{API_PREFIX}/{{shortcode}}"), get(get_analytics))
}
