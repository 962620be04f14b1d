use axum::{routing::get, Router};
use std::sync::Arc;

use super::handlers::redirect_url;
use crate::app::AppState;

pub fn create_redirect_router() -> Router<Arc<AppState>> {
    Router::new().route("/{short_id}", get(redirect_url))
}
