use axum::{middleware, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::analytics::GeoIpService;
use crate::error::{handle_errors, ApiError};
use crate::logging::{log_requests, RequestLogger};
use crate::storage::Storage;
use crate::{api, redirect};

/// Dependencies shared by every handler
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub geoip: Arc<GeoIpService>,
    pub logger: RequestLogger,
    /// Host used for short links when the request carries no `Host` header
    pub public_host: String,
}

/// Build the full service: API and redirect routes behind the error
/// handler and access log middleware.
pub fn create_router(state: AppState) -> Router {
    let logger = state.logger.clone();

    Router::new()
        .merge(api::create_api_router())
        .merge(redirect::create_redirect_router())
        .fallback(not_found)
        .with_state(Arc::new(state))
        .layer(middleware::from_fn_with_state(logger.clone(), handle_errors))
        .layer(middleware::from_fn_with_state(logger, log_requests))
        .layer(TraceLayer::new_for_http())
}

async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}
