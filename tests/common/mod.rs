#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use chrono::{Duration, Utc};
use ferret::analytics::GeoIpService;
use ferret::logging::RequestLogger;
use ferret::models::NewShortUrl;
use ferret::storage::{SqliteStorage, Storage};
use ferret::{create_router, AppState};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Helper to create test storage
pub async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 5).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

/// Full router over `storage`, logging into `log_dir`, without GeoIP data
pub fn create_test_app(storage: Arc<dyn Storage>, log_dir: &Path) -> Router {
    create_router(AppState {
        storage,
        geoip: Arc::new(GeoIpService::disabled()),
        logger: RequestLogger::new(log_dir).unwrap(),
        public_host: "localhost:5000".to_string(),
    })
}

pub fn new_short_url(short_id: &str, original_url: &str, valid_for: Duration) -> NewShortUrl {
    let created_at = Utc::now();
    NewShortUrl {
        short_id: short_id.to_string(),
        original_url: original_url.to_string(),
        created_at,
        expires_at: created_at + valid_for,
    }
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::HOST, "sho.rt")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn read_log(dir: &Path, file: &str) -> Vec<Value> {
    std::fs::read_to_string(dir.join(file))
        .unwrap_or_default()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}
