use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use std::net::SocketAddr;
use std::time::Instant;

use super::{AccessEntry, RequestLogger};
use crate::analytics::extract_client_ip;
use crate::analytics::ip_extractor::ClientIp;
use crate::models::iso8601;

/// Write one access entry per request once the response is produced.
///
/// Also resolves the client IP once and stores it as a `ClientIp`
/// extension for handlers further down.
pub async fn log_requests(
    State(logger): State<RequestLogger>,
    mut request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();

    let socket_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = extract_client_ip(request.headers(), socket_addr);

    let method = request.method().to_string();
    let url = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    request.extensions_mut().insert(ClientIp(ip.clone()));

    let response = next.run(request).await;

    logger.access(&AccessEntry {
        timestamp: iso8601(Utc::now()),
        method,
        url,
        status: response.status().as_u16(),
        response_time_ms: start.elapsed().as_millis() as u64,
        ip,
    });

    response
}
