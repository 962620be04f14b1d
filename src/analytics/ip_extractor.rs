//! Client IP extraction from HTTP headers
//!
//! The service always sits behind a trusted proxy, so the leftmost
//! `X-Forwarded-For` entry is taken as the client. Without that header the
//! socket peer address is used.

use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Client address resolved once per request by the access log middleware
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientIp(pub String);

/// Extract the client IP as a string. Returns an empty string when neither
/// a forwarded header nor a socket address is available.
pub fn extract_client_ip(headers: &HeaderMap, socket_addr: Option<SocketAddr>) -> String {
    extract_from_x_forwarded_for(headers)
        .or_else(|| socket_addr.map(|addr| addr.ip().to_string()))
        .unwrap_or_default()
}

fn extract_from_x_forwarded_for(headers: &HeaderMap) -> Option<String> {
    let xff = headers.get("x-forwarded-for")?.to_str().ok()?;
    let first = xff.split(',').next()?.trim();

    if first.is_empty() {
        None
    } else {
        Some(first.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn socket() -> Option<SocketAddr> {
        Some(SocketAddr::from(([192, 168, 1, 1], 40000)))
    }

    #[test]
    fn test_socket_address_without_headers() {
        let headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers, socket()), "192.168.1.1");
    }

    #[test]
    fn test_x_forwarded_for_takes_leftmost() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 198.51.100.1"),
        );
        assert_eq!(extract_client_ip(&headers, socket()), "203.0.113.1");
    }

    #[test]
    fn test_blank_x_forwarded_for_falls_back_to_socket() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" , 10.0.0.1"));
        assert_eq!(extract_client_ip(&headers, socket()), "192.168.1.1");
    }

    #[test]
    fn test_empty_when_nothing_known() {
        assert_eq!(extract_client_ip(&HeaderMap::new(), None), "");
    }
}
