use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::{ErrorEntry, RequestLogger};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Gone(String),
    #[error("{0}")]
    ServerError(String),
    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Gone(_) => StatusCode::GONE,
            ApiError::ServerError(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// What a failed handler hands to `handle_errors`, carried as a response
/// extension so the error middleware is the only place that renders bodies.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub message: String,
    pub detail: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = match &self {
            ApiError::Internal(err) => Some(format!("{err:?}")),
            _ => None,
        };

        let mut response = self.status().into_response();
        response.extensions_mut().insert(ErrorReport {
            message: self.to_string(),
            detail,
        });
        response
    }
}

/// Framework rejections (bad path encoding, 405) carry plain text bodies
/// at most this large.
const REJECTION_BODY_LIMIT: usize = 64 * 1024;

/// Terminal error handler: logs every `ErrorReport` to the error log and
/// replaces the response body with `{ "error": message }`. Error responses
/// produced by axum itself (extractor rejections, method not allowed) get
/// the same treatment, using their text body as the message.
pub async fn handle_errors(
    State(logger): State<RequestLogger>,
    request: Request,
    next: Next,
) -> Response {
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;

    let status = response.status();
    let report = match response.extensions().get::<ErrorReport>().cloned() {
        Some(report) => report,
        None if status.is_client_error() || status.is_server_error() => {
            rejection_report(response).await
        }
        None => return response,
    };

    if status.is_server_error() {
        tracing::error!(
            path = %path,
            status = status.as_u16(),
            detail = report.detail.as_deref().unwrap_or(""),
            "{}",
            report.message
        );
    } else {
        tracing::debug!(path = %path, status = status.as_u16(), "{}", report.message);
    }

    logger.request_error(&ErrorEntry::new(
        report.message.clone(),
        report.detail,
        path,
    ));

    (
        status,
        Json(ErrorResponse {
            error: report.message,
        }),
    )
        .into_response()
}

async fn rejection_report(response: Response) -> ErrorReport {
    let status = response.status();
    let fallback = status.canonical_reason().unwrap_or("Error").to_string();

    let message = match to_bytes(response.into_body(), REJECTION_BODY_LIMIT).await {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes).trim().to_string();
            if text.is_empty() {
                fallback
            } else {
                text
            }
        }
        Err(_) => fallback,
    };

    ErrorReport {
        message,
        detail: None,
    }
}
