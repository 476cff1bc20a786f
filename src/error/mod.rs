use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::resolver::deadline::DeadlineExceeded;
use crate::resolver::guard::is_blocked_address;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message): (StatusCode, String) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal => {
                tracing::error!("Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Why a resolution produced no usable document.
///
/// Per-attempt failures are folded into one of these by the fetch strategy;
/// only the final classification reaches the request handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    #[error("Timed out fetching URL")]
    Timeout,

    #[error("Failed to fetch URL: {0}")]
    Network(String),

    #[error("Upstream blocked the request (HTTP {0})")]
    Blocked(u16),

    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Upstream returned an empty body")]
    EmptyBody,

    #[error("Upstream responded with HTTP {0}")]
    UpstreamStatus(u16),

    #[error("URL resolves to a private or reserved address")]
    PrivateAddress,
}

impl FetchFailure {
    /// Transport failures are non-2xx; content-shape degradations stay 200 so
    /// the caller still renders the domain fallback.
    pub fn status_code(&self) -> StatusCode {
        match self {
            FetchFailure::Timeout => StatusCode::GATEWAY_TIMEOUT,
            FetchFailure::Network(_) => StatusCode::BAD_GATEWAY,
            FetchFailure::UpstreamStatus(code) if *code >= 500 => StatusCode::BAD_GATEWAY,
            FetchFailure::PrivateAddress => StatusCode::BAD_REQUEST,
            FetchFailure::Blocked(_)
            | FetchFailure::UnsupportedContentType(_)
            | FetchFailure::EmptyBody
            | FetchFailure::UpstreamStatus(_) => StatusCode::OK,
        }
    }

    /// The `error` string placed beside fallback fields, if any. Non-HTML
    /// targets are an expected outcome and carry none.
    pub fn client_message(&self) -> Option<String> {
        match self {
            FetchFailure::UnsupportedContentType(_) => None,
            other => Some(other.to_string()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FetchFailure::Timeout => "timeout",
            FetchFailure::Network(_) => "network",
            FetchFailure::Blocked(_) => "blocked",
            FetchFailure::UnsupportedContentType(_) => "unsupported-content-type",
            FetchFailure::EmptyBody => "empty-body",
            FetchFailure::UpstreamStatus(_) => "upstream-status",
            FetchFailure::PrivateAddress => "private-address",
        }
    }
}

impl From<DeadlineExceeded> for FetchFailure {
    fn from(_: DeadlineExceeded) -> Self {
        FetchFailure::Timeout
    }
}

impl From<reqwest::Error> for FetchFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchFailure::Timeout
        } else if is_blocked_address(&e) {
            FetchFailure::PrivateAddress
        } else {
            FetchFailure::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;

    async fn body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_error_returns_400() {
        let response = AppError::Validation("invalid input".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn internal_error_returns_500() {
        let response = AppError::Internal.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn validation_error_body_has_error_key() {
        let response = AppError::Validation("invalid input".into()).into_response();
        let json = body_json(response.into_body()).await;
        assert_eq!(json["error"], "invalid input");
    }

    #[test]
    fn transport_failures_are_non_2xx() {
        assert_eq!(FetchFailure::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            FetchFailure::Network("dns".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            FetchFailure::UpstreamStatus(503).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn content_shape_failures_stay_200() {
        assert_eq!(FetchFailure::Blocked(403).status_code(), StatusCode::OK);
        assert_eq!(FetchFailure::EmptyBody.status_code(), StatusCode::OK);
        assert_eq!(FetchFailure::UpstreamStatus(404).status_code(), StatusCode::OK);
        assert_eq!(
            FetchFailure::UnsupportedContentType("application/pdf".into()).status_code(),
            StatusCode::OK
        );
    }

    #[test]
    fn non_html_carries_no_error_message() {
        assert_eq!(
            FetchFailure::UnsupportedContentType("image/png".into()).client_message(),
            None
        );
        assert_eq!(
            FetchFailure::Blocked(429).client_message().as_deref(),
            Some("Upstream blocked the request (HTTP 429)")
        );
    }

    #[test]
    fn private_address_is_a_bad_request() {
        assert_eq!(
            FetchFailure::PrivateAddress.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(FetchFailure::PrivateAddress.kind(), "private-address");
    }

    #[test]
    fn deadline_maps_to_timeout() {
        assert_eq!(FetchFailure::from(DeadlineExceeded), FetchFailure::Timeout);
    }
}
