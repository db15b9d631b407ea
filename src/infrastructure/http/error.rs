//! HTTP Error Handling
//!
//! 业务错误一律以 HTTP 200 + errno 返回

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::application::ApplicationError;

/// 统一错误响应格式
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errno: i32,
    pub error: String,
    pub data: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(errno: i32, error: impl Into<String>) -> Self {
        Self {
            errno,
            error: error.into(),
            data: None,
        }
    }

    fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// 错误码定义
pub mod errno {
    pub const BAD_REQUEST: i32 = 400;
    pub const INSUFFICIENT_CREDITS: i32 = 402;
    pub const FORBIDDEN: i32 = 403;
    pub const NOT_FOUND: i32 = 404;
    pub const CONFLICT: i32 = 409;
    pub const NOT_READY: i32 = 422;
    pub const INTERNAL_ERROR: i32 = 500;
    pub const UPSTREAM_ERROR: i32 = 502;
    pub const SERVICE_UNAVAILABLE: i32 = 503;
}

/// API 错误
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    InsufficientCredits { required: u32, available: u32 },
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    NotReady(Vec<String>),
    Internal(String),
    Upstream(String),
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn errno(&self) -> i32 {
        match self {
            ApiError::BadRequest(_) => errno::BAD_REQUEST,
            ApiError::InsufficientCredits { .. } => errno::INSUFFICIENT_CREDITS,
            ApiError::Forbidden(_) => errno::FORBIDDEN,
            ApiError::NotFound(_) => errno::NOT_FOUND,
            ApiError::Conflict(_) => errno::CONFLICT,
            ApiError::NotReady(_) => errno::NOT_READY,
            ApiError::Internal(_) => errno::INTERNAL_ERROR,
            ApiError::Upstream(_) => errno::UPSTREAM_ERROR,
            ApiError::ServiceUnavailable(_) => errno::SERVICE_UNAVAILABLE,
        }
    }

    fn to_body(&self) -> ErrorResponse {
        let errno = self.errno();
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::Internal(msg)
            | ApiError::Upstream(msg)
            | ApiError::ServiceUnavailable(msg) => ErrorResponse::new(errno, msg.clone()),
            ApiError::InsufficientCredits {
                required,
                available,
            } => ErrorResponse::new(
                errno,
                format!("Insufficient credits: required {}, available {}", required, available),
            )
            .with_data(serde_json::json!({ "required": required, "available": available })),
            ApiError::NotReady(issues) => {
                ErrorResponse::new(errno, "Book is not ready to publish")
                    .with_data(serde_json::json!({ "issues": issues }))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = self.to_body();
        if body.errno >= errno::INTERNAL_ERROR {
            tracing::error!(errno = body.errno, error = %body.error, "Request failed");
        } else {
            tracing::warn!(errno = body.errno, error = %body.error, "Request rejected");
        }

        (StatusCode::OK, Json(body)).into_response()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(e: ApplicationError) -> Self {
        match e {
            ApplicationError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            ApplicationError::Validation(msg) => ApiError::BadRequest(msg),
            ApplicationError::Conflict(msg) | ApplicationError::InvalidTransition(msg) => {
                ApiError::Conflict(msg)
            }
            ApplicationError::InsufficientCredits {
                required,
                available,
            } => ApiError::InsufficientCredits {
                required,
                available,
            },
            ApplicationError::UpstreamGeneration(msg) => ApiError::Upstream(msg),
            ApplicationError::NotReady { issues } => ApiError::NotReady(issues),
            ApplicationError::Forbidden(msg) => ApiError::Forbidden(msg),
            ApplicationError::Repository(msg) => ApiError::ServiceUnavailable(msg),
            ApplicationError::Storage(msg) | ApplicationError::Internal(msg) => {
                ApiError::Internal(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_errors_map_to_errno() {
        let cases = [
            (ApplicationError::validation("bad"), errno::BAD_REQUEST),
            (
                ApplicationError::InsufficientCredits {
                    required: 1,
                    available: 0,
                },
                errno::INSUFFICIENT_CREDITS,
            ),
            (ApplicationError::forbidden("nope"), errno::FORBIDDEN),
            (ApplicationError::not_found("Book", "x"), errno::NOT_FOUND),
            (ApplicationError::conflict("busy"), errno::CONFLICT),
            (ApplicationError::invalid_transition("complete -> pending"), errno::CONFLICT),
            (ApplicationError::UpstreamGeneration("timeout".into()), errno::UPSTREAM_ERROR),
            (ApplicationError::Repository("locked".into()), errno::SERVICE_UNAVAILABLE),
            (ApplicationError::internal("boom"), errno::INTERNAL_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).errno(), expected);
        }
    }

    #[test]
    fn test_not_ready_carries_issues() {
        let err = ApiError::from(ApplicationError::NotReady {
            issues: vec!["Chapter 2 has no text".into()],
        });
        let body = serde_json::to_value(err.to_body()).unwrap();
        assert_eq!(body["errno"], 422);
        assert_eq!(body["data"]["issues"][0], "Chapter 2 has no text");
    }
}
