use crate::environment::EnvironmentError;
use crate::executor::ExecutorError;
use crate::runtime::RuntimeError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: ErrorPayload<'a>,
}

#[derive(Debug, Serialize)]
struct ErrorPayload<'a> {
    code: &'a str,
    message: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    pub fn invalid_json(rejection: &JsonRejection) -> Self {
        Self::bad_request("invalid_json", rejection.body_text())
    }
}

impl From<ExecutorError> for ApiError {
    fn from(err: ExecutorError) -> Self {
        let message = err.to_string();
        if err.is_validation() {
            return Self::bad_request("validation_error", message);
        }
        if err.is_not_found() {
            return Self::new(StatusCode::NOT_FOUND, "not_found", message);
        }
        match err {
            ExecutorError::Environment(EnvironmentError::RunFileMissing { .. }) => {
                Self::new(StatusCode::NOT_FOUND, "not_found", message)
            }
            ExecutorError::Environment(EnvironmentError::InvalidFigureName { .. }) => {
                Self::bad_request("validation_error", message)
            }
            _ => Self::internal(message),
        }
    }
}

impl From<RuntimeError> for ApiError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Executor(err) => err.into(),
            RuntimeError::Environment(err) => ExecutorError::Environment(err).into(),
            other => Self::internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorPayload {
                code: self.code,
                message: &self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}
