use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

pub type DataResult<T> = Result<T, DataError>;
pub type AppResult<T> = Result<T, AppError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Auth,
    Validation,
    NotFound,
    Conflict,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Auth => "auth",
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    pub fn extend_prefixed(&mut self, prefix: &str, other: ValidationErrors) {
        self.errors
            .extend(other.errors.into_iter().map(|error| FieldError {
                field: format!("{prefix}.{}", error.field),
                message: error.message,
            }));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn fields(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|error| error.field == field)
    }

    pub fn into_result(self) -> DataResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DataError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|error| format!("{}: {}", error.field, error.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

#[derive(Clone, Debug, Error)]
pub enum DataError {
    #[error("network error: {0}")]
    Network(String),
    #[error("access denied: {0}")]
    Auth(String),
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("unexpected backend error: {0}")]
    Unknown(String),
}

impl DataError {
    pub fn not_found(model: &str, id: &str) -> Self {
        DataError::NotFound(format!("{model} {id}"))
    }

    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        DataError::Validation(ValidationErrors::single(field, message))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DataError::Network(_) => ErrorKind::Network,
            DataError::Auth(_) => ErrorKind::Auth,
            DataError::Validation(_) => ErrorKind::Validation,
            DataError::NotFound(_) => ErrorKind::NotFound,
            DataError::Conflict(_) => ErrorKind::Conflict,
            DataError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Only network-class failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, DataError::Network(_))
    }
}

impl From<serde_json::Error> for DataError {
    fn from(value: serde_json::Error) -> Self {
        DataError::Unknown(format!("malformed backend payload: {value}"))
    }
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    fields: Vec<FieldError>,
    retryable: bool,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            fields: Vec::new(),
            retryable: false,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized")
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "resource not found")
    }

    pub fn internal<E: fmt::Display>(error: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            fields: self.fields,
            retryable: self.retryable,
        });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldError>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    retryable: bool,
}

impl From<DataError> for AppError {
    fn from(value: DataError) -> Self {
        match value {
            DataError::Validation(errors) => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: "validation failed".to_string(),
                fields: errors.fields().to_vec(),
                retryable: false,
            },
            DataError::Network(message) => {
                tracing::warn!(error = %message, "backend unavailable");
                Self {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    message: "backend temporarily unavailable, please retry".to_string(),
                    fields: Vec::new(),
                    retryable: true,
                }
            }
            DataError::Auth(_) => Self::new(StatusCode::FORBIDDEN, "access denied"),
            DataError::NotFound(_) => AppError::not_found(),
            DataError::Conflict(message) => Self::new(StatusCode::CONFLICT, message),
            DataError::Unknown(message) => {
                tracing::error!(error = %message, "unexpected backend error");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "unexpected error")
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        AppError::bad_request(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_render_field_list() {
        let mut errors = ValidationErrors::new();
        errors.add("email", "is required");
        errors.add("phone", "has an invalid format");
        assert_eq!(
            errors.to_string(),
            "email: is required; phone: has an invalid format"
        );
        assert!(errors.has_field("phone"));
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn only_network_errors_are_transient() {
        assert!(DataError::Network("timeout".into()).is_transient());
        assert!(!DataError::Auth("denied".into()).is_transient());
        assert!(!DataError::invalid("email", "bad").is_transient());
        assert!(!DataError::Unknown("boom".into()).is_transient());
    }

    #[test]
    fn maps_data_errors_to_http_statuses() {
        let cases = [
            (DataError::invalid("email", "bad"), StatusCode::UNPROCESSABLE_ENTITY),
            (DataError::Network("down".into()), StatusCode::SERVICE_UNAVAILABLE),
            (DataError::Auth("nope".into()), StatusCode::FORBIDDEN),
            (DataError::not_found("Requests", "r1"), StatusCode::NOT_FOUND),
            (DataError::Conflict("race".into()), StatusCode::CONFLICT),
            (DataError::Unknown("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(AppError::from(error).status(), status);
        }
    }
}
