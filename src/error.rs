use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::env;
use std::fmt::{self, Debug, Display};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidTransition,
    Forbidden,
    Validation,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self.code {
            100 => ErrorKind::InvalidTransition,
            101 => ErrorKind::Validation,
            102 => ErrorKind::NotFound,
            103 => ErrorKind::Forbidden,
            _ => ErrorKind::Internal,
        }
    }

    pub fn is_not_found_error(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_invalid_transition_error(&self) -> bool {
        self.kind() == ErrorKind::InvalidTransition
    }

    pub fn is_forbidden_error(&self) -> bool {
        self.kind() == ErrorKind::Forbidden
    }

    pub fn is_validation_error(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for Error {}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        env_var_error(err)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        database_error(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        storage_error(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        serialization_error(err)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_message) = match self.kind() {
            ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, self.message.as_str()),
            ErrorKind::Forbidden => (StatusCode::FORBIDDEN, self.message.as_str()),
            ErrorKind::InvalidTransition => (StatusCode::CONFLICT, self.message.as_str()),
            ErrorKind::Validation => (StatusCode::BAD_REQUEST, self.message.as_str()),
        };

        let body = Json(json!({
            "code": self.code,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub fn invalid_transition_error() -> Error {
    Error {
        code: 100,
        message: "invalid transition".into(),
    }
}

pub fn validation_error(reason: impl Into<String>) -> Error {
    Error {
        code: 101,
        message: format!("validation error: {}", reason.into()),
    }
}

pub fn not_found_error() -> Error {
    Error {
        code: 102,
        message: "ride not found".into(),
    }
}

pub fn forbidden_error() -> Error {
    Error {
        code: 103,
        message: "forbidden".into(),
    }
}

pub fn env_var_error(_: env::VarError) -> Error {
    Error {
        code: 1,
        message: "environment variable error".into(),
    }
}

pub fn database_error<T: Debug>(err: T) -> Error {
    tracing::debug!("database error: {:?}", err);

    Error {
        code: 2,
        message: "database error".into(),
    }
}

pub fn storage_error<T: Debug>(err: T) -> Error {
    tracing::debug!("storage error: {:?}", err);

    Error {
        code: 3,
        message: "storage error".into(),
    }
}

pub fn serialization_error<T: Debug>(err: T) -> Error {
    tracing::debug!("serialization error: {:?}", err);

    Error {
        code: 4,
        message: "serialization error".into(),
    }
}

pub fn server_error<T: Debug>(err: T) -> Error {
    tracing::error!("server error: {:?}", err);

    Error {
        code: 6,
        message: "server error".into(),
    }
}

pub fn unexpected_error() -> Error {
    Error {
        code: 5,
        message: "unexpected error".into(),
    }
}

#[test]
fn error_kinds_follow_codes() {
    assert!(not_found_error().is_not_found_error());
    assert!(invalid_transition_error().is_invalid_transition_error());
    assert!(forbidden_error().is_forbidden_error());
    assert!(validation_error("rating").is_validation_error());
    assert_eq!(unexpected_error().kind(), ErrorKind::Internal);
    assert_eq!(storage_error("disk").kind(), ErrorKind::Internal);
}

#[test]
fn error_response_status() {
    let status = |err: Error| err.into_response().status();

    assert_eq!(status(not_found_error()), StatusCode::NOT_FOUND);
    assert_eq!(status(forbidden_error()), StatusCode::FORBIDDEN);
    assert_eq!(status(invalid_transition_error()), StatusCode::CONFLICT);
    assert_eq!(status(validation_error("rating")), StatusCode::BAD_REQUEST);
    assert_eq!(status(database_error("down")), StatusCode::INTERNAL_SERVER_ERROR);
}
