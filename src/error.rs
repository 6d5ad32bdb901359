//! Typed errors and HTTP mapping.

use crate::config::Environment;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::OnceLock;
use thiserror::Error;

/// Raised while turning a resource definition (or the process settings) into something runnable.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("schema has no fields")]
    EmptySchema,
    #[error("duplicate field: {0}")]
    DuplicateField(String),
    #[error("invalid {kind} identifier: '{name}'")]
    InvalidIdentifier { kind: &'static str, name: String },
    #[error("invalid endpoint: '{0}'")]
    InvalidEndpoint(String),
    #[error("endpoint already mounted: {0}")]
    DuplicateEndpoint(String),
    #[error("field {field}: {reason}")]
    InvalidField { field: String, reason: String },
    #[error("more than one owner_ref field: {0}")]
    DuplicateOwner(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("settings: {0}")]
    Settings(String),
}

impl ConfigError {
    pub(crate) fn field(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure reported by a query executor. Never swallowed by the generated stack.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("statement not supported: {0}")]
    Unsupported(String),
    #[error("no row returned by {0}")]
    NoRow(&'static str),
    #[error("storage: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

/// Install the runtime environment used by the error mapper. First call wins.
pub fn set_environment(environment: Environment) {
    if ENVIRONMENT.set(environment).is_err() {
        tracing::warn!("error environment already installed, ignoring {:?}", environment);
    }
}

fn disclose_internals() -> bool {
    matches!(ENVIRONMENT.get(), Some(Environment::Development))
}

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Client-facing body for `err`. Internal messages and the debug trace only leave the
/// process when `disclose` is set.
pub fn error_body(err: &AppError, disclose: bool) -> ErrorBody {
    let message = if err.status().is_server_error() && !disclose {
        "Internal Server Error".to_string()
    } else {
        err.to_string()
    };
    ErrorBody {
        success: false,
        message,
        stack: disclose.then(|| format!("{:?}", err)),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(error_body(&self, disclose_internals()))).into_response()
    }
}
