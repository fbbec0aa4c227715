//! Unified error type.

use std::path::PathBuf;

use http::StatusCode;
use tracing::error;

use crate::response::{IntoResponse, Response};
use crate::validate::ValidationErrors;

/// The error type returned by keel's fallible operations.
///
/// Handlers may return `Result<T, Error>` directly: a validation failure
/// becomes `422 Unprocessable Content` with the messages as JSON, anything
/// else becomes a logged `500`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{0}`")]
    Addr(String),

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("unknown middleware `{0}`")]
    UnknownMiddleware(String),

    #[error("unknown validator `{0}`")]
    UnknownValidator(String),

    #[error("unknown template engine `{0}`")]
    UnknownEngine(String),

    #[error("template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("template: {0}")]
    Template(String),

    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(errors) => {
                let body = serde_json::json!({
                    "code": 0,
                    "msg": errors.first(),
                    "errors": errors,
                });
                Response::builder()
                    .status(StatusCode::UNPROCESSABLE_ENTITY)
                    .json(body.to_string().into_bytes())
            }
            other => {
                error!(error = %other, "request failed");
                Response::status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}
