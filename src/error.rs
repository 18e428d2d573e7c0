use axum::extract::rejection::PathRejection;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;

/// Failure of a request handler or store operation
///
/// Form validation problems are not errors: handlers re-render the form
/// instead. This type covers missing records and internal failures.
#[derive(Debug, Error)]
pub enum AppError {
    /// Record does not exist or belongs to another user
    #[error("not found")]
    NotFound,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("template error: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("password hashing failed: {0}")]
    Password(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error("lock poisoned")]
    Poisoned,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                Html(include_str!("../templates/not_found.html")),
            )
                .into_response(),
            AppError::BadRequest(msg) => {
                log::warn!("bad request: {}", msg);
                (StatusCode::BAD_REQUEST, msg).into_response()
            }
            other => {
                log::error!("{}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for AppError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        AppError::Export(err.to_string())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        log::debug!("unroutable path parameter: {}", rejection);
        AppError::NotFound
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Export(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
