use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;

/// Anything that goes wrong while loading the roster from the spreadsheet.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("JWT signing error: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Spreadsheet not found: {0}")]
    SpreadsheetNotFound(String),

    #[error("Worksheet has no '{0}' column")]
    MissingColumn(&'static str),

    #[error("Invalid URL: {0}")]
    Url(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WheelError {
    #[error("No participants found.")]
    NoRoster,

    #[error("No tickets sold.")]
    NoTickets,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Wheel(#[from] WheelError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Message returned to clients for any upstream failure. Details stay in the logs.
pub const FETCH_FAILED_MESSAGE: &str = "Could not fetch participant data.";

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::Fetch(_) => (StatusCode::INTERNAL_SERVER_ERROR, FETCH_FAILED_MESSAGE.to_string()),
            AppError::Wheel(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found.")),
            AppError::Config(_) | AppError::Io(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.".to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
