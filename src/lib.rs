//! CashTrack is a backend for tracking personal expenses.
//!
//! This library provides a JSON REST API for signing up and logging in (with a
//! password or through Google/GitHub), recording expenses with an optional
//! receipt attached, and exporting expenses as PDF or CSV reports.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde::Serialize;
use serde_json::json;
use tokio::signal;

mod app_state;
mod auth;
mod config;
mod database_id;
mod db;
mod endpoints;
mod expense;
mod logging;
mod media;
mod report;
mod routing;
#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use auth::{User, UserID};
pub use config::{AppConfig, Environment, OAuthCredentials};
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::build_router;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// A problem with a single field of a request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    /// The name of the field as the client sent it, e.g. "paymentMethod".
    pub field: String,
    /// A human readable explanation of what is wrong with the field.
    pub message: String,
}

impl FieldError {
    /// Create a new field error.
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_owned(),
            message: message.to_owned(),
        }
    }
}

/// The errors that may occur in the application.
///
/// Every variant maps to exactly one HTTP status code, see the [IntoResponse] impl.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// One or more fields in the request failed validation.
    #[error("validation failed for {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    /// The password and confirmation password given at sign-up differ.
    #[error("passwords don't match")]
    PasswordMismatch,

    /// The username chosen at sign-up belongs to another user.
    #[error("username already exists")]
    DuplicateUsername,

    /// The username does not exist or the password is wrong.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The request did not carry the auth token cookie.
    #[error("no auth token in the cookie jar")]
    MissingToken,

    /// The auth token could not be verified or has expired.
    #[error("the auth token is invalid or has expired")]
    InvalidToken,

    /// The OAuth flow could not be completed.
    ///
    /// The string explains the cause and should only be logged on the server.
    #[error("OAuth authentication failed: {0}")]
    OAuthFailed(String),

    /// No client credentials have been configured for the OAuth provider.
    #[error("the OAuth provider {0} is not configured")]
    OAuthNotConfigured(&'static str),

    /// The uploaded file's declared content type is not in the allow-list.
    #[error("file type \"{content_type}\" is not allowed in field {field}")]
    UnsupportedFileType {
        /// The multipart field the file was sent in.
        field: String,
        /// The declared content type of the file.
        content_type: String,
    },

    /// The uploaded file is larger than the upload limit.
    #[error("the file in field {0} is too large")]
    FileTooLarge(String),

    /// A file was sent in a field other than the media field, or more than one file was sent.
    #[error("unexpected file in field {0}")]
    UnexpectedFileField(String),

    /// The multipart form could not be parsed.
    #[error("could not parse multipart form: {0}")]
    MultipartError(String),

    /// The request body could not be read or parsed.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// The query string could not be parsed.
    #[error("invalid query string: {0}")]
    InvalidQuery(String),

    /// Tried to delete the media file of an expense that has none.
    #[error("the expense has no media file attached")]
    NoMediaFile,

    /// The report format was missing or not one of the supported formats.
    #[error("invalid report format")]
    InvalidReportFormat,

    /// No expenses matched the report filters.
    #[error("no expenses match the report filters")]
    NoReportData,

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The server was started without a JWT secret, so tokens cannot be issued or verified.
    #[error("the JWT secret is not configured")]
    MissingJwtSecret,

    /// The JWT could not be created.
    #[error("could not create token: {0}")]
    TokenCreation(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// A file system operation failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// The PDF or CSV writer failed.
    #[error("could not write report: {0}")]
    ReportError(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    && desc.ends_with("user.username") =>
            {
                Error::DuplicateUsername
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value.to_string())
    }
}

impl From<JsonRejection> for Error {
    fn from(value: JsonRejection) -> Self {
        Error::InvalidBody(value.body_text())
    }
}

impl From<QueryRejection> for Error {
    fn from(value: QueryRejection) -> Self {
        Error::InvalidQuery(value.body_text())
    }
}

impl From<PathRejection> for Error {
    fn from(value: PathRejection) -> Self {
        // Every ID is an integer, so a path that does not parse cannot name an existing record.
        tracing::debug!("Rejected path parameters: {}", value.body_text());
        Error::NotFound
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Error::Validation(errors) => {
                return (StatusCode::BAD_REQUEST, Json(json!({ "errors": errors })))
                    .into_response();
            }
            Error::PasswordMismatch => (StatusCode::BAD_REQUEST, "Passwords don't match!".to_owned()),
            Error::DuplicateUsername => {
                (StatusCode::BAD_REQUEST, "Username already exists!".to_owned())
            }
            Error::InvalidCredentials => (
                StatusCode::BAD_REQUEST,
                "Invalid username or password!".to_owned(),
            ),
            Error::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized: No token provided".to_owned(),
            ),
            Error::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized: Invalid token".to_owned(),
            ),
            Error::OAuthFailed(reason) => {
                tracing::warn!("OAuth authentication failed: {reason}");
                (
                    StatusCode::UNAUTHORIZED,
                    "OAuth Authentication Failed".to_owned(),
                )
            }
            Error::OAuthNotConfigured(provider) => (
                StatusCode::NOT_IMPLEMENTED,
                format!("Sign in with {provider} is not available"),
            ),
            Error::UnsupportedFileType {
                field,
                content_type,
            } => (
                StatusCode::BAD_REQUEST,
                format!(
                    "Unsupported file type \"{content_type}\" in field \"{field}\". \
                    Upload a JPEG, PNG or PDF file."
                ),
            ),
            Error::FileTooLarge(field) => (
                StatusCode::BAD_REQUEST,
                format!("File too large in field \"{field}\". The limit is 5 MB."),
            ),
            Error::UnexpectedFileField(field) => (
                StatusCode::BAD_REQUEST,
                format!("Unexpected field \"{field}\""),
            ),
            Error::MultipartError(reason) => (
                StatusCode::BAD_REQUEST,
                format!("Could not parse multipart form: {reason}"),
            ),
            Error::InvalidBody(reason) => (StatusCode::BAD_REQUEST, reason),
            Error::InvalidQuery(reason) => (StatusCode::BAD_REQUEST, reason),
            Error::NoMediaFile => (
                StatusCode::BAD_REQUEST,
                "No media file attached!".to_owned(),
            ),
            Error::InvalidReportFormat => (
                StatusCode::BAD_REQUEST,
                "Invalid format! Use 'pdf' or 'csv'.".to_owned(),
            ),
            Error::NoReportData => (
                StatusCode::NOT_FOUND,
                "No expenses found for the given filters.".to_owned(),
            ),
            Error::NotFound => (
                StatusCode::NOT_FOUND,
                "The requested resource could not be found.".to_owned(),
            ),
            Error::MissingJwtSecret => {
                tracing::error!("JWT_SECRET is not set, cannot issue or verify tokens.");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error: Missing JWT_SECRET".to_owned(),
                )
            }
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_owned(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
