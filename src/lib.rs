//! Tabby is a web service for keeping track of money you give and take,
//! including expenses that are shared with another registered user.
//!
//! This library provides a JSON REST API. Mention another user in a
//! transaction's description (e.g. "Dinner @alice@example.com" or
//! "Taxi to bob") and the expense is split evenly between the two of you.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod app_state;
mod auth;
mod database_id;
mod db;
pub mod endpoints;
mod logging;
mod routing;
mod summary;
mod timezone;
mod transaction;

pub use app_state::AppState;
pub use auth::{
    CodeSender, LogCodeSender, OneTimeCode, PasswordHash, User, UserID, ValidatedPassword,
    count_users, create_user, get_user_by_email, update_password,
};
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::{build_cors_layer, build_router};
pub use summary::{MonthlySummary, SummaryEntry, YearMonth, get_monthly_summary};
pub use transaction::{
    ExpenseOutcome, ExpenseRequest, NewTransaction, Transaction, TransactionChanges,
    TransactionKind, count_transactions, create_transaction, delete_transaction,
    get_all_transactions, get_transaction, get_transactions_for_user, parse_mention,
    record_expense, resolve_counterparty, update_transaction,
};

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

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The request body was missing a required field or a field had an invalid value,
    /// e.g. a negative amount or a transaction type other than "give" or "take".
    #[error("{0}")]
    InvalidRequest(String),

    /// A description mentioned another user, but no registered user has
    /// that email address or name.
    #[error("Mentioned user not found")]
    CounterpartyNotFound,

    /// The requested transaction was not found.
    ///
    /// For transactions, this is also returned when the transaction exists
    /// but belongs to another user, so that callers cannot probe for the
    /// existence of other users' transactions.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("Expense not found")]
    NotFound,

    /// The authenticated user no longer exists.
    #[error("User not found")]
    UserNotFound,

    /// An unhandled/unexpected SQL error.
    ///
    /// The inner error is only logged on the server, clients receive a generic message.
    #[error("an unexpected SQL error occurred: {0}")]
    StorageFailure(rusqlite::Error),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// The email address is already used by another user.
    #[error("User already exists")]
    DuplicateEmail,

    /// The display name is already used by another user.
    ///
    /// Names must be unique so that mentioning a user by name is never ambiguous.
    #[error("The name is already taken")]
    DuplicateName,

    /// The string is not a valid email address.
    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    /// The display name is empty or contains characters that are not allowed.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// The email and password combination did not match a registered user.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The one-time code is wrong, expired, or has already been used.
    #[error("Invalid or expired code")]
    InvalidOneTimeCode,

    /// The request did not include an auth cookie.
    #[error("Unauthorized")]
    Unauthorized,

    /// The auth cookie could not be decrypted, could not be parsed, or has expired.
    #[error("Invalid token")]
    InvalidToken,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The auth cookie could not be created.
    #[error("could not create the auth cookie: {0}")]
    CookieError(String),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// A [CodeSender] could not deliver a one-time code.
    ///
    /// [LogCodeSender] never fails, senders that talk to a mail server return this.
    #[error("could not send the one-time code: {0}")]
    CodeDeliveryError(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("user.name") =>
            {
                Error::DuplicateName
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::StorageFailure(error)
            }
        }
    }
}

impl Error {
    /// The HTTP status code that should be sent to the client for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidRequest(_)
            | Error::DuplicateEmail
            | Error::DuplicateName
            | Error::InvalidEmail(_)
            | Error::InvalidName(_)
            | Error::TooWeak(_) => StatusCode::BAD_REQUEST,
            Error::CounterpartyNotFound | Error::NotFound | Error::UserNotFound => {
                StatusCode::NOT_FOUND
            }
            Error::InvalidCredentials | Error::InvalidOneTimeCode | Error::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            Error::InvalidToken => StatusCode::FORBIDDEN,
            Error::StorageFailure(_)
            | Error::DatabaseLockError
            | Error::HashingError(_)
            | Error::CookieError(_)
            | Error::InvalidTimezoneError(_)
            | Error::CodeDeliveryError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal errors are not intended to be shown to the client.
        let message = if status.is_server_error() {
            tracing::error!("An unexpected error occurred: {}", self);
            "Server error".to_owned()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
