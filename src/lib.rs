//! Pennywise is the backend for a personal finance mobile app.
//!
//! This library provides the JSON API the app talks to and the periodic
//! spending-summary notifier that pushes weekly and monthly summaries to users.

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
mod db;
mod endpoints;
mod extract;
mod logging;
mod notifier;
mod preferences;
mod routing;
mod test_notification;
mod timezone;
mod transaction;
mod user;

pub use app_state::AppState;
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use notifier::{
    AccessTokenProvider, AuthError, BatchReport, Campaign, DeliveryError, FCM_ENDPOINT,
    FailureReason, FcmClient, PushDelivery, PushMessage, SQLiteStore, Schedule,
    ServiceAccountKey, ServiceAccountTokens, SkipReason, StaticToken, Summary, SummaryNotifier,
    SummaryPeriod, TransactionSource, UserDirectory, UserOutcome, Window, epoch_millis,
    run_schedule, token_provider_from_env,
};
pub use routing::build_router;
pub use timezone::{DEFAULT_TIMEZONE, get_timezone};
pub use transaction::{Transaction, TransactionType, create_transaction};
pub use user::{MessagePreference, User, UserId, upsert_user};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first.
///
/// Once a signal arrives the server behind `handle` is asked to shut down
/// gracefully and `shutdown` is notified so the scheduler tasks can stop.
pub async fn graceful_shutdown(
    handle: Handle<SocketAddr>,
    shutdown: tokio::sync::watch::Sender<bool>,
) {
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
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
        },
    }

    handle.graceful_shutdown(Some(Duration::from_secs(1)));
    // Nobody listening just means the scheduler tasks are already gone.
    let _ = shutdown.send(true);
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// A request body was missing one or more required fields.
    ///
    /// The string is the message shown to the client, e.g. "User ID is required".
    #[error("{0}")]
    MissingFields(&'static str),

    /// A request body could not be read as JSON or as a URL encoded form.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// The user exists but has no delivery token to send notifications to.
    #[error("User not found or FCM token missing")]
    MissingFcmToken,

    /// The message preference was not one of "None", "Weekly" or "Monthly".
    #[error("invalid message preference \"{0}\", expected one of None, Weekly or Monthly")]
    InvalidMessagePreference(String),

    /// A month number outside of 1 to 12 was requested.
    #[error("invalid month {0}, expected a number from 1 to 12")]
    InvalidMonth(u8),

    /// A year outside of the range of supported calendar dates was requested.
    #[error("invalid year {0}")]
    InvalidYear(i32),

    /// The push delivery service rejected or failed to deliver a notification.
    #[error("could not send notification: {0}")]
    NotificationFailed(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// An error occurred while getting the timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self {
            Error::MissingFields(_)
            | Error::InvalidBody(_)
            | Error::InvalidMessagePreference(_)
            | Error::InvalidMonth(_)
            | Error::InvalidYear(_) => StatusCode::BAD_REQUEST,
            Error::NotFound | Error::MissingFcmToken => StatusCode::NOT_FOUND,
            Error::NotificationFailed(ref message) => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "success": false, "error": message })),
                )
                    .into_response();
            }
            ref error => {
                tracing::error!("An unexpected error occurred: {}", error);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // Missing users and missing tokens look the same to the client.
        let message = match self {
            Error::NotFound => Error::MissingFcmToken.to_string(),
            error => error.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod error_tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use crate::Error;

    async fn body_json(error: Error) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn missing_fields_is_bad_request() {
        let (status, body) = body_json(Error::MissingFields("User ID is required")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "User ID is required");
    }

    #[tokio::test]
    async fn invalid_body_is_bad_request() {
        let (status, body) = body_json(Error::InvalidBody("EOF while parsing".to_owned())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid request body: EOF while parsing");
    }

    #[tokio::test]
    async fn not_found_reads_like_missing_token() {
        let (status, body) = body_json(Error::NotFound).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "User not found or FCM token missing");
    }

    #[tokio::test]
    async fn notification_failure_reports_success_false() {
        let (status, body) = body_json(Error::NotificationFailed("boom".to_owned())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "boom");
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        assert_eq!(
            Error::from(rusqlite::Error::QueryReturnedNoRows),
            Error::NotFound
        );
    }
}
