//! Endpoints the app calls to register a device and choose which summaries to receive.

use std::{
    str::FromStr,
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    AppState, Error,
    extract::JsonOrForm,
    user::{MessagePreference, UserId, set_fcm_token, set_message_preference},
};

/// The state needed for updating a user's notification settings.
#[derive(Debug, Clone)]
pub struct PreferencesState {
    /// The database connection for managing users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for PreferencesState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The body of a request to register a device token.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FcmTokenForm {
    /// The user the device belongs to.
    pub user_id: Option<String>,
    /// The FCM registration token of the device.
    pub fcm_token: Option<String>,
}

/// The body of a request to choose a summary.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePreferenceForm {
    /// The user whose preference is changing.
    pub user_id: Option<String>,
    /// One of "None", "Weekly" or "Monthly".
    pub message_preference: Option<String>,
}

/// A field the client must send, where an empty string counts as missing.
pub(crate) fn required(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

/// Store the device token push notifications for a user are sent to.
pub async fn update_fcm_token_endpoint(
    State(state): State<PreferencesState>,
    JsonOrForm(form): JsonOrForm<FcmTokenForm>,
) -> Response {
    let (Some(user_id), Some(fcm_token)) = (required(form.user_id), required(form.fcm_token))
    else {
        return Error::MissingFields("User ID and FCM token are required").into_response();
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match set_fcm_token(&UserId::new(&user_id), &fcm_token, &connection) {
        Ok(()) => Json(json!({ "message": "FCM token updated successfully" })).into_response(),
        Err(error) => {
            tracing::error!("An unexpected error occurred while updating an FCM token: {error}");
            error.into_response()
        }
    }
}

/// Store which periodic summary a user wants to receive.
pub async fn update_message_preference_endpoint(
    State(state): State<PreferencesState>,
    JsonOrForm(form): JsonOrForm<MessagePreferenceForm>,
) -> Response {
    let (Some(user_id), Some(raw_preference)) = (
        required(form.user_id),
        required(form.message_preference),
    ) else {
        return Error::MissingFields("User ID and preferences are required").into_response();
    };

    let preference = match MessagePreference::from_str(&raw_preference) {
        Ok(preference) => preference,
        Err(error) => return error.into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match set_message_preference(&UserId::new(&user_id), preference, &connection) {
        Ok(()) => {
            Json(json!({ "message": "User preferences updated successfully" })).into_response()
        }
        Err(error) => {
            tracing::error!(
                "An unexpected error occurred while updating a message preference: {error}"
            );
            error.into_response()
        }
    }
}
