//! An endpoint for sending a one-off monthly summary to a single user, handy
//! for checking that a device receives notifications.

use axum::{
    Json,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::{Month, OffsetDateTime};
use time_tz::Tz;

use crate::{
    AppState, Error,
    extract::JsonOrForm,
    notifier::{Campaign, SummaryNotifier},
    preferences::required,
    timezone::to_local,
    user::UserId,
};

/// The month summarised when the request does not name one.
const DEFAULT_MONTH: Month = Month::June;

/// The state needed for sending a test notification.
#[derive(Clone)]
pub struct TestNotificationState {
    /// Sends the summary.
    pub notifier: SummaryNotifier,
    /// Used to work out the current year.
    pub local_timezone: &'static Tz,
}

impl FromRef<AppState> for TestNotificationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            notifier: state.notifier.clone(),
            local_timezone: state.local_timezone,
        }
    }
}

/// The body of a test notification request.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestNotificationForm {
    /// The user to notify.
    pub user_id: Option<String>,
    /// The year of the month to summarise. Defaults to the current year.
    pub year: Option<i32>,
    /// The month to summarise, from 1 to 12. Defaults to June.
    pub month: Option<u8>,
}

/// Send a summary of one calendar month to a single user, whatever their preference.
pub async fn send_test_notification_endpoint(
    State(state): State<TestNotificationState>,
    JsonOrForm(form): JsonOrForm<TestNotificationForm>,
) -> Response {
    let Some(user_id) = required(form.user_id) else {
        return Error::MissingFields("User ID is required").into_response();
    };

    let month = match form.month {
        None => DEFAULT_MONTH,
        Some(number) => match Month::try_from(number) {
            Ok(month) => month,
            Err(_) => return Error::InvalidMonth(number).into_response(),
        },
    };

    let year = form
        .year
        .unwrap_or_else(|| to_local(state.local_timezone, OffsetDateTime::now_utc()).year());

    let Ok(campaign) = Campaign::for_month(year, month) else {
        return Error::InvalidYear(year).into_response();
    };

    match state
        .notifier
        .send_to_user(&UserId::new(&user_id), &campaign)
        .await
    {
        Ok(()) => Json(json!({
            "success": true,
            "message": "Notification sent successfully"
        }))
        .into_response(),
        Err(error) => error.into_response(),
    }
}
