//! Application router configuration.

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;

use crate::{
    AppState, endpoints,
    preferences::{update_fcm_token_endpoint, update_message_preference_endpoint},
    test_notification::send_test_notification_endpoint,
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::ROOT, get(get_root))
        .route(endpoints::UPDATE_FCM_TOKEN, post(update_fcm_token_endpoint))
        .route(
            endpoints::UPDATE_MESSAGE_PREFERENCE,
            post(update_message_preference_endpoint),
        )
        .route(
            endpoints::TEST_NOTIFICATION,
            post(send_test_notification_endpoint),
        )
        .fallback(get_404_not_found)
        .with_state(state)
}

/// Lets clients and load balancers check that the server is up.
async fn get_root() -> &'static str {
    "Server is working!"
}

async fn get_404_not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response()
}
