//! The API endpoints URIs.

/// The root route which reports that the server is up.
pub const ROOT: &str = "/";
/// The route for registering the device token push notifications are sent to.
pub const UPDATE_FCM_TOKEN: &str = "/api/auth/update-fcm-token";
/// The route for choosing which periodic summary a user receives.
pub const UPDATE_MESSAGE_PREFERENCE: &str = "/api/auth/update-message-preference";
/// The route for sending a one-off monthly summary to a single user.
pub const TEST_NOTIFICATION: &str = "/api/transactions/test-notification";

// These tests are here so that we know when we call `Uri::from_shared` it will not panic.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok());
    }

    #[test]
    fn endpoints_are_valid_uris() {
        assert_endpoint_is_valid_uri(endpoints::ROOT);
        assert_endpoint_is_valid_uri(endpoints::UPDATE_FCM_TOKEN);
        assert_endpoint_is_valid_uri(endpoints::UPDATE_MESSAGE_PREFERENCE);
        assert_endpoint_is_valid_uri(endpoints::TEST_NOTIFICATION);
    }
}
