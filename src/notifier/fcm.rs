//! Delivers push messages through the Firebase Cloud Messaging HTTP v1 API.
//!
//! Messages are sent data-only so the app decides how to display them.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::notifier::{
    auth::AccessTokenProvider,
    ports::{DeliveryError, PushDelivery, PushMessage},
};

/// The production FCM endpoint.
pub const FCM_ENDPOINT: &str = "https://fcm.googleapis.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// An FCM client for a single Firebase project.
#[derive(Clone)]
pub struct FcmClient {
    http: Client,
    send_url: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl FcmClient {
    /// Create a client that sends through the production FCM endpoint.
    ///
    /// Every send asks `tokens` for an OAuth 2.0 bearer token with the
    /// `firebase.messaging` scope.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(
        project_id: &str,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Result<Self, reqwest::Error> {
        Self::with_endpoint(FCM_ENDPOINT, project_id, tokens)
    }

    /// Create a client that sends through `endpoint`, e.g. a local emulator.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn with_endpoint(
        endpoint: &str,
        project_id: &str,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http,
            send_url: format!(
                "{}/v1/projects/{project_id}/messages:send",
                endpoint.trim_end_matches('/')
            ),
            tokens,
        })
    }
}

#[derive(Serialize)]
struct SendRequest<'a> {
    message: MessageBody<'a>,
}

#[derive(Serialize)]
struct MessageBody<'a> {
    token: &'a str,
    data: DataPayload<'a>,
}

#[derive(Serialize)]
struct DataPayload<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    name: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorStatus,
}

#[derive(Deserialize)]
struct ErrorStatus {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    #[serde(default)]
    error_code: Option<String>,
}

#[async_trait]
impl PushDelivery for FcmClient {
    async fn send(&self, message: &PushMessage) -> Result<String, DeliveryError> {
        let request = SendRequest {
            message: MessageBody {
                token: &message.token,
                data: DataPayload {
                    title: &message.title,
                    body: &message.body,
                },
            },
        };

        let access_token = self
            .tokens
            .access_token()
            .await
            .map_err(|error| DeliveryError::Other(error.to_string()))?;

        let response = self
            .http
            .post(&self.send_url)
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await
            .map_err(|error| DeliveryError::Other(format!("could not reach FCM: {error}")))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|error| DeliveryError::Other(format!("could not read FCM response: {error}")))?;

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }

        serde_json::from_slice::<SendResponse>(&body)
            .map(|response| response.name)
            .map_err(|error| DeliveryError::Other(format!("invalid FCM response: {error}")))
    }
}

/// Sort a failed send into a dead token or some other failure.
///
/// Only an FCM error body can condemn a token: either the `UNREGISTERED` error
/// code or a `NOT_FOUND` status alongside a 404. A bare 404 from a wrong
/// endpoint or a proxy leaves the token alone.
fn classify_error(status: StatusCode, body: &[u8]) -> DeliveryError {
    let Ok(ErrorResponse { error }) = serde_json::from_slice::<ErrorResponse>(body) else {
        let message = String::from_utf8_lossy(body);
        return DeliveryError::Other(format!("FCM returned {status}: {message}"));
    };

    let unregistered = error
        .details
        .iter()
        .any(|detail| detail.error_code.as_deref() == Some("UNREGISTERED"))
        || (status == StatusCode::NOT_FOUND && error.status == "NOT_FOUND");

    if unregistered {
        DeliveryError::Unregistered(error.message)
    } else {
        DeliveryError::Other(format!("FCM returned {status}: {}", error.message))
    }
}
