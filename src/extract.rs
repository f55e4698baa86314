//! Request body extraction that accepts both JSON and HTML form bodies.

use axum::{
    Form,
    body::Bytes,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
};
use serde::de::DeserializeOwned;

use crate::Error;

/// A request body read as a URL encoded form when the client says so, and as
/// JSON otherwise.
///
/// An empty body reads as `{}` so handlers can report which fields are
/// missing. Bodies that cannot be read become an [Error::InvalidBody].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonOrForm<T>(pub T);

impl<S, T> FromRequest<S> for JsonOrForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|rejection| Error::InvalidBody(rejection.body_text()))?;

            return Ok(Self(value));
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| Error::InvalidBody(rejection.body_text()))?;

        let body: &[u8] = if bytes.trim_ascii().is_empty() {
            b"{}"
        } else {
            &bytes
        };

        serde_json::from_slice(body)
            .map(Self)
            .map_err(|error| Error::InvalidBody(error.to_string()))
    }
}

#[cfg(test)]
mod extract_tests {
    use axum::{Json, Router, http::StatusCode, routing::post};
    use axum_test::TestServer;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use crate::extract::JsonOrForm;

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Greeting {
        user_id: Option<String>,
        count: Option<u8>,
    }

    async fn echo(JsonOrForm(greeting): JsonOrForm<Greeting>) -> Json<Greeting> {
        Json(greeting)
    }

    fn get_test_server() -> TestServer {
        TestServer::try_new(Router::new().route("/echo", post(echo)))
            .expect("Could not create test server.")
    }

    #[tokio::test]
    async fn reads_json_body() {
        let response = get_test_server()
            .post("/echo")
            .json(&json!({ "userId": "alice", "count": 2 }))
            .await;

        response.assert_status_ok();
        response.assert_json(&json!({ "userId": "alice", "count": 2 }));
    }

    #[tokio::test]
    async fn reads_form_body() {
        let response = get_test_server()
            .post("/echo")
            .form(&Greeting {
                user_id: Some("alice".to_owned()),
                count: Some(3),
            })
            .await;

        response.assert_status_ok();
        response.assert_json(&json!({ "userId": "alice", "count": 3 }));
    }

    #[tokio::test]
    async fn empty_body_has_no_fields() {
        let response = get_test_server().post("/echo").text("").await;

        response.assert_status_ok();
        response.assert_json(&json!({ "userId": null, "count": null }));
    }

    #[tokio::test]
    async fn malformed_body_is_json_bad_request() {
        let server = get_test_server();

        for response in [
            server.post("/echo").text("not json").await,
            server.post("/echo").json(&json!({ "count": "many" })).await,
        ] {
            response.assert_status(StatusCode::BAD_REQUEST);
            let body = response.json::<serde_json::Value>();
            assert!(
                body["error"]
                    .as_str()
                    .is_some_and(|message| message.starts_with("invalid request body"))
            );
        }
    }
}
