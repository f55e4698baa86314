//! Middleware for logging requests and responses.

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{StatusCode, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

/// Bodies longer than this many bytes are truncated in the `info` logs.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// Body fields whose values must never be written to the logs.
const REDACTED_FIELDS: [&str; 1] = ["fcmToken"];

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If the response body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is
/// truncated and logged at the `debug` level.
/// Device tokens in JSON and form request bodies are redacted.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let Ok(body_bytes) = axum::body::to_bytes(body, usize::MAX).await else {
        tracing::warn!("Could not read request body for {} {}", parts.method, parts.uri);
        return StatusCode::BAD_REQUEST.into_response();
    };

    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let body_text = if content_type.starts_with("application/json") {
        redact_json(&body_bytes)
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        redact_form(&body_bytes)
    } else {
        String::from_utf8_lossy(&body_bytes).into_owned()
    };
    log_body("Received request", &parts, &body_text);

    let request = Request::from_parts(parts, Body::from(body_bytes));
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let Ok(body_bytes) = axum::body::to_bytes(body, usize::MAX).await else {
        tracing::error!("Could not read response body");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    log_body(
        "Sending response",
        &parts,
        &String::from_utf8_lossy(&body_bytes),
    );

    Response::from_parts(parts, Body::from(body_bytes))
}

/// The JSON text of `body` with sensitive fields masked.
///
/// Bodies that are not valid JSON are logged as they are.
fn redact_json(body: &Bytes) -> String {
    let Ok(mut value) = serde_json::from_slice::<Value>(body) else {
        return String::from_utf8_lossy(body).into_owned();
    };

    if let Some(object) = value.as_object_mut() {
        for field in REDACTED_FIELDS {
            if let Some(field_value) = object.get_mut(field) {
                *field_value = Value::from("********");
            }
        }
    }

    value.to_string()
}

/// The URL encoded form `body` with sensitive fields masked.
fn redact_form(body: &Bytes) -> String {
    String::from_utf8_lossy(body)
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if REDACTED_FIELDS.contains(&key) => format!("{key}=********"),
            _ => pair.to_owned(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// The longest prefix of `text` no longer than `limit` bytes that ends on a
/// character boundary.
fn truncate(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }

    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }

    &text[..end]
}

fn log_body(what: &str, parts: &impl std::fmt::Debug, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "{what}: {parts:#?}\nbody: {}...",
            truncate(body, LOG_BODY_LENGTH_LIMIT)
        );
        tracing::debug!("Full body: {body:?}");
    } else {
        tracing::info!("{what}: {parts:#?}\nbody: {body:?}");
    }
}

#[cfg(test)]
mod tests {
    use axum::{Json, Router, body::Bytes, middleware, routing::post};
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use crate::logging::{logging_middleware, redact_form, redact_json, truncate};

    #[test]
    fn redacts_fcm_token() {
        let body = Bytes::from(r#"{"userId":"abc","fcmToken":"secret-token"}"#);

        let got = redact_json(&body);

        assert!(!got.contains("secret-token"));
        assert!(got.contains("abc"));
        assert!(got.contains("********"));
    }

    #[test]
    fn leaves_other_json_alone() {
        let body = Bytes::from(r#"{"userId":"abc","messagePreference":"Weekly"}"#);

        let got: Value = serde_json::from_str(&redact_json(&body)).unwrap();

        assert_eq!(got, json!({"userId": "abc", "messagePreference": "Weekly"}));
    }

    #[test]
    fn invalid_json_is_logged_as_is() {
        let body = Bytes::from("not json");

        assert_eq!(redact_json(&body), "not json");
    }

    #[test]
    fn redacts_fcm_token_in_form() {
        let body = Bytes::from("userId=abc&fcmToken=secret-token");

        assert_eq!(redact_form(&body), "userId=abc&fcmToken=********");
    }

    #[test]
    fn truncates_on_char_boundary() {
        // "é" is two bytes, so a limit of 2 would split it.
        assert_eq!(truncate("aé", 2), "a");
        assert_eq!(truncate("abc", 2), "ab");
        assert_eq!(truncate("ab", 5), "ab");
    }

    #[tokio::test]
    async fn passes_body_through_unchanged() {
        let app = Router::new()
            .route("/echo", post(|Json(body): Json<Value>| async move { Json(body) }))
            .layer(middleware::from_fn(logging_middleware));
        let server = TestServer::try_new(app).expect("Could not create test server.");
        let body = json!({"userId": "abc", "fcmToken": "secret-token"});

        let response = server.post("/echo").json(&body).await;

        response.assert_status_ok();
        response.assert_json(&body);
    }
}
