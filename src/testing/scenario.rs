//! Alba-style HTTP testing utilities for Axum applications
//!
//! A fluent API for driving the router without starting a server, inspired
//! by .NET's Alba testing framework. [`Scenario::signed`] attaches valid
//! provider signature headers so webhook tests can focus on the payload.
//!
//! # Example
//!
//! ```rust,ignore
//! use identity_sync::testing;
//!
//! #[tokio::test]
//! async fn test_user_created() {
//!     let response = testing::post(app, "/clerk-webhook")
//!         .signed(&verifier, "msg_1", r#"{"type":"user.created","data":{"id":"u1"}}"#)
//!         .execute()
//!         .await
//!         .assert_ok();
//!
//!     assert_eq!(response.body_string().await, "processed successfully");
//! }
//! ```

use axum::{
    Router,
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request, StatusCode, header},
};
use serde::{Deserialize, Serialize};
use tower::ServiceExt;

use crate::webhooks::WebhookVerifier;
use crate::webhooks::verification::current_unix_timestamp;

/// Alba-style test scenario builder for easy endpoint testing
pub struct Scenario {
    app: Router,
    request: Request<Body>,
}

impl Scenario {
    /// Create a new test scenario with the given app
    pub fn new(app: Router) -> Self {
        Self {
            app,
            request: Request::builder()
                .method(Method::GET)
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        }
    }

    /// Set the HTTP method
    pub fn method(mut self, method: Method) -> Self {
        *self.request.method_mut() = method;
        self
    }

    /// Set the URI/path
    pub fn uri(mut self, uri: &str) -> Self {
        *self.request.uri_mut() = uri.parse().unwrap();
        self
    }

    /// Add a header
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.request.headers_mut().insert(
            HeaderName::from_bytes(key.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
        self
    }

    /// Set JSON body from a serializable type
    pub fn json_body<T: Serialize>(mut self, body: &T) -> Self {
        let json = serde_json::to_string(body).unwrap();
        *self.request.body_mut() = Body::from(json);
        self.request.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self
    }

    /// Set plain text body
    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        *self.request.body_mut() = Body::from(body.into());
        self
    }

    /// Set `body` and sign it as delivery `id`, timestamped now
    pub fn signed(self, verifier: &WebhookVerifier, id: &str, body: impl Into<String>) -> Self {
        self.signed_at(verifier, id, current_unix_timestamp(), body)
    }

    /// Set `body` and sign it as delivery `id` with an explicit timestamp
    pub fn signed_at(
        self,
        verifier: &WebhookVerifier,
        id: &str,
        timestamp: i64,
        body: impl Into<String>,
    ) -> Self {
        let body = body.into();
        let signature = verifier.sign(id, timestamp, body.as_bytes()).unwrap();

        self.header("svix-id", id)
            .header("svix-timestamp", &timestamp.to_string())
            .header("svix-signature", &signature)
            .header(header::CONTENT_TYPE.as_str(), "application/json")
            .text_body(body)
    }

    /// Execute the request and get an assertion builder
    pub async fn execute(self) -> ScenarioAssert {
        let response = self.app.oneshot(self.request).await.unwrap();
        ScenarioAssert { response }
    }
}

/// Assertion builder for test responses
pub struct ScenarioAssert {
    response: axum::response::Response,
}

impl ScenarioAssert {
    /// Assert the response status code
    pub fn assert_status(self, expected: StatusCode) -> Self {
        assert_eq!(
            self.response.status(),
            expected,
            "Expected status {}, got {}",
            expected,
            self.response.status()
        );
        self
    }

    /// Assert status is 200 OK
    pub fn assert_ok(self) -> Self {
        self.assert_status(StatusCode::OK)
    }

    /// Assert status is 400 Bad Request
    pub fn assert_bad_request(self) -> Self {
        self.assert_status(StatusCode::BAD_REQUEST)
    }

    /// Assert status is 404 Not Found
    pub fn assert_not_found(self) -> Self {
        self.assert_status(StatusCode::NOT_FOUND)
    }

    /// Assert status is 500 Internal Server Error
    pub fn assert_server_error(self) -> Self {
        self.assert_status(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Assert a header exists with the given value
    pub fn assert_header(self, key: &str, expected: &str) -> Self {
        let value = self
            .response
            .headers()
            .get(key)
            .unwrap_or_else(|| panic!("Header '{}' not found", key))
            .to_str()
            .unwrap();
        assert_eq!(value, expected, "Header '{}' value mismatch", key);
        self
    }

    /// Assert a header exists, whatever its value
    pub fn assert_has_header(self, key: &str) -> Self {
        assert!(
            self.response.headers().contains_key(key),
            "Header '{}' not found",
            key
        );
        self
    }

    /// Get the response body as bytes
    pub async fn body_bytes(self) -> Vec<u8> {
        axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    /// Get the response body as a string
    pub async fn body_string(self) -> String {
        String::from_utf8(self.body_bytes().await).unwrap()
    }

    /// Parse the JSON response body into a type
    pub async fn json<T: for<'de> Deserialize<'de>>(self) -> T {
        let bytes = self.body_bytes().await;
        serde_json::from_slice(&bytes).expect("Failed to parse JSON response")
    }

    /// Assert the response body equals the given text
    pub async fn assert_body(self, expected: &str) -> Self {
        let status = self.response.status();
        let body = self.body_string().await;
        assert_eq!(body, expected, "Response body mismatch");

        let mut response = axum::response::Response::new(Body::from(body));
        *response.status_mut() = status;
        Self { response }
    }

    /// Get the underlying response for custom assertions
    pub fn response(self) -> axum::response::Response {
        self.response
    }
}

/// Convenience function to create a GET request scenario
pub fn get(app: Router, uri: &str) -> Scenario {
    Scenario::new(app).method(Method::GET).uri(uri)
}

/// Convenience function to create a POST request scenario
pub fn post(app: Router, uri: &str) -> Scenario {
    Scenario::new(app).method(Method::POST).uri(uri)
}
