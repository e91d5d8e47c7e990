//! Integration tests for the DigitalHub storefront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p digitalhub-integration-tests
//! ```
//!
//! Tests drive the complete router in-process: sessions live in a
//! `MemoryStore`, documents in the in-memory document store, and checkout
//! animations run with millisecond steps.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Mutex;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde::Serialize;
use serde_json::Value;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use digitalhub_storefront::checkout::CheckoutSettings;
use digitalhub_storefront::config::StorefrontConfig;
use digitalhub_storefront::routes;
use digitalhub_storefront::state::AppState;

/// Password strong enough for every strength rule.
pub const PASSWORD: &str = "Str0ng!Passw0rd";

/// A response with its JSON body.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// The `data` field of a page response.
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    /// Messages of the notifications on screen.
    #[must_use]
    pub fn messages(&self) -> Vec<&str> {
        self.body["notifications"]
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|n| n["message"].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Path of the redirect the page reported, if any.
    #[must_use]
    pub fn redirect_path(&self) -> Option<&str> {
        self.body["redirect"]["path"].as_str()
    }
}

/// One browser talking to a freshly built storefront.
pub struct TestClient {
    router: Router,
    cookie: Mutex<Option<String>>,
}

impl TestClient {
    /// Build the storefront with in-memory collaborators.
    #[must_use]
    pub fn new() -> Self {
        Self::with_checkout(CheckoutSettings {
            step_interval: Duration::from_millis(1),
            final_pause: Duration::from_millis(1),
            ..CheckoutSettings::default()
        })
    }

    /// Build the storefront with the given checkout timings.
    #[must_use]
    pub fn with_checkout(checkout: CheckoutSettings) -> Self {
        let config = StorefrontConfig {
            checkout,
            ..StorefrontConfig::default()
        };
        let state = AppState::in_memory(config);

        Self {
            router: routes::app(state, MemoryStore::default()),
            cookie: Mutex::new(None),
        }
    }

    /// Send a GET request.
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, None).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.send(Method::DELETE, uri, None).await
    }

    /// Send a POST request with a JSON body.
    ///
    /// # Panics
    ///
    /// Panics if `body` does not serialize.
    pub async fn post<T: Serialize>(&self, uri: &str, body: &T) -> TestResponse {
        let json = serde_json::to_vec(body).expect("request body serializes");
        self.send(Method::POST, uri, Some(json)).await
    }

    /// Create an account and stay signed in.
    ///
    /// # Panics
    ///
    /// Panics if sign-up is rejected.
    pub async fn sign_up(&self, email: &str) -> TestResponse {
        let response = self
            .post(
                "/api/auth/signup",
                &serde_json::json!({
                    "name": "Ada Lovelace",
                    "email": email,
                    "password": PASSWORD,
                    "accept_terms": true,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
        response
    }

    async fn send(&self, method: Method, uri: &str, json: Option<Vec<u8>>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = self.cookie.lock().expect("cookie lock").clone() {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = match json {
            Some(bytes) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(bytes)
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("request builds");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        if let Some(set_cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            && let Some(pair) = set_cookie.split(';').next()
        {
            *self.cookie.lock().expect("cookie lock") = Some(pair.to_owned());
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}
