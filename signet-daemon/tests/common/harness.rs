//! Test harness for daemon E2E tests.
//!
//! Drives the real router in-process with `tower::ServiceExt::oneshot`
//! (no network) over a private in-memory SQLite database.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use signet_auth::{ChallengeNonce, PrivateKey, SenderPolicy};
use signet_daemon::{router, AppState, Database, ServerConfig};
use tower::ServiceExt;

pub const TEST_SECRET: &str = "signet-test-secret-0123456789abcdef";

/// Config suitable for tests: fixed secret, generous rate limit.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        token_secret: Some(TEST_SECRET.to_string()),
        sender_policy: SenderPolicy::RegisteredOnly,
        rate_per_second: 1000,
        rate_burst: 1000,
        ..ServerConfig::default()
    }
}

/// In-process daemon.
pub struct TestDaemon {
    pub state: Arc<AppState>,
    pub db: Database,
    router: Router,
}

/// A registered user holding their private key.
pub struct TestUser {
    pub username: String,
    pub key: PrivateKey,
}

impl TestUser {
    pub fn public_key_hex(&self) -> String {
        self.key.public_key().to_hex()
    }

    /// Sign `payload` into a protected-request envelope.
    pub fn envelope(&self, payload: &str) -> Value {
        let sig = self.key.sign_message(payload.as_bytes());
        json!({
            "encryptedData": payload,
            "signature": { "r": sig.r_hex(), "s": sig.s_hex() },
            "senderPublicKey": self.public_key_hex(),
        })
    }

    /// Answer a login challenge.
    pub fn answer(&self, nonce_hex: &str) -> Value {
        let nonce = ChallengeNonce::from_hex(nonce_hex).expect("nonce is hex");
        let sig = self.key.sign_digest(&nonce.signing_digest());
        json!({ "r": sig.r_hex(), "s": sig.s_hex() })
    }
}

impl TestDaemon {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: ServerConfig) -> Self {
        let db = Database::in_memory()
            .await
            .expect("Failed to create in-memory database");
        let state = Arc::new(
            AppState::new(&db, &config)
                .await
                .expect("Failed to build app state"),
        );
        Self {
            router: router(Arc::clone(&state)),
            state,
            db,
        }
    }

    /// Send a request and decode the JSON response (`Null` for empty bodies).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Vec<u8>>,
    ) -> (StatusCode, Value) {
        self.send_from(None, method, uri, token, body).await
    }

    /// Like [`send`](Self::send), with the connection's peer address set the
    /// way `into_make_service_with_connect_info` sets it.
    pub async fn send_from(
        &self,
        peer: Option<SocketAddr>,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Vec<u8>>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(peer) = peer {
            builder = builder.extension(ConnectInfo(peer));
        }
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(bytes) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(bytes)),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("JSON response body")
        };
        (status, value)
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: &Value) -> (StatusCode, Value) {
        let bytes = serde_json::to_vec(body).expect("serializable body");
        self.send(Method::POST, uri, token, Some(bytes)).await
    }

    pub async fn post_raw(&self, uri: &str, token: Option<&str>, body: &str) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body.as_bytes().to_vec()))
            .await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    /// Register a fresh user with a new key.
    pub async fn register(&self, username: &str) -> TestUser {
        let user = TestUser {
            username: username.to_string(),
            key: PrivateKey::generate(),
        };
        let (status, body) = self
            .post(
                "/auth/register",
                None,
                &json!({ "username": username, "publicKey": user.public_key_hex() }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register {username}: {body}");
        user
    }

    /// Request a challenge; returns the nonce hex.
    pub async fn challenge(&self, username: &str) -> String {
        let (status, body) = self
            .post("/auth/login/challenge", None, &json!({ "username": username }))
            .await;
        assert_eq!(status, StatusCode::OK, "challenge {username}: {body}");
        body["nonce"].as_str().expect("nonce string").to_string()
    }

    /// Full challenge-response login; returns the session token.
    pub async fn login(&self, user: &TestUser) -> String {
        let nonce = self.challenge(&user.username).await;
        let (status, body) = self
            .post(
                "/auth/login",
                None,
                &json!({ "username": user.username, "signature": user.answer(&nonce) }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login {}: {body}", user.username);
        body["token"].as_str().expect("token string").to_string()
    }
}
