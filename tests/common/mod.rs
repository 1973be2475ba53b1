//! Shared test utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use tower::ServiceExt;
use tutor_gateway::api::ApiServerBuilder;
use tutor_gateway::chat::MemorySessionStore;
use tutor_gateway::db::{self, InteractionRepo, Role, UserRepo};
use tutor_gateway::{ChatManager, CompletionClient, DbPool, Error, IdentityProvider, Message, Result};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Register a user in the local directory
pub fn create_test_user(db: &DbPool, id: &str, role: Role) -> tutor_gateway::db::User {
    UserRepo::new(db.clone())
        .upsert(id, role)
        .expect("failed to create test user")
}

/// Completion client answering `reply N` and recording every request
#[derive(Default)]
pub struct FakeCompletion {
    pub calls: Mutex<Vec<Vec<Message>>>,
    pub fail: bool,
}

impl FakeCompletion {
    pub fn failing() -> Self {
        Self {
            calls: Mutex::default(),
            fail: true,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> Vec<Message> {
        self.calls.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for FakeCompletion {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(messages.to_vec());
        if self.fail {
            return Err(Error::Upstream("completion API error 503".to_string()));
        }
        Ok(format!("reply {}", calls.len()))
    }
}

/// Identity provider treating `token-<id>` as a valid token for `<id>`
pub struct StaticIdentity;

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn verify(&self, token: &str) -> Result<String> {
        token
            .strip_prefix("token-")
            .map(str::to_string)
            .ok_or_else(|| Error::Auth("unknown token".to_string()))
    }
}

/// Bearer header value for a user id
pub fn bearer(user_id: &str) -> String {
    format!("Bearer token-{user_id}")
}

/// Chat manager over an in-memory session store and the database log
pub fn build_chat(db: &DbPool, completion: Arc<FakeCompletion>) -> Arc<ChatManager> {
    Arc::new(ChatManager::new(
        Arc::new(MemorySessionStore::default()),
        completion,
        Arc::new(InteractionRepo::new(db.clone())),
    ))
}

/// Build a test API router
pub fn build_test_router(db: DbPool, completion: Arc<FakeCompletion>) -> Router {
    build_test_router_with_limit(db, completion, None)
}

/// Build a test API router with a per-user chat rate limit
pub fn build_test_router_with_limit(
    db: DbPool,
    completion: Arc<FakeCompletion>,
    requests_per_minute: Option<u32>,
) -> Router {
    let chat = build_chat(&db, completion);
    ApiServerBuilder::new(db, chat, Arc::new(StaticIdentity), 0)
        .chat_rate_limit(requests_per_minute)
        .build()
        .router()
}

/// Send a request and return status plus parsed JSON body
pub async fn send(app: &Router, request: Request<Body>) -> (axum::http::StatusCode, serde_json::Value) {
    let response: Response<Body> = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

/// JSON request with an optional bearer token
pub fn json_request(method: &str, uri: &str, user_id: Option<&str>, body: &serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(id) = user_id {
        builder = builder.header("authorization", bearer(id));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Bodiless request with an optional bearer token
pub fn empty_request(method: &str, uri: &str, user_id: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = user_id {
        builder = builder.header("authorization", bearer(id));
    }
    builder.body(Body::empty()).unwrap()
}
