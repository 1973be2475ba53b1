//! HTTP API server for the tutor gateway

mod auth;
pub mod chat;
pub mod content;
pub mod error;
pub mod health;
pub mod rate_limit;
pub mod users;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::chat::ChatManager;
use crate::db::{ArticleRepo, DbPool, InteractionRepo, ProgressRepo, QuestionRepo, UserRepo};
use crate::security::IdentityProvider;

pub use auth::AuthUser;
pub use error::ApiError;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub db: DbPool,
    pub users: UserRepo,
    pub articles: ArticleRepo,
    pub questions: QuestionRepo,
    pub progress: ProgressRepo,
    pub interactions: InteractionRepo,
    pub chat: Arc<ChatManager>,
    pub identity: Arc<dyn IdentityProvider>,
    pub chat_limiter: Option<rate_limit::SharedLimiter>,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    db: DbPool,
    chat: Arc<ChatManager>,
    identity: Arc<dyn IdentityProvider>,
    port: u16,
    chat_requests_per_minute: Option<u32>,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(
        db: DbPool,
        chat: Arc<ChatManager>,
        identity: Arc<dyn IdentityProvider>,
        port: u16,
    ) -> Self {
        Self {
            db,
            chat,
            identity,
            port,
            chat_requests_per_minute: None,
        }
    }

    /// Limit chat requests per user per minute (`None` disables the limit)
    #[must_use]
    pub const fn chat_rate_limit(mut self, requests_per_minute: Option<u32>) -> Self {
        self.chat_requests_per_minute = requests_per_minute;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let chat_limiter = self.chat_requests_per_minute.map(rate_limit::create_limiter);

        let state = Arc::new(ApiState {
            users: UserRepo::new(self.db.clone()),
            articles: ArticleRepo::new(self.db.clone()),
            questions: QuestionRepo::new(self.db.clone()),
            progress: ProgressRepo::new(self.db.clone()),
            interactions: InteractionRepo::new(self.db.clone()),
            db: self.db,
            chat: self.chat,
            identity: self.identity,
            chat_limiter,
        });

        ApiServer {
            state,
            port: self.port,
        }
    }
}

/// Build the router with all routes
pub fn build_router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(chat::router(state.clone()))
        .merge(content::router(state.clone()))
        .nest("/users", users::router(state.clone()))
        .merge(health::router())
        .merge(health::ready_router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Shared handler state
    #[must_use]
    pub fn state(&self) -> Arc<ApiState> {
        self.state.clone()
    }

    /// Router serving this server's state
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(
            port = self.port,
            rate_limited = self.state.chat_limiter.is_some(),
            "API server listening"
        );

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }
}
