//! Tutor chat endpoints

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    middleware,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiState, auth, auth::AuthUser, error::ApiError, rate_limit};
use crate::chat::Interaction;
use crate::db::interaction::DEFAULT_HISTORY_LIMIT;

/// Upper bound for `?limit=` on history reads
const MAX_HISTORY_LIMIT: usize = 500;

/// Chat request body
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default, alias = "user_query")]
    pub query: Option<String>,
    /// Must match the authenticated user when present
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Chat response body
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub interaction_id: Uuid,
    pub query: String,
    pub reply: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

/// Build chat router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route(
            "/chat",
            post(send_message).route_layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit::limit_per_user,
            )),
        )
        .route("/chat/history", get(history))
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_user))
        .with_state(state)
}

async fn send_message(
    State(state): State<Arc<ApiState>>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = body.map_err(|e| {
        tracing::debug!(error = %e, "rejected chat body");
        ApiError::bad_request("User query and user ID are required")
    })?;

    if let Some(claimed) = request.user_id.as_deref() {
        if claimed != user.id {
            tracing::warn!(user_id = %user.id, claimed = %claimed, "chat user_id mismatch");
            return Err(ApiError::forbidden("user_id does not match token"));
        }
    }

    let query = request.query.unwrap_or_default();
    let interaction = state.chat.handle_query(&user.id, &query).await?;

    Ok(Json(ChatResponse {
        interaction_id: interaction.id,
        query: interaction.query,
        reply: interaction.reply,
    }))
}

async fn history(
    State(state): State<Arc<ApiState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<Interaction>>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);

    Ok(Json(state.interactions.list_for_user(&user.id, limit)?))
}
