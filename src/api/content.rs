//! Admin management of articles and practice questions

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    middleware,
    routing::{post, put},
};
use serde_json::{Value, json};

use super::{ApiState, auth, auth::AuthUser, error::ApiError};
use crate::db::{ArticleUpdate, NewArticle, NewQuestion, QuestionUpdate};

/// Build content management router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/articles", post(create_article))
        .route("/articles/{id}", put(update_article).delete(delete_article))
        .route("/questions", post(create_question))
        .route("/questions/{id}", put(update_question).delete(delete_question))
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_user))
        .with_state(state)
}

/// Unwrap a JSON body, answering malformed input with `message`
fn parse_body<T>(body: Result<Json<T>, JsonRejection>, message: &str) -> Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(|e| {
        tracing::debug!(error = %e, "rejected content body");
        ApiError::bad_request(message)
    })
}

async fn create_article(
    State(state): State<Arc<ApiState>>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<NewArticle>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    user.require_admin()?;
    let article = parse_body(body, "Missing required fields")?;

    let created = state.articles.create(&article)?;
    tracing::info!(article_id = %created.id, admin = %user.id, "article created");

    Ok(Json(json!({ "message": "Article added successfully!", "data": created })))
}

async fn update_article(
    State(state): State<Arc<ApiState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    body: Result<Json<ArticleUpdate>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    user.require_admin()?;
    let update = parse_body(body, "No update data provided")?;

    let updated = state
        .articles
        .update(&id, &update)?
        .ok_or_else(|| ApiError::not_found("Article not found"))?;

    Ok(Json(json!({ "message": "Article updated successfully!", "data": updated })))
}

async fn delete_article(
    State(state): State<Arc<ApiState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    user.require_admin()?;

    if !state.articles.delete(&id)? {
        return Err(ApiError::not_found("Article not found"));
    }
    tracing::info!(article_id = %id, admin = %user.id, "article deleted");

    Ok(Json(json!({ "message": "Article deleted successfully!" })))
}

async fn create_question(
    State(state): State<Arc<ApiState>>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<NewQuestion>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    user.require_admin()?;
    let question = parse_body(body, "Missing required fields")?;

    let created = state.questions.create(&question)?;
    tracing::info!(question_id = created.id, admin = %user.id, "question created");

    Ok(Json(json!({ "message": "Question added successfully!", "data": created })))
}

async fn update_question(
    State(state): State<Arc<ApiState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    body: Result<Json<QuestionUpdate>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    user.require_admin()?;
    let update = parse_body(body, "No update data provided")?;

    let updated = state
        .questions
        .update(id, &update)?
        .ok_or_else(|| ApiError::not_found("Question not found"))?;

    Ok(Json(json!({ "message": "Question updated successfully!", "data": updated })))
}

async fn delete_question(
    State(state): State<Arc<ApiState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    user.require_admin()?;

    if !state.questions.delete(id)? {
        return Err(ApiError::not_found("Question not found"));
    }

    Ok(Json(json!({ "message": "Question deleted successfully!" })))
}
