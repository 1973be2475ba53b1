//! Reader-facing content and progress endpoints

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    middleware,
    routing::{get, post},
};
use serde::Serialize;

use super::{ApiState, auth, auth::AuthUser, error::ApiError};
use crate::db::{Article, PracticeQuestion, Progress};

/// An article with the practice questions sharing its category
#[derive(Serialize)]
pub struct RelatedQuestions {
    pub article: Article,
    pub related_questions: Vec<PracticeQuestion>,
}

/// Build reader router (nested under `/users`)
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/articles", get(list_articles))
        .route("/articles/{id}/questions", get(related_questions))
        .route("/questions/{id}/mark-read", post(mark_read))
        .route("/user/progress", get(progress))
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_user))
        .with_state(state)
}

async fn list_articles(State(state): State<Arc<ApiState>>) -> Result<Json<Vec<Article>>, ApiError> {
    Ok(Json(state.articles.list()?))
}

async fn related_questions(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<RelatedQuestions>, ApiError> {
    let article = state
        .articles
        .get(&id)?
        .ok_or_else(|| ApiError::not_found("Article not found"))?;

    let Some(category) = article.category.as_deref().filter(|c| !c.is_empty()) else {
        return Err(ApiError::bad_request("Article does not have a category"));
    };

    let related_questions = state.questions.list_by_category(category)?;
    Ok(Json(RelatedQuestions {
        article,
        related_questions,
    }))
}

async fn mark_read(
    State(state): State<Arc<ApiState>>,
    Extension(user): Extension<AuthUser>,
    Path(question_id): Path<String>,
) -> Result<Json<Progress>, ApiError> {
    let entry = state.progress.mark_question(&user.id, &question_id)?;
    tracing::debug!(user_id = %user.id, question_id = %question_id, "question marked read");
    Ok(Json(entry))
}

async fn progress(
    State(state): State<Arc<ApiState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Progress>>, ApiError> {
    Ok(Json(state.progress.list_for_user(&user.id)?))
}
