//! Practice questions, grouped with articles by category

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{DbPool, connection, parse_datetime, skip_corrupt};
use crate::{Error, Result};

/// A stored practice question
#[derive(Debug, Clone, Serialize)]
pub struct PracticeQuestion {
    pub id: i64,
    pub title: String,
    pub link: String,
    pub difficulty: String,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new question
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewQuestion {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// Partial question update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionUpdate {
    pub title: Option<String>,
    pub link: Option<String>,
    pub difficulty: Option<String>,
    pub category: Option<String>,
}

impl QuestionUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.link.is_none()
            && self.difficulty.is_none()
            && self.category.is_none()
    }
}

const QUESTION_COLUMNS: &str = "id, title, link, difficulty, category, created_at, updated_at";

fn row_to_question(row: &Row<'_>) -> rusqlite::Result<PracticeQuestion> {
    Ok(PracticeQuestion {
        id: row.get(0)?,
        title: row.get(1)?,
        link: row.get(2)?,
        difficulty: row.get(3)?,
        category: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
        updated_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

/// Practice question repository
#[derive(Clone)]
pub struct QuestionRepo {
    pool: DbPool,
}

impl QuestionRepo {
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a question
    ///
    /// # Errors
    ///
    /// Returns error if a required field is empty or the insert fails
    pub fn create(&self, question: &NewQuestion) -> Result<PracticeQuestion> {
        if [&question.title, &question.link, &question.difficulty]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(Error::Validation("Missing required fields".to_string()));
        }

        let conn = connection(&self.pool)?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO practice_questions (title, link, difficulty, category, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            rusqlite::params![
                question.title,
                question.link,
                question.difficulty,
                question.category,
                now
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        let id = conn.last_insert_rowid();
        drop(conn);
        self.get(id)?
            .ok_or_else(|| Error::Database(format!("question {id} missing after insert")))
    }

    /// Get a question by ID
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, id: i64) -> Result<Option<PracticeQuestion>> {
        let conn = connection(&self.pool)?;

        conn.query_row(
            &format!("SELECT {QUESTION_COLUMNS} FROM practice_questions WHERE id = ?1"),
            [id],
            row_to_question,
        )
        .optional()
        .map_err(|e| Error::Database(e.to_string()))
    }

    /// Questions in a category
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_by_category(&self, category: &str) -> Result<Vec<PracticeQuestion>> {
        let conn = connection(&self.pool)?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {QUESTION_COLUMNS} FROM practice_questions WHERE category = ?1 ORDER BY id"
            ))
            .map_err(|e| Error::Database(e.to_string()))?;

        let questions = stmt
            .query_map([category], row_to_question)
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(skip_corrupt("practice_questions"))
            .collect();

        Ok(questions)
    }

    /// Apply a partial update; returns None if the question does not exist
    ///
    /// # Errors
    ///
    /// Returns error if the update is empty or the database operation fails
    pub fn update(&self, id: i64, update: &QuestionUpdate) -> Result<Option<PracticeQuestion>> {
        if update.is_empty() {
            return Err(Error::Validation("No update data provided".to_string()));
        }

        let conn = connection(&self.pool)?;

        let changed = conn
            .execute(
                "UPDATE practice_questions SET
                    title = COALESCE(?2, title),
                    link = COALESCE(?3, link),
                    difficulty = COALESCE(?4, difficulty),
                    category = COALESCE(?5, category),
                    updated_at = ?6
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    update.title,
                    update.link,
                    update.difficulty,
                    update.category,
                    Utc::now().to_rfc3339()
                ],
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        drop(conn);
        if changed == 0 {
            return Ok(None);
        }
        self.get(id)
    }

    /// Delete a question
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn delete(&self, id: i64) -> Result<bool> {
        let conn = connection(&self.pool)?;

        let deleted = conn
            .execute("DELETE FROM practice_questions WHERE id = ?1", [id])
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(deleted > 0)
    }
}
