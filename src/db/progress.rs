//! Per-user learning progress

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{DbPool, connection, parse_datetime, skip_corrupt};
use crate::{Error, Result};

/// One progress entry
#[derive(Debug, Clone, Serialize)]
pub struct Progress {
    pub id: String,
    pub user_id: String,
    pub article_id: Option<String>,
    pub question_id: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// Progress repository
#[derive(Clone)]
pub struct ProgressRepo {
    pool: DbPool,
}

impl ProgressRepo {
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record that a user completed a question
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn mark_question(&self, user_id: &str, question_id: &str) -> Result<Progress> {
        self.record(user_id, None, Some(question_id))
    }

    /// Record that a user read an article
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn mark_article(&self, user_id: &str, article_id: &str) -> Result<Progress> {
        self.record(user_id, Some(article_id), None)
    }

    fn record(
        &self,
        user_id: &str,
        article_id: Option<&str>,
        question_id: Option<&str>,
    ) -> Result<Progress> {
        let conn = connection(&self.pool)?;
        let progress = Progress {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            article_id: article_id.map(str::to_string),
            question_id: question_id.map(str::to_string),
            completed_at: Utc::now(),
        };

        conn.execute(
            "INSERT INTO user_progress (id, user_id, article_id, question_id, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                progress.id,
                progress.user_id,
                progress.article_id,
                progress.question_id,
                progress.completed_at.to_rfc3339()
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(progress)
    }

    /// All progress entries for a user, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<Progress>> {
        let conn = connection(&self.pool)?;

        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, article_id, question_id, completed_at
                 FROM user_progress WHERE user_id = ?1 ORDER BY completed_at ASC, rowid ASC",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let entries = stmt
            .query_map([user_id], |row| {
                Ok(Progress {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    article_id: row.get(2)?,
                    question_id: row.get(3)?,
                    completed_at: parse_datetime(&row.get::<_, String>(4)?),
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(skip_corrupt("user_progress"))
            .collect();

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Role, UserRepo, init_memory};

    #[test]
    fn test_mark_and_list() {
        let pool = init_memory().unwrap();
        let users = UserRepo::new(pool.clone());
        users.upsert("user-1", Role::User).unwrap();
        users.upsert("user-2", Role::User).unwrap();

        let repo = ProgressRepo::new(pool);
        repo.mark_question("user-1", "7").unwrap();
        repo.mark_article("user-1", "article-1").unwrap();
        repo.mark_question("user-2", "7").unwrap();

        let entries = repo.list_for_user("user-1").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].question_id.as_deref(), Some("7"));
        assert!(entries[0].article_id.is_none());
        assert_eq!(entries[1].article_id.as_deref(), Some("article-1"));
    }

    #[test]
    fn test_empty_progress() {
        let repo = ProgressRepo::new(init_memory().unwrap());
        assert!(repo.list_for_user("nobody").unwrap().is_empty());
    }
}
