//! Learning articles

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{DbPool, connection, parse_datetime, skip_corrupt};
use crate::{Error, Result};

/// A stored article
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub gif_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new article
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewArticle {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub gif_url: Option<String>,
}

/// Partial article update; `None` leaves the column unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub gif_url: Option<String>,
}

impl ArticleUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.category.is_none()
            && self.image_url.is_none()
            && self.gif_url.is_none()
    }
}

const ARTICLE_COLUMNS: &str =
    "id, title, content, category, image_url, gif_url, created_at, updated_at";

fn row_to_article(row: &Row<'_>) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        category: row.get(3)?,
        image_url: row.get(4)?,
        gif_url: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

/// Article repository
#[derive(Clone)]
pub struct ArticleRepo {
    pool: DbPool,
}

impl ArticleRepo {
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create an article
    ///
    /// # Errors
    ///
    /// Returns error if title or content is empty, or the insert fails
    pub fn create(&self, article: &NewArticle) -> Result<Article> {
        if article.title.trim().is_empty() || article.content.trim().is_empty() {
            return Err(Error::Validation("Missing required fields".to_string()));
        }

        let conn = connection(&self.pool)?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO articles (id, title, content, category, image_url, gif_url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            rusqlite::params![
                id,
                article.title,
                article.content,
                article.category,
                article.image_url,
                article.gif_url,
                now
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        drop(conn);
        self.get(&id)?
            .ok_or_else(|| Error::Database(format!("article {id} missing after insert")))
    }

    /// Get an article by ID
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, id: &str) -> Result<Option<Article>> {
        let conn = connection(&self.pool)?;

        conn.query_row(
            &format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?1"),
            [id],
            row_to_article,
        )
        .optional()
        .map_err(|e| Error::Database(e.to_string()))
    }

    /// List all articles, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list(&self) -> Result<Vec<Article>> {
        let conn = connection(&self.pool)?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {ARTICLE_COLUMNS} FROM articles ORDER BY created_at ASC"
            ))
            .map_err(|e| Error::Database(e.to_string()))?;

        let articles = stmt
            .query_map([], row_to_article)
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(skip_corrupt("articles"))
            .collect();

        Ok(articles)
    }

    /// Apply a partial update; returns None if the article does not exist
    ///
    /// # Errors
    ///
    /// Returns error if the update is empty or the database operation fails
    pub fn update(&self, id: &str, update: &ArticleUpdate) -> Result<Option<Article>> {
        if update.is_empty() {
            return Err(Error::Validation("No update data provided".to_string()));
        }

        let conn = connection(&self.pool)?;

        let changed = conn
            .execute(
                "UPDATE articles SET
                    title = COALESCE(?2, title),
                    content = COALESCE(?3, content),
                    category = COALESCE(?4, category),
                    image_url = COALESCE(?5, image_url),
                    gif_url = COALESCE(?6, gif_url),
                    updated_at = ?7
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    update.title,
                    update.content,
                    update.category,
                    update.image_url,
                    update.gif_url,
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

    /// Delete an article
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn delete(&self, id: &str) -> Result<bool> {
        let conn = connection(&self.pool)?;

        let deleted = conn
            .execute("DELETE FROM articles WHERE id = ?1", [id])
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(deleted > 0)
    }
}
