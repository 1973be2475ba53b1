//! Durable chat interaction log

use uuid::Uuid;

use super::{DbPool, connection, parse_datetime, skip_corrupt};
use crate::chat::{Interaction, InteractionLog};
use crate::{Error, Result};

/// Default number of interactions returned by [`InteractionRepo::list_for_user`]
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Interaction repository backed by `chatbot_interactions`
#[derive(Clone)]
pub struct InteractionRepo {
    pool: DbPool,
}

impl InteractionRepo {
    /// Create a new interaction repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// A user's interactions, newest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<Interaction>> {
        let conn = connection(&self.pool)?;

        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, user_query, bot_response, timestamp
                 FROM chatbot_interactions
                 WHERE user_id = ?1
                 ORDER BY timestamp DESC, rowid DESC
                 LIMIT ?2",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let interactions = stmt
            .query_map(rusqlite::params![user_id, limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(skip_corrupt("chatbot_interactions"))
            .filter_map(|(id, user_id, query, reply, timestamp)| {
                let id = Uuid::parse_str(&id)
                    .inspect_err(|e| {
                        tracing::warn!(id = %id, error = %e, "skipping interaction with invalid id");
                    })
                    .ok()?;
                Some(Interaction {
                    id,
                    user_id,
                    query,
                    reply,
                    timestamp: parse_datetime(&timestamp),
                })
            })
            .collect();

        Ok(interactions)
    }

    /// Number of interactions stored for a user
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count_for_user(&self, user_id: &str) -> Result<usize> {
        let conn = connection(&self.pool)?;

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM chatbot_interactions WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(usize::try_from(count).unwrap_or(0))
    }
}

impl InteractionLog for InteractionRepo {
    fn append(&self, interaction: &Interaction) -> Result<()> {
        let conn = connection(&self.pool)
            .map_err(|e| Error::Persistence(e.to_string()))?;

        conn.execute(
            "INSERT INTO chatbot_interactions (id, user_id, user_query, bot_response, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            [
                &interaction.id.to_string(),
                &interaction.user_id,
                &interaction.query,
                &interaction.reply,
                &interaction.timestamp.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Persistence(e.to_string()))?;

        tracing::debug!(id = %interaction.id, user_id = %interaction.user_id, "interaction stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::db::init_memory;

    #[test]
    fn test_append_and_list() {
        let repo = InteractionRepo::new(init_memory().unwrap());

        let first = Interaction::new("user-1", "What is a heap?", "A tree-based structure.");
        let mut second = Interaction::new("user-1", "And a stack?", "LIFO.");
        second.timestamp = first.timestamp + Duration::seconds(1);

        repo.append(&first).unwrap();
        repo.append(&second).unwrap();
        repo.append(&Interaction::new("user-2", "q", "r")).unwrap();

        let listed = repo.list_for_user("user-1", DEFAULT_HISTORY_LIMIT).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].query, "What is a heap?");
        assert_eq!(repo.count_for_user("user-1").unwrap(), 2);
        assert_eq!(repo.count_for_user("user-2").unwrap(), 1);
    }

    #[test]
    fn test_unreadable_rows_are_skipped() {
        let pool = init_memory().unwrap();
        let repo = InteractionRepo::new(pool.clone());
        let good = Interaction::new("user-1", "q", "r");
        repo.append(&good).unwrap();

        pool.get()
            .unwrap()
            .execute_batch(
                "INSERT INTO chatbot_interactions VALUES ('not-a-uuid', 'user-1', 'q', 'r', '2024-01-01T00:00:00Z');
                 INSERT INTO chatbot_interactions VALUES ('7d9f6c1e-0000-4000-8000-000000000001', 'user-1', X'00', 'r', '2024-01-01T00:00:00Z');",
            )
            .unwrap();

        let listed = repo.list_for_user("user-1", DEFAULT_HISTORY_LIMIT).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, good.id);
        assert_eq!(repo.count_for_user("user-1").unwrap(), 3);
    }

    #[test]
    fn test_list_respects_limit() {
        let repo = InteractionRepo::new(init_memory().unwrap());
        let base = Utc::now();

        for i in 0..5 {
            let mut interaction = Interaction::new("user-1", &format!("q{i}"), "r");
            interaction.timestamp = base + Duration::seconds(i);
            repo.append(&interaction).unwrap();
        }

        let listed = repo.list_for_user("user-1", 2).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].query, "q4");
        assert_eq!(listed[1].query, "q3");
    }

    #[test]
    fn test_duplicate_id_is_persistence_error() {
        let repo = InteractionRepo::new(init_memory().unwrap());
        let interaction = Interaction::new("user-1", "q", "r");

        repo.append(&interaction).unwrap();
        assert!(matches!(repo.append(&interaction), Err(Error::Persistence(_))));
    }
}
