//! User directory: maps identity-provider subjects to local roles

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};

use super::{DbPool, connection, parse_datetime, skip_corrupt};
use crate::{Error, Result};

/// Access role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    /// Parse a stored role; unknown values fall back to `User`
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "admin" => Self::Admin,
            _ => Self::User,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user known to the gateway
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// User repository
#[derive(Clone)]
pub struct UserRepo {
    pool: DbPool,
}

impl UserRepo {
    /// Create a new user repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Register a user, or update the role of an existing one
    ///
    /// # Errors
    ///
    /// Returns error if the id is empty or the database operation fails
    pub fn upsert(&self, id: &str, role: Role) -> Result<User> {
        if id.trim().is_empty() {
            return Err(Error::Validation("user id is required".to_string()));
        }

        let conn = connection(&self.pool)?;
        let now = Utc::now();

        conn.execute(
            "INSERT INTO users (id, role, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET role = excluded.role",
            rusqlite::params![id, role.as_str(), now.to_rfc3339()],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        drop(conn);
        self.find(id)?
            .ok_or_else(|| Error::Database(format!("user {id} missing after upsert")))
    }

    /// Find a user by ID (returns None if not found)
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find(&self, id: &str) -> Result<Option<User>> {
        let conn = connection(&self.pool)?;

        let user = conn
            .query_row(
                "SELECT id, role, created_at FROM users WHERE id = ?1",
                [id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        role: Role::from_str(&row.get::<_, String>(1)?),
                        created_at: parse_datetime(&row.get::<_, String>(2)?),
                    })
                },
            )
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(user)
    }

    /// List all users
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_all(&self) -> Result<Vec<User>> {
        let conn = connection(&self.pool)?;

        let mut stmt = conn
            .prepare("SELECT id, role, created_at FROM users ORDER BY created_at DESC")
            .map_err(|e| Error::Database(e.to_string()))?;

        let users = stmt
            .query_map([], |row| {
                Ok(User {
                    id: row.get(0)?,
                    role: Role::from_str(&row.get::<_, String>(1)?),
                    created_at: parse_datetime(&row.get::<_, String>(2)?),
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(skip_corrupt("users"))
            .collect();

        Ok(users)
    }

    /// Delete a user
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn delete(&self, id: &str) -> Result<bool> {
        let conn = connection(&self.pool)?;

        let deleted = conn
            .execute("DELETE FROM users WHERE id = ?1", [id])
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    #[test]
    fn test_upsert_and_find() {
        let repo = UserRepo::new(init_memory().unwrap());

        let user = repo.upsert("user-1", Role::User).unwrap();
        assert_eq!(user.id, "user-1");
        assert!(!user.is_admin());

        let promoted = repo.upsert("user-1", Role::Admin).unwrap();
        assert!(promoted.is_admin());
        assert_eq!(repo.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_find_missing() {
        let repo = UserRepo::new(init_memory().unwrap());
        assert!(repo.find("ghost").unwrap().is_none());
    }

    #[test]
    fn test_find_surfaces_database_errors() {
        let pool = init_memory().unwrap();
        pool.get().unwrap().execute_batch("DROP TABLE user_progress; DROP TABLE users;").unwrap();

        let repo = UserRepo::new(pool);
        assert!(matches!(repo.find("user-1"), Err(Error::Database(_))));
    }

    #[test]
    fn test_empty_id_rejected() {
        let repo = UserRepo::new(init_memory().unwrap());
        assert!(matches!(repo.upsert(" ", Role::User), Err(Error::Validation(_))));
    }

    #[test]
    fn test_delete() {
        let repo = UserRepo::new(init_memory().unwrap());
        repo.upsert("user-1", Role::User).unwrap();

        assert!(repo.delete("user-1").unwrap());
        assert!(!repo.delete("user-1").unwrap());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::from_str("admin"), Role::Admin);
        assert_eq!(Role::from_str("ADMIN"), Role::Admin);
        assert_eq!(Role::from_str("user"), Role::User);
        assert_eq!(Role::from_str("root"), Role::User);
    }
}
