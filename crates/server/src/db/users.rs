//! User directory repository.
//!
//! The directory itself is an external collaborator; this repository is
//! the engine's read/seed interface to it: role lookup for authorization
//! and bearer-token resolution for the auth extractors.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use sandpiper_core::UserId;

use super::RepositoryError;
use crate::models::{CurrentUser, User};

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    is_admin: bool,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_domain(self) -> Result<User, RepositoryError> {
        let id = UserId::parse_str(&self.id).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid user id in database: {e}"))
        })?;
        Ok(User {
            id,
            name: self.name,
            email: self.email,
            is_admin: self.is_admin,
            created_at: self.created_at,
        })
    }
}

/// Repository for user directory operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a directory entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email or token already
    /// exists, `RepositoryError::Database` for other database errors.
    pub async fn insert(
        &self,
        name: &str,
        email: &str,
        is_admin: bool,
        api_token: &str,
    ) -> Result<User, RepositoryError> {
        let user = User {
            id: UserId::new(),
            name: name.to_owned(),
            email: email.to_owned(),
            is_admin,
            created_at: Utc::now(),
        };

        sqlx::query(
            r"
            INSERT INTO users (id, name, email, is_admin, api_token, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.is_admin)
        .bind(api_token)
        .bind(user.created_at)
        .execute(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("email or token already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        Ok(user)
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails,
    /// `RepositoryError::DataCorruption` if the stored id is invalid.
    pub async fn get(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, name, email, is_admin, created_at
            FROM users
            WHERE id = ?
            ",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await?;

        row.map(UserRow::into_domain).transpose()
    }

    /// Resolve a bearer token to the current actor.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails,
    /// `RepositoryError::DataCorruption` if the stored id is invalid.
    pub async fn get_by_token(&self, token: &str) -> Result<Option<CurrentUser>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, name, email, is_admin, created_at
            FROM users
            WHERE api_token = ?
            ",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| {
            let user = r.into_domain()?;
            Ok(CurrentUser {
                id: user.id,
                name: user.name,
                email: user.email,
                is_admin: user.is_admin,
            })
        })
        .transpose()
    }
}
