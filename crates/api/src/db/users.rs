//! User repository.
//!
//! Sign-up has one insert per strategy so that admin-only policy can grow on
//! its own path without branching inside a shared statement.

use sqlx::PgPool;

use ri_shop_core::{Email, Role, UserId};

use super::{RepositoryError, with_deadline};
use crate::models::{User, UserCredentialCheck};

/// Unique constraint on `users.email`.
const EMAIL_UNIQUE: &str = "users_email_key";
/// Unique constraint on `users.username`.
const USERNAME_UNIQUE: &str = "users_username_key";

pub const EMAIL_TAKEN: &str = "email has been used";
pub const USERNAME_TAKEN: &str = "username has been used";

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a customer account (`role_id = 1`).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` with `email has been used` or
    /// `username has been used` on a uniqueness violation.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn insert_customer(
        &self,
        email: &Email,
        password_hash: &str,
        username: &str,
    ) -> Result<User, RepositoryError> {
        self.insert(email, password_hash, username, Role::Customer)
            .await
    }

    /// Insert an admin account (`role_id = 2`).
    ///
    /// # Errors
    ///
    /// Same as [`Self::insert_customer`].
    pub async fn insert_admin(
        &self,
        email: &Email,
        password_hash: &str,
        username: &str,
    ) -> Result<User, RepositoryError> {
        self.insert(email, password_hash, username, Role::Admin).await
    }

    async fn insert(
        &self,
        email: &Email,
        password_hash: &str,
        username: &str,
        role: Role,
    ) -> Result<User, RepositoryError> {
        let result = tokio::time::timeout(
            super::QUERY_TIMEOUT,
            sqlx::query_as::<_, User>(
                r#"
                INSERT INTO "users" ("email", "password_hash", "username", "role_id")
                VALUES ($1, $2, $3, $4)
                RETURNING "id", "email", "username", "role_id"
                "#,
            )
            .bind(email)
            .bind(password_hash)
            .bind(username)
            .bind(role.bit())
            .fetch_one(self.pool),
        )
        .await
        .map_err(|_| RepositoryError::Timeout("insert user"))?;

        result.map_err(classify_unique_violation)
    }

    /// Look up a user and their password hash by email, for sign-in.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<UserCredentialCheck>, RepositoryError> {
        with_deadline(
            "find user credentials",
            sqlx::query_as::<_, UserCredentialCheck>(
                r#"
                SELECT "id", "email", "username", "role_id", "password_hash"
                FROM "users"
                WHERE "email" = $1
                "#,
            )
            .bind(email)
            .fetch_optional(self.pool),
        )
        .await
    }

    /// Get a user by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        with_deadline(
            "find user",
            sqlx::query_as::<_, User>(
                r#"
                SELECT "id", "email", "username", "role_id"
                FROM "users"
                WHERE "id" = $1
                "#,
            )
            .bind(id)
            .fetch_optional(self.pool),
        )
        .await
    }
}

fn classify_unique_violation(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return match db_err.constraint() {
            Some(USERNAME_UNIQUE) => RepositoryError::Conflict(USERNAME_TAKEN.to_owned()),
            Some(EMAIL_UNIQUE) | None => RepositoryError::Conflict(EMAIL_TAKEN.to_owned()),
            Some(other) => RepositoryError::Conflict(format!("{other} has been used")),
        };
    }
    tracing::warn!(error = %e, "insert user failed");
    RepositoryError::Database(e)
}
