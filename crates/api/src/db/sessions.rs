//! Session store backed by the `oauth` table.
//!
//! A bearer token is only honored while a row binds it to its user, so
//! deleting the row revokes the session.

use sqlx::PgPool;

use ri_shop_core::{OauthId, UserId};

use super::{RepositoryError, with_deadline};

/// A live session row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Session {
    pub id: OauthId,
    pub user_id: UserId,
    pub access_token: String,
    pub refresh_token: String,
}

/// Repository for `oauth` rows.
pub struct SessionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Persist a new session and return its id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert(
        &self,
        user_id: &UserId,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<OauthId, RepositoryError> {
        with_deadline(
            "insert session",
            sqlx::query_scalar::<_, OauthId>(
                r#"
                INSERT INTO "oauth" ("user_id", "access_token", "refresh_token")
                VALUES ($1, $2, $3)
                RETURNING "id"
                "#,
            )
            .bind(user_id)
            .bind(access_token)
            .bind(refresh_token)
            .fetch_one(self.pool),
        )
        .await
    }

    /// Whether `access_token` belongs to a live session of `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_access(
        &self,
        user_id: &UserId,
        access_token: &str,
    ) -> Result<bool, RepositoryError> {
        with_deadline(
            "find session by access token",
            sqlx::query_scalar::<_, bool>(
                r#"
                SELECT EXISTS (
                    SELECT 1 FROM "oauth"
                    WHERE "user_id" = $1 AND "access_token" = $2
                )
                "#,
            )
            .bind(user_id)
            .bind(access_token)
            .fetch_one(self.pool),
        )
        .await
    }

    /// Look up the session holding `refresh_token`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no session holds the token.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_refresh(&self, refresh_token: &str) -> Result<Session, RepositoryError> {
        with_deadline(
            "find session by refresh token",
            sqlx::query_as::<_, Session>(
                r#"
                SELECT "id", "user_id", "access_token", "refresh_token"
                FROM "oauth"
                WHERE "refresh_token" = $1
                "#,
            )
            .bind(refresh_token)
            .fetch_optional(self.pool),
        )
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Replace both tokens of a session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the session no longer exists.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update_tokens(&self, session: &Session) -> Result<(), RepositoryError> {
        let result = with_deadline(
            "update session",
            sqlx::query(
                r#"
                UPDATE "oauth"
                SET "access_token" = $2, "refresh_token" = $3
                WHERE "id" = $1
                "#,
            )
            .bind(&session.id)
            .bind(&session.access_token)
            .bind(&session.refresh_token)
            .execute(self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no session has this id.
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: &OauthId) -> Result<(), RepositoryError> {
        let result = with_deadline(
            "delete session",
            sqlx::query(r#"DELETE FROM "oauth" WHERE "id" = $1"#)
                .bind(id)
                .execute(self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
