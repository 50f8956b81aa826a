//! Category repository.

use std::fmt::Write as _;

use sqlx::PgPool;

use ri_shop_core::CategoryId;

use super::query::contains_pattern;
use super::{RepositoryError, with_deadline};
use crate::models::{Category, NewCategory};

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List categories, optionally filtered by a case-insensitive title
    /// substring.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find(&self, title: Option<&str>) -> Result<Vec<Category>, RepositoryError> {
        let pattern = contains_pattern(title.unwrap_or_default().trim());
        with_deadline(
            "find categories",
            sqlx::query_as::<_, Category>(
                r#"
                SELECT "id", "title"
                FROM "categories"
                WHERE LOWER("title") LIKE $1 ESCAPE '\'
                ORDER BY "id"
                "#,
            )
            .bind(pattern)
            .fetch_all(self.pool),
        )
        .await
    }

    /// Insert a batch of categories in one transaction, returning the new ids
    /// in input order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any step fails; the transaction
    /// is rolled back and no category is inserted.
    pub async fn insert_batch(
        &self,
        categories: &[NewCategory],
    ) -> Result<Vec<CategoryId>, RepositoryError> {
        if categories.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(r#"INSERT INTO "categories" ("title") VALUES "#);
        for i in 1..=categories.len() {
            if i > 1 {
                sql.push_str(", ");
            }
            let _ = write!(sql, "(${i})");
        }
        sql.push_str(r#" RETURNING "id""#);

        let mut tx = with_deadline("begin categories tx", self.pool.begin()).await?;

        let mut query = sqlx::query_scalar::<_, CategoryId>(&sql);
        for category in categories {
            query = query.bind(category.title.trim());
        }

        match with_deadline("insert categories", query.fetch_all(&mut *tx)).await {
            Ok(ids) => {
                with_deadline("commit categories tx", tx.commit()).await?;
                tracing::info!(count = ids.len(), "categories inserted");
                Ok(ids)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::error!(error = %rollback, "rollback categories tx failed");
                }
                Err(e)
            }
        }
    }

    /// Delete a category by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no row was affected.
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = with_deadline(
            "delete category",
            sqlx::query(r#"DELETE FROM "categories" WHERE "id" = $1"#)
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
