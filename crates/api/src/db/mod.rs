//! Database operations for the shop `PostgreSQL`.
//!
//! ## Tables
//!
//! - `users` - Accounts with a role bitmask
//! - `oauth` - Live sessions (access/refresh token pairs)
//! - `categories`, `products`, `products_categories`, `images` - Catalog
//! - `orders`, `products_orders` - Orders and lines (lines embed a product snapshot)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p ri-shop-cli -- migrate
//! ```

pub mod categories;
pub mod order_writer;
pub mod orders;
pub mod product_writer;
pub mod products;
pub mod query;
pub mod sessions;
pub mod users;

use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use categories::CategoryRepository;
pub use orders::OrderRepository;
pub use products::{ProductLookup, ProductRepository};
pub use sessions::SessionRepository;
pub use users::UserRepository;

use crate::config::DatabaseConfig;

/// Deadline for a single statement, and for each step of a write transaction.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Requested entity was not found.
    #[error("sql: no rows in result set")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("{0}")]
    Conflict(String),

    /// A statement did not finish within [`QUERY_TIMEOUT`].
    #[error("{0} timed out")]
    Timeout(&'static str),

    /// A transactional step ran out of order.
    #[error("transaction step out of order: {0}")]
    TransactionState(&'static str),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Run a database future under [`QUERY_TIMEOUT`].
///
/// Dropping the future on timeout cancels the in-flight statement.
pub(crate) async fn with_deadline<T, F>(step: &'static str, fut: F) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result.map_err(|e| {
            tracing::warn!(step, error = %e, "statement failed");
            RepositoryError::Database(e)
        }),
        Err(_) => {
            tracing::error!(step, "statement exceeded deadline");
            Err(RepositoryError::Timeout(step))
        }
    }
}

/// Create a `PostgreSQL` connection pool.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(config.url.expose_secret())
        .await
}
