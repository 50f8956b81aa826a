//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! ri-shop-cli migrate
//! ri-shop-cli --env prod.env migrate
//! ```
//!
//! Migrations live in `crates/api/migrations/` and are embedded at compile
//! time.

use std::path::Path;

use super::{CommandError, connect};

/// Apply all pending migrations.
///
/// # Errors
///
/// Returns `CommandError` if the database is unreachable or a migration fails.
pub async fn run(env_file: &Path) -> Result<(), CommandError> {
    let pool = connect(env_file).await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
