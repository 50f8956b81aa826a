//! Seed the fixture catalog.
//!
//! Inserts the categories and products the integration tests read,
//! including `P000001` (Coffee) with three images. Re-running is a no-op.

use std::path::Path;

use super::{CommandError, connect};

const CATALOG: &str = include_str!("../../../api/seeds/catalog.sql");

/// Apply the catalog fixture.
///
/// # Errors
///
/// Returns `CommandError` if the database is unreachable or a statement fails.
pub async fn run(env_file: &Path) -> Result<(), CommandError> {
    let pool = connect(env_file).await?;

    tracing::info!("Seeding catalog...");
    sqlx::raw_sql(CATALOG).execute(&pool).await?;

    let products: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "products""#)
        .fetch_one(&pool)
        .await?;
    tracing::info!(products, "Seeding complete!");
    Ok(())
}
