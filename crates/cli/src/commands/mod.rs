//! CLI command implementations.

pub mod admin;
pub mod apikey;
pub mod migrate;
pub mod seed;

use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use thiserror::Error;

/// Errors shared by the database commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Load the dotenv file, then read `DB_URL` (or `DATABASE_URL`).
pub(crate) fn database_url(env_file: &Path) -> Result<SecretString, CommandError> {
    if let Err(e) = dotenvy::from_path(env_file) {
        tracing::debug!(path = %env_file.display(), error = %e, "dotenv file not loaded");
    }
    std::env::var("DB_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("DB_URL"))
}

/// Connect with a single short-lived pool.
pub(crate) async fn connect(env_file: &Path) -> Result<PgPool, CommandError> {
    let url = database_url(env_file)?;
    tracing::info!("Connecting to database...");
    Ok(PgPool::connect(url.expose_secret()).await?)
}
