//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::services::{LocalStorage, TokenAuthority};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; everything inside is read-only after
/// start-up.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    pool: PgPool,
    tokens: TokenAuthority,
    storage: LocalStorage,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: AppConfig, pool: PgPool) -> Self {
        let tokens = TokenAuthority::new(&config.jwt);
        let storage = LocalStorage::from_config(&config.app);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                tokens,
                storage,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the token authority.
    #[must_use]
    pub fn tokens(&self) -> &TokenAuthority {
        &self.inner.tokens
    }

    #[must_use]
    pub fn storage(&self) -> &LocalStorage {
        &self.inner.storage
    }
}
