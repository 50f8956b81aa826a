//! Mint an API key from the server configuration.
//!
//! Needed once, before any admin exists to call `GET /v1/appinfo/apikey`.

use std::path::Path;

use ri_shop_api::config::AppConfig;
use ri_shop_api::services::{TokenAuthority, TokenKind};

/// Print a fresh API key to stdout.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or signing fails.
pub fn mint(env_file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(env_file)?;
    let signed = TokenAuthority::new(&config.jwt).mint(TokenKind::ApiKey, None)?;

    tracing::info!(expires_at = signed.expires_at, "API key minted");

    #[allow(clippy::print_stdout)]
    {
        println!("{}", signed.token);
    }
    Ok(())
}
