//! Admin account bootstrap.
//!
//! `POST /v1/users/signup-admin` needs an admin caller, so the first admin
//! is created here.
//!
//! # Usage
//!
//! ```bash
//! ri-shop-cli admin create -e admin@rishop.dev -u admin -p 'S3cure-pass'
//! ```

use std::path::Path;

use ri_shop_api::models::RegisterRequest;
use ri_shop_api::services::{AuthError, SignUpStrategy, register_account};
use thiserror::Error;

use super::{CommandError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Failed to create admin: {0}")]
    Auth(#[from] AuthError),
}

/// Create an admin account (`role_id = 2`).
///
/// # Errors
///
/// Returns `AdminError` if the input is invalid, the email or username is
/// taken, or the database is unreachable.
pub async fn create_user(
    env_file: &Path,
    email: &str,
    username: &str,
    password: &str,
) -> Result<(), AdminError> {
    let pool = connect(env_file).await?;

    let request = RegisterRequest {
        email: email.to_owned(),
        password: password.to_owned(),
        username: username.to_owned(),
    };
    let user = register_account(&pool, &request, SignUpStrategy::Admin).await?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}, Username: {}",
        user.id,
        user.email,
        user.username
    );
    Ok(())
}
