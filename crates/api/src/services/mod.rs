//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Token authority, password hashing, sign-up/sign-in/refresh/sign-out
//! - `orders` - Order placement and update rules
//! - `storage` - Object storage for uploaded files

pub mod auth;
pub mod orders;
pub mod storage;

pub use auth::{
    AuthError, AuthService, SignUpStrategy, TokenAuthority, TokenError, TokenKind, register_account,
};
pub use orders::{OrderChange, OrderError};
pub use storage::{LocalStorage, ObjectStorage, StorageError};
