//! ri-shop Core - Shared domain types.
//!
//! This crate provides the types used across all ri-shop components:
//! - `api` - The versioned HTTP/JSON backend
//! - `cli` - Command-line tools for migrations, seeding and bootstrap
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Typed ids, emails, the role bitmask and order statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
