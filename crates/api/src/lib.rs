//! ri-shop API library.
//!
//! The HTTP/JSON backend of the shop: accounts and sessions, the catalog,
//! orders with product snapshots, and an object-storage proxy. Exposed as a
//! library so the router can be exercised in tests and the CLI can reuse
//! configuration, repositories and the token authority.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
