//! HTTP middleware stack.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, transaction)
//! 2. Catch panic (render `server-001`)
//! 3. `TraceLayer` (request tracing)
//! 4. Request ID (add unique ID to each request)
//! 5. CORS, request timeout, body limit
//!
//! Authentication and authorization are extractors, not layers, so each
//! route names exactly the credential it accepts.

pub mod auth;
pub mod request_id;

pub use auth::{AdminOnly, ApiKey, Authenticated, Authorized, OwnPath};
pub use request_id::request_id_middleware;
