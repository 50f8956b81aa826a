//! Liveness endpoint.

use axum::extract::State;
use serde::Serialize;

use crate::error::Success;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Monitor {
    pub name: String,
    pub version: String,
}

/// `GET /v1/`: service name and version. Does not check dependencies.
pub async fn health_check(State(state): State<AppState>) -> Success<Monitor> {
    let app = &state.config().app;
    Success::ok(Monitor {
        name: app.name.clone(),
        version: app.version.clone(),
    })
}
