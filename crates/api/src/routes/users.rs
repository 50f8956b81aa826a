//! User and session routes.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::Serialize;

use crate::error::{ApiError, ApiResult, Success};
use crate::middleware::{AdminOnly, ApiKey, Authorized, OwnPath};
use crate::models::{Passport, RefreshRequest, RegisterRequest, SignInRequest, SignOutRequest, User};
use crate::services::{AuthError, AuthService, SignUpStrategy};
use crate::state::AppState;

use super::json_body;

const SIGN_UP_CODE: &str = "users-001";
const SIGN_IN_CODE: &str = "users-002";
const REFRESH_CODE: &str = "users-003";
const SIGN_OUT_CODE: &str = "users-004";
const SIGN_UP_ADMIN_CODE: &str = "users-005";
const ADMIN_SECRET_CODE: &str = "users-006";
const PROFILE_CODE: &str = "users-007";

/// Client mistakes are 400s; everything else is a 500.
fn auth_failure(error_code: &'static str, e: &AuthError) -> ApiError {
    if e.is_client_error() {
        ApiError::bad_request(error_code, e.to_string())
    } else {
        ApiError::internal(error_code, e.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct AdminSecret {
    pub token: String,
}

/// Register a customer account.
pub async fn sign_up(
    State(state): State<AppState>,
    _key: ApiKey,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<Passport> {
    let request = json_body(payload, SIGN_UP_CODE)?;
    let passport = AuthService::new(state.pool(), state.tokens())
        .sign_up(&request, SignUpStrategy::Customer)
        .await
        .map_err(|e| auth_failure(SIGN_UP_CODE, &e))?;
    Ok(Success::created(passport))
}

/// Register an admin account. Only an admin may do this.
pub async fn sign_up_admin(
    State(state): State<AppState>,
    Authorized(caller): AdminOnly,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<Passport> {
    let request = json_body(payload, SIGN_UP_ADMIN_CODE)?;
    let passport = AuthService::new(state.pool(), state.tokens())
        .sign_up(&request, SignUpStrategy::Admin)
        .await
        .map_err(|e| auth_failure(SIGN_UP_ADMIN_CODE, &e))?;
    tracing::info!(created_by = %caller.id, user_id = %passport.user.id, "admin account created");
    Ok(Success::created(passport))
}

pub async fn sign_in(
    State(state): State<AppState>,
    _key: ApiKey,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> ApiResult<Passport> {
    let request = json_body(payload, SIGN_IN_CODE)?;
    let passport = AuthService::new(state.pool(), state.tokens())
        .sign_in(&request)
        .await
        .map_err(|e| auth_failure(SIGN_IN_CODE, &e))?;
    Ok(Success::ok(passport))
}

pub async fn refresh(
    State(state): State<AppState>,
    _key: ApiKey,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<Passport> {
    let request = json_body(payload, REFRESH_CODE)?;
    let passport = AuthService::new(state.pool(), state.tokens())
        .refresh(&request)
        .await
        .map_err(|e| auth_failure(REFRESH_CODE, &e))?;
    Ok(Success::ok(passport))
}

pub async fn sign_out(
    State(state): State<AppState>,
    _key: ApiKey,
    payload: Result<Json<SignOutRequest>, JsonRejection>,
) -> ApiResult<()> {
    let request = json_body(payload, SIGN_OUT_CODE)?;
    AuthService::new(state.pool(), state.tokens())
        .sign_out(&request.oauth_id)
        .await
        .map_err(|e| auth_failure(SIGN_OUT_CODE, &e))?;
    Ok(Success::ok(()))
}

/// Mint a short-lived admin token.
pub async fn admin_secret(
    State(state): State<AppState>,
    _admin: AdminOnly,
) -> ApiResult<AdminSecret> {
    let signed = AuthService::new(state.pool(), state.tokens())
        .admin_token()
        .map_err(|e| ApiError::internal(ADMIN_SECRET_CODE, e.to_string()))?;
    Ok(Success::ok(AdminSecret {
        token: signed.token,
    }))
}

/// Profile of the caller; the path must name the caller.
pub async fn profile(State(state): State<AppState>, OwnPath(caller): OwnPath) -> ApiResult<User> {
    let user = AuthService::new(state.pool(), state.tokens())
        .profile(&caller.id)
        .await
        .map_err(|e| match e {
            AuthError::UserNotFound => ApiError::not_found(PROFILE_CODE, e.to_string()),
            other => auth_failure(PROFILE_CODE, &other),
        })?;
    Ok(Success::ok(user))
}
