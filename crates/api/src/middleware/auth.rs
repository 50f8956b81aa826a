//! Authentication and authorization extractors.
//!
//! Each route family accepts exactly one credential: a bearer access token
//! (`Authorization: Bearer ...`) or an API key (`X-API-KEY`). A request
//! carrying both is rejected by every extractor.
//!
//! | Extractor | Requires | Rejection |
//! |---|---|---|
//! | [`ApiKey`] | valid API key | `401 middleware-005` |
//! | [`Authenticated`] | access token bound to a live session | `401 middleware-002` |
//! | [`Authorized`] | `Authenticated` + role bitmask overlap | `401 middleware-004` |
//! | [`OwnPath`] | `Authenticated` + `:user_id` names the caller | `401 middleware-003` |

use axum::{
    extract::{FromRequestParts, RawPathParams},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};

use ri_shop_core::{RoleMask, authorize, params_check};

use crate::error::{ApiError, set_sentry_user};
use crate::models::UserClaims;
use crate::services::{AuthError, AuthService, TokenKind};
use crate::state::AppState;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

pub const ROUTE_NOT_FOUND_CODE: &str = "middleware-001";
pub const JWT_CODE: &str = "middleware-002";
pub const PARAMS_CODE: &str = "middleware-003";
pub const AUTHORIZE_CODE: &str = "middleware-004";
pub const API_KEY_CODE: &str = "middleware-005";

const NO_PERMISSION: &str = "no permission to access";
const MIXED_CREDENTIALS: &str = "mixing authentication methods is not allowed";

fn has_both_credentials(headers: &HeaderMap) -> bool {
    headers.contains_key(AUTHORIZATION) && headers.contains_key(API_KEY_HEADER)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Request carries a valid API key.
#[derive(Debug, Clone, Copy)]
pub struct ApiKey;

impl FromRequestParts<AppState> for ApiKey {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if has_both_credentials(&parts.headers) {
            return Err(ApiError::unauthorized(API_KEY_CODE, MIXED_CREDENTIALS));
        }

        let key = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .unwrap_or_default();

        state
            .tokens()
            .parse_kind(key, TokenKind::ApiKey)
            .map(|_| Self)
            .map_err(|e| {
                tracing::debug!(error = %e, "api key rejected");
                ApiError::unauthorized(API_KEY_CODE, "api key is invalid")
            })
    }
}

/// Caller holding an access token bound to a live session.
#[derive(Debug, Clone)]
pub struct Authenticated(pub UserClaims);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if has_both_credentials(&parts.headers) {
            return Err(ApiError::unauthorized(JWT_CODE, MIXED_CREDENTIALS));
        }

        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized(JWT_CODE, "bearer token is required"))?;

        let claims = AuthService::new(state.pool(), state.tokens())
            .authenticate(token)
            .await
            .map_err(|e| match e {
                AuthError::Token(e) => ApiError::unauthorized(JWT_CODE, e.to_string()),
                AuthError::SessionNotFound => ApiError::unauthorized(JWT_CODE, NO_PERMISSION),
                other => ApiError::internal(JWT_CODE, other.to_string()),
            })?;

        set_sentry_user(&claims.id);
        Ok(Self(claims))
    }
}

/// Authenticated caller whose role bitmask overlaps `ROLES`.
#[derive(Debug, Clone)]
pub struct Authorized<const ROLES: i32>(pub UserClaims);

/// Admin-only routes.
pub type AdminOnly = Authorized<{ RoleMask::ADMIN.bits() }>;

impl<const ROLES: i32> FromRequestParts<AppState> for Authorized<ROLES> {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Authenticated(claims) = Authenticated::from_request_parts(parts, state).await?;

        if !authorize(claims.role, RoleMask::new(ROLES)) {
            tracing::debug!(
                user_id = %claims.id,
                role = %claims.role,
                required = ROLES,
                "role rejected"
            );
            return Err(ApiError::unauthorized(AUTHORIZE_CODE, NO_PERMISSION));
        }
        Ok(Self(claims))
    }
}

/// Authenticated caller named by the `:user_id` path parameter.
#[derive(Debug, Clone)]
pub struct OwnPath(pub UserClaims);

impl FromRequestParts<AppState> for OwnPath {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Authenticated(claims) = Authenticated::from_request_parts(parts, state).await?;

        let params = RawPathParams::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::unauthorized(PARAMS_CODE, NO_PERMISSION))?;
        let path_user_id = params
            .iter()
            .find_map(|(key, value)| (key == "user_id").then_some(value))
            .unwrap_or_default();

        if !params_check(path_user_id, &claims.id) {
            return Err(ApiError::unauthorized(PARAMS_CODE, NO_PERMISSION));
        }
        Ok(Self(claims))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer  xyz "));
        assert_eq!(bearer_token(&headers), Some("xyz"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_mixed_credentials_detected() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer a"));
        assert!(!has_both_credentials(&headers));

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("k"));
        assert!(has_both_credentials(&headers));
    }

    #[test]
    fn test_admin_only_yields_claims() {
        let admin: AdminOnly = Authorized(UserClaims {
            id: "U000001".to_owned().into(),
            role: RoleMask::ADMIN,
        });

        let Authorized(claims) = admin;
        assert_eq!(claims.id.to_string(), "U000001");
        assert!(authorize(claims.role, RoleMask::ADMIN));
    }
}
