//! Response envelope and client-facing errors.
//!
//! Every handler answers with either [`Success`] (`{status_code, data}`) or
//! [`ApiError`] (`{status_code, error_code, message}`). Error codes follow
//! `<domain>-NNN` and are chosen locally by each handler; server errors are
//! captured to Sentry before responding.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Error code for panics caught by the catch-panic layer.
pub const PANIC_ERROR_CODE: &str = "server-001";

/// Client-facing error rendered as the error envelope.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{error_code}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub error_code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    status_code: u16,
    error_code: &'a str,
    message: &'a str,
}

impl ApiError {
    /// Build an error with an explicit status.
    pub fn new(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error_code,
            message: message.into(),
        }
    }

    /// 400 Bad Request.
    pub fn bad_request(error_code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_code, message)
    }

    /// 401 Unauthorized.
    pub fn unauthorized(error_code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error_code, message)
    }

    /// 404 Not Found.
    pub fn not_found(error_code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error_code, message)
    }

    /// 500 Internal Server Error.
    pub fn internal(error_code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error_code, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error_code = self.error_code,
                error = %self.message,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(
                status = self.status.as_u16(),
                error_code = self.error_code,
                error = %self.message,
                "Request rejected"
            );
        }

        let body = ErrorBody {
            status_code: self.status.as_u16(),
            error_code: self.error_code,
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Successful response rendered as the success envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Success<T> {
    #[serde(skip)]
    status: StatusCode,
    status_code: u16,
    data: T,
}

impl<T: Serialize> Success<T> {
    /// Envelope with an explicit status.
    pub fn new(status: StatusCode, data: T) -> Self {
        Self {
            status,
            status_code: status.as_u16(),
            data,
        }
    }

    /// 200 OK.
    pub fn ok(data: T) -> Self {
        Self::new(StatusCode::OK, data)
    }

    /// 201 Created.
    pub fn created(data: T) -> Self {
        Self::new(StatusCode::CREATED, data)
    }
}

impl<T: Serialize> IntoResponse for Success<T> {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

/// Handler result: success envelope or error envelope.
pub type ApiResult<T> = Result<Success<T>, ApiError>;

/// Set the Sentry user context from a user ID.
///
/// Called by the auth extractors so errors are associated with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::{Value, json};

    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_error_envelope_shape() {
        let response = ApiError::bad_request("users-001", "email has been used").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(
            body,
            json!({
                "status_code": 400,
                "error_code": "users-001",
                "message": "email has been used"
            })
        );
    }

    #[tokio::test]
    async fn test_success_envelope_shape() {
        let response = Success::created(json!({"category_id": 42})).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        assert_eq!(body, json!({"status_code": 201, "data": {"category_id": 42}}));
    }

    #[test]
    fn test_error_status_helpers() {
        assert_eq!(
            ApiError::unauthorized("middleware-002", "x").status,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::not_found("products-001", "x").status, StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::internal("orders-003", "x").status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
