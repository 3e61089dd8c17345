//! HTTP error responses.
//!
//! - OAuth errors: `{error, error_description}`, 400 (`invalid_client` 401)
//! - Not found: 404 `{message}`
//! - Everything else: 500 `{message: "Internal server error"}`; the detail
//!   is logged, never returned

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AuthError;
use crate::oauth::types::OAuthErrorResponse;

// =============================================================================
// IntoResponse Implementation
// =============================================================================

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = status_code(&self);

        if self.is_oauth_error() {
            if let Self::CodeReplay { authorization_id } = &self {
                tracing::warn!(authorization_id = %authorization_id, "Rejected replayed authorization code");
            }
            return (status, Json(OAuthErrorResponse::from(&self))).into_response();
        }

        if self.is_server_error() {
            tracing::error!(error = %self, category = %self.category(), "Request failed");
        }

        (status, Json(json!({ "message": self.public_description() }))).into_response()
    }
}

/// HTTP status for an error.
#[must_use]
pub fn status_code(error: &AuthError) -> StatusCode {
    match error {
        AuthError::InvalidClient { .. } => StatusCode::UNAUTHORIZED,
        AuthError::InvalidRequest { .. }
        | AuthError::InvalidGrant { .. }
        | AuthError::CodeReplay { .. } => StatusCode::BAD_REQUEST,
        AuthError::NotFound { .. } => StatusCode::NOT_FOUND,
        AuthError::Storage { .. }
        | AuthError::Issuer { .. }
        | AuthError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// 401 response for a denied request.
#[must_use]
pub fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(status_code(&AuthError::invalid_request("x")), StatusCode::BAD_REQUEST);
        assert_eq!(status_code(&AuthError::invalid_client("x")), StatusCode::UNAUTHORIZED);
        assert_eq!(status_code(&AuthError::invalid_grant("x")), StatusCode::BAD_REQUEST);
        assert_eq!(status_code(&AuthError::code_replay("a")), StatusCode::BAD_REQUEST);
        assert_eq!(status_code(&AuthError::not_found("x")), StatusCode::NOT_FOUND);
        assert_eq!(status_code(&AuthError::storage("x")), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_into_response_status() {
        let response = AuthError::invalid_client("Client not found").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = AuthError::internal("db down").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
