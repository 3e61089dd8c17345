//! In-process request authorization.
//!
//! Each protected route is wrapped with [`authorize_operation`] bound to the
//! route's operation name. The configured [`RequestAuthorizer`] decides; a
//! deny becomes a 401 and an allow leaves an [`AuthorizerContext`] in the
//! request extensions for the handler.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, middleware::from_fn_with_state, routing::post};
//! use spider_auth::middleware::{OperationGuard, authorize_operation};
//!
//! let app = Router::new().route(
//!     "/v1/oauth/approve",
//!     post(approve_handler).route_layer(from_fn_with_state(
//!         OperationGuard::new(authorizer.clone(), "ApproveOAuth"),
//!         authorize_operation,
//!     )),
//! );
//! ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::error::unauthorized;
use crate::authorizer::{AuthorizerContext, AuthorizerRequest, RequestAuthorizer};

/// Authorizer bound to one operation.
#[derive(Clone)]
pub struct OperationGuard {
    authorizer: Arc<dyn RequestAuthorizer>,
    operation: &'static str,
}

impl OperationGuard {
    #[must_use]
    pub fn new(authorizer: Arc<dyn RequestAuthorizer>, operation: &'static str) -> Self {
        Self {
            authorizer,
            operation,
        }
    }
}

/// Middleware evaluating the guard's authorizer for the request.
pub async fn authorize_operation(
    State(guard): State<OperationGuard>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_request = AuthorizerRequest::from_http(
        request.uri().path(),
        request.method().as_str(),
        request.headers(),
        Some(guard.operation),
    );

    let policy = guard.authorizer.authorize(&auth_request).await;
    if !policy.is_allowed() {
        let message = policy.message().unwrap_or("Unauthorized");
        tracing::info!(
            operation = guard.operation,
            path = %auth_request.path,
            message = %message,
            "Request denied"
        );
        return unauthorized(message);
    }

    request
        .extensions_mut()
        .insert(AuthorizerContext::from_policy(&policy));
    next.run(request).await
}
