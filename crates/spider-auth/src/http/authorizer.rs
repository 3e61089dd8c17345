//! Authorizer contract endpoint.
//!
//! `POST /v1/authorizer` takes an [`AuthorizerRequest`] and always answers
//! 200 with the policy, allow or deny.

use std::sync::Arc;

use axum::{Json, extract::State};

use crate::authorizer::{AuthorizerPolicy, AuthorizerRequest, RequestAuthorizer};

pub async fn authorizer_handler(
    State(authorizer): State<Arc<dyn RequestAuthorizer>>,
    Json(request): Json<AuthorizerRequest>,
) -> Json<AuthorizerPolicy> {
    Json(authorizer.authorize(&request).await)
}
