//! OAuth endpoint handlers.
//!
//! ```text
//! POST /v1/oauth/tokens    (form)  -> TokenResponse
//! POST /v1/oauth/approve   (json)  -> ApproveResponse
//! POST /v1/oauth/logout    (json)  -> LogoutResponse
//! GET  /v1/oauth/details   (query) -> ClientDetails
//! ```
//!
//! Identity comes from the [`AuthorizerContext`] the authorize middleware
//! leaves in the request extensions.

use std::sync::Arc;

use axum::{
    Extension, Form, Json,
    extract::{Query, State},
};

use crate::AuthResult;
use crate::authorizer::AuthorizerContext;
use crate::oauth::OAuthService;
use crate::oauth::types::{
    ApproveRequest, ApproveResponse, ClientDetails, ClientDetailsQuery, LogoutRequest,
    LogoutResponse, TokenRequest, TokenResponse,
};

/// Token endpoint.
///
/// A client the authorizer authenticated via HTTP Basic does not need to
/// repeat its secret in the form body.
pub async fn token_handler(
    State(service): State<Arc<OAuthService>>,
    context: Option<Extension<AuthorizerContext>>,
    Form(request): Form<TokenRequest>,
) -> AuthResult<Json<TokenResponse>> {
    let authenticated_client = context
        .as_ref()
        .and_then(|Extension(c)| c.authenticated_client());

    service
        .exchange(&request, authenticated_client)
        .await
        .map(Json)
}

/// Consent approval for the signed-in user.
pub async fn approve_handler(
    State(service): State<Arc<OAuthService>>,
    context: Option<Extension<AuthorizerContext>>,
    Json(request): Json<ApproveRequest>,
) -> AuthResult<Json<ApproveResponse>> {
    let user_id = context
        .as_ref()
        .and_then(|Extension(c)| c.user_id.as_deref());

    service.approve(&request, user_id).await.map(Json)
}

pub async fn logout_handler(
    State(service): State<Arc<OAuthService>>,
    Json(request): Json<LogoutRequest>,
) -> AuthResult<Json<LogoutResponse>> {
    service.logout(&request).await.map(Json)
}

pub async fn details_handler(
    State(service): State<Arc<OAuthService>>,
    Query(query): Query<ClientDetailsQuery>,
) -> AuthResult<Json<ClientDetails>> {
    service.client_details(&query).await.map(Json)
}
