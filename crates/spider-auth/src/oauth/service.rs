//! Token lifecycle service.
//!
//! [`OAuthService`] implements the approve, token exchange and logout
//! operations on top of the storage traits and a [`TokenIssuer`].
//!
//! # Security Requirements
//!
//! - Authorization codes and refresh tokens are single-use; both are
//!   consumed with one atomic storage operation before anything is minted
//! - Codes, token values and client secrets are never logged
//! - Redirect URIs must exactly match a registered URI
//!
//! # Usage
//!
//! ```ignore
//! use spider_auth::oauth::OAuthService;
//!
//! let service = OAuthService::new(authorizations, tokens, clients, users, issuer);
//!
//! let approved = service.approve(&approve_request, Some(user_id)).await?;
//! let tokens = service.exchange(&token_request, None).await?;
//! ```

use std::sync::Arc;

use futures_util::future::try_join_all;

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::pkce::PkceChallengeMethod;
use crate::oauth::types::{
    ApproveRequest, ApproveResponse, ClientDetails, ClientDetailsQuery, LogoutRequest,
    LogoutResponse, TokenResponse,
};
use crate::storage::{AuthorizationStorage, ClientRegistry, TokenStorage, UserDirectory};
use crate::token::TokenIssuer;
use crate::types::{OidcClient, Token, TokenRef, TokenType, join_scopes};

/// Token type reported in every token response.
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Approve, exchange and logout operations.
pub struct OAuthService {
    pub(crate) authorizations: Arc<dyn AuthorizationStorage>,
    pub(crate) tokens: Arc<dyn TokenStorage>,
    pub(crate) clients: Arc<dyn ClientRegistry>,
    pub(crate) users: Arc<dyn UserDirectory>,
    pub(crate) issuer: Arc<dyn TokenIssuer>,
}

/// Tokens minted together under one session.
pub(crate) struct IssuedSession {
    pub session_id: String,
    pub expires_in: i64,
    pub access: Token,
    pub refresh: Token,
}

impl OAuthService {
    /// Creates a new service.
    #[must_use]
    pub fn new(
        authorizations: Arc<dyn AuthorizationStorage>,
        tokens: Arc<dyn TokenStorage>,
        clients: Arc<dyn ClientRegistry>,
        users: Arc<dyn UserDirectory>,
        issuer: Arc<dyn TokenIssuer>,
    ) -> Self {
        Self {
            authorizations,
            tokens,
            clients,
            users,
            issuer,
        }
    }

    /// Creates or renews the caller's authorization for a client and returns
    /// a fresh authorization code.
    ///
    /// # Arguments
    ///
    /// * `request` - The approve request
    /// * `user_id` - The authenticated user, from the session cookie
    ///
    /// # Errors
    ///
    /// - `InvalidClient` if `client_id` is missing or unknown
    /// - `InvalidRequest` if the redirect URI is not registered, the user is
    ///   missing or the PKCE method is unknown
    /// - `Internal` if the authorization cannot be stored
    pub async fn approve(
        &self,
        request: &ApproveRequest,
        user_id: Option<&str>,
    ) -> AuthResult<ApproveResponse> {
        // 1. Validate client and redirect URI
        let client_id = request
            .client_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AuthError::invalid_client("Client ID is required"))?;
        tracing::info!(client_id = %client_id, "Approving OAuth client");

        self.validate_client(client_id, request.redirect_uri.as_deref())
            .await?;

        // 2. Require the authenticated user
        let user_id = user_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AuthError::invalid_request("User ID and Client ID are required"))?;

        // 3. Reject PKCE methods we cannot verify later
        if request.code_challenge.is_some() {
            PkceChallengeMethod::parse(request.code_challenge_method.as_deref())
                .map_err(|_| AuthError::invalid_request("Invalid code_challenge_method"))?;
        }

        // 4. Renew the previous authorization, or create one
        let previous = match self
            .authorizations
            .get_for_user_and_client(user_id, client_id)
            .await
        {
            Ok(previous) => previous,
            Err(e) => {
                tracing::warn!(
                    client_id = %client_id,
                    user_id = %user_id,
                    error = %e,
                    "Error getting previous authorization, creating a new one"
                );
                None
            }
        };

        let authorization = match previous {
            Some(previous) => {
                tracing::info!(
                    authorization_id = %previous.authorization_id,
                    "Renewing authorization"
                );
                self.authorizations
                    .renew(
                        &previous.authorization_id,
                        &previous.user_id,
                        request.code_challenge.clone(),
                        request.code_challenge_method.clone(),
                    )
                    .await
            }
            None => {
                tracing::info!(client_id = %client_id, "Creating new authorization");
                self.authorizations
                    .create(
                        client_id,
                        user_id,
                        request.scopes.clone().unwrap_or_default(),
                        request.code_challenge.clone(),
                        request.code_challenge_method.clone(),
                    )
                    .await
            }
        }
        .map_err(|e| {
            tracing::error!(client_id = %client_id, error = %e, "Error approving OAuth");
            into_internal(e)
        })?;

        let code = authorization
            .auth_code
            .ok_or_else(|| AuthError::internal("Authorization has no code"))?;

        Ok(ApproveResponse {
            code,
            redirect_uri: request.redirect_uri.clone(),
        })
    }

    /// Ends the session a token belongs to.
    ///
    /// Every token of the session is unlinked from its authorization and
    /// deleted.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if a parameter is missing or the hint does not
    ///   resolve to a token of this client
    /// - `InvalidClient` if the client is unknown
    /// - `Internal` if storage fails
    pub async fn logout(&self, request: &LogoutRequest) -> AuthResult<LogoutResponse> {
        let (Some(client_id), Some(redirect_uri), Some(hint)) = (
            non_empty(&request.client_id),
            non_empty(&request.post_logout_redirect_uri),
            non_empty(&request.id_token_hint),
        ) else {
            tracing::warn!("Logout missing required parameters");
            return Err(AuthError::invalid_request(
                "client_id, post_logout_redirect_uri, and id_token_hint are required",
            ));
        };

        if self.clients.get_client(client_id).await?.is_none() {
            tracing::warn!(client_id = %client_id, "Logout for unknown client");
            return Err(AuthError::invalid_client("Client not found"));
        }

        let token = match self.tokens.get_by_value(hint).await {
            Ok(token) if token.client_id == client_id => token,
            Ok(_) | Err(AuthError::NotFound { .. }) => {
                tracing::warn!(client_id = %client_id, "Logout hint does not resolve to a token");
                return Err(AuthError::invalid_request("Invalid token"));
            }
            Err(e) => return Err(into_internal(e)),
        };

        let removed = self
            .revoke_session(&token.authorization_id, &token.session_id, &token.user_id)
            .await
            .map_err(into_internal)?;

        tracing::info!(
            client_id = %client_id,
            session_id = %token.session_id,
            deleted = removed.len(),
            "Session logged out"
        );

        Ok(LogoutResponse {
            redirect_uri: redirect_uri.to_string(),
            state: request.state.clone(),
        })
    }

    /// Returns the client name shown on the consent screen.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the client is unknown or the redirect URI is
    /// not registered.
    pub async fn client_details(&self, query: &ClientDetailsQuery) -> AuthResult<ClientDetails> {
        let client_id = non_empty(&query.client_id)
            .ok_or_else(|| AuthError::not_found("Client ID is required"))?;

        let client = self
            .validate_client(client_id, query.redirect_uri.as_deref())
            .await
            .map_err(|e| match e {
                AuthError::InvalidClient { .. } => {
                    AuthError::not_found("Client Configuration not found")
                }
                AuthError::InvalidRequest { .. } => AuthError::not_found("Redirect URI not found"),
                other => other,
            })?;

        Ok(ClientDetails {
            client_name: client.client_name,
        })
    }

    /// Loads a client and checks an optional redirect URI against it.
    pub(crate) async fn validate_client(
        &self,
        client_id: &str,
        redirect_uri: Option<&str>,
    ) -> AuthResult<OidcClient> {
        let client = self.clients.get_client(client_id).await?.ok_or_else(|| {
            tracing::warn!(client_id = %client_id, "Client not found");
            AuthError::invalid_client("Client not found")
        })?;

        if let Some(uri) = redirect_uri.filter(|uri| !uri.is_empty()) {
            if !client.has_redirect_uri(uri) {
                tracing::warn!(client_id = %client_id, redirect_uri = %uri, "Redirect URI not registered");
                return Err(AuthError::invalid_request("Redirect URI not found"));
            }
        }

        Ok(client)
    }

    /// Mints and persists an access/refresh pair under a new session and
    /// links both to the authorization.
    pub(crate) async fn issue_session(
        &self,
        authorization_id: &str,
        client_id: &str,
        user_id: &str,
        scopes: &[String],
    ) -> AuthResult<IssuedSession> {
        let access_value = self
            .issuer
            .issue_access_token(authorization_id, client_id, user_id, scopes)
            .await?;
        let refresh_value = self
            .issuer
            .issue_refresh_token(authorization_id, client_id, user_id, scopes)
            .await?;

        let session_id = Token::generate_session_id();
        let access = Token::build(
            access_value.value,
            authorization_id,
            &session_id,
            user_id,
            client_id,
            TokenType::Access,
            scopes.to_vec(),
            access_value.expires_in,
        );
        let refresh = Token::build(
            refresh_value.value,
            authorization_id,
            &session_id,
            user_id,
            client_id,
            TokenType::Refresh,
            scopes.to_vec(),
            refresh_value.expires_in,
        );

        tracing::debug!(
            authorization_id = %authorization_id,
            access_token_id = %access.token_id,
            refresh_token_id = %refresh.token_id,
            "Storing tokens"
        );
        self.tokens.create(&access).await?;
        self.tokens.create(&refresh).await?;
        self.authorizations
            .add_token_refs(
                authorization_id,
                user_id,
                &[TokenRef::from(&access), TokenRef::from(&refresh)],
            )
            .await?;

        Ok(IssuedSession {
            session_id,
            expires_in: access_value.expires_in,
            access,
            refresh,
        })
    }

    /// Builds the token response for a freshly issued session.
    pub(crate) async fn token_response(
        &self,
        session: IssuedSession,
        scopes: &[String],
    ) -> AuthResult<TokenResponse> {
        let user = self
            .users
            .get_user(&session.access.user_id)
            .await
            .map_err(into_internal)?;

        let id_token = self
            .issuer
            .issue_id_token(
                &session.access.user_id,
                &session.access.client_id,
                &user.display_name,
                &session.session_id,
                scopes,
            )
            .await?;

        Ok(TokenResponse {
            expires_in: session.expires_in,
            access_token: session.access.token_value,
            refresh_token: session.refresh.token_value,
            id_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            scope: join_scopes(scopes),
        })
    }

    /// Unlinks and deletes every token of a session.
    ///
    /// Returns the ids of the deleted tokens.
    pub(crate) async fn revoke_session(
        &self,
        authorization_id: &str,
        session_id: &str,
        user_id: &str,
    ) -> AuthResult<Vec<String>> {
        let removed = self
            .authorizations
            .remove_token_refs_by_session(authorization_id, session_id, user_id)
            .await?;

        try_join_all(removed.iter().map(|id| self.tokens.delete(id))).await?;

        Ok(removed)
    }
}

/// Collapses anything that is not already a server error into `Internal`.
///
/// Used once a request has passed validation: failures from that point on
/// are ours, not the caller's.
pub(crate) fn into_internal(err: AuthError) -> AuthError {
    if err.is_server_error() {
        err
    } else {
        AuthError::internal(err.to_string())
    }
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
