//! Token endpoint: authorization code and refresh token exchange.
//!
//! # Validation Order
//!
//! 1. `client_id` and `grant_type` present
//! 2. Client authentication: a pre-authenticated client must match the body
//!    `client_id`; otherwise `client_secret` is required and must match
//! 3. Dispatch on `grant_type`
//!
//! Both grants consume their credential atomically before minting, so of two
//! concurrent requests presenting the same code or refresh token, exactly one
//! succeeds.

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::pkce::verify_code_verifier;
use crate::oauth::service::{OAuthService, non_empty};
use crate::oauth::types::{TokenRequest, TokenResponse};
use crate::types::{GrantType, OidcClient, TokenType};

impl OAuthService {
    /// Exchanges an authorization code or refresh token for a new token set.
    ///
    /// # Arguments
    ///
    /// * `request` - Form parameters of the token request
    /// * `authenticated_client` - Client id the authorizer already
    ///   authenticated (HTTP Basic), if any
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` for missing parameters, an unknown grant type, an
    ///   unregistered redirect URI or PKCE problems
    /// - `InvalidClient` if client authentication fails
    /// - `InvalidGrant` / `CodeReplay` if the code or refresh token is unusable
    /// - Server errors if minting or storing tokens fails
    pub async fn exchange(
        &self,
        request: &TokenRequest,
        authenticated_client: Option<&str>,
    ) -> AuthResult<TokenResponse> {
        // 1. Validate required parameters
        let (Some(client_id), Some(grant_type)) =
            (non_empty(&request.client_id), non_empty(&request.grant_type))
        else {
            tracing::warn!("Token request missing required parameters");
            return Err(AuthError::invalid_request("Missing required parameters"));
        };

        tracing::info!(
            client_id = %client_id,
            grant_type = %grant_type,
            has_code = request.code.is_some(),
            has_refresh_token = request.refresh_token.is_some(),
            "Token request"
        );

        // 2. Authenticate the client
        let client = self.authenticate_client(request, client_id, authenticated_client).await?;

        // 3. Dispatch on grant type
        let grant = GrantType::parse(grant_type).ok_or_else(|| {
            tracing::warn!(grant_type = %grant_type, "Invalid grant_type");
            AuthError::invalid_request("Invalid grant_type")
        })?;

        if !client.allows_grant_type(grant) {
            tracing::warn!(client_id = %client_id, grant_type = %grant, "Grant type not allowed for client");
            return Err(AuthError::invalid_request("Invalid grant_type"));
        }

        match grant {
            GrantType::AuthorizationCode => self.exchange_code(request, &client).await,
            GrantType::RefreshToken => self.exchange_refresh_token(request, &client).await,
        }
    }

    async fn authenticate_client(
        &self,
        request: &TokenRequest,
        client_id: &str,
        authenticated_client: Option<&str>,
    ) -> AuthResult<OidcClient> {
        if let Some(authenticated) = authenticated_client {
            if authenticated != client_id {
                tracing::warn!(
                    client_id = %client_id,
                    authenticated_client = %authenticated,
                    "Client ID mismatch"
                );
                return Err(AuthError::invalid_client("Invalid client_id"));
            }
        }

        let client = self
            .clients
            .get_client(authenticated_client.unwrap_or(client_id))
            .await?
            .ok_or_else(|| {
                tracing::warn!(client_id = %client_id, "Client not found");
                AuthError::invalid_client("Client not found")
            })?;

        if authenticated_client.is_none() {
            let secret = non_empty(&request.client_secret)
                .ok_or_else(|| AuthError::invalid_request("Missing client_secret"))?;
            if !client.verify_secret(secret) {
                tracing::warn!(client_id = %client_id, "Invalid client_secret");
                return Err(AuthError::invalid_client("Invalid client_secret"));
            }
        }

        Ok(client)
    }

    /// `authorization_code` grant.
    async fn exchange_code(
        &self,
        request: &TokenRequest,
        client: &OidcClient,
    ) -> AuthResult<TokenResponse> {
        // 1. Require code and redirect URI
        let (Some(code), Some(redirect_uri)) =
            (non_empty(&request.code), non_empty(&request.redirect_uri))
        else {
            tracing::warn!(
                has_code = request.code.is_some(),
                has_redirect_uri = request.redirect_uri.is_some(),
                "Authorization code request missing parameters"
            );
            return Err(AuthError::invalid_grant("Invalid code"));
        };

        // 2. Validate redirect URI
        if !client.has_redirect_uri(redirect_uri) {
            tracing::warn!(client_id = %client.client_id, redirect_uri = %redirect_uri, "Invalid redirect_uri");
            return Err(AuthError::invalid_request("Invalid redirect_uri"));
        }

        // 3. Consume the code
        let authorization = self.authorizations.consume_code(code).await.map_err(|e| {
            match &e {
                AuthError::CodeReplay { authorization_id } => tracing::warn!(
                    authorization_id = %authorization_id,
                    client_id = %client.client_id,
                    "Authorization code replayed"
                ),
                _ => tracing::warn!(client_id = %client.client_id, error = %e, "Unusable authorization code"),
            }
            e
        })?;

        tracing::info!(
            authorization_id = %authorization.authorization_id,
            user_id = %authorization.user_id,
            "Found authorization"
        );

        // 4. The code must have been issued to this client
        if authorization.client_id != client.client_id {
            tracing::warn!(
                authorization_id = %authorization.authorization_id,
                client_id = %client.client_id,
                "Authorization code issued to a different client"
            );
            return Err(AuthError::invalid_grant("Invalid code"));
        }

        // 5. PKCE verification
        if let Some(challenge) = &authorization.code_challenge {
            verify_code_verifier(
                challenge,
                authorization.code_challenge_method.as_deref(),
                request.code_verifier.as_deref(),
            )
            .map_err(|e| {
                tracing::warn!(authorization_id = %authorization.authorization_id, error = %e, "PKCE verification failed");
                AuthError::from(e)
            })?;
        }

        // 6. Mint, persist and link the new session
        let session = self
            .issue_session(
                &authorization.authorization_id,
                &authorization.client_id,
                &authorization.user_id,
                &authorization.scopes,
            )
            .await
            .map_err(|e| {
                tracing::error!(authorization_id = %authorization.authorization_id, error = %e, "Unable to generate tokens");
                crate::oauth::service::into_internal(e)
            })?;

        tracing::info!(
            authorization_id = %authorization.authorization_id,
            session_id = %session.session_id,
            "Issued tokens for authorization code"
        );

        self.token_response(session, &authorization.scopes).await
    }

    /// `refresh_token` grant.
    ///
    /// Rotates the whole session: the presented refresh token and its sibling
    /// access token stop resolving once this returns.
    async fn exchange_refresh_token(
        &self,
        request: &TokenRequest,
        client: &OidcClient,
    ) -> AuthResult<TokenResponse> {
        let Some(value) = non_empty(&request.refresh_token) else {
            tracing::warn!("No refresh token provided");
            return Err(AuthError::invalid_grant("Invalid refresh_token"));
        };

        // 1. Consume the refresh token; another client's token stays put
        let consumed = match self
            .tokens
            .consume(value, TokenType::Refresh, &client.client_id)
            .await
        {
            Ok(token) => token,
            Err(AuthError::NotFound { .. }) => {
                tracing::warn!(client_id = %client.client_id, "Refresh token not found");
                return Err(AuthError::invalid_grant("Invalid refresh token"));
            }
            Err(e) => return Err(e),
        };

        // 2. Reject expired tokens
        if consumed.is_expired() {
            tracing::warn!(
                authorization_id = %consumed.authorization_id,
                client_id = %client.client_id,
                "Refresh token expired"
            );
            if let Err(e) = self
                .authorizations
                .remove_token_refs(
                    &consumed.authorization_id,
                    &consumed.user_id,
                    std::slice::from_ref(&consumed.token_id),
                )
                .await
            {
                tracing::warn!(error = %e, "Unable to unlink rejected refresh token");
            }
            return Err(AuthError::invalid_grant("Refresh token expired"));
        }

        // 3. Load the authorization
        let authorization = match self
            .authorizations
            .get_by_id(&consumed.authorization_id, &consumed.user_id)
            .await
        {
            Ok(authorization) => authorization,
            Err(AuthError::NotFound { .. }) => {
                tracing::warn!(authorization_id = %consumed.authorization_id, "Invalid authorization data");
                return Err(AuthError::invalid_grant("Invalid authorization"));
            }
            Err(e) => return Err(e),
        };

        // 4. Mint, persist and link the new session
        let session = self
            .issue_session(
                &authorization.authorization_id,
                &authorization.client_id,
                &authorization.user_id,
                &authorization.scopes,
            )
            .await
            .map_err(crate::oauth::service::into_internal)?;

        // 5. Retire the old session
        let removed = self
            .revoke_session(
                &authorization.authorization_id,
                &consumed.session_id,
                &authorization.user_id,
            )
            .await
            .map_err(crate::oauth::service::into_internal)?;

        if !removed.contains(&consumed.token_id) {
            self.authorizations
                .remove_token_refs(
                    &authorization.authorization_id,
                    &authorization.user_id,
                    std::slice::from_ref(&consumed.token_id),
                )
                .await
                .map_err(crate::oauth::service::into_internal)?;
        }

        tracing::info!(
            authorization_id = %authorization.authorization_id,
            old_session_id = %consumed.session_id,
            session_id = %session.session_id,
            deleted = removed.len(),
            "Rotated refresh token"
        );

        self.token_response(session, &authorization.scopes).await
    }
}
