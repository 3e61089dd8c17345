//! Credential verifiers the authorizer delegates to.
//!
//! - [`SessionCookieVerifier`] - platform session cookie (`x-pg-id`)
//! - [`FederatedTokenVerifier`] - legacy federated IdP access tokens
//! - [`ServerAccessChecker`] - legacy server start/stop permission

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::AuthResult;
use crate::config::FederatedConfig;
use crate::error::AuthError;
use crate::token::{JwtService, SessionClaims, SigningKey};

// =============================================================================
// Session cookie
// =============================================================================

/// Verifies the platform session cookie.
#[async_trait]
pub trait SessionCookieVerifier: Send + Sync {
    /// # Errors
    ///
    /// Returns `InvalidGrant` if the cookie is malformed, forged or expired.
    async fn verify(&self, cookie: &str) -> AuthResult<SessionClaims>;
}

/// Session cookies are JWTs signed with the platform key.
pub struct JwtSessionCookieVerifier {
    jwt: Arc<JwtService>,
}

impl JwtSessionCookieVerifier {
    #[must_use]
    pub fn new(jwt: Arc<JwtService>) -> Self {
        Self { jwt }
    }
}

#[async_trait]
impl SessionCookieVerifier for JwtSessionCookieVerifier {
    async fn verify(&self, cookie: &str) -> AuthResult<SessionClaims> {
        self.jwt
            .decode::<SessionClaims>(cookie)
            .map(|data| data.claims)
            .map_err(|e| AuthError::invalid_grant(format!("Invalid cookie: {e}")))
    }
}

// =============================================================================
// Federated IdP
// =============================================================================

/// Caller resolved from a federated IdP token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    pub subject: String,
    pub username: String,
}

/// Verifies access tokens of the legacy federated IdP.
#[async_trait]
pub trait FederatedTokenVerifier: Send + Sync {
    /// # Errors
    ///
    /// Returns `InvalidGrant` if the token does not verify.
    async fn verify(&self, token: &str) -> AuthResult<FederatedIdentity>;
}

#[derive(Debug, Deserialize)]
struct FederatedClaims {
    sub: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    token_use: Option<String>,
}

/// Verifies federated access tokens signed with a shared HS256 secret.
///
/// Tokens must be access tokens (`token_use` absent or `access`) and, when an
/// audience is configured, carry it as `client_id`.
pub struct JwtFederatedVerifier {
    jwt: JwtService,
    audience: Option<String>,
}

impl JwtFederatedVerifier {
    #[must_use]
    pub fn new(secret: &[u8], issuer: Option<String>, audience: Option<String>) -> Self {
        let key = SigningKey::from_secret("federated", secret);
        let jwt = match issuer {
            Some(issuer) => JwtService::new(key, issuer),
            None => JwtService::without_issuer(key),
        };
        Self { jwt, audience }
    }

    /// Builds the verifier configured for the deployment.
    ///
    /// Without a secret, every federated token is rejected.
    #[must_use]
    pub fn from_config(config: &FederatedConfig) -> Arc<dyn FederatedTokenVerifier> {
        match &config.secret {
            Some(secret) => Arc::new(Self::new(
                secret.as_bytes(),
                config.issuer.clone(),
                config.audience.clone(),
            )),
            None => Arc::new(DisabledFederatedVerifier),
        }
    }
}

#[async_trait]
impl FederatedTokenVerifier for JwtFederatedVerifier {
    async fn verify(&self, token: &str) -> AuthResult<FederatedIdentity> {
        let claims = self
            .jwt
            .decode::<FederatedClaims>(token)
            .map_err(|e| AuthError::invalid_grant(format!("Unable to verify JWT: {e}")))?
            .claims;

        if claims.token_use.as_deref().is_some_and(|u| u != "access") {
            return Err(AuthError::invalid_grant("Not an access token"));
        }
        if let Some(audience) = &self.audience {
            if claims.client_id.as_deref() != Some(audience.as_str()) {
                return Err(AuthError::invalid_grant("Token issued to another client"));
            }
        }

        Ok(FederatedIdentity {
            username: claims.username.unwrap_or_else(|| claims.sub.clone()),
            subject: claims.sub,
        })
    }
}

/// Rejects every token.
pub struct DisabledFederatedVerifier;

#[async_trait]
impl FederatedTokenVerifier for DisabledFederatedVerifier {
    async fn verify(&self, _token: &str) -> AuthResult<FederatedIdentity> {
        Err(AuthError::invalid_grant("Federated sign-in is not configured"))
    }
}

// =============================================================================
// Server access
// =============================================================================

/// Legacy permission to start and stop the game server.
#[async_trait]
pub trait ServerAccessChecker: Send + Sync {
    /// Returns `true` if the user may start the server, recording the start.
    ///
    /// # Errors
    ///
    /// Returns an error if the access ledger cannot be read or written.
    async fn check_server_access(&self, username: &str) -> AuthResult<bool>;
}
