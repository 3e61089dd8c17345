//! Token issuance.
//!
//! The lifecycle operations ask a [`TokenIssuer`] for token strings and
//! persist the returned values themselves. The issuer never touches storage.

use std::sync::Arc;

use async_trait::async_trait;

use super::jwt::{AccessTokenClaims, IdTokenClaims, JwtService, validity_window};
use crate::AuthResult;
use crate::config::OAuthConfig;
use crate::types::{ACCESS_TOKEN_TTL_SECONDS, REFRESH_TOKEN_TTL_SECONDS, Token, join_scopes};

/// A freshly minted token string with its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub value: String,
    pub expires_in: i64,
}

/// Produces access, refresh and id token strings.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Mints an access token.
    ///
    /// # Errors
    ///
    /// Returns `Issuer` if the token cannot be signed.
    async fn issue_access_token(
        &self,
        authorization_id: &str,
        client_id: &str,
        user_id: &str,
        scopes: &[String],
    ) -> AuthResult<IssuedToken>;

    /// Mints a refresh token.
    ///
    /// # Errors
    ///
    /// Returns `Issuer` if the token cannot be produced.
    async fn issue_refresh_token(
        &self,
        authorization_id: &str,
        client_id: &str,
        user_id: &str,
        scopes: &[String],
    ) -> AuthResult<IssuedToken>;

    /// Mints an OpenID Connect id token.
    ///
    /// # Errors
    ///
    /// Returns `Issuer` if the token cannot be signed.
    async fn issue_id_token(
        &self,
        user_id: &str,
        client_id: &str,
        display_name: &str,
        session_id: &str,
        scopes: &[String],
    ) -> AuthResult<String>;
}

/// [`TokenIssuer`] signing access and id tokens with a [`JwtService`].
///
/// Refresh tokens are opaque random strings.
pub struct JwtTokenIssuer {
    jwt: Arc<JwtService>,
    issuer: String,
    access_token_ttl: i64,
    refresh_token_ttl: i64,
}

impl JwtTokenIssuer {
    /// Creates an issuer with the default lifetimes (1 hour / 60 days).
    #[must_use]
    pub fn new(jwt: Arc<JwtService>, issuer: impl Into<String>) -> Self {
        Self {
            jwt,
            issuer: issuer.into(),
            access_token_ttl: ACCESS_TOKEN_TTL_SECONDS,
            refresh_token_ttl: REFRESH_TOKEN_TTL_SECONDS,
        }
    }

    /// Takes the access and refresh lifetimes from configuration.
    #[must_use]
    pub fn with_lifetimes(mut self, oauth: &OAuthConfig) -> Self {
        self.access_token_ttl = duration_to_secs(oauth.access_token_lifetime);
        self.refresh_token_ttl = duration_to_secs(oauth.refresh_token_lifetime);
        self
    }
}

fn duration_to_secs(duration: std::time::Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

#[async_trait]
impl TokenIssuer for JwtTokenIssuer {
    async fn issue_access_token(
        &self,
        authorization_id: &str,
        client_id: &str,
        user_id: &str,
        scopes: &[String],
    ) -> AuthResult<IssuedToken> {
        let claims = AccessTokenClaims::new(
            &self.issuer,
            user_id,
            client_id,
            authorization_id,
            join_scopes(scopes),
            self.access_token_ttl,
        );
        let value = self.jwt.encode(&claims)?;
        Ok(IssuedToken {
            value,
            expires_in: self.access_token_ttl,
        })
    }

    async fn issue_refresh_token(
        &self,
        _authorization_id: &str,
        _client_id: &str,
        _user_id: &str,
        _scopes: &[String],
    ) -> AuthResult<IssuedToken> {
        Ok(IssuedToken {
            value: Token::generate_opaque_value(),
            expires_in: self.refresh_token_ttl,
        })
    }

    async fn issue_id_token(
        &self,
        user_id: &str,
        client_id: &str,
        display_name: &str,
        session_id: &str,
        scopes: &[String],
    ) -> AuthResult<String> {
        let (iat, exp) = validity_window(self.access_token_ttl);
        let claims = IdTokenClaims {
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
            aud: client_id.to_string(),
            exp,
            iat,
            name: display_name.to_string(),
            sid: session_id.to_string(),
            scope: join_scopes(scopes),
        };
        Ok(self.jwt.encode(&claims)?)
    }
}
