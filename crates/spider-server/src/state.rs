//! Application state and store wiring.
//!
//! Every store, verifier and service is built once here and handed to the
//! router as `Arc<dyn Trait>`.

use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;

use spider_auth::authorizer::{
    CredentialServices, JwtFederatedVerifier, JwtSessionCookieVerifier, RequestAuthorizer,
    build_authorizer, default_operations,
};
use spider_auth::config::SigningConfig;
use spider_auth::oauth::OAuthService;
use spider_auth::storage::UserDirectory;
use spider_auth::token::{JwtService, JwtTokenIssuer, SigningAlgorithm, SigningKey};
use spider_auth_memory::MemoryBackend;

use crate::config::AppConfig;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub oauth: Arc<OAuthService>,
    pub authorizer: Arc<dyn RequestAuthorizer>,
    pub backend: MemoryBackend,
    pub config: Arc<AppConfig>,
}

impl FromRef<AppState> for Arc<OAuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.oauth.clone()
    }
}

impl FromRef<AppState> for Arc<dyn RequestAuthorizer> {
    fn from_ref(state: &AppState) -> Self {
        state.authorizer.clone()
    }
}

impl FromRef<AppState> for Arc<dyn UserDirectory> {
    fn from_ref(state: &AppState) -> Self {
        state.backend.users.clone()
    }
}

impl AppState {
    /// Builds the in-memory stores from configuration, then the services.
    pub async fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let backend = MemoryBackend::from_config(&cfg.auth)
            .await
            .context("failed to initialize storage")?;
        Self::with_backend(cfg, backend).await
    }

    /// Builds the services on top of an existing backend.
    pub async fn with_backend(cfg: &AppConfig, backend: MemoryBackend) -> anyhow::Result<Self> {
        let auth = &cfg.auth;

        let jwt = Arc::new(JwtService::new(
            load_signing_key(&auth.signing).await?,
            auth.issuer.clone(),
        ));
        let issuer = Arc::new(JwtTokenIssuer::new(jwt, auth.issuer.clone()).with_lifetimes(&auth.oauth));

        let oauth = Arc::new(OAuthService::new(
            backend.authorizations.clone(),
            backend.tokens.clone(),
            backend.clients.clone(),
            backend.users.clone(),
            issuer,
        ));

        // The cookie is minted by the platform login, not by us: no issuer check.
        let cookie_key = match &auth.cookie.secret {
            Some(secret) => SigningKey::from_secret("session-cookie", secret.as_bytes()),
            None => load_signing_key(&auth.signing).await?,
        };
        let cookies = Arc::new(JwtSessionCookieVerifier::new(Arc::new(
            JwtService::without_issuer(cookie_key),
        )));

        let services = CredentialServices {
            tokens: backend.tokens.clone(),
            clients: backend.clients.clone(),
            users: backend.users.clone(),
            cookies,
            federated: JwtFederatedVerifier::from_config(&auth.federated),
            server_access: backend.server_access.clone(),
            cookie_name: auth.cookie.name.clone(),
            platform_header: auth.authorizer.platform_header.clone(),
        };
        let authorizer = build_authorizer(
            &auth.authorizer,
            &auth.cookie,
            default_operations(),
            services,
        );

        Ok(Self {
            oauth,
            authorizer,
            backend,
            config: Arc::new(cfg.clone()),
        })
    }
}

/// Loads the token signing key described by the configuration.
pub async fn load_signing_key(signing: &SigningConfig) -> anyhow::Result<SigningKey> {
    match signing.algorithm.parse::<SigningAlgorithm>()? {
        SigningAlgorithm::HS256 => {
            let secret = signing
                .secret
                .as_deref()
                .context("auth.signing.secret is required for HS256")?;
            Ok(SigningKey::from_secret(signing.kid.clone(), secret.as_bytes()))
        }
        SigningAlgorithm::RS256 => {
            let (Some(private_path), Some(public_path)) =
                (&signing.private_key_path, &signing.public_key_path)
            else {
                anyhow::bail!("auth.signing.private_key_path and public_key_path are required for RS256");
            };
            let private_pem = read_pem(private_path).await?;
            let public_pem = read_pem(public_path).await?;
            Ok(SigningKey::from_rsa_pem(
                signing.kid.clone(),
                &private_pem,
                &public_pem,
            )?)
        }
    }
}

async fn read_pem(path: &std::path::Path) -> anyhow::Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hs256_key_needs_secret() {
        let mut signing = SigningConfig::default();
        assert!(load_signing_key(&signing).await.is_err());

        signing.secret = Some("secret".into());
        let key = load_signing_key(&signing).await.unwrap();
        assert_eq!(key.kid, "spider-1");
    }

    #[tokio::test]
    async fn test_rs256_missing_file() {
        let signing = SigningConfig {
            algorithm: "RS256".into(),
            private_key_path: Some("/nonexistent/private.pem".into()),
            public_key_path: Some("/nonexistent/public.pem".into()),
            ..SigningConfig::default()
        };
        let err = load_signing_key(&signing).await.unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[tokio::test]
    async fn test_unknown_algorithm() {
        let signing = SigningConfig {
            algorithm: "ES384".into(),
            ..SigningConfig::default()
        };
        let err = load_signing_key(&signing).await.unwrap_err();
        assert!(err.to_string().contains("ES384"));
    }

    #[tokio::test]
    async fn test_state_builds_from_defaults() {
        let mut cfg = AppConfig::default();
        cfg.auth.signing.secret = Some("secret".into());

        let state = AppState::from_config(&cfg).await.unwrap();
        assert!(state.backend.clients.is_empty());
    }
}
