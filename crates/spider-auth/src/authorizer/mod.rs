//! Request authorizer.
//!
//! Turns an inbound request into an allow/deny [`AuthorizerPolicy`] plus
//! caller identity. Two implementations exist:
//!
//! - [`LegacyAuthorizer`] - path based: bypass list, session cookie, then a
//!   federated IdP token
//! - [`MechanismAuthorizer`] - per-operation ordered mechanism policies
//!
//! [`ShadowAuthorizer`] runs both side by side while callers migrate.
//!
//! Authorizers never fail: every error resolves to a deny policy.

pub mod legacy;
pub mod mechanism;
pub mod mechanism_authorizer;
pub mod policy;
pub mod request;
pub mod shadow;
pub mod verifier;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{AuthorizerConfig, CookieConfig};
use crate::storage::{ClientRegistry, TokenStorage, UserDirectory};

pub use legacy::LegacyAuthorizer;
pub use mechanism::{
    AuthMechanism, OperationPolicy, OperationTable, default_operations, order_mechanisms,
    web_operation,
};
pub use mechanism_authorizer::MechanismAuthorizer;
pub use policy::{AuthorizerContext, AuthorizerPolicy, Effect, Identity, OAuthIdentity};
pub use request::{AuthorizerRequest, BasicCredentials};
pub use shadow::{ShadowAuthorizer, compare_policies};
pub use verifier::{
    DisabledFederatedVerifier, FederatedIdentity, FederatedTokenVerifier, JwtFederatedVerifier,
    JwtSessionCookieVerifier, ServerAccessChecker, SessionCookieVerifier,
};

/// Decides whether a request may proceed.
#[async_trait]
pub trait RequestAuthorizer: Send + Sync {
    async fn authorize(&self, request: &AuthorizerRequest) -> AuthorizerPolicy;
}

/// Everything the authorizers resolve credentials against.
#[derive(Clone)]
pub struct CredentialServices {
    pub tokens: Arc<dyn TokenStorage>,
    pub clients: Arc<dyn ClientRegistry>,
    pub users: Arc<dyn UserDirectory>,
    pub cookies: Arc<dyn SessionCookieVerifier>,
    pub federated: Arc<dyn FederatedTokenVerifier>,
    pub server_access: Arc<dyn ServerAccessChecker>,

    /// Name of the session cookie.
    pub cookie_name: String,

    /// Header carrying the platform access token.
    pub platform_header: String,
}

impl CredentialServices {
    /// Resolves the session cookie to a user identity.
    pub(crate) async fn cookie_identity(&self, request: &AuthorizerRequest) -> Option<Identity> {
        let cookie = request.cookie(&self.cookie_name)?;
        match self.cookies.verify(&cookie).await {
            Ok(claims) => Some(Identity::User {
                user_id: claims.user_id,
                display_name: claims.display_name,
                site_access: claims.site_access,
                api_access: claims.api_access,
                token_expiry: Some(claims.exp),
                oauth: None,
            }),
            Err(e) => {
                tracing::debug!(error = %e, "Cookie authentication failed");
                None
            }
        }
    }
}

/// Builds the authorizer configured for the deployment.
#[must_use]
pub fn build_authorizer(
    config: &AuthorizerConfig,
    cookie: &CookieConfig,
    operations: OperationTable,
    services: CredentialServices,
) -> Arc<dyn RequestAuthorizer> {
    let services = CredentialServices {
        cookie_name: cookie.name.clone(),
        platform_header: config.platform_header.clone(),
        ..services
    };
    let mechanism = Arc::new(MechanismAuthorizer::new(operations, services.clone()));

    if config.shadow_mode {
        tracing::info!("Request authorizer running in shadow mode");
        let legacy = Arc::new(LegacyAuthorizer::new(
            config.bypass_paths.clone(),
            config.protected_paths.clone(),
            services,
        ));
        Arc::new(ShadowAuthorizer::new(legacy, mechanism))
    } else {
        mechanism
    }
}
