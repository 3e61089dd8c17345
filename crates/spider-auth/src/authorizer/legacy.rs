//! Path-based legacy authorizer.
//!
//! 1. Bypass paths are allowed anonymously
//! 2. A valid session cookie allows the request as that user
//! 3. Otherwise the platform access-token header must hold a federated IdP
//!    token; protected paths additionally need server access

use async_trait::async_trait;

use super::policy::{AuthorizerPolicy, Identity};
use super::request::AuthorizerRequest;
use super::{CredentialServices, RequestAuthorizer};

pub struct LegacyAuthorizer {
    bypass_paths: Vec<String>,
    protected_paths: Vec<String>,
    services: CredentialServices,
}

impl LegacyAuthorizer {
    #[must_use]
    pub fn new(
        bypass_paths: Vec<String>,
        protected_paths: Vec<String>,
        services: CredentialServices,
    ) -> Self {
        Self {
            bypass_paths,
            protected_paths,
            services,
        }
    }

    fn matches(paths: &[String], path: &str) -> bool {
        paths.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}

#[async_trait]
impl RequestAuthorizer for LegacyAuthorizer {
    async fn authorize(&self, request: &AuthorizerRequest) -> AuthorizerPolicy {
        let resource = request.method_arn.as_str();

        if Self::matches(&self.bypass_paths, &request.path) {
            return AuthorizerPolicy::allow(None, resource);
        }

        if let Some(identity) = self.services.cookie_identity(request).await {
            return AuthorizerPolicy::allow(Some(&identity), resource);
        }

        let Some(token) = request.non_empty_header(&self.services.platform_header) else {
            return AuthorizerPolicy::deny("No auth token", resource);
        };

        let federated = match self.services.federated.verify(token).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::info!(error = %e, "Unable to verify federated token");
                return AuthorizerPolicy::deny("Unable to verify jwt", resource);
            }
        };

        if Self::matches(&self.protected_paths, &request.path) {
            match self
                .services
                .server_access
                .check_server_access(&federated.username)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    tracing::info!(username = %federated.username, "Server access denied");
                    return AuthorizerPolicy::deny("Not allowed to start server", resource);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Server access check failed");
                    return AuthorizerPolicy::deny("Server access verification failed", resource);
                }
            }
        }

        let identity = Identity::user(federated.subject, federated.username);
        AuthorizerPolicy::allow(Some(&identity), resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorizer::test_support::{AuthorizerFixture, request};
    use crate::config::AuthorizerConfig;
    use crate::testing::USER_ID;

    const HEADER: &str = "spider-access-token";

    fn legacy(fx: &AuthorizerFixture) -> LegacyAuthorizer {
        let config = AuthorizerConfig::default();
        LegacyAuthorizer::new(config.bypass_paths, config.protected_paths, fx.services.clone())
    }

    #[tokio::test]
    async fn test_bypass_paths_are_prefix_matched() {
        let fx = AuthorizerFixture::new();
        let auth = legacy(&fx);

        for path in ["/server/status", "/v1/registration/start", "/.well-known/jwks.json"] {
            let policy = auth.authorize(&request(path, None, &[])).await;
            assert!(policy.is_allowed(), "{path}");
            assert_eq!(policy.principal_id, "user");
        }
    }

    #[tokio::test]
    async fn test_missing_token_denied() {
        let fx = AuthorizerFixture::new();
        let policy = legacy(&fx).authorize(&request("/server/details", None, &[])).await;
        assert_eq!(policy.message(), Some("No auth token"));
    }

    #[tokio::test]
    async fn test_cookie_allows() {
        let fx = AuthorizerFixture::new();
        let cookie = fx.session_cookie(USER_ID);
        let policy = legacy(&fx)
            .authorize(&request("/server/start", None, &[("Cookie", &cookie)]))
            .await;
        assert!(policy.is_allowed());
        assert_eq!(policy.principal_id, USER_ID);
    }

    #[tokio::test]
    async fn test_federated_token_on_protected_path() {
        let fx = AuthorizerFixture::new();
        let auth = legacy(&fx);

        let token = fx.federated_token("parker");
        let policy = auth.authorize(&request("/server/start", None, &[(HEADER, &token)])).await;
        assert!(policy.is_allowed());
        assert_eq!(policy.context["displayName"], "parker");

        let token = fx.federated_token("stranger");
        let policy = auth.authorize(&request("/server/stop", None, &[(HEADER, &token)])).await;
        assert_eq!(policy.message(), Some("Not allowed to start server"));

        let token = fx.federated_token("broken");
        let policy = auth.authorize(&request("/server/stop", None, &[(HEADER, &token)])).await;
        assert_eq!(policy.message(), Some("Server access verification failed"));

        // Unprotected paths only need a valid token.
        let token = fx.federated_token("stranger");
        let policy = auth.authorize(&request("/server/details", None, &[(HEADER, &token)])).await;
        assert!(policy.is_allowed());
    }

    #[tokio::test]
    async fn test_invalid_federated_token() {
        let fx = AuthorizerFixture::new();
        let policy = legacy(&fx)
            .authorize(&request("/server/details", None, &[(HEADER, "not-a-jwt")]))
            .await;
        assert_eq!(policy.message(), Some("Unable to verify jwt"));
    }
}
