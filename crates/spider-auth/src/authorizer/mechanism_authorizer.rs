//! Per-operation mechanism authorizer.
//!
//! # Evaluation
//!
//! 1. Look up the operation's [`OperationPolicy`]; none → deny
//! 2. Require the platform access-token header unless the policy waives it
//! 3. Try each mechanism in [`order_mechanisms`] order; the first that
//!    resolves the caller wins, failures fall through to the next
//! 4. Nothing matched → deny

use async_trait::async_trait;

use super::mechanism::{AuthMechanism, OperationPolicy, OperationTable, order_mechanisms};
use super::policy::{AuthorizerPolicy, Identity, OAuthIdentity};
use super::request::AuthorizerRequest;
use super::{CredentialServices, RequestAuthorizer};
use crate::AuthResult;
use crate::error::AuthError;
use crate::types::TokenType;

pub const DENY_UNKNOWN_CONFIGURATION: &str = "unknown configuration";
pub const DENY_MISSING_ACCESS_TOKEN: &str = "No auth token";
pub const DENY_AUTHENTICATION_FAILED: &str = "authentication failed";

/// Authorizer driven by an [`OperationTable`].
pub struct MechanismAuthorizer {
    operations: OperationTable,
    services: CredentialServices,
}

impl MechanismAuthorizer {
    #[must_use]
    pub fn new(operations: OperationTable, services: CredentialServices) -> Self {
        Self {
            operations,
            services,
        }
    }

    /// Runs one mechanism.
    ///
    /// `Ok(None)` means allowed without identity (`public`).
    async fn try_mechanism(
        &self,
        mechanism: AuthMechanism,
        policy: &OperationPolicy,
        request: &AuthorizerRequest,
        platform_token: Option<&str>,
    ) -> AuthResult<Option<Identity>> {
        match mechanism {
            AuthMechanism::Public => Ok(None),
            AuthMechanism::Cookie => self
                .services
                .cookie_identity(request)
                .await
                .map(Some)
                .ok_or_else(|| AuthError::invalid_grant("No valid session cookie")),
            AuthMechanism::Bearer => self.bearer(policy, request).await.map(Some),
            AuthMechanism::ClientSecretBasicAuth => self.basic(policy, request).await.map(Some),
            AuthMechanism::ApiKey => self.api_key(policy, platform_token).await.map(Some),
            AuthMechanism::Cognito => self.federated(policy, platform_token).await.map(Some),
        }
    }

    async fn bearer(
        &self,
        policy: &OperationPolicy,
        request: &AuthorizerRequest,
    ) -> AuthResult<Identity> {
        let value = request
            .bearer_token()
            .ok_or_else(|| AuthError::invalid_grant("No bearer token"))?;

        let token = self.services.tokens.get_by_value(value).await?;
        if token.token_type != TokenType::Access {
            return Err(AuthError::invalid_grant("Not an access token"));
        }
        if token.is_expired() {
            return Err(AuthError::invalid_grant("Access token expired"));
        }
        require_scopes(policy, &token.scopes)?;

        let user = self.services.users.get_user(&token.user_id).await?;

        Ok(Identity::User {
            user_id: user.id,
            display_name: user.display_name,
            site_access: user.site_access,
            api_access: user.api_access,
            token_expiry: Some(token.expires_at.unix_timestamp()),
            oauth: Some(OAuthIdentity {
                client_id: token.client_id,
                scopes: token.scopes,
            }),
        })
    }

    async fn basic(
        &self,
        policy: &OperationPolicy,
        request: &AuthorizerRequest,
    ) -> AuthResult<Identity> {
        let credentials = request
            .basic_credentials()
            .ok_or_else(|| AuthError::invalid_client("No basic credentials"))?;

        // An empty username means the secret alone identifies the client.
        let client = if credentials.username.is_empty() {
            self.services
                .clients
                .get_client_by_secret(&credentials.password)
                .await?
        } else {
            self.services
                .clients
                .verify_credentials(&credentials.username, &credentials.password)
                .await?
        }
        .ok_or_else(|| AuthError::invalid_client("Invalid client credentials"))?;

        require_scopes(policy, &client.scopes)?;
        Ok(client_identity(client.client_id, client.scopes))
    }

    async fn api_key(
        &self,
        policy: &OperationPolicy,
        platform_token: Option<&str>,
    ) -> AuthResult<Identity> {
        let key = platform_token.ok_or_else(|| AuthError::invalid_client("No API key"))?;
        let client = self
            .services
            .clients
            .get_client_by_api_key(key)
            .await?
            .ok_or_else(|| AuthError::invalid_client("Unknown API key"))?;

        require_scopes(policy, &client.scopes)?;
        Ok(client_identity(client.client_id, client.scopes))
    }

    async fn federated(
        &self,
        policy: &OperationPolicy,
        platform_token: Option<&str>,
    ) -> AuthResult<Identity> {
        let token = platform_token.ok_or_else(|| AuthError::invalid_grant("No auth token"))?;
        let identity = self.services.federated.verify(token).await?;

        if policy.check_authz
            && !self
                .services
                .server_access
                .check_server_access(&identity.username)
                .await?
        {
            return Err(AuthError::invalid_grant("Not allowed to start server"));
        }

        Ok(Identity::user(identity.subject, identity.username))
    }
}

fn require_scopes(policy: &OperationPolicy, granted: &[String]) -> AuthResult<()> {
    if policy.scopes_satisfied(granted) {
        Ok(())
    } else {
        Err(AuthError::invalid_grant("Insufficient scope"))
    }
}

fn client_identity(client_id: String, scopes: Vec<String>) -> Identity {
    Identity::Client(OAuthIdentity { client_id, scopes })
}

#[async_trait]
impl RequestAuthorizer for MechanismAuthorizer {
    async fn authorize(&self, request: &AuthorizerRequest) -> AuthorizerPolicy {
        let resource = request.method_arn.as_str();

        let Some((operation, policy)) = request
            .operation_name
            .as_deref()
            .and_then(|op| self.operations.get(op).map(|p| (op, p)))
        else {
            tracing::warn!(
                operation = ?request.operation_name,
                path = %request.path,
                "No authorizer configuration for operation"
            );
            return AuthorizerPolicy::deny(DENY_UNKNOWN_CONFIGURATION, resource);
        };

        let platform_token = request.non_empty_header(&self.services.platform_header);
        if policy.require_access_token && platform_token.is_none() {
            tracing::debug!(operation = %operation, "Missing platform access token");
            return AuthorizerPolicy::deny(DENY_MISSING_ACCESS_TOKEN, resource);
        }

        for mechanism in order_mechanisms(&policy.mechanisms) {
            match self
                .try_mechanism(mechanism, policy, request, platform_token)
                .await
            {
                Ok(identity) => {
                    tracing::info!(
                        operation = %operation,
                        mechanism = %mechanism,
                        principal = identity.as_ref().map_or("anonymous", Identity::principal_id),
                        "Request authorized"
                    );
                    return AuthorizerPolicy::allow(identity.as_ref(), resource);
                }
                Err(e) => {
                    tracing::debug!(
                        operation = %operation,
                        mechanism = %mechanism,
                        error = %e,
                        "Mechanism did not authenticate the request"
                    );
                }
            }
        }

        tracing::info!(operation = %operation, "No mechanism authenticated the request");
        AuthorizerPolicy::deny(DENY_AUTHENTICATION_FAILED, resource)
    }
}
