//! Shadow mode: the legacy and mechanism authorizers side by side.
//!
//! Both run concurrently on every request and their policies are compared.
//! The legacy decision is returned, except for requests carrying HTTP Basic
//! credentials, which only the mechanism authorizer understands.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::RequestAuthorizer;
use super::policy::AuthorizerPolicy;
use super::request::AuthorizerRequest;

/// Context key carrying the comparison result.
pub const SHADOW_MODE_KEY: &str = "shadowMode";

pub struct ShadowAuthorizer {
    legacy: Arc<dyn RequestAuthorizer>,
    mechanism: Arc<dyn RequestAuthorizer>,
}

impl ShadowAuthorizer {
    #[must_use]
    pub fn new(legacy: Arc<dyn RequestAuthorizer>, mechanism: Arc<dyn RequestAuthorizer>) -> Self {
        Self { legacy, mechanism }
    }
}

/// Returns `true` if two policies are identical (principal, statements and
/// context).
#[must_use]
pub fn compare_policies(legacy: &AuthorizerPolicy, mechanism: &AuthorizerPolicy) -> bool {
    legacy == mechanism
}

#[async_trait]
impl RequestAuthorizer for ShadowAuthorizer {
    async fn authorize(&self, request: &AuthorizerRequest) -> AuthorizerPolicy {
        let (legacy, mechanism) = tokio::join!(
            self.legacy.authorize(request),
            self.mechanism.authorize(request)
        );

        let matched = compare_policies(&legacy, &mechanism);
        if !matched {
            tracing::warn!(
                path = %request.path,
                operation = ?request.operation_name,
                legacy_effect = ?legacy.effect(),
                legacy_principal = %legacy.principal_id,
                mechanism_effect = ?mechanism.effect(),
                mechanism_principal = %mechanism.principal_id,
                "Authorizer shadow mismatch"
            );
        }

        let mut chosen = if request.has_basic_credentials() {
            mechanism
        } else {
            legacy
        };
        chosen.context.insert(
            SHADOW_MODE_KEY.to_string(),
            Value::String(if matched { "success" } else { "failure" }.to_string()),
        );
        chosen
    }
}
