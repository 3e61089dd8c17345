//! Authorizer output: IAM-style policy documents and caller identity.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Principal reported when the caller is anonymous or denied.
pub const ANONYMOUS_PRINCIPAL: &str = "user";

const POLICY_VERSION: &str = "2012-10-17";
const INVOKE_ACTION: &str = "execute-api:Invoke";

// =============================================================================
// Identity
// =============================================================================

/// OAuth client identity attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthIdentity {
    pub client_id: String,
    pub scopes: Vec<String>,
}

/// Who a successful mechanism resolved the caller to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// A platform user, optionally acting through an OAuth client.
    User {
        user_id: String,
        display_name: String,
        site_access: Vec<String>,
        api_access: Vec<String>,
        token_expiry: Option<i64>,
        oauth: Option<OAuthIdentity>,
    },
    /// An OAuth client acting as itself.
    Client(OAuthIdentity),
}

impl Identity {
    /// Creates a user identity without OAuth context.
    #[must_use]
    pub fn user(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self::User {
            user_id: user_id.into(),
            display_name: display_name.into(),
            site_access: Vec::new(),
            api_access: Vec::new(),
            token_expiry: None,
            oauth: None,
        }
    }

    /// Principal the policy is issued for.
    #[must_use]
    pub fn principal_id(&self) -> &str {
        match self {
            Self::User { user_id, .. } => user_id,
            Self::Client(oauth) => &oauth.client_id,
        }
    }

    /// OAuth scopes held by this identity, if it came from an OAuth credential.
    #[must_use]
    pub fn scopes(&self) -> Option<&[String]> {
        match self {
            Self::User { oauth, .. } => oauth.as_ref().map(|o| o.scopes.as_slice()),
            Self::Client(oauth) => Some(&oauth.scopes),
        }
    }

    /// Encodes the identity as policy context (scalar values only).
    #[must_use]
    pub fn to_context(&self) -> Map<String, Value> {
        let mut context = Map::new();
        let oauth = match self {
            Self::User {
                user_id,
                display_name,
                site_access,
                api_access,
                token_expiry,
                oauth,
            } => {
                context.insert("userId".into(), json!(user_id));
                context.insert("displayName".into(), json!(display_name));
                context.insert("siteAccess".into(), json!(site_access.join(",")));
                context.insert("apiAccess".into(), json!(api_access.join(",")));
                if let Some(expiry) = token_expiry {
                    context.insert("tokenExpiry".into(), json!(expiry));
                }
                oauth.as_ref()
            }
            Self::Client(oauth) => Some(oauth),
        };
        if let Some(oauth) = oauth {
            // Nested objects are not allowed in the context; ship JSON text.
            let encoded = serde_json::to_string(oauth).unwrap_or_default();
            context.insert("oauth".into(), Value::String(encoded));
        }
        context
    }
}

// =============================================================================
// Policy
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub action: String,
    pub effect: Effect,
    pub resource: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

/// Authorizer decision in the API gateway policy format.
///
/// ```json
/// {
///   "principalId": "user-1",
///   "policyDocument": {
///     "Version": "2012-10-17",
///     "Statement": [
///       { "Action": "execute-api:Invoke", "Effect": "Allow", "Resource": "arn:..." }
///     ]
///   },
///   "context": { "userId": "user-1", "displayName": "Parker" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerPolicy {
    pub principal_id: String,
    pub policy_document: PolicyDocument,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl AuthorizerPolicy {
    fn new(principal_id: String, effect: Effect, resource: &str, context: Map<String, Value>) -> Self {
        Self {
            principal_id,
            policy_document: PolicyDocument {
                version: POLICY_VERSION.to_string(),
                statement: vec![Statement {
                    action: INVOKE_ACTION.to_string(),
                    effect,
                    resource: resource.to_string(),
                }],
            },
            context,
        }
    }

    /// Allows the request, attaching the identity if there is one.
    #[must_use]
    pub fn allow(identity: Option<&Identity>, resource: &str) -> Self {
        match identity {
            Some(identity) => Self::new(
                identity.principal_id().to_string(),
                Effect::Allow,
                resource,
                identity.to_context(),
            ),
            None => Self::new(ANONYMOUS_PRINCIPAL.to_string(), Effect::Allow, resource, Map::new()),
        }
    }

    /// Denies the request with a message for the caller.
    #[must_use]
    pub fn deny(message: &str, resource: &str) -> Self {
        let mut context = Map::new();
        context.insert("message".into(), json!(message));
        Self::new(ANONYMOUS_PRINCIPAL.to_string(), Effect::Deny, resource, context)
    }

    /// Effect of the (single) statement.
    #[must_use]
    pub fn effect(&self) -> Effect {
        self.policy_document
            .statement
            .first()
            .map_or(Effect::Deny, |s| s.effect)
    }

    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.effect() == Effect::Allow
    }

    /// Deny message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.context.get("message").and_then(Value::as_str)
    }
}

// =============================================================================
// Context seen by handlers
// =============================================================================

/// Caller identity handed to downstream handlers, decoded from an allow
/// policy's context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizerContext {
    pub principal_id: String,
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub oauth: Option<OAuthIdentity>,
}

impl AuthorizerContext {
    #[must_use]
    pub fn from_policy(policy: &AuthorizerPolicy) -> Self {
        let text = |key: &str| {
            policy
                .context
                .get(key)
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty())
                .map(ToString::to_string)
        };

        Self {
            principal_id: policy.principal_id.clone(),
            user_id: text("userId"),
            display_name: text("displayName"),
            oauth: text("oauth").and_then(|raw| serde_json::from_str(&raw).ok()),
        }
    }

    /// Client the request came through, if any.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.oauth.as_ref().map(|o| o.client_id.as_str())
    }

    /// Client that authenticated as itself (no user behind it).
    #[must_use]
    pub fn authenticated_client(&self) -> Option<&str> {
        if self.user_id.is_some() {
            return None;
        }
        self.client_id()
    }
}
