//! Authentication mechanisms and per-operation policies.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Scope prefix of the platform's web APIs.
pub const IRON_SPIDER_API_SCOPE: &str = "iron-spider-api";

/// Ways a caller can prove who they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMechanism {
    /// No credential needed.
    Public,
    /// Platform session cookie.
    Cookie,
    /// OAuth access token in `Authorization: Bearer`.
    Bearer,
    /// OAuth client credentials in `Authorization: Basic`.
    ClientSecretBasicAuth,
    /// Client API key in the platform access-token header.
    ApiKey,
    /// Legacy federated IdP token in the platform access-token header.
    Cognito,
}

impl AuthMechanism {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Cookie => "cookie",
            Self::Bearer => "bearer",
            Self::ClientSecretBasicAuth => "client_secret_basic_auth",
            Self::ApiKey => "api_key",
            Self::Cognito => "cognito",
        }
    }

    fn priority(self) -> u8 {
        match self {
            Self::Cookie | Self::Bearer => 0,
            Self::Cognito => 2,
            _ => 1,
        }
    }
}

impl std::fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Puts `cookie`/`bearer` first and `cognito` last, keeping the configured
/// order otherwise. Duplicates are dropped.
#[must_use]
pub fn order_mechanisms(mechanisms: &[AuthMechanism]) -> Vec<AuthMechanism> {
    let mut ordered: Vec<AuthMechanism> = Vec::with_capacity(mechanisms.len());
    for m in mechanisms {
        if !ordered.contains(m) {
            ordered.push(*m);
        }
    }
    // sort_by_key is stable
    ordered.sort_by_key(|m| m.priority());
    ordered
}

/// How one operation may be called.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationPolicy {
    pub mechanisms: Vec<AuthMechanism>,

    /// Scopes an OAuth credential must carry.
    #[serde(default)]
    pub required_scopes: Vec<String>,

    /// Whether the platform access-token header must be present.
    #[serde(default = "default_true")]
    pub require_access_token: bool,

    /// Whether federated callers also need server access.
    #[serde(default)]
    pub check_authz: bool,
}

fn default_true() -> bool {
    true
}

impl OperationPolicy {
    #[must_use]
    pub fn new(mechanisms: impl IntoIterator<Item = AuthMechanism>) -> Self {
        Self {
            mechanisms: mechanisms.into_iter().collect(),
            required_scopes: Vec::new(),
            require_access_token: true,
            check_authz: false,
        }
    }

    #[must_use]
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn without_access_token(mut self) -> Self {
        self.require_access_token = false;
        self
    }

    #[must_use]
    pub fn with_authz_check(mut self) -> Self {
        self.check_authz = true;
        self
    }

    /// Returns `true` if `granted` covers every required scope.
    #[must_use]
    pub fn scopes_satisfied(&self, granted: &[String]) -> bool {
        self.required_scopes.iter().all(|s| granted.contains(s))
    }
}

/// Policy of a web API operation: bearer or cookie, gated on
/// `iron-spider-api:<domain>.<permission>`.
#[must_use]
pub fn web_operation(domain: &str, permission: &str) -> OperationPolicy {
    OperationPolicy::new([AuthMechanism::Bearer, AuthMechanism::Cookie])
        .scopes([format!("{IRON_SPIDER_API_SCOPE}:{domain}.{permission}")])
}

/// Operation name to policy.
#[derive(Debug, Clone, Default)]
pub struct OperationTable {
    operations: HashMap<String, OperationPolicy>,
}

impl OperationTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, operation: impl Into<String>, policy: OperationPolicy) -> Self {
        self.operations.insert(operation.into(), policy);
        self
    }

    #[must_use]
    pub fn get(&self, operation: &str) -> Option<&OperationPolicy> {
        self.operations.get(operation)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Operation policies of the platform API.
#[must_use]
pub fn default_operations() -> OperationTable {
    use AuthMechanism::{ClientSecretBasicAuth, Cognito, Cookie, Public};

    let modern = [AuthMechanism::Bearer, Cookie];
    let server_control = OperationPolicy::new([Cookie, AuthMechanism::Bearer, Cognito])
        .with_authz_check();

    OperationTable::new()
        .with("ServerStatus", OperationPolicy::new([Public]).without_access_token())
        .with("ServerDetails", OperationPolicy::new(modern))
        .with("UserInfo", OperationPolicy::new(modern))
        .with("StartServer", server_control.clone())
        .with("StopServer", server_control)
        .with("ApproveOAuth", OperationPolicy::new([Cookie]))
        .with("GetOAuthDetails", OperationPolicy::new([Public]).without_access_token())
        .with(
            "GetOAuthTokens",
            OperationPolicy::new([ClientSecretBasicAuth, Public]).without_access_token(),
        )
        .with("OAuthLogout", OperationPolicy::new([Public]).without_access_token())
        .with("ListDates", web_operation("date-tracker", "read"))
        .with("GetDate", web_operation("date-tracker", "read"))
        .with("CreateDate", web_operation("date-tracker", "write"))
        .with("UpdateDate", web_operation("date-tracker", "write"))
        .with("DeleteDate", web_operation("date-tracker", "write"))
}
