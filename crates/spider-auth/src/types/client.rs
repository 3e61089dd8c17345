//! Registered OAuth clients.

use serde::{Deserialize, Serialize};

// =============================================================================
// Grant Type
// =============================================================================

/// OAuth 2.0 grant types supported by the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    RefreshToken,
}

impl GrantType {
    /// Returns the OAuth 2.0 grant_type parameter value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }

    /// Parses a `grant_type` parameter value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "authorization_code" => Some(Self::AuthorizationCode),
            "refresh_token" => Some(Self::RefreshToken),
            _ => None,
        }
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Client
// =============================================================================

/// A registered OAuth/OIDC client.
///
/// Clients are looked up by id (OAuth flows), by secret (HTTP Basic
/// credentials) or by API key (platform access-token header).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcClient {
    pub client_id: String,

    /// Display name shown on the consent screen.
    #[serde(default)]
    pub client_name: String,

    pub client_secret: String,

    /// Exact-match allow list for `redirect_uri`.
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Scopes the client may hold when it authenticates as itself.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Grant types the client may use. Empty means all supported grants.
    #[serde(default)]
    pub grant_types: Vec<GrantType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl OidcClient {
    /// Returns `true` if `redirect_uri` is registered for this client.
    #[must_use]
    pub fn has_redirect_uri(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|uri| uri == redirect_uri)
    }

    /// Compares a presented secret against the registered one.
    ///
    /// Runs in time independent of where the first mismatch is.
    #[must_use]
    pub fn verify_secret(&self, presented: &str) -> bool {
        constant_time_eq(self.client_secret.as_bytes(), presented.as_bytes())
    }

    /// Returns `true` if `key` is this client's API key.
    #[must_use]
    pub fn matches_api_key(&self, key: &str) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|own| constant_time_eq(own.as_bytes(), key.as_bytes()))
    }

    /// Returns `true` if the client may use the given grant type.
    #[must_use]
    pub fn allows_grant_type(&self, grant_type: GrantType) -> bool {
        self.grant_types.is_empty() || self.grant_types.contains(&grant_type)
    }

    /// Checks the registration for obviously broken entries.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.client_id.trim().is_empty() {
            return Err("clientId must not be empty".to_string());
        }
        if self.client_secret.is_empty() {
            return Err(format!("client {}: clientSecret must not be empty", self.client_id));
        }
        for uri in &self.redirect_uris {
            url::Url::parse(uri).map_err(|e| {
                format!("client {}: invalid redirect URI '{uri}': {e}", self.client_id)
            })?;
        }
        Ok(())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_client() -> OidcClient {
        OidcClient {
            client_id: "c1".to_string(),
            client_name: "Date Tracker".to_string(),
            client_secret: "s3cret".to_string(),
            redirect_uris: vec!["https://app.example.com/callback".to_string()],
            scopes: vec!["read".to_string()],
            grant_types: vec![],
            api_key: Some("key-1".to_string()),
        }
    }

    #[test]
    fn test_redirect_uri_exact_match() {
        let client = create_test_client();
        assert!(client.has_redirect_uri("https://app.example.com/callback"));
        assert!(!client.has_redirect_uri("https://app.example.com/callback/"));
    }

    #[test]
    fn test_secret_and_api_key() {
        let client = create_test_client();
        assert!(client.verify_secret("s3cret"));
        assert!(!client.verify_secret("s3creT"));
        assert!(!client.verify_secret(""));
        assert!(client.matches_api_key("key-1"));
        assert!(!client.matches_api_key("key-2"));
    }

    #[test]
    fn test_grant_types_default_to_all() {
        let mut client = create_test_client();
        assert!(client.allows_grant_type(GrantType::RefreshToken));
        client.grant_types = vec![GrantType::AuthorizationCode];
        assert!(!client.allows_grant_type(GrantType::RefreshToken));
    }

    #[test]
    fn test_validate_rejects_bad_redirect() {
        let mut client = create_test_client();
        assert!(client.validate().is_ok());
        client.redirect_uris.push("not a url".to_string());
        assert!(client.validate().is_err());
    }

    #[test]
    fn test_deserialize_registration() {
        let json = r#"{
            "clientId": "c1",
            "clientName": "Date Tracker",
            "clientSecret": "s3cret",
            "redirectUris": ["https://app.example.com/callback"],
            "grantTypes": ["authorization_code", "refresh_token"]
        }"#;
        let client: OidcClient = serde_json::from_str(json).unwrap();
        assert_eq!(client.grant_types.len(), 2);
        assert!(client.api_key.is_none());
        assert!(client.scopes.is_empty());
    }
}
