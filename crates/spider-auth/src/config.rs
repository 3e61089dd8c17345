//! `[auth]` section: token lifetimes, signing keys, the session cookie, the
//! legacy federated IdP and the request authorizer.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::token::SigningAlgorithm;

/// # Example (TOML)
///
/// ```toml
/// [auth]
/// issuer = "https://api.parkergiven.com"
///
/// [auth.oauth]
/// access_token_lifetime = "1h"
/// refresh_token_lifetime = "60d"
///
/// [auth.signing]
/// algorithm = "HS256"
/// secret = "..."
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// `iss` of every token we mint.
    pub issuer: String,

    pub oauth: OAuthConfig,
    pub signing: SigningConfig,
    pub cookie: CookieConfig,
    pub federated: FederatedConfig,
    pub authorizer: AuthorizerConfig,

    pub clients_file: Option<PathBuf>,
    pub users_file: Option<PathBuf>,
    /// Imported at startup, written back on shutdown.
    pub snapshot_file: Option<PathBuf>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            oauth: OAuthConfig::default(),
            signing: SigningConfig::default(),
            cookie: CookieConfig::default(),
            federated: FederatedConfig::default(),
            authorizer: AuthorizerConfig::default(),
            clients_file: None,
            users_file: None,
            snapshot_file: None,
        }
    }
}

/// Lifetimes, in humantime notation (`"10m"`, `"60d"`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    #[serde(with = "humantime_serde")]
    pub authorization_code_lifetime: Duration,

    /// Access token lifetime. Also used for id tokens.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            authorization_code_lifetime: Duration::from_secs(10 * 60),
            access_token_lifetime: Duration::from_secs(60 * 60),
            refresh_token_lifetime: Duration::from_secs(60 * 24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// `HS256` or `RS256`.
    pub algorithm: String,

    pub secret: Option<String>,
    pub private_key_path: Option<PathBuf>,
    pub public_key_path: Option<PathBuf>,
    /// JWT header `kid`.
    pub kid: String,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            algorithm: "HS256".to_string(),
            secret: None,
            private_key_path: None,
            public_key_path: None,
            kid: "spider-1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieConfig {
    pub name: String,

    /// HS256 secret the cookie JWT is signed with.
    /// Falls back to the token signing key when unset.
    pub secret: Option<String>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "x-pg-id".to_string(),
            secret: None,
        }
    }
}

/// Legacy federated IdP configuration.
///
/// When `secret` is unset every federated token is rejected.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FederatedConfig {
    /// Expected `iss` of federated tokens.
    pub issuer: Option<String>,

    /// Expected `aud` or `client_id` of federated tokens.
    pub audience: Option<String>,

    /// HS256 secret federated tokens are verified with.
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthorizerConfig {
    pub platform_header: String,

    /// Run the legacy and mechanism authorizers side by side and answer
    /// with the legacy decision.
    pub shadow_mode: bool,

    /// Paths the legacy authorizer lets through unauthenticated (prefix match).
    pub bypass_paths: Vec<String>,

    /// Paths the legacy authorizer gates on server access (prefix match).
    pub protected_paths: Vec<String>,
}

impl Default for AuthorizerConfig {
    fn default() -> Self {
        Self {
            platform_header: "spider-access-token".to_string(),
            shadow_mode: false,
            bypass_paths: vec![
                "/v1/registration".to_string(),
                "/v1/authentication".to_string(),
                "/server/status".to_string(),
                "/v1/userInfo".to_string(),
                "/.well-known/jwks.json".to_string(),
            ],
            protected_paths: vec!["/server/start".to_string(), "/server/stop".to_string()],
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Checks the values the services cannot start without.
    ///
    /// # Errors
    ///
    /// `Missing` when the key material for the signing algorithm is absent,
    /// `InvalidValue` for everything else.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::InvalidValue(msg));
        let missing = |key: &str| Err(ConfigError::Missing(format!("auth.signing.{key}")));

        if self.issuer.is_empty() {
            return invalid("issuer cannot be empty".into());
        }

        let lifetimes = [
            ("authorization_code_lifetime", self.oauth.authorization_code_lifetime),
            ("access_token_lifetime", self.oauth.access_token_lifetime),
            ("refresh_token_lifetime", self.oauth.refresh_token_lifetime),
        ];
        if let Some((name, _)) = lifetimes.iter().find(|(_, ttl)| ttl.is_zero()) {
            return invalid(format!("{name} must be > 0"));
        }

        let algorithm = match self.signing.algorithm.parse::<SigningAlgorithm>() {
            Ok(algorithm) => algorithm,
            Err(e) => return invalid(format!("signing algorithm: {e}")),
        };
        match algorithm {
            SigningAlgorithm::HS256 if self.signing.secret.as_deref().is_none_or(str::is_empty) => {
                return missing("secret");
            }
            SigningAlgorithm::RS256 if self.signing.private_key_path.is_none() => {
                return missing("private_key_path");
            }
            SigningAlgorithm::RS256 if self.signing.public_key_path.is_none() => {
                return missing("public_key_path");
            }
            _ => {}
        }

        if self.cookie.name.is_empty() || self.authorizer.platform_header.is_empty() {
            return invalid("cookie name and platform header must be set".into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_secret() -> AuthConfig {
        let mut cfg = AuthConfig::default();
        cfg.signing.secret = Some("test-secret".to_string());
        cfg
    }

    #[test]
    fn test_defaults() {
        let cfg = AuthConfig::default();
        assert_eq!(cfg.signing.algorithm, "HS256");
        assert_eq!(cfg.cookie.name, "x-pg-id");
        assert_eq!(cfg.authorizer.platform_header, "spider-access-token");
        assert!(!cfg.authorizer.shadow_mode);
        assert_eq!(cfg.oauth.authorization_code_lifetime, Duration::from_secs(600));
        assert_eq!(cfg.oauth.refresh_token_lifetime, Duration::from_secs(5_184_000));
    }

    #[test]
    fn test_hs256_needs_secret() {
        let err = AuthConfig::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref key) if key == "auth.signing.secret"));
        assert!(with_secret().validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_issuer() {
        let mut cfg = with_secret();
        cfg.issuer.clear();
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidValue(msg)) if msg.contains("issuer")));
    }

    #[test]
    fn test_rejects_unknown_algorithm() {
        let mut cfg = with_secret();
        cfg.signing.algorithm = "ES384".to_string();
        let msg = cfg.validate().unwrap_err().to_string();
        assert!(msg.contains("signing algorithm"));
        assert!(msg.contains("ES384"));
    }

    #[test]
    fn test_rs256_needs_both_key_paths() {
        let mut cfg = with_secret();
        cfg.signing.algorithm = "RS256".to_string();
        assert!(cfg.validate().unwrap_err().to_string().contains("private_key_path"));

        cfg.signing.private_key_path = Some("private.pem".into());
        assert!(cfg.validate().unwrap_err().to_string().contains("public_key_path"));

        cfg.signing.public_key_path = Some("public.pem".into());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_lifetime() {
        let mut cfg = with_secret();
        cfg.oauth.access_token_lifetime = Duration::ZERO;
        assert!(cfg.validate().unwrap_err().to_string().contains("access_token_lifetime"));
    }

    #[test]
    fn test_lifetimes_use_humantime() {
        let json = r#"{ "oauth": { "access_token_lifetime": "30m", "refresh_token_lifetime": "7days" } }"#;
        let cfg: AuthConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.oauth.access_token_lifetime, Duration::from_secs(1800));
        assert_eq!(cfg.oauth.refresh_token_lifetime, Duration::from_secs(7 * 24 * 3600));
        assert_eq!(cfg.oauth.authorization_code_lifetime, Duration::from_secs(600));
    }
}
