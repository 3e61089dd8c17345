//! JWT signing and verification.
//!
//! Three kinds of JWT pass through the identity core:
//!
//! - access tokens we mint ([`AccessTokenClaims`], `aud` = client id)
//! - id tokens we mint ([`IdTokenClaims`])
//! - platform session cookies minted by the login service ([`SessionClaims`])
//!
//! Refresh tokens are opaque and never go through here.
//!
//! ## Example
//!
//! ```
//! use spider_auth::token::jwt::{AccessTokenClaims, JwtService, SigningKey};
//!
//! let jwt = JwtService::new(SigningKey::from_secret("spider-1", b"secret"), "https://api.example.com");
//!
//! let claims = AccessTokenClaims::new("https://api.example.com", "user-1", "c1", "pg.auth.1", "read", 3600);
//! let token = jwt.encode(&claims).unwrap();
//! assert_eq!(jwt.decode::<AccessTokenClaims>(&token).unwrap().claims.sub, "user-1");
//! ```

use std::fmt;
use std::str::FromStr;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("token signing failed: {0}")]
    Sign(String),

    #[error("token expired")]
    Expired,

    #[error("bad signature")]
    BadSignature,

    /// Issuer, audience or a required claim did not check out.
    #[error("unexpected claims: {0}")]
    Claims(String),

    #[error("unusable key: {0}")]
    Key(String),

    #[error("malformed token: {0}")]
    Malformed(String),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::BadSignature,
            ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer
            | ErrorKind::MissingRequiredClaim(_) => Self::Claims(err.to_string()),
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => Self::Key(err.to_string()),
            _ => Self::Malformed(err.to_string()),
        }
    }
}

impl From<JwtError> for crate::AuthError {
    fn from(err: JwtError) -> Self {
        crate::AuthError::issuer(err.to_string())
    }
}

// ============================================================================
// Algorithm and key
// ============================================================================

/// Signing algorithms accepted in `auth.signing.algorithm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    HS256,
    RS256,
}

impl SigningAlgorithm {
    fn jwt_algorithm(self) -> Algorithm {
        match self {
            Self::HS256 => Algorithm::HS256,
            Self::RS256 => Algorithm::RS256,
        }
    }
}

impl FromStr for SigningAlgorithm {
    type Err = JwtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HS256" => Ok(Self::HS256),
            "RS256" => Ok(Self::RS256),
            other => Err(JwtError::Key(format!("unsupported algorithm '{other}'"))),
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::HS256 => "HS256",
            Self::RS256 => "RS256",
        })
    }
}

/// Key material plus the `kid` stamped into every header.
pub struct SigningKey {
    pub kid: String,
    pub algorithm: SigningAlgorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKey {
    #[must_use]
    pub fn from_secret(kid: impl Into<String>, secret: &[u8]) -> Self {
        Self {
            kid: kid.into(),
            algorithm: SigningAlgorithm::HS256,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// RS256 key pair from PEM text.
    ///
    /// # Errors
    ///
    /// Returns [`JwtError::Key`] if either PEM does not parse.
    pub fn from_rsa_pem(
        kid: impl Into<String>,
        private_pem: &str,
        public_pem: &str,
    ) -> Result<Self, JwtError> {
        let key_error = |e: jsonwebtoken::errors::Error| JwtError::Key(e.to_string());
        Ok(Self {
            kid: kid.into(),
            algorithm: SigningAlgorithm::RS256,
            encoding: EncodingKey::from_rsa_pem(private_pem.as_bytes()).map_err(key_error)?,
            decoding: DecodingKey::from_rsa_pem(public_pem.as_bytes()).map_err(key_error)?,
        })
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Claims
// ============================================================================

/// `(iat, exp)` for a token valid `ttl_seconds` from now.
#[must_use]
pub fn validity_window(ttl_seconds: i64) -> (i64, i64) {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    (now, now.saturating_add(ttl_seconds))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessTokenClaims {
    pub iss: String,
    /// User id.
    pub sub: String,
    /// Client id.
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    /// Space-separated scopes.
    pub scope: String,
    pub client_id: String,
    pub authorization_id: String,
}

impl AccessTokenClaims {
    #[must_use]
    pub fn new(
        issuer: &str,
        user_id: &str,
        client_id: &str,
        authorization_id: &str,
        scope: impl Into<String>,
        ttl_seconds: i64,
    ) -> Self {
        let (iat, exp) = validity_window(ttl_seconds);
        Self {
            iss: issuer.to_string(),
            sub: user_id.to_string(),
            aud: client_id.to_string(),
            exp,
            iat,
            jti: uuid::Uuid::new_v4().to_string(),
            scope: scope.into(),
            client_id: client_id.to_string(),
            authorization_id: authorization_id.to_string(),
        }
    }
}

/// OpenID Connect id token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    /// Display name of the user.
    pub name: String,
    /// Token session the id token was issued with.
    pub sid: String,
    pub scope: String,
}

/// Claims carried by the platform session cookie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub site_access: Vec<String>,
    #[serde(default)]
    pub api_access: Vec<String>,
    pub exp: i64,
}

// ============================================================================
// Service
// ============================================================================

/// Signs and verifies JWTs with one key.
///
/// `exp` is always required and checked. `iss` is checked only when the
/// service was built with an issuer.
#[derive(Debug)]
pub struct JwtService {
    key: SigningKey,
    validation: Validation,
}

impl JwtService {
    #[must_use]
    pub fn new(key: SigningKey, issuer: impl Into<String>) -> Self {
        let mut service = Self::without_issuer(key);
        service.validation.set_issuer(&[issuer.into()]);
        service
    }

    /// Service for tokens someone else minted (session cookies, federated
    /// IdP tokens) where `iss` is not ours to check.
    #[must_use]
    pub fn without_issuer(key: SigningKey) -> Self {
        let mut validation = Validation::new(key.algorithm.jwt_algorithm());
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);
        Self { key, validation }
    }

    /// # Errors
    ///
    /// Returns [`JwtError::Sign`] if the claims cannot be signed.
    pub fn encode<T: Serialize>(&self, claims: &T) -> Result<String, JwtError> {
        let mut header = Header::new(self.key.algorithm.jwt_algorithm());
        header.kid = Some(self.key.kid.clone());
        jsonwebtoken::encode(&header, claims, &self.key.encoding)
            .map_err(|e| JwtError::Sign(e.to_string()))
    }

    /// # Errors
    ///
    /// Returns an error if the signature, `exp` or `iss` does not verify.
    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<TokenData<T>, JwtError> {
        Ok(jsonwebtoken::decode(token, &self.key.decoding, &self.validation)?)
    }

    /// Like [`decode`](Self::decode), additionally requiring `aud`.
    ///
    /// # Errors
    ///
    /// Returns [`JwtError::Claims`] if the audience differs.
    pub fn decode_for_audience<T: DeserializeOwned>(
        &self,
        token: &str,
        audience: &str,
    ) -> Result<TokenData<T>, JwtError> {
        let mut validation = self.validation.clone();
        validation.set_audience(&[audience]);
        Ok(jsonwebtoken::decode(token, &self.key.decoding, &validation)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISSUER: &str = "https://api.example.com";

    fn service() -> JwtService {
        JwtService::new(SigningKey::from_secret("k1", b"test-secret"), ISSUER)
    }

    fn access(issuer: &str, ttl: i64) -> AccessTokenClaims {
        AccessTokenClaims::new(issuer, "user-1", "c1", "pg.auth.1", "read write", ttl)
    }

    #[test]
    fn test_access_token_round_trip() {
        let jwt = service();
        let token = jwt.encode(&access(ISSUER, 3600)).unwrap();

        let decoded = jwt.decode::<AccessTokenClaims>(&token).unwrap();
        assert_eq!(decoded.claims.sub, "user-1");
        assert_eq!(decoded.claims.aud, "c1");
        assert_eq!(decoded.claims.scope, "read write");
        assert_eq!(decoded.claims.authorization_id, "pg.auth.1");
        assert_eq!(decoded.claims.exp - decoded.claims.iat, 3600);
        assert_eq!(decoded.header.kid.as_deref(), Some("k1"));
    }

    #[test]
    fn test_rejections() {
        let jwt = service();

        let expired = jwt.encode(&access(ISSUER, -3600)).unwrap();
        assert!(matches!(
            jwt.decode::<AccessTokenClaims>(&expired),
            Err(JwtError::Expired)
        ));

        let forged = JwtService::new(SigningKey::from_secret("k1", b"other"), ISSUER)
            .encode(&access(ISSUER, 60))
            .unwrap();
        assert!(matches!(
            jwt.decode::<AccessTokenClaims>(&forged),
            Err(JwtError::BadSignature)
        ));

        let foreign = jwt.encode(&access("https://evil.example.com", 60)).unwrap();
        assert!(matches!(
            jwt.decode::<AccessTokenClaims>(&foreign),
            Err(JwtError::Claims(_))
        ));

        assert!(matches!(
            jwt.decode::<AccessTokenClaims>("not.a.jwt"),
            Err(JwtError::Malformed(_))
        ));
    }

    #[test]
    fn test_audience_check() {
        let jwt = service();
        let token = jwt.encode(&access(ISSUER, 60)).unwrap();

        assert!(jwt.decode_for_audience::<AccessTokenClaims>(&token, "c1").is_ok());
        assert!(jwt.decode_for_audience::<AccessTokenClaims>(&token, "c2").is_err());
    }

    #[test]
    fn test_session_claims_ignore_issuer() {
        let jwt = JwtService::without_issuer(SigningKey::from_secret("cookie", b"cookie-secret"));
        let claims = SessionClaims {
            user_id: "user-1".to_string(),
            display_name: "Parker".to_string(),
            site_access: vec!["minecraft".to_string()],
            api_access: vec![],
            exp: validity_window(60).1,
        };
        let token = jwt.encode(&claims).unwrap();
        assert_eq!(jwt.decode::<SessionClaims>(&token).unwrap().claims, claims);
    }

    #[test]
    fn test_algorithm_names() {
        assert_eq!("HS256".parse::<SigningAlgorithm>().unwrap(), SigningAlgorithm::HS256);
        assert_eq!("RS256".parse::<SigningAlgorithm>().unwrap().to_string(), "RS256");
        assert!("ES384".parse::<SigningAlgorithm>().is_err());
    }

    #[test]
    fn test_invalid_pem_rejected() {
        let err = SigningKey::from_rsa_pem("k1", "not a pem", "not a pem").unwrap_err();
        assert!(matches!(err, JwtError::Key(_)));
    }
}
