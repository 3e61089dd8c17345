//! PKCE (Proof Key for Code Exchange) verification.
//!
//! Supports the `S256` and `plain` methods of RFC 7636. A challenge stored
//! without a method is treated as `plain`.
//!
//! # Example
//!
//! ```
//! use spider_auth::oauth::pkce::{PkceChallenge, PkceChallengeMethod};
//!
//! let challenge = PkceChallenge::from_verifier("abc", PkceChallengeMethod::S256);
//! assert!(challenge.verify("abc").is_ok());
//! assert!(challenge.verify("abd").is_err());
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

use crate::error::AuthError;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during PKCE verification.
#[derive(Debug, thiserror::Error)]
pub enum PkceError {
    /// The token request carried no `code_verifier`.
    #[error("Missing code_verifier")]
    MissingVerifier,

    /// The stored challenge names a method we do not implement.
    #[error("Invalid code_challenge_method: {0}")]
    UnsupportedMethod(String),

    /// The verifier does not match the stored challenge.
    #[error("Invalid code_verifier")]
    VerificationFailed,
}

impl PkceError {
    /// Get the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::MissingVerifier | Self::UnsupportedMethod(_) => "invalid_request",
            Self::VerificationFailed => "invalid_grant",
        }
    }
}

impl From<PkceError> for AuthError {
    fn from(err: PkceError) -> Self {
        match err {
            PkceError::MissingVerifier | PkceError::UnsupportedMethod(_) => {
                AuthError::invalid_request(err.to_string())
            }
            PkceError::VerificationFailed => AuthError::invalid_grant(err.to_string()),
        }
    }
}

// =============================================================================
// PKCE Challenge Method
// =============================================================================

/// PKCE challenge method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PkceChallengeMethod {
    /// `BASE64URL(SHA256(ASCII(code_verifier)))`
    S256,
    /// The challenge is the verifier itself.
    #[default]
    Plain,
}

impl PkceChallengeMethod {
    /// Parse the stored method. `None` means `plain`.
    ///
    /// # Errors
    ///
    /// Returns `PkceError::UnsupportedMethod` for anything other than
    /// `S256` or `plain`.
    pub fn parse(method: Option<&str>) -> Result<Self, PkceError> {
        match method {
            None | Some("") | Some("plain") => Ok(Self::Plain),
            Some("S256") => Ok(Self::S256),
            Some(other) => Err(PkceError::UnsupportedMethod(other.to_string())),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S256 => "S256",
            Self::Plain => "plain",
        }
    }
}

impl std::fmt::Display for PkceChallengeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// PKCE Challenge
// =============================================================================

/// A stored code challenge together with its method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    challenge: String,
    method: PkceChallengeMethod,
}

impl PkceChallenge {
    /// Wraps a stored challenge.
    #[must_use]
    pub fn new(challenge: impl Into<String>, method: PkceChallengeMethod) -> Self {
        Self {
            challenge: challenge.into(),
            method,
        }
    }

    /// Derives the challenge a client would send for `verifier`.
    #[must_use]
    pub fn from_verifier(verifier: &str, method: PkceChallengeMethod) -> Self {
        let challenge = match method {
            PkceChallengeMethod::S256 => s256(verifier),
            PkceChallengeMethod::Plain => verifier.to_string(),
        };
        Self { challenge, method }
    }

    /// Verify that a verifier matches this challenge.
    ///
    /// # Errors
    ///
    /// Returns `PkceError::VerificationFailed` if the verifier doesn't match.
    pub fn verify(&self, verifier: &str) -> Result<(), PkceError> {
        let expected = match self.method {
            PkceChallengeMethod::S256 => s256(verifier),
            PkceChallengeMethod::Plain => verifier.to_string(),
        };
        if expected == self.challenge {
            Ok(())
        } else {
            Err(PkceError::VerificationFailed)
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.challenge
    }

    #[must_use]
    pub fn method(&self) -> PkceChallengeMethod {
        self.method
    }
}

fn s256(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

// =============================================================================
// Token Request Verification
// =============================================================================

/// Checks a token request's `code_verifier` against the challenge stored on
/// an authorization.
///
/// # Errors
///
/// - `MissingVerifier` if no verifier was sent
/// - `UnsupportedMethod` if the stored method is unknown
/// - `VerificationFailed` if the verifier does not match
pub fn verify_code_verifier(
    code_challenge: &str,
    code_challenge_method: Option<&str>,
    code_verifier: Option<&str>,
) -> Result<(), PkceError> {
    let verifier = code_verifier
        .filter(|v| !v.is_empty())
        .ok_or(PkceError::MissingVerifier)?;
    let method = PkceChallengeMethod::parse(code_challenge_method)?;
    PkceChallenge::new(code_challenge, method).verify(verifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Known S256 vector from RFC 7636 Appendix B.
    const RFC_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const RFC_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    #[test]
    fn test_s256_rfc_vector() {
        let challenge = PkceChallenge::from_verifier(RFC_VERIFIER, PkceChallengeMethod::S256);
        assert_eq!(challenge.as_str(), RFC_CHALLENGE);
    }

    #[test]
    fn test_s256_short_verifier() {
        let challenge = PkceChallenge::from_verifier("abc", PkceChallengeMethod::S256);
        assert!(verify_code_verifier(challenge.as_str(), Some("S256"), Some("abc")).is_ok());

        let err = verify_code_verifier(challenge.as_str(), Some("S256"), Some("abd")).unwrap_err();
        assert!(matches!(err, PkceError::VerificationFailed));
        assert_eq!(err.oauth_error_code(), "invalid_grant");
    }

    #[test]
    fn test_plain_and_absent_method() {
        assert!(verify_code_verifier("abc", Some("plain"), Some("abc")).is_ok());
        assert!(verify_code_verifier("abc", None, Some("abc")).is_ok());
        assert!(verify_code_verifier("abc", None, Some("abcd")).is_err());
    }

    #[test]
    fn test_missing_verifier() {
        let err = verify_code_verifier("abc", Some("S256"), None).unwrap_err();
        assert!(matches!(err, PkceError::MissingVerifier));
        assert_eq!(err.oauth_error_code(), "invalid_request");

        let err = verify_code_verifier("abc", Some("S256"), Some("")).unwrap_err();
        assert!(matches!(err, PkceError::MissingVerifier));
    }

    #[test]
    fn test_unknown_method() {
        let err = verify_code_verifier("abc", Some("S512"), Some("abc")).unwrap_err();
        assert!(matches!(err, PkceError::UnsupportedMethod(_)));
        let auth_err: AuthError = err.into();
        assert_eq!(auth_err.oauth_error_code(), "invalid_request");
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(PkceChallengeMethod::parse(Some("S256")).unwrap(), PkceChallengeMethod::S256);
        assert_eq!(PkceChallengeMethod::parse(None).unwrap(), PkceChallengeMethod::Plain);
        assert_eq!(PkceChallengeMethod::S256.to_string(), "S256");
    }
}
