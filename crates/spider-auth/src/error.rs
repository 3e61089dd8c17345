//! Error type of the identity core.
//!
//! OAuth flow failures carry an RFC 6749 error code (`invalid_request`,
//! `invalid_client`, `invalid_grant`); lookups that miss return `NotFound`;
//! everything that went wrong on our side collapses to a server error whose
//! detail is logged and never returned.

use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Unknown client or mismatched client credentials.
    #[error("Invalid client: {message}")]
    InvalidClient { message: String },

    /// Unusable code, refresh token or PKCE verifier.
    #[error("Invalid grant: {message}")]
    InvalidGrant { message: String },

    /// An already exchanged authorization code was presented again.
    ///
    /// Reported to the caller as `invalid_grant`, kept apart from an unknown
    /// code so it can be alerted on.
    #[error("Authorization code replayed for {authorization_id}")]
    CodeReplay { authorization_id: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Signing or minting a credential failed.
    #[error("Token issuer error: {message}")]
    Issuer { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

macro_rules! message_constructors {
    ($($name:ident => $variant:ident),+ $(,)?) => {
        $(
            #[must_use]
            pub fn $name(message: impl Into<String>) -> Self {
                Self::$variant { message: message.into() }
            }
        )+
    };
}

impl AuthError {
    message_constructors! {
        invalid_request => InvalidRequest,
        invalid_client => InvalidClient,
        invalid_grant => InvalidGrant,
        not_found => NotFound,
        storage => Storage,
        issuer => Issuer,
        internal => Internal,
    }

    #[must_use]
    pub fn code_replay(authorization_id: impl Into<String>) -> Self {
        Self::CodeReplay {
            authorization_id: authorization_id.into(),
        }
    }

    /// 4xx: the caller can fix it.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// 5xx: logged with detail, reported as "Internal server error".
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Issuer { .. } | Self::Internal { .. }
        )
    }

    /// Errors the OAuth endpoints report as `{error, error_description}`.
    #[must_use]
    pub fn is_oauth_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest { .. }
                | Self::InvalidClient { .. }
                | Self::InvalidGrant { .. }
                | Self::CodeReplay { .. }
        )
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRequest { .. } | Self::NotFound { .. } => ErrorCategory::Validation,
            Self::InvalidClient { .. } | Self::InvalidGrant { .. } => ErrorCategory::Authentication,
            Self::CodeReplay { .. } => ErrorCategory::Replay,
            Self::Storage { .. } | Self::Issuer { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// RFC 6749 `error` value.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::InvalidClient { .. } => "invalid_client",
            Self::InvalidGrant { .. } | Self::CodeReplay { .. } => "invalid_grant",
            Self::NotFound { .. } => "not_found",
            Self::Storage { .. } | Self::Issuer { .. } | Self::Internal { .. } => "server_error",
        }
    }

    /// Text safe to hand back to the caller.
    ///
    /// A replay reads exactly like any other unusable code.
    #[must_use]
    pub fn public_description(&self) -> String {
        match self {
            Self::InvalidRequest { message }
            | Self::InvalidClient { message }
            | Self::InvalidGrant { message }
            | Self::NotFound { message } => message.clone(),
            Self::CodeReplay { .. } => "Authorization code expired or already used".to_string(),
            Self::Storage { .. } | Self::Issuer { .. } | Self::Internal { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}

/// Error buckets used as a log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Authentication,
    Replay,
    Validation,
    Infrastructure,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Authentication => "authentication",
            Self::Replay => "replay",
            Self::Validation => "validation",
            Self::Infrastructure => "infrastructure",
            Self::Internal => "internal",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_keeps_detail() {
        assert_eq!(
            AuthError::invalid_client("Client not found").to_string(),
            "Invalid client: Client not found"
        );
        assert_eq!(
            AuthError::code_replay("pg.auth.1").to_string(),
            "Authorization code replayed for pg.auth.1"
        );
    }

    #[test]
    fn test_client_and_server_split() {
        let err = AuthError::invalid_request("missing client_id");
        assert!(err.is_client_error());
        assert!(err.is_oauth_error());

        let err = AuthError::not_found("authorization");
        assert!(err.is_client_error());
        assert!(!err.is_oauth_error());

        let err = AuthError::storage("table unavailable");
        assert!(err.is_server_error());
        assert_eq!(err.category().to_string(), "infrastructure");
    }

    #[test]
    fn test_replay_surfaces_as_invalid_grant() {
        let err = AuthError::code_replay("pg.auth.1");
        assert_eq!(err.oauth_error_code(), "invalid_grant");
        assert_eq!(err.category(), ErrorCategory::Replay);
        assert_eq!(
            err.public_description(),
            "Authorization code expired or already used"
        );
    }

    #[test]
    fn test_server_errors_hide_detail() {
        let err = AuthError::issuer("key file unreadable: /etc/spider/key.pem");
        assert_eq!(err.oauth_error_code(), "server_error");
        assert_eq!(err.public_description(), "Internal server error");
    }
}
