//! Issued token records.
//!
//! Every access and refresh token handed to a client is persisted as a
//! [`Token`]. Tokens minted in the same exchange share a `session_id` so a
//! refresh or logout can retire the pair as a unit.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Access tokens live for one hour.
pub const ACCESS_TOKEN_TTL_SECONDS: i64 = 3600;

/// Refresh tokens live for 60 days.
pub const REFRESH_TOKEN_TTL_SECONDS: i64 = 60 * 24 * 60 * 60;

/// Kind of issued token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }

    /// Default lifetime for this kind of token.
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        match self {
            Self::Access => Duration::seconds(ACCESS_TOKEN_TTL_SECONDS),
            Self::Refresh => Duration::seconds(REFRESH_TOKEN_TTL_SECONDS),
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted access or refresh token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// Primary key (`pg.token.<uuid>`).
    pub token_id: String,

    /// The secret handed to the client. Indexed for lookup.
    pub token_value: String,

    /// Authorization this token was minted from.
    pub authorization_id: String,

    /// Groups the access and refresh token minted together.
    pub session_id: String,

    pub user_id: String,

    pub client_id: String,

    pub token_type: TokenType,

    #[serde(default)]
    pub scopes: Vec<String>,

    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl Token {
    /// Builds a token record. Pure construction, no I/O.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        token_value: impl Into<String>,
        authorization_id: impl Into<String>,
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        client_id: impl Into<String>,
        token_type: TokenType,
        scopes: Vec<String>,
        ttl_seconds: i64,
    ) -> Self {
        let issued_at = OffsetDateTime::now_utc();
        Self {
            token_id: Self::generate_id(),
            token_value: token_value.into(),
            authorization_id: authorization_id.into(),
            session_id: session_id.into(),
            user_id: user_id.into(),
            client_id: client_id.into(),
            token_type,
            scopes,
            issued_at,
            expires_at: issued_at + Duration::seconds(ttl_seconds),
        }
    }

    /// Generates a token id (`pg.token.<uuid>`).
    #[must_use]
    pub fn generate_id() -> String {
        format!("pg.token.{}", Uuid::new_v4())
    }

    /// Generates a token session id (`pg.token.session.<uuid>`).
    #[must_use]
    pub fn generate_session_id() -> String {
        format!("pg.token.session.{}", Uuid::new_v4())
    }

    /// Generates an opaque token value (32 random bytes, base64url).
    #[must_use]
    pub fn generate_opaque_value() -> String {
        let mut bytes = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Returns `true` if the token is past its expiry at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }

    /// Seconds remaining until expiry, zero once expired.
    #[must_use]
    pub fn expires_in(&self) -> u64 {
        let remaining = (self.expires_at - OffsetDateTime::now_utc()).whole_seconds();
        u64::try_from(remaining).unwrap_or(0)
    }
}
