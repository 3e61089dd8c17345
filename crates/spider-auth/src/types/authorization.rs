//! Authorization (consent grant) records.
//!
//! An [`Authorization`] links one user to one client. It owns a single
//! authorization code at a time and keeps the ids of the tokens minted
//! from it. Tokens are stored separately and point back by id only.
//!
//! # Lifecycle
//!
//! 1. Created on first approval with a fresh code
//! 2. Renewed on later approvals: new code, same id, token refs untouched
//! 3. Code consumed on exchange (one-time use)
//! 4. Token refs grow on exchange and shrink on rotation or logout

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::token::{Token, TokenType};

/// Authorization codes are valid for 10 minutes.
pub const AUTH_CODE_LIFETIME: Duration = Duration::minutes(10);

/// Consent grant for a (user, client) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    /// Stable identifier, kept across renewals.
    pub authorization_id: String,

    /// User that granted consent.
    pub user_id: String,

    /// Client the consent was granted to.
    pub client_id: String,

    /// Granted scopes (set semantics, insertion ordered).
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Current authorization code. Cleared once used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_code: Option<String>,

    /// Whether the current code has been exchanged.
    #[serde(default)]
    pub auth_code_used: bool,

    /// When the current code stops being exchangeable.
    #[serde(with = "time::serde::rfc3339")]
    pub auth_code_expires_at: OffsetDateTime,

    /// PKCE code challenge bound to the current code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE challenge method (`S256` or `plain`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,

    /// Ids of access tokens minted from this authorization.
    #[serde(default)]
    pub access_token_ids: Vec<String>,

    /// Ids of refresh tokens minted from this authorization.
    #[serde(default)]
    pub refresh_token_ids: Vec<String>,

    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

/// Reference to a token as held by an [`Authorization`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRef {
    pub token_id: String,
    pub token_type: TokenType,
}

impl From<&Token> for TokenRef {
    fn from(token: &Token) -> Self {
        Self {
            token_id: token.token_id.clone(),
            token_type: token.token_type,
        }
    }
}

impl Authorization {
    /// Creates a new authorization with a fresh id and code.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        user_id: impl Into<String>,
        scopes: Vec<String>,
        code_challenge: Option<String>,
        code_challenge_method: Option<String>,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            authorization_id: Self::generate_id(),
            user_id: user_id.into(),
            client_id: client_id.into(),
            scopes: super::normalize_scopes(scopes),
            auth_code: Some(Self::generate_code()),
            auth_code_used: false,
            auth_code_expires_at: now + AUTH_CODE_LIFETIME,
            code_challenge,
            code_challenge_method,
            access_token_ids: Vec::new(),
            refresh_token_ids: Vec::new(),
            created: now,
            last_updated: now,
        }
    }

    /// Generates an authorization id (`pg.auth.<uuid>`).
    #[must_use]
    pub fn generate_id() -> String {
        format!("pg.auth.{}", Uuid::new_v4())
    }

    /// Generates a new cryptographically secure authorization code.
    ///
    /// 32 random bytes, base64url without padding (43 characters).
    #[must_use]
    pub fn generate_code() -> String {
        let mut bytes = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Returns `true` if the current code is past its expiry at `now`.
    #[must_use]
    pub fn is_code_expired_at(&self, now: OffsetDateTime) -> bool {
        now > self.auth_code_expires_at
    }

    /// Returns `true` if `code` is the current, unused, unexpired code.
    #[must_use]
    pub fn is_code_usable(&self, code: &str, now: OffsetDateTime) -> bool {
        self.auth_code.as_deref() == Some(code)
            && !self.auth_code_used
            && !self.is_code_expired_at(now)
    }

    /// Replaces the authorization code and PKCE binding.
    ///
    /// Identity, scopes and token references are preserved.
    pub fn renew(
        &mut self,
        code_challenge: Option<String>,
        code_challenge_method: Option<String>,
    ) {
        let now = OffsetDateTime::now_utc();
        self.auth_code = Some(Self::generate_code());
        self.auth_code_used = false;
        self.auth_code_expires_at = now + AUTH_CODE_LIFETIME;
        self.code_challenge = code_challenge;
        self.code_challenge_method = code_challenge_method;
        self.last_updated = now;
    }

    /// Marks the current code as used and expires it immediately.
    pub fn mark_code_used(&mut self) {
        let now = OffsetDateTime::now_utc();
        self.auth_code = None;
        self.auth_code_used = true;
        self.auth_code_expires_at = now;
        self.last_updated = now;
    }

    /// Appends token ids to the matching reference list, skipping duplicates.
    pub fn add_token_refs(&mut self, refs: &[TokenRef]) {
        for r in refs {
            let list = match r.token_type {
                TokenType::Access => &mut self.access_token_ids,
                TokenType::Refresh => &mut self.refresh_token_ids,
            };
            if !list.contains(&r.token_id) {
                list.push(r.token_id.clone());
            }
        }
        self.last_updated = OffsetDateTime::now_utc();
    }

    /// Removes the given ids from both reference lists.
    pub fn remove_token_refs(&mut self, token_ids: &[String]) {
        self.access_token_ids.retain(|id| !token_ids.contains(id));
        self.refresh_token_ids.retain(|id| !token_ids.contains(id));
        self.last_updated = OffsetDateTime::now_utc();
    }

    /// Returns `true` if the token id is referenced from either list.
    #[must_use]
    pub fn references(&self, token_id: &str) -> bool {
        self.access_token_ids.iter().any(|id| id == token_id)
            || self.refresh_token_ids.iter().any(|id| id == token_id)
    }
}
