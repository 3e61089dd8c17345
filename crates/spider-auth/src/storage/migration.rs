//! One-time migration of legacy authorization records.
//!
//! Older records embedded a single access token and a single refresh token
//! directly on the authorization (`accessToken` + `accessTokenInfo`,
//! `refreshToken` + `refreshTokenInfo`) and kept code state under
//! `authCodeInfo`. The current model stores tokens as separate records and
//! keeps only their ids on the authorization.
//!
//! Backends run [`migrate_legacy_authorization`] once, when importing
//! persisted records. Nothing on the request path understands the legacy
//! shape.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::{Authorization, Token, TokenRef, TokenType, normalize_scopes};

/// Code state as stored by legacy records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyAuthCodeInfo {
    #[serde(default)]
    pub used: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// Issue/expiry metadata of an embedded legacy token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyTokenInfo {
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// A persisted authorization in either the legacy or the current shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyAuthorizationRecord {
    #[serde(default)]
    pub authorization_id: Option<String>,
    pub client_id: String,
    pub user_id: String,
    #[serde(default)]
    pub scopes: Vec<String>,

    #[serde(default)]
    pub auth_code: Option<String>,
    #[serde(default)]
    pub auth_code_info: Option<LegacyAuthCodeInfo>,
    #[serde(default)]
    pub auth_code_used: Option<bool>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub auth_code_expires_at: Option<OffsetDateTime>,

    #[serde(default)]
    pub code_challenge: Option<String>,
    #[serde(default)]
    pub code_challenge_method: Option<String>,

    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub access_token_info: Option<LegacyTokenInfo>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub refresh_token_info: Option<LegacyTokenInfo>,

    #[serde(default)]
    pub access_token_ids: Vec<String>,
    #[serde(default)]
    pub refresh_token_ids: Vec<String>,

    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(
        default,
        alias = "lastUpdatedDate",
        with = "time::serde::rfc3339::option"
    )]
    pub last_updated: Option<OffsetDateTime>,
}

impl LegacyAuthorizationRecord {
    /// Returns `true` if the record still carries embedded tokens.
    #[must_use]
    pub fn has_legacy_tokens(&self) -> bool {
        self.access_token.is_some() || self.refresh_token.is_some()
    }
}

/// Result of migrating one record.
#[derive(Debug, Clone)]
pub struct MigratedAuthorization {
    pub authorization: Authorization,
    /// Token records promoted from the legacy single-token fields.
    pub tokens: Vec<Token>,
}

/// Converts a persisted record into the current model.
///
/// Embedded tokens become [`Token`] records sharing one synthesized session
/// and are appended to the reference lists. Records already in the current
/// shape pass through unchanged apart from scope normalization.
#[must_use]
pub fn migrate_legacy_authorization(record: LegacyAuthorizationRecord) -> MigratedAuthorization {
    let authorization_id = record
        .authorization_id
        .clone()
        .unwrap_or_else(Authorization::generate_id);
    let scopes = normalize_scopes(record.scopes.clone());

    let (auth_code_used, auth_code_expires_at) = match (&record.auth_code_info, record.auth_code_expires_at) {
        (_, Some(expires_at)) => (record.auth_code_used.unwrap_or(false), expires_at),
        (Some(info), None) => (info.used, info.expires_at),
        (None, None) => (record.auth_code_used.unwrap_or(true), record.created),
    };

    let mut tokens = Vec::new();
    if record.has_legacy_tokens() {
        let session_id = Token::generate_session_id();
        let embedded = [
            (TokenType::Access, &record.access_token, &record.access_token_info),
            (TokenType::Refresh, &record.refresh_token, &record.refresh_token_info),
        ];
        for (token_type, value, info) in embedded {
            let Some(value) = value else { continue };
            let (issued_at, expires_at) = match info {
                Some(info) => (info.issued_at, info.expires_at),
                None => (record.created, record.created + token_type.default_ttl()),
            };
            tokens.push(Token {
                token_id: Token::generate_id(),
                token_value: value.clone(),
                authorization_id: authorization_id.clone(),
                session_id: session_id.clone(),
                user_id: record.user_id.clone(),
                client_id: record.client_id.clone(),
                token_type,
                scopes: scopes.clone(),
                issued_at,
                expires_at,
            });
        }
    }

    let mut authorization = Authorization {
        authorization_id,
        user_id: record.user_id,
        client_id: record.client_id,
        scopes,
        auth_code: if auth_code_used { None } else { record.auth_code },
        auth_code_used,
        auth_code_expires_at,
        code_challenge: record.code_challenge,
        code_challenge_method: record.code_challenge_method,
        access_token_ids: record.access_token_ids,
        refresh_token_ids: record.refresh_token_ids,
        created: record.created,
        last_updated: record.last_updated.unwrap_or(record.created),
    };
    let last_updated = authorization.last_updated;
    let refs: Vec<TokenRef> = tokens.iter().map(TokenRef::from).collect();
    authorization.add_token_refs(&refs);
    authorization.last_updated = last_updated;

    MigratedAuthorization {
        authorization,
        tokens,
    }
}
