//! In-memory authorization storage.
//!
//! # Indexes
//!
//! - `records`: authorization id → record
//! - `codes`: authorization code → owning authorization, live or consumed
//! - `consumed`: authorization id → its most recently consumed code
//! - `pairs`: (user id, client id) → authorization ids
//!
//! A consumed code stays in `codes` for replay detection until the same
//! authorization consumes its next code, so each authorization holds at most
//! one live and one consumed code.
//!
//! Locks are always taken code index first, then records. Paths that start
//! from a record release it before touching the code index.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use time::{Duration, OffsetDateTime};

use spider_auth::AuthResult;
use spider_auth::error::AuthError;
use spider_auth::storage::{AuthorizationStorage, TokenStorage};
use spider_auth::types::{AUTH_CODE_LIFETIME, Authorization, TokenRef};

const AUTHORIZATION_NOT_FOUND: &str = "Authorization not found";
const INVALID_CODE: &str = "Invalid authorization code";

#[derive(Debug, Clone, PartialEq, Eq)]
enum CodeEntry {
    Live(String),
    Consumed(String),
}

/// Concurrent in-memory [`AuthorizationStorage`].
///
/// Needs the token storage to resolve a session's tokens in
/// [`AuthorizationStorage::remove_token_refs_by_session`].
pub struct InMemoryAuthorizationStorage {
    records: DashMap<String, Authorization>,
    codes: DashMap<String, CodeEntry>,
    consumed: DashMap<String, String>,
    pairs: DashMap<(String, String), Vec<String>>,
    tokens: Arc<dyn TokenStorage>,
    code_lifetime: Duration,
}

impl InMemoryAuthorizationStorage {
    #[must_use]
    pub fn new(tokens: Arc<dyn TokenStorage>) -> Self {
        Self {
            records: DashMap::new(),
            codes: DashMap::new(),
            consumed: DashMap::new(),
            pairs: DashMap::new(),
            tokens,
            code_lifetime: AUTH_CODE_LIFETIME,
        }
    }

    /// Overrides the authorization code lifetime.
    #[must_use]
    pub fn with_code_lifetime(mut self, lifetime: std::time::Duration) -> Self {
        self.code_lifetime = Duration::try_from(lifetime).unwrap_or(AUTH_CODE_LIFETIME);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Stores an already-built record as is, indexing its code and pair.
    ///
    /// Used by snapshot import. An existing record with the same id is
    /// replaced.
    pub fn insert(&self, authorization: Authorization) {
        let id = authorization.authorization_id.clone();
        if let Some(code) = &authorization.auth_code {
            if authorization.auth_code_used {
                self.codes.insert(code.clone(), CodeEntry::Consumed(id.clone()));
                self.retire_consumed(&id, code);
            } else {
                self.codes.insert(code.clone(), CodeEntry::Live(id.clone()));
            }
        }

        let pair = (authorization.user_id.clone(), authorization.client_id.clone());
        let previous = self.records.insert(id.clone(), authorization);
        if previous.is_none() {
            self.pairs.entry(pair).or_default().push(id);
        }
    }

    /// Snapshot of every stored record.
    #[must_use]
    pub fn all(&self) -> Vec<Authorization> {
        self.records
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Records `code` as the authorization's latest consumed code and drops
    /// the one it replaces from the code index.
    ///
    /// Must be called without holding a `codes` or `records` guard.
    fn retire_consumed(&self, authorization_id: &str, code: &str) {
        let previous = self
            .consumed
            .insert(authorization_id.to_string(), code.to_string());
        if let Some(previous) = previous.filter(|previous| previous != code) {
            self.codes
                .remove_if(&previous, |_, entry| matches!(entry, CodeEntry::Consumed(_)));
        }
    }

    fn lookup_code(&self, code: &str) -> AuthResult<String> {
        match self.codes.get(code).map(|entry| entry.value().clone()) {
            Some(CodeEntry::Live(id)) => Ok(id),
            Some(CodeEntry::Consumed(id)) => Err(AuthError::code_replay(id)),
            None => Err(AuthError::invalid_grant(INVALID_CODE)),
        }
    }

    fn with_record<T>(
        &self,
        authorization_id: &str,
        user_id: &str,
        f: impl FnOnce(&mut Authorization) -> T,
    ) -> AuthResult<T> {
        let mut record = self
            .records
            .get_mut(authorization_id)
            .filter(|record| record.user_id == user_id)
            .ok_or_else(|| AuthError::not_found(AUTHORIZATION_NOT_FOUND))?;
        Ok(f(record.value_mut()))
    }
}

#[async_trait]
impl AuthorizationStorage for InMemoryAuthorizationStorage {
    async fn create(
        &self,
        client_id: &str,
        user_id: &str,
        scopes: Vec<String>,
        code_challenge: Option<String>,
        code_challenge_method: Option<String>,
    ) -> AuthResult<Authorization> {
        let mut authorization = Authorization::new(
            client_id,
            user_id,
            scopes,
            code_challenge,
            code_challenge_method,
        );
        authorization.auth_code_expires_at = authorization.created + self.code_lifetime;

        self.insert(authorization.clone());
        tracing::debug!(
            authorization_id = %authorization.authorization_id,
            client_id = %client_id,
            "Authorization created"
        );
        Ok(authorization)
    }

    async fn get_by_id(&self, authorization_id: &str, user_id: &str) -> AuthResult<Authorization> {
        self.records
            .get(authorization_id)
            .filter(|record| record.user_id == user_id)
            .map(|record| record.value().clone())
            .ok_or_else(|| AuthError::not_found(AUTHORIZATION_NOT_FOUND))
    }

    async fn get_by_code(&self, code: &str) -> AuthResult<Authorization> {
        let id = self.lookup_code(code)?;
        let now = OffsetDateTime::now_utc();
        self.records
            .get(&id)
            .filter(|record| record.is_code_usable(code, now))
            .map(|record| record.value().clone())
            .ok_or_else(|| AuthError::invalid_grant(INVALID_CODE))
    }

    async fn get_for_user_and_client(
        &self,
        user_id: &str,
        client_id: &str,
    ) -> AuthResult<Option<Authorization>> {
        let ids = self
            .pairs
            .get(&(user_id.to_string(), client_id.to_string()))
            .map(|ids| ids.value().clone())
            .unwrap_or_default();

        match ids.as_slice() {
            [] => Ok(None),
            [id] => Ok(self.records.get(id).map(|record| record.value().clone())),
            _ => {
                tracing::error!(
                    user_id = %user_id,
                    client_id = %client_id,
                    count = ids.len(),
                    "Multiple authorizations for user and client"
                );
                Err(AuthError::storage(
                    "Multiple authorizations found for user and client",
                ))
            }
        }
    }

    async fn renew(
        &self,
        previous_authorization_id: &str,
        user_id: &str,
        code_challenge: Option<String>,
        code_challenge_method: Option<String>,
    ) -> AuthResult<Authorization> {
        let lifetime = self.code_lifetime;
        let (previous_code, renewed) =
            self.with_record(previous_authorization_id, user_id, |record| {
                let previous_code = record.auth_code.take();
                record.renew(code_challenge, code_challenge_method);
                record.auth_code_expires_at = record.last_updated + lifetime;
                (previous_code, record.clone())
            })?;

        if let Some(code) = previous_code {
            self.codes.remove(&code);
        }
        if let Some(code) = &renewed.auth_code {
            self.codes
                .insert(code.clone(), CodeEntry::Live(renewed.authorization_id.clone()));
        }
        Ok(renewed)
    }

    async fn mark_code_used(&self, authorization_id: &str, user_id: &str) -> AuthResult<()> {
        let code = self.with_record(authorization_id, user_id, |record| {
            let code = record.auth_code.clone();
            record.mark_code_used();
            code
        })?;

        if let Some(code) = code {
            self.codes
                .insert(code.clone(), CodeEntry::Consumed(authorization_id.to_string()));
            self.retire_consumed(authorization_id, &code);
        }
        Ok(())
    }

    async fn consume_code(&self, code: &str) -> AuthResult<Authorization> {
        let mut entry = self
            .codes
            .get_mut(code)
            .ok_or_else(|| AuthError::invalid_grant(INVALID_CODE))?;

        let id = match entry.value() {
            CodeEntry::Live(id) => id.clone(),
            CodeEntry::Consumed(id) => return Err(AuthError::code_replay(id.clone())),
        };

        let mut record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| AuthError::invalid_grant(INVALID_CODE))?;
        if !record.is_code_usable(code, OffsetDateTime::now_utc()) {
            return Err(AuthError::invalid_grant(INVALID_CODE));
        }

        let before = record.clone();
        record.mark_code_used();
        *entry.value_mut() = CodeEntry::Consumed(id.clone());
        drop(record);
        drop(entry);

        self.retire_consumed(&id, code);
        Ok(before)
    }

    async fn add_token_refs(
        &self,
        authorization_id: &str,
        user_id: &str,
        refs: &[TokenRef],
    ) -> AuthResult<()> {
        self.with_record(authorization_id, user_id, |record| {
            record.add_token_refs(refs);
        })
    }

    async fn remove_token_refs(
        &self,
        authorization_id: &str,
        user_id: &str,
        token_ids: &[String],
    ) -> AuthResult<()> {
        self.with_record(authorization_id, user_id, |record| {
            record.remove_token_refs(token_ids);
        })
    }

    async fn remove_token_refs_by_session(
        &self,
        authorization_id: &str,
        session_id: &str,
        user_id: &str,
    ) -> AuthResult<Vec<String>> {
        // fail fast before touching token storage
        self.get_by_id(authorization_id, user_id).await?;

        let session_ids: Vec<String> = self
            .tokens
            .list_by_authorization(authorization_id)
            .await?
            .into_iter()
            .filter(|token| token.session_id == session_id)
            .map(|token| token.token_id)
            .collect();

        // every token of the session goes, referenced or not
        self.with_record(authorization_id, user_id, |record| {
            record.remove_token_refs(&session_ids);
        })?;
        Ok(session_ids)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::future::join_all;
    use spider_auth::types::{Token, TokenType};

    use super::*;
    use crate::token::InMemoryTokenStorage;

    fn stores() -> (Arc<InMemoryTokenStorage>, InMemoryAuthorizationStorage) {
        let tokens = Arc::new(InMemoryTokenStorage::new());
        let authorizations = InMemoryAuthorizationStorage::new(tokens.clone());
        (tokens, authorizations)
    }

    async fn create(storage: &InMemoryAuthorizationStorage) -> Authorization {
        storage
            .create("c1", "user-1", vec!["read".to_string()], None, None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_indexes_code_and_pair() {
        let (_, storage) = stores();
        let auth = create(&storage).await;

        assert!(auth.authorization_id.starts_with("pg.auth."));
        assert!(auth.access_token_ids.is_empty());
        let code = auth.auth_code.clone().unwrap();
        assert_eq!(storage.get_by_code(&code).await.unwrap(), auth);

        let found = storage
            .get_for_user_and_client("user-1", "c1")
            .await
            .unwrap();
        assert_eq!(found, Some(auth));
        assert_eq!(
            storage.get_for_user_and_client("user-2", "c1").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_get_by_id_checks_user() {
        let (_, storage) = stores();
        let auth = create(&storage).await;

        assert!(storage.get_by_id(&auth.authorization_id, "user-1").await.is_ok());
        let err = storage
            .get_by_id(&auth.authorization_id, "user-2")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_code_lifetime_override() {
        let tokens = Arc::new(InMemoryTokenStorage::new());
        let storage = InMemoryAuthorizationStorage::new(tokens)
            .with_code_lifetime(std::time::Duration::from_secs(60));
        let auth = create(&storage).await;

        assert_eq!(auth.auth_code_expires_at - auth.created, Duration::seconds(60));
    }

    #[tokio::test]
    async fn test_renew_invalidates_previous_code() {
        let (_, storage) = stores();
        let auth = create(&storage).await;
        let old_code = auth.auth_code.clone().unwrap();
        storage
            .add_token_refs(
                &auth.authorization_id,
                "user-1",
                &[TokenRef {
                    token_id: "pg.token.a".to_string(),
                    token_type: TokenType::Access,
                }],
            )
            .await
            .unwrap();

        let renewed = storage
            .renew(&auth.authorization_id, "user-1", None, None)
            .await
            .unwrap();

        assert_eq!(renewed.authorization_id, auth.authorization_id);
        assert_eq!(renewed.access_token_ids, vec!["pg.token.a".to_string()]);
        assert_ne!(renewed.auth_code.as_deref(), Some(old_code.as_str()));

        let err = storage.get_by_code(&old_code).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidGrant { .. }));
        let new_code = renewed.auth_code.unwrap();
        assert!(storage.get_by_code(&new_code).await.is_ok());
    }

    #[tokio::test]
    async fn test_consume_then_replay() {
        let (_, storage) = stores();
        let auth = create(&storage).await;
        let code = auth.auth_code.clone().unwrap();

        let consumed = storage.consume_code(&code).await.unwrap();
        assert_eq!(consumed.auth_code.as_deref(), Some(code.as_str()));

        let stored = storage
            .get_by_id(&auth.authorization_id, "user-1")
            .await
            .unwrap();
        assert!(stored.auth_code_used);
        assert!(stored.auth_code.is_none());

        let err = storage.consume_code(&code).await.unwrap_err();
        assert!(matches!(err, AuthError::CodeReplay { .. }));
        assert_eq!(err.oauth_error_code(), "invalid_grant");
        assert!(matches!(
            storage.get_by_code(&code).await.unwrap_err(),
            AuthError::CodeReplay { .. }
        ));
    }

    #[tokio::test]
    async fn test_mark_code_used_flags_replay() {
        let (_, storage) = stores();
        let auth = create(&storage).await;
        let code = auth.auth_code.clone().unwrap();

        storage
            .mark_code_used(&auth.authorization_id, "user-1")
            .await
            .unwrap();

        assert!(matches!(
            storage.get_by_code(&code).await.unwrap_err(),
            AuthError::CodeReplay { .. }
        ));
    }

    #[tokio::test]
    async fn test_expired_code_rejected() {
        let tokens = Arc::new(InMemoryTokenStorage::new());
        let storage = InMemoryAuthorizationStorage::new(tokens)
            .with_code_lifetime(std::time::Duration::ZERO);
        let auth = create(&storage).await;
        let code = auth.auth_code.clone().unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let err = storage.consume_code(&code).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidGrant { .. }));
    }

    #[tokio::test]
    async fn test_unknown_code_is_invalid_grant() {
        let (_, storage) = stores();
        let err = storage.consume_code("nope").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidGrant { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_consume_single_winner() {
        let (_, storage) = stores();
        let storage = Arc::new(storage);
        let code = create(&storage).await.auth_code.unwrap();

        let results = join_all((0..8).map(|_| {
            let storage = storage.clone();
            let code = code.clone();
            tokio::spawn(async move { storage.consume_code(&code).await })
        }))
        .await;

        let winners = results
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count();
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_duplicate_pair_is_storage_error() {
        let (_, storage) = stores();
        create(&storage).await;
        storage.insert(Authorization::new("c1", "user-1", vec![], None, None));

        let err = storage
            .get_for_user_and_client("user-1", "c1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Storage { .. }));
    }

    #[tokio::test]
    async fn test_remove_token_refs_by_session() {
        let (tokens, storage) = stores();
        let auth = create(&storage).await;

        let build = |value: &str, session: &str, token_type| {
            Token::build(
                value,
                &auth.authorization_id,
                session,
                "user-1",
                "c1",
                token_type,
                vec![],
                3600,
            )
        };
        let session_a = [
            build("a-access", "session-a", TokenType::Access),
            build("a-refresh", "session-a", TokenType::Refresh),
        ];
        let session_b = build("b-access", "session-b", TokenType::Access);

        for token in session_a.iter().chain([&session_b]) {
            tokens.create(token).await.unwrap();
        }
        let refs: Vec<TokenRef> = session_a
            .iter()
            .chain([&session_b])
            .map(TokenRef::from)
            .collect();
        storage
            .add_token_refs(&auth.authorization_id, "user-1", &refs)
            .await
            .unwrap();

        let mut removed = storage
            .remove_token_refs_by_session(&auth.authorization_id, "session-a", "user-1")
            .await
            .unwrap();
        removed.sort();
        let mut expected: Vec<String> = session_a.iter().map(|t| t.token_id.clone()).collect();
        expected.sort();
        assert_eq!(removed, expected);

        let stored = storage
            .get_by_id(&auth.authorization_id, "user-1")
            .await
            .unwrap();
        assert_eq!(stored.access_token_ids, vec![session_b.token_id.clone()]);
        assert!(stored.refresh_token_ids.is_empty());
    }

    #[tokio::test]
    async fn test_remove_token_refs_returns_unreferenced_session_tokens() {
        let (tokens, storage) = stores();
        let auth = create(&storage).await;

        let access = Token::build(
            "acc",
            &auth.authorization_id,
            "session-s",
            "user-1",
            "c1",
            TokenType::Access,
            vec![],
            3600,
        );
        let refresh = Token::build(
            "ref",
            &auth.authorization_id,
            "session-s",
            "user-1",
            "c1",
            TokenType::Refresh,
            vec![],
            3600,
        );
        tokens.create(&access).await.unwrap();
        tokens.create(&refresh).await.unwrap();
        // only the access token is linked to the record
        storage
            .add_token_refs(&auth.authorization_id, "user-1", &[TokenRef::from(&access)])
            .await
            .unwrap();

        let mut removed = storage
            .remove_token_refs_by_session(&auth.authorization_id, "session-s", "user-1")
            .await
            .unwrap();
        removed.sort();
        let mut expected = vec![access.token_id.clone(), refresh.token_id.clone()];
        expected.sort();
        assert_eq!(removed, expected);

        let stored = storage
            .get_by_id(&auth.authorization_id, "user-1")
            .await
            .unwrap();
        assert!(stored.access_token_ids.is_empty());
        assert!(stored.refresh_token_ids.is_empty());
    }

    #[tokio::test]
    async fn test_code_index_bounded_across_renewals() {
        let (_, storage) = stores();
        let mut auth = create(&storage).await;

        let mut last_code = String::new();
        for _ in 0..100 {
            last_code = auth.auth_code.clone().unwrap();
            storage.consume_code(&last_code).await.unwrap();
            auth = storage
                .renew(&auth.authorization_id, "user-1", None, None)
                .await
                .unwrap();
        }

        assert_eq!(storage.len(), 1);
        // one live code plus the latest consumed one
        assert_eq!(storage.codes.len(), 2);
        assert!(matches!(
            storage.consume_code(&last_code).await.unwrap_err(),
            AuthError::CodeReplay { .. }
        ));
        assert!(storage.consume_code(auth.auth_code.as_deref().unwrap()).await.is_ok());
        assert_eq!(storage.codes.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_token_refs_missing_authorization() {
        let (_, storage) = stores();
        let err = storage
            .remove_token_refs_by_session("pg.auth.missing", "s", "user-1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound { .. }));
    }
}
