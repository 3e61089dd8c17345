//! In-memory token storage.
//!
//! Records live in a `DashMap` keyed by token id with a secondary
//! value → id index. Refresh consumption is a `remove_if` on the value
//! index, so the check and the removal happen under one shard lock.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use spider_auth::AuthResult;
use spider_auth::error::AuthError;
use spider_auth::storage::{DELETE_BATCH_SIZE, TokenStorage};
use spider_auth::types::{Token, TokenType};

const TOKEN_NOT_FOUND: &str = "Token not found";

/// Concurrent in-memory [`TokenStorage`].
#[derive(Debug, Default)]
pub struct InMemoryTokenStorage {
    tokens: DashMap<String, Token>,
    by_value: DashMap<String, String>,
}

impl InMemoryTokenStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Snapshot of every stored token.
    #[must_use]
    pub fn all(&self) -> Vec<Token> {
        self.tokens
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Removes expired tokens. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let expired: Vec<Token> = self
            .tokens
            .iter()
            .filter(|entry| entry.value().is_expired())
            .map(|entry| entry.value().clone())
            .collect();

        for token in &expired {
            self.remove_record(&token.token_id);
        }
        expired.len()
    }

    fn remove_record(&self, token_id: &str) -> Option<Token> {
        let (_, token) = self.tokens.remove(token_id)?;
        self.by_value
            .remove_if(&token.token_value, |_, id| id == token_id);
        Some(token)
    }
}

#[async_trait]
impl TokenStorage for InMemoryTokenStorage {
    async fn get_by_value(&self, token_value: &str) -> AuthResult<Token> {
        let token_id = self
            .by_value
            .get(token_value)
            .map(|id| id.value().clone())
            .ok_or_else(|| AuthError::not_found(TOKEN_NOT_FOUND))?;

        self.get_by_id(&token_id).await
    }

    async fn get_by_id(&self, token_id: &str) -> AuthResult<Token> {
        self.tokens
            .get(token_id)
            .map(|token| token.value().clone())
            .ok_or_else(|| AuthError::not_found(TOKEN_NOT_FOUND))
    }

    async fn list_by_authorization(&self, authorization_id: &str) -> AuthResult<Vec<Token>> {
        Ok(self
            .tokens
            .iter()
            .filter(|entry| entry.value().authorization_id == authorization_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn create(&self, token: &Token) -> AuthResult<String> {
        // Lock order: value index, then records.
        match self.by_value.entry(token.token_value.clone()) {
            Entry::Occupied(_) => Err(AuthError::storage("Duplicate token value")),
            Entry::Vacant(value_slot) => match self.tokens.entry(token.token_id.clone()) {
                Entry::Occupied(_) => Err(AuthError::storage("Duplicate token id")),
                Entry::Vacant(record_slot) => {
                    record_slot.insert(token.clone());
                    value_slot.insert(token.token_id.clone());
                    Ok(token.token_id.clone())
                }
            },
        }
    }

    async fn delete(&self, token_id: &str) -> AuthResult<()> {
        self.remove_record(token_id);
        Ok(())
    }

    async fn delete_all_by_authorization(&self, authorization_id: &str) -> AuthResult<usize> {
        let ids: Vec<String> = self
            .tokens
            .iter()
            .filter(|entry| entry.value().authorization_id == authorization_id)
            .map(|entry| entry.key().clone())
            .collect();

        let mut deleted = 0;
        for batch in ids.chunks(DELETE_BATCH_SIZE) {
            deleted += batch
                .iter()
                .filter(|id| self.remove_record(id).is_some())
                .count();
            tracing::debug!(
                authorization_id = %authorization_id,
                batch = batch.len(),
                "Deleted token batch"
            );
        }
        Ok(deleted)
    }

    async fn consume(
        &self,
        token_value: &str,
        token_type: TokenType,
        client_id: &str,
    ) -> AuthResult<Token> {
        let (_, token_id) = self
            .by_value
            .remove_if(token_value, |_, id| {
                self.tokens.get(id).is_some_and(|token| {
                    token.token_type == token_type && token.client_id == client_id
                })
            })
            .ok_or_else(|| AuthError::not_found(TOKEN_NOT_FOUND))?;

        self.tokens
            .remove(&token_id)
            .map(|(_, token)| token)
            .ok_or_else(|| AuthError::not_found(TOKEN_NOT_FOUND))
    }
}
