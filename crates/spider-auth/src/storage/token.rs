//! Token storage trait.
//!
//! Tokens are keyed by `token_id` and indexed by `token_value` and
//! `authorization_id`.
//!
//! # Security Considerations
//!
//! - Never log token values
//! - Lookup misses must not reveal whether a value ever existed

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::{Token, TokenType};

/// Bulk deletes are issued in batches of this many records.
pub const DELETE_BATCH_SIZE: usize = 25;

/// Storage trait for issued [`Token`] records.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Finds a token by its exact value.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no token has this value.
    async fn get_by_value(&self, token_value: &str) -> AuthResult<Token>;

    /// Finds a token by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no token has this id.
    async fn get_by_id(&self, token_id: &str) -> AuthResult<Token>;

    /// Lists every token minted from an authorization.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list_by_authorization(&self, authorization_id: &str) -> AuthResult<Vec<Token>>;

    /// Stores a token.
    ///
    /// # Returns
    ///
    /// The stored token's id.
    ///
    /// # Errors
    ///
    /// Returns an error if a token with the same id or value already exists.
    async fn create(&self, token: &Token) -> AuthResult<String>;

    /// Deletes a token by id. Deleting a missing token is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete(&self, token_id: &str) -> AuthResult<()>;

    /// Deletes every token minted from an authorization.
    ///
    /// Deletes are issued in batches of [`DELETE_BATCH_SIZE`].
    ///
    /// # Returns
    ///
    /// The number of tokens deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete_all_by_authorization(&self, authorization_id: &str) -> AuthResult<usize>;

    /// Atomically removes and returns a token of the given type.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no token with this value, type and client
    /// exists. A token presented by another client is left untouched. Of two
    /// concurrent calls with the same value, exactly one succeeds.
    ///
    /// # Atomicity
    ///
    /// Implementations must use a conditional delete keyed on the value,
    /// for example:
    ///
    /// ```text
    /// DELETE FROM token
    ///  WHERE token_value = $1 AND token_type = $2 AND client_id = $3
    /// RETURNING *
    /// ```
    async fn consume(
        &self,
        token_value: &str,
        token_type: TokenType,
        client_id: &str,
    ) -> AuthResult<Token>;
}
