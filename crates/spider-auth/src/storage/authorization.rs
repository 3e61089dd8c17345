//! Authorization storage trait.
//!
//! # Implementation Notes
//!
//! Implementations should:
//!
//! - Key records by (authorization id, user id)
//! - Index the current authorization code and the (user, client) pair
//! - Remember consumed codes long enough to tell a replay apart from an
//!   unknown code
//! - Make [`AuthorizationStorage::consume_code`] a single conditional update
//!
//! # Security Considerations
//!
//! - Never log authorization codes
//! - A code must be exchangeable at most once, even under concurrent requests

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::{Authorization, TokenRef};

/// Storage trait for [`Authorization`] records.
///
/// One authorization exists per (user, client). It carries the single live
/// authorization code and the ids of the tokens minted from it.
#[async_trait]
pub trait AuthorizationStorage: Send + Sync {
    /// Creates a new authorization with a fresh id and authorization code.
    ///
    /// # Arguments
    ///
    /// * `client_id` - Client the user consented to
    /// * `user_id` - Consenting user
    /// * `scopes` - Granted scopes
    /// * `code_challenge` / `code_challenge_method` - Optional PKCE binding
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be stored.
    async fn create(
        &self,
        client_id: &str,
        user_id: &str,
        scopes: Vec<String>,
        code_challenge: Option<String>,
        code_challenge_method: Option<String>,
    ) -> AuthResult<Authorization>;

    /// Loads an authorization by its key.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such authorization exists.
    async fn get_by_id(&self, authorization_id: &str, user_id: &str) -> AuthResult<Authorization>;

    /// Loads the authorization that owns a usable authorization code.
    ///
    /// Does not consume the code.
    ///
    /// # Errors
    ///
    /// - `InvalidGrant` if the code is unknown or past its expiry
    /// - `CodeReplay` if the code was already exchanged
    async fn get_by_code(&self, code: &str) -> AuthResult<Authorization>;

    /// Finds the authorization for a (user, client) pair.
    ///
    /// # Returns
    ///
    /// `Some(authorization)` if the user already consented to the client.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if more than one record matches; that is a data
    /// integrity fault, not a lookup miss.
    async fn get_for_user_and_client(
        &self,
        user_id: &str,
        client_id: &str,
    ) -> AuthResult<Option<Authorization>>;

    /// Issues a new authorization code on an existing authorization.
    ///
    /// The previous code stops working. Id, user, client, scopes and token
    /// references are preserved.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the previous authorization does not exist.
    async fn renew(
        &self,
        previous_authorization_id: &str,
        user_id: &str,
        code_challenge: Option<String>,
        code_challenge_method: Option<String>,
    ) -> AuthResult<Authorization>;

    /// Marks the current code as used, clears it and expires it now.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the authorization does not exist.
    async fn mark_code_used(&self, authorization_id: &str, user_id: &str) -> AuthResult<()>;

    /// Validates and consumes an authorization code in one step.
    ///
    /// # Returns
    ///
    /// The authorization as it was before consumption (code and PKCE
    /// challenge still populated).
    ///
    /// # Errors
    ///
    /// Same as [`AuthorizationStorage::get_by_code`]. Of two concurrent calls
    /// with the same code, exactly one succeeds.
    ///
    /// # Atomicity
    ///
    /// Implementations must validate and mark the code in a single
    /// conditional write, for example:
    ///
    /// ```text
    /// UPDATE authorization
    /// SET auth_code = NULL, auth_code_used = true, auth_code_expires_at = now()
    /// WHERE auth_code = $1 AND auth_code_used = false AND auth_code_expires_at > now()
    /// RETURNING *
    /// ```
    async fn consume_code(&self, code: &str) -> AuthResult<Authorization>;

    /// Links tokens to an authorization.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the authorization does not exist.
    async fn add_token_refs(
        &self,
        authorization_id: &str,
        user_id: &str,
        refs: &[TokenRef],
    ) -> AuthResult<()>;

    /// Unlinks the given token ids from an authorization.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the authorization does not exist.
    async fn remove_token_refs(
        &self,
        authorization_id: &str,
        user_id: &str,
        token_ids: &[String],
    ) -> AuthResult<()>;

    /// Unlinks every token of a session from an authorization.
    ///
    /// Looks up the authorization's tokens, keeps those whose `session_id`
    /// matches, removes their ids from both reference lists and persists.
    ///
    /// # Returns
    ///
    /// The removed token ids, for the caller to delete from token storage.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the authorization does not exist.
    async fn remove_token_refs_by_session(
        &self,
        authorization_id: &str,
        session_id: &str,
        user_id: &str,
    ) -> AuthResult<Vec<String>>;
}
