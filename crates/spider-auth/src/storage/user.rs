//! User directory trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::UserInfo;

/// Read access to platform user profiles.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Loads a user profile.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the user does not exist.
    async fn get_user(&self, user_id: &str) -> AuthResult<UserInfo>;
}
