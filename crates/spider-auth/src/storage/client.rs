//! OAuth client registry trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::OidcClient;

/// Resolves registered OAuth clients.
///
/// Registries are read-mostly; implementations may cache and reload their
/// contents at any time.
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Finds a client by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read.
    async fn get_client(&self, client_id: &str) -> AuthResult<Option<OidcClient>>;

    /// Finds the client whose secret equals `client_secret`.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read.
    async fn get_client_by_secret(&self, client_secret: &str) -> AuthResult<Option<OidcClient>>;

    /// Finds the client that owns an API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read.
    async fn get_client_by_api_key(&self, api_key: &str) -> AuthResult<Option<OidcClient>>;

    /// Verifies a client id/secret pair.
    ///
    /// # Returns
    ///
    /// The client if it exists and the secret matches.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read.
    async fn verify_credentials(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> AuthResult<Option<OidcClient>> {
        Ok(self
            .get_client(client_id)
            .await?
            .filter(|client| client.verify_secret(client_secret)))
    }
}
