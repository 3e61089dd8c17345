//! Builds the full set of in-memory stores from configuration.

use std::sync::Arc;

use spider_auth::config::AuthConfig;

use crate::authorization::InMemoryAuthorizationStorage;
use crate::client::InMemoryClientRegistry;
use crate::error::LoadError;
use crate::snapshot::{ImportSummary, export_snapshot, import_snapshot};
use crate::token::InMemoryTokenStorage;
use crate::user::{InMemoryServerAccess, InMemoryUserDirectory, UsersFile};

/// Every store the identity core needs, backed by memory.
#[derive(Clone)]
pub struct MemoryBackend {
    pub tokens: Arc<InMemoryTokenStorage>,
    pub authorizations: Arc<InMemoryAuthorizationStorage>,
    pub clients: Arc<InMemoryClientRegistry>,
    pub users: Arc<InMemoryUserDirectory>,
    pub server_access: Arc<InMemoryServerAccess>,
}

impl MemoryBackend {
    /// Creates the stores and seeds them from the configured files.
    ///
    /// - `clients_file` seeds the client registry (empty when unset)
    /// - `users_file` seeds the user directory and the server-access ledger
    /// - `snapshot_file` is imported when it exists; a missing file means a
    ///   first start
    ///
    /// # Errors
    ///
    /// Returns an error if a configured file cannot be read or parsed.
    pub async fn from_config(config: &AuthConfig) -> Result<Self, LoadError> {
        let tokens = Arc::new(InMemoryTokenStorage::new());
        let authorizations = Arc::new(
            InMemoryAuthorizationStorage::new(tokens.clone())
                .with_code_lifetime(config.oauth.authorization_code_lifetime),
        );

        let clients = match &config.clients_file {
            Some(path) => InMemoryClientRegistry::from_file(path).await?,
            None => {
                tracing::warn!("No clients_file configured, client registry is empty");
                InMemoryClientRegistry::new(Vec::new())?
            }
        };

        let users_file = match &config.users_file {
            Some(path) => UsersFile::load(path).await?,
            None => UsersFile::default(),
        };

        let backend = Self {
            tokens,
            authorizations,
            clients: Arc::new(clients),
            users: Arc::new(InMemoryUserDirectory::from_users(users_file.users)),
            server_access: Arc::new(InMemoryServerAccess::new(users_file.server_access)),
        };

        if let Some(path) = &config.snapshot_file {
            let exists = tokio::fs::try_exists(path)
                .await
                .map_err(|source| LoadError::Io {
                    path: path.clone(),
                    source,
                })?;
            if exists {
                backend.import(path).await?;
            } else {
                tracing::info!(path = %path.display(), "No snapshot to import");
            }
        }

        Ok(backend)
    }

    /// Imports a snapshot file into this backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn import(
        &self,
        path: impl AsRef<std::path::Path>,
    ) -> Result<ImportSummary, LoadError> {
        import_snapshot(path, &self.authorizations, &self.tokens).await
    }

    /// Writes the authorization and token stores to the configured
    /// snapshot file. Does nothing when no snapshot file is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn persist(&self, config: &AuthConfig) -> Result<(), LoadError> {
        match &config.snapshot_file {
            Some(path) => export_snapshot(path, &self.authorizations, &self.tokens).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use spider_auth::storage::{AuthorizationStorage, ClientRegistry, UserDirectory};

    use super::*;

    #[tokio::test]
    async fn test_defaults_without_files() {
        let backend = MemoryBackend::from_config(&AuthConfig::default())
            .await
            .unwrap();

        assert!(backend.clients.is_empty());
        assert!(backend.users.is_empty());
        assert!(backend.authorizations.is_empty());
    }

    #[tokio::test]
    async fn test_seeds_from_files_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let clients = dir.path().join("clients.json");
        let users = dir.path().join("users.json");
        std::fs::write(
            &clients,
            r#"{"clients":[{"clientId":"c1","clientName":"App","clientSecret":"s1","redirectUris":["https://app.example.com/cb"]}]}"#,
        )
        .unwrap();
        std::fs::write(
            &users,
            r#"{"users":[{"id":"user-1","displayName":"Parker"}],"serverAccess":["parker"]}"#,
        )
        .unwrap();

        let config = AuthConfig {
            clients_file: Some(clients),
            users_file: Some(users),
            snapshot_file: Some(dir.path().join("snapshot.json")),
            ..AuthConfig::default()
        };

        let backend = MemoryBackend::from_config(&config).await.unwrap();
        assert!(backend.clients.get_client("c1").await.unwrap().is_some());
        assert_eq!(backend.users.get_user("user-1").await.unwrap().display_name, "Parker");

        backend
            .authorizations
            .create("c1", "user-1", vec![], None, None)
            .await
            .unwrap();
        backend.persist(&config).await.unwrap();

        let restarted = MemoryBackend::from_config(&config).await.unwrap();
        assert!(
            restarted
                .authorizations
                .get_for_user_and_client("user-1", "c1")
                .await
                .unwrap()
                .is_some()
        );
    }
}
