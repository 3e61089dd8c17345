//! Client registry backed by an immutable snapshot.
//!
//! The whole registry is swapped atomically with [`ArcSwap`], so lookups
//! never block and a reload either fully applies or leaves the previous
//! registrations in place.
//!
//! # File format
//!
//! ```json
//! {
//!   "clients": [
//!     {
//!       "clientId": "c1",
//!       "clientName": "Date Tracker",
//!       "clientSecret": "...",
//!       "redirectUris": ["https://dates.parkergiven.com/callback"],
//!       "scopes": ["openid", "iron-spider-api:date-tracker.read"],
//!       "apiKey": "..."
//!     }
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde::Deserialize;

use spider_auth::AuthResult;
use spider_auth::storage::ClientRegistry;
use spider_auth::types::OidcClient;

use crate::error::{LoadError, read_json};

#[derive(Debug, Deserialize)]
struct ClientsFile {
    #[serde(default)]
    clients: Vec<OidcClient>,
}

#[derive(Debug, Default)]
struct ClientSnapshot {
    clients: HashMap<String, OidcClient>,
}

impl ClientSnapshot {
    fn build(clients: Vec<OidcClient>) -> Result<Self, LoadError> {
        let mut by_id = HashMap::with_capacity(clients.len());
        for client in clients {
            client.validate().map_err(LoadError::InvalidClient)?;
            if by_id.contains_key(&client.client_id) {
                return Err(LoadError::InvalidClient(format!(
                    "duplicate clientId '{}'",
                    client.client_id
                )));
            }
            by_id.insert(client.client_id.clone(), client);
        }
        Ok(Self { clients: by_id })
    }
}

/// In-memory [`ClientRegistry`] with explicit reload.
pub struct InMemoryClientRegistry {
    snapshot: ArcSwap<ClientSnapshot>,
    source: Option<PathBuf>,
}

impl InMemoryClientRegistry {
    /// Creates a registry from a fixed set of clients.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::InvalidClient` if a client fails validation or
    /// two clients share an id.
    pub fn new(clients: Vec<OidcClient>) -> Result<Self, LoadError> {
        Ok(Self {
            snapshot: ArcSwap::from_pointee(ClientSnapshot::build(clients)?),
            source: None,
        })
    }

    /// Loads the registry from a JSON file and remembers the path for
    /// [`reload`](Self::reload).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let file: ClientsFile = read_json(path).await?;
        let snapshot = ClientSnapshot::build(file.clients)?;
        tracing::info!(
            path = %path.display(),
            clients = snapshot.clients.len(),
            "Loaded client registry"
        );
        Ok(Self {
            snapshot: ArcSwap::from_pointee(snapshot),
            source: Some(path.to_path_buf()),
        })
    }

    /// Re-reads the source file and swaps in the new registrations.
    ///
    /// A registry built with [`new`](Self::new) has no source and keeps its
    /// clients. On failure the previous registrations stay active.
    ///
    /// # Returns
    ///
    /// The number of registered clients after the reload.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub async fn reload(&self) -> Result<usize, LoadError> {
        let Some(path) = &self.source else {
            return Ok(self.len());
        };

        let loaded = match read_json::<ClientsFile>(path).await {
            Ok(file) => ClientSnapshot::build(file.clients),
            Err(e) => Err(e),
        };
        match loaded {
            Ok(snapshot) => {
                let count = snapshot.clients.len();
                self.snapshot.store(Arc::new(snapshot));
                tracing::info!(path = %path.display(), clients = count, "Reloaded client registry");
                Ok(count)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Client registry reload failed, keeping previous registrations"
                );
                Err(e)
            }
        }
    }

    /// Replaces every registration.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::InvalidClient` if a client fails validation.
    pub fn replace(&self, clients: Vec<OidcClient>) -> Result<usize, LoadError> {
        let snapshot = ClientSnapshot::build(clients)?;
        let count = snapshot.clients.len();
        self.snapshot.store(Arc::new(snapshot));
        Ok(count)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot.load().clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find(&self, predicate: impl Fn(&OidcClient) -> bool) -> Option<OidcClient> {
        self.snapshot
            .load()
            .clients
            .values()
            .find(|&client| predicate(client))
            .cloned()
    }
}

#[async_trait]
impl ClientRegistry for InMemoryClientRegistry {
    async fn get_client(&self, client_id: &str) -> AuthResult<Option<OidcClient>> {
        Ok(self.snapshot.load().clients.get(client_id).cloned())
    }

    async fn get_client_by_secret(&self, client_secret: &str) -> AuthResult<Option<OidcClient>> {
        Ok(self.find(|client| client.verify_secret(client_secret)))
    }

    async fn get_client_by_api_key(&self, api_key: &str) -> AuthResult<Option<OidcClient>> {
        Ok(self.find(|client| client.matches_api_key(api_key)))
    }
}
