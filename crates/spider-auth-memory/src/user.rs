//! User directory and the legacy server-access ledger.
//!
//! Both are seeded from one users file:
//!
//! ```json
//! {
//!   "users": [
//!     {
//!       "id": "user-1",
//!       "displayName": "Parker",
//!       "siteAccess": ["console"],
//!       "apiAccess": ["date-tracker"]
//!     }
//!   ],
//!   "serverAccess": ["parker"]
//! }
//! ```
//!
//! `serverAccess` lists the federated usernames allowed to start and stop
//! the game server.

use std::path::Path;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde::Deserialize;
use time::OffsetDateTime;

use spider_auth::AuthResult;
use spider_auth::authorizer::ServerAccessChecker;
use spider_auth::error::AuthError;
use spider_auth::storage::UserDirectory;
use spider_auth::types::UserInfo;

use crate::error::{LoadError, read_json};

/// Parsed users file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersFile {
    #[serde(default)]
    pub users: Vec<UserInfo>,
    #[serde(default)]
    pub server_access: Vec<String>,
}

impl UsersFile {
    /// Reads a users file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let file: Self = read_json(path).await?;
        tracing::info!(
            path = %path.display(),
            users = file.users.len(),
            server_access = file.server_access.len(),
            "Loaded users file"
        );
        Ok(file)
    }
}

// =============================================================================
// Users
// =============================================================================

/// In-memory [`UserDirectory`].
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: DashMap<String, UserInfo>,
}

impl InMemoryUserDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_users(users: impl IntoIterator<Item = UserInfo>) -> Self {
        let directory = Self::new();
        for user in users {
            directory.add_user(user);
        }
        directory
    }

    /// Adds or replaces a user profile.
    pub fn add_user(&self, user: UserInfo) {
        self.users.insert(user.id.clone(), user);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_user(&self, user_id: &str) -> AuthResult<UserInfo> {
        self.users
            .get(user_id)
            .map(|user| user.value().clone())
            .ok_or_else(|| AuthError::not_found("User not found"))
    }
}

// =============================================================================
// Server access
// =============================================================================

/// Start history of one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStartRecord {
    pub starts: u64,
    pub last_started: OffsetDateTime,
}

/// In-memory [`ServerAccessChecker`].
///
/// Allowed usernames come from configuration; every successful check is
/// recorded as a server start.
#[derive(Debug, Default)]
pub struct InMemoryServerAccess {
    allowed: DashSet<String>,
    starts: DashMap<String, ServerStartRecord>,
}

impl InMemoryServerAccess {
    #[must_use]
    pub fn new<I, S>(usernames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let access = Self::default();
        for username in usernames {
            access.grant(username);
        }
        access
    }

    pub fn grant(&self, username: impl Into<String>) {
        self.allowed.insert(username.into());
    }

    pub fn revoke(&self, username: &str) {
        self.allowed.remove(username);
    }

    /// Start history for `username`, if the user ever started the server.
    #[must_use]
    pub fn start_record(&self, username: &str) -> Option<ServerStartRecord> {
        self.starts.get(username).map(|record| record.value().clone())
    }
}

#[async_trait]
impl ServerAccessChecker for InMemoryServerAccess {
    async fn check_server_access(&self, username: &str) -> AuthResult<bool> {
        if !self.allowed.contains(username) {
            tracing::debug!(username = %username, "Server access not granted");
            return Ok(false);
        }

        let now = OffsetDateTime::now_utc();
        self.starts
            .entry(username.to_string())
            .and_modify(|record| {
                record.starts += 1;
                record.last_started = now;
            })
            .or_insert(ServerStartRecord {
                starts: 1,
                last_started: now,
            });
        tracing::info!(username = %username, "Server start recorded");
        Ok(true)
    }
}
