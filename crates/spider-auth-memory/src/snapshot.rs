//! Snapshot import and export.
//!
//! A snapshot is the persisted content of the authorization and token
//! stores:
//!
//! ```json
//! { "authorizations": [ ... ], "tokens": [ ... ] }
//! ```
//!
//! Authorizations may be in the legacy single-token shape; import migrates
//! them with [`migrate_legacy_authorization`] before they reach the store.

use std::path::Path;

use serde::{Deserialize, Serialize};

use spider_auth::storage::{
    LegacyAuthorizationRecord, TokenStorage, migrate_legacy_authorization,
};
use spider_auth::types::{Authorization, Token};

use crate::authorization::InMemoryAuthorizationStorage;
use crate::error::{LoadError, read_json};
use crate::token::InMemoryTokenStorage;

#[derive(Debug, Default, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    authorizations: Vec<LegacyAuthorizationRecord>,
    #[serde(default)]
    tokens: Vec<Token>,
}

#[derive(Serialize)]
struct SnapshotOut<'a> {
    authorizations: &'a [Authorization],
    tokens: &'a [Token],
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Authorizations stored.
    pub authorizations: usize,
    /// Authorizations that carried legacy embedded tokens.
    pub migrated: usize,
    /// Tokens stored, including promoted legacy tokens.
    pub tokens: usize,
    /// Tokens dropped as duplicates or already expired.
    pub skipped_tokens: usize,
}

/// Imports a snapshot file into the stores.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed. Individual token
/// conflicts are counted in [`ImportSummary::skipped_tokens`].
pub async fn import_snapshot(
    path: impl AsRef<Path>,
    authorizations: &InMemoryAuthorizationStorage,
    tokens: &InMemoryTokenStorage,
) -> Result<ImportSummary, LoadError> {
    let path = path.as_ref();
    let file: SnapshotFile = read_json(path).await?;
    let summary = import_records(file.authorizations, file.tokens, authorizations, tokens).await;
    tracing::info!(
        path = %path.display(),
        authorizations = summary.authorizations,
        migrated = summary.migrated,
        tokens = summary.tokens,
        skipped_tokens = summary.skipped_tokens,
        "Imported authorization snapshot"
    );
    Ok(summary)
}

/// Migrates and stores parsed records.
pub async fn import_records(
    records: Vec<LegacyAuthorizationRecord>,
    standalone_tokens: Vec<Token>,
    authorizations: &InMemoryAuthorizationStorage,
    tokens: &InMemoryTokenStorage,
) -> ImportSummary {
    let mut summary = ImportSummary::default();
    let mut pending = standalone_tokens;

    for record in records {
        if record.has_legacy_tokens() {
            summary.migrated += 1;
        }
        let migrated = migrate_legacy_authorization(record);
        pending.extend(migrated.tokens);
        authorizations.insert(migrated.authorization);
        summary.authorizations += 1;
    }

    for token in pending {
        if token.is_expired() {
            summary.skipped_tokens += 1;
            continue;
        }
        match tokens.create(&token).await {
            Ok(_) => summary.tokens += 1,
            Err(e) => {
                tracing::warn!(
                    token_id = %token.token_id,
                    authorization_id = %token.authorization_id,
                    error = %e,
                    "Skipping token during import"
                );
                summary.skipped_tokens += 1;
            }
        }
    }

    summary
}

/// Writes the current store content to `path`.
///
/// The file is written to a sibling temporary path first and renamed into
/// place.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub async fn export_snapshot(
    path: impl AsRef<Path>,
    authorizations: &InMemoryAuthorizationStorage,
    tokens: &InMemoryTokenStorage,
) -> Result<(), LoadError> {
    let path = path.as_ref();
    let authorizations = authorizations.all();
    let tokens = tokens.all();
    let body = serde_json::to_vec_pretty(&SnapshotOut {
        authorizations: &authorizations,
        tokens: &tokens,
    })
    .map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let staging = path.with_extension("tmp");
    let io_error = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }
    tokio::fs::write(&staging, body).await.map_err(io_error)?;
    tokio::fs::rename(&staging, path).await.map_err(io_error)?;

    tracing::info!(
        path = %path.display(),
        authorizations = authorizations.len(),
        tokens = tokens.len(),
        "Exported authorization snapshot"
    );
    Ok(())
}
