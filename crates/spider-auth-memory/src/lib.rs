//! In-memory storage backend for the Iron Spider identity core.
//!
//! This crate implements the storage traits from `spider-auth` on top of
//! `dashmap` maps. Conditional operations (code consumption, refresh token
//! consumption) run under a single shard lock, so concurrent exchanges of
//! the same secret have exactly one winner.
//!
//! # Example
//!
//! ```ignore
//! use spider_auth::config::AuthConfig;
//! use spider_auth_memory::MemoryBackend;
//!
//! let backend = MemoryBackend::from_config(&config).await?;
//! let service = OAuthService::new(
//!     backend.authorizations.clone(),
//!     backend.tokens.clone(),
//!     backend.clients.clone(),
//!     backend.users.clone(),
//!     issuer,
//! );
//! ```

pub mod authorization;
pub mod client;
pub mod error;
pub mod factory;
pub mod snapshot;
pub mod token;
pub mod user;

pub use authorization::InMemoryAuthorizationStorage;
pub use client::InMemoryClientRegistry;
pub use error::LoadError;
pub use factory::MemoryBackend;
pub use snapshot::{ImportSummary, export_snapshot, import_records, import_snapshot};
pub use token::InMemoryTokenStorage;
pub use user::{InMemoryServerAccess, InMemoryUserDirectory, ServerStartRecord, UsersFile};
