//! Storage traits for the token lifecycle and authorizer.
//!
//! This module defines storage interfaces for:
//!
//! - Authorizations (consent grants and their auth codes)
//! - Issued access and refresh tokens
//! - OAuth client registrations
//! - Platform user profiles
//!
//! plus the one-time migration of legacy authorization records.
//!
//! # Implementations
//!
//! Storage implementations are provided in separate crates:
//!
//! - `spider-auth-memory` - concurrent in-memory backend

pub mod authorization;
pub mod client;
pub mod migration;
pub mod token;
pub mod user;

pub use authorization::AuthorizationStorage;
pub use client::ClientRegistry;
pub use migration::{LegacyAuthorizationRecord, migrate_legacy_authorization};
pub use token::{DELETE_BATCH_SIZE, TokenStorage};
pub use user::UserDirectory;
