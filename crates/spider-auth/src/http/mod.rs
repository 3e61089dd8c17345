//! HTTP handlers for the OAuth and authorizer endpoints.
//!
//! # Available Handlers
//!
//! - [`token_handler`] - token endpoint (code and refresh grants)
//! - [`approve_handler`] - consent approval
//! - [`logout_handler`] - RP-initiated logout
//! - [`details_handler`] - client details for the consent screen
//! - [`authorizer_handler`] - authorizer contract

pub mod authorizer;
pub mod oauth;

pub use authorizer::authorizer_handler;
pub use oauth::{approve_handler, details_handler, logout_handler, token_handler};
