//! # spider-auth
//!
//! OAuth token lifecycle and request authorization for the Iron Spider
//! platform.
//!
//! This crate provides:
//! - Authorization code and refresh token grants with PKCE
//! - Consent approval, client details and RP-initiated logout
//! - JWT issuing for access and id tokens
//! - A request authorizer producing IAM-style allow/deny policies, with a
//!   legacy path-based variant and a shadow comparison mode
//!
//! ## Overview
//!
//! Storage is abstracted behind traits in [`storage`]; the in-memory backend
//! lives in `spider-auth-memory`. The [`http`] handlers and the
//! [`middleware`] are axum-ready and are mounted by `spider-server`.
//!
//! ## Modules
//!
//! - [`config`] - Token lifetimes, signing keys, cookie and authorizer settings
//! - [`oauth`] - Token endpoint grants, approval, logout and PKCE
//! - [`token`] - JWT encoding and the token issuer seam
//! - [`authorizer`] - Request authorizers and operation policies
//! - [`middleware`] - Per-route authorization and error responses
//! - [`storage`] - Storage traits for authorizations, tokens, clients and users
//! - [`types`] - Domain records
//! - [`http`] - Axum HTTP handlers

pub mod authorizer;
pub mod config;
pub mod error;
pub mod http;
pub mod middleware;
pub mod oauth;
pub mod storage;
pub mod token;
pub mod types;

#[cfg(test)]
mod testing;

pub use authorizer::{
    AuthMechanism, AuthorizerContext, AuthorizerPolicy, AuthorizerRequest, CredentialServices,
    OperationPolicy, OperationTable, RequestAuthorizer, build_authorizer, default_operations,
};
pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};
pub use http::{
    approve_handler, authorizer_handler, details_handler, logout_handler, token_handler,
};
pub use middleware::{OperationGuard, authorize_operation};
pub use oauth::OAuthService;
pub use storage::{AuthorizationStorage, ClientRegistry, TokenStorage, UserDirectory};
pub use types::{Authorization, GrantType, OidcClient, Token, TokenType, UserInfo};

/// Type alias for authentication/authorization results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use spider_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::authorizer::{
        AuthMechanism, AuthorizerContext, AuthorizerPolicy, AuthorizerRequest, CredentialServices,
        OperationPolicy, OperationTable, RequestAuthorizer, build_authorizer, default_operations,
    };
    pub use crate::config::{AuthConfig, ConfigError};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::middleware::{OperationGuard, authorize_operation};
    pub use crate::oauth::OAuthService;
    pub use crate::storage::{AuthorizationStorage, ClientRegistry, TokenStorage, UserDirectory};
    pub use crate::types::{Authorization, GrantType, OidcClient, Token, TokenType, UserInfo};
}
