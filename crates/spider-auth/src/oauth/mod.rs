//! OAuth 2.0 token lifecycle.
//!
//! This module provides:
//!
//! - Consent approval issuing single-use authorization codes
//! - The token endpoint (`authorization_code` and `refresh_token` grants)
//! - RP-initiated logout
//! - PKCE verification (RFC 7636)

mod exchange;
pub mod pkce;
pub mod service;
pub mod types;

pub use pkce::{PkceChallenge, PkceChallengeMethod, PkceError, verify_code_verifier};
pub use service::{OAuthService, TOKEN_TYPE_BEARER};
pub use types::{
    ApproveRequest, ApproveResponse, ClientDetails, ClientDetailsQuery, LogoutRequest,
    LogoutResponse, OAuthErrorResponse, TokenRequest, TokenResponse,
};
