//! Token generation and encoding.
//!
//! This module provides:
//!
//! - The [`TokenIssuer`] seam used by the lifecycle operations
//! - A JWT-backed default issuer
//! - JWT encoding and decoding

pub mod issuer;
pub mod jwt;

pub use issuer::{IssuedToken, JwtTokenIssuer, TokenIssuer};
pub use jwt::{
    AccessTokenClaims, IdTokenClaims, JwtError, JwtService, SessionClaims, SigningAlgorithm,
    SigningKey, validity_window,
};
