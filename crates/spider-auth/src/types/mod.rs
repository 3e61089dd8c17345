//! Domain types shared by the stores, the lifecycle operations and the authorizer.
//!
//! ## Domain Types
//!
//! - [`Authorization`] - one consent grant per (user, client)
//! - [`Token`] - an issued access or refresh token
//! - [`OidcClient`] - a registered OAuth client
//! - [`UserInfo`] - platform user profile used for identity context

pub mod authorization;
pub mod client;
pub mod token;
pub mod user;

pub use authorization::{AUTH_CODE_LIFETIME, Authorization, TokenRef};
pub use client::{GrantType, OidcClient};
pub use token::{ACCESS_TOKEN_TTL_SECONDS, REFRESH_TOKEN_TTL_SECONDS, Token, TokenType};
pub use user::UserInfo;

/// Deduplicates scopes while keeping their first-seen order.
#[must_use]
pub fn normalize_scopes<I, S>(scopes: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out: Vec<String> = Vec::new();
    for scope in scopes {
        let scope = scope.into();
        if !scope.is_empty() && !out.contains(&scope) {
            out.push(scope);
        }
    }
    out
}

/// Joins scopes into the space-delimited form used on the wire.
#[must_use]
pub fn join_scopes(scopes: &[String]) -> String {
    scopes.join(" ")
}
