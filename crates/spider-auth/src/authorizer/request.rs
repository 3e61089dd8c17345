//! Inbound request as seen by the authorizer.

use std::collections::HashMap;

use axum::http::HeaderMap;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

/// A request to authorize.
///
/// Header names are matched case-insensitively.
///
/// ```json
/// {
///   "path": "/server/start",
///   "httpMethod": "POST",
///   "headers": { "spider-access-token": "..." },
///   "operationName": "StartServer",
///   "methodArn": "arn:aws:execute-api:us-east-1:123:api/prod/POST/server/start"
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerRequest {
    pub path: String,

    #[serde(default)]
    pub http_method: String,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Operation the request is routed to; selects the mechanism policy.
    #[serde(default)]
    pub operation_name: Option<String>,

    /// Resource the resulting policy statement applies to.
    #[serde(default)]
    pub method_arn: String,
}

/// Client credentials from an `Authorization: Basic` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl AuthorizerRequest {
    /// Builds a request from an in-process HTTP request.
    #[must_use]
    pub fn from_http(
        path: &str,
        method: &str,
        headers: &HeaderMap,
        operation_name: Option<&str>,
    ) -> Self {
        let headers = headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        Self {
            path: path.to_string(),
            http_method: method.to_string(),
            headers,
            operation_name: operation_name.map(ToString::to_string),
            method_arn: format!("{method} {path}"),
        }
    }

    /// Returns a header value, ignoring the case of the name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns a non-empty header value.
    #[must_use]
    pub fn non_empty_header(&self, name: &str) -> Option<&str> {
        self.header(name).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Returns the value of a cookie from the `Cookie` header.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        let header = self.header("cookie")?;
        cookie::Cookie::split_parse_encoded(header)
            .filter_map(Result::ok)
            .find(|c| c.name() == name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Returns the token of an `Authorization: Bearer` header.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.header("authorization")?
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Returns `true` if the request carries an `Authorization: Basic` header.
    #[must_use]
    pub fn has_basic_credentials(&self) -> bool {
        self.header("authorization")
            .is_some_and(|h| h.starts_with("Basic "))
    }

    /// Decodes an `Authorization: Basic` header.
    ///
    /// Returns `None` if the header is absent or malformed.
    #[must_use]
    pub fn basic_credentials(&self) -> Option<BasicCredentials> {
        let encoded = self.header("authorization")?.strip_prefix("Basic ")?;
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;

        Some(BasicCredentials {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}
