//! Request and response types of the OAuth endpoints.

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Token request parameters (form encoded).
///
/// Different fields are required depending on the `grant_type`:
///
/// - `authorization_code`: code, redirect_uri, code_verifier (if PKCE)
/// - `refresh_token`: refresh_token
///
/// Clients authenticate with `client_id` + `client_secret`, unless the
/// request was pre-authenticated by the authorizer (HTTP Basic).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    /// OAuth 2.0 grant type.
    #[serde(default)]
    pub grant_type: Option<String>,

    /// Authorization code (for authorization_code grant).
    #[serde(default)]
    pub code: Option<String>,

    /// Redirect URI (must be registered for the client).
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// PKCE code verifier (for authorization_code grant).
    #[serde(default)]
    pub code_verifier: Option<String>,

    /// Refresh token (for refresh_token grant).
    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,
}

/// Successful token response.
///
/// # Example Response
///
/// ```json
/// {
///   "access_token": "eyJhbG...",
///   "refresh_token": "hL0w...",
///   "id_token": "eyJhbG...",
///   "token_type": "Bearer",
///   "expires_in": 3600,
///   "scope": "openid read"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub id_token: String,

    /// Token type, always "Bearer".
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: i64,

    /// Granted scopes (space-separated).
    pub scope: String,
}

/// Approve request (JSON). The user comes from the authenticated session.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApproveRequest {
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub redirect_uri: Option<String>,

    #[serde(default)]
    pub scopes: Option<Vec<String>>,

    #[serde(default)]
    pub code_challenge: Option<String>,

    #[serde(default)]
    pub code_challenge_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveResponse {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
}

/// RP-initiated logout request (JSON).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LogoutRequest {
    #[serde(default, alias = "clientId")]
    pub client_id: Option<String>,

    #[serde(default, rename = "postLogoutRedirectUri")]
    pub post_logout_redirect_uri: Option<String>,

    /// Value of a token of the session to end.
    #[serde(default, rename = "idTokenHint")]
    pub id_token_hint: Option<String>,

    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub redirect_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Query of the client details lookup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDetailsQuery {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

/// Client details shown on the consent screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDetails {
    pub client_name: String,
}

/// OAuth error response body.
///
/// ```json
/// {
///   "error": "invalid_grant",
///   "error_description": "Invalid code"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    pub error_description: String,
}

impl From<&AuthError> for OAuthErrorResponse {
    fn from(err: &AuthError) -> Self {
        Self {
            error: err.oauth_error_code().to_string(),
            error_description: err.public_description(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logout_request_field_names() {
        let json = r#"{
            "client_id": "c1",
            "postLogoutRedirectUri": "https://app.example.com/bye",
            "idTokenHint": "tok",
            "state": "xyz"
        }"#;
        let req: LogoutRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.client_id.as_deref(), Some("c1"));
        assert_eq!(req.post_logout_redirect_uri.as_deref(), Some("https://app.example.com/bye"));
        assert_eq!(req.id_token_hint.as_deref(), Some("tok"));
    }

    #[test]
    fn test_client_details_query_is_camel_case() {
        let query: ClientDetailsQuery =
            serde_json::from_str(r#"{"clientId":"c1","redirectUri":"https://x"}"#).unwrap();
        assert_eq!(query.client_id.as_deref(), Some("c1"));
        assert_eq!(query.redirect_uri.as_deref(), Some("https://x"));
    }

    #[test]
    fn test_error_response_from_replay() {
        let body = OAuthErrorResponse::from(&AuthError::code_replay("pg.auth.1"));
        assert_eq!(body.error, "invalid_grant");
        assert_eq!(body.error_description, "Authorization code expired or already used");
    }
}
