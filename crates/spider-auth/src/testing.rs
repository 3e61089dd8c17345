//! In-crate test doubles for the storage traits.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::OAuthService;
use crate::oauth::types::{ApproveRequest, TokenRequest, TokenResponse};
use crate::storage::{AuthorizationStorage, ClientRegistry, TokenStorage, UserDirectory};
use crate::token::{JwtService, JwtTokenIssuer, SigningKey};
use crate::types::{Authorization, GrantType, OidcClient, Token, TokenRef, TokenType, UserInfo};

pub(crate) const CLIENT_ID: &str = "c1";
pub(crate) const CLIENT_SECRET: &str = "s3cret";
pub(crate) const CLIENT_API_KEY: &str = "key-1";
pub(crate) const REDIRECT_URI: &str = "https://app.example.com/callback";
pub(crate) const USER_ID: &str = "user-1";
pub(crate) const ISSUER: &str = "https://api.spider.test";
pub(crate) const SIGNING_SECRET: &[u8] = b"test-signing-secret";

// =============================================================================
// Tokens
// =============================================================================

#[derive(Default)]
pub(crate) struct MockTokenStorage {
    tokens: RwLock<HashMap<String, Token>>,
}

impl MockTokenStorage {
    pub(crate) fn set_expiry(&self, token_value: &str, expires_at: OffsetDateTime) {
        let mut tokens = self.tokens.write().unwrap();
        if let Some(token) = tokens.values_mut().find(|t| t.token_value == token_value) {
            token.expires_at = expires_at;
        }
    }
}

#[async_trait]
impl TokenStorage for MockTokenStorage {
    async fn get_by_value(&self, token_value: &str) -> AuthResult<Token> {
        self.tokens
            .read()
            .unwrap()
            .values()
            .find(|t| t.token_value == token_value)
            .cloned()
            .ok_or_else(|| AuthError::not_found("Token not found"))
    }

    async fn get_by_id(&self, token_id: &str) -> AuthResult<Token> {
        self.tokens
            .read()
            .unwrap()
            .get(token_id)
            .cloned()
            .ok_or_else(|| AuthError::not_found("Token not found"))
    }

    async fn list_by_authorization(&self, authorization_id: &str) -> AuthResult<Vec<Token>> {
        Ok(self
            .tokens
            .read()
            .unwrap()
            .values()
            .filter(|t| t.authorization_id == authorization_id)
            .cloned()
            .collect())
    }

    async fn create(&self, token: &Token) -> AuthResult<String> {
        let mut tokens = self.tokens.write().unwrap();
        if tokens.contains_key(&token.token_id) {
            return Err(AuthError::storage("Duplicate token id"));
        }
        tokens.insert(token.token_id.clone(), token.clone());
        Ok(token.token_id.clone())
    }

    async fn delete(&self, token_id: &str) -> AuthResult<()> {
        self.tokens.write().unwrap().remove(token_id);
        Ok(())
    }

    async fn delete_all_by_authorization(&self, authorization_id: &str) -> AuthResult<usize> {
        let mut tokens = self.tokens.write().unwrap();
        let before = tokens.len();
        tokens.retain(|_, t| t.authorization_id != authorization_id);
        Ok(before - tokens.len())
    }

    async fn consume(
        &self,
        token_value: &str,
        token_type: TokenType,
        client_id: &str,
    ) -> AuthResult<Token> {
        let mut tokens = self.tokens.write().unwrap();
        let id = tokens
            .values()
            .find(|t| {
                t.token_value == token_value
                    && t.token_type == token_type
                    && t.client_id == client_id
            })
            .map(|t| t.token_id.clone())
            .ok_or_else(|| AuthError::not_found("Token not found"))?;
        tokens
            .remove(&id)
            .ok_or_else(|| AuthError::not_found("Token not found"))
    }
}

// =============================================================================
// Authorizations
// =============================================================================

#[derive(Default)]
struct AuthorizationState {
    records: HashMap<String, Authorization>,
    // consumed code -> authorization id
    consumed_codes: HashMap<String, String>,
}

pub(crate) struct MockAuthorizationStorage {
    tokens: Arc<MockTokenStorage>,
    state: RwLock<AuthorizationState>,
}

impl MockAuthorizationStorage {
    pub(crate) fn new(tokens: Arc<MockTokenStorage>) -> Self {
        Self {
            tokens,
            state: RwLock::new(AuthorizationState::default()),
        }
    }

    pub(crate) fn set_code_expiry(&self, code: &str, expires_at: OffsetDateTime) {
        let mut state = self.state.write().unwrap();
        if let Some(auth) = state
            .records
            .values_mut()
            .find(|a| a.auth_code.as_deref() == Some(code))
        {
            auth.auth_code_expires_at = expires_at;
        }
    }

    fn lookup_code(state: &AuthorizationState, code: &str) -> AuthResult<String> {
        let now = OffsetDateTime::now_utc();
        if let Some(auth) = state
            .records
            .values()
            .find(|a| a.auth_code.as_deref() == Some(code))
        {
            if auth.is_code_usable(code, now) {
                return Ok(auth.authorization_id.clone());
            }
            return Err(AuthError::invalid_grant("Invalid code"));
        }
        match state.consumed_codes.get(code) {
            Some(authorization_id) => Err(AuthError::code_replay(authorization_id.clone())),
            None => Err(AuthError::invalid_grant("Invalid code")),
        }
    }

    fn with_record<T>(
        &self,
        authorization_id: &str,
        user_id: &str,
        f: impl FnOnce(&mut Authorization) -> T,
    ) -> AuthResult<T> {
        let mut state = self.state.write().unwrap();
        state
            .records
            .get_mut(authorization_id)
            .filter(|a| a.user_id == user_id)
            .map(f)
            .ok_or_else(|| AuthError::not_found("Authorization not found"))
    }
}

#[async_trait]
impl AuthorizationStorage for MockAuthorizationStorage {
    async fn create(
        &self,
        client_id: &str,
        user_id: &str,
        scopes: Vec<String>,
        code_challenge: Option<String>,
        code_challenge_method: Option<String>,
    ) -> AuthResult<Authorization> {
        let auth = Authorization::new(client_id, user_id, scopes, code_challenge, code_challenge_method);
        self.state
            .write()
            .unwrap()
            .records
            .insert(auth.authorization_id.clone(), auth.clone());
        Ok(auth)
    }

    async fn get_by_id(&self, authorization_id: &str, user_id: &str) -> AuthResult<Authorization> {
        self.state
            .read()
            .unwrap()
            .records
            .get(authorization_id)
            .filter(|a| a.user_id == user_id)
            .cloned()
            .ok_or_else(|| AuthError::not_found("Authorization not found"))
    }

    async fn get_by_code(&self, code: &str) -> AuthResult<Authorization> {
        let state = self.state.read().unwrap();
        let id = Self::lookup_code(&state, code)?;
        state
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| AuthError::invalid_grant("Invalid code"))
    }

    async fn get_for_user_and_client(
        &self,
        user_id: &str,
        client_id: &str,
    ) -> AuthResult<Option<Authorization>> {
        Ok(self
            .state
            .read()
            .unwrap()
            .records
            .values()
            .find(|a| a.user_id == user_id && a.client_id == client_id)
            .cloned())
    }

    async fn renew(
        &self,
        previous_authorization_id: &str,
        user_id: &str,
        code_challenge: Option<String>,
        code_challenge_method: Option<String>,
    ) -> AuthResult<Authorization> {
        self.with_record(previous_authorization_id, user_id, |auth| {
            auth.renew(code_challenge, code_challenge_method);
            auth.clone()
        })
    }

    async fn mark_code_used(&self, authorization_id: &str, user_id: &str) -> AuthResult<()> {
        self.with_record(authorization_id, user_id, Authorization::mark_code_used)
    }

    async fn consume_code(&self, code: &str) -> AuthResult<Authorization> {
        let mut state = self.state.write().unwrap();
        let id = Self::lookup_code(&state, code)?;
        let auth = state
            .records
            .get_mut(&id)
            .ok_or_else(|| AuthError::invalid_grant("Invalid code"))?;
        let before = auth.clone();
        auth.mark_code_used();
        state.consumed_codes.insert(code.to_string(), id);
        Ok(before)
    }

    async fn add_token_refs(
        &self,
        authorization_id: &str,
        user_id: &str,
        refs: &[TokenRef],
    ) -> AuthResult<()> {
        self.with_record(authorization_id, user_id, |auth| auth.add_token_refs(refs))
    }

    async fn remove_token_refs(
        &self,
        authorization_id: &str,
        user_id: &str,
        token_ids: &[String],
    ) -> AuthResult<()> {
        self.with_record(authorization_id, user_id, |auth| auth.remove_token_refs(token_ids))
    }

    async fn remove_token_refs_by_session(
        &self,
        authorization_id: &str,
        session_id: &str,
        user_id: &str,
    ) -> AuthResult<Vec<String>> {
        let ids: Vec<String> = self
            .tokens
            .list_by_authorization(authorization_id)
            .await?
            .into_iter()
            .filter(|t| t.session_id == session_id)
            .map(|t| t.token_id)
            .collect();
        self.with_record(authorization_id, user_id, |auth| auth.remove_token_refs(&ids))?;
        Ok(ids)
    }
}

// =============================================================================
// Clients and users
// =============================================================================

#[derive(Default)]
pub(crate) struct MockClientRegistry {
    clients: RwLock<HashMap<String, OidcClient>>,
}

impl MockClientRegistry {
    pub(crate) fn add_client(&self, client: OidcClient) {
        self.clients
            .write()
            .unwrap()
            .insert(client.client_id.clone(), client);
    }
}

#[async_trait]
impl ClientRegistry for MockClientRegistry {
    async fn get_client(&self, client_id: &str) -> AuthResult<Option<OidcClient>> {
        Ok(self.clients.read().unwrap().get(client_id).cloned())
    }

    async fn get_client_by_secret(&self, client_secret: &str) -> AuthResult<Option<OidcClient>> {
        Ok(self
            .clients
            .read()
            .unwrap()
            .values()
            .find(|c| c.verify_secret(client_secret))
            .cloned())
    }

    async fn get_client_by_api_key(&self, api_key: &str) -> AuthResult<Option<OidcClient>> {
        Ok(self
            .clients
            .read()
            .unwrap()
            .values()
            .find(|c| c.matches_api_key(api_key))
            .cloned())
    }
}

#[derive(Default)]
pub(crate) struct MockUserDirectory {
    users: RwLock<HashMap<String, UserInfo>>,
}

impl MockUserDirectory {
    pub(crate) fn add_user(&self, user: UserInfo) {
        self.users.write().unwrap().insert(user.id.clone(), user);
    }
}

#[async_trait]
impl UserDirectory for MockUserDirectory {
    async fn get_user(&self, user_id: &str) -> AuthResult<UserInfo> {
        self.users
            .read()
            .unwrap()
            .get(user_id)
            .cloned()
            .ok_or_else(|| AuthError::not_found("User not found"))
    }
}

pub(crate) fn test_client() -> OidcClient {
    OidcClient {
        client_id: CLIENT_ID.to_string(),
        client_name: "Test Client".to_string(),
        client_secret: CLIENT_SECRET.to_string(),
        redirect_uris: vec![REDIRECT_URI.to_string()],
        scopes: vec!["read".to_string(), "openid".to_string()],
        grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
        api_key: Some(CLIENT_API_KEY.to_string()),
    }
}

pub(crate) fn test_user() -> UserInfo {
    UserInfo {
        id: USER_ID.to_string(),
        display_name: "Parker".to_string(),
        site_access: vec!["console".to_string()],
        api_access: vec!["spider".to_string()],
    }
}

// =============================================================================
// Harness
// =============================================================================

/// An [`OAuthService`] wired to the mocks above, with one client and one user.
pub(crate) struct TestHarness {
    pub service: Arc<OAuthService>,
    pub authorizations: Arc<MockAuthorizationStorage>,
    pub tokens: Arc<MockTokenStorage>,
    pub clients: Arc<MockClientRegistry>,
    pub users: Arc<MockUserDirectory>,
    pub jwt: Arc<JwtService>,
}

impl TestHarness {
    pub(crate) fn new() -> Self {
        let tokens = Arc::new(MockTokenStorage::default());
        let authorizations = Arc::new(MockAuthorizationStorage::new(tokens.clone()));
        let clients = Arc::new(MockClientRegistry::default());
        let users = Arc::new(MockUserDirectory::default());
        clients.add_client(test_client());
        users.add_user(test_user());

        let jwt = Arc::new(JwtService::new(
            SigningKey::from_secret("test", SIGNING_SECRET),
            ISSUER,
        ));
        let issuer = Arc::new(JwtTokenIssuer::new(jwt.clone(), ISSUER));

        let service = Arc::new(OAuthService::new(
            authorizations.clone(),
            tokens.clone(),
            clients.clone(),
            users.clone(),
            issuer,
        ));

        Self {
            service,
            authorizations,
            tokens,
            clients,
            users,
            jwt,
        }
    }

    /// Registers client `c2` (secret `c2-secret`) with the same redirect URI.
    pub(crate) fn add_second_client(&self) {
        self.clients.add_client(OidcClient {
            client_id: "c2".to_string(),
            client_name: "Second Client".to_string(),
            client_secret: "c2-secret".to_string(),
            api_key: None,
            ..test_client()
        });
    }

    /// Approves the test client for the test user and returns the code.
    pub(crate) async fn approve(&self, scopes: &[&str], pkce: Option<(&str, &str)>) -> String {
        let request = ApproveRequest {
            client_id: Some(CLIENT_ID.to_string()),
            redirect_uri: Some(REDIRECT_URI.to_string()),
            scopes: Some(scopes.iter().map(|s| (*s).to_string()).collect()),
            code_challenge: pkce.map(|(challenge, _)| challenge.to_string()),
            code_challenge_method: pkce.map(|(_, method)| method.to_string()),
        };
        self.service
            .approve(&request, Some(USER_ID))
            .await
            .unwrap()
            .code
    }

    /// Approves and exchanges the code, returning a fresh token set.
    pub(crate) async fn login(&self, scopes: &[&str]) -> TokenResponse {
        let code = self.approve(scopes, None).await;
        let request = TokenRequest {
            grant_type: Some("authorization_code".to_string()),
            code: Some(code),
            redirect_uri: Some(REDIRECT_URI.to_string()),
            client_id: Some(CLIENT_ID.to_string()),
            client_secret: Some(CLIENT_SECRET.to_string()),
            ..TokenRequest::default()
        };
        self.service.exchange(&request, None).await.unwrap()
    }
}
