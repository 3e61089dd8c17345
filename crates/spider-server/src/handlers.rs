use std::sync::Arc;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::json;

use spider_auth::AuthResult;
use spider_auth::authorizer::AuthorizerContext;
use spider_auth::error::AuthError;
use spider_auth::storage::UserDirectory;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "Iron Spider Identity",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfoResponse {
    pub user_id: String,
    pub display_name: String,
    pub site_access: Vec<String>,
    pub api_access: Vec<String>,
}

/// Profile of the signed-in user.
///
/// Cookie users unknown to the directory get the profile carried by the
/// authorizer context.
pub async fn user_info(
    State(users): State<Arc<dyn UserDirectory>>,
    Extension(context): Extension<AuthorizerContext>,
) -> AuthResult<Json<UserInfoResponse>> {
    let user_id = context
        .user_id
        .clone()
        .ok_or_else(|| AuthError::not_found("No user for this caller"))?;

    match users.get_user(&user_id).await {
        Ok(user) => Ok(Json(UserInfoResponse {
            user_id: user.id,
            display_name: user.display_name,
            site_access: user.site_access,
            api_access: user.api_access,
        })),
        Err(AuthError::NotFound { .. }) => Ok(Json(UserInfoResponse {
            display_name: context.display_name.unwrap_or_default(),
            user_id,
            site_access: Vec::new(),
            api_access: Vec::new(),
        })),
        Err(e) => Err(e),
    }
}
