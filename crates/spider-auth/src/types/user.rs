//! Platform user profile.

use serde::{Deserialize, Serialize};

/// A platform user as seen by the token and authorizer paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub display_name: String,
    /// Sites of the platform the user may sign in to.
    #[serde(default)]
    pub site_access: Vec<String>,
    /// API domains the user may call.
    #[serde(default)]
    pub api_access: Vec<String>,
}
