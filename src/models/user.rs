//! User profile model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role given to every account on first sign-in.
pub const DEFAULT_USER_ROLE: &str = "researcher";

/// Role allowed to create projects.
pub const ADMIN_ROLE: &str = "admin";

/// A lab member's profile, stored in `users` under their email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Subject id from the identity provider.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub github: String,
    #[serde(default)]
    pub linkedin: String,
    #[serde(default)]
    pub specialities: String,
    #[serde(default)]
    pub bio: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

fn default_role() -> String {
    DEFAULT_USER_ROLE.to_string()
}

impl UserProfile {
    /// Profile for a first sign-in: default role and empty profile fields.
    pub fn new_member(
        id: String,
        email: String,
        username: Option<String>,
        avatar_url: Option<String>,
    ) -> Self {
        Self {
            id,
            username: username.unwrap_or_default(),
            email,
            avatar_url: avatar_url.unwrap_or_default(),
            role: default_role(),
            github: String::new(),
            linkedin: String::new(),
            specialities: String::new(),
            bio: String::new(),
            created_at: super::now(),
        }
    }
}
