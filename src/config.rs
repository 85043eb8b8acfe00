//! Configuration management for Research Hub.
//!
//! Loads configuration from environment variables (and `.env`) with support for:
//! - A Google sign-in provider via GOOGLE_CLIENT_ID / GOOGLE_CLIENT_SECRET
//! - Additional OAuth providers via the AUTH_PROVIDER_{NAME}_{FIELD} pattern
//! - Session lifetime and database location

use std::collections::{HashMap, HashSet};
use std::env;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Default session lifetime (7 days).
pub const DEFAULT_SESSION_MAX_AGE_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Upper bound on the session lifetime (1 year).
pub const MAX_SESSION_MAX_AGE_SECONDS: u64 = 365 * 24 * 60 * 60;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Initialize configuration (call once at startup)
pub fn init() -> &'static Config {
    config()
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub public_url: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub providers: HashMap<String, AuthProvider>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthProvider {
    pub id: String,
    pub display_name: String,
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scopes: Vec<String>,
    pub enabled: bool,
}

impl AuthProvider {
    /// Google endpoints, matching the provider the lab signs in with.
    pub fn google(client_id: String, client_secret: String) -> Self {
        Self {
            id: "google".to_string(),
            display_name: "Google".to_string(),
            client_id,
            client_secret,
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
            scopes: vec!["openid".into(), "profile".into(), "email".into()],
            enabled: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub max_age_seconds: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            server: ServerConfig {
                host: env_or("HOST", "0.0.0.0"),
                port: env_or("PORT", "3000").parse().unwrap_or(3000),
                public_url: env_or("PUBLIC_URL", "http://localhost:3000"),
            },
            database: DatabaseConfig {
                path: env_or("DATABASE_PATH", "./data/research-hub.db"),
            },
            auth: AuthConfig {
                providers: Self::parse_auth_providers(),
            },
            session: SessionConfig {
                secret: env::var("SESSION_SECRET").unwrap_or_else(|_| nanoid::nanoid!(32)),
                max_age_seconds: parse_session_max_age(env::var("SESSION_MAX_AGE").ok().as_deref()),
            },
        }
    }

    /// Parse auth providers from environment variables.
    ///
    /// `GOOGLE_CLIENT_ID` + `GOOGLE_CLIENT_SECRET` register the `google` provider.
    /// Any other provider follows AUTH_PROVIDER_{NAME}_{FIELD}:
    ///   AUTH_PROVIDER_ORCID_CLIENT_ID=xxx
    ///   AUTH_PROVIDER_ORCID_CLIENT_SECRET=xxx
    ///   AUTH_PROVIDER_ORCID_AUTH_URL=https://orcid.org/oauth/authorize
    ///   AUTH_PROVIDER_ORCID_TOKEN_URL=https://orcid.org/oauth/token
    ///   AUTH_PROVIDER_ORCID_USERINFO_URL=https://orcid.org/oauth/userinfo
    fn parse_auth_providers() -> HashMap<String, AuthProvider> {
        let mut providers = HashMap::new();

        if let (Ok(client_id), Ok(client_secret)) = (
            env::var("GOOGLE_CLIENT_ID"),
            env::var("GOOGLE_CLIENT_SECRET"),
        ) {
            providers.insert(
                "google".to_string(),
                AuthProvider::google(client_id, client_secret),
            );
        }

        let mut provider_names: HashSet<String> = HashSet::new();
        for (key, _) in env::vars() {
            if let Some(rest) = key.strip_prefix("AUTH_PROVIDER_") {
                if let Some(idx) = rest.find('_') {
                    provider_names.insert(rest[..idx].to_lowercase());
                }
            }
        }

        for name in provider_names {
            let prefix = format!("AUTH_PROVIDER_{}_", name.to_uppercase());
            let field = |f: &str| env::var(format!("{}{}", prefix, f)).ok();

            let (Some(client_id), Some(client_secret)) =
                (field("CLIENT_ID"), field("CLIENT_SECRET"))
            else {
                continue;
            };
            let (Some(auth_url), Some(token_url), Some(userinfo_url)) =
                (field("AUTH_URL"), field("TOKEN_URL"), field("USERINFO_URL"))
            else {
                tracing::warn!(provider = %name, "Skipping auth provider without endpoint URLs");
                continue;
            };

            let scopes = field("SCOPES")
                .unwrap_or_else(|| "openid profile email".to_string())
                .split_whitespace()
                .map(String::from)
                .collect();

            providers.insert(
                name.clone(),
                AuthProvider {
                    id: name.clone(),
                    display_name: field("DISPLAY_NAME").unwrap_or_else(|| name.clone()),
                    client_id,
                    client_secret,
                    auth_url,
                    token_url,
                    userinfo_url,
                    scopes,
                    enabled: field("ENABLED")
                        .map(|v| v.to_lowercase() != "false")
                        .unwrap_or(true),
                },
            );
        }

        providers
    }
}

/// Session lifetime in seconds, clamped to `MAX_SESSION_MAX_AGE_SECONDS`.
/// Missing or unparsable values fall back to the default.
pub fn parse_session_max_age(value: Option<&str>) -> u64 {
    let Some(raw) = value else {
        return DEFAULT_SESSION_MAX_AGE_SECONDS;
    };

    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => {
            tracing::warn!(value = raw, "Invalid SESSION_MAX_AGE, using default");
            DEFAULT_SESSION_MAX_AGE_SECONDS
        }
        Ok(secs) if secs > MAX_SESSION_MAX_AGE_SECONDS => {
            tracing::warn!(value = secs, "SESSION_MAX_AGE too large, clamping to one year");
            MAX_SESSION_MAX_AGE_SECONDS
        }
        Ok(secs) => secs,
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
