//! Application state for Research Hub.
//!
//! Contains the shared state that is passed to all handlers.

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use crate::config::{self, Config};
use crate::db::{DbPool, DocumentStore};
use crate::services::{AuthService, ProjectService};
use crate::Result;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (sessions and OAuth states).
    pub db: DbPool,
    /// Document collections (users and projects).
    pub store: DocumentStore,
    /// Sign-in and session service.
    pub auth: AuthService,
    /// Project document service.
    pub projects: ProjectService,
    /// Signing key for the session cookie.
    pub cookie_key: Key,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

impl AppState {
    /// Create the application state from the global configuration.
    pub async fn new() -> Result<Self> {
        let config = config::config();

        let db = crate::db::init_pool(&config.database.path).await?;
        crate::db::initialize_schema(&db).await?;

        Self::build(db, config)
    }

    /// Wire services over an already initialized pool.
    pub fn build(db: DbPool, config: &Config) -> Result<Self> {
        let store = DocumentStore::new(db.clone());

        let auth = AuthService::new(
            db.clone(),
            store.clone(),
            config.auth.clone(),
            &config.server.public_url,
            config.session.max_age_seconds,
        )?;

        let projects = ProjectService::new(store.clone());

        let cookie_key = crate::middleware::cookie_key(&config.session.secret)?;

        Ok(Self {
            db,
            store,
            auth,
            projects,
            cookie_key,
        })
    }
}
