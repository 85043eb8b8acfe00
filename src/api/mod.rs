//! API routes for Research Hub.
//!
//! This module combines all routes into a single router. Reads under `/api`
//! are public; every write goes through `require_auth`.

mod auth;
mod members;
mod profile;
mod projects;
mod resources;
mod status;
mod tasks;

use axum::extract::FromRequest;
use axum::{middleware, Router};

use crate::middleware::require_auth;
use crate::{AppState, Error, Result};

/// Build the complete router.
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health checks
        .merge(status::routes())
        // Sign-in flow and session cookie
        .nest("/auth", auth::routes(state.clone()))
        .nest("/api", api_routes(state))
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(members::routes())
        .merge(profile::routes())
        .merge(projects::routes())
        .merge(protected_routes(state))
}

/// Routes that require a signed-in user.
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(projects::protected_routes())
        .merge(tasks::routes())
        .merge(resources::routes())
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

/// JSON request body whose rejections render as the crate's error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub(crate) struct JsonBody<T>(pub T);

/// Presence check for a required request field: absent or blank is a 400.
pub(crate) fn required(value: Option<String>, field: &'static str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(Error::MissingField(field))
}
