//! Member Routes
//!
//! Routes:
//! - GET /api/members - List every user document
//! - GET /api/members/:id - Get a single user

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::Value;

use crate::db::{collections, Document};
use crate::{AppState, Error, Result};

/// Build member routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/members", get(list_members))
        .route("/members/:id", get(get_member))
}

/// List all users.
///
/// GET /api/members
async fn list_members(State(state): State<AppState>) -> Result<Json<Vec<Value>>> {
    let users = state.store.list(collections::USERS).await?;
    Ok(Json(users.into_iter().map(Document::into_json).collect()))
}

/// Get a user by document key.
///
/// GET /api/members/:id
///
/// Users are keyed by email, but links elsewhere carry the provider subject
/// id, so a miss on the key falls back to the stored `id` field.
async fn get_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    if let Some(doc) = state.store.get(collections::USERS, &id).await? {
        return Ok(Json(doc.into_json()));
    }

    state
        .store
        .find_by_field(collections::USERS, "id", &id)
        .await?
        .map(|doc| Json(doc.into_json()))
        .ok_or_else(|| Error::NotFound("User".into()))
}
