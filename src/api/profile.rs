//! Profile Routes
//!
//! Routes:
//! - GET /api/profile/:email - Stored user document for an email

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::Value;

use crate::db::collections;
use crate::{AppState, Error, Result};

/// Build profile routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/profile/:email", get(get_profile))
}

/// GET /api/profile/:email
///
/// Returns the stored fields only; the key is not injected.
async fn get_profile(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Value>> {
    let email = email.trim();
    if email.is_empty() {
        return Err(Error::MissingField("email"));
    }

    state
        .store
        .get(collections::USERS, email)
        .await?
        .map(|doc| Json(doc.into_data()))
        .ok_or_else(|| Error::NotFound("User".into()))
}
