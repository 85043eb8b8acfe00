//! Resource Routes
//!
//! Routes:
//! - POST /api/resources - Attach a resource to a project

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use super::{required, JsonBody};
use crate::models::ProjectResource;
use crate::services::NewResource;
use crate::{AppState, Result};

/// Build resource routes. Mounted behind `require_auth`.
pub fn routes() -> Router<AppState> {
    Router::new().route("/resources", post(create_resource))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResourceRequest {
    pub project_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
}

/// POST /api/resources
async fn create_resource(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateResourceRequest>,
) -> Result<Json<ProjectResource>> {
    let project_id = required(request.project_id, "projectId")?;

    let input = NewResource {
        title: request.title,
        description: request.description,
        url: request.url,
        category: request.category,
    };

    let resource = state.projects.add_resource(&project_id, input).await?;

    Ok(Json(resource))
}
