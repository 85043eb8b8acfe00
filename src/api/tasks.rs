//! Task Routes
//!
//! Routes:
//! - POST /api/tasks - Add a task (and its timeline entry) to a project

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use super::{required, JsonBody};
use crate::models::{parse_date, ProjectMember, ProjectTask};
use crate::services::NewTask;
use crate::{AppState, Result};

/// Build task routes. Mounted behind `require_auth`.
pub fn routes() -> Router<AppState> {
    Router::new().route("/tasks", post(create_task))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub project_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub deadline: Option<String>,
    #[serde(default)]
    pub assignees: Vec<ProjectMember>,
    pub priority: Option<i64>,
    pub timeline: Option<bool>,
}

/// Create a task.
///
/// POST /api/tasks
async fn create_task(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateTaskRequest>,
) -> Result<Json<ProjectTask>> {
    let project_id = required(request.project_id, "projectId")?;

    let input = NewTask {
        title: required(request.title, "title")?,
        description: required(request.description, "description")?,
        start_date: parse_date(request.start_date.as_deref())?,
        deadline: parse_date(request.deadline.as_deref())?,
        assignees: request.assignees,
        priority: request.priority.unwrap_or(0),
        timeline: request.timeline.unwrap_or(false),
    };

    let task = state.projects.add_task(&project_id, input).await?;

    Ok(Json(task))
}
