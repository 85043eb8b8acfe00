//! Project Routes
//!
//! Routes:
//! - GET /api/projects - List projects
//! - GET /api/projects/:id - Get project details
//! - POST /api/projects - Create project (admin only)
//! - POST /api/projects/add_member - Add one member record to a project
//! - POST /api/projects/:id/addMember - Add a user path to the admin or member group
//! - POST /api/projects/:id/members - Add several member records in one write

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{required, JsonBody};
use crate::middleware::AuthUser;
use crate::models::{parse_date, MemberGroup, ProjectMember};
use crate::services::NewProject;
use crate::{AppState, Error, Result};

// ============================================================================
// Routes
// ============================================================================

/// Read-only project routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects))
        .route("/projects/:id", get(get_project))
}

/// Mutating project routes. Mounted behind `require_auth`.
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/projects", post(create_project))
        .route("/projects/add_member", post(add_member))
        .route("/projects/:id/addMember", post(add_user_to_group))
        .route("/projects/:id/members", post(add_members))
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub project_id: Option<String>,
    pub member: Option<ProjectMember>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddUserRequest {
    pub user_path: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMembersRequest {
    #[serde(default)]
    pub members: Vec<ProjectMember>,
}

// ============================================================================
// Handlers
// ============================================================================

/// List all projects.
///
/// GET /api/projects
async fn list_projects(State(state): State<AppState>) -> Result<Json<Vec<Value>>> {
    Ok(Json(state.projects.list().await?))
}

/// Get project details.
///
/// GET /api/projects/:id
async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    Ok(Json(state.projects.get(&id).await?))
}

/// Create a new project.
///
/// POST /api/projects
///
/// Only admins may create projects.
async fn create_project(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(request): JsonBody<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    if !user.is_admin() {
        return Err(Error::Forbidden);
    }

    let input = NewProject {
        title: required(request.title, "title")?,
        description: required(request.description, "description")?,
        status: request.status,
        image_url: request.image_url,
        start_date: parse_date(request.start_date.as_deref())?,
        end_date: parse_date(request.end_date.as_deref())?,
    };

    let project = state.projects.create(input, &user.email).await?;

    Ok((StatusCode::CREATED, Json(project)))
}

/// Add a member record to a project.
///
/// POST /api/projects/add_member
async fn add_member(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<AddMemberRequest>,
) -> Result<Json<Value>> {
    let project_id = required(request.project_id, "projectId")?;
    let member = request.member.ok_or(Error::MissingField("member"))?;

    state
        .projects
        .add_members(&project_id, std::slice::from_ref(&member))
        .await?;

    Ok(Json(json!({ "message": "Member added successfully" })))
}

/// Add a user document path to a project's admins or members.
///
/// POST /api/projects/:id/addMember
async fn add_user_to_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<AddUserRequest>,
) -> Result<Json<Value>> {
    let user_path = required(request.user_path, "userPath")?;
    let group = match required(request.role, "role")?.as_str() {
        "admin" => MemberGroup::Admin,
        "member" => MemberGroup::Member,
        other => {
            return Err(Error::InvalidInput(format!(
                "role must be \"admin\" or \"member\", got \"{}\"",
                other
            )))
        }
    };

    state.projects.add_user_path(&id, &user_path, group).await?;

    Ok(Json(json!({ "message": format!("User added as {}", group.as_str()) })))
}

/// Add several member records in a single atomic write.
///
/// POST /api/projects/:id/members
async fn add_members(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<AddMembersRequest>,
) -> Result<Json<Value>> {
    if request.members.is_empty() {
        return Err(Error::MissingField("members"));
    }

    let members = state.projects.add_members(&id, &request.members).await?;

    Ok(Json(json!({ "members": members })))
}
