//! Project aggregate models.
//!
//! A project document embeds its members, resources, tasks and timeline as
//! arrays that only ever grow by appending.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Status given to projects created without one.
pub const DEFAULT_PROJECT_STATUS: &str = "active";

/// A research project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub title: String,
    pub description: String,
    pub status: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub members: Vec<ProjectMember>,
    #[serde(default)]
    pub resources: Vec<ProjectResource>,
    #[serde(default)]
    pub tasks: Vec<ProjectTask>,
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
    #[serde(default)]
    pub users: ProjectUsers,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
}

/// User document paths grouped by project permission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectUsers {
    #[serde(default)]
    pub admins: Vec<String>,
    #[serde(default)]
    pub members: Vec<String>,
}

/// Which `users` group a member path is added to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberGroup {
    Admin,
    Member,
}

impl MemberGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    /// Dotted document path of the array holding this group.
    pub fn field_path(&self) -> &'static str {
        match self {
            Self::Admin => "users.admins",
            Self::Member => "users.members",
        }
    }
}

/// Denormalized copy of a user's display fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectMember {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub specialities: String,
}

/// Kinds of project resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceCategory {
    Paper,
    Dataset,
    Code,
    Documentation,
    Link,
    Other,
}

impl ResourceCategory {
    /// Map a client-supplied label onto a category; anything unrecognized is `Other`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "paper" | "papers" | "publication" => Self::Paper,
            "dataset" | "datasets" | "data" => Self::Dataset,
            "code" | "repository" | "repo" => Self::Code,
            "documentation" | "docs" | "doc" => Self::Documentation,
            "link" | "url" | "website" => Self::Link,
            _ => Self::Other,
        }
    }
}

/// A reference attached to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResource {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    pub category: ResourceCategory,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Task progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

/// A unit of work inside a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTask {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_date: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assignees: Vec<ProjectMember>,
    #[serde(default)]
    pub priority: i64,
    /// Whether the task is also shown on the project timeline.
    #[serde(default)]
    pub timeline: bool,
    #[serde(default)]
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of a task's display fields shown on the project timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_date: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assignees: Vec<ProjectMember>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ProjectTask> for TimelineEntry {
    fn from(task: &ProjectTask) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            start_date: task.start_date,
            deadline: task.deadline,
            assignees: task.assignees.clone(),
            priority: task.priority,
            status: task.status,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// Parse a client date: RFC 3339 timestamps or plain `YYYY-MM-DD` (midnight UTC).
/// Empty strings mean "no date".
pub fn parse_date(value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    let Some(raw) = value.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| Some(ndt.and_utc()))
        .ok_or_else(|| Error::InvalidInput(format!("Invalid date: {}", raw)))
}
