//! Project service.
//!
//! Creates projects and appends tasks, resources and members to them.
//! Every mutation is a single `DocumentStore::update`, so the arrays it
//! touches change together or not at all.

use serde_json::Value;
use tracing::info;

use crate::db::{collections, Document, DocumentStore, FieldUpdate};
use crate::models::{
    new_id, now, to_document, MemberGroup, Project, ProjectMember, ProjectResource,
    ProjectTask, ProjectUsers, ResourceCategory, TaskStatus, TimelineEntry,
    DEFAULT_PROJECT_STATUS,
};
use crate::{Error, Result};
use chrono::{DateTime, Utc};

/// Input for creating a project.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub title: String,
    pub description: String,
    pub status: Option<String>,
    pub image_url: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Input for adding a task to a project.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub start_date: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub assignees: Vec<ProjectMember>,
    pub priority: i64,
    pub timeline: bool,
}

/// Input for adding a resource to a project.
#[derive(Debug, Clone, Default)]
pub struct NewResource {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
}

/// Service for project documents.
#[derive(Clone)]
pub struct ProjectService {
    store: DocumentStore,
}

impl ProjectService {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// All projects as `{id, ...fields}`.
    pub async fn list(&self) -> Result<Vec<Value>> {
        let docs = self.store.list(collections::PROJECTS).await?;
        Ok(docs.into_iter().map(Document::into_json).collect())
    }

    /// A single project as `{id, ...fields}`.
    pub async fn get(&self, id: &str) -> Result<Value> {
        self.store
            .get(collections::PROJECTS, id)
            .await?
            .map(Document::into_json)
            .ok_or_else(|| Error::NotFound("Project".into()))
    }

    /// Create a project owned by `created_by` (the creator's email).
    pub async fn create(&self, input: NewProject, created_by: &str) -> Result<Value> {
        let timestamp = now();
        let project = Project {
            title: input.title,
            description: input.description,
            status: input
                .status
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PROJECT_STATUS.to_string()),
            image_url: input.image_url.unwrap_or_default(),
            members: Vec::new(),
            resources: Vec::new(),
            tasks: Vec::new(),
            timeline: Vec::new(),
            users: ProjectUsers::default(),
            start_date: input.start_date,
            end_date: input.end_date,
            created_at: timestamp,
            updated_at: timestamp,
            created_by: created_by.to_string(),
        };

        let id = new_id();
        let doc = self
            .store
            .create(collections::PROJECTS, &id, to_document(&project)?)
            .await?;

        info!(project_id = %id, created_by, "Project created");

        Ok(doc.into_json())
    }

    /// Append a task; timeline tasks also get their timeline entry in the same write.
    pub async fn add_task(&self, project_id: &str, input: NewTask) -> Result<ProjectTask> {
        let timestamp = now();
        let task = ProjectTask {
            id: new_id(),
            title: input.title,
            description: input.description,
            start_date: input.start_date,
            deadline: input.deadline,
            assignees: input.assignees,
            priority: input.priority,
            timeline: input.timeline,
            status: TaskStatus::Todo,
            created_at: timestamp,
            updated_at: timestamp,
        };

        let mut updates = vec![FieldUpdate::array_union(
            "tasks",
            vec![serde_json::to_value(&task)?],
        )];
        if task.timeline {
            updates.push(FieldUpdate::array_union(
                "timeline",
                vec![serde_json::to_value(TimelineEntry::from(&task))?],
            ));
        }
        updates.push(FieldUpdate::set("updatedAt", serde_json::to_value(timestamp)?));

        self.update_project(project_id, &updates).await?;

        info!(project_id, task_id = %task.id, timeline = task.timeline, "Task added");

        Ok(task)
    }

    /// Append a resource.
    pub async fn add_resource(
        &self,
        project_id: &str,
        input: NewResource,
    ) -> Result<ProjectResource> {
        let timestamp = now();
        let resource = ProjectResource {
            id: new_id(),
            title: input.title.unwrap_or_default(),
            description: input.description.unwrap_or_default(),
            url: input.url.unwrap_or_default(),
            category: input
                .category
                .as_deref()
                .map(ResourceCategory::parse)
                .unwrap_or(ResourceCategory::Other),
            created_at: timestamp,
            updated_at: timestamp,
        };

        self.update_project(
            project_id,
            &[
                FieldUpdate::array_union("resources", vec![serde_json::to_value(&resource)?]),
                FieldUpdate::set("updatedAt", serde_json::to_value(timestamp)?),
            ],
        )
        .await?;

        info!(project_id, resource_id = %resource.id, category = ?resource.category, "Resource added");

        Ok(resource)
    }

    /// Add any number of members in one atomic write. Members already
    /// present are left as they are. Returns the resulting member list.
    pub async fn add_members(
        &self,
        project_id: &str,
        members: &[ProjectMember],
    ) -> Result<Vec<ProjectMember>> {
        let values = members
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let doc = self
            .update_project(
                project_id,
                &[
                    FieldUpdate::array_union("members", values),
                    FieldUpdate::set("updatedAt", serde_json::to_value(now())?),
                ],
            )
            .await?;

        info!(project_id, added = members.len(), "Members added");

        match doc.field("members") {
            Some(list) => Ok(serde_json::from_value(list.clone())?),
            None => Ok(Vec::new()),
        }
    }

    /// Add a user document path to the project's admin or member group.
    pub async fn add_user_path(
        &self,
        project_id: &str,
        user_path: &str,
        group: MemberGroup,
    ) -> Result<()> {
        self.update_project(
            project_id,
            &[FieldUpdate::array_union(
                group.field_path(),
                vec![Value::String(user_path.to_string())],
            )],
        )
        .await?;

        info!(project_id, user_path, group = group.as_str(), "User added to project group");

        Ok(())
    }

    async fn update_project(&self, project_id: &str, updates: &[FieldUpdate]) -> Result<Document> {
        self.store
            .update(collections::PROJECTS, project_id, updates)
            .await
            .map_err(|e| match e {
                Error::NotFound(_) => Error::NotFound("Project".into()),
                other => other,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_pool, initialize_schema};

    async fn service() -> ProjectService {
        let pool = init_pool(":memory:").await.unwrap();
        initialize_schema(&pool).await.unwrap();
        ProjectService::new(DocumentStore::new(pool))
    }

    fn new_project() -> NewProject {
        NewProject {
            title: "Soil microbiome".into(),
            description: "Sampling across seasons".into(),
            status: None,
            image_url: None,
            start_date: None,
            end_date: None,
        }
    }

    fn new_task(timeline: bool) -> NewTask {
        NewTask {
            title: "Write report".into(),
            description: "draft v1".into(),
            start_date: None,
            deadline: None,
            assignees: Vec::new(),
            priority: 0,
            timeline,
        }
    }

    fn member(id: &str) -> ProjectMember {
        ProjectMember {
            id: id.into(),
            name: format!("Member {}", id),
            email: format!("{}@lab.org", id),
            role: "researcher".into(),
            ..Default::default()
        }
    }

    async fn created_id(service: &ProjectService) -> String {
        let project = service.create(new_project(), "pi@lab.org").await.unwrap();
        project["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_create_sets_defaults() {
        let service = service().await;
        let project = service.create(new_project(), "pi@lab.org").await.unwrap();

        assert_eq!(project["status"], "active");
        assert_eq!(project["createdBy"], "pi@lab.org");
        for field in ["members", "resources", "tasks", "timeline"] {
            assert_eq!(project[field], serde_json::json!([]), "{}", field);
        }

        let fetched = service.get(project["id"].as_str().unwrap()).await.unwrap();
        assert_eq!(fetched, project);
    }

    #[tokio::test]
    async fn test_get_missing_project() {
        let service = service().await;
        let err = service.get("nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(ref what) if what == "Project"));
    }

    #[tokio::test]
    async fn test_timeline_task_written_to_both_arrays() {
        let service = service().await;
        let id = created_id(&service).await;

        let task = service.add_task(&id, new_task(true)).await.unwrap();
        assert_eq!(task.status, TaskStatus::Todo);

        let project = service.get(&id).await.unwrap();
        assert_eq!(project["tasks"].as_array().unwrap().len(), 1);
        assert_eq!(project["timeline"].as_array().unwrap().len(), 1);
        assert_eq!(project["tasks"][0]["id"], task.id.as_str());
        assert_eq!(project["timeline"][0]["id"], task.id.as_str());
    }

    #[tokio::test]
    async fn test_plain_task_skips_timeline() {
        let service = service().await;
        let id = created_id(&service).await;

        service.add_task(&id, new_task(false)).await.unwrap();

        let project = service.get(&id).await.unwrap();
        assert_eq!(project["tasks"].as_array().unwrap().len(), 1);
        assert!(project["timeline"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_task_to_missing_project() {
        let service = service().await;
        let err = service.add_task("nope", new_task(true)).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_resource_category_defaults_to_other() {
        let service = service().await;
        let id = created_id(&service).await;

        let resource = service
            .add_resource(&id, NewResource::default())
            .await
            .unwrap();
        assert_eq!(resource.category, ResourceCategory::Other);

        let project = service.get(&id).await.unwrap();
        assert_eq!(project["resources"][0]["category"], "other");
    }

    #[tokio::test]
    async fn test_add_members_batch_deduplicates() {
        let service = service().await;
        let id = created_id(&service).await;

        service.add_members(&id, &[member("a")]).await.unwrap();
        let members = service
            .add_members(&id, &[member("a"), member("b"), member("c")])
            .await
            .unwrap();

        let ids: Vec<&str> = members.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_add_members_to_missing_project_writes_nothing() {
        let service = service().await;
        let err = service
            .add_members("nope", &[member("a"), member("b")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_user_path_groups() {
        let service = service().await;
        let id = created_id(&service).await;

        service
            .add_user_path(&id, "/users/ada@lab.org", MemberGroup::Admin)
            .await
            .unwrap();
        service
            .add_user_path(&id, "/users/ada@lab.org", MemberGroup::Admin)
            .await
            .unwrap();
        service
            .add_user_path(&id, "/users/bob@lab.org", MemberGroup::Member)
            .await
            .unwrap();

        let project = service.get(&id).await.unwrap();
        assert_eq!(project["users"]["admins"], serde_json::json!(["/users/ada@lab.org"]));
        assert_eq!(project["users"]["members"], serde_json::json!(["/users/bob@lab.org"]));
    }
}
