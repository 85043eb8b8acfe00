//! JSON document store.
//!
//! Users and projects are schema-less JSON objects grouped into named
//! collections, keyed by a string id. Writes are whole-document creates or
//! field-level updates (`Set` and `ArrayUnion`), and every `update` call is
//! applied atomically.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sqlx::FromRow;
use tracing::debug;

use super::DbPool;
use crate::{Error, Result};

/// Collection names.
pub mod collections {
    pub const USERS: &str = "users";
    pub const PROJECTS: &str = "projects";
}

/// A stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Document key within its collection.
    pub id: String,
    pub data: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Render as `{id, ...data}`. Fields in `data` win over the key,
    /// so a stored `id` field is what callers see.
    pub fn into_json(self) -> Value {
        let mut out = Map::with_capacity(self.data.len() + 1);
        out.insert("id".to_string(), Value::String(self.id));
        out.extend(self.data);
        Value::Object(out)
    }

    /// The stored fields without the key.
    pub fn into_data(self) -> Value {
        Value::Object(self.data)
    }

    /// Look up a field by dotted path.
    pub fn field(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.data.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Decode the stored fields into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.data.clone()))?)
    }
}

/// A single field operation applied by [`DocumentStore::update`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// Replace the value at `path`.
    Set { path: String, value: Value },
    /// Append each value to the array at `path` unless an equal value is
    /// already present.
    ArrayUnion { path: String, values: Vec<Value> },
}

impl FieldUpdate {
    pub fn set(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Set {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn array_union(path: impl Into<String>, values: Vec<Value>) -> Self {
        Self::ArrayUnion {
            path: path.into(),
            values,
        }
    }
}

/// Apply field operations to a document body in order.
///
/// Dotted paths address nested objects; missing or non-object intermediates
/// are replaced by empty objects. `ArrayUnion` on a missing or non-array field
/// starts a new array.
pub fn apply_updates(data: &mut Map<String, Value>, updates: &[FieldUpdate]) {
    for update in updates {
        match update {
            FieldUpdate::Set { path, value } => {
                *slot_mut(data, path) = value.clone();
            }
            FieldUpdate::ArrayUnion { path, values } => {
                let slot = slot_mut(data, path);
                if !slot.is_array() {
                    *slot = Value::Array(Vec::new());
                }
                if let Value::Array(items) = slot {
                    for value in values {
                        if !items.contains(value) {
                            items.push(value.clone());
                        }
                    }
                }
            }
        }
    }
}

fn slot_mut<'a>(data: &'a mut Map<String, Value>, path: &str) -> &'a mut Value {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = segments.pop().unwrap_or(path);

    let mut current = data;
    for segment in segments {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(map) => map,
            _ => unreachable!("entry was just made an object"),
        };
    }

    current.entry(last.to_string()).or_insert(Value::Null)
}

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: String,
    data: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DocumentRow> for Document {
    type Error = Error;

    fn try_from(row: DocumentRow) -> Result<Self> {
        let data = match serde_json::from_str(&row.data)? {
            Value::Object(map) => map,
            other => {
                return Err(Error::Internal(format!(
                    "Document {} is not a JSON object: {}",
                    row.id, other
                )))
            }
        };
        Ok(Document {
            id: row.id,
            data,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Shared handle to the document collections.
#[derive(Clone)]
pub struct DocumentStore {
    pool: DbPool,
}

impl DocumentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Fetch a document by key.
    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let row: Option<DocumentRow> = sqlx::query_as(
            r#"
            SELECT id, data, created_at, updated_at
            FROM documents
            WHERE collection = ? AND id = ?
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Document::try_from).transpose()
    }

    /// Fetch the first document whose top-level `field` equals `value`.
    pub async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<Document>> {
        let row: Option<DocumentRow> = sqlx::query_as(
            r#"
            SELECT id, data, created_at, updated_at
            FROM documents
            WHERE collection = ? AND json_extract(data, ?) = ?
            ORDER BY rowid
            LIMIT 1
            "#,
        )
        .bind(collection)
        .bind(format!("$.{}", field))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Document::try_from).transpose()
    }

    /// Every document in a collection, in insertion order.
    pub async fn list(&self, collection: &str) -> Result<Vec<Document>> {
        let rows: Vec<DocumentRow> = sqlx::query_as(
            r#"
            SELECT id, data, created_at, updated_at
            FROM documents
            WHERE collection = ?
            ORDER BY rowid
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Document::try_from).collect()
    }

    /// Create a document. Fails with `AlreadyExists` if the key is taken.
    pub async fn create(
        &self,
        collection: &str,
        id: &str,
        data: Map<String, Value>,
    ) -> Result<Document> {
        let now = Utc::now();
        let body = Value::Object(data.clone()).to_string();

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(&body)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                Error::AlreadyExists(format!("{}/{}", collection, id))
            }
            _ => Error::Database(e),
        })?;

        debug!(collection, id, "Document created");

        Ok(Document {
            id: id.to_string(),
            data,
            created_at: now,
            updated_at: now,
        })
    }

    /// Create a document unless the key is already taken.
    ///
    /// Returns `true` when this call created it.
    pub async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        data: Map<String, Value>,
    ) -> Result<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (collection, id) DO NOTHING
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Value::Object(data).to_string())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Apply field operations to an existing document in one transaction.
    ///
    /// Fails with `NotFound` if the document does not exist. Returns the
    /// document as written.
    pub async fn update(
        &self,
        collection: &str,
        id: &str,
        updates: &[FieldUpdate],
    ) -> Result<Document> {
        let mut tx = self.pool.begin().await?;

        // Take the write lock before reading so concurrent updates of the
        // same document run one after another.
        let locked = sqlx::query(
            "UPDATE documents SET updated_at = updated_at WHERE collection = ? AND id = ?",
        )
        .bind(collection)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if locked.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Document {}/{}", collection, id)));
        }

        let row: DocumentRow = sqlx::query_as(
            r#"
            SELECT id, data, created_at, updated_at
            FROM documents
            WHERE collection = ? AND id = ?
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let mut document = Document::try_from(row)?;
        apply_updates(&mut document.data, updates);
        document.updated_at = Utc::now();

        sqlx::query(
            "UPDATE documents SET data = ?, updated_at = ? WHERE collection = ? AND id = ?",
        )
        .bind(Value::Object(document.data.clone()).to_string())
        .bind(document.updated_at)
        .bind(collection)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(collection, id, operations = updates.len(), "Document updated");

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_pool, initialize_schema};
    use serde_json::json;

    async fn store() -> DocumentStore {
        let pool = init_pool(":memory:").await.unwrap();
        initialize_schema(&pool).await.unwrap();
        DocumentStore::new(pool)
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_array_union_skips_existing_values() {
        let mut data = object(json!({ "members": [{ "id": "a" }] }));
        apply_updates(
            &mut data,
            &[FieldUpdate::array_union(
                "members",
                vec![json!({ "id": "a" }), json!({ "id": "b" }), json!({ "id": "b" })],
            )],
        );
        assert_eq!(data["members"], json!([{ "id": "a" }, { "id": "b" }]));
    }

    #[test]
    fn test_array_union_creates_nested_array() {
        let mut data = object(json!({ "title": "T" }));
        apply_updates(
            &mut data,
            &[FieldUpdate::array_union("users.admins", vec![json!("/users/a")])],
        );
        assert_eq!(data["users"], json!({ "admins": ["/users/a"] }));
    }

    #[test]
    fn test_array_union_replaces_non_array() {
        let mut data = object(json!({ "tasks": "oops" }));
        apply_updates(&mut data, &[FieldUpdate::array_union("tasks", vec![json!(1)])]);
        assert_eq!(data["tasks"], json!([1]));
    }

    #[test]
    fn test_set_overwrites_in_order() {
        let mut data = object(json!({ "status": "active" }));
        apply_updates(
            &mut data,
            &[
                FieldUpdate::set("status", "paused"),
                FieldUpdate::set("status", "done"),
                FieldUpdate::set("meta.owner", "lab"),
            ],
        );
        assert_eq!(data["status"], "done");
        assert_eq!(data["meta"]["owner"], "lab");
    }

    #[test]
    fn test_into_json_prefers_stored_id() {
        let doc = Document {
            id: "ada@lab.org".into(),
            data: object(json!({ "id": "google-123", "email": "ada@lab.org" })),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(doc.field("email"), Some(&json!("ada@lab.org")));
        assert_eq!(doc.into_json()["id"], "google-123");
    }

    #[tokio::test]
    async fn test_create_get_and_list_in_insertion_order() {
        let store = store().await;
        store
            .create("projects", "p2", object(json!({ "title": "second" })))
            .await
            .unwrap();
        store
            .create("projects", "p1", object(json!({ "title": "first" })))
            .await
            .unwrap();

        let doc = store.get("projects", "p1").await.unwrap().unwrap();
        assert_eq!(doc.data["title"], "first");
        assert!(store.get("projects", "missing").await.unwrap().is_none());
        assert!(store.get("users", "p1").await.unwrap().is_none());

        let ids: Vec<String> = store
            .list("projects")
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["p2", "p1"]);
        assert!(store.list("users").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_duplicate_key_fails() {
        let store = store().await;
        store.create("users", "a@lab.org", Map::new()).await.unwrap();
        let err = store.create("users", "a@lab.org", Map::new()).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_create_if_absent_keeps_existing() {
        let store = store().await;
        let first = object(json!({ "role": "admin" }));
        let second = object(json!({ "role": "researcher" }));

        assert!(store.create_if_absent("users", "a@lab.org", first).await.unwrap());
        assert!(!store.create_if_absent("users", "a@lab.org", second).await.unwrap());

        let doc = store.get("users", "a@lab.org").await.unwrap().unwrap();
        assert_eq!(doc.data["role"], "admin");
    }

    #[tokio::test]
    async fn test_find_by_field() {
        let store = store().await;
        store
            .create("users", "a@lab.org", object(json!({ "id": "sub-1" })))
            .await
            .unwrap();

        let found = store.find_by_field("users", "id", "sub-1").await.unwrap();
        assert_eq!(found.unwrap().id, "a@lab.org");
        assert!(store.find_by_field("users", "id", "sub-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let store = store().await;
        let err = store
            .update("projects", "nope", &[FieldUpdate::set("title", "x")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_applies_all_operations() {
        let store = store().await;
        store
            .create("projects", "p1", object(json!({ "tasks": [], "timeline": [] })))
            .await
            .unwrap();

        let updated = store
            .update(
                "projects",
                "p1",
                &[
                    FieldUpdate::array_union("tasks", vec![json!({ "id": "t1" })]),
                    FieldUpdate::array_union("timeline", vec![json!({ "id": "t1" })]),
                    FieldUpdate::set("updatedAt", "2026-01-01T00:00:00Z"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(updated.data["tasks"], json!([{ "id": "t1" }]));

        let stored = store.get("projects", "p1").await.unwrap().unwrap();
        assert_eq!(stored.data["timeline"], json!([{ "id": "t1" }]));
        assert_eq!(stored.data["updatedAt"], "2026-01-01T00:00:00Z");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("documents.db");
        let pool = init_pool(path.to_str().unwrap()).await.unwrap();
        initialize_schema(&pool).await.unwrap();
        assert!(pool.options().get_max_connections() > 1);
        let store = DocumentStore::new(pool);
        store
            .create("projects", "p1", object(json!({ "resources": [] })))
            .await
            .unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .update(
                            "projects",
                            "p1",
                            &[FieldUpdate::array_union("resources", vec![json!(i)])],
                        )
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let doc = store.get("projects", "p1").await.unwrap().unwrap();
        assert_eq!(doc.data["resources"].as_array().unwrap().len(), 16);
    }
}
