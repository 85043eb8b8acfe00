//! Data models for Research Hub.
//!
//! Typed views of the JSON documents kept in the `users` and `projects`
//! collections. Field names follow the stored documents exactly.

mod project;
mod user;

pub use project::*;
pub use user::*;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::Result;

/// Generate a new UUID
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Serialize a record into a document body.
pub fn to_document<T: Serialize>(record: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(crate::Error::Internal(format!(
            "Expected a JSON object, got {}",
            other
        ))),
    }
}
