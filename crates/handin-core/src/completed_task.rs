use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A submitted unit of work, as stored by the submission subsystem.
///
/// Fields this crate does not interpret are kept in `details` and
/// serialized inline next to the known ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTask {
    pub id: String,
    pub user_id: String,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<TaskFile>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl CompletedTask {
    /// The attached file, if it points at downloadable content.
    pub fn downloadable_file(&self) -> Option<&TaskFile> {
        self.file.as_ref().filter(|f| f.download_path().is_some())
    }
}

/// Attachment descriptor for a completed task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFile {
    /// Server-local storage location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Name the file was stored under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Name the client uploaded the file as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
}

impl TaskFile {
    pub fn is_empty(&self) -> bool {
        self.path.is_none() && self.filename.is_none() && self.original_name.is_none()
    }

    pub fn download_path(&self) -> Option<&str> {
        non_empty(self.path.as_deref())
    }

    /// Client-facing name: `original_name`, then `filename`, then the last
    /// component of `path`.
    pub fn download_name(&self) -> Option<String> {
        non_empty(self.original_name.as_deref())
            .or_else(|| non_empty(self.filename.as_deref()))
            .map(str::to_string)
            .or_else(|| {
                self.download_path()
                    .and_then(|p| Path::new(p).file_name())
                    .map(|n| n.to_string_lossy().to_string())
            })
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

/// Input for recording a completed task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCompletedTask {
    pub user_id: String,
    /// Defaults to the insertion time when absent.
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub file: Option<TaskFile>,
    #[serde(default, flatten)]
    pub details: Map<String, Value>,
}

impl CreateCompletedTask {
    /// Opaque fields, minus any key that would shadow a known field once
    /// flattened back into a `CompletedTask`.
    pub fn opaque_details(&self) -> Map<String, Value> {
        self.details
            .iter()
            .filter(|(k, _)| !RESERVED_FIELDS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

const RESERVED_FIELDS: &[&str] = &["id", "userId", "submittedAt", "file"];

/// Query shape shared by the paged fetch and the count.
#[derive(Debug, Clone, Default)]
pub struct CompletedTaskFilter {
    /// Restrict to one owner; `None` lists every record.
    pub user_id: Option<String>,
    pub offset: i64,
    pub limit: i64,
}
