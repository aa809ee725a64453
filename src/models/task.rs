use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Placeholder shown on tasks that have no assignee.
pub const UNASSIGNED: &str = "unassigned";

/// Task document stored in the `tasks` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Due date as a Unix millisecond timestamp.
    pub deadline: i64,

    #[serde(default)]
    pub completed: bool,

    /// Hex ObjectId of the assigned user; empty string when unassigned.
    #[serde(default)]
    pub assigned_user: String,

    /// Snapshot of the assignee's name taken at assignment time. Not
    /// refreshed when the user later renames; updated on reassignment only.
    #[serde(default = "default_assigned_user_name")]
    pub assigned_user_name: String,

    /// Unix millisecond timestamp, set once at creation.
    pub date_created: i64,
}

fn default_assigned_user_name() -> String {
    UNASSIGNED.to_string()
}

impl Task {
    /// Field-level constraints checked before persisting.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name required".to_string());
        }
        if self.assigned_user.is_empty() && self.assigned_user_name != UNASSIGNED {
            return Err("unassigned task must carry the unassigned placeholder name".to_string());
        }
        Ok(())
    }
}

/// Request body for POST /tasks and PUT /tasks/{id}.
#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayload {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Unix millisecond timestamp.
    pub deadline: Option<i64>,
    pub completed: Option<bool>,
    /// Hex ObjectId of an existing user, or empty/absent to leave unassigned.
    pub assigned_user: Option<String>,
}

/// Task as returned to clients, with the ObjectId rendered as hex.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: String,
    pub deadline: i64,
    pub completed: bool,
    pub assigned_user: String,
    pub assigned_user_name: String,
    pub date_created: i64,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        TaskResponse {
            id: task.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: task.name,
            description: task.description,
            deadline: task.deadline,
            completed: task.completed,
            assigned_user: task.assigned_user,
            assigned_user_name: task.assigned_user_name,
            date_created: task.date_created,
        }
    }
}
