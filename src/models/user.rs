use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// User document stored in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub name: String,

    /// Globally unique; backed by a unique index created at startup.
    pub email: String,

    /// Hex ObjectIds of tasks currently assigned to this user. Treated as a
    /// set; insertion order carries no meaning.
    #[serde(default)]
    pub pending_tasks: Vec<String>,

    /// Unix millisecond timestamp, set once at creation.
    pub date_created: i64,
}

impl User {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        if self.email.trim().is_empty() {
            return Err("email is required".to_string());
        }
        Ok(())
    }
}

/// Request body for POST /users and PUT /users/{id}.
#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    pub name: Option<String>,
    pub email: Option<String>,
    pub pending_tasks: Option<Vec<String>>,
}

/// User as returned to clients, with the ObjectId rendered as hex.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub pending_tasks: Vec<String>,
    pub date_created: i64,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: user.name,
            email: user.email,
            pending_tasks: user.pending_tasks,
            date_created: user.date_created,
        }
    }
}
