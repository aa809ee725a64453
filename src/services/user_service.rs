// ==================== USER MANAGEMENT ====================
// CRUD over the users collection. Deleting a user bulk-unassigns every task
// that still points at them so no task is left with a dangling reference.

use chrono::Utc;
use mongodb::bson::{doc, oid::ObjectId, Document};
use serde_json::Value;

use crate::database::{MongoDB, TASKS_COLLECTION, USERS_COLLECTION};
use crate::models::{User, UserPayload, UserResponse, UNASSIGNED};
use crate::query::{self, ListOptions, ListQuery, Projection};
use crate::utils::bson::document_to_json;
use crate::utils::error::ApiError;

pub async fn list_users(db: &MongoDB, query: &ListQuery) -> Result<Value, ApiError> {
    // Unlike tasks, user listings carry no implicit limit.
    let options = ListOptions::from_query(query, None)?;
    query::execute(&db.collection::<Document>(USERS_COLLECTION), &options).await
}

pub async fn create_user(db: &MongoDB, payload: UserPayload) -> Result<UserResponse, ApiError> {
    let name = payload.name.filter(|n| !n.is_empty());
    let email = payload.email.filter(|e| !e.is_empty());
    let (name, email) = match (name, email) {
        (Some(name), Some(email)) => (name, email),
        _ => return Err(ApiError::InvalidRequest("Name and email required".to_string())),
    };

    let users = db.collection::<User>(USERS_COLLECTION);
    let exists = users
        .find_one(doc! { "email": &email })
        .await
        .map_err(ApiError::database)?;
    if exists.is_some() {
        return Err(ApiError::InvalidRequest("Email already exists".to_string()));
    }

    let user = User {
        id: None,
        name,
        email,
        pending_tasks: payload.pending_tasks.unwrap_or_default(),
        date_created: Utc::now().timestamp_millis(),
    };
    user.validate().map_err(ApiError::Validation)?;

    let result = users.insert_one(&user).await.map_err(ApiError::database)?;
    let user_id = result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::Database("Inserted user has no ObjectId".to_string()))?;

    log::info!("📝 User {} created", user_id.to_hex());

    let mut created = user;
    created.id = Some(user_id);
    Ok(UserResponse::from(created))
}

pub async fn get_user(db: &MongoDB, id: &str, select: Option<&str>) -> Result<Value, ApiError> {
    let user_id =
        ObjectId::parse_str(id).map_err(|_| ApiError::NotFound("User not found".to_string()))?;
    let projection = select.map(Projection::parse).transpose()?;

    let users = db.collection::<Document>(USERS_COLLECTION);
    let mut find = users.find_one(doc! { "_id": user_id });
    if let Some(projection) = &projection {
        find = find.projection(projection.to_document());
    }

    let document = find
        .await
        .map_err(ApiError::database)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(document_to_json(document))
}

/// Full replace of name/email (and pendingTasks when supplied). Email
/// uniqueness is enforced here exactly as on create, checked against every
/// other user.
pub async fn update_user(
    db: &MongoDB,
    id: &str,
    payload: UserPayload,
) -> Result<UserResponse, ApiError> {
    let name = payload.name.filter(|n| !n.is_empty());
    let email = payload.email.filter(|e| !e.is_empty());
    let (name, email) = match (name, email) {
        (Some(name), Some(email)) => (name, email),
        _ => return Err(ApiError::InvalidRequest("Name and email required".to_string())),
    };

    let user_id =
        ObjectId::parse_str(id).map_err(|_| ApiError::NotFound("User not found".to_string()))?;
    let users = db.collection::<User>(USERS_COLLECTION);
    let existing = users
        .find_one(doc! { "_id": user_id })
        .await
        .map_err(ApiError::database)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let taken = users
        .find_one(doc! { "email": &email, "_id": { "$ne": user_id } })
        .await
        .map_err(ApiError::database)?;
    if taken.is_some() {
        return Err(ApiError::InvalidRequest("Email already exists".to_string()));
    }

    let updated = User {
        id: Some(user_id),
        name,
        email,
        pending_tasks: payload.pending_tasks.unwrap_or(existing.pending_tasks),
        date_created: existing.date_created,
    };
    updated.validate().map_err(ApiError::Validation)?;

    users
        .replace_one(doc! { "_id": user_id }, &updated)
        .await
        .map_err(ApiError::database)?;

    Ok(UserResponse::from(updated))
}

/// Every task still pointing at the user reverts to unassigned in one bulk
/// update before the user record goes away.
pub async fn delete_user(db: &MongoDB, id: &str) -> Result<(), ApiError> {
    let user_id =
        ObjectId::parse_str(id).map_err(|_| ApiError::NotFound("User not found".to_string()))?;
    let users = db.collection::<User>(USERS_COLLECTION);
    users
        .find_one(doc! { "_id": user_id })
        .await
        .map_err(ApiError::database)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let tasks = db.collection::<Document>(TASKS_COLLECTION);
    let unassigned = tasks
        .update_many(
            doc! { "assignedUser": user_id.to_hex() },
            doc! { "$set": { "assignedUser": "", "assignedUserName": UNASSIGNED } },
        )
        .await
        .map_err(ApiError::database)?;

    users
        .delete_one(doc! { "_id": user_id })
        .await
        .map_err(ApiError::database)?;

    log::info!(
        "🗑️  User {} deleted, {} task(s) unassigned",
        user_id.to_hex(),
        unassigned.modified_count
    );

    Ok(())
}
