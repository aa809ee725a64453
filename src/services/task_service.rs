// ==================== TASK MANAGEMENT ====================
// CRUD over the tasks collection. Assignment changes also maintain the
// assignee's pendingTasks list: the secondary user update runs after the
// task write with no transaction, so a failure between the two writes can
// leave the collections briefly inconsistent until a later operation
// repairs them.

use chrono::Utc;
use mongodb::bson::{doc, oid::ObjectId, Document};
use serde_json::Value;

use crate::database::{MongoDB, TASKS_COLLECTION, USERS_COLLECTION};
use crate::models::{Task, TaskPayload, TaskResponse, User, UNASSIGNED};
use crate::query::{self, ListOptions, ListQuery, Projection};
use crate::utils::bson::document_to_json;
use crate::utils::error::ApiError;

/// Applied when a list request carries no explicit limit.
pub const DEFAULT_LIST_LIMIT: i64 = 100;

pub async fn list_tasks(db: &MongoDB, query: &ListQuery) -> Result<Value, ApiError> {
    let options = ListOptions::from_query(query, Some(DEFAULT_LIST_LIMIT))?;
    query::execute(&db.collection::<Document>(TASKS_COLLECTION), &options).await
}

pub async fn create_task(db: &MongoDB, payload: TaskPayload) -> Result<TaskResponse, ApiError> {
    let name = payload.name.filter(|n| !n.is_empty());
    let (name, deadline) = match (name, payload.deadline) {
        (Some(name), Some(deadline)) => (name, deadline),
        _ => return Err(ApiError::InvalidRequest("Name and deadline required".to_string())),
    };

    let assigned_user = payload.assigned_user.unwrap_or_default();
    let (assignee, assigned_user_name) = if assigned_user.is_empty() {
        (None, UNASSIGNED.to_string())
    } else {
        let (oid, user_name) = find_assignee(db, &assigned_user).await?;
        (Some(oid), user_name)
    };

    let task = Task {
        id: None,
        name,
        description: payload.description.unwrap_or_default(),
        deadline,
        completed: payload.completed.unwrap_or(false),
        assigned_user,
        assigned_user_name,
        date_created: Utc::now().timestamp_millis(),
    };
    task.validate().map_err(ApiError::Validation)?;

    let tasks = db.collection::<Task>(TASKS_COLLECTION);
    let result = tasks.insert_one(&task).await.map_err(ApiError::database)?;
    let task_id = result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::Database("Inserted task has no ObjectId".to_string()))?;

    if let Some(assignee) = assignee {
        push_pending_task(db, assignee, &task_id.to_hex()).await?;
    }

    log::info!("📝 Task {} created", task_id.to_hex());

    let mut created = task;
    created.id = Some(task_id);
    Ok(TaskResponse::from(created))
}

pub async fn get_task(db: &MongoDB, id: &str, select: Option<&str>) -> Result<Value, ApiError> {
    let task_id =
        ObjectId::parse_str(id).map_err(|_| ApiError::NotFound("Task not found".to_string()))?;
    let projection = select.map(Projection::parse).transpose()?;

    let tasks = db.collection::<Document>(TASKS_COLLECTION);
    let mut find = tasks.find_one(doc! { "_id": task_id });
    if let Some(projection) = &projection {
        find = find.projection(projection.to_document());
    }

    let document = find
        .await
        .map_err(ApiError::database)?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;
    Ok(document_to_json(document))
}

/// Full replace of the mutable fields. When the assignee changes, the task ID
/// moves from the previous user's pendingTasks to the new one's; updates that
/// keep the same assignee leave both lists untouched.
pub async fn update_task(
    db: &MongoDB,
    id: &str,
    payload: TaskPayload,
) -> Result<TaskResponse, ApiError> {
    let name = payload.name.filter(|n| !n.is_empty());
    let (name, deadline) = match (name, payload.deadline) {
        (Some(name), Some(deadline)) => (name, deadline),
        _ => return Err(ApiError::InvalidRequest("Name and deadline required".to_string())),
    };

    let task_id =
        ObjectId::parse_str(id).map_err(|_| ApiError::NotFound("Task not found".to_string()))?;
    let tasks = db.collection::<Task>(TASKS_COLLECTION);
    let existing = tasks
        .find_one(doc! { "_id": task_id })
        .await
        .map_err(ApiError::database)?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    let new_assignee_id = payload.assigned_user.unwrap_or_default();
    let (new_assignee, assigned_user_name) = if new_assignee_id.is_empty() {
        (None, UNASSIGNED.to_string())
    } else {
        let (oid, user_name) = find_assignee(db, &new_assignee_id).await?;
        (Some(oid), user_name)
    };

    let updated = Task {
        id: Some(task_id),
        name,
        description: payload.description.unwrap_or_default(),
        deadline,
        completed: payload.completed.unwrap_or(false),
        assigned_user: new_assignee_id.clone(),
        assigned_user_name,
        date_created: existing.date_created,
    };
    updated.validate().map_err(ApiError::Validation)?;

    tasks
        .replace_one(doc! { "_id": task_id }, &updated)
        .await
        .map_err(ApiError::database)?;

    let previous_assignee_id = existing.assigned_user;
    if previous_assignee_id != new_assignee_id {
        let task_hex = task_id.to_hex();
        if !previous_assignee_id.is_empty() {
            pull_pending_task(db, &previous_assignee_id, &task_hex).await?;
        }
        if let Some(new_assignee) = new_assignee {
            push_pending_task(db, new_assignee, &task_hex).await?;
        }
    }

    Ok(TaskResponse::from(updated))
}

pub async fn delete_task(db: &MongoDB, id: &str) -> Result<(), ApiError> {
    let task_id =
        ObjectId::parse_str(id).map_err(|_| ApiError::NotFound("Task not found".to_string()))?;
    let tasks = db.collection::<Task>(TASKS_COLLECTION);
    let task = tasks
        .find_one(doc! { "_id": task_id })
        .await
        .map_err(ApiError::database)?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    if !task.assigned_user.is_empty() {
        pull_pending_task(db, &task.assigned_user, &task_id.to_hex()).await?;
    }

    tasks
        .delete_one(doc! { "_id": task_id })
        .await
        .map_err(ApiError::database)?;

    log::info!("🗑️  Task {} deleted", task_id.to_hex());

    Ok(())
}

/// Resolve an assignee reference to its ObjectId and current name. A
/// malformed or unknown reference is a request error, not a 404: the task
/// itself is fine, the body points at a user that does not exist.
async fn find_assignee(db: &MongoDB, user_id: &str) -> Result<(ObjectId, String), ApiError> {
    let oid = ObjectId::parse_str(user_id)
        .map_err(|_| ApiError::InvalidRequest("Assigned user not found".to_string()))?;
    let users = db.collection::<User>(USERS_COLLECTION);
    let user = users
        .find_one(doc! { "_id": oid })
        .await
        .map_err(ApiError::database)?
        .ok_or_else(|| ApiError::InvalidRequest("Assigned user not found".to_string()))?;
    Ok((oid, user.name))
}

/// $addToSet keeps the pendingTasks list duplicate-free even when the same
/// assignment is replayed.
async fn push_pending_task(db: &MongoDB, user_id: ObjectId, task_id: &str) -> Result<(), ApiError> {
    db.collection::<User>(USERS_COLLECTION)
        .update_one(
            doc! { "_id": user_id },
            doc! { "$addToSet": { "pendingTasks": task_id } },
        )
        .await
        .map_err(ApiError::database)?;
    Ok(())
}

async fn pull_pending_task(db: &MongoDB, user_id: &str, task_id: &str) -> Result<(), ApiError> {
    let Ok(oid) = ObjectId::parse_str(user_id) else {
        log::warn!("Task {} references malformed user id '{}'", task_id, user_id);
        return Ok(());
    };
    db.collection::<User>(USERS_COLLECTION)
        .update_one(
            doc! { "_id": oid },
            doc! { "$pull": { "pendingTasks": task_id } },
        )
        .await
        .map_err(ApiError::database)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserPayload;
    use crate::services::user_service;

    async fn test_db() -> MongoDB {
        dotenv::dotenv().ok();
        let uri = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "mongodb://localhost:27017/task_service_test".to_string());
        MongoDB::new(&uri)
            .await
            .expect("MongoDB must be running for integration tests")
    }

    fn unique_email(tag: &str) -> String {
        format!("{}-{}@example.com", tag, ObjectId::new().to_hex())
    }

    fn user_payload(name: &str, email: &str) -> UserPayload {
        UserPayload {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            pending_tasks: None,
        }
    }

    fn task_payload(name: &str, assigned_user: Option<&str>) -> TaskPayload {
        TaskPayload {
            name: Some(name.to_string()),
            description: Some("integration".to_string()),
            deadline: Some(1_900_000_000_000),
            completed: Some(false),
            assigned_user: assigned_user.map(str::to_string),
        }
    }

    async fn pending_tasks_of(db: &MongoDB, user_id: &str) -> Vec<String> {
        let stored = user_service::get_user(db, user_id, None).await.unwrap();
        stored["pendingTasks"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn creating_assigned_task_links_both_sides() {
        let db = test_db().await;
        let user = user_service::create_user(&db, user_payload("Ada", &unique_email("ada")))
            .await
            .unwrap();

        let task = create_task(&db, task_payload("write report", Some(&user.id)))
            .await
            .unwrap();

        assert_eq!(task.assigned_user, user.id);
        assert_eq!(task.assigned_user_name, "Ada");
        assert!(pending_tasks_of(&db, &user.id).await.contains(&task.id));
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn unassigned_task_gets_placeholder_fields() {
        let db = test_db().await;
        let task = create_task(&db, task_payload("solo work", None)).await.unwrap();
        assert_eq!(task.assigned_user, "");
        assert_eq!(task.assigned_user_name, UNASSIGNED);
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn unknown_assignee_rejects_and_persists_nothing() {
        let db = test_db().await;
        let marker = format!("ghost-{}", ObjectId::new().to_hex());
        let ghost = ObjectId::new().to_hex();

        let err = create_task(&db, task_payload(&marker, Some(&ghost)))
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::InvalidRequest("Assigned user not found".to_string()));

        let query = ListQuery {
            filter: Some(format!(r#"{{"name": "{}"}}"#, marker)),
            count: Some("true".to_string()),
            ..Default::default()
        };
        assert_eq!(list_tasks(&db, &query).await.unwrap(), serde_json::json!(0));
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn missing_required_fields_are_rejected() {
        let db = test_db().await;
        let err = create_task(&db, TaskPayload::default()).await.unwrap_err();
        assert_eq!(err, ApiError::InvalidRequest("Name and deadline required".to_string()));
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn reassignment_moves_pending_entry_between_users() {
        let db = test_db().await;
        let alice = user_service::create_user(&db, user_payload("Alice", &unique_email("alice")))
            .await
            .unwrap();
        let bob = user_service::create_user(&db, user_payload("Bob", &unique_email("bob")))
            .await
            .unwrap();

        let task = create_task(&db, task_payload("shared work", Some(&alice.id)))
            .await
            .unwrap();

        let updated = update_task(&db, &task.id, task_payload("shared work", Some(&bob.id)))
            .await
            .unwrap();
        assert_eq!(updated.assigned_user_name, "Bob");
        assert!(!pending_tasks_of(&db, &alice.id).await.contains(&task.id));
        assert!(pending_tasks_of(&db, &bob.id).await.contains(&task.id));

        // Same-assignee update is a no-op on the list.
        update_task(&db, &task.id, task_payload("shared work", Some(&bob.id)))
            .await
            .unwrap();
        let bobs = pending_tasks_of(&db, &bob.id).await;
        assert_eq!(bobs.iter().filter(|id| **id == task.id).count(), 1);
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn unassigning_via_update_resets_placeholder_name() {
        let db = test_db().await;
        let user = user_service::create_user(&db, user_payload("Carol", &unique_email("carol")))
            .await
            .unwrap();
        let task = create_task(&db, task_payload("handoff", Some(&user.id)))
            .await
            .unwrap();

        let updated = update_task(&db, &task.id, task_payload("handoff", None))
            .await
            .unwrap();
        assert_eq!(updated.assigned_user, "");
        assert_eq!(updated.assigned_user_name, UNASSIGNED);
        assert!(!pending_tasks_of(&db, &user.id).await.contains(&task.id));
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn deleting_task_clears_assignee_pending_list() {
        let db = test_db().await;
        let user = user_service::create_user(&db, user_payload("Dan", &unique_email("dan")))
            .await
            .unwrap();
        let task = create_task(&db, task_payload("short lived", Some(&user.id)))
            .await
            .unwrap();

        delete_task(&db, &task.id).await.unwrap();

        assert!(!pending_tasks_of(&db, &user.id).await.contains(&task.id));
        let err = get_task(&db, &task.id, None).await.unwrap_err();
        assert_eq!(err, ApiError::NotFound("Task not found".to_string()));
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn count_mode_ignores_pagination() {
        let db = test_db().await;
        let marker = format!("batch-{}", ObjectId::new().to_hex());
        for i in 0..3 {
            let mut payload = task_payload(&format!("{} {}", marker, i), None);
            payload.description = Some(marker.clone());
            create_task(&db, payload).await.unwrap();
        }

        let query = ListQuery {
            filter: Some(format!(r#"{{"description": "{}"}}"#, marker)),
            count: Some("true".to_string()),
            skip: Some(2),
            limit: Some(1),
            ..Default::default()
        };
        assert_eq!(list_tasks(&db, &query).await.unwrap(), serde_json::json!(3));
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn missing_task_ids_return_not_found_everywhere() {
        let db = test_db().await;
        let ghost = ObjectId::new().to_hex();
        let not_found = ApiError::NotFound("Task not found".to_string());

        assert_eq!(get_task(&db, &ghost, None).await.unwrap_err(), not_found);
        assert_eq!(
            update_task(&db, &ghost, task_payload("x", None)).await.unwrap_err(),
            not_found
        );
        assert_eq!(delete_task(&db, &ghost).await.unwrap_err(), not_found);
    }
}
