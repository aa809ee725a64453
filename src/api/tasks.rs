use actix_web::{delete, get, post, put, web, HttpResponse, Responder};

use crate::database::MongoDB;
use crate::models::{ApiResponse, TaskPayload, TaskResponse};
use crate::query::{ItemQuery, ListQuery};
use crate::services::task_service;

#[utoipa::path(
    get,
    path = "/tasks",
    tag = "Tasks",
    params(
        ("where" = Option<String>, Query, description = "JSON filter, e.g. {\"completed\": false}"),
        ("sort" = Option<String>, Query, description = "JSON sort spec, e.g. {\"deadline\": 1}"),
        ("select" = Option<String>, Query, description = "JSON projection, e.g. {\"name\": 1}"),
        ("skip" = Option<u64>, Query, description = "Records to skip"),
        ("limit" = Option<i64>, Query, description = "Maximum records to return (default 100)"),
        ("count" = Option<String>, Query, description = "\"true\" returns the match count instead of records")
    ),
    responses(
        (status = 200, description = "Matching tasks, or the match count"),
        (status = 400, description = "Malformed query parameter"),
        (status = 500, description = "Database error")
    )
)]
#[get("")]
pub async fn list_tasks(db: web::Data<MongoDB>, query: web::Query<ListQuery>) -> impl Responder {
    match task_service::list_tasks(&db, &query).await {
        Ok(data) => HttpResponse::Ok().json(ApiResponse::new("OK", data)),
        Err(e) => e.to_response(),
    }
}

#[utoipa::path(
    post,
    path = "/tasks",
    tag = "Tasks",
    request_body = TaskPayload,
    responses(
        (status = 201, description = "Task created", body = TaskResponse),
        (status = 400, description = "Missing fields, unknown assignee, or validation failure"),
        (status = 500, description = "Database error")
    )
)]
#[post("")]
pub async fn create_task(db: web::Data<MongoDB>, body: web::Json<TaskPayload>) -> impl Responder {
    match task_service::create_task(&db, body.into_inner()).await {
        Ok(task) => HttpResponse::Created().json(ApiResponse::new("Task created", task)),
        Err(e) => e.to_response(),
    }
}

#[utoipa::path(
    get,
    path = "/tasks/{id}",
    tag = "Tasks",
    params(
        ("id" = String, Path, description = "Task ID"),
        ("select" = Option<String>, Query, description = "JSON projection")
    ),
    responses(
        (status = 200, description = "The task"),
        (status = 404, description = "Task not found"),
        (status = 500, description = "Database error")
    )
)]
#[get("/{id}")]
pub async fn get_task(
    db: web::Data<MongoDB>,
    path: web::Path<String>,
    query: web::Query<ItemQuery>,
) -> impl Responder {
    match task_service::get_task(&db, &path.into_inner(), query.select.as_deref()).await {
        Ok(task) => HttpResponse::Ok().json(ApiResponse::new("OK", task)),
        Err(e) => e.to_response(),
    }
}

#[put("/{id}")]
pub async fn update_task(
    db: web::Data<MongoDB>,
    path: web::Path<String>,
    body: web::Json<TaskPayload>,
) -> impl Responder {
    match task_service::update_task(&db, &path.into_inner(), body.into_inner()).await {
        Ok(task) => HttpResponse::Ok().json(ApiResponse::new("Task updated", task)),
        Err(e) => e.to_response(),
    }
}

#[delete("/{id}")]
pub async fn delete_task(db: web::Data<MongoDB>, path: web::Path<String>) -> impl Responder {
    match task_service::delete_task(&db, &path.into_inner()).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => e.to_response(),
    }
}
