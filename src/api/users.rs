use actix_web::{delete, get, post, put, web, HttpResponse, Responder};

use crate::database::MongoDB;
use crate::models::{ApiResponse, UserPayload, UserResponse};
use crate::query::{ItemQuery, ListQuery};
use crate::services::user_service;

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    params(
        ("where" = Option<String>, Query, description = "JSON filter, e.g. {\"name\": \"Ada\"}"),
        ("sort" = Option<String>, Query, description = "JSON sort spec"),
        ("select" = Option<String>, Query, description = "JSON projection"),
        ("skip" = Option<u64>, Query, description = "Records to skip"),
        ("limit" = Option<i64>, Query, description = "Maximum records to return (unbounded by default)"),
        ("count" = Option<String>, Query, description = "\"true\" returns the match count instead of records")
    ),
    responses(
        (status = 200, description = "Matching users, or the match count"),
        (status = 400, description = "Malformed query parameter"),
        (status = 500, description = "Database error")
    )
)]
#[get("")]
pub async fn list_users(db: web::Data<MongoDB>, query: web::Query<ListQuery>) -> impl Responder {
    match user_service::list_users(&db, &query).await {
        Ok(data) => HttpResponse::Ok().json(ApiResponse::new("OK", data)),
        Err(e) => e.to_response(),
    }
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    request_body = UserPayload,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Missing fields, duplicate email, or validation failure"),
        (status = 500, description = "Database error")
    )
)]
#[post("")]
pub async fn create_user(db: web::Data<MongoDB>, body: web::Json<UserPayload>) -> impl Responder {
    match user_service::create_user(&db, body.into_inner()).await {
        Ok(user) => HttpResponse::Created().json(ApiResponse::new("User created", user)),
        Err(e) => e.to_response(),
    }
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(
        ("id" = String, Path, description = "User ID"),
        ("select" = Option<String>, Query, description = "JSON projection")
    ),
    responses(
        (status = 200, description = "The user"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Database error")
    )
)]
#[get("/{id}")]
pub async fn get_user(
    db: web::Data<MongoDB>,
    path: web::Path<String>,
    query: web::Query<ItemQuery>,
) -> impl Responder {
    match user_service::get_user(&db, &path.into_inner(), query.select.as_deref()).await {
        Ok(user) => HttpResponse::Ok().json(ApiResponse::new("OK", user)),
        Err(e) => e.to_response(),
    }
}

#[put("/{id}")]
pub async fn update_user(
    db: web::Data<MongoDB>,
    path: web::Path<String>,
    body: web::Json<UserPayload>,
) -> impl Responder {
    match user_service::update_user(&db, &path.into_inner(), body.into_inner()).await {
        Ok(user) => HttpResponse::Ok().json(ApiResponse::new("User updated", user)),
        Err(e) => e.to_response(),
    }
}

#[delete("/{id}")]
pub async fn delete_user(db: web::Data<MongoDB>, path: web::Path<String>) -> impl Responder {
    match user_service::delete_user(&db, &path.into_inner()).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => e.to_response(),
    }
}
