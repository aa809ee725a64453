mod api;
mod database;
mod models;
mod query;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::env;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Get configuration from environment
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let database_url = env::var("DATABASE_URL")
        .unwrap_or_else(|_| "mongodb://localhost:27017/task_service".to_string());

    log::info!("🚀 Starting Task Service...");
    log::info!("📊 Database: {}", database_url);

    // Initialize MongoDB connection
    let db = database::MongoDB::new(&database_url)
        .await
        .expect("Failed to connect to MongoDB");

    let db_data = web::Data::new(db.clone());

    log::info!("✅ MongoDB connected successfully");
    log::info!("🌐 Server starting on {}:{}", host, port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", host, port);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api-docs/openapi.json", host, port);

    // Start HTTP server
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://localhost:8081")
            .allowed_origin("http://127.0.0.1:3000")
            .allowed_origin("http://127.0.0.1:8081")
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
            ])
            .max_age(3600);

        // Generate OpenAPI specification
        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(db_data.clone())
            // Keep body/query deserialization failures inside the envelope
            .app_data(web::JsonConfig::default().error_handler(utils::error::json_error_handler))
            .app_data(web::QueryConfig::default().error_handler(utils::error::query_error_handler))
            .wrap(cors)
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone()),
            )
            // Health check
            .route("/health", web::get().to(api::health::health_check))
            // Task resource
            .service(
                web::scope("/tasks")
                    .service(api::tasks::list_tasks)
                    .service(api::tasks::create_task)
                    .service(api::tasks::get_task)
                    .service(api::tasks::update_task)
                    .service(api::tasks::delete_task),
            )
            // User resource
            .service(
                web::scope("/users")
                    .service(api::users::list_users)
                    .service(api::users::create_user)
                    .service(api::users::get_user)
                    .service(api::users::update_user)
                    .service(api::users::delete_user),
            )
    })
    .bind(format!("{}:{}", host, port))?
    .run()
    .await
}
