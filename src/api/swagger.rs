use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Task Service API",
        version = "1.0.0",
        description = "REST API for tasks and users backed by MongoDB.\n\n**Features:**\n- Task CRUD with assignee bookkeeping\n- User CRUD with unique emails and pending-task tracking\n- List filtering, sorting, projection, pagination and count mode\n- Health monitoring"
    ),
    paths(
        // Health
        crate::api::health::health_check,

        // Tasks
        crate::api::tasks::list_tasks,
        crate::api::tasks::create_task,
        crate::api::tasks::get_task,

        // Users
        crate::api::users::list_users,
        crate::api::users::create_user,
        crate::api::users::get_user,
    ),
    components(
        schemas(
            crate::api::health::HealthResponse,
            crate::models::task::TaskPayload,
            crate::models::task::TaskResponse,
            crate::models::user::UserPayload,
            crate::models::user::UserResponse,
        )
    ),
    tags(
        (name = "Tasks", description = "Task CRUD. Creating, reassigning or deleting a task keeps the assignee's pendingTasks list in sync."),
        (name = "Users", description = "User CRUD. Deleting a user reverts every task assigned to them to the unassigned state."),
        (name = "Health", description = "Health check endpoint for monitoring service and database status."),
    )
)]
pub struct ApiDoc;
