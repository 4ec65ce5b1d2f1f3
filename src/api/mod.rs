//! HTTP API for task submission and polling.
//!
//! ## Endpoints
//!
//! - `POST /tasks` - Submit a task, returns `{"taskId": ...}` immediately
//! - `GET /tasks?id=<taskId>` - Get one task with its execution steps
//! - `GET /tasks` - List all tasks
//! - `GET /health` - Health check

mod runner;
mod task_store;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::agent::{Agent, AgentSettings};
use crate::config::Config;
use crate::llm::OpenAiCompatibleClient;
use crate::tools::{Database, Sandbox, ToolContext, ToolRegistry};

pub use runner::{QueueError, TaskQueue};
pub use task_store::{InMemoryTaskStore, TaskStore};
use types::{CreateTaskRequest, CreateTaskResponse, ErrorResponse, HealthResponse, TaskQuery};

/// Shared application state.
pub struct AppState {
    pub store: Arc<dyn TaskStore>,
    pub queue: Arc<TaskQueue>,
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tasks", get(get_tasks).post(create_task))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build every component from `config`, serve until Ctrl-C, then drain the workers.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let database = Database::open(&config.database_path)?;
    let sandbox = Sandbox::open(&config.sandbox_dir)?.reserve(&config.database_path);
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("task-agent/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let tools = ToolRegistry::with_builtin_tools(ToolContext {
        sandbox: Arc::new(sandbox),
        database: Arc::new(database),
        http,
        weather: config.weather.clone(),
    })
    .with_timeout(config.tool_timeout);

    let llm = Arc::new(OpenAiCompatibleClient::new(
        config.api_key.clone(),
        config.llm_base_url.clone(),
    ));
    let agent = Arc::new(Agent::new(
        llm,
        Arc::new(tools),
        AgentSettings::from_config(&config),
    ));

    let queue = Arc::new(TaskQueue::start(
        agent,
        config.worker_count,
        config.queue_capacity,
    ));
    let state = Arc::new(AppState {
        store: Arc::new(InMemoryTaskStore::new()),
        queue: Arc::clone(&queue),
    });

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    queue.shutdown().await;
    Ok(())
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(message))).into_response()
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Invalid request body: {}", rejection.body_text()),
            )
        }
    };
    if req.prompt.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Prompt is required");
    }

    let task = match state.store.create_task(&req.prompt).await {
        Ok(task) => task,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    };
    let task_id = task.read().await.id().to_string();

    if let Err(e) = state.queue.submit(task) {
        tracing::warn!("Rejected task {}: {}", task_id, e);
        if let Err(e) = state.store.remove_task(&task_id).await {
            tracing::error!("Failed to discard rejected task {}: {}", task_id, e);
        }
        return error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string());
    }

    tracing::info!("Accepted task {}", task_id);
    Json(CreateTaskResponse { task_id }).into_response()
}

async fn get_tasks(State(state): State<Arc<AppState>>, Query(query): Query<TaskQuery>) -> Response {
    match query.id {
        Some(id) => match state.store.get_task(&id).await {
            Ok(Some(task)) => Json(task).into_response(),
            Ok(None) => error_response(StatusCode::NOT_FOUND, "Task not found"),
            Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
        },
        None => match state.store.list_tasks().await {
            Ok(tasks) => Json(tasks).into_response(),
            Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
        },
    }
}
