use crate::error::RuntimeError;
use crate::records::{Record, RecordStore};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bluegreen::{Orchestrator, StartError};
use bluegreen_core::{RunConfig, WriteOnlyConfig};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::debug;

pub(crate) async fn server_task(
    port: u16,
    orchestrator: Orchestrator,
    records: RecordStore,
) -> Result<(), RuntimeError> {
    let state = Arc::new(ServerState {
        orchestrator,
        records,
    });

    let app = Router::new()
        .route("/api/workload/start", post(start_workload))
        .route("/api/workload/start-write", post(start_write_only))
        .route("/api/workload/stop", post(stop_workload))
        .route("/api/workload/status", get(workload_status))
        .route("/api/records", get(list_records).post(create_record))
        .route("/api/records/count", get(count_records))
        .route(
            "/api/records/:id",
            get(find_record).put(update_record).delete(delete_record),
        )
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let socket_addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(socket_addr).await?;

    debug!("axum server starting up...");
    axum::serve(listener, app).await?;

    Ok(())
}

struct ServerState {
    orchestrator: Orchestrator,
    records: RecordStore,
}

#[derive(Error, Debug)]
enum HandlerError {
    #[error(transparent)]
    Start(#[from] StartError),

    #[error("database error: {0}")]
    Database(#[from] mysql_async::Error),

    #[error("record {0} not found")]
    NotFound(u64),
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        use HandlerError::*;
        let (status, body) = match self {
            Start(StartError::AlreadyRunning) => (
                StatusCode::CONFLICT,
                json!({ "error": "a workload run is already in progress", "status": "already_running" }),
            ),
            Start(StartError::InvalidConfig(err)) => {
                (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() }))
            }
            Database(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": err.to_string() }),
            ),
            NotFound(id) => (
                StatusCode::NOT_FOUND,
                json!({ "error": format!("record {id} not found") }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

async fn start_workload(
    State(state): State<Arc<ServerState>>,
    body: Option<Json<RunConfig>>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    let config = body.map(|Json(config)| config).unwrap_or_default();
    let receipt = state.orchestrator.start(config).await?;
    Ok(Json(json!({
        "status": "started",
        "test_id": receipt.run_id,
        "continuous": receipt.continuous,
    })))
}

async fn start_write_only(
    State(state): State<Arc<ServerState>>,
    body: Option<Json<WriteOnlyConfig>>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    let config = body.map(|Json(config)| config).unwrap_or_default();
    let receipt = state.orchestrator.start_write_only(config).await?;
    Ok(Json(json!({
        "status": "started",
        "test_id": receipt.run_id,
    })))
}

async fn stop_workload(State(state): State<Arc<ServerState>>) -> Json<serde_json::Value> {
    state.orchestrator.stop().await;
    Json(json!({ "status": "stopped" }))
}

async fn workload_status(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(state.orchestrator.status().await)
}

#[derive(Debug, Deserialize)]
struct RecordBody {
    name: String,
}

async fn list_records(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<Vec<Record>>, HandlerError> {
    Ok(Json(state.records.find_all().await?))
}

async fn find_record(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<u64>,
) -> Result<Json<Record>, HandlerError> {
    let record = state
        .records
        .find(id)
        .await?
        .ok_or(HandlerError::NotFound(id))?;
    Ok(Json(record))
}

async fn create_record(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<RecordBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), HandlerError> {
    let id = state.records.insert(&body.name).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

async fn update_record(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<u64>,
    Json(body): Json<RecordBody>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    if !state.records.update(id, &body.name).await? {
        return Err(HandlerError::NotFound(id));
    }
    Ok(Json(json!({ "status": "updated" })))
}

async fn delete_record(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<u64>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    if !state.records.delete(id).await? {
        return Err(HandlerError::NotFound(id));
    }
    Ok(Json(json!({ "status": "deleted" })))
}

async fn count_records(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    let count = state.records.count().await?;
    Ok(Json(json!({ "count": count })))
}
