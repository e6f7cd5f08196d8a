// [[CASCADE]]/apps/kernel-server/src/server/handlers.rs
// Purpose: REST and WebSocket handlers over the runtime facade.
// Architecture: API Layer
// Dependencies: Axum, tokio-util, Runtime, Workspace

use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Json, Multipart, Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde_json::json;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::events::{EventType, RuntimeEvent};
use crate::models::{InvocationPayload, RuntimeState, WorkflowConfig};
use crate::observability::RunMetrics;
use crate::runtime::{CascadeRuntime, RuntimeError};
use crate::security::OperatorSession;
use crate::workspace::{check_filename, content_type_for, ArtifactManifest};

#[derive(serde::Deserialize)]
pub struct RunQuery {
    run_id: Option<String>,
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    status: String,
    message: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Cascade kernel is running".to_string(),
    })
}

// === RUN LIFECYCLE ===

pub async fn start_workflow(
    State(runtime): State<Arc<CascadeRuntime>>,
    Json(config): Json<WorkflowConfig>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    match runtime.start_workflow(config) {
        Ok(run_id) => Ok(Json(json!({"success": true, "run_id": run_id}))),
        Err(e) => {
            tracing::error!("Workflow rejected: {}", e);
            Err((
                StatusCode::BAD_REQUEST,
                Json(json!({"success": false, "error": e.to_string()})),
            ))
        }
    }
}

pub async fn get_runtime_state(
    State(runtime): State<Arc<CascadeRuntime>>,
    Query(query): Query<RunQuery>,
) -> Result<Json<RuntimeState>, StatusCode> {
    let run_id = query.run_id.ok_or(StatusCode::BAD_REQUEST)?;
    runtime
        .get_state(&run_id)
        .ok_or(StatusCode::NOT_FOUND)
        .map(Json)
}

pub async fn resume_run(
    State(runtime): State<Arc<CascadeRuntime>>,
    Path(run_id): Path<String>,
) -> StatusCode {
    match runtime.resume_run(&run_id) {
        Ok(()) => StatusCode::OK,
        Err(RuntimeError::NotPaused(_)) => {
            tracing::warn!("Resume called on non-paused run: {}", run_id);
            StatusCode::BAD_REQUEST
        }
        Err(RuntimeError::RunNotFound(_)) => StatusCode::NOT_FOUND,
        Err(e) => {
            tracing::error!("Resume of {} failed: {}", run_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub async fn stop_run(
    State(runtime): State<Arc<CascadeRuntime>>,
    Path(run_id): Path<String>,
    operator: OperatorSession,
) -> StatusCode {
    tracing::info!("Run {} stopped by operator {}", run_id, operator.0);
    runtime.stop_run(&run_id).await;
    StatusCode::OK
}

// === INSPECTION ===

pub async fn get_signatures(
    State(runtime): State<Arc<CascadeRuntime>>,
    Query(query): Query<RunQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let run_id = query.run_id.ok_or(StatusCode::BAD_REQUEST)?;
    let store = runtime
        .get_all_signatures(&run_id)
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(json!({
        "run_id": run_id,
        "signatures": store.signatures,
    })))
}

pub async fn get_run_metrics(
    State(runtime): State<Arc<CascadeRuntime>>,
    Query(query): Query<RunQuery>,
) -> Result<Json<RunMetrics>, StatusCode> {
    let run_id = query.run_id.ok_or(StatusCode::BAD_REQUEST)?;
    let state = runtime.get_state(&run_id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(RunMetrics::from_state(&state)))
}

pub async fn prepare_invocation(
    State(runtime): State<Arc<CascadeRuntime>>,
    Path((run_id, agent_id)): Path<(String, String)>,
) -> Result<Json<InvocationPayload>, StatusCode> {
    tracing::info!("Preparing invocation preview for {} in {}", agent_id, run_id);
    runtime
        .prepare_invocation_payload(&run_id, &agent_id)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!("Failed to prepare invocation: {}", e);
            StatusCode::NOT_FOUND
        })
}

// === EXTERNAL EVENT INGEST ===

#[derive(serde::Deserialize)]
pub struct LogIngest {
    pub agent_id: Option<String>,
    pub event_type: Option<String>,
    pub payload: serde_json::Value,
}

/// The agent service reports intermediate activity (tool calls, thoughts)
/// here; it lands on the bus for the sentinel and live streams.
pub async fn ingest_log(
    State(runtime): State<Arc<CascadeRuntime>>,
    Path(run_id): Path<String>,
    Json(body): Json<LogIngest>,
) -> StatusCode {
    if !runtime.has_run(&run_id) {
        return StatusCode::NOT_FOUND;
    }

    let event_type = match body.event_type.as_deref() {
        Some("tool_call") => EventType::ToolCall,
        _ => EventType::IntermediateLog,
    };

    runtime.emit_event(RuntimeEvent::new(
        &run_id,
        event_type,
        body.agent_id,
        body.payload,
    ));
    StatusCode::ACCEPTED
}

// === ARTIFACT KV ACCESS ===

pub async fn get_artifact(
    State(runtime): State<Arc<CascadeRuntime>>,
    Path((run_id, agent_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if !runtime.persistence().is_enabled() {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    runtime
        .persistence()
        .fetch_artifact(&run_id, &agent_id)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

// === WEBSOCKET STREAM ===

pub async fn ws_runtime_stream(
    State(runtime): State<Arc<CascadeRuntime>>,
    Path(run_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_runtime_stream(socket, runtime, run_id))
}

async fn handle_runtime_stream(socket: WebSocket, runtime: Arc<CascadeRuntime>, run_id: String) {
    let (mut sender, mut receiver) = socket.split();

    // A client that connected straight after /runtime/start can beat the
    // state insertion by a hair
    if runtime.get_state(&run_id).is_none() {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    if runtime.get_state(&run_id).is_none() {
        let _ = sender
            .send(Message::Text(json!({"error": "Run not found"}).to_string()))
            .await;
        return;
    }

    let mut interval = tokio::time::interval(std::time::Duration::from_millis(250));
    let mut bus_rx = runtime.event_bus.subscribe();

    loop {
        tokio::select! {
            msg = receiver.next() => {
                if msg.is_none() {
                    tracing::info!("Client disconnected from runtime stream: {}", run_id);
                    break;
                }
            }

            _ = interval.tick() => {
                let Some(state) = runtime.get_state(&run_id) else { break };
                let terminal = state.is_terminal();

                let frame = json!({
                    "type": "state_update",
                    "state": state,
                    "signatures": runtime.get_all_signatures(&run_id).map(|s| s.signatures),
                    "topology": runtime.get_topology_snapshot(&run_id),
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                });
                if sender.send(Message::Text(frame.to_string())).await.is_err() {
                    break;
                }

                if terminal {
                    tracing::info!("Run {} reached a terminal state, closing stream", run_id);
                    // let the client digest the final frame before the close frame
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    let _ = sender.close().await;
                    break;
                }
            }

            Ok(event) = bus_rx.recv() => {
                if event.run_id != run_id {
                    continue;
                }
                if event.event_type != EventType::IntermediateLog {
                    continue;
                }

                let frame = json!({
                    "type": "log_event",
                    "agent_id": event.agent_id,
                    "payload": event.payload,
                    "timestamp": event.timestamp,
                });
                if sender.send(Message::Text(frame.to_string())).await.is_err() {
                    break;
                }
            }
        }
    }
}

// === SESSION FILES ===

// GET /runtime/:run_id/files/:filename
pub async fn serve_session_file(
    State(runtime): State<Arc<CascadeRuntime>>,
    Path((run_id, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, StatusCode> {
    check_filename(&filename).map_err(|_| StatusCode::FORBIDDEN)?;

    let path = runtime.workspace().session_output_path(&run_id, &filename);
    if !path.exists() {
        return Err(StatusCode::NOT_FOUND);
    }

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let body = Body::from_stream(ReaderStream::new(file));

    let headers = [
        ("Content-Type", content_type_for(&filename)),
        ("Cache-Control", "public, max-age=3600"),
    ];
    Ok((headers, body))
}

// === LIBRARY TIER ===

pub async fn list_library_files(
    State(runtime): State<Arc<CascadeRuntime>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let files = runtime.workspace().list_library().await.map_err(|e| {
        tracing::error!("Failed to list library: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(json!({"files": files})))
}

pub async fn upload_library_file(
    State(runtime): State<Arc<CascadeRuntime>>,
    operator: OperatorSession,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, StatusCode> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.file_name().unwrap_or("unnamed_file").to_string();
        let data = field.bytes().await.map_err(|e| {
            tracing::error!("Failed to read upload bytes: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

        tracing::info!("Operator {} uploading {} to library", operator.0, name);
        if let Err(e) = runtime.workspace().save_to_library(&name, &data).await {
            tracing::error!("Failed to save {} to library: {}", name, e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    Ok(Json(json!({"success": true, "message": "Upload complete"})))
}

// === PROMOTED ARTIFACTS ===

/// GET /runtime/artifacts — every promoted run with its manifest
pub async fn list_all_artifacts(
    State(runtime): State<Arc<CascadeRuntime>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let runs = runtime.workspace().list_artifact_runs().await.map_err(|e| {
        tracing::error!("Failed to list artifact runs: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let mut artifacts = Vec::new();
    for run_id in runs {
        if let Ok(manifest) = runtime.workspace().load_manifest(&run_id).await {
            artifacts.push(json!({"run_id": run_id, "metadata": manifest}));
        }
    }
    Ok(Json(json!({"artifacts": artifacts})))
}

pub async fn get_run_artifacts(
    State(runtime): State<Arc<CascadeRuntime>>,
    Path(run_id): Path<String>,
) -> Result<Json<ArtifactManifest>, StatusCode> {
    runtime
        .workspace()
        .load_manifest(&run_id)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::warn!("Artifact manifest not found for run {}: {}", run_id, e);
            StatusCode::NOT_FOUND
        })
}

pub async fn serve_artifact_file(
    State(runtime): State<Arc<CascadeRuntime>>,
    Path((run_id, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, StatusCode> {
    check_filename(&filename).map_err(|_| {
        tracing::warn!("Blocked suspicious artifact filename: {}", filename);
        StatusCode::FORBIDDEN
    })?;

    let path = runtime.workspace().artifacts_dir(&run_id).join(&filename);
    if !path.exists() {
        return Err(StatusCode::NOT_FOUND);
    }

    let file = tokio::fs::File::open(&path).await.map_err(|e| {
        tracing::error!("Failed to open artifact {}: {}", path.display(), e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let body = Body::from_stream(ReaderStream::new(file));

    let headers = [
        ("Content-Type", content_type_for(&filename)),
        ("Cache-Control", "public, max-age=86400"),
    ];
    Ok((headers, body))
}

pub async fn delete_artifact_run(
    State(runtime): State<Arc<CascadeRuntime>>,
    Path(run_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    runtime
        .workspace()
        .delete_artifact_run(&run_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete artifact run {}: {}", run_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn promote_artifact_to_library(
    State(runtime): State<Arc<CascadeRuntime>>,
    Path((run_id, filename)): Path<(String, String)>,
) -> Result<StatusCode, StatusCode> {
    check_filename(&filename).map_err(|_| StatusCode::FORBIDDEN)?;

    runtime
        .workspace()
        .promote_to_library(&run_id, &filename)
        .await
        .map_err(|e| {
            tracing::error!("Failed to promote {} to library: {}", filename, e);
            StatusCode::NOT_FOUND
        })?;
    Ok(StatusCode::CREATED)
}
