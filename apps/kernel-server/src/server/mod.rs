// [[CASCADE]]/apps/kernel-server/src/server/mod.rs
// Purpose: HTTP surface assembly: routes, CORS, shared runtime state.
// Architecture: API Layer
// Dependencies: Axum, tower-http

pub mod handlers;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::runtime::CascadeRuntime;

pub fn router(runtime: Arc<CascadeRuntime>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/runtime/start", post(handlers::start_workflow))
        .route("/runtime/state", get(handlers::get_runtime_state))
        .route("/runtime/signatures", get(handlers::get_signatures))
        .route("/runtime/metrics", get(handlers::get_run_metrics))
        .route("/runtime/library", get(handlers::list_library_files))
        .route("/runtime/library/upload", post(handlers::upload_library_file))
        .route("/runtime/artifacts", get(handlers::list_all_artifacts))
        .route(
            "/runtime/artifacts/:run_id",
            get(handlers::get_run_artifacts).delete(handlers::delete_artifact_run),
        )
        .route(
            "/runtime/artifacts/:run_id/files/:filename",
            get(handlers::serve_artifact_file),
        )
        .route(
            "/runtime/artifacts/:run_id/files/:filename/promote",
            post(handlers::promote_artifact_to_library),
        )
        .route("/runtime/:run_id/resume", post(handlers::resume_run))
        .route("/runtime/:run_id/stop", post(handlers::stop_run))
        .route("/runtime/:run_id/log", post(handlers::ingest_log))
        .route(
            "/runtime/:run_id/artifact/:agent_id",
            get(handlers::get_artifact),
        )
        .route(
            "/runtime/:run_id/agent/:agent_id/invoke",
            post(handlers::prepare_invocation),
        )
        .route(
            "/runtime/:run_id/files/:filename",
            get(handlers::serve_session_file),
        )
        .route("/ws/runtime/:run_id", get(handlers::ws_runtime_stream))
        .layer(cors)
        .with_state(runtime)
}
