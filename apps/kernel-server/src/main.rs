// [[CASCADE]]/apps/kernel-server/src/main.rs
// Purpose: Entry point. Resolves settings, rehydrates state, starts the sentinel and server.
// Architecture: Application Boot
// Dependencies: Axum, Tokio, tracing-subscriber

mod dag;
mod events;
mod models;
mod observability;
mod patterns;
mod persistence;
mod runtime;
mod security;
mod sentinel;
mod server;
mod settings;
mod workspace;

use std::sync::Arc;

use crate::runtime::CascadeRuntime;
use crate::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cascade_kernel=debug".parse()?)
                .add_directive("tower_http=trace".parse()?),
        )
        .init();

    tracing::info!("Initializing Cascade kernel...");

    let settings = Settings::from_env();
    let port = settings.kernel_port;
    let runtime = Arc::new(CascadeRuntime::new(settings));

    // Reload whatever the store remembers about previously-active runs
    runtime.rehydrate_on_boot().await;

    // Pattern engine watches the bus for the whole process lifetime
    sentinel::spawn(Arc::clone(&runtime));

    let app = server::router(runtime);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Cascade kernel listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
