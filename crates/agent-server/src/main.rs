//! datachat HTTP Server
//!
//! Axum-based server fronting a tool-using analyst agent. Tools come from
//! an MCP server (network endpoint or spawned process); answers come from
//! an OpenAI-compatible model grounded in those tools.

use std::sync::{Arc, OnceLock};

use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_mcp::McpClient;
use agent_server::config::ServerConfig;
use agent_server::handlers::{AppState, router};
use agent_server::state::{AgentHandle, build_service};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env()?;

    // Kick off agent initialization without blocking the listener; the
    // gate answers 503 until the handshake and discovery finish. The MCP
    // client lands in the slot so shutdown can release the connection.
    let handle = Arc::new(AgentHandle::new());
    let mcp_slot: Arc<OnceLock<Arc<McpClient>>> = Arc::new(OnceLock::new());
    {
        let handle = handle.clone();
        let config = config.clone();
        let mcp_slot = mcp_slot.clone();
        tokio::spawn(async move {
            handle
                .initialize(|| async {
                    let (service, client) = build_service(&config).await?;
                    let _ = mcp_slot.set(client);
                    Ok(service)
                })
                .await;
        });
    }

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = router(AppState {
        handle: handle.clone(),
    })
    .fallback_service(ServeDir::new(&config.static_dir))
    .layer(cors)
    .layer(TraceLayer::new_for_http());

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 datachat server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health - Health check");
    tracing::info!("  POST /chat   - Send a message");
    tracing::info!("");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Release the tool-provider connection on the way out.
    if let Some(client) = mcp_slot.get() {
        if let Err(e) = client.close().await {
            tracing::warn!("Failed to close MCP connection: {}", e);
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
