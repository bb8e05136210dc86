//! rust-agent HTTP Server
//!
//! Axum-based server exposing the tool-calling conversation engine:
//! send a message, read a session's history, reset a session.

mod config;
mod handlers;
mod state;
mod tools;

use std::sync::Arc;

use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{ConversationEngine, ToolRegistry};
use agent_runtime::ResponsesProvider;

use crate::config::ServerConfig;
use crate::state::AppState;
use crate::tools::CurrentTimeTool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    // Model service
    let provider = ResponsesProvider::from_env()?;
    tracing::info!(
        model = %provider.config().model,
        base_url = %provider.config().base_url,
        "Model service configured"
    );

    // Tools: built-in local tools first, then declarations from the config file
    let tools = ToolRegistry::builder()
        .tool(CurrentTimeTool)
        .remotes(config.load_remote_tools()?)
        .build();

    tracing::info!("Registered {} tools:", tools.len());
    for entry in tools.manifest().entries() {
        let kind = entry["type"].as_str().unwrap_or("?");
        match entry["name"].as_str() {
            Some(name) => tracing::info!("  • {} ({})", name, kind),
            None => tracing::info!("  • {}", kind),
        }
    }

    let mut builder = ConversationEngine::builder()
        .service(Arc::new(provider))
        .tools(tools)
        .tool_choice(config.tool_choice);
    if let Some(instructions) = &config.instructions {
        builder = builder.instructions(instructions);
    }
    let state = AppState::new(builder.build()?);

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = handlers::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("rust-agent server running on http://{}", config.bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health                    - Health check");
    tracing::info!("  POST   /api/chat                  - Send message");
    tracing::info!("  GET    /api/sessions/{{id}}/history - Session history");
    tracing::info!("  DELETE /api/sessions/{{id}}         - Reset session");

    axum::serve(listener, app).await?;

    Ok(())
}
