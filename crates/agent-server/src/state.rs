//! Application State
//!
//! `AgentHandle` gates requests behind one-shot agent initialization.
//! Concurrent triggers cannot cause duplicate connect/build attempts, and
//! the Ready/Failed transition is published atomically so every waiting
//! request observes the same final state.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OnceCell, watch};

use agent_core::{
    AgentBuilder, AgentError, ChatService, InMemorySessionStore, LlmProvider, ToolRegistry,
    TracingObserver,
};
use agent_mcp::{McpClient, discover_tools, register_catalog};
use agent_runtime::OpenAiProvider;

use crate::config::ServerConfig;

/// Lifecycle of the shared agent
#[derive(Clone)]
pub enum HandleState {
    Uninitialized,
    Initializing,
    Ready(Arc<ChatService>),
    /// Terminal short of a process restart
    Failed(String),
}

impl HandleState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready(_) => "ready",
            Self::Failed(_) => "failed",
        }
    }
}

/// Shared handle to the lazily-initialized agent
pub struct AgentHandle {
    tx: watch::Sender<HandleState>,
    rx: watch::Receiver<HandleState>,
    init: OnceCell<()>,
}

impl Default for AgentHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentHandle {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(HandleState::Uninitialized);
        Self {
            tx,
            rx,
            init: OnceCell::new(),
        }
    }

    pub fn state(&self) -> HandleState {
        self.rx.borrow().clone()
    }

    /// Admit a request: hand out the service when Ready, reject otherwise.
    pub fn admit(&self) -> Result<Arc<ChatService>, AgentError> {
        match &*self.rx.borrow() {
            HandleState::Ready(service) => Ok(service.clone()),
            HandleState::Failed(_) => Err(AgentError::Unavailable(
                "agent initialization failed".into(),
            )),
            HandleState::Uninitialized | HandleState::Initializing => Err(
                AgentError::Unavailable("agent is still initializing".into()),
            ),
        }
    }

    /// Run `build` exactly once, no matter how many callers race here.
    /// Later calls (and calls after completion) return without building.
    pub async fn initialize<F, Fut>(&self, build: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ChatService, AgentError>>,
    {
        self.init
            .get_or_init(|| async {
                self.tx.send_replace(HandleState::Initializing);
                match build().await {
                    Ok(service) => {
                        tracing::info!("Agent initialized and ready");
                        self.tx.send_replace(HandleState::Ready(Arc::new(service)));
                    }
                    Err(e) => {
                        tracing::error!("Failed to initialize agent: {}", e);
                        self.tx.send_replace(HandleState::Failed(e.to_string()));
                    }
                }
            })
            .await;
    }
}

/// Connect to the MCP server, discover tools, and assemble the chat
/// service. The connection is released if any later step fails.
pub async fn build_service(
    config: &ServerConfig,
) -> Result<(ChatService, Arc<McpClient>), AgentError> {
    let client = Arc::new(
        McpClient::connect(&config.transport)
            .await
            .map_err(|e| AgentError::Connection(e.to_string()))?,
    );
    let info = client.server_info();
    tracing::info!("Connected to MCP server: {} v{}", info.name, info.version);

    match assemble(config, &client).await {
        Ok(service) => Ok((service, client)),
        Err(e) => {
            if let Err(close_err) = client.close().await {
                tracing::warn!("Failed to release MCP connection: {}", close_err);
            }
            Err(e)
        }
    }
}

async fn assemble(
    config: &ServerConfig,
    client: &Arc<McpClient>,
) -> Result<ChatService, AgentError> {
    let specs = discover_tools(client, &config.include_tools, &config.bound_args)
        .await
        .map_err(|e| AgentError::ToolDiscovery(e.to_string()))?;

    let mut registry = ToolRegistry::new();
    register_catalog(&mut registry, specs, client)?;
    tracing::info!("Registered {} tools:", registry.len());
    for name in registry.names() {
        tracing::info!("  • {}", name);
    }

    let provider = Arc::new(OpenAiProvider::from_config(config.llm.clone())?);

    // Advisory only; an unreachable backend fails turns, not startup.
    match provider.health_check().await {
        Ok(true) => tracing::info!("✓ LLM backend reachable at {}", config.llm.base_url),
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ LLM backend not reachable at {}", config.llm.base_url);
        }
    }

    let mut builder = AgentBuilder::new()
        .provider(provider)
        .tools(registry)
        .system_prompt(config.system_prompt.clone())
        .model(config.model_id.clone())
        .temperature(config.temperature)
        .max_iterations(config.max_iterations);
    if let Some(max_tokens) = config.max_tokens {
        builder = builder.max_tokens(max_tokens);
    }
    let agent = builder.build()?;

    let store = Arc::new(InMemorySessionStore::new());
    let service = ChatService::new(
        agent,
        store,
        Duration::from_secs(config.turn_timeout_secs),
    )
    .with_observer(Arc::new(TracingObserver));

    Ok(service)
}
