//! Selkie server entry point
//!
//! Wires configuration, telemetry, the memory system, session store,
//! delivery queue, channel bus and supervisor agent together, then serves
//! the WebSocket JSON-RPC gateway.
//!
//! Exit codes: 0 normal shutdown, 1 fatal initialization error, 2 listener
//! failure.

use clap::Parser;
use selkie_agent::SupervisorAgent;
use selkie_bus::MessageBus;
use selkie_core::config::SelkieConfig;
use selkie_core::metrics::Metrics;
use selkie_core::telemetry::init_telemetry;
use selkie_llm::{HttpLlmAdapter, LlmAdapter};
use selkie_memory::{Embedder, HttpEmbedder, MemorySystem, MemorySystemConfig, MockEmbedder};
use selkie_queue::{DeliveryQueue, DeliveryWorker};
use selkie_server::{router, AppState};
use selkie_session::SessionStore;
use selkie_tools::builtin::{
    register_memory_tools, register_search_tools, register_task_tools, TaskStore,
};
use selkie_tools::ToolRegistry;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/// Default identity preamble when no personality file is configured
const SYSTEM_PROMPT_DEFAULT: &str = "You are a personal assistant: friendly, efficient and \
reliable. Use the available tools to manage tasks and memory. When the user asks to remove or \
clear something, use the matching destructive tool rather than only listing items.";

/// Selkie assistant gateway
#[derive(Parser, Debug)]
#[command(name = "selkie-server")]
#[command(about = "Personal AI assistant gateway (WebSocket JSON-RPC)")]
#[command(version)]
struct Cli {
    /// Bind host (overrides GATEWAY_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides GATEWAY_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Data directory (overrides DATA_DIR)
    #[arg(long)]
    data_dir: Option<String>,

    /// Increase log verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_telemetry(cli.verbose);

    let mut config = SelkieConfig::from_env();
    if let Some(host) = cli.host {
        config.gateway.host = host;
    }
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir.into();
    }

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "invalid configuration");
        return ExitCode::from(1);
    }

    match run(config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "fatal error");
            ExitCode::from(1)
        }
    }
}

async fn run(config: SelkieConfig) -> anyhow::Result<ExitCode> {
    let config = Arc::new(config);
    let metrics = Metrics::new_shared();

    // Data directory must be writable; anything else is fatal
    std::fs::create_dir_all(&config.data_dir)
        .map_err(|e| anyhow::anyhow!("cannot create data dir {}: {}", config.data_dir.display(), e))?;

    // LLM adapter: no provider at all is fatal at startup
    let llm: Arc<dyn LlmAdapter> = match HttpLlmAdapter::from_env() {
        Some(adapter) => Arc::new(adapter),
        None => {
            anyhow::bail!(
                "no LLM provider configured; set LLM_API_KEY (and LLM_PROVIDER/LLM_MODEL/LLM_BASE_URL)"
            );
        }
    };

    // Embedder: HTTP when configured, deterministic local fallback otherwise
    let embedder: Arc<dyn Embedder> = match HttpEmbedder::from_env() {
        Some(embedder) => Arc::new(embedder),
        None => {
            tracing::warn!(
                "no embedding provider configured; using deterministic hash embedder, \
                 keyword recall will dominate"
            );
            Arc::new(MockEmbedder::default_384())
        }
    };

    // Memory system degrades to file-only fallback internally
    let memory = Arc::new(MemorySystem::open(
        MemorySystemConfig::with_settings(config.memories_dir(), &config.memory),
        embedder,
        None,
        metrics.clone(),
    )?);

    let sessions = Arc::new(SessionStore::open(config.sessions_dir())?);

    // Delivery queue: recover pending deliveries from a previous run
    let queue = Arc::new(DeliveryQueue::open(config.queue_dir())?);
    let recovered = queue.recover()?;
    if !recovered.is_empty() {
        tracing::info!(pending = recovered.len(), "recovered pending deliveries");
    }

    let bus = Arc::new(MessageBus::new(queue.clone(), metrics.clone()));

    // Tools
    let tools = Arc::new(ToolRegistry::new());
    let tasks = Arc::new(
        TaskStore::open(config.tasks_path())
            .map_err(|e| anyhow::anyhow!("task store: {}", e))?,
    );
    register_task_tools(&tools, tasks)
        .await
        .map_err(|e| anyhow::anyhow!("register task tools: {}", e))?;
    register_memory_tools(&tools, memory.clone())
        .await
        .map_err(|e| anyhow::anyhow!("register memory tools: {}", e))?;
    register_search_tools(&tools)
        .await
        .map_err(|e| anyhow::anyhow!("register search tools: {}", e))?;

    let agent = Arc::new(SupervisorAgent::new(
        llm,
        tools,
        memory.clone(),
        sessions.clone(),
        SYSTEM_PROMPT_DEFAULT,
        config.agent.clone(),
        config.memory.clone(),
        metrics.clone(),
    ));

    // Maintenance runs in the background on a slow cadence: memory
    // consolidation plus archiving of idle sessions
    let maintenance_memory = memory.clone();
    let maintenance_sessions = sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(6 * 60 * 60));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await; // skip the immediate first tick
        loop {
            interval.tick().await;
            match maintenance_memory.consolidate().await {
                Ok(stats) => tracing::info!(
                    summaries = stats.summaries_created,
                    forgotten = stats.forgotten,
                    "scheduled consolidation finished"
                ),
                Err(e) => tracing::warn!(error = %e, "scheduled consolidation failed"),
            }
            match maintenance_sessions
                .archive_old_sessions(selkie_core::SESSION_ARCHIVE_AGE_DAYS_DEFAULT)
                .await
            {
                Ok(0) => {}
                Ok(archived) => tracing::info!(archived, "archived idle sessions"),
                Err(e) => tracing::warn!(error = %e, "session archiving failed"),
            }
        }
    });

    // Delivery worker; channel adapters register their senders on the bus
    // and the worker as they start
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let worker = DeliveryWorker::new(
        queue.clone(),
        Duration::from_millis(config.queue.scan_interval_ms),
        metrics.clone(),
    );
    let worker_handle = tokio::spawn(async move {
        worker.run(shutdown_rx).await;
    });

    let state = AppState::new(
        config.clone(),
        agent,
        sessions,
        memory,
        bus,
        metrics,
    );

    let bind = config.gateway.bind_address();
    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(bind = %bind, error = %e, "cannot bind listener");
            return Ok(ExitCode::from(2));
        }
    };

    tracing::info!(
        bind = %bind,
        auth = state.auth.is_enabled(),
        data_dir = %config.data_dir.display(),
        "selkie gateway listening"
    );

    let app = router(state);
    let serve = axum::serve(listener, app).with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    });

    let result = serve.await;

    let _ = shutdown_tx.send(true);
    let _ = worker_handle.await;

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            tracing::error!(error = %e, "listener error");
            Ok(ExitCode::from(2))
        }
    }
}
