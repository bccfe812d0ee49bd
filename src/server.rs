use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use tracing::info;

use crate::AppState;
use crate::agent::ConversationOrchestrator;
use crate::api;
use crate::config::{AppConfig, SessionConfig};
use crate::llm::{ChatCompletionsDriver, LlmDriver, LlmSettings, OfflineDriver};
use crate::mcp::{McpServer, ToolDispatcher};
use crate::school::{InMemorySchoolStore, SchoolStore, SchoolToolbox};
use crate::session::SessionStore;

/// Driver for the configured provider, or the offline driver when none is set.
pub fn select_driver(settings: Option<LlmSettings>) -> Arc<dyn LlmDriver> {
    match settings {
        Some(settings) => {
            info!(
                name: "llm.config.loaded",
                base_url = %settings.base_url,
                model = %settings.model,
                "LLM configuration loaded"
            );
            Arc::new(ChatCompletionsDriver::new(settings))
        }
        None => {
            tracing::warn!(
                "No model provider configured (set LLM_BASE_URL, LLM_MODEL, LLM_API_KEY); using offline replies"
            );
            Arc::new(OfflineDriver)
        }
    }
}

/// Wire the store, orchestrator, and protocol server together.
pub fn build_state(
    config: Arc<AppConfig>,
    driver: Arc<dyn LlmDriver>,
    store: Arc<dyn SchoolStore>,
) -> AppState {
    let sessions = SessionStore::with_capacity_limit(config.sessions.max_sessions);
    let agent = Arc::new(
        ConversationOrchestrator::new(driver, SchoolToolbox::new(store), sessions)
            .with_turn_timeout(config.llm.request_timeout()),
    );
    let mcp = Arc::new(McpServer::new(ToolDispatcher::new(Arc::clone(&agent))));

    AppState { agent, mcp, config }
}

/// Routes plus tracing, CORS, body limit, and request timeout layers.
pub fn build_router(state: AppState) -> Router {
    let timeout_duration = Duration::from_secs(state.config.server.request_timeout_secs);
    let body_limit = state.config.server.body_limit_bytes;

    api::router()
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| {
                let duration = timeout_duration;
                async move {
                    match tokio::time::timeout(duration, next.run(req)).await {
                        Ok(res) => res,
                        Err(_) => {
                            (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response()
                        }
                    }
                }
            },
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Periodically drop idle sessions. Returns `None` when idle eviction is off.
pub fn spawn_session_sweeper(sessions: SessionStore, config: &SessionConfig) -> Option<JoinHandle<()>> {
    let idle_timeout = config.idle_timeout()?;
    let mut ticker = tokio::time::interval(config.sweep_interval());

    Some(tokio::spawn(async move {
        loop {
            ticker.tick().await;
            let removed = sessions.cleanup_idle(idle_timeout);
            if removed > 0 {
                info!(
                    name: "sessions.swept",
                    removed,
                    remaining = sessions.len(),
                    "Idle sessions removed"
                );
            }
        }
    }))
}

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>, settings: Option<LlmSettings>) -> anyhow::Result<()> {
    let store = Arc::new(InMemorySchoolStore::seeded());
    let counts = store.counts().await?;
    info!(
        students = counts.students,
        courses = counts.courses,
        homework = counts.homework,
        "School data loaded"
    );

    let state = build_state(Arc::clone(&config), select_driver(settings), store);
    let sweeper = spawn_session_sweeper(state.agent.sessions().clone(), &config.sessions);
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    info!(name: "server.stopped", "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
