//! Gateway HTTP server: Signal webhook intake, health, and graceful shutdown.

use crate::channels::{parse_webhook, IgnoreReason, Intake, SignalChannel};
use crate::config::{self, BackendKind, Config};
use crate::history::ConversationStore;
use crate::llm::{AnythingLlmClient, ChatBackend, LiteLlmClient};
use crate::relay::Relay;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Shared state for the gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// The bridge's own Signal number; deliveries from it are our own replies echoed back.
    pub own_number: String,
    pub bot_name: String,
    pub relay: Arc<Relay>,
}

/// Build gateway state from config: AI backend, Signal channel, history store, relay.
/// Fails when required settings are missing.
pub fn build_state(config: &Config) -> Result<GatewayState> {
    config::validate(config)?;
    let own_number = config::resolve_phone_number(config).context("signal phone number")?;
    let history = Arc::new(ConversationStore::new(config.features.history_limit));
    let timeout = Duration::from_secs(config.bot.timeout_seconds);

    let backend: Arc<dyn ChatBackend> = match config.backend {
        BackendKind::AnythingLlm => {
            let api_key = config::resolve_api_key(config).context("anythingllm api key")?;
            let workspace = config
                .anythingllm
                .workspace_slug
                .as_deref()
                .map(str::trim)
                .unwrap_or_default();
            Arc::new(AnythingLlmClient::new(
                &config.anythingllm.api_url,
                api_key,
                workspace,
                config.anythingllm.mode,
                config.anythingllm.session_prefix.clone(),
                timeout,
            ))
        }
        BackendKind::LiteLlm => {
            let api_key = config::resolve_litellm_api_key(config).context("litellm api key")?;
            Arc::new(LiteLlmClient::new(
                &config.litellm.api_url,
                api_key,
                config.litellm.model.trim(),
                config.litellm.max_tokens,
                history.clone(),
                timeout,
            ))
        }
    };
    let channel = SignalChannel::new(
        &config.signal.api_url,
        own_number.clone(),
        config.bot.max_message_length,
        Duration::from_secs(config.signal.send_timeout_seconds),
    );
    let relay = Relay::new(
        backend,
        Arc::new(channel),
        history,
        config.bot.error_message.clone(),
        config.bot.max_concurrent_turns,
    );
    Ok(GatewayState {
        own_number,
        bot_name: config.bot.name.clone(),
        relay: Arc::new(relay),
    })
}

/// Routes: `POST /webhook` (and `/webhook/signal`), `GET /health`, `GET /`.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(status_http))
        .route("/health", get(health_http))
        .route("/webhook", post(signal_webhook))
        .route("/webhook/signal", post(signal_webhook))
        .with_state(state)
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Blocks until shutdown (SIGINT or SIGTERM), then waits up to
/// `gateway.shutdownGraceSeconds` for in-flight replies.
pub async fn run_gateway(config: Config) -> Result<()> {
    let state = build_state(&config)?;
    let relay = state.relay.clone();

    log::info!("starting {}", config.bot.name);
    log::info!("signal api: {}", config.signal.api_url);
    match config.backend {
        BackendKind::AnythingLlm => {
            log::info!("anythingllm: {}", config.anythingllm.api_url);
            log::info!(
                "workspace: {} (mode {})",
                config.anythingllm.workspace_slug.as_deref().unwrap_or_default(),
                config.anythingllm.mode.as_str()
            );
        }
        BackendKind::LiteLlm => {
            log::info!("litellm: {} (model {})", config.litellm.api_url, config.litellm.model);
        }
    }

    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;

    let grace = Duration::from_secs(config.gateway.shutdown_grace_seconds);
    if relay.drain(grace).await {
        log::info!("in-flight replies finished");
    } else {
        log::warn!(
            "{} reply task(s) still running after {:?}; abandoning",
            relay.in_flight(),
            grace
        );
    }
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, no longer accepting webhooks");
}

fn received() -> Response {
    Json(json!({ "status": "received" })).into_response()
}

/// POST /webhook — Signal REST API delivery. Acknowledges at once; relaying happens in the background.
async fn signal_webhook(State(state): State<GatewayState>, body: Bytes) -> Response {
    log::debug!(
        "received webhook: {}",
        crate::preview(&String::from_utf8_lossy(&body), 200)
    );
    let now_ms = chrono::Utc::now().timestamp_millis();
    match parse_webhook(&body, &state.own_number, now_ms) {
        Ok(Intake::Accepted(msg)) => {
            log::info!("message from {}: {}", msg.sender, crate::preview(&msg.text, 100));
            state.relay.spawn(msg);
            received()
        }
        Ok(Intake::Ignored(IgnoreReason::SelfEcho)) => {
            log::debug!("ignoring our own message");
            received()
        }
        Ok(Intake::Ignored(reason)) => {
            log::debug!("ignoring webhook without sender or text: {:?}", reason);
            received()
        }
        Err(e) => {
            log::error!("error handling webhook: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /health — liveness probe.
async fn health_http() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

/// GET / — name, version, and a little runtime detail.
async fn status_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "running",
        "name": state.bot_name,
        "version": env!("CARGO_PKG_VERSION"),
        "inFlight": state.relay.in_flight(),
        "conversations": state.relay.history().sender_count().await,
    }))
}
