//! Skein server: wire the stack together and serve.

use std::sync::Arc;

use anyhow::Context;
use skein_api::{ApiConfig, AppState, router};
use skein_credential::{CredentialManager, EncryptionKey};
use skein_eventbus::Broadcaster;
use skein_handlers::HandlerRegistry;
use skein_orchestrator::{Orchestrator, OrchestratorStores};
use skein_storage::MemoryStore;
use skein_throttle::{RateLimiter, StreamLimiter};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `SKEIN_LOG` drives the filter; default to info for our crates.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SKEIN_LOG")
                .unwrap_or_else(|_| EnvFilter::new("info,skein=debug")),
        )
        .init();

    let config = Arc::new(ApiConfig::from_env().context("configuration")?);

    let store = Arc::new(MemoryStore::new());
    let registry = HandlerRegistry::builtin();
    let broadcaster = Arc::new(Broadcaster::new());
    let credentials = Arc::new(CredentialManager::new(
        store.clone(),
        store.clone(),
        EncryptionKey::derive(&config.credential_key),
    ));
    let orchestrator = Orchestrator::new(
        registry.clone(),
        broadcaster.clone(),
        OrchestratorStores {
            workflows: store.clone(),
            executions: store.clone(),
            hitl: store.clone(),
            events: store.clone(),
        },
        credentials.clone(),
    );

    let state = AppState {
        orchestrator,
        broadcaster,
        registry,
        workflows: store.clone(),
        executions: store.clone(),
        events: store,
        credentials,
        rate_limiter: Arc::new(RateLimiter::new()),
        stream_limiter: StreamLimiter::new(),
        config: config.clone(),
    };

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "skein server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("server")?;

    Ok(())
}
