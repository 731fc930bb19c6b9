// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `gatehouse serve` command implementation.
//!
//! Wires the SQLite store, admission guard, violation recorder, tool
//! orchestrator, Anthropic provider, and generation pipeline into the
//! WebSocket gateway, then serves until SIGINT or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gatehouse_admission::{
    LimitSettings, RateLimitGuard, SettingsHandle, SystemClock, ViolationRecorder,
};
use gatehouse_agent::GenerationPipeline;
use gatehouse_config::model::GatehouseConfig;
use gatehouse_core::{CredentialValidator, GatehouseError, LimitConfigStore, UserId};
use gatehouse_gateway::{ConnectionRegistry, GatewayState, HealthState, start_server};
use gatehouse_provider::AnthropicProvider;
use gatehouse_storage::SqliteStore;
use gatehouse_tools::{HttpToolBackend, ToolOrchestrator, ToolRegistry};
use tracing::{error, info, warn};

/// Stand-in credential validator accepting tokens of the form `user:<id>`.
///
/// Gatehouse deployments sit behind an identity-aware proxy that mints
/// these tokens; anything else fails closed.
struct PrefixTokenValidator;

#[async_trait]
impl CredentialValidator for PrefixTokenValidator {
    async fn validate(&self, token: &str) -> Result<UserId, GatehouseError> {
        match token.strip_prefix("user:") {
            Some(id) if !id.is_empty() => Ok(UserId(id.to_string())),
            _ => Err(GatehouseError::AuthFailed(
                "unrecognized credential".to_string(),
            )),
        }
    }
}

/// Runs the `gatehouse serve` command.
pub async fn run_serve(config: GatehouseConfig) -> Result<(), GatehouseError> {
    init_tracing(&config.server.log_level);

    info!("starting gatehouse serve");

    // Prometheus exposition for the gateway /metrics endpoint.
    let prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>> =
        match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                info!("prometheus metrics recorder installed");
                Some(Arc::new(move || handle.render()))
            }
            Err(e) => {
                warn!(error = %e, "metrics recorder install failed, /metrics disabled");
                None
            }
        };

    let store = Arc::new(SqliteStore::open(&config.store).await?);
    info!(path = config.store.database_path.as_str(), "store opened");

    // Persisted limit document wins over config defaults; admin updates
    // land in the store, config only seeds a fresh database.
    let initial_settings = match store.load_limits().await? {
        Some(stored) => {
            info!(version = stored.version, "loaded persisted limit configuration");
            LimitSettings::from_stored(&stored)
        }
        None => {
            info!("no persisted limit configuration, using config defaults");
            LimitSettings {
                global: config.limits.as_limit_set(),
                overrides: Default::default(),
                whitelist: config.limits.whitelist.iter().cloned().collect(),
                version: 0,
            }
        }
    };
    let settings = Arc::new(SettingsHandle::new(initial_settings));

    let guard = Arc::new(RateLimitGuard::new(
        store.clone(),
        settings.clone(),
        Arc::new(SystemClock),
    ));

    let shutdown = crate::shutdown::install_signal_handler();

    let (recorder, recorder_handle) = ViolationRecorder::spawn(
        store.clone(),
        config.store.violation_queue_depth,
        shutdown.clone(),
    );

    let registry = Arc::new(ToolRegistry::from_config(&config.tools));
    info!(
        tools = registry.len(),
        servers = config.tools.servers.len(),
        "tool registry initialized"
    );
    let backend = Arc::new(HttpToolBackend::new(config.tools.servers.clone())?);
    let orchestrator = Arc::new(ToolOrchestrator::new(
        registry,
        backend,
        Duration::from_secs(config.tools.timeout_secs),
    ));

    let provider = {
        let p = AnthropicProvider::new(&config.provider).map_err(|e| {
            error!(error = %e, "failed to initialize Anthropic provider");
            eprintln!(
                "error: Anthropic API key required. Set provider.api_key or the ANTHROPIC_API_KEY env var."
            );
            e
        })?;
        Arc::new(p)
    };

    let pipeline = Arc::new(GenerationPipeline::new(
        provider,
        orchestrator,
        store.clone(),
        &config.provider,
        &config.generation,
    ));

    warn!(
        "credential validation uses the built-in user:<id> token scheme; \
         front the gateway with an identity-aware proxy in production"
    );

    let state = GatewayState {
        registry: Arc::new(ConnectionRegistry::new()),
        guard,
        recorder,
        pipeline,
        validator: Arc::new(PrefixTokenValidator),
        settings,
        limit_store: store.clone(),
        violations: store.clone(),
        health: HealthState {
            start_time: std::time::Instant::now(),
            prometheus_render,
        },
    };

    start_server(&config.server, state, shutdown.clone()).await?;

    // Flush queued violation records before exiting.
    shutdown.cancel();
    let _ = recorder_handle.await;

    info!("gatehouse serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gatehouse={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
