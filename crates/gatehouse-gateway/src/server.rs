// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server assembly: shared state, routes, middleware, bind/serve.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, post, put},
};
use gatehouse_admission::{RateLimitGuard, SettingsHandle, ViolationRecorder};
use gatehouse_agent::GenerationPipeline;
use gatehouse_config::model::ServerConfig;
use gatehouse_core::{CredentialValidator, GatehouseError, LimitConfigStore, ViolationSink};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::admin;
use crate::auth::{AdminAuth, admin_middleware};
use crate::handlers;
use crate::registry::ConnectionRegistry;
use crate::ws;

/// State for the unauthenticated health/metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    pub start_time: std::time::Instant,
    /// Prometheus exposition render function, if a recorder is installed.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Shared state for every gateway handler.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<ConnectionRegistry>,
    pub guard: Arc<RateLimitGuard>,
    pub recorder: ViolationRecorder,
    pub pipeline: Arc<GenerationPipeline>,
    pub validator: Arc<dyn CredentialValidator>,
    pub settings: Arc<SettingsHandle>,
    pub limit_store: Arc<dyn LimitConfigStore>,
    pub violations: Arc<dyn ViolationSink>,
    pub health: HealthState,
}

/// Assemble the full route tree.
pub fn build_router(state: GatewayState, admin_auth: AdminAuth) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route("/admin/limits", get(admin::get_limits).put(admin::put_limits))
        .route("/admin/users/{user_id}/limits", put(admin::put_user_limits))
        .route(
            "/admin/users/{user_id}/whitelist",
            post(admin::post_whitelist).delete(admin::delete_whitelist),
        )
        .route("/admin/users/{user_id}/reset", post(admin::post_reset))
        .route("/admin/users/{user_id}/usage", get(admin::get_user_usage))
        .route("/admin/violations", get(admin::get_violations))
        .route_layer(axum_middleware::from_fn_with_state(
            admin_auth,
            admin_middleware,
        ))
        .with_state(state.clone());

    // WS auth happens during the handshake, not via middleware.
    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .merge(ws_routes)
        .layer(CorsLayer::permissive())
}

/// Bind and serve until the shutdown token fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), GatehouseError> {
    let admin_auth = AdminAuth {
        token: config.admin_token.clone(),
    };
    let app = build_router(state, admin_auth);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| GatehouseError::Internal(format!("failed to bind {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.cancelled_owned())
    .await
    .map_err(|e| GatehouseError::Internal(format!("gateway server error: {e}")))
}
