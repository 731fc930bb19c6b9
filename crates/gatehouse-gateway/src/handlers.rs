// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unauthenticated public endpoints: health and Prometheus metrics.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::server::GatewayState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_connections: usize,
}

/// Error body shared by the REST handlers.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: gatehouse_core::VERSION.to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        active_connections: state.registry.len(),
    })
}

/// GET /metrics (Prometheus exposition)
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match state.health.prometheus_render {
        Some(ref render) => (StatusCode::OK, render()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            "metrics recorder not installed\n",
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_serializes() {
        let resp = HealthResponse {
            status: "ok".to_string(),
            version: "0.1.0".to_string(),
            uptime_secs: 42,
            active_connections: 3,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"active_connections\":3"));
    }

    #[test]
    fn error_response_serializes() {
        let resp = ErrorResponse {
            error: "nope".to_string(),
        };
        assert!(serde_json::to_string(&resp).unwrap().contains("nope"));
    }
}
