// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool invocation with timeout and cancellation.
//!
//! The orchestrator is the only caller of the backend. Every invocation
//! gets its own timeout; cancelling the owning generation aborts the
//! invocation at its next await point. A tool failure is a value, not an
//! error: the model loop decides whether to retry, skip, or degrade.

use std::sync::Arc;
use std::time::Duration;

use gatehouse_core::ToolBackend;
use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::registry::ToolRegistry;

/// Outcome of one tool invocation.
#[derive(Debug)]
pub enum ToolOutcome {
    Completed(serde_json::Value),
    TimedOut,
    /// Unknown tool, transport failure, or a non-success reply.
    Failed(String),
    /// The owning generation was cancelled mid-invocation.
    Cancelled,
}

impl ToolOutcome {
    fn kind(&self) -> &'static str {
        match self {
            ToolOutcome::Completed(_) => "completed",
            ToolOutcome::TimedOut => "timed_out",
            ToolOutcome::Failed(_) => "failed",
            ToolOutcome::Cancelled => "cancelled",
        }
    }
}

pub struct ToolOrchestrator {
    registry: Arc<ToolRegistry>,
    backend: Arc<dyn ToolBackend>,
    timeout: Duration,
}

impl ToolOrchestrator {
    pub fn new(
        registry: Arc<ToolRegistry>,
        backend: Arc<dyn ToolBackend>,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            backend,
            timeout,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Invoke `tool_name` with `arguments`, bounded by the per-invocation
    /// timeout and the caller's cancellation token.
    pub async fn invoke(
        &self,
        tool_name: &str,
        arguments: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> ToolOutcome {
        let outcome = self.invoke_inner(tool_name, arguments, cancel).await;
        counter!(
            "gatehouse_tool_invocations_total",
            "tool" => tool_name.to_string(),
            "outcome" => outcome.kind(),
        )
        .increment(1);
        outcome
    }

    async fn invoke_inner(
        &self,
        tool_name: &str,
        arguments: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> ToolOutcome {
        let Some(spec) = self.registry.get(tool_name) else {
            warn!(tool = tool_name, "unknown tool requested by model");
            return ToolOutcome::Failed(format!("unknown tool `{tool_name}`"));
        };

        let call = self.backend.invoke(spec.server, spec.name, arguments);
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(tool = tool_name, "tool invocation cancelled");
                ToolOutcome::Cancelled
            }
            result = tokio::time::timeout(self.timeout, call) => match result {
                Ok(Ok(value)) => ToolOutcome::Completed(value),
                Ok(Err(e)) => {
                    warn!(tool = tool_name, error = %e, "tool invocation failed");
                    ToolOutcome::Failed(e.to_string())
                }
                Err(_) => {
                    warn!(tool = tool_name, timeout_secs = self.timeout.as_secs(),
                        "tool invocation timed out");
                    ToolOutcome::TimedOut
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gatehouse_config::model::ToolsConfig;
    use gatehouse_core::GatehouseError;
    use serde_json::json;

    /// Backend scripted per test: either answers after a delay or fails.
    struct ScriptedBackend {
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl ToolBackend for ScriptedBackend {
        async fn invoke(
            &self,
            _server: &str,
            tool: &str,
            _arguments: &serde_json::Value,
        ) -> Result<serde_json::Value, GatehouseError> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(GatehouseError::Tool {
                    message: format!("tool `{tool}` exploded"),
                    source: None,
                });
            }
            Ok(json!({"tool": tool}))
        }
    }

    fn orchestrator(delay: Duration, fail: bool, timeout: Duration) -> ToolOrchestrator {
        ToolOrchestrator::new(
            Arc::new(ToolRegistry::from_config(&ToolsConfig::default())),
            Arc::new(ScriptedBackend { delay, fail }),
            timeout,
        )
    }

    #[tokio::test]
    async fn completes_within_timeout() {
        let orch = orchestrator(Duration::ZERO, false, Duration::from_secs(5));
        let outcome = orch
            .invoke("get_stock_info", &json!({"symbol": "X"}), &CancellationToken::new())
            .await;
        match outcome {
            ToolOutcome::Completed(v) => assert_eq!(v["tool"], "get_stock_info"),
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_fails_without_calling_backend() {
        let orch = orchestrator(Duration::ZERO, false, Duration::from_secs(5));
        let outcome = orch
            .invoke("summon_dragon", &json!({}), &CancellationToken::new())
            .await;
        match outcome {
            ToolOutcome::Failed(msg) => assert!(msg.contains("summon_dragon")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out() {
        let orch = orchestrator(Duration::from_secs(120), false, Duration::from_secs(60));
        let outcome = orch
            .invoke("get_stock_info", &json!({}), &CancellationToken::new())
            .await;
        assert!(matches!(outcome, ToolOutcome::TimedOut));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_invocation() {
        let orch = orchestrator(Duration::from_secs(30), false, Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            child.cancel();
        });
        let outcome = orch.invoke("get_stock_info", &json!({}), &cancel).await;
        assert!(matches!(outcome, ToolOutcome::Cancelled));
    }

    #[tokio::test]
    async fn backend_error_is_failed() {
        let orch = orchestrator(Duration::ZERO, true, Duration::from_secs(5));
        let outcome = orch
            .invoke("get_stock_info", &json!({}), &CancellationToken::new())
            .await;
        match outcome {
            ToolOutcome::Failed(msg) => assert!(msg.contains("exploded")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
