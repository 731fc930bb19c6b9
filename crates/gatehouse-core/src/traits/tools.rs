// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;

use crate::error::GatehouseError;

/// Transport for tool invocations against the capability servers.
///
/// The orchestrator owns timeouts and cancellation; a backend call may run
/// arbitrarily long and is abandoned (not interrupted) when its caller
/// times out.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    /// Invoke `tool` on `server` with the model-supplied arguments.
    async fn invoke(
        &self,
        server: &str,
        tool: &str,
        arguments: &serde_json::Value,
    ) -> Result<serde_json::Value, GatehouseError>;
}
