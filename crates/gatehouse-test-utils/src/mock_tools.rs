// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock tool backend with per-tool canned results.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use gatehouse_core::{GatehouseError, ToolBackend};
use serde_json::json;

/// Canned behavior for one tool name.
#[derive(Debug, Clone)]
pub enum ToolScript {
    Respond(serde_json::Value),
    Fail(String),
    /// Sleep this long before responding; lets tests trigger the
    /// orchestrator timeout.
    Hang(Duration),
}

pub struct MockToolBackend {
    scripts: Mutex<HashMap<String, ToolScript>>,
    invocations: Mutex<Vec<(String, serde_json::Value)>>,
}

impl MockToolBackend {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn script(&self, tool: &str, script: ToolScript) {
        self.scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(tool.to_string(), script);
    }

    /// (tool name, arguments) pairs, in invocation order.
    pub fn invocations(&self) -> Vec<(String, serde_json::Value)> {
        self.invocations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for MockToolBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolBackend for MockToolBackend {
    async fn invoke(
        &self,
        _server: &str,
        tool: &str,
        arguments: &serde_json::Value,
    ) -> Result<serde_json::Value, GatehouseError> {
        self.invocations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((tool.to_string(), arguments.clone()));

        let script = self
            .scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(tool)
            .cloned();
        match script {
            Some(ToolScript::Respond(value)) => Ok(value),
            Some(ToolScript::Fail(message)) => Err(GatehouseError::Tool {
                message,
                source: None,
            }),
            Some(ToolScript::Hang(duration)) => {
                tokio::time::sleep(duration).await;
                Ok(json!({"late": true}))
            }
            // Unscripted tools echo their name, like a permissive server.
            None => Ok(json!({"tool": tool, "ok": true})),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_result_and_failure() {
        let backend = MockToolBackend::new();
        backend.script("get_stock_info", ToolScript::Respond(json!({"price": 1.0})));
        backend.script("get_news_sentiment", ToolScript::Fail("down".into()));

        let ok = backend
            .invoke("financial-data", "get_stock_info", &json!({}))
            .await
            .unwrap();
        assert_eq!(ok["price"], 1.0);

        let err = backend
            .invoke("news-sentiment", "get_news_sentiment", &json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("down"));

        assert_eq!(backend.invocations().len(), 2);
    }
}
