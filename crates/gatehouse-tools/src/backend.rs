// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP JSON transport for the capability servers.
//!
//! Each tool call is a `POST {base}/tools/{tool}` with the model-supplied
//! arguments as the JSON body; the server replies with an opaque JSON
//! result that flows back to the model unchanged.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use gatehouse_core::{GatehouseError, ToolBackend};
use tracing::debug;

pub struct HttpToolBackend {
    client: reqwest::Client,
    servers: HashMap<String, String>,
}

impl HttpToolBackend {
    /// `servers` maps server name to base URL, from config.
    pub fn new(servers: HashMap<String, String>) -> Result<Self, GatehouseError> {
        // No request timeout here; the orchestrator bounds each invocation.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GatehouseError::Tool {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self { client, servers })
    }
}

#[async_trait]
impl ToolBackend for HttpToolBackend {
    async fn invoke(
        &self,
        server: &str,
        tool: &str,
        arguments: &serde_json::Value,
    ) -> Result<serde_json::Value, GatehouseError> {
        let base = self.servers.get(server).ok_or_else(|| GatehouseError::Tool {
            message: format!("no base URL configured for server `{server}`"),
            source: None,
        })?;
        let url = format!("{}/tools/{tool}", base.trim_end_matches('/'));
        debug!(%url, tool, "invoking tool");

        let response = self
            .client
            .post(&url)
            .json(arguments)
            .send()
            .await
            .map_err(|e| GatehouseError::Tool {
                message: format!("tool `{tool}` request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatehouseError::Tool {
                message: format!("tool `{tool}` returned {status}: {body}"),
                source: None,
            });
        }

        response.json().await.map_err(|e| GatehouseError::Tool {
            message: format!("tool `{tool}` returned invalid JSON: {e}"),
            source: Some(Box::new(e)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(server: &MockServer) -> HttpToolBackend {
        let servers =
            HashMap::from([("financial-data".to_string(), server.uri())]);
        HttpToolBackend::new(servers).unwrap()
    }

    #[tokio::test]
    async fn posts_arguments_and_returns_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tools/get_stock_info"))
            .and(body_json(json!({"symbol": "RELIANCE"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"price": 2843.5})),
            )
            .mount(&server)
            .await;

        let backend = backend_for(&server);
        let result = backend
            .invoke("financial-data", "get_stock_info", &json!({"symbol": "RELIANCE"}))
            .await
            .unwrap();
        assert_eq!(result["price"], 2843.5);
    }

    #[tokio::test]
    async fn server_error_is_a_tool_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let backend = backend_for(&server);
        let err = backend
            .invoke("financial-data", "get_stock_info", &json!({"symbol": "X"}))
            .await
            .unwrap_err();
        assert!(matches!(err, GatehouseError::Tool { .. }));
        assert!(err.to_string().contains("500"), "got: {err}");
    }

    #[tokio::test]
    async fn unknown_server_is_a_tool_error() {
        let backend = HttpToolBackend::new(HashMap::new()).unwrap();
        let err = backend
            .invoke("financial-data", "get_stock_info", &json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("financial-data"), "got: {err}");
    }
}
