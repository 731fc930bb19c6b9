// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streaming Anthropic Messages API provider.
//!
//! Implements the core [`ModelProvider`] seam: a [`gatehouse_core::ChatRequest`]
//! goes out as a streaming Messages API call, and the SSE events come back
//! as decoded [`ProviderChunk`]s. Tool-call input JSON arrives as partial
//! deltas and is accumulated per content block; the complete call is
//! emitted once when its block stops.

pub mod client;
pub mod sse;
pub mod types;

use std::collections::HashMap;

use async_trait::async_trait;
use futures::StreamExt;
use gatehouse_config::model::ProviderConfig;
use gatehouse_core::types::{
    ChatMessage, ChatRequest, ContentPart, ProviderChunk, TokenUsage,
};
use gatehouse_core::{ChunkStream, GatehouseError, ModelProvider};

use crate::client::ProviderClient;
use crate::sse::SseEvent;
use crate::types::{ApiContent, ApiContentBlock, ApiMessage, MessageRequest, ResponseContentBlock};

pub struct AnthropicProvider {
    client: ProviderClient,
}

impl AnthropicProvider {
    /// Build a provider from config. The API key comes from the config
    /// file or, failing that, the `ANTHROPIC_API_KEY` environment variable.
    pub fn new(config: &ProviderConfig) -> Result<Self, GatehouseError> {
        let api_key = resolve_api_key(&config.api_key)?;
        let client = ProviderClient::new(&api_key, &config.api_version)?;
        Ok(Self { client })
    }

    /// Build a provider around an existing client (tests).
    pub fn with_client(client: ProviderClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    async fn stream(&self, request: ChatRequest) -> Result<ChunkStream, GatehouseError> {
        let api_request = to_message_request(&request);
        let event_stream = self.client.stream_message(&api_request).await?;

        // Stateful stream that accumulates tool_use JSON across deltas.
        // Key: content block index -> (tool_use_id, tool_name, accumulated_json)
        let mut tool_use_blocks: HashMap<usize, (String, String, String)> = HashMap::new();
        let mut stop_reason: Option<String> = None;

        let chunk_stream = event_stream.filter_map(move |result| {
            let chunk = match result {
                Ok(event) => map_sse_event(event, &mut tool_use_blocks, &mut stop_reason),
                Err(e) => Some(Err(e)),
            };
            async move { chunk }
        });

        Ok(Box::pin(chunk_stream))
    }
}

/// Convert the provider-neutral request into the Messages API shape.
fn to_message_request(request: &ChatRequest) -> MessageRequest {
    MessageRequest {
        model: request.model.clone(),
        messages: request.messages.iter().map(to_api_message).collect(),
        system: request.system.clone(),
        max_tokens: request.max_tokens,
        stream: true,
        tools: if request.tools.is_empty() {
            None
        } else {
            Some(request.tools.clone())
        },
    }
}

fn to_api_message(message: &ChatMessage) -> ApiMessage {
    // A single text part collapses to the plain-string form.
    let content = match message.content.as_slice() {
        [ContentPart::Text { text }] => ApiContent::Text(text.clone()),
        parts => ApiContent::Blocks(parts.iter().map(to_api_block).collect()),
    };
    ApiMessage {
        role: message.role.to_string(),
        content,
    }
}

fn to_api_block(part: &ContentPart) -> ApiContentBlock {
    match part {
        ContentPart::Text { text } => ApiContentBlock::Text { text: text.clone() },
        ContentPart::ToolUse { id, name, input } => ApiContentBlock::ToolUse {
            id: id.clone(),
            name: name.clone(),
            input: input.clone(),
        },
        ContentPart::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => ApiContentBlock::ToolResult {
            tool_use_id: tool_use_id.clone(),
            content: content.clone(),
            is_error: if *is_error { Some(true) } else { None },
        },
    }
}

/// Map one SSE event to a [`ProviderChunk`], accumulating tool_use input
/// JSON until the owning block stops.
fn map_sse_event(
    event: SseEvent,
    tool_use_blocks: &mut HashMap<usize, (String, String, String)>,
    stop_reason: &mut Option<String>,
) -> Option<Result<ProviderChunk, GatehouseError>> {
    match event {
        SseEvent::ContentBlockStart(cbs) => {
            if let ResponseContentBlock::ToolUse { id, name, .. } = &cbs.content_block {
                tool_use_blocks.insert(cbs.index, (id.clone(), name.clone(), String::new()));
            }
            None
        }
        SseEvent::ContentBlockDelta(delta) => match delta.delta {
            types::SseDelta::TextDelta { text } => Some(Ok(ProviderChunk::TextDelta(text))),
            types::SseDelta::InputJsonDelta { partial_json } => {
                if let Some((_id, _name, json)) = tool_use_blocks.get_mut(&delta.index) {
                    json.push_str(&partial_json);
                }
                None
            }
        },
        SseEvent::ContentBlockStop(cbs) => {
            let (id, name, json_str) = tool_use_blocks.remove(&cbs.index)?;
            let arguments = if json_str.is_empty() {
                serde_json::Value::Object(serde_json::Map::new())
            } else {
                match serde_json::from_str(&json_str) {
                    Ok(v) => v,
                    Err(e) => {
                        return Some(Err(GatehouseError::Provider {
                            message: format!("malformed tool_use input JSON for `{name}`: {e}"),
                            source: Some(Box::new(e)),
                        }));
                    }
                }
            };
            Some(Ok(ProviderChunk::ToolCall {
                id,
                name,
                arguments,
            }))
        }
        SseEvent::MessageStart(ms) => Some(Ok(ProviderChunk::Usage(TokenUsage {
            input_tokens: ms.message.usage.input_tokens,
            output_tokens: ms.message.usage.output_tokens,
        }))),
        SseEvent::MessageDelta(md) => {
            if let Some(ref reason) = md.delta.stop_reason {
                *stop_reason = Some(reason.clone());
            }
            md.usage.map(|u| {
                Ok(ProviderChunk::Usage(TokenUsage {
                    input_tokens: u.input_tokens,
                    output_tokens: u.output_tokens,
                }))
            })
        }
        SseEvent::MessageStop => Some(Ok(ProviderChunk::Stop {
            stop_reason: stop_reason.take(),
        })),
        SseEvent::Error(err) => Some(Err(GatehouseError::Provider {
            message: format!("{}: {}", err.error.type_, err.error.message),
            source: None,
        })),
        // Keep-alive; no user-facing output.
        SseEvent::Ping => None,
    }
}

/// Resolve the API key from config or environment.
fn resolve_api_key(config_key: &Option<String>) -> Result<String, GatehouseError> {
    if let Some(key) = config_key
        && !key.trim().is_empty()
    {
        return Ok(key.clone());
    }
    std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
        GatehouseError::Config(
            "no provider API key: set provider.api_key or ANTHROPIC_API_KEY".to_string(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::types::Role;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ChatRequest {
        ChatRequest {
            model: "claude-sonnet-4-20250514".into(),
            messages: vec![ChatMessage::text(Role::User, "price of ACME?")],
            system: Some("You are a markets assistant.".into()),
            max_tokens: 1024,
            tools: vec![],
        }
    }

    async fn provider_for(server: &MockServer) -> AnthropicProvider {
        let client = ProviderClient::new("test-key", "2023-06-01")
            .unwrap()
            .with_base_url(server.uri());
        AnthropicProvider::with_client(client)
    }

    async fn collect(provider: &AnthropicProvider) -> Vec<Result<ProviderChunk, GatehouseError>> {
        let mut stream = provider.stream(request()).await.unwrap();
        let mut chunks = Vec::new();
        while let Some(item) = stream.next().await {
            chunks.push(item);
        }
        chunks
    }

    #[tokio::test]
    async fn text_stream_maps_to_deltas_and_stop() {
        let server = MockServer::start().await;
        let sse = concat!(
            "event: message_start\n",
            "data: {\"message\":{\"id\":\"msg_1\",\"type\":\"message\",\"role\":\"assistant\",\"content\":[],\"model\":\"m\",\"stop_reason\":null,\"usage\":{\"input_tokens\":12,\"output_tokens\":0}}}\n\n",
            "event: content_block_delta\n",
            "data: {\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"AC\"}}\n\n",
            "event: content_block_delta\n",
            "data: {\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"ME\"}}\n\n",
            "event: message_delta\n",
            "data: {\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"input_tokens\":12,\"output_tokens\":4}}\n\n",
            "event: message_stop\n",
            "data: {}\n\n",
        );
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let chunks: Vec<_> = collect(&provider).await.into_iter().map(|c| c.unwrap()).collect();

        assert!(matches!(chunks[0], ProviderChunk::Usage(_)));
        assert_eq!(chunks[1], ProviderChunk::TextDelta("AC".into()));
        assert_eq!(chunks[2], ProviderChunk::TextDelta("ME".into()));
        assert!(matches!(chunks[3], ProviderChunk::Usage(u) if u.output_tokens == 4));
        assert_eq!(
            chunks[4],
            ProviderChunk::Stop {
                stop_reason: Some("end_turn".into())
            }
        );
    }

    #[tokio::test]
    async fn tool_call_json_accumulates_across_deltas() {
        let server = MockServer::start().await;
        let sse = concat!(
            "event: content_block_start\n",
            "data: {\"index\":1,\"content_block\":{\"type\":\"tool_use\",\"id\":\"toolu_1\",\"name\":\"get_stock_info\",\"input\":{}}}\n\n",
            "event: content_block_delta\n",
            "data: {\"index\":1,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{\\\"symbol\\\":\"}}\n\n",
            "event: content_block_delta\n",
            "data: {\"index\":1,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"\\\"ACME\\\"}\"}}\n\n",
            "event: content_block_stop\n",
            "data: {\"index\":1}\n\n",
            "event: message_stop\n",
            "data: {}\n\n",
        );
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let chunks: Vec<_> = collect(&provider).await.into_iter().map(|c| c.unwrap()).collect();

        match &chunks[0] {
            ProviderChunk::ToolCall { id, name, arguments } => {
                assert_eq!(id, "toolu_1");
                assert_eq!(name, "get_stock_info");
                assert_eq!(arguments["symbol"], "ACME");
            }
            other => panic!("expected ToolCall, got {other:?}"),
        }
        assert!(matches!(chunks[1], ProviderChunk::Stop { .. }));
    }

    #[tokio::test]
    async fn text_block_stop_emits_nothing() {
        let server = MockServer::start().await;
        let sse = concat!(
            "event: content_block_stop\n",
            "data: {\"index\":0}\n\n",
            "event: message_stop\n",
            "data: {}\n\n",
        );
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let chunks: Vec<_> = collect(&provider).await.into_iter().map(|c| c.unwrap()).collect();

        // No tool_use block was open at index 0, so only the stop arrives.
        assert_eq!(chunks.len(), 1);
        assert!(matches!(chunks[0], ProviderChunk::Stop { .. }));
    }

    #[tokio::test]
    async fn mid_stream_error_surfaces_as_err_item() {
        let server = MockServer::start().await;
        let sse = concat!(
            "event: error\n",
            "data: {\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n",
        );
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let chunks = collect(&provider).await;
        assert!(chunks[0].as_ref().is_err());
    }

    #[test]
    fn single_text_part_collapses_to_string_content() {
        let api = to_message_request(&request());
        match &api.messages[0].content {
            ApiContent::Text(t) => assert_eq!(t, "price of ACME?"),
            other => panic!("expected Text, got {other:?}"),
        }
        assert_eq!(api.messages[0].role, "user");
        assert!(api.stream);
    }

    #[test]
    fn tool_result_turns_become_blocks() {
        let mut req = request();
        req.messages.push(ChatMessage {
            role: Role::User,
            content: vec![ContentPart::ToolResult {
                tool_use_id: "toolu_1".into(),
                content: "{\"price\": 31.2}".into(),
                is_error: false,
            }],
        });
        let api = to_message_request(&req);
        match &api.messages[1].content {
            ApiContent::Blocks(blocks) => {
                assert!(matches!(blocks[0], ApiContentBlock::ToolResult { .. }))
            }
            other => panic!("expected Blocks, got {other:?}"),
        }
    }

    #[test]
    fn resolve_api_key_prefers_config() {
        let key = resolve_api_key(&Some("sk-config".into())).unwrap();
        assert_eq!(key, "sk-config");
    }
}
