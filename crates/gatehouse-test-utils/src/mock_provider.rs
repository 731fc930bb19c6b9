// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock model provider for deterministic testing.
//!
//! Each call to `stream` plays back one scripted turn from a FIFO queue.
//! An exhausted queue yields a single-chunk "mock response" turn, so tests
//! that only care about admission never have to script the model.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use gatehouse_core::{
    ChatRequest, ChunkStream, GatehouseError, ModelProvider, ProviderChunk, TokenUsage,
};

pub struct MockProvider {
    turns: Mutex<VecDeque<Vec<ProviderChunk>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            turns: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Pre-load scripted turns, one chunk list per `stream` call.
    pub fn with_turns(turns: Vec<Vec<ProviderChunk>>) -> Self {
        Self {
            turns: Mutex::new(VecDeque::from(turns)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A plain text turn ending in `end_turn`, with usage.
    pub fn text_turn(text: &str) -> Vec<ProviderChunk> {
        vec![
            ProviderChunk::Usage(TokenUsage {
                input_tokens: 10,
                output_tokens: 0,
            }),
            ProviderChunk::TextDelta(text.to_string()),
            ProviderChunk::Usage(TokenUsage {
                input_tokens: 0,
                output_tokens: 20,
            }),
            ProviderChunk::Stop {
                stop_reason: Some("end_turn".to_string()),
            },
        ]
    }

    /// A turn requesting one tool call.
    pub fn tool_turn(tool: &str, arguments: serde_json::Value) -> Vec<ProviderChunk> {
        vec![
            ProviderChunk::ToolCall {
                id: format!("toolu_{}", uuid::Uuid::new_v4().simple()),
                name: tool.to_string(),
                arguments,
            },
            ProviderChunk::Stop {
                stop_reason: Some("tool_use".to_string()),
            },
        ]
    }

    pub fn push_turn(&self, turn: Vec<ProviderChunk>) {
        self.turns
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(turn);
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    async fn stream(&self, request: ChatRequest) -> Result<ChunkStream, GatehouseError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        let chunks = self
            .turns
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Self::text_turn("mock response"));
        Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use gatehouse_core::{ChatMessage, Role};

    fn request() -> ChatRequest {
        ChatRequest {
            model: "test-model".into(),
            messages: vec![ChatMessage::text(Role::User, "hi")],
            system: None,
            max_tokens: 100,
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn scripted_turns_play_back_in_order() {
        let provider = MockProvider::with_turns(vec![
            MockProvider::text_turn("first"),
            MockProvider::text_turn("second"),
        ]);

        for expected in ["first", "second", "mock response"] {
            let mut stream = provider.stream(request()).await.unwrap();
            let mut text = String::new();
            while let Some(chunk) = stream.next().await {
                if let ProviderChunk::TextDelta(t) = chunk.unwrap() {
                    text.push_str(&t);
                }
            }
            assert_eq!(text, expected);
        }
    }

    #[tokio::test]
    async fn requests_are_recorded() {
        let provider = MockProvider::new();
        provider.stream(request()).await.unwrap();
        assert_eq!(provider.requests().len(), 1);
    }
}
