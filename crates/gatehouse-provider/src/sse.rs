// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE stream parser for Anthropic Messages API streaming responses.
//!
//! Converts a reqwest response byte stream into typed [`SseEvent`] variants
//! using the `eventsource-stream` crate for SSE protocol compliance.

use std::pin::Pin;

use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use gatehouse_core::GatehouseError;

use crate::types::{
    SseContentBlockDelta, SseContentBlockStart, SseContentBlockStop, SseError,
    SseMessageDelta, SseMessageStart,
};

/// Typed SSE events from the Anthropic streaming protocol.
#[derive(Debug, Clone)]
pub enum SseEvent {
    /// Initial message metadata (id, model, usage).
    MessageStart(SseMessageStart),
    /// A new content block begins.
    ContentBlockStart(SseContentBlockStart),
    /// Incremental update to a content block (text delta, JSON delta).
    ContentBlockDelta(SseContentBlockDelta),
    /// A content block has finished.
    ContentBlockStop(SseContentBlockStop),
    /// Message-level delta (stop_reason, usage update).
    MessageDelta(SseMessageDelta),
    /// The message is complete.
    MessageStop,
    /// Keep-alive ping.
    Ping,
    /// API error during streaming.
    Error(SseError),
}

fn parse_err(what: &str, e: serde_json::Error) -> GatehouseError {
    GatehouseError::Provider {
        message: format!("failed to parse {what}: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Parses a reqwest streaming response into a stream of typed [`SseEvent`]s.
///
/// Unknown event types are silently skipped per Anthropic's API versioning
/// policy.
pub fn parse_sse_stream(
    response: reqwest::Response,
) -> Pin<Box<dyn Stream<Item = Result<SseEvent, GatehouseError>> + Send>> {
    let event_stream = response.bytes_stream().eventsource();

    let mapped = event_stream.filter_map(|result| async move {
        match result {
            Ok(event) => {
                let parsed = match event.event.as_str() {
                    "message_start" => serde_json::from_str::<SseMessageStart>(&event.data)
                        .map(SseEvent::MessageStart)
                        .map_err(|e| parse_err("message_start", e)),
                    "content_block_start" => {
                        serde_json::from_str::<SseContentBlockStart>(&event.data)
                            .map(SseEvent::ContentBlockStart)
                            .map_err(|e| parse_err("content_block_start", e))
                    }
                    "content_block_delta" => {
                        serde_json::from_str::<SseContentBlockDelta>(&event.data)
                            .map(SseEvent::ContentBlockDelta)
                            .map_err(|e| parse_err("content_block_delta", e))
                    }
                    "content_block_stop" => {
                        serde_json::from_str::<SseContentBlockStop>(&event.data)
                            .map(SseEvent::ContentBlockStop)
                            .map_err(|e| parse_err("content_block_stop", e))
                    }
                    "message_delta" => serde_json::from_str::<SseMessageDelta>(&event.data)
                        .map(SseEvent::MessageDelta)
                        .map_err(|e| parse_err("message_delta", e)),
                    "message_stop" => Ok(SseEvent::MessageStop),
                    "ping" => Ok(SseEvent::Ping),
                    "error" => serde_json::from_str::<SseError>(&event.data)
                        .map(SseEvent::Error)
                        .map_err(|e| parse_err("error event", e)),
                    _ => return None,
                };
                Some(parsed)
            }
            Err(e) => Some(Err(GatehouseError::Provider {
                message: format!("SSE stream error: {e}"),
                source: None,
            })),
        }
    });

    Box::pin(mapped)
}
