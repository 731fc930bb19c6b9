// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-message event dispatch.
//!
//! Turns the pipeline's events into numbered wire events for one message.
//! chunk_id starts at 0 and increments by exactly 1 per text chunk,
//! regardless of tool interleaving. The terminal emit consumes the
//! dispatcher, so a second terminal for the same message cannot compile.

use gatehouse_agent::PipelineEvent;
use gatehouse_core::StreamEvent;
use tokio::sync::mpsc;
use tracing::debug;

use crate::protocol::ServerFrame;

pub struct StreamDispatcher {
    outbound: mpsc::Sender<ServerFrame>,
    next_chunk_id: u64,
}

impl StreamDispatcher {
    pub fn new(outbound: mpsc::Sender<ServerFrame>) -> Self {
        Self {
            outbound,
            next_chunk_id: 0,
        }
    }

    /// Forward pipeline events until the terminal one, then stop. Returns
    /// after the terminal event (or when either channel closes).
    pub async fn forward(mut self, mut rx: mpsc::Receiver<PipelineEvent>) {
        while let Some(event) = rx.recv().await {
            match event {
                PipelineEvent::Text(content) => {
                    let chunk_id = self.next_chunk_id;
                    self.next_chunk_id += 1;
                    if !self.emit(StreamEvent::TextChunk { content, chunk_id }).await {
                        return;
                    }
                }
                PipelineEvent::ToolStart { tool_name, tool_id } => {
                    if !self.emit(StreamEvent::ToolCallStart { tool_name, tool_id }).await {
                        return;
                    }
                }
                PipelineEvent::ToolComplete { tool_id, result } => {
                    if !self.emit(StreamEvent::ToolCallComplete { tool_id, result }).await {
                        return;
                    }
                }
                PipelineEvent::Completed {
                    message_id,
                    metadata,
                } => {
                    self.terminal(StreamEvent::MessageComplete {
                        message_id,
                        metadata,
                    })
                    .await;
                    return;
                }
                PipelineEvent::Failed { code, message } => {
                    self.terminal(StreamEvent::Error { message, code }).await;
                    return;
                }
            }
        }
        debug!("pipeline channel closed without a terminal event");
    }

    async fn emit(&self, event: StreamEvent) -> bool {
        self.outbound.send(ServerFrame::Event(event)).await.is_ok()
    }

    // Consumes the dispatcher: there is exactly one terminal per message.
    async fn terminal(self, event: StreamEvent) {
        let _ = self.outbound.send(ServerFrame::Event(event)).await;
    }
}
