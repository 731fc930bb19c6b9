// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::GatehouseError;
use crate::types::{ChatRequest, ProviderChunk};

/// A stream of decoded provider chunks.
pub type ChunkStream =
    Pin<Box<dyn Stream<Item = Result<ProviderChunk, GatehouseError>> + Send>>;

/// Streaming access to the backing language model.
///
/// One call per model turn; the agentic loop may call this more than once
/// per user message when the model requests tools.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Open a streaming completion for `request`.
    ///
    /// An `Err` here means the request could not be started at all;
    /// mid-stream failures surface as `Err` items on the stream.
    async fn stream(&self, request: ChatRequest) -> Result<ChunkStream, GatehouseError>;
}
