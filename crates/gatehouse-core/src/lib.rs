// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core types and trait seams for gatehouse, an admission-control and
//! streaming-session core for an LLM-backed chat service.
//!
//! This crate holds no behavior beyond small helpers on the types: the
//! admission guard, gateway, provider, and tool orchestrator all live in
//! their own crates and meet here at the trait seams.

pub mod error;
pub mod traits;
pub mod types;

pub use error::GatehouseError;
pub use traits::{
    ChunkStream, CredentialValidator, LimitConfigStore, MetadataSink, ModelProvider,
    ToolBackend, ViolationSink, WindowStore,
};
pub use types::{
    ChatId, ChatMessage, ChatRequest, ChatTurn, ContentPart, ConnectionId, Decision,
    ErrorCode, LimitOverride, LimitScope, LimitSet, MessageMetadata, ProviderChunk, Role,
    StoredLimitConfig, StreamEvent, TokenUsage, ToolCallId, UsageCounts, UsageSnapshot,
    UserId, Violation, WindowCounters,
};

/// Crate version, used by the gateway's health endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
