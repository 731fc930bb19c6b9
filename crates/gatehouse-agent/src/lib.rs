// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation pipeline for admitted messages.
//!
//! Couples the streaming model provider to the tool orchestrator in a
//! bounded agentic loop and aggregates per-message usage metadata. The
//! gateway's dispatcher consumes the emitted [`PipelineEvent`]s.

pub mod metadata;
pub mod pipeline;

pub use metadata::MetadataBuilder;
pub use pipeline::{GenerationPipeline, PipelineEvent};
