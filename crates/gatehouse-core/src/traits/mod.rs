// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the gatehouse crates.
//!
//! Each seam is an async trait implemented by exactly one production type
//! and by mocks in `gatehouse-test-utils`. Crates depend on these traits,
//! not on each other's concrete types.

mod auth;
mod provider;
mod sink;
mod storage;
mod tools;

pub use auth::CredentialValidator;
pub use provider::{ChunkStream, ModelProvider};
pub use sink::MetadataSink;
pub use storage::{LimitConfigStore, ViolationSink, WindowStore};
pub use tools::ToolBackend;
