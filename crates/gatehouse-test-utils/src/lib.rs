// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared test harness and mock adapters for the gatehouse crates.
//!
//! Nothing in here is compiled into release binaries; it exists so the
//! gateway and pipeline integration tests can run against a real SQLite
//! store with scripted model and tool behavior.

pub mod harness;
pub mod mock_provider;
pub mod mock_tools;

pub use harness::{MockValidator, TestHarness, TestHarnessBuilder};
pub use mock_provider::MockProvider;
pub use mock_tools::{MockToolBackend, ToolScript};
