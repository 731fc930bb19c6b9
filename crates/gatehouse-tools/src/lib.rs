// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool catalog, HTTP transport and orchestration.
//!
//! The catalog declares what the model may call; the registry narrows it to
//! the servers actually configured; the [`HttpToolBackend`] carries calls to
//! the capability servers; the [`ToolOrchestrator`] wraps every call in a
//! timeout and the owning generation's cancellation scope.

pub mod backend;
pub mod catalog;
pub mod orchestrator;
pub mod registry;

pub use backend::HttpToolBackend;
pub use catalog::{ToolSpec, builtin_catalog};
pub use orchestrator::{ToolOrchestrator, ToolOutcome};
pub use registry::ToolRegistry;
