// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket gateway for the gatehouse session core.
//!
//! Owns the connection registry and per-connection state machine, the
//! per-message stream dispatcher, the admin REST surface, and the public
//! health/metrics endpoints. Admission and generation are delegated to the
//! admission guard and the generation pipeline.

pub mod admin;
pub mod auth;
pub mod dispatcher;
pub mod handlers;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod ws;

pub use dispatcher::StreamDispatcher;
pub use protocol::{ClientFrame, HandshakeFrame, ServerFrame};
pub use registry::{ConnectionRegistry, SessionConnection};
pub use server::{GatewayState, HealthState, build_router, start_server};
