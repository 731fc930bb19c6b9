// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire frames for the session protocol.
//!
//! Client -> Server (JSON):
//! ```json
//! {"type": "message", "chat_id": "c1", "message": "text"}
//! {"type": "ping"}
//! ```
//!
//! Server -> Client (JSON): the stream events from `gatehouse-core` plus
//! the two handshake frames sent once after authentication.

use gatehouse_core::{ErrorCode, LimitSet, StreamEvent, UsageCounts};
use serde::{Deserialize, Serialize};

/// Inbound frame from the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Message { chat_id: String, message: String },
    Ping,
}

/// Frames sent once after a successful handshake.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HandshakeFrame {
    Connected {
        user_id: String,
        server_version: String,
    },
    RateLimitInfo {
        usage: UsageCounts,
        limits: LimitSet,
    },
}

/// Any outbound frame. Both inner types carry their own `type` tag.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Event(StreamEvent),
    Handshake(HandshakeFrame),
}

impl ServerFrame {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerFrame::Event(StreamEvent::Error {
            message: message.into(),
            code,
        })
    }

    pub fn pong() -> Self {
        ServerFrame::Event(StreamEvent::Pong)
    }
}
