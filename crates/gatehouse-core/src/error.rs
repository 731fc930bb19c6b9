// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the gatehouse session core.

use thiserror::Error;

/// The primary error type used across gatehouse trait seams and core operations.
#[derive(Debug, Error)]
pub enum GatehouseError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Window/violation store errors. Admission fails closed when this is
    /// returned from the store: the prompt is rejected with a distinct
    /// `STORE_UNAVAILABLE` code, never silently allowed.
    #[error("store error: {source}")]
    Store {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Model provider errors (API failure, malformed stream, token limits).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Tool invocation errors. Recoverable at the generation-loop level;
    /// not escalated to a connection-level error unless the loop cannot
    /// produce any further output.
    #[error("tool error: {message}")]
    Tool {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Credential validation failed. The connection handshake fails closed.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// A client frame violated the session protocol.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// The owning generation was cancelled (disconnect or admin close).
    #[error("generation cancelled")]
    Cancelled,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
