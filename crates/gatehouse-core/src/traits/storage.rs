// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::GatehouseError;
use crate::types::{
    ChatId, LimitScope, StoredLimitConfig, UserId, Violation, WindowCounters,
};

/// Durable per-user window counters backing admission.
///
/// All methods return `GatehouseError::Store` on backend failure; the
/// guard treats that as a fail-closed rejection, never an allow.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Load the user's window counters, creating a zeroed record at `now`
    /// if none exists.
    async fn load(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<WindowCounters, GatehouseError>;

    /// Lifetime prompt count for one chat.
    async fn chat_count(&self, user: &UserId, chat: &ChatId) -> Result<u32, GatehouseError>;

    /// Commit an admitted prompt: in one transaction, each expired window
    /// resets to count 1 with window_start = `now`, each live window
    /// increments, and the chat counter increments. Either all four
    /// counters move or none do.
    async fn commit(
        &self,
        user: &UserId,
        chat: &ChatId,
        now: DateTime<Utc>,
    ) -> Result<(), GatehouseError>;

    /// Administrative reset of all of a user's window counters (the chat
    /// counters are left alone; they are lifetime counts).
    async fn reset(&self, user: &UserId) -> Result<(), GatehouseError>;
}

/// Write/read access to violation records.
#[async_trait]
pub trait ViolationSink: Send + Sync {
    async fn record(&self, violation: &Violation) -> Result<(), GatehouseError>;

    /// Most-recent-first listing for the admin surface.
    async fn list(
        &self,
        user: Option<&UserId>,
        scope: Option<LimitScope>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Violation>, GatehouseError>;
}

/// Persistence for the limit configuration published to the guard.
#[async_trait]
pub trait LimitConfigStore: Send + Sync {
    /// `None` when no config row has ever been saved.
    async fn load_limits(&self) -> Result<Option<StoredLimitConfig>, GatehouseError>;

    async fn save_limits(&self, config: &StoredLimitConfig) -> Result<(), GatehouseError>;
}
