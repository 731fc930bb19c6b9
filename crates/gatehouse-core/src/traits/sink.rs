// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;

use crate::error::GatehouseError;
use crate::types::{ChatId, ChatTurn, MessageMetadata, Role, UserId};

/// Persists message transcripts and reloads chat history.
///
/// Persistence failures are non-fatal to a generation in flight; callers
/// log and continue.
#[async_trait]
pub trait MetadataSink: Send + Sync {
    async fn persist_message(
        &self,
        user: &UserId,
        chat: &ChatId,
        message_id: &str,
        role: Role,
        content: &str,
        metadata: Option<&MessageMetadata>,
    ) -> Result<(), GatehouseError>;

    /// Oldest-first turns for one chat, capped at `limit`.
    async fn load_history(
        &self,
        chat: &ChatId,
        limit: u32,
    ) -> Result<Vec<ChatTurn>, GatehouseError>;
}
