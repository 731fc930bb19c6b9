// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the core storage traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use gatehouse_config::model::StoreConfig;
use gatehouse_core::types::{
    ChatId, ChatTurn, LimitScope, MessageMetadata, Role, StoredLimitConfig, UserId,
    Violation, WindowCounters,
};
use gatehouse_core::{
    GatehouseError, LimitConfigStore, MetadataSink, ViolationSink, WindowStore,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed store.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules.
/// One instance serves all four storage traits; the gateway and admission
/// layers share it behind an `Arc`.
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Open the database per `config` and run migrations.
    pub async fn open(config: &StoreConfig) -> Result<Self, GatehouseError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "sqlite store opened");
        Ok(Self { db })
    }

    /// Open an on-disk store at an explicit path with WAL enabled. Used by
    /// the test harness.
    pub async fn open_at(path: &str) -> Result<Self, GatehouseError> {
        let db = Database::open(path, true).await?;
        Ok(Self { db })
    }

    /// Liveness probe for health checks and the doctor command.
    pub async fn ping(&self) -> Result<(), GatehouseError> {
        self.db.ping().await
    }

    /// Checkpoint and close the underlying database.
    pub async fn close(self) -> Result<(), GatehouseError> {
        self.db.close().await
    }
}

#[async_trait]
impl WindowStore for SqliteStore {
    async fn load(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<WindowCounters, GatehouseError> {
        queries::windows::load(&self.db, &user.0, now).await
    }

    async fn chat_count(&self, user: &UserId, chat: &ChatId) -> Result<u32, GatehouseError> {
        queries::windows::chat_count(&self.db, &user.0, &chat.0).await
    }

    async fn commit(
        &self,
        user: &UserId,
        chat: &ChatId,
        now: DateTime<Utc>,
    ) -> Result<(), GatehouseError> {
        queries::windows::commit(&self.db, &user.0, &chat.0, now).await
    }

    async fn reset(&self, user: &UserId) -> Result<(), GatehouseError> {
        queries::windows::reset(&self.db, &user.0, Utc::now()).await
    }
}

#[async_trait]
impl ViolationSink for SqliteStore {
    async fn record(&self, violation: &Violation) -> Result<(), GatehouseError> {
        queries::violations::insert(&self.db, violation).await
    }

    async fn list(
        &self,
        user: Option<&UserId>,
        scope: Option<LimitScope>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Violation>, GatehouseError> {
        queries::violations::list(&self.db, user, scope, limit, offset).await
    }
}

#[async_trait]
impl LimitConfigStore for SqliteStore {
    async fn load_limits(&self) -> Result<Option<StoredLimitConfig>, GatehouseError> {
        queries::limits::load(&self.db).await
    }

    async fn save_limits(&self, config: &StoredLimitConfig) -> Result<(), GatehouseError> {
        queries::limits::save(&self.db, config).await
    }
}

#[async_trait]
impl MetadataSink for SqliteStore {
    async fn persist_message(
        &self,
        user: &UserId,
        chat: &ChatId,
        message_id: &str,
        role: Role,
        content: &str,
        metadata: Option<&MessageMetadata>,
    ) -> Result<(), GatehouseError> {
        queries::history::insert_message(
            &self.db,
            message_id,
            &user.0,
            &chat.0,
            role,
            content,
            metadata,
            Utc::now(),
        )
        .await
    }

    async fn load_history(
        &self,
        chat: &ChatId,
        limit: u32,
    ) -> Result<Vec<ChatTurn>, GatehouseError> {
        queries::history::load_history(&self.db, &chat.0, limit).await
    }
}
