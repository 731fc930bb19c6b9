// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The admission guard: four-level fail-fast rate limiting.
//!
//! Check order is burst, per-chat, hourly, daily. The first violated
//! level blocks; no counter at or beyond that level moves. An allowed
//! prompt commits all four counters atomically through the store.
//!
//! Admissions for one user are linearized behind a per-user async mutex,
//! so concurrent prompts cannot both pass a check the other should have
//! consumed. Different users proceed in parallel. Lock entries are
//! dropped once the last holder leaves, so the table tracks active
//! users only, not every user ever seen.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use gatehouse_core::types::{
    ChatId, Decision, LimitScope, LimitSet, UsageCounts, UsageSnapshot, UserId,
};
use gatehouse_core::{GatehouseError, WindowStore};

use crate::clock::Clock;
use crate::settings::SettingsHandle;

pub struct RateLimitGuard {
    store: Arc<dyn WindowStore>,
    settings: Arc<SettingsHandle>,
    clock: Arc<dyn Clock>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RateLimitGuard {
    pub fn new(
        store: Arc<dyn WindowStore>,
        settings: Arc<SettingsHandle>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            settings,
            clock,
            locks: DashMap::new(),
        }
    }

    /// The settings handle, shared with the admin surface.
    pub fn settings(&self) -> &Arc<SettingsHandle> {
        &self.settings
    }

    /// Decide whether one prompt is admitted.
    ///
    /// `Err` means the store failed; callers must treat that as a
    /// rejection (fail closed), not an allow.
    pub async fn admit(
        &self,
        user: &UserId,
        chat: &ChatId,
    ) -> Result<Decision, GatehouseError> {
        let settings = self.settings.current();

        // Whitelisted users skip every check and every store access.
        if settings.is_whitelisted(user) {
            debug!(user = %user, "whitelisted, admission bypassed");
            metrics::counter!("gatehouse_admission_allowed_total", "whitelisted" => "true")
                .increment(1);
            return Ok(Decision::Allow(UsageSnapshot {
                current: UsageCounts {
                    burst: 0,
                    per_chat: 0,
                    hourly: 0,
                    daily: 0,
                },
                limits: settings.effective_limits(user),
            }));
        }

        let lock = self.user_lock(user);
        let result = {
            let _guard = lock.lock().await;
            self.check_and_commit(user, chat, settings.effective_limits(user))
                .await
        };
        drop(lock);
        self.prune_lock(user);
        result
    }

    async fn check_and_commit(
        &self,
        user: &UserId,
        chat: &ChatId,
        limits: LimitSet,
    ) -> Result<Decision, GatehouseError> {
        let now = self.clock.now();
        let counters = self.store.load(user, now).await?;

        let burst_used = counters.effective_count(LimitScope::Burst, now);
        if burst_used >= limits.burst {
            return Ok(self.block(user, LimitScope::Burst, limits.burst, burst_used));
        }

        let chat_used = self.store.chat_count(user, chat).await?;
        if chat_used >= limits.per_chat {
            return Ok(self.block(user, LimitScope::PerChat, limits.per_chat, chat_used));
        }

        let hour_used = counters.effective_count(LimitScope::Hourly, now);
        if hour_used >= limits.hourly {
            return Ok(self.block(user, LimitScope::Hourly, limits.hourly, hour_used));
        }

        let day_used = counters.effective_count(LimitScope::Daily, now);
        if day_used >= limits.daily {
            return Ok(self.block(user, LimitScope::Daily, limits.daily, day_used));
        }

        self.store.commit(user, chat, now).await?;
        metrics::counter!("gatehouse_admission_allowed_total", "whitelisted" => "false")
            .increment(1);

        Ok(Decision::Allow(UsageSnapshot {
            current: UsageCounts {
                burst: burst_used + 1,
                per_chat: chat_used + 1,
                hourly: hour_used + 1,
                daily: day_used + 1,
            },
            limits,
        }))
    }

    /// Current usage without consuming a prompt. Feeds the handshake's
    /// usage frame and the admin read path.
    pub async fn usage(
        &self,
        user: &UserId,
        chat: Option<&ChatId>,
    ) -> Result<UsageSnapshot, GatehouseError> {
        let settings = self.settings.current();
        let now = self.clock.now();
        let counters = self.store.load(user, now).await?;
        let per_chat = match chat {
            Some(chat) => self.store.chat_count(user, chat).await?,
            None => 0,
        };
        Ok(UsageSnapshot {
            current: UsageCounts {
                burst: counters.effective_count(LimitScope::Burst, now),
                per_chat,
                hourly: counters.effective_count(LimitScope::Hourly, now),
                daily: counters.effective_count(LimitScope::Daily, now),
            },
            limits: settings.effective_limits(user),
        })
    }

    /// Administrative counter reset for one user.
    pub async fn reset(&self, user: &UserId) -> Result<(), GatehouseError> {
        let lock = self.user_lock(user);
        let result = {
            let _guard = lock.lock().await;
            self.store.reset(user).await
        };
        drop(lock);
        self.prune_lock(user);
        result
    }

    fn user_lock(&self, user: &UserId) -> Arc<Mutex<()>> {
        self.locks
            .entry(user.0.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Remove the user's lock entry unless another admission still holds
    /// a clone. The strong-count check runs under the shard lock, so it
    /// cannot race a concurrent `user_lock`.
    fn prune_lock(&self, user: &UserId) {
        self.locks
            .remove_if(&user.0, |_, lock| Arc::strong_count(lock) == 1);
    }

    fn block(&self, user: &UserId, scope: LimitScope, limit: u32, used: u32) -> Decision {
        warn!(user = %user, %scope, limit, used, "prompt blocked");
        metrics::counter!("gatehouse_admission_blocked_total", "scope" => scope.to_string())
            .increment(1);
        Decision::Block {
            scope,
            limit,
            prompts_used: used,
        }
    }
}
