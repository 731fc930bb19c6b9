// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hot-swappable limit settings.
//!
//! The guard reads a consistent snapshot per admission; the admin surface
//! publishes a whole new snapshot on update. Readers never block writers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arc_swap::ArcSwap;

use gatehouse_core::types::{LimitOverride, LimitScope, LimitSet, StoredLimitConfig, UserId};

/// One immutable snapshot of the limit configuration.
#[derive(Debug, Clone)]
pub struct LimitSettings {
    pub global: LimitSet,
    pub overrides: HashMap<String, LimitOverride>,
    pub whitelist: HashSet<String>,
    pub version: u64,
}

impl LimitSettings {
    pub fn from_stored(config: &StoredLimitConfig) -> Self {
        Self {
            global: config.global,
            overrides: config.overrides.clone(),
            whitelist: config.whitelist.iter().cloned().collect(),
            version: config.version,
        }
    }

    pub fn to_stored(&self) -> StoredLimitConfig {
        let mut whitelist: Vec<String> = self.whitelist.iter().cloned().collect();
        whitelist.sort();
        StoredLimitConfig {
            global: self.global,
            overrides: self.overrides.clone(),
            whitelist,
            version: self.version,
        }
    }

    /// True when the user bypasses all limit checks.
    pub fn is_whitelisted(&self, user: &UserId) -> bool {
        self.whitelist.contains(&user.0)
    }

    /// The user's effective limits: per-scope override where present,
    /// global otherwise.
    pub fn effective_limits(&self, user: &UserId) -> LimitSet {
        match self.overrides.get(&user.0) {
            Some(ov) => LimitSet {
                burst: ov.burst.unwrap_or(self.global.burst),
                per_chat: ov.per_chat.unwrap_or(self.global.per_chat),
                hourly: ov.hourly.unwrap_or(self.global.hourly),
                daily: ov.daily.unwrap_or(self.global.daily),
            },
            None => self.global,
        }
    }

    /// The effective limit for one scope.
    pub fn effective_limit(&self, user: &UserId, scope: LimitScope) -> u32 {
        self.effective_limits(user).get(scope)
    }
}

/// Shared handle publishing [`LimitSettings`] snapshots to the guard.
pub struct SettingsHandle {
    inner: ArcSwap<LimitSettings>,
}

impl SettingsHandle {
    pub fn new(initial: LimitSettings) -> Self {
        Self {
            inner: ArcSwap::from_pointee(initial),
        }
    }

    /// The current snapshot. Cheap; safe to call per admission.
    pub fn current(&self) -> Arc<LimitSettings> {
        self.inner.load_full()
    }

    /// Replace the snapshot. In-flight admissions keep the one they read.
    pub fn publish(&self, settings: LimitSettings) {
        self.inner.store(Arc::new(settings));
    }
}
