// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness assembling a working admission stack.
//!
//! Builds a temp-SQLite store, a manual clock, the admission guard, and
//! the violation recorder, so integration tests drive real admission
//! semantics without wall-clock waits.

use std::sync::Arc;

use async_trait::async_trait;
use gatehouse_admission::{
    LimitSettings, ManualClock, RateLimitGuard, SettingsHandle, ViolationRecorder,
};
use gatehouse_core::{
    ChatId, CredentialValidator, Decision, GatehouseError, LimitSet, UserId,
};
use gatehouse_storage::SqliteStore;
use tokio_util::sync::CancellationToken;

use crate::mock_provider::MockProvider;
use crate::mock_tools::MockToolBackend;

/// Validator accepting tokens of the form `user:<id>`.
///
/// Anything else fails closed, which is all the protocol tests need.
pub struct MockValidator;

#[async_trait]
impl CredentialValidator for MockValidator {
    async fn validate(&self, token: &str) -> Result<UserId, GatehouseError> {
        match token.strip_prefix("user:") {
            Some(id) if !id.is_empty() => Ok(UserId(id.to_string())),
            _ => Err(GatehouseError::AuthFailed("unknown token".to_string())),
        }
    }
}

pub struct TestHarnessBuilder {
    limits: LimitSet,
    whitelist: Vec<String>,
    violation_queue_depth: usize,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            limits: LimitSet {
                burst: 10,
                per_chat: 50,
                hourly: 150,
                daily: 1000,
            },
            whitelist: Vec::new(),
            violation_queue_depth: 64,
        }
    }

    pub fn with_limits(mut self, limits: LimitSet) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_whitelisted_user(mut self, user: &str) -> Self {
        self.whitelist.push(user.to_string());
        self
    }

    pub async fn build(self) -> Result<TestHarness, GatehouseError> {
        let temp_dir = tempfile::TempDir::new()
            .map_err(|e| GatehouseError::Store { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");
        let store = Arc::new(SqliteStore::open_at(&db_path.to_string_lossy()).await?);

        let settings = Arc::new(SettingsHandle::new(LimitSettings {
            global: self.limits,
            overrides: Default::default(),
            whitelist: self.whitelist.into_iter().collect(),
            version: 0,
        }));
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let guard = Arc::new(RateLimitGuard::new(
            store.clone(),
            settings.clone(),
            clock.clone(),
        ));

        let shutdown = CancellationToken::new();
        let (recorder, recorder_handle) = ViolationRecorder::spawn(
            store.clone(),
            self.violation_queue_depth,
            shutdown.clone(),
        );

        Ok(TestHarness {
            store,
            settings,
            clock,
            guard,
            recorder,
            recorder_handle,
            shutdown,
            provider: Arc::new(MockProvider::new()),
            tools: Arc::new(MockToolBackend::new()),
            _temp_dir: temp_dir,
        })
    }
}

/// A complete admission stack over a temp database.
pub struct TestHarness {
    pub store: Arc<SqliteStore>,
    pub settings: Arc<SettingsHandle>,
    /// Manual clock; advance it instead of sleeping.
    pub clock: Arc<ManualClock>,
    pub guard: Arc<RateLimitGuard>,
    pub recorder: ViolationRecorder,
    pub recorder_handle: tokio::task::JoinHandle<()>,
    pub shutdown: CancellationToken,
    pub provider: Arc<MockProvider>,
    pub tools: Arc<MockToolBackend>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Admit one prompt for `user` in `chat`.
    pub async fn admit(&self, user: &str, chat: &str) -> Result<Decision, GatehouseError> {
        self.guard
            .admit(&UserId(user.to_string()), &ChatId(chat.to_string()))
            .await
    }

    /// Drain the violation recorder and wait for its writer to finish.
    pub async fn finish_recording(self) {
        self.shutdown.cancel();
        let _ = self.recorder_handle.await;
    }
}
