// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live-connection registry and per-connection session state.
//!
//! One [`SessionConnection`] per socket. The generation slot enforces the
//! one-in-flight rule: a message may only start generating when the slot is
//! empty, and the slot holds the cancellation token that aborts the run on
//! disconnect.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use gatehouse_core::{ConnectionId, UserId};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::protocol::ServerFrame;

pub struct SessionConnection {
    pub id: ConnectionId,
    pub user: UserId,
    pub connected_at: DateTime<Utc>,
    outbound: mpsc::Sender<ServerFrame>,
    generating: Mutex<Option<CancellationToken>>,
}

impl SessionConnection {
    pub fn new(id: ConnectionId, user: UserId, outbound: mpsc::Sender<ServerFrame>) -> Self {
        Self {
            id,
            user,
            connected_at: Utc::now(),
            outbound,
            generating: Mutex::new(None),
        }
    }

    /// Queue a frame for the socket writer. False when the writer is gone.
    pub async fn send(&self, frame: ServerFrame) -> bool {
        self.outbound.send(frame).await.is_ok()
    }

    pub fn outbound_sender(&self) -> mpsc::Sender<ServerFrame> {
        self.outbound.clone()
    }

    pub fn is_generating(&self) -> bool {
        self.slot().is_some()
    }

    /// Claim the generation slot. `None` when a generation is already in
    /// flight; otherwise the token that cancels the new one.
    pub fn try_begin_generation(&self) -> Option<CancellationToken> {
        let mut slot = self
            .generating
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return None;
        }
        let token = CancellationToken::new();
        *slot = Some(token.clone());
        Some(token)
    }

    /// Release the slot after the terminal event. Idempotent.
    pub fn end_generation(&self) {
        self.generating
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }

    /// Abort the in-flight generation, if any, and release the slot.
    pub fn cancel_generation(&self) {
        if let Some(token) = self
            .generating
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            token.cancel();
        }
    }

    fn slot(&self) -> Option<CancellationToken> {
        self.generating
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Concurrent map of live connections.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<SessionConnection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Arc<SessionConnection>) {
        self.connections.insert(session.id.clone(), session);
        metrics::gauge!("gatehouse_active_connections").set(self.connections.len() as f64);
    }

    /// Remove and return the session, cancelling its in-flight generation.
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<SessionConnection>> {
        let removed = self.connections.remove(id).map(|(_, s)| s);
        if let Some(ref session) = removed {
            session.cancel_generation();
        }
        metrics::gauge!("gatehouse_active_connections").set(self.connections.len() as f64);
        removed
    }

    pub fn get(&self, id: &ConnectionId) -> Option<Arc<SessionConnection>> {
        self.connections.get(id).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
