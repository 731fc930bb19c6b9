// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fire-and-forget violation recording.
//!
//! Blocked decisions enqueue a record on a bounded channel and return
//! immediately; a background task writes to the sink. A full queue drops
//! the record with a warning rather than slowing admission, and a sink
//! failure is logged and swallowed. The record path can never delay or
//! fail a decision.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use gatehouse_core::types::Violation;
use gatehouse_core::ViolationSink;

#[derive(Clone)]
pub struct ViolationRecorder {
    tx: mpsc::Sender<Violation>,
}

impl ViolationRecorder {
    /// Spawn the background writer. The task drains the queue and exits
    /// when `shutdown` fires or every sender is dropped.
    pub fn spawn(
        sink: Arc<dyn ViolationSink>,
        queue_depth: usize,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue_depth);
        let handle = tokio::spawn(writer_loop(sink, rx, shutdown));
        (Self { tx }, handle)
    }

    /// Enqueue one violation. Never blocks, never fails the caller.
    pub fn record(&self, violation: Violation) {
        if let Err(e) = self.tx.try_send(violation) {
            warn!(error = %e, "violation queue full, record dropped");
            metrics::counter!("gatehouse_violations_dropped_total").increment(1);
        }
    }
}

async fn writer_loop(
    sink: Arc<dyn ViolationSink>,
    mut rx: mpsc::Receiver<Violation>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                // Drain what is already queued, then stop.
                rx.close();
                while let Ok(v) = rx.try_recv() {
                    write_one(&sink, v).await;
                }
                debug!("violation recorder stopped");
                return;
            }
            violation = rx.recv() => {
                match violation {
                    Some(v) => write_one(&sink, v).await,
                    None => return,
                }
            }
        }
    }
}

async fn write_one(sink: &Arc<dyn ViolationSink>, violation: Violation) {
    if let Err(e) = sink.record(&violation).await {
        warn!(error = %e, user = %violation.user_id, "failed to persist violation");
    } else {
        metrics::counter!("gatehouse_violations_recorded_total").increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use gatehouse_core::types::{LimitScope, UserId};
    use gatehouse_core::GatehouseError;
    use tokio::sync::Mutex;

    struct RecordingSink {
        records: Mutex<Vec<Violation>>,
    }

    #[async_trait]
    impl ViolationSink for RecordingSink {
        async fn record(&self, violation: &Violation) -> Result<(), GatehouseError> {
            self.records.lock().await.push(violation.clone());
            Ok(())
        }

        async fn list(
            &self,
            _user: Option<&UserId>,
            _scope: Option<LimitScope>,
            _limit: u32,
            _offset: u32,
        ) -> Result<Vec<Violation>, GatehouseError> {
            Ok(self.records.lock().await.clone())
        }
    }

    fn make_violation(user: &str) -> Violation {
        Violation {
            user_id: UserId(user.to_string()),
            chat_id: None,
            scope: LimitScope::Burst,
            limit_value: 10,
            prompts_used: 10,
            decided_action: "blocked".to_string(),
            user_message: None,
            ip_address: None,
            user_agent: None,
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn records_flow_to_the_sink() {
        let sink = Arc::new(RecordingSink {
            records: Mutex::new(Vec::new()),
        });
        let shutdown = CancellationToken::new();
        let (recorder, handle) = ViolationRecorder::spawn(sink.clone(), 16, shutdown.clone());

        recorder.record(make_violation("u1"));
        recorder.record(make_violation("u2"));

        // Drop the sender and let the writer drain.
        drop(recorder);
        handle.await.unwrap();

        let records = sink.records.lock().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].user_id.0, "u1");
    }

    #[tokio::test]
    async fn shutdown_drains_queued_records() {
        let sink = Arc::new(RecordingSink {
            records: Mutex::new(Vec::new()),
        });
        let shutdown = CancellationToken::new();
        let (recorder, handle) = ViolationRecorder::spawn(sink.clone(), 16, shutdown.clone());

        recorder.record(make_violation("u1"));
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(sink.records.lock().await.len(), 1);
    }
}
