//! Committed answers go to the durable log first, then out as a single-answer
//! patch on a spawned task. Callers never wait for delivery; failures stay in
//! the log with a backoff deadline and are re-sent by `flush`.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use checklist_core::hlc::{HlcClock, physical_now};
use checklist_core::{Answer, ChecklistId, Mutation, MutationId, ParameterId};
use checklist_storage::{MutationLog, SqliteStorage};

use crate::error::EngineError;
use crate::remote::ChecklistRemote;

pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

pub fn shared(storage: SqliteStorage) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Exponential retry delay: `base * 2^(attempt - 1)`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base_ms: u64,
    pub max_ms: u64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base_ms: 1_000,
            max_ms: 5 * 60 * 1_000,
        }
    }
}

impl Backoff {
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let shift = attempt.saturating_sub(1).min(32);
        self.base_ms.saturating_mul(1u64 << shift).min(self.max_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct Dispatcher {
    checklist_id: ChecklistId,
    storage: SharedStorage,
    remote: Arc<dyn ChecklistRemote>,
    clock: HlcClock,
    backoff: Backoff,
    in_flight: Vec<JoinHandle<bool>>,
}

impl Dispatcher {
    pub fn new(
        checklist_id: ChecklistId,
        storage: SharedStorage,
        remote: Arc<dyn ChecklistRemote>,
        backoff: Backoff,
    ) -> Self {
        Self {
            checklist_id,
            storage,
            remote,
            clock: HlcClock::new(),
            backoff,
            in_flight: Vec::new(),
        }
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    /// Log one answer and start sending it. Returns without waiting.
    pub fn dispatch(
        &mut self,
        parameter_id: &ParameterId,
        answer: Answer,
    ) -> Result<MutationId, EngineError> {
        let hlc = self.clock.tick()?;
        let mutation = Mutation::new(self.checklist_id.clone(), parameter_id.clone(), hlc, answer);
        {
            let mut log = self.storage.lock();
            log.append(&mutation)?;
            let superseded = log.supersede_older(&mutation)?;
            if superseded > 0 {
                debug!(field = mutation.field_name(), superseded, "older answers superseded");
            }
        }
        info!(
            parameter = %parameter_id,
            field = mutation.field_name(),
            mutation = %mutation.mutation_id,
            "answer committed"
        );
        let id = mutation.mutation_id;
        self.spawn_delivery(mutation);
        Ok(id)
    }

    fn spawn_delivery(&mut self, mutation: Mutation) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                mutation = %mutation.mutation_id,
                "no async runtime, answer stays in the outbox"
            );
            return;
        };
        self.in_flight.retain(|handle| !handle.is_finished());
        let storage = Arc::clone(&self.storage);
        let remote = Arc::clone(&self.remote);
        let backoff = self.backoff;
        self.in_flight
            .push(runtime.spawn(deliver(storage, remote, backoff, mutation)));
    }

    /// Wait for every delivery started so far.
    pub async fn settle(&mut self) {
        for handle in self.in_flight.drain(..) {
            if let Err(err) = handle.await {
                warn!(%err, "delivery task failed");
            }
        }
    }

    /// Re-send pending answers whose retry time has come, one request each,
    /// oldest stamp first.
    pub async fn flush(&mut self, now_ms: u64) -> Result<FlushReport, EngineError> {
        self.settle().await;
        let due = self.storage.lock().due(now_ms)?;
        let mut report = FlushReport::default();
        for record in due {
            let sent = deliver(
                Arc::clone(&self.storage),
                Arc::clone(&self.remote),
                self.backoff,
                record.mutation,
            )
            .await;
            if sent {
                report.delivered += 1;
            } else {
                report.failed += 1;
            }
        }
        if report != FlushReport::default() {
            info!(delivered = report.delivered, failed = report.failed, "outbox flushed");
        }
        Ok(report)
    }

    pub async fn flush_due(&mut self) -> Result<FlushReport, EngineError> {
        self.flush(physical_now()?).await
    }

    pub fn pending_count(&self) -> Result<u64, EngineError> {
        Ok(self.storage.lock().pending_count()?)
    }
}

async fn deliver(
    storage: SharedStorage,
    remote: Arc<dyn ChecklistRemote>,
    backoff: Backoff,
    mutation: Mutation,
) -> bool {
    let id = mutation.mutation_id;
    let outcome = remote
        .post_answers(&mutation.checklist_id, &mutation.patch())
        .await;
    match outcome {
        Ok(()) => {
            let marked = storage.lock().mark_delivered(id);
            match marked {
                Ok(true) => info!(mutation = %id, field = mutation.field_name(), "answer delivered"),
                Ok(false) => debug!(mutation = %id, "delivered answer was no longer pending"),
                Err(err) => warn!(mutation = %id, %err, "could not mark answer delivered"),
            }
            true
        }
        Err(err) => {
            let mut log = storage.lock();
            let attempts = match log.get_mutation(id) {
                Ok(Some(record)) => record.attempts + 1,
                _ => 1,
            };
            let next_attempt_at = physical_now()
                .unwrap_or_default()
                .saturating_add(backoff.delay_ms(attempts));
            if let Err(store_err) = log.record_failure(id, &err.to_string(), next_attempt_at) {
                warn!(mutation = %id, %store_err, "could not record delivery failure");
            }
            warn!(
                mutation = %id,
                field = mutation.field_name(),
                attempts,
                %err,
                "answer delivery failed"
            );
            false
        }
    }
}
