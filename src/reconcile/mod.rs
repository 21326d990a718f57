//! Accrual-status reconciliation loop.
//!
//! A background driver that, on a fixed cadence, pulls orders still in a
//! non-terminal status and advances them one transition: `NEW` orders are
//! promoted to `PROCESSING` (the register→acknowledge step), `PROCESSING`
//! orders are resolved to a terminal status via the accrual authority.
//!
//! Each pass runs to completion before the next sleep begins, so passes
//! never overlap and a pass never leaves in-flight work behind: within a
//! pass, each stage fans its batch out over a bounded work queue drained by
//! a pool of worker tasks, and the stage ends only when every worker has
//! been joined. Failures are per-order and per-stage: an order that could
//! not be persisted stays in its prior status and is retried next pass.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::accrual::AccrualOracle;
use crate::store::OrderStore;
use crate::types::{AccrualRecord, OrderStatus};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_workers_per_stage() -> usize {
    4
}

/// Reconciler tuning knobs, deserialized from the `[reconciler]` config
/// section.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerConfig {
    /// Seconds slept between passes.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Concurrent workers draining each stage's queue.
    #[serde(default = "default_workers_per_stage")]
    pub workers_per_stage: usize,
}

impl ReconcilerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            workers_per_stage: default_workers_per_stage(),
        }
    }
}

// ---------------------------------------------------------------------------
// Pass reports
// ---------------------------------------------------------------------------

/// Outcome counts for one stage of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageReport {
    pub dispatched: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Outcome counts for one full pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub promote: StageReport,
    pub resolve: StageReport,
}

impl PassReport {
    pub fn dispatched(&self) -> usize {
        self.promote.dispatched + self.resolve.dispatched
    }

    pub fn failed(&self) -> usize {
        self.promote.failed + self.resolve.failed
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// `NEW` → `PROCESSING`, no authority call.
    Promote,
    /// `PROCESSING` → terminal outcome from the accrual authority.
    Resolve,
}

impl Stage {
    fn input_status(&self) -> OrderStatus {
        match self {
            Self::Promote => OrderStatus::New,
            Self::Resolve => OrderStatus::Processing,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Promote => write!(f, "promote"),
            Self::Resolve => write!(f, "resolve"),
        }
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Fixed-interval reconciliation driver.
///
/// Owns handles to the store and the accrual authority; both are injected
/// at construction so the loop carries no global state of its own.
pub struct Reconciler<S, O> {
    store: Arc<S>,
    oracle: Arc<O>,
    config: ReconcilerConfig,
}

impl<S, O> Reconciler<S, O>
where
    S: OrderStore + 'static,
    O: AccrualOracle + 'static,
{
    pub fn new(store: Arc<S>, oracle: Arc<O>, config: ReconcilerConfig) -> Self {
        Self {
            store,
            oracle,
            config,
        }
    }

    /// Drive passes until `shutdown` resolves.
    ///
    /// Each iteration sleeps the configured interval, then runs one pass to
    /// completion, so passes are strictly serialized. The shutdown future is
    /// polled during every sleep; cancellation takes effect between passes
    /// and never interrupts in-flight work.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        info!(
            interval_secs = self.config.poll_interval_secs,
            workers_per_stage = self.config.workers_per_stage,
            "Reconciler running"
        );

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = time::sleep(self.config.poll_interval()) => {
                    let report = self.run_pass().await;
                    if report.dispatched() == 0 {
                        debug!("Reconciliation pass complete, nothing due");
                    } else {
                        info!(
                            promoted = report.promote.updated,
                            resolved = report.resolve.updated,
                            failed = report.failed(),
                            "Reconciliation pass complete"
                        );
                    }
                }
                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping reconciler");
                    break;
                }
            }
        }
    }

    /// Execute one fetch→dispatch→barrier pass over both stages.
    ///
    /// Fetch failures degrade to an empty batch for that stage only; the
    /// pass itself never fails. Returns only after every dispatched order
    /// has been attempted.
    pub async fn run_pass(&self) -> PassReport {
        let new_orders = self.fetch_stage_input(Stage::Promote).await;
        let processing_orders = self.fetch_stage_input(Stage::Resolve).await;

        let (promote, resolve) = tokio::join!(
            self.run_stage(Stage::Promote, new_orders),
            self.run_stage(Stage::Resolve, processing_orders),
        );

        PassReport { promote, resolve }
    }

    async fn fetch_stage_input(&self, stage: Stage) -> Vec<AccrualRecord> {
        let status = stage.input_status();
        match self.store.fetch_by_status(status).await {
            Ok(records) => {
                if records.is_empty() {
                    debug!(%status, "No orders due");
                }
                records
            }
            Err(e) => {
                warn!(%stage, %status, error = %e, "Fetch failed, skipping stage this pass");
                Vec::new()
            }
        }
    }

    /// Fan one stage's batch out to a worker pool and wait for it to drain.
    ///
    /// The queue is bounded to the batch size so dispatch never blocks
    /// within a pass. Joining the workers is the barrier: every consumed
    /// record is accounted for (updated or failed) before this returns.
    async fn run_stage(&self, stage: Stage, records: Vec<AccrualRecord>) -> StageReport {
        let dispatched = records.len();
        if dispatched == 0 {
            return StageReport::default();
        }

        let (tx, rx) = mpsc::channel::<AccrualRecord>(dispatched);
        let queue = Arc::new(Mutex::new(rx));

        let mut workers = JoinSet::new();
        for _ in 0..self.config.workers_per_stage.max(1) {
            let queue = Arc::clone(&queue);
            let store = Arc::clone(&self.store);
            let oracle = Arc::clone(&self.oracle);
            workers.spawn(async move {
                let mut updated = 0usize;
                let mut failed = 0usize;
                loop {
                    let record = queue.lock().await.recv().await;
                    let Some(record) = record else { break };
                    if apply_transition(stage, record, store.as_ref(), oracle.as_ref()).await {
                        updated += 1;
                    } else {
                        failed += 1;
                    }
                }
                (updated, failed)
            });
        }

        for record in records {
            if tx.send(record).await.is_err() {
                // Only reachable if every worker died; surfaced via the join below.
                break;
            }
        }
        drop(tx);

        let mut report = StageReport {
            dispatched,
            ..StageReport::default()
        };
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((updated, failed)) => {
                    report.updated += updated;
                    report.failed += failed;
                }
                Err(e) => error!(%stage, error = %e, "Stage worker panicked"),
            }
        }
        report
    }
}

/// Apply one status transition and persist it. Returns whether the new
/// status was durably stored; a `false` leaves the order in its prior
/// status to be retried next pass.
async fn apply_transition<S, O>(stage: Stage, record: AccrualRecord, store: &S, oracle: &O) -> bool
where
    S: OrderStore + ?Sized,
    O: AccrualOracle + ?Sized,
{
    match stage {
        Stage::Promote => {
            let promoted = record.into_processing();
            match store.persist(&promoted).await {
                Ok(()) => {
                    debug!(order_id = %promoted.order_id, "Order acknowledged for processing");
                    true
                }
                Err(e) => {
                    warn!(order_id = %promoted.order_id, error = %e, "Failed to persist promotion");
                    false
                }
            }
        }
        Stage::Resolve => {
            let outcome = match oracle.resolve(&record.order_id).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(order_id = %record.order_id, error = %e, "Accrual lookup failed");
                    return false;
                }
            };

            let resolved = AccrualRecord::with_outcome(record.order_id, outcome);
            match store.persist(&resolved).await {
                Ok(()) => {
                    debug!(order_id = %resolved.order_id, status = %resolved.status, "Order resolved");
                    true
                }
                Err(e) => {
                    warn!(order_id = %resolved.order_id, error = %e, "Failed to persist resolution");
                    false
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
