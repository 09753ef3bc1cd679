//! Settlement scheduler.
//!
//! Fires the settlement callback at each wager's due time. Delivery is
//! at-least-once: a per-wager timer task, a boot recovery pass over
//! pending wagers, and a periodic sweep for anything overdue. Duplicate
//! triggers are harmless because the engine's settlement transition is
//! conditional.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::store::WagerStore;

/// Settlement callback driven by the scheduler. Implemented by the
/// settlement engine; implementations must be idempotent per wager.
#[async_trait]
pub trait SettleWagers: Send + Sync {
    async fn settle(&self, wager_id: i64) -> anyhow::Result<()>;
}

/// A request to arm settlement for one wager at its due time.
#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    pub wager_id: i64,
    pub due_at: DateTime<Utc>,
}

/// Timer-driven scheduler with durable recovery.
pub struct Scheduler {
    settler: Arc<dyn SettleWagers>,
    wagers: WagerStore,
    rx: mpsc::UnboundedReceiver<ScheduleRequest>,
    sweep_interval: Duration,
}

impl Scheduler {
    pub fn new(
        settler: Arc<dyn SettleWagers>,
        wagers: WagerStore,
        rx: mpsc::UnboundedReceiver<ScheduleRequest>,
        sweep_interval_secs: u64,
    ) -> Self {
        Self {
            settler,
            wagers,
            rx,
            sweep_interval: Duration::from_secs(sweep_interval_secs.max(1)),
        }
    }

    /// Run until the request channel closes. Re-arms every pending wager
    /// from storage first so a restart never strands one.
    pub async fn run(mut self) {
        self.recover().await;

        let mut sweep = time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; recovery already covered it.
        sweep.tick().await;

        loop {
            tokio::select! {
                request = self.rx.recv() => {
                    match request {
                        Some(request) => self.spawn_settle(request),
                        None => {
                            info!("Schedule channel closed, scheduler stopping");
                            break;
                        }
                    }
                }
                _ = sweep.tick() => {
                    self.sweep().await;
                }
            }
        }
    }

    /// Arm a settlement task for every pending wager in storage.
    async fn recover(&self) {
        match self.wagers.pending().await {
            Ok(pending) => {
                if !pending.is_empty() {
                    info!(count = pending.len(), "Recovering pending wagers");
                }
                for wager in pending {
                    self.spawn_settle(ScheduleRequest {
                        wager_id: wager.id,
                        due_at: wager.due_at,
                    });
                }
            }
            Err(e) => error!(error = %e, "Failed to load pending wagers for recovery"),
        }
    }

    /// Spawn a task that sleeps until the due time, then settles.
    fn spawn_settle(&self, request: ScheduleRequest) {
        let settler = Arc::clone(&self.settler);
        let wait_ms = (request.due_at - Utc::now()).num_milliseconds().max(0) as u64;

        debug!(wager_id = request.wager_id, wait_ms, "Settlement armed");

        tokio::spawn(async move {
            time::sleep_until(Instant::now() + Duration::from_millis(wait_ms)).await;
            if let Err(e) = settler.settle(request.wager_id).await {
                // Still pending after a failure; the sweep retries it.
                warn!(wager_id = request.wager_id, error = %e, "Settlement attempt failed");
            }
        });
    }

    /// Settle everything overdue. Catches failed attempts and requests
    /// lost before they reached the channel.
    async fn sweep(&self) {
        let due = match self.wagers.due_pending(Utc::now()).await {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "Sweep query failed");
                return;
            }
        };

        if due.is_empty() {
            return;
        }

        debug!(count = due.len(), "Sweeping overdue wagers");

        let settles = due.iter().map(|w| self.settler.settle(w.id));
        let results = futures::future::join_all(settles).await;
        for (wager, result) in due.iter().zip(results) {
            if let Err(e) = result {
                warn!(wager_id = wager.id, error = %e, "Sweep settlement failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
