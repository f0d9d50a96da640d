//! Periodic and trigger-driven snapshot scheduling.
//!
//! While running, the scheduler takes a snapshot every backup interval (the
//! first one interval after start). Lifecycle triggers and protected-key
//! writes open a debounce window; one snapshot is taken when it closes, no
//! matter how many triggers arrived inside it.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dataguard_core::errors::{GuardError, Result};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::guard::StoreChange;
use crate::snapshot_manager::SnapshotManager;

const TRIGGER_CHANNEL_CAPACITY: usize = 16;

/// Host-application event asking for a near-term snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// The application is going to the background or closing
    Inactive,
    /// A protected dataset was changed outside the guarded store
    ProtectedKeyMutated(String),
}

/// Cloneable sender for [`Trigger`]s
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    tx: broadcast::Sender<Trigger>,
}

impl TriggerHandle {
    pub fn send(&self, trigger: Trigger) {
        // Triggers sent while the scheduler is stopped are dropped.
        let _ = self.tx.send(trigger);
    }

    pub fn going_inactive(&self) {
        self.send(Trigger::Inactive);
    }

    pub fn notify_mutation(&self, key: impl Into<String>) {
        self.send(Trigger::ProtectedKeyMutated(key.into()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

struct RunningLoop {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns the background snapshot loop for one engine
pub struct Scheduler {
    manager: Arc<SnapshotManager>,
    interval: Duration,
    debounce: Duration,
    triggers: broadcast::Sender<Trigger>,
    changes: broadcast::Sender<StoreChange>,
    running: Mutex<Option<RunningLoop>>,
}

impl Scheduler {
    pub fn new(
        manager: Arc<SnapshotManager>,
        interval: Duration,
        debounce: Duration,
        changes: broadcast::Sender<StoreChange>,
    ) -> Self {
        let (triggers, _) = broadcast::channel(TRIGGER_CHANNEL_CAPACITY);
        Self {
            manager,
            interval,
            debounce,
            triggers,
            changes,
            running: Mutex::new(None),
        }
    }

    pub fn trigger_handle(&self) -> TriggerHandle {
        TriggerHandle {
            tx: self.triggers.clone(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        match self.lock_running().as_ref() {
            Some(running) if !running.handle.is_finished() => SchedulerState::Running,
            _ => SchedulerState::Stopped,
        }
    }

    /// Spawn the snapshot loop on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRunning` if the loop is active.
    pub fn start(&self) -> Result<()> {
        let mut running = self.lock_running();
        if let Some(previous) = running.as_ref() {
            if !previous.handle.is_finished() {
                return Err(GuardError::AlreadyRunning.into());
            }
            tracing::warn!("Previous scheduler loop had exited; starting a new one");
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let snapshot_loop = SnapshotLoop {
            manager: Arc::clone(&self.manager),
            interval: self.interval,
            debounce: self.debounce,
            triggers: self.triggers.subscribe(),
            changes: self.changes.subscribe(),
            shutdown: shutdown_rx,
        };
        let handle = tokio::spawn(snapshot_loop.run());
        *running = Some(RunningLoop { shutdown, handle });

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            debounce_ms = self.debounce.as_millis() as u64,
            "Scheduler started"
        );
        Ok(())
    }

    /// Stop the loop and wait for it to exit.
    ///
    /// A snapshot pass already under way completes first. Stopping a stopped
    /// scheduler does nothing.
    pub async fn stop(&self) {
        let Some(RunningLoop { shutdown, handle }) = self.lock_running().take() else {
            return;
        };
        let _ = shutdown.send(true);
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Scheduler task ended abnormally");
        }
        tracing::info!("Scheduler stopped");
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, Option<RunningLoop>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(running) = self.lock_running().take() {
            let _ = running.shutdown.send(true);
        }
    }
}

struct SnapshotLoop {
    manager: Arc<SnapshotManager>,
    interval: Duration,
    debounce: Duration,
    triggers: broadcast::Receiver<Trigger>,
    changes: broadcast::Receiver<StoreChange>,
    shutdown: watch::Receiver<bool>,
}

impl SnapshotLoop {
    async fn run(mut self) {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut deadline: Option<Instant> = None;
        let mut triggers_open = true;
        let mut changes_open = true;

        loop {
            let pending = deadline;
            let debounce_elapsed = async move {
                match pending {
                    Some(at) => time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                _ = ticker.tick() => {
                    deadline = None;
                    self.backup("interval").await;
                }
                _ = debounce_elapsed => {
                    deadline = None;
                    self.backup("debounced").await;
                }
                received = self.triggers.recv(), if triggers_open => match received {
                    Ok(trigger) => {
                        tracing::debug!(?trigger, "Snapshot trigger received");
                        deadline.get_or_insert_with(|| Instant::now() + self.debounce);
                    }
                    Err(RecvError::Lagged(_)) => {
                        deadline.get_or_insert_with(|| Instant::now() + self.debounce);
                    }
                    Err(RecvError::Closed) => triggers_open = false,
                },
                received = self.changes.recv(), if changes_open => match received {
                    Ok(StoreChange { key }) => {
                        tracing::debug!(dataset = %key, "Protected dataset written");
                        deadline.get_or_insert_with(|| Instant::now() + self.debounce);
                    }
                    Err(RecvError::Lagged(_)) => {
                        deadline.get_or_insert_with(|| Instant::now() + self.debounce);
                    }
                    Err(RecvError::Closed) => changes_open = false,
                },
            }
        }
    }

    async fn backup(&self, trigger: &'static str) {
        match self.manager.create_snapshot().await {
            Ok(id) => tracing::debug!(trigger, snapshot_id = %id, "Scheduled snapshot complete"),
            Err(err) => tracing::warn!(
                trigger,
                error = %err,
                "Scheduled snapshot failed; next interval retries"
            ),
        }
    }
}
