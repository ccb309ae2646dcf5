//! Robber — the periodic enrollment loop.
//!
//! The `Robber` owns a [`TargetRegistry`] and, once started, a background
//! task that ticks at a fixed interval. Each tick:
//! - snapshots the registry and sorts it by priority (highest first,
//!   stable for equal priorities)
//! - probes each target's seats and skips full sections
//! - runs the two-phase add for open sections and drops committed
//!   targets from the registry
//!
//! Failures never abort a tick; the target simply stays for the next one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use eams_api::CourseSelectService;
use eams_core::config::{ConfigError, DEFAULT_INTERVAL, DEFAULT_MAX_RETRIES, RobberConfig};
use eams_core::Target;

use crate::error::{RobberError, RobberResult};
use crate::prober::AvailabilityProber;
use crate::protocol::{EnrollmentDriver, PollSettings};
use crate::registry::TargetRegistry;

const MIN_PERIOD: Duration = Duration::from_millis(1);
/// Longer intervals are treated as one year.
const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Tuning knobs for the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RobberSettings {
    /// Time between tick starts.
    pub interval: Duration,
    /// Informational only: attempts are bounded by how many ticks run
    /// before a target is committed or the loop is stopped.
    pub max_retries: u32,
    pub poll: PollSettings,
}

impl Default for RobberSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            poll: PollSettings::default(),
        }
    }
}

impl RobberSettings {
    pub fn from_config(config: &RobberConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            interval: config.interval()?,
            max_retries: config.max_retries(),
            poll: PollSettings {
                interval: config.poll_interval()?,
                timeout: config.poll_timeout()?,
            },
        })
    }
}

/// What one tick did, in evaluation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Lessons that had free seats and went through the add protocol.
    pub attempted: Vec<i64>,
    /// Lessons committed and removed from the registry.
    pub committed: Vec<i64>,
    /// Lessons probed with no free seat.
    pub skipped: Vec<i64>,
    /// Lessons whose probe or add attempt failed.
    pub failed: Vec<i64>,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.attempted.is_empty() && self.skipped.is_empty() && self.failed.is_empty()
    }
}

/// Everything a tick needs, cloned into the background task.
struct Ticker<S> {
    student_id: i64,
    turn_id: i64,
    registry: TargetRegistry,
    prober: AvailabilityProber<S>,
    driver: EnrollmentDriver<S>,
    /// Serializes ticks, including manual ones and a loop that is still
    /// finishing after `stop()` while a new one starts.
    tick_lock: Arc<tokio::sync::Mutex<()>>,
}

impl<S> Clone for Ticker<S> {
    fn clone(&self) -> Self {
        Self {
            student_id: self.student_id,
            turn_id: self.turn_id,
            registry: self.registry.clone(),
            prober: self.prober.clone(),
            driver: self.driver.clone(),
            tick_lock: Arc::clone(&self.tick_lock),
        }
    }
}

impl<S: CourseSelectService> Ticker<S> {
    async fn tick(&self) -> TickReport {
        let _guard = self.tick_lock.lock().await;
        let mut report = TickReport::default();

        let mut targets = self.registry.snapshot();
        if targets.is_empty() {
            return report;
        }
        // `sort_by` is stable, so equal priorities keep registry order.
        targets.sort_by(|a, b| b.priority.cmp(&a.priority));

        for target in targets {
            let lesson_id = target.lesson_id;

            let seats = match self.prober.probe(lesson_id).await {
                Ok(seats) => seats,
                Err(e) => {
                    warn!(lesson_id, error = %e, auth_expired = e.is_auth_expired(), "probe failed");
                    report.failed.push(lesson_id);
                    continue;
                }
            };

            if !seats.is_open() {
                debug!(lesson_id, capacity = seats.capacity, occupied = seats.occupied, "no free seat");
                report.skipped.push(lesson_id);
                continue;
            }

            report.attempted.push(lesson_id);
            match self
                .driver
                .try_add(self.student_id, self.turn_id, lesson_id, target.virtual_cost)
                .await
            {
                Ok(()) => {
                    self.registry.remove(lesson_id);
                    info!(lesson_id, priority = target.priority, "target enrolled");
                    report.committed.push(lesson_id);
                }
                Err(e) => {
                    warn!(lesson_id, error = %e, auth_expired = e.is_auth_expired(), "enrollment attempt failed");
                    report.failed.push(lesson_id);
                }
            }
        }

        report
    }

    async fn run(self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        // `interval_at` panics on zero, and `Instant` addition on huge periods.
        let period = period.clamp(MIN_PERIOD, MAX_PERIOD);
        let mut timer = tokio::time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_ms = period.as_millis() as u64,
            student_id = self.student_id,
            turn_id = self.turn_id,
            "robber loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = timer.tick() => {
                    let report = self.tick().await;
                    if !report.is_idle() {
                        debug!(
                            attempted = report.attempted.len(),
                            committed = report.committed.len(),
                            skipped = report.skipped.len(),
                            failed = report.failed.len(),
                            "tick finished"
                        );
                    }
                }
            }
        }

        info!("robber loop stopped");
    }
}

/// Handle to a loop task, kept until it is joined or replaced.
struct LoopSlot {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl LoopSlot {
    fn stop_requested(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    fn is_live(&self) -> bool {
        !self.stop_requested() && !self.handle.is_finished()
    }
}

/// Polls target sections and enrolls as soon as seats open up.
pub struct Robber<S> {
    ticker: Ticker<S>,
    settings: RobberSettings,
    slot: Mutex<Option<LoopSlot>>,
}

impl<S: CourseSelectService + 'static> Robber<S> {
    /// Create a robber for one student in one enrollment round.
    pub fn new(service: Arc<S>, student_id: i64, turn_id: i64, settings: RobberSettings) -> Self {
        Self {
            ticker: Ticker {
                student_id,
                turn_id,
                registry: TargetRegistry::new(),
                prober: AvailabilityProber::new(Arc::clone(&service)),
                driver: EnrollmentDriver::new(service, settings.poll),
                tick_lock: Arc::new(tokio::sync::Mutex::new(())),
            },
            settings,
            slot: Mutex::new(None),
        }
    }

    pub fn student_id(&self) -> i64 {
        self.ticker.student_id
    }

    pub fn turn_id(&self) -> i64 {
        self.ticker.turn_id
    }

    pub fn settings(&self) -> &RobberSettings {
        &self.settings
    }

    /// Shared handle to the target registry.
    pub fn registry(&self) -> TargetRegistry {
        self.ticker.registry.clone()
    }

    // ── Targets ─────────────────────────────────────────────────────

    pub fn add_target(&self, lesson_id: i64, virtual_cost: i64, priority: i32) {
        self.ticker.registry.add(lesson_id, virtual_cost, priority);
        info!(lesson_id, virtual_cost, priority, "target registered");
    }

    pub fn remove_target(&self, lesson_id: i64) {
        if self.ticker.registry.remove(lesson_id) {
            info!(lesson_id, "target unregistered");
        }
    }

    pub fn clear_targets(&self) {
        self.ticker.registry.clear();
        info!("targets cleared");
    }

    pub fn list_targets(&self) -> Vec<Target> {
        self.ticker.registry.snapshot()
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Spawn the tick task on the current tokio runtime.
    ///
    /// The first tick fires one interval after this call. Fails with
    /// `NoRuntime` when called outside a tokio runtime.
    ///
    /// Starting again after `stop()` is allowed while the old task is
    /// still finishing its last tick; the two never tick concurrently.
    pub fn start(&self) -> RobberResult<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| RobberError::NoRuntime)?;

        let mut slot = self.lock_slot();
        if slot.as_ref().is_some_and(LoopSlot::is_live) {
            return Err(RobberError::AlreadyRunning);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ticker = self.ticker.clone();
        let interval = self.settings.interval;
        let handle = runtime.spawn(async move {
            ticker.run(interval, shutdown_rx).await;
        });

        *slot = Some(LoopSlot {
            handle,
            shutdown_tx,
        });
        info!(
            targets = self.ticker.registry.len(),
            max_retries = self.settings.max_retries,
            "robber started"
        );
        Ok(())
    }

    /// Signal the loop to stop. An in-flight tick runs to completion and
    /// no new tick begins. Calling this while stopped is a no-op.
    ///
    /// The task handle is kept, so a later `shutdown()` still waits for
    /// the in-flight tick.
    pub fn stop(&self) {
        let slot = self.lock_slot();
        if let Some(slot) = slot.as_ref().filter(|s| !s.stop_requested()) {
            let _ = slot.shutdown_tx.send(true);
            info!("robber stop requested");
        }
    }

    /// Stop the loop and wait for the task to exit. Returns `NotRunning`
    /// when no loop was ever started or it has already been joined.
    pub async fn shutdown(&self) -> RobberResult<()> {
        let slot = self.lock_slot().take().ok_or(RobberError::NotRunning)?;
        let _ = slot.shutdown_tx.send(true);
        if let Err(e) = slot.handle.await {
            error!(error = %e, "robber loop task failed");
        }
        info!("robber shut down");
        Ok(())
    }

    /// Whether a loop is active and no stop has been requested.
    pub fn is_running(&self) -> bool {
        self.lock_slot().as_ref().is_some_and(LoopSlot::is_live)
    }

    /// Run one tick now, outside the timer. Serialized with loop ticks.
    pub async fn tick(&self) -> TickReport {
        self.ticker.tick().await
    }

    // ── One-off attempts ────────────────────────────────────────────

    /// Try to enroll once, without touching the registry.
    pub async fn try_enroll(&self, lesson_id: i64, virtual_cost: i64) -> RobberResult<()> {
        self.ticker
            .driver
            .try_add(self.ticker.student_id, self.ticker.turn_id, lesson_id, virtual_cost)
            .await
    }

    /// Try to drop a section once.
    pub async fn try_drop(&self, lesson_id: i64) -> RobberResult<()> {
        self.ticker
            .driver
            .try_drop(self.ticker.student_id, self.ticker.turn_id, lesson_id)
            .await
    }
}

impl<S> Robber<S> {
    fn lock_slot(&self) -> MutexGuard<'_, Option<LoopSlot>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S> Drop for Robber<S> {
    fn drop(&mut self) {
        if let Some(slot) = self.lock_slot().take() {
            let _ = slot.shutdown_tx.send(true);
        }
    }
}
