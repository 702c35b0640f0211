//! Fixed-timestep tick loop for Hearthguard.
//!
//! The socket and session layers never block; something has to call them
//! at a steady rate. [`TickScheduler::run`] is that heartbeat: it calls a
//! synchronous callback once per tick until the callback breaks or a
//! [`CancellationToken`] fires.
//!
//! # Cancellation
//!
//! The token replaces a process-wide "interrupted" flag. The owner of the
//! loop hands a clone to whatever should be able to stop it (a Ctrl-C
//! handler, a test) and the loop checks it before every tick.
//!
//! # Late ticks
//!
//! A tick that fires more than 10% late is an overrun. The schedule then
//! restarts from "now": missed ticks are counted in
//! [`TickInfo::ticks_skipped`] but never replayed, so a stalled server
//! does not burst a backlog of updates at its clients.
//!
//! ```ignore
//! let cancel = CancellationToken::new();
//! TickScheduler::new(TickConfig::with_rate(60))
//!     .run(cancel.clone(), |info| {
//!         while let Some((peer, packet)) = server.poll_message() {
//!             /* handle packet */
//!         }
//!         world.step(info.dt_secs());
//!         ControlFlow::Continue(())
//!     })
//!     .await;
//! ```

use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tick loop settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TickConfig {
    pub tick_rate_hz: u32,
    /// Fraction of the tick duration (0.0–1.0) a tick's work may use
    /// before a warning is logged.
    pub budget_warn_threshold: f64,
    /// Upper bound of a random delay before the first tick, in µs. Keeps
    /// several processes started together from ticking in lockstep.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60,
            budget_warn_threshold: 0.8,
            initial_jitter_us: 2_000,
        }
    }
}

impl TickConfig {
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Self::default()
        }
    }

    /// Clamps the rate to `1..=`[`Self::MAX_TICK_RATE_HZ`] and the budget
    /// threshold to `0.0..=1.0`. [`TickScheduler::new`] calls this.
    pub fn validated(mut self) -> Self {
        let rate = self.tick_rate_hz.clamp(1, Self::MAX_TICK_RATE_HZ);
        if rate != self.tick_rate_hz {
            warn!(requested = self.tick_rate_hz, using = rate, "tick rate out of range");
            self.tick_rate_hz = rate;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }

    /// Duration of a single tick. A rate of 0 is treated as 1 Hz.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)))
    }
}

// ---------------------------------------------------------------------------
// Tick info and metrics
// ---------------------------------------------------------------------------

/// One fired tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickInfo {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Fixed step, always `1 / tick_rate`.
    pub dt: Duration,
    pub overrun: bool,
    /// Whole ticks that passed while this one was late.
    pub ticks_skipped: u64,
}

impl TickInfo {
    /// [`dt`](Self::dt) in seconds, the unit simulations step in.
    pub fn dt_secs(&self) -> f32 {
        self.dt.as_secs_f32()
    }
}

/// Counters collected over the lifetime of a loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Longest time a tick's work took.
    pub max_tick_time: Duration,
    /// Last tick's work divided by the tick duration.
    pub last_utilization: f64,
}

/// How late a tick fired, given when it was due and when it woke up.
/// Returns `(overrun, ticks_skipped)`.
fn lateness(due: TokioInstant, now: TokioInstant, tick: Duration) -> (bool, u64) {
    let late_by = now.saturating_duration_since(due);
    if late_by <= tick / 10 {
        return (false, 0);
    }
    let skipped = late_by.as_nanos() / tick.as_nanos().max(1);
    (true, u64::try_from(skipped).unwrap_or(u64::MAX))
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-timestep scheduler. One per game loop.
pub struct TickScheduler {
    config: TickConfig,
    tick_duration: Duration,
    tick_count: u64,
    next_tick: TokioInstant,
    /// Wall-clock start of the current tick's work, for budget checks.
    work_started: Option<Instant>,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// The first tick is one tick duration away, plus jitter.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let tick_duration = config.tick_duration();
        let jitter = match config.initial_jitter_us {
            0 => Duration::ZERO,
            max => Duration::from_micros(rand::rng().random_range(0..max)),
        };

        debug!(
            rate_hz = config.tick_rate_hz,
            jitter_us = jitter.as_micros() as u64,
            "tick scheduler created"
        );
        Self {
            next_tick: TokioInstant::now() + tick_duration + jitter,
            config,
            tick_duration,
            tick_count: 0,
            work_started: None,
            metrics: TickMetrics::default(),
        }
    }

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Sleeps until the next tick is due and marks the start of its work.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let due = self.next_tick;
        time::sleep_until(due).await;

        let now = TokioInstant::now();
        let (overrun, ticks_skipped) = lateness(due, now, self.tick_duration);
        self.next_tick = if overrun {
            now + self.tick_duration
        } else {
            due + self.tick_duration
        };

        self.tick_count += 1;
        self.work_started = Some(Instant::now());
        self.metrics.total_ticks += 1;
        if overrun {
            self.metrics.total_overruns += 1;
            self.metrics.total_skipped += ticks_skipped;
            warn!(tick = self.tick_count, skipped = ticks_skipped, "tick fired late");
        } else {
            trace!(tick = self.tick_count, "tick");
        }

        TickInfo {
            tick: self.tick_count,
            dt: self.tick_duration,
            overrun,
            ticks_skipped,
        }
    }

    /// [`wait_for_tick`](Self::wait_for_tick) that gives up with `None`
    /// once `cancel` fires. Cancellation wins a tie.
    pub async fn wait_for_tick_or_cancel(
        &mut self,
        cancel: &CancellationToken,
    ) -> Option<TickInfo> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            info = self.wait_for_tick() => Some(info),
        }
    }

    /// Closes the current tick: updates utilization and warns when the
    /// work used more than the configured share of the budget.
    pub fn record_tick_end(&mut self) {
        let Some(started) = self.work_started.take() else {
            return;
        };
        let elapsed = started.elapsed();
        let utilization = elapsed.as_secs_f64() / self.tick_duration.as_secs_f64();

        self.metrics.last_utilization = utilization;
        self.metrics.max_tick_time = self.metrics.max_tick_time.max(elapsed);
        if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "tick work near or over budget"
            );
        }
    }

    /// Drives `on_tick` once per tick until `cancel` fires or the callback
    /// returns [`ControlFlow::Break`]. Returns the final metrics.
    pub async fn run<F>(mut self, cancel: CancellationToken, mut on_tick: F) -> TickMetrics
    where
        F: FnMut(&TickInfo) -> ControlFlow<()>,
    {
        info!(rate_hz = self.config.tick_rate_hz, "tick loop started");

        while let Some(tick) = self.wait_for_tick_or_cancel(&cancel).await {
            let flow = on_tick(&tick);
            self.record_tick_end();
            if flow.is_break() {
                debug!(tick = tick.tick, "tick callback asked to stop");
                break;
            }
        }

        info!(
            ticks = self.metrics.total_ticks,
            overruns = self.metrics.total_overruns,
            cancelled = cancel.is_cancelled(),
            "tick loop stopped"
        );
        self.metrics
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }
}
