//! The two recurring activities and the flush/acknowledge handshake.
//!
//! *Tick* advances the engine and forwards monitor/alarm hits immediately;
//! its period is the engine's interval. *Flush* sends the accumulated update
//! batch on a fixed period. Both run on the bridge's single task, so engine
//! access never overlaps.

use std::time::Duration;

use gatebridge_data::HostMessage;
use serde_json::Value;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::engine::Engine;
use crate::error::Result;
use crate::format::update_message;
use crate::outbox::Outbox;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Tick,
    Flush,
}

/// Recurring timer whose first firing is one full period away.
fn recurring(period: Duration) -> Interval {
    let period = period.max(Duration::from_millis(1));
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn fire(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Timer handles for the tick and flush activities.
#[derive(Debug)]
pub struct Scheduler {
    tick: Option<Interval>,
    flush: Option<Interval>,
    flush_period: Duration,
}

impl Scheduler {
    pub fn new(flush_period: Duration) -> Self {
        Self {
            tick: None,
            flush: None,
            flush_period,
        }
    }

    /// Starts (or restarts) both activities.
    pub fn start(&mut self, tick_period: Duration) {
        self.tick = Some(recurring(tick_period));
        self.flush = Some(recurring(self.flush_period));
    }

    /// Starts the flush activity unless it is already running.
    pub fn ensure_flushing(&mut self) {
        if self.flush.is_none() {
            self.flush = Some(recurring(self.flush_period));
        }
    }

    /// Cancels the tick activity only.
    pub fn stop_updater(&mut self) {
        self.tick = None;
    }

    /// Cancels both activities. Cancelling an inactive one is a no-op.
    pub fn stop(&mut self) {
        self.tick = None;
        self.flush = None;
    }

    pub fn is_ticking(&self) -> bool {
        self.tick.is_some()
    }

    pub fn is_flushing(&self) -> bool {
        self.flush.is_some()
    }

    /// Waits for the next activity due. Pending forever when both are idle.
    pub async fn next(&mut self) -> Activity {
        tokio::select! {
            _ = fire(&mut self.tick) => Activity::Tick,
            _ = fire(&mut self.flush) => Activity::Flush,
        }
    }
}

/// Forwards everything the engine sampled since the last call.
pub fn post_monitors(engine: &mut dyn Engine, outbox: &Outbox) {
    for event in engine.post_monitors() {
        outbox.send(event.into());
    }
}

/// One tick activity: advance, then sample monitors.
pub fn run_tick(engine: &mut dyn Engine, outbox: &Outbox) -> Result<u32> {
    let processed = engine.update_gates()?;
    post_monitors(engine, outbox);
    Ok(processed)
}

/// One flush activity: send whatever changed since the previous flush.
pub fn flush(engine: &mut dyn Engine, outbox: &Outbox) {
    let updates = engine.take_updates();
    tracing::trace!(tick = updates.tick, gates = updates.changes.len(), "flush");
    outbox.send(update_message(&updates));
}

/// Optionally flushes, then acknowledges `request_id`. The update always
/// precedes the ack.
pub fn acknowledge(
    engine: &mut dyn Engine,
    outbox: &Outbox,
    request_id: u64,
    flush_first: bool,
    response: Value,
) {
    if flush_first {
        flush(engine, outbox);
    }
    outbox.send(HostMessage::Ack(request_id, response));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_idle_scheduler_never_fires() {
        let mut s = Scheduler::new(Duration::from_millis(25));
        let res = tokio::time::timeout(Duration::from_secs(1), s.next()).await;
        assert!(res.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activities_follow_their_periods() {
        let mut s = Scheduler::new(Duration::from_millis(25));
        let started = Instant::now();
        s.start(Duration::from_millis(10));

        let at = |ms: u64| {
            let elapsed = started.elapsed();
            elapsed >= Duration::from_millis(ms) && elapsed < Duration::from_millis(ms + 1)
        };

        assert_eq!(s.next().await, Activity::Tick);
        assert!(at(10));
        assert_eq!(s.next().await, Activity::Tick);
        assert_eq!(s.next().await, Activity::Flush);
        assert!(at(25));
        assert_eq!(s.next().await, Activity::Tick);
        assert!(at(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_updater_stop_keeps_flushing() {
        let mut s = Scheduler::new(Duration::from_millis(25));
        s.start(Duration::from_millis(10));
        s.stop_updater();
        assert!(!s.is_ticking());
        assert!(s.is_flushing());
        assert_eq!(s.next().await, Activity::Flush);
        assert_eq!(s.next().await, Activity::Flush);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_both_and_is_idempotent() {
        let mut s = Scheduler::new(Duration::from_millis(25));
        s.stop();
        s.start(Duration::from_millis(10));
        s.stop();
        s.stop();
        assert!(!s.is_ticking() && !s.is_flushing());
        let res = tokio::time::timeout(Duration::from_secs(1), s.next()).await;
        assert!(res.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_tick_period_is_clamped() {
        let mut s = Scheduler::new(Duration::from_millis(25));
        s.start(Duration::ZERO);
        assert_eq!(s.next().await, Activity::Tick);
    }
}
