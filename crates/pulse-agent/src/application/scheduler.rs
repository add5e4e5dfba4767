//! Periodic driver for [`HeartbeatSender::tick`].
//!
//! Each iteration starts the tick and a sleep of `interval` together and
//! waits for both, so the period is `max(interval, tick duration)`.  A slow
//! peer stretches the period; it never causes ticks to overlap or pile up.

use std::time::Duration;

use tracing::debug;

use crate::application::heartbeat::{Connector, HeartbeatSender, TickOutcome};

pub struct HeartbeatScheduler<C: Connector> {
    sender: HeartbeatSender<C>,
    interval: Duration,
}

impl<C: Connector> HeartbeatScheduler<C> {
    pub fn new(sender: HeartbeatSender<C>, interval: Duration) -> Self {
        Self { sender, interval }
    }

    pub fn sender(&self) -> &HeartbeatSender<C> {
        &self.sender
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One iteration: a tick plus the interval sleep, concurrently.
    pub async fn run_once(&self) -> TickOutcome {
        let (outcome, ()) = tokio::join!(self.sender.tick(), tokio::time::sleep(self.interval));
        outcome
    }

    /// Ticks forever.
    pub async fn run(&self) {
        loop {
            let outcome = self.run_once().await;
            debug!(phase = %outcome.phase, count = outcome.count, "tick finished");
        }
    }

    /// Runs exactly `n` iterations and returns their outcomes.
    pub async fn run_ticks(&self, n: u64) -> Vec<TickOutcome> {
        let mut outcomes = Vec::new();
        for _ in 0..n {
            let outcome = self.run_once().await;
            debug!(phase = %outcome.phase, count = outcome.count, "tick finished");
            outcomes.push(outcome);
        }
        outcomes
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
