//! Synthetic traffic generator
//!
//! Drives every worker concurrently with the same request mix the demo
//! routes serve: mostly fast requests, 10% slow (10ms) and 5% errors.

use crate::handlers::demo::SLOW_DELAY;
use crate::worker::Worker;
use futures::future::join_all;
use rand::Rng;
use std::time::{Duration, Instant};

/// Host label recorded for simulated requests
pub const SIMULATED_HOST: &str = "simulate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Fast,
    Slow,
    Error,
}

impl RequestKind {
    /// Map a roll in `0..100` to a request kind
    pub fn from_roll(roll: u32) -> Self {
        match roll {
            0..10 => RequestKind::Slow,
            10..15 => RequestKind::Error,
            _ => RequestKind::Fast,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            RequestKind::Fast => "/fast",
            RequestKind::Slow => "/slow",
            RequestKind::Error => "/error",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            RequestKind::Error => 500,
            RequestKind::Fast | RequestKind::Slow => 200,
        }
    }
}

/// Requests issued, by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulationReport {
    pub fast: u64,
    pub slow: u64,
    pub errors: u64,
}

impl SimulationReport {
    pub fn total(&self) -> u64 {
        self.fast + self.slow + self.errors
    }

    fn record(&mut self, kind: RequestKind) {
        match kind {
            RequestKind::Fast => self.fast += 1,
            RequestKind::Slow => self.slow += 1,
            RequestKind::Error => self.errors += 1,
        }
    }

    fn merge(mut self, other: SimulationReport) -> Self {
        self.fast += other.fast;
        self.slow += other.slow;
        self.errors += other.errors;
        self
    }
}

/// Issue requests on every worker for `duration`, `rate` per worker per second
///
/// Buffers are flushed before returning, so an export right after sees
/// every simulated request.
pub async fn run(workers: &[Worker], duration: Duration, rate: u32) -> SimulationReport {
    let pause = Duration::from_secs(1) / rate.max(1);
    let deadline = Instant::now() + duration;

    let tasks = workers.iter().cloned().map(|worker| {
        tokio::spawn(async move {
            let mut report = SimulationReport::default();
            while Instant::now() < deadline {
                let kind = RequestKind::from_roll(rand::rng().random_range(0..100));
                let started = Instant::now();
                if kind == RequestKind::Slow {
                    tokio::time::sleep(SLOW_DELAY).await;
                }
                worker.record_request(SIMULATED_HOST, kind.path(), kind.status(), started.elapsed());
                report.record(kind);
                tokio::time::sleep(pause).await;
            }
            worker.registry().flush();
            report
        })
    });

    let mut total = SimulationReport::default();
    for result in join_all(tasks).await {
        match result {
            Ok(report) => total = total.merge(report),
            Err(e) => tracing::error!(error = %e, "Simulated worker task failed"),
        }
    }

    tracing::info!(
        total = total.total(),
        fast = total.fast,
        slow = total.slow,
        errors = total.errors,
        "Simulation finished"
    );
    total
}
