//! Cycle lifecycle tracking for the health check

use crate::cycle::stats::{CycleOutcome, CycleStats};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Where the scheduler currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePhase {
    Idle,
    Running,
    Publishing,
}

impl CyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Publishing => "publishing",
        }
    }
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct TrackerState {
    phase: CyclePhase,
    cycle_started: Option<Instant>,
    cycles_started: u64,
    cycles_published: u64,
    cycles_aborted: u64,
    last_outcome: Option<&'static str>,
    last_finished_at: Option<DateTime<Utc>>,
}

/// Shared, read-mostly record of the scheduler's progress
///
/// Written only by the cycle driver; read by `/health`.
#[derive(Debug)]
pub struct CycleTracker {
    state: Mutex<TrackerState>,
    process_started: Instant,
}

/// Liveness verdict plus the facts it was based on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub phase: CyclePhase,
    pub uptime_secs: u64,
    pub running_for_secs: Option<u64>,
    pub cycles_started: u64,
    pub cycles_published: u64,
    pub cycles_aborted: u64,
    pub last_outcome: Option<&'static str>,
    pub last_finished_at: Option<DateTime<Utc>>,
}

impl CycleTracker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TrackerState {
                phase: CyclePhase::Idle,
                cycle_started: None,
                cycles_started: 0,
                cycles_published: 0,
                cycles_aborted: 0,
                last_outcome: None,
                last_finished_at: None,
            }),
            process_started: Instant::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks the start of a cycle and returns its 1-based number
    pub fn begin_cycle(&self) -> u64 {
        let mut state = self.lock();
        state.phase = CyclePhase::Running;
        state.cycle_started = Some(Instant::now());
        state.cycles_started += 1;
        state.cycles_started
    }

    pub fn enter_phase(&self, phase: CyclePhase) {
        self.lock().phase = phase;
    }

    /// Records a finished cycle and returns to idle
    pub fn finish(&self, stats: &CycleStats) {
        let mut state = self.lock();
        state.phase = CyclePhase::Idle;
        state.cycle_started = None;
        state.last_outcome = Some(stats.outcome.as_str());
        state.last_finished_at = Some(Utc::now());
        match stats.outcome {
            CycleOutcome::Aborted { .. } => state.cycles_aborted += 1,
            CycleOutcome::Published { .. } | CycleOutcome::RetainedPrevious => {
                state.cycles_published += 1
            }
        }
    }

    pub fn phase(&self) -> CyclePhase {
        self.lock().phase
    }

    /// Healthy unless a cycle has been in progress longer than `stuck_after`
    pub fn health(&self, stuck_after: Duration) -> HealthReport {
        self.health_at(Instant::now(), stuck_after)
    }

    pub fn health_at(&self, now: Instant, stuck_after: Duration) -> HealthReport {
        let state = self.lock();
        let running_for = state
            .cycle_started
            .map(|started| now.saturating_duration_since(started));
        let stuck = running_for.is_some_and(|elapsed| elapsed > stuck_after);

        HealthReport {
            healthy: !stuck,
            phase: state.phase,
            uptime_secs: now.saturating_duration_since(self.process_started).as_secs(),
            running_for_secs: running_for.map(|d| d.as_secs()),
            cycles_started: state.cycles_started,
            cycles_published: state.cycles_published,
            cycles_aborted: state.cycles_aborted,
            last_outcome: state.last_outcome,
            last_finished_at: state.last_finished_at,
        }
    }
}

impl Default for CycleTracker {
    fn default() -> Self {
        Self::new()
    }
}
