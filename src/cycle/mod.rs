//! Cycle driving
//!
//! This module runs the aggregator's main lifecycle:
//! - [`CycleRunner`] performs one discovery→resolve→publish pass
//! - [`run_schedule`] repeats it at a fixed interval until shutdown
//! - [`CycleTracker`] records progress for the health check

mod runner;
mod scheduler;
mod stats;
mod tracker;

pub use runner::{write_atomically, CycleRunner};
pub use scheduler::run_schedule;
pub use stats::{print_cycle_stats, sample_peak_rss_kb, CycleOutcome, CycleStats};
pub use tracker::{CyclePhase, CycleTracker, HealthReport};
