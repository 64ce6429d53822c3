//! Fixed-interval cycle loop

use crate::cycle::runner::CycleRunner;
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// Runs cycles every `period`, measured from the start of the previous cycle,
/// until `shutdown` resolves
///
/// The first cycle starts immediately. A cycle that overruns the period delays
/// the next one, which then starts as soon as the overrunning cycle finishes;
/// cycles never overlap. Shutdown interrupts an in-progress cycle, leaving the
/// store with whatever was last published.
///
/// Returns the number of cycles that ran to completion.
pub async fn run_schedule<S>(runner: &CycleRunner, period: Duration, shutdown: S) -> u64
where
    S: Future<Output = ()>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut completed = 0u64;
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }

        tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::warn!("Shutdown requested during a cycle; abandoning it");
                break;
            }
            _ = runner.run_cycle() => completed += 1,
        }

        tracing::debug!("Next cycle in at most {}s", period.as_secs());
    }

    tracing::info!("Scheduler stopped after {} cycles", completed);
    completed
}
