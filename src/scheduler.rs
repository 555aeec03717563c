//! In-process poll scheduler
//!
//! Optional alternative to an external scheduler (cron, CI job). Cycles run
//! strictly one after another on a fixed interval, so two cycles never touch
//! the store at the same time within this process. A slow cycle delays the
//! next tick instead of stacking ticks up.

use crate::cycle::{CycleError, CycleOrchestrator};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// Run cycles every `poll_interval` until CTRL+C or a store failure
///
/// A running cycle is never interrupted; CTRL+C is only observed between
/// cycles.
pub async fn run_interval(orchestrator: &CycleOrchestrator, poll_interval: Duration) -> Result<(), CycleError> {
    log::info!("⏰ Starting poll scheduler (interval: {}s)", poll_interval.as_secs());

    let mut timer = interval(poll_interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = timer.tick() => {}
            _ = &mut shutdown => {
                log::info!("⚠️  Received CTRL+C, stopping scheduler");
                return Ok(());
            }
        }

        let report = orchestrator.run_cycle().await?;
        report.log();
    }
}
