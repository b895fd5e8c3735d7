//! Periodic pipeline runs.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::error::PipelineError;
use crate::services::pipeline::Pipeline;

/// Run the pipeline now and then every `every`. A tick that lands while a
/// manually triggered run is active is skipped.
pub fn spawn_scheduler(pipeline: Arc<Pipeline>, every: Duration) -> JoinHandle<()> {
    info!("Scheduling pipeline runs every {}s", every.as_secs());
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match pipeline.run().await {
                Ok(summary) => debug!(
                    "Scheduled run finished with {} recorded tickers",
                    summary.recorded.len()
                ),
                Err(PipelineError::RunInProgress) => {
                    debug!("Skipping scheduled run, another run is in progress")
                }
                Err(e) => error!("Scheduled run failed: {}", e),
            }
        }
    })
}
