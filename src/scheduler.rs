use crate::mention::{CycleStats, MentionProcessor};
use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{error, info};

/// Drives the mention processor on a fixed cadence, one cycle at a time.
pub struct Scheduler {
    processor: MentionProcessor,
    interval: Duration,
    cycle_deadline: Duration,
}

impl Scheduler {
    pub fn new(processor: MentionProcessor, interval: Duration, cycle_deadline: Duration) -> Self {
        Self {
            processor,
            interval,
            cycle_deadline,
        }
    }

    /// Runs cycles until `shutdown` resolves. An in-flight cycle is allowed to finish.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            "Scheduler: running a cycle every {} (deadline {})",
            humantime::format_duration(self.interval),
            humantime::format_duration(self.cycle_deadline)
        );

        // Ticks missed while a cycle runs are dropped, never queued.
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Scheduler: shutdown requested, stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_once().await;
                }
            }
        }
    }

    pub async fn run_once(&self) -> Option<CycleStats> {
        info!("Starting job: {}", Utc::now().to_rfc3339());

        match timeout(self.cycle_deadline, self.processor.execute_cycle()).await {
            Ok(Ok(stats)) => {
                info!(
                    "Finished job: {}, Found: {}, Replied: {}, Errors: {}",
                    Utc::now().to_rfc3339(),
                    stats.mentions_found,
                    stats.replies_sent,
                    stats.reply_errors
                );
                info!(
                    "Cycle detail: considered {}, no root {}, self {}, already handled {}, root errors {}",
                    stats.mentions_considered,
                    stats.skipped_no_root,
                    stats.skipped_self,
                    stats.skipped_already_handled,
                    stats.root_errors
                );
                Some(stats)
            }
            Ok(Err(e)) => {
                error!("Mention cycle failed: {:#}", e);
                None
            }
            Err(_) => {
                error!(
                    "Mention cycle exceeded its deadline of {}, abandoning",
                    humantime::format_duration(self.cycle_deadline)
                );
                None
            }
        }
    }
}
