//! Periodic sync trigger
//!
//! Fires one reconciliation immediately and then one per interval until
//! shutdown. Runs are spawned rather than awaited inline, so a run that
//! outlasts the interval meets the reconciler's single-flight guard
//! instead of delaying the schedule.
//!
//! ## Shutdown
//!
//! Shutdown stops the ticker only. Runs already in flight are awaited to
//! completion; a run is never cancelled between pages.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::{Reconciler, RunOutcome};
use crate::error::{Error, Result};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Drives a [`Reconciler`] on a fixed interval
pub struct SyncTrigger {
    reconciler: Arc<Reconciler>,
    interval: Duration,
}

impl SyncTrigger {
    /// Create a trigger for `reconciler` firing every `interval`
    ///
    /// A zero interval is rejected as a configuration error.
    pub fn new(reconciler: Arc<Reconciler>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::config("Sync interval must be > 0"));
        }
        Ok(Self { reconciler, interval })
    }

    /// Configured interval between runs
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Tick until `shutdown` resolves, then wait for in-flight runs
    ///
    /// Returns the number of runs fired.
    pub async fn run_until<F>(&self, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut runs: JoinSet<RunOutcome> = JoinSet::new();
        let mut fired = 0;

        tokio::pin!(shutdown);

        info!("Sync trigger started, interval {:?}", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    fired += 1;
                    debug!("Sync tick {}", fired);
                    let reconciler = Arc::clone(&self.reconciler);
                    runs.spawn(async move { reconciler.run().await });
                    reap_finished(&mut runs);
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping sync trigger");
                    break;
                }
            }
        }

        if !runs.is_empty() {
            info!("Waiting for {} in-flight sync run(s)", runs.len());
        }
        while let Some(joined) = runs.join_next().await {
            log_joined(joined);
        }

        info!("Sync trigger stopped after {} run(s)", fired);
        fired
    }
}

fn reap_finished(runs: &mut JoinSet<RunOutcome>) {
    while let Some(joined) = runs.try_join_next() {
        log_joined(joined);
    }
}

fn log_joined(joined: std::result::Result<RunOutcome, tokio::task::JoinError>) {
    match joined {
        Ok(outcome) => debug!("Sync run finished: {:?}", outcome),
        Err(e) => error!("Sync run task failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::state::MemorySponsorStore;
    use crate::traits::{SponsorPage, SponsorSource};

    struct EmptySource;

    #[async_trait::async_trait]
    impl SponsorSource for EmptySource {
        async fn query_sponsor(&self, _page: usize, _per_page: usize) -> Result<SponsorPage> {
            Ok(SponsorPage::default())
        }

        fn source_name(&self) -> &'static str {
            "empty"
        }
    }

    #[test]
    fn test_zero_interval_rejected() {
        let (reconciler, _events) = Reconciler::new(
            Box::new(EmptySource),
            Box::new(MemorySponsorStore::new()),
            EngineConfig::default(),
        )
        .unwrap();
        let reconciler = Arc::new(reconciler);

        assert!(SyncTrigger::new(Arc::clone(&reconciler), Duration::ZERO).is_err());
        let trigger = SyncTrigger::new(reconciler, Duration::from_secs(300)).unwrap();
        assert_eq!(trigger.interval(), Duration::from_secs(300));
    }
}
