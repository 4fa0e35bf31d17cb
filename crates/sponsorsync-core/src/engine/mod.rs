//! Sponsor reconciler
//!
//! The Reconciler crawls every upstream sponsor page and merges each record
//! into the local store.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐
//! │ SponsorSource │─── SponsorPage ───┐
//! └───────────────┘                   │
//!                                     ▼
//!                            ┌──────────────┐
//!                            │  Reconciler  │
//!                            └──────────────┘
//!                                     │
//!                 ┌───────────────────┼───────────────────┐
//!                 │                   │                   │
//!                 ▼                   ▼                   ▼
//!         ┌──────────────┐   ┌──────────────┐    ┌─────────────┐
//!         │ SponsorStore │   │ SponsorStore │    │   Events    │
//!         │  (sponsors)  │   │  (metadata)  │    │  (notify)   │
//!         └──────────────┘   └──────────────┘    └─────────────┘
//! ```
//!
//! ## Run Flow
//!
//! 1. Claim the single-flight guard, or report `Skipped`
//! 2. Fetch page N; a fetch error aborts the run
//! 3. Merge every record; per-record failures are logged and skipped
//! 4. Continue while `page < total_page` and the page was full
//! 5. On completion, stamp the run metadata row
//!
//! An aborted run keeps every record merged before the failing page and
//! leaves the metadata row untouched.

pub mod observation;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::traits::{MergePolicy, SponsorItem, SponsorPage, SponsorSource, SponsorStore};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

pub use observation::{SkipReason, plan_upsert};

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A run claimed the guard and started crawling
    RunStarted,

    /// A run was requested while another was in progress
    RunSkipped,

    /// An upstream record was not merged
    RecordSkipped {
        account_id: String,
        reason: SkipReason,
    },

    /// The store rejected a record
    RecordFailed {
        account_id: String,
        error: String,
    },

    /// A page was processed
    PageSynced {
        page: usize,
        synced: usize,
        received: usize,
    },

    /// A page fetch failed and the run stopped
    RunAborted {
        page: usize,
        error: String,
    },

    /// Every page was processed and metadata was stamped
    RunCompleted {
        synced: usize,
        pages: usize,
    },
}

/// Result of one call to [`Reconciler::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another run held the guard; nothing was done
    Skipped,

    /// All pages were processed
    Completed {
        /// Records merged successfully
        synced: usize,
        /// Pages fetched
        pages: usize,
    },

    /// A page fetch failed
    Aborted {
        /// The page whose fetch failed
        page: usize,
        /// Records merged before the failure
        synced: usize,
        error: String,
    },
}

/// Releases the single-flight flag when dropped
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Sponsor reconciler
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`]
/// 2. Call [`Reconciler::run()`] directly, or hand it to a
///    [`SyncTrigger`](crate::trigger::SyncTrigger)
///
/// ## Concurrency
///
/// At most one run is in progress per Reconciler. A concurrent call returns
/// [`RunOutcome::Skipped`] immediately instead of queueing.
pub struct Reconciler {
    /// Upstream sponsor pages
    source: Box<dyn SponsorSource>,

    /// Local sponsor and metadata store
    store: Box<dyn SponsorStore>,

    /// Records requested per page
    page_size: usize,

    /// Pause between page fetches
    page_delay: Duration,

    /// Metadata row stamped after a completed run
    metadata_key: String,

    /// Single-flight flag
    running: AtomicBool,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SyncEvent>,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields sync events
    pub fn new(
        source: Box<dyn SponsorSource>,
        store: Box<dyn SponsorStore>,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let reconciler = Self {
            source,
            store,
            page_size: config.page_size,
            page_delay: Duration::from_millis(config.page_delay_ms),
            metadata_key: config.metadata_key,
            running: AtomicBool::new(false),
            event_tx: tx,
        };

        Ok((reconciler, rx))
    }

    /// Whether a run currently holds the guard
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one full reconciliation
    ///
    /// Never fails: upstream errors abort the run and are reported through
    /// the outcome, store errors are logged per record.
    pub async fn run(&self) -> RunOutcome {
        let Some(_guard) = RunGuard::try_acquire(&self.running) else {
            info!("Previous sponsor sync still in progress, skipping");
            self.emit_event(SyncEvent::RunSkipped);
            return RunOutcome::Skipped;
        };

        let started = Instant::now();
        info!("Starting sponsor sync from {}", self.source.source_name());
        self.emit_event(SyncEvent::RunStarted);

        let mut page = 1;
        let mut total_synced = 0;

        loop {
            let data = match self.source.query_sponsor(page, self.page_size).await {
                Ok(data) => data,
                Err(e) => {
                    error!("Failed to fetch sponsor page {}: {}", page, e);
                    self.emit_event(SyncEvent::RunAborted {
                        page,
                        error: e.to_string(),
                    });
                    return RunOutcome::Aborted {
                        page,
                        synced: total_synced,
                        error: e.to_string(),
                    };
                }
            };

            if data.list.is_empty() {
                debug!("Sponsor page {} is empty, stopping", page);
                break;
            }

            let synced = self.merge_page(&data.list).await;
            total_synced += synced;
            info!("Synced {}/{} sponsors (page {})", synced, data.list.len(), page);
            self.emit_event(SyncEvent::PageSynced {
                page,
                synced,
                received: data.list.len(),
            });

            if !self.has_next_page(page, &data) {
                break;
            }

            page += 1;
            if !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
        }

        self.stamp_metadata().await;

        info!(
            "Sponsor sync completed: {} sponsors over {} page(s) in {:?}",
            total_synced,
            page,
            started.elapsed()
        );
        self.emit_event(SyncEvent::RunCompleted {
            synced: total_synced,
            pages: page,
        });

        RunOutcome::Completed {
            synced: total_synced,
            pages: page,
        }
    }

    fn has_next_page(&self, page: usize, data: &SponsorPage) -> bool {
        (page as i64) < data.total_page && data.list.len() == self.page_size
    }

    /// Merge one page, returning the number of records stored
    async fn merge_page(&self, items: &[SponsorItem]) -> usize {
        let mut synced = 0;
        for item in items {
            if self.merge_item(item).await {
                synced += 1;
            }
        }
        synced
    }

    async fn merge_item(&self, item: &SponsorItem) -> bool {
        let upsert = match plan_upsert(item) {
            Ok(upsert) => upsert,
            Err(reason) => {
                warn!("Skipping sponsor {:?}: {}", item.user.user_id, reason);
                self.emit_event(SyncEvent::RecordSkipped {
                    account_id: item.user.user_id.clone(),
                    reason,
                });
                return false;
            }
        };

        match self.store.upsert_sponsor(&upsert, MergePolicy::default()).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to merge sponsor {}: {}", upsert.user_id, e);
                self.emit_event(SyncEvent::RecordFailed {
                    account_id: upsert.user_id,
                    error: e.to_string(),
                });
                false
            }
        }
    }

    async fn stamp_metadata(&self) {
        let now = chrono::Utc::now().timestamp();
        if let Err(e) = self
            .store
            .upsert_run_metadata(&self.metadata_key, &now.to_string(), now)
            .await
        {
            error!("Failed to update {} metadata: {}", self.metadata_key, e);
        }
    }

    /// Emit a sync event
    fn emit_event(&self, event: SyncEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // nobody is listening
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
