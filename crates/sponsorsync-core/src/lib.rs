// # sponsorsync-core
//
// Core library for the sponsor synchronization service.
//
// ## Architecture Overview
//
// This library mirrors a remote sponsor list into a local store:
// - **SponsorSource**: Trait for fetching paginated sponsor records from upstream
// - **SponsorStore**: Trait for persisting reconciled sponsors and run metadata
// - **Reconciler**: Crawls every page and merges records, one run at a time
// - **SyncTrigger**: Fires the Reconciler at startup and on a fixed interval
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from the upstream client
// 2. **Library-First**: All core functionality can be used as a library
// 3. **Idempotency**: Re-running a sync over unchanged upstream data changes nothing
//    but `updated_at`

pub mod traits;
pub mod engine;
pub mod trigger;
pub mod config;
pub mod error;
pub mod state;

// Re-export core types for convenience
pub use traits::{SponsorSource, SponsorStore};
pub use engine::{Reconciler, RunOutcome, SyncEvent};
pub use trigger::SyncTrigger;
pub use config::{EngineConfig, StoreConfig, SyncConfig, UpstreamConfig};
pub use error::{Error, Result};
pub use state::{MemorySponsorStore, SqliteSponsorStore};
