//! Core traits for the sponsor synchronization engine
//!
//! This module defines the abstract interfaces the `Reconciler` depends on.
//!
//! - [`SponsorSource`]: Fetch sponsor pages from upstream
//! - [`SponsorStore`]: Persist reconciled sponsors and run metadata

pub mod sponsor_source;
pub mod sponsor_store;

pub use sponsor_source::{SponsorItem, SponsorPage, SponsorSource, SponsorUser};
pub use sponsor_store::{
    FieldPolicy, MergePolicy, RunMetadata, SponsorRecord, SponsorStore, SponsorUpsert,
    merge_sponsor,
};
