// # Sponsor Store Implementations
//
// This module provides implementations of the SponsorStore trait for
// different persistence strategies.

pub mod memory;
pub mod sqlite;

pub use memory::MemorySponsorStore;
pub use sqlite::SqliteSponsorStore;
