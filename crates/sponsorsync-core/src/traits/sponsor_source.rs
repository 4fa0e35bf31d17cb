// # Sponsor Source Trait
//
// Defines the interface for fetching sponsor pages from upstream.
//
// ## Implementations
//
// - Afdian open API: `sponsorsync-afdian` crate
//
// ## Usage
//
// ```rust,ignore
// use sponsorsync_core::SponsorSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* SponsorSource implementation */;
//
//     let page = source.query_sponsor(1, 100).await?;
//     println!("{} of {} pages", page.list.len(), page.total_page);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

/// Decode `null` the same as a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// The account an upstream sponsorship belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsorUser {
    /// Opaque upstream account id
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_id: String,

    /// Display name
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    /// Avatar URL
    #[serde(default, deserialize_with = "null_as_default")]
    pub avatar: String,
}

/// One sponsor entry of an upstream page
///
/// Upstream may omit any of the time fields independently; absent and
/// `null` both decode as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsorItem {
    /// Sponsoring account (missing or `null` decodes as an empty account id)
    #[serde(default, deserialize_with = "null_as_default")]
    pub user: SponsorUser,

    /// Cumulative contribution, decimal as string
    #[serde(default, deserialize_with = "null_as_default")]
    pub all_sum_amount: String,

    /// Creation time (epoch seconds)
    #[serde(default)]
    pub create_time: Option<i64>,

    /// First contribution time (epoch seconds)
    #[serde(default)]
    pub first_pay_time: Option<i64>,

    /// Most recent contribution time (epoch seconds)
    #[serde(default)]
    pub last_pay_time: Option<i64>,
}

/// One page of the upstream sponsor list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsorPage {
    /// Total number of sponsors upstream
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_count: i64,

    /// Total number of pages at the requested page size
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_page: i64,

    /// Sponsors on this page
    #[serde(default, deserialize_with = "null_as_default")]
    pub list: Vec<SponsorItem>,
}

/// Trait for upstream sponsor sources
///
/// Implementations perform exactly one upstream request per call and never
/// retry; retry policy belongs to the caller. The `Reconciler` treats every
/// error as fatal for the current run.
#[async_trait]
pub trait SponsorSource: Send + Sync {
    /// Fetch one page of sponsors
    ///
    /// # Parameters
    ///
    /// - `page`: 1-based page number
    /// - `per_page`: page size, 1..=100
    ///
    /// # Returns
    ///
    /// - `Ok(SponsorPage)`: The decoded page
    /// - `Err(Error)`: Transport, status, envelope, upstream or payload failure
    async fn query_sponsor(
        &self,
        page: usize,
        per_page: usize,
    ) -> Result<SponsorPage, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}
