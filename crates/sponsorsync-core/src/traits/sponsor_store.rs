// # Sponsor Store Trait
//
// Defines the interface for persisting reconciled sponsors.
//
// ## Purpose
//
// The store holds one row per upstream account id plus a small key/value
// table of run metadata. Rows are created on first merge and only ever
// updated afterwards; this subsystem never deletes them.
//
// ## Merge Semantics
//
// Every upsert is a read-modify-write through [`merge_sponsor`], executed
// under a single-record lock (memory) or a single transaction (SQLite), so
// the sticky-field policy is identical across backends.
//
// ## Implementations
//
// - In-memory: `MemorySponsorStore`
// - SQLite: `SqliteSponsorStore`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Amount stored when upstream sends an empty one
pub const DEFAULT_AMOUNT: &str = "0.00";

/// A reconciled sponsor row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsorRecord {
    /// Upstream account id (immutable identity)
    pub user_id: String,
    /// Display name
    pub name: String,
    /// Avatar URL
    pub avatar: Option<String>,
    /// Cumulative contribution, decimal as string
    pub all_sum_amount: String,
    /// First contribution time as computed by the most recent merge
    pub create_time: i64,
    /// Sticky first contribution time
    pub first_pay_time: Option<i64>,
    /// Most recent contribution time, overwritten on every merge
    pub last_pay_time: Option<i64>,
    /// Local last-write time (epoch seconds)
    pub updated_at: i64,
}

/// The values one observation contributes to a merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsorUpsert {
    /// Upstream account id
    pub user_id: String,
    /// Display name
    pub name: String,
    /// Avatar URL
    pub avatar: Option<String>,
    /// Cumulative contribution, decimal as string
    pub all_sum_amount: String,
    /// Computed first contribution time
    pub create_time: i64,
    /// Computed first contribution time, `None` when unknown
    pub first_pay_time: Option<i64>,
    /// Computed most recent contribution time
    pub last_pay_time: Option<i64>,
}

/// How a field reacts to a new observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPolicy {
    /// Keep the stored value unless the observation supplies a non-empty one
    #[default]
    Sticky,
    /// Always take the observation's value, even when empty
    Overwrite,
}

/// Per-field merge policy for sponsor upserts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MergePolicy {
    /// Policy for `first_pay_time`
    pub first_pay_time: FieldPolicy,
}

/// A run metadata row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Fixed logical name
    pub key: String,
    /// Stored value
    pub value: String,
    /// Write time (epoch seconds)
    pub updated_at: i64,
}

/// Merge an observation into the existing row (if any)
///
/// Name, avatar, amount, `create_time` and `last_pay_time` are overwritten
/// unconditionally. `first_pay_time` follows `policy`. `updated_at` is set
/// to `now`. No ordering between first and last pay time is enforced.
pub fn merge_sponsor(
    existing: Option<&SponsorRecord>,
    upsert: &SponsorUpsert,
    policy: MergePolicy,
    now: i64,
) -> SponsorRecord {
    let incoming_first = upsert.first_pay_time.filter(|ts| *ts != 0);
    let first_pay_time = match (policy.first_pay_time, existing) {
        (FieldPolicy::Sticky, Some(existing)) => incoming_first.or(existing.first_pay_time),
        _ => incoming_first,
    };

    let avatar = upsert.avatar.clone().filter(|a| !a.is_empty());
    let all_sum_amount = if upsert.all_sum_amount.is_empty() {
        DEFAULT_AMOUNT.to_string()
    } else {
        upsert.all_sum_amount.clone()
    };

    SponsorRecord {
        user_id: upsert.user_id.clone(),
        name: upsert.name.clone(),
        avatar,
        all_sum_amount,
        create_time: upsert.create_time,
        first_pay_time,
        last_pay_time: upsert.last_pay_time.filter(|ts| *ts != 0),
        updated_at: now,
    }
}

/// Trait for sponsor store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
#[async_trait]
pub trait SponsorStore: Send + Sync {
    /// Insert or merge a sponsor keyed by its account id
    ///
    /// # Parameters
    ///
    /// - `upsert`: The observation to merge
    /// - `policy`: Sticky-field policy
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Merged
    /// - `Err(Error)`: Storage error
    async fn upsert_sponsor(
        &self,
        upsert: &SponsorUpsert,
        policy: MergePolicy,
    ) -> Result<(), crate::Error>;

    /// Get a sponsor by account id
    async fn get_sponsor(&self, user_id: &str) -> Result<Option<SponsorRecord>, crate::Error>;

    /// Number of stored sponsors
    async fn sponsor_count(&self) -> Result<usize, crate::Error>;

    /// Insert or overwrite a run metadata row
    ///
    /// # Parameters
    ///
    /// - `key`: Fixed logical name
    /// - `value`: Value to store
    /// - `timestamp`: Write time (epoch seconds)
    async fn upsert_run_metadata(
        &self,
        key: &str,
        value: &str,
        timestamp: i64,
    ) -> Result<(), crate::Error>;

    /// Get a run metadata row
    async fn get_run_metadata(&self, key: &str) -> Result<Option<RunMetadata>, crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upsert(first: Option<i64>, last: i64) -> SponsorUpsert {
        SponsorUpsert {
            user_id: "u1".to_string(),
            name: "Alice".to_string(),
            avatar: Some("https://img/a.png".to_string()),
            all_sum_amount: "10.00".to_string(),
            create_time: first.unwrap_or(last),
            first_pay_time: first,
            last_pay_time: Some(last),
        }
    }

    #[test]
    fn insert_writes_all_fields() {
        let record = merge_sponsor(None, &upsert(Some(100), 200), MergePolicy::default(), 999);
        assert_eq!(record.user_id, "u1");
        assert_eq!(record.first_pay_time, Some(100));
        assert_eq!(record.last_pay_time, Some(200));
        assert_eq!(record.create_time, 100);
        assert_eq!(record.updated_at, 999);
    }

    #[test]
    fn sticky_first_pay_time_survives_absent_observation() {
        let existing = merge_sponsor(None, &upsert(Some(100), 200), MergePolicy::default(), 1);
        let merged = merge_sponsor(
            Some(&existing),
            &upsert(None, 300),
            MergePolicy::default(),
            2,
        );
        assert_eq!(merged.first_pay_time, Some(100));
        assert_eq!(merged.last_pay_time, Some(300));
    }

    #[test]
    fn sticky_first_pay_time_treats_zero_as_absent() {
        let existing = merge_sponsor(None, &upsert(Some(100), 200), MergePolicy::default(), 1);
        let merged = merge_sponsor(
            Some(&existing),
            &upsert(Some(0), 300),
            MergePolicy::default(),
            2,
        );
        assert_eq!(merged.first_pay_time, Some(100));
    }

    #[test]
    fn overwrite_policy_clears_first_pay_time() {
        let existing = merge_sponsor(None, &upsert(Some(100), 200), MergePolicy::default(), 1);
        let policy = MergePolicy {
            first_pay_time: FieldPolicy::Overwrite,
        };
        let merged = merge_sponsor(Some(&existing), &upsert(None, 300), policy, 2);
        assert_eq!(merged.first_pay_time, None);
    }

    #[test]
    fn empty_amount_and_avatar_are_normalized() {
        let mut observation = upsert(Some(100), 200);
        observation.all_sum_amount = String::new();
        observation.avatar = Some(String::new());
        let record = merge_sponsor(None, &observation, MergePolicy::default(), 1);
        assert_eq!(record.all_sum_amount, DEFAULT_AMOUNT);
        assert_eq!(record.avatar, None);
    }
}
