//! Turning one upstream item into a store upsert
//!
//! Upstream may omit either pay-time field independently. The fallback
//! chains below pick the best available timestamp for each field; an item
//! with no usable timestamp at all is skipped rather than stored with zeros.

use crate::traits::{SponsorItem, SponsorUpsert};

/// Why an item was not merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The item carries no account id
    MissingAccountId,
    /// None of last/create/first pay time is set
    MissingTimestamp,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingAccountId => write!(f, "missing account id"),
            SkipReason::MissingTimestamp => write!(f, "missing time fields"),
        }
    }
}

/// First value that is present and positive, or 0
fn first_positive<const N: usize>(values: [Option<i64>; N]) -> i64 {
    values
        .into_iter()
        .flatten()
        .find(|ts| *ts > 0)
        .unwrap_or(0)
}

fn non_zero(ts: i64) -> Option<i64> {
    (ts != 0).then_some(ts)
}

/// Compute the upsert for one upstream item
///
/// - last pay time: upstream last, then create, then first
/// - first pay time: upstream first, then create, then the computed last
///
/// `first_pay_time <= last_pay_time` is not checked; inconsistent upstream
/// data is stored as received.
pub fn plan_upsert(item: &SponsorItem) -> Result<SponsorUpsert, SkipReason> {
    if item.user.user_id.is_empty() {
        return Err(SkipReason::MissingAccountId);
    }

    let last_pay_time = first_positive([item.last_pay_time, item.create_time, item.first_pay_time]);
    let first_pay_time = first_positive([item.first_pay_time, item.create_time, Some(last_pay_time)]);

    if last_pay_time == 0 {
        return Err(SkipReason::MissingTimestamp);
    }

    Ok(SponsorUpsert {
        user_id: item.user.user_id.clone(),
        name: item.user.name.clone(),
        avatar: Some(item.user.avatar.clone()).filter(|a| !a.is_empty()),
        all_sum_amount: item.all_sum_amount.clone(),
        create_time: first_pay_time,
        first_pay_time: non_zero(first_pay_time),
        last_pay_time: non_zero(last_pay_time),
    })
}
