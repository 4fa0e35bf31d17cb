//! Typed parameter sets for each upstream operation
//!
//! Fields serialize in declaration order and absent optionals are omitted,
//! so the signed `params` text is deterministic for a given value.

use serde::{Deserialize, Serialize};
use sponsorsync_core::config::MAX_PAGE_SIZE;
use sponsorsync_core::{Error, Result};

/// `/query-sponsor` parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SponsorQuery {
    pub page: usize,
    pub per_page: usize,
    /// Restrict to these account ids (comma separated)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl SponsorQuery {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self {
            page,
            per_page,
            user_id: None,
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.page == 0 {
            return Err(Error::invalid_input("page must be >= 1"));
        }
        if self.per_page == 0 || self.per_page > MAX_PAGE_SIZE {
            return Err(Error::invalid_input(format!(
                "per_page must be between 1 and {}. Got: {}",
                MAX_PAGE_SIZE, self.per_page
            )));
        }
        Ok(())
    }
}

/// `/query-order` parameters, all optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<usize>,
    /// Order numbers (comma separated)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_trade_no: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PlanQuery<'a> {
    pub plan_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct MessageParams<'a> {
    pub recipient: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RandomReplyQuery<'a> {
    pub out_trade_no: &'a str,
}

/// How `auto_random_reply` is applied to the existing list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyUpdateMode {
    Append,
    Overwrite,
}

/// `/update-plan-reply` parameters
///
/// Targets either a plan or a sku, never both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanReplyUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_random_reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_random_reply_type: Option<ReplyUpdateMode>,
}

impl PlanReplyUpdate {
    /// Update the replies of a subscription plan
    pub fn for_plan(plan_id: impl Into<String>) -> Self {
        Self {
            plan_id: Some(plan_id.into()),
            ..Self::default()
        }
    }

    /// Update the replies of a product sku
    pub fn for_sku(sku_id: impl Into<String>) -> Self {
        Self {
            sku_id: Some(sku_id.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let has_plan = self.plan_id.as_deref().is_some_and(|id| !id.is_empty());
        let has_sku = self.sku_id.as_deref().is_some_and(|id| !id.is_empty());

        match (has_plan, has_sku) {
            (true, true) => Err(Error::invalid_input(
                "plan_id and sku_id cannot both be provided",
            )),
            (false, false) => Err(Error::invalid_input("plan_id or sku_id is required")),
            _ => Ok(()),
        }
    }
}

pub(crate) fn require(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::invalid_input(format!("{name} is required")));
    }
    Ok(())
}
