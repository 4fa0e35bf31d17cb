// # Afdian Open API Client
//
// This crate provides the signed upstream client for the sponsor
// synchronization service and implements `SponsorSource` on top of it.
//
// ## Behavior
//
// - One HTTP request per call; no retries, caching or background tasks
// - Every call is a signed `POST {base_url}{endpoint}` with a JSON body
// - HTTP timeout configured (default 30 seconds)
// - Responses are unwrapped from the `{ec, em, data}` envelope; `ec != 200`
//   surfaces `em` verbatim
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
// - API token MUST be provided via environment variables only
// - Client construction fails fast if the token is empty
//
// ## Endpoints
//
// - `/query-sponsor`      `{page, per_page, user_id?}`
// - `/query-order`        `{page?, per_page?, out_trade_no?}`
// - `/query-plan`         `{plan_id}`
// - `/send-msg`           `{recipient, content}`
// - `/query-random-reply` `{out_trade_no}`
// - `/update-plan-reply`  `{plan_id | sku_id, auto_reply?, auto_random_reply?, update_random_reply_type?}`
// - `/ping`               arbitrary

pub mod params;
pub mod signature;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sponsorsync_core::config::UpstreamConfig;
use sponsorsync_core::traits::{SponsorPage, SponsorSource};
use sponsorsync_core::{Error, Result};
use std::time::Duration;

pub use params::{OrderQuery, PlanReplyUpdate, ReplyUpdateMode, SponsorQuery};
pub use signature::{SignedRequest, build_signed_request, build_signed_request_at, sign};

use params::{MessageParams, PlanQuery, RandomReplyQuery, require};

/// Success code of the response envelope
const EC_OK: i64 = 200;

/// Response envelope shared by every endpoint
#[derive(Debug, serde::Deserialize)]
struct Envelope {
    ec: i64,
    #[serde(default)]
    em: String,
    #[serde(default)]
    data: Value,
}

/// Signed client for the Afdian open API
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API token.
pub struct AfdianClient {
    /// Account id the requests are signed for
    user_id: String,

    /// Signing secret
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Base URL without trailing slash
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for AfdianClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AfdianClient")
            .field("user_id", &self.user_id)
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AfdianClient {
    /// Create a client from upstream configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            user_id: config.user_id.clone(),
            api_token: config.api_token.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sign `params`, POST them to `endpoint` and decode the envelope's data
    async fn request<P, T>(&self, endpoint: &str, params: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = build_signed_request(params, &self.user_id, &self.api_token)?;
        let url = format!("{}{}", self.base_url, endpoint);

        tracing::debug!("POST {} (ts={})", endpoint, body.ts);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::transport(format!("{} request failed: {}", endpoint, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("{} response unreadable: {}", endpoint, e)))?;

        if status != reqwest::StatusCode::OK {
            tracing::warn!("{} answered HTTP {}", endpoint, status);
            return Err(Error::http_status(status.as_u16(), text));
        }

        let envelope: Envelope = serde_json::from_str(&text)
            .map_err(|e| Error::envelope_decode(format!("{}: {}", endpoint, e)))?;

        if envelope.ec != EC_OK {
            return Err(Error::upstream(envelope.ec, envelope.em));
        }

        serde_json::from_value(envelope.data)
            .map_err(|e| Error::payload_decode(format!("{}: {}", endpoint, e)))
    }

    /// Query one page of sponsors
    pub async fn query_sponsors(&self, query: &SponsorQuery) -> Result<SponsorPage> {
        query.validate()?;
        self.request("/query-sponsor", query).await
    }

    /// Query orders
    pub async fn query_order(&self, query: &OrderQuery) -> Result<Value> {
        self.request("/query-order", query).await
    }

    /// Query plan details
    pub async fn query_plan(&self, plan_id: &str) -> Result<Value> {
        require("plan_id", plan_id)?;
        self.request("/query-plan", &PlanQuery { plan_id }).await
    }

    /// Send a private message
    pub async fn send_msg(&self, recipient: &str, content: &str) -> Result<Value> {
        require("recipient", recipient)?;
        require("content", content)?;
        self.request("/send-msg", &MessageParams { recipient, content })
            .await
    }

    /// Query random replies attached to orders
    pub async fn query_random_reply(&self, out_trade_no: &str) -> Result<Value> {
        require("out_trade_no", out_trade_no)?;
        self.request("/query-random-reply", &RandomReplyQuery { out_trade_no })
            .await
    }

    /// Update the automatic replies of a plan or sku
    pub async fn update_plan_reply(&self, update: &PlanReplyUpdate) -> Result<Value> {
        update.validate()?;
        self.request("/update-plan-reply", update).await
    }

    /// Signature check endpoint; echoes what it received
    pub async fn ping<P>(&self, params: &P) -> Result<Value>
    where
        P: Serialize + ?Sized + Sync,
    {
        self.request("/ping", params).await
    }
}

#[async_trait]
impl SponsorSource for AfdianClient {
    async fn query_sponsor(&self, page: usize, per_page: usize) -> Result<SponsorPage> {
        self.query_sponsors(&SponsorQuery::new(page, per_page)).await
    }

    fn source_name(&self) -> &'static str {
        "afdian"
    }
}
