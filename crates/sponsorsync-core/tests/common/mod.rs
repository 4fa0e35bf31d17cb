//! Test doubles and common utilities for reconciler contract tests
//!
//! This module provides minimal test doubles that let the contract tests
//! script upstream pages and observe store traffic.

#![allow(dead_code)]

use sponsorsync_core::config::EngineConfig;
use sponsorsync_core::engine::SyncEvent;
use sponsorsync_core::error::{Error, Result};
use sponsorsync_core::state::MemorySponsorStore;
use sponsorsync_core::traits::{
    MergePolicy, RunMetadata, SponsorItem, SponsorPage, SponsorRecord, SponsorSource,
    SponsorStore, SponsorUpsert, SponsorUser,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, mpsc};

/// Build an upstream item
pub fn sponsor(user_id: &str, first: i64, create: i64, last: i64) -> SponsorItem {
    SponsorItem {
        user: SponsorUser {
            user_id: user_id.to_string(),
            name: format!("name-{user_id}"),
            avatar: format!("https://pic.example/{user_id}.png"),
        },
        all_sum_amount: "5.00".to_string(),
        create_time: Some(create),
        first_pay_time: Some(first),
        last_pay_time: Some(last),
    }
}

/// Build a page of `count` distinct sponsors with ids `p{page}-{n}`
pub fn full_page(page: usize, count: usize, total_page: i64) -> SponsorPage {
    let list = (0..count)
        .map(|n| sponsor(&format!("p{page}-{n}"), 100, 100, 200))
        .collect();
    SponsorPage {
        total_count: total_page * count as i64,
        total_page,
        list,
    }
}

/// Build a page from explicit items
pub fn page_of(list: Vec<SponsorItem>, total_page: i64) -> SponsorPage {
    SponsorPage {
        total_count: list.len() as i64,
        total_page,
        list,
    }
}

/// Engine config with no inter-page delay
pub fn fast_config(page_size: usize) -> EngineConfig {
    EngineConfig::default()
        .with_page_size(page_size)
        .with_page_delay_ms(0)
}

/// Drain every event currently buffered in the channel
pub fn drain_events(rx: &mut mpsc::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// A SponsorSource serving scripted pages
///
/// Unscripted pages are served empty. Clones share the script and the
/// recorded requests.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    pages: Arc<Mutex<HashMap<usize, std::result::Result<SponsorPage, String>>>>,
    /// (page, per_page) of every call, in order
    requests: Arc<Mutex<Vec<(usize, usize)>>>,
    /// When set, every call waits for one permit before answering
    gate: Option<Arc<Notify>>,
    /// Calls currently waiting on the gate
    waiting: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `page` for request `number`
    pub fn with_page(self, number: usize, page: SponsorPage) -> Self {
        self.pages.lock().unwrap().insert(number, Ok(page));
        self
    }

    /// Fail request `number` with a transport error
    pub fn failing_on(self, number: usize, message: &str) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(number, Err(message.to_string()));
        self
    }

    /// Hold every call until the gate is notified
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn requested_pages(&self) -> Vec<usize> {
        self.requests.lock().unwrap().iter().map(|(p, _)| *p).collect()
    }

    pub fn requests(&self) -> Vec<(usize, usize)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SponsorSource for ScriptedSource {
    async fn query_sponsor(&self, page: usize, per_page: usize) -> Result<SponsorPage> {
        self.requests.lock().unwrap().push((page, per_page));

        if let Some(gate) = &self.gate {
            self.waiting.fetch_add(1, Ordering::SeqCst);
            gate.notified().await;
            self.waiting.fetch_sub(1, Ordering::SeqCst);
        }

        let scripted = self.pages.lock().unwrap().get(&page).cloned();
        match scripted {
            Some(Ok(data)) => Ok(data),
            Some(Err(message)) => Err(Error::transport(message)),
            None => Ok(SponsorPage::default()),
        }
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// A SponsorStore wrapping MemorySponsorStore that rejects chosen accounts
/// and, optionally, every metadata write
#[derive(Clone, Default)]
pub struct FailingStore {
    inner: MemorySponsorStore,
    reject: Arc<Mutex<HashSet<String>>>,
    reject_metadata: Arc<AtomicBool>,
    upsert_call_count: Arc<AtomicUsize>,
    metadata_call_count: Arc<AtomicUsize>,
}

impl FailingStore {
    pub fn new(inner: MemorySponsorStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Reject upserts for `user_id`
    pub fn rejecting(self, user_id: &str) -> Self {
        self.reject.lock().unwrap().insert(user_id.to_string());
        self
    }

    /// Reject every metadata write
    pub fn rejecting_metadata(self) -> Self {
        self.reject_metadata.store(true, Ordering::SeqCst);
        self
    }

    pub fn upsert_call_count(&self) -> usize {
        self.upsert_call_count.load(Ordering::SeqCst)
    }

    pub fn metadata_call_count(&self) -> usize {
        self.metadata_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SponsorStore for FailingStore {
    async fn upsert_sponsor(&self, upsert: &SponsorUpsert, policy: MergePolicy) -> Result<()> {
        self.upsert_call_count.fetch_add(1, Ordering::SeqCst);
        if self.reject.lock().unwrap().contains(&upsert.user_id) {
            return Err(Error::store(format!("constraint failed for {}", upsert.user_id)));
        }
        self.inner.upsert_sponsor(upsert, policy).await
    }

    async fn get_sponsor(&self, user_id: &str) -> Result<Option<SponsorRecord>> {
        self.inner.get_sponsor(user_id).await
    }

    async fn sponsor_count(&self) -> Result<usize> {
        self.inner.sponsor_count().await
    }

    async fn upsert_run_metadata(&self, key: &str, value: &str, timestamp: i64) -> Result<()> {
        self.metadata_call_count.fetch_add(1, Ordering::SeqCst);
        if self.reject_metadata.load(Ordering::SeqCst) {
            return Err(Error::store(format!("database is locked ({key})")));
        }
        self.inner.upsert_run_metadata(key, value, timestamp).await
    }

    async fn get_run_metadata(&self, key: &str) -> Result<Option<RunMetadata>> {
        self.inner.get_run_metadata(key).await
    }
}
