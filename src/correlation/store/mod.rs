// src/correlation/store/mod.rs
//!
//! Storage boundary for threat and analysis records
//!
//! The correlation engine never holds a live reference into a store; it
//! looks records up per resolution call and mutates them only through the
//! narrow update methods below. The in-memory implementations back the
//! server; the traits are the seam a persistent backend would implement.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::correlation::models::{AnalysisRecord, ThreatId, ThreatIndex, ThreatRecord};
use crate::error::{OtwatchError, Result};

/// Lookup/update boundary over canonical threat records
#[async_trait]
pub trait ThreatStore: Send + Sync {
    /// Insert a freshly ingested record. The index must have been reserved
    /// through [`ThreatStore::reserve_index`].
    async fn insert(&self, record: ThreatRecord) -> Result<ThreatRecord>;

    async fn find_by_index(&self, index: ThreatIndex) -> Option<ThreatRecord>;

    async fn find_by_timestamp(&self, instant: DateTime<Utc>) -> Option<ThreatRecord>;

    /// All records whose event timestamp lies in `[start, end]`, both
    /// bounds inclusive, in ascending index order
    async fn find_by_timestamp_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<ThreatRecord>;

    /// Set the classification label of one record. Returns `true` when the
    /// stored value actually changed; reapplying the current label is a
    /// no-op. Concurrent updates to the same record are last-write-wins.
    async fn update_classification(&self, threat_id: &str, label: &str) -> Result<bool>;

    /// Hand out the next unused index. Indices are monotonic, unique, and
    /// never reused; the first reservation on an empty store yields `start`.
    async fn reserve_index(&self, start: ThreatIndex) -> ThreatIndex;

    /// Records with an index strictly above `watermark`, ascending. The
    /// caller keeps the watermark; the store has no notion of "already
    /// seen".
    async fn poll_since(&self, watermark: ThreatIndex) -> Vec<ThreatRecord>;

    /// Newest records first (by index), at most `limit`
    async fn recent(&self, limit: usize) -> Vec<ThreatRecord>;

    async fn count(&self) -> usize;

    /// Records whose event timestamp is at or after `since`
    async fn count_since(&self, since: DateTime<Utc>) -> usize;

    /// Snapshot of every record, ascending index order
    async fn list_all(&self) -> Vec<ThreatRecord>;
}

/// In-memory threat store keyed by index
///
/// A `BTreeMap` keeps iteration in ascending index order, which makes the
/// window-scan tie-break deterministic.
#[derive(Debug, Default)]
pub struct MemoryThreatStore {
    records: RwLock<BTreeMap<ThreatIndex, ThreatRecord>>,
    ids: RwLock<HashMap<ThreatId, ThreatIndex>>,
    next_index: AtomicU32,
    classification_updates: AtomicUsize,
}

impl MemoryThreatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of classification updates that actually changed a record.
    /// Reapplying an identical label does not move this counter.
    pub fn classification_update_count(&self) -> usize {
        self.classification_updates.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ThreatStore for MemoryThreatStore {
    async fn insert(&self, record: ThreatRecord) -> Result<ThreatRecord> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        if records.contains_key(&record.threat_index) {
            return Err(OtwatchError::StoreError(format!(
                "threat index {} already in use",
                record.threat_index
            )));
        }
        let mut ids = self.ids.write().unwrap_or_else(|e| e.into_inner());
        ids.insert(record.threat_id.clone(), record.threat_index);
        // Keep reservations ahead of any directly inserted index
        self.next_index
            .fetch_max(record.threat_index.saturating_add(1), Ordering::SeqCst);
        records.insert(record.threat_index, record.clone());
        Ok(record)
    }

    async fn find_by_index(&self, index: ThreatIndex) -> Option<ThreatRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.get(&index).cloned()
    }

    async fn find_by_timestamp(&self, instant: DateTime<Utc>) -> Option<ThreatRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records
            .values()
            .find(|r| r.event_timestamp == instant)
            .cloned()
    }

    async fn find_by_timestamp_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<ThreatRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records
            .values()
            .filter(|r| r.event_timestamp >= start && r.event_timestamp <= end)
            .cloned()
            .collect()
    }

    async fn update_classification(&self, threat_id: &str, label: &str) -> Result<bool> {
        let index = {
            let ids = self.ids.read().unwrap_or_else(|e| e.into_inner());
            ids.get(threat_id).copied()
        };
        let Some(index) = index else {
            return Err(OtwatchError::StoreError(format!(
                "unknown threat id {}",
                threat_id
            )));
        };

        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let record = records.get_mut(&index).ok_or_else(|| {
            OtwatchError::StoreError(format!("threat index {} vanished", index))
        })?;

        if record.threat_type == label {
            return Ok(false);
        }
        record.threat_type = label.to_string();
        self.classification_updates.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    async fn reserve_index(&self, start: ThreatIndex) -> ThreatIndex {
        self.next_index.fetch_max(start, Ordering::SeqCst);
        self.next_index.fetch_add(1, Ordering::SeqCst)
    }

    async fn poll_since(&self, watermark: ThreatIndex) -> Vec<ThreatRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records
            .range(watermark.saturating_add(1)..)
            .map(|(_, r)| r.clone())
            .collect()
    }

    async fn recent(&self, limit: usize) -> Vec<ThreatRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.values().rev().take(limit).cloned().collect()
    }

    async fn count(&self) -> usize {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.len()
    }

    async fn count_since(&self, since: DateTime<Utc>) -> usize {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records
            .values()
            .filter(|r| r.event_timestamp >= since)
            .count()
    }

    async fn list_all(&self) -> Vec<ThreatRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.values().cloned().collect()
    }
}

/// Persistence boundary for resolved analysis records
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn insert_batch(&self, batch: Vec<AnalysisRecord>) -> Result<usize>;

    /// One page of records, newest first, plus the total count
    async fn page(&self, page: usize, size: usize) -> (Vec<AnalysisRecord>, usize);

    /// Newest records first, at most `limit`
    async fn recent(&self, limit: usize) -> Vec<AnalysisRecord>;

    /// Records whose timestamp is at or after `since`
    async fn count_since(&self, since: DateTime<Utc>) -> usize;

    async fn count(&self) -> usize;
}

/// In-memory analysis store
#[derive(Debug, Default)]
pub struct MemoryAnalysisStore {
    records: RwLock<Vec<AnalysisRecord>>,
}

impl MemoryAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted_desc(&self) -> Vec<AnalysisRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        let mut sorted = records.clone();
        sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        sorted
    }
}

#[async_trait]
impl AnalysisStore for MemoryAnalysisStore {
    async fn insert_batch(&self, batch: Vec<AnalysisRecord>) -> Result<usize> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let inserted = batch.len();
        records.extend(batch);
        Ok(inserted)
    }

    async fn page(&self, page: usize, size: usize) -> (Vec<AnalysisRecord>, usize) {
        let sorted = self.sorted_desc();
        let total = sorted.len();
        let page_items = sorted
            .into_iter()
            .skip(page.saturating_mul(size))
            .take(size)
            .collect();
        (page_items, total)
    }

    async fn recent(&self, limit: usize) -> Vec<AnalysisRecord> {
        self.sorted_desc().into_iter().take(limit).collect()
    }

    async fn count_since(&self, since: DateTime<Utc>) -> usize {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.iter().filter(|r| r.timestamp >= since).count()
    }

    async fn count(&self) -> usize {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.len()
    }
}
