// src/ingest/mod.rs
//!
//! Ingestion services feeding the correlation core and the broadcast hub
//!
//! Two inbound flows: ML/DL risk alarms become new threat records and are
//! pushed on the threat topic immediately; XAI analysis batches flow item
//! by item through the correlation engine, are persisted, and produce one
//! `analysis_ready` notification per distinct bound threat. A malformed
//! batch item is skipped with a warning, never fatal for the rest of the
//! batch.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde_json::json;
use uuid::Uuid;

use crate::broadcast::Broadcaster;
use crate::correlation::engine::CorrelationEngine;
use crate::correlation::models::{
    AnalysisRecord, AnalysisResult, DetectionEngine, RiskAlarm, ThreatLevel, ThreatRecord,
    ThreatStatus,
};
use crate::correlation::store::{AnalysisStore, ThreatStore};
use crate::error::{OtwatchError, Result};

/// Turns validated risk alarms into stored threat records
pub struct AlarmIngestor {
    store: Arc<dyn ThreatStore>,
    hub: Arc<Broadcaster>,
    index_start: u32,
}

impl AlarmIngestor {
    pub fn new(store: Arc<dyn ThreatStore>, hub: Arc<Broadcaster>, index_start: u32) -> Self {
        Self {
            store,
            hub,
            index_start,
        }
    }

    /// Validate and store one alarm, then push it on the threat topic.
    ///
    /// Rejections (bad engine tag, missing or unparsable detection time)
    /// surface as `IngestError` so the API layer can answer 400.
    pub async fn ingest_risk_alarm(
        &self,
        engine_tag: &str,
        alarm: RiskAlarm,
    ) -> Result<ThreatRecord> {
        let risk = alarm
            .risk
            .ok_or_else(|| OtwatchError::IngestError("risk payload is required".to_string()))?;
        let engine = DetectionEngine::from_ingest_tag(engine_tag)
            .ok_or_else(|| OtwatchError::IngestError("engine must be ML or DL".to_string()))?;
        let detected_at = parse_detected_time(risk.detected_time.as_deref())?;

        let score = normalize_score(risk.score);
        let threat_index = self.store.reserve_index(self.index_start).await;

        let record = ThreatRecord {
            threat_id: format!("{}-{}", engine.as_str(), Uuid::new_v4()),
            threat_index,
            event_timestamp: detected_at,
            detection_engine: engine,
            source_ip: risk.src_ip.unwrap_or_default(),
            source_asset: risk.src_asset.unwrap_or_default(),
            destination_ip: risk.dst_ip.unwrap_or_default(),
            destination_asset: risk.dst_asset.unwrap_or_default(),
            threat_type: String::new(),
            threat_level: ThreatLevel::from_score(score),
            status: ThreatStatus::New,
            score,
            created_at: Utc::now(),
        };

        let saved = self.store.insert(record).await?;

        match serde_json::to_value(&saved) {
            Ok(payload) => {
                self.hub.send_threat(payload);
                info!("new threat pushed in real time: {}", saved.threat_id);
            }
            Err(e) => warn!("threat push skipped, serialization failed: {}", e),
        }

        Ok(saved)
    }
}

fn parse_detected_time(raw: Option<&str>) -> Result<DateTime<Utc>> {
    let raw = raw
        .ok_or_else(|| OtwatchError::IngestError("detected_time is required".to_string()))?;
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| {
            OtwatchError::IngestError("detected_time must be ISO-8601 format".to_string())
        })
}

/// Clamp malformed scores to zero
fn normalize_score(score: Option<f64>) -> f64 {
    match score {
        Some(s) if s.is_finite() && s >= 0.0 => s,
        _ => 0.0,
    }
}

/// Runs analysis batches through the correlation engine and persists the
/// resolved records
pub struct AnalysisIngestor {
    engine: Arc<CorrelationEngine>,
    analyses: Arc<dyn AnalysisStore>,
    hub: Arc<Broadcaster>,
}

impl AnalysisIngestor {
    pub fn new(
        engine: Arc<CorrelationEngine>,
        analyses: Arc<dyn AnalysisStore>,
        hub: Arc<Broadcaster>,
    ) -> Self {
        Self {
            engine,
            analyses,
            hub,
        }
    }

    /// Process an ordered batch of analysis results.
    ///
    /// Each item flows through resolution independently; malformed items
    /// are skipped and logged. Returns the number of records stored.
    pub async fn ingest_batch(&self, batch: Vec<AnalysisResult>) -> Result<usize> {
        if batch.is_empty() {
            info!("received an empty analysis batch");
            return Ok(0);
        }

        let mut records = Vec::with_capacity(batch.len());
        for item in &batch {
            match self.map_to_record(item).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!("skipping malformed analysis item: {}", e),
            }
        }

        if records.is_empty() {
            warn!("no valid analysis data in batch, nothing stored");
            return Ok(0);
        }

        let bound_threats: BTreeSet<String> = records
            .iter()
            .filter_map(|r| r.threat_id.clone())
            .collect();

        let stored = self.analyses.insert_batch(records).await?;
        info!("stored {} analysis results", stored);

        let stamp = Utc::now().to_rfc3339();
        for threat_id in bound_threats {
            self.hub.send_analysis_ready(json!({
                "type": "xai_analysis_ready",
                "threat_id": threat_id,
                "timestamp": stamp,
            }));
        }

        Ok(stored)
    }

    /// Resolve one item and build its persisted record.
    ///
    /// Resolution runs before the timestamp check so an index-only item
    /// still binds through the fast path. `Ok(None)` means the item stayed
    /// unbound and carried no timestamp to persist under; `Err` means it
    /// was structurally invalid.
    async fn map_to_record(&self, item: &AnalysisResult) -> Result<Option<AnalysisRecord>> {
        let timestamp = CorrelationEngine::parse_timestamp(item.timestamp.as_deref())?;

        let outcome = self.engine.resolve(item).await?;
        let (threat_id, threat_index, matched_at) = match outcome.resolved() {
            Some(resolved) => (
                Some(resolved.threat_id.clone()),
                Some(resolved.threat_index),
                Some(resolved.event_timestamp),
            ),
            None => (None, item.threat_index, None),
        };

        // A bound match stands in for a missing timestamp; an unbound
        // item without one has no instant to persist under.
        let Some(timestamp) = timestamp.or(matched_at) else {
            warn!(
                "analysis without timestamp skipped: index={:?}",
                item.threat_index
            );
            return Ok(None);
        };

        Ok(Some(AnalysisRecord::from_result(
            item,
            timestamp,
            threat_id,
            threat_index,
        )))
    }
}
