// src/correlation/engine/mod.rs
//!
//! Resolution of analysis results against stored threat records
//!
//! Matching policy, first success wins:
//! 1. exact threat index
//! 2. exact event timestamp (parsed instants, not raw strings)
//! 3. tolerant window scan, preferring a classification-label match, then
//!    the smallest timestamp distance, ties broken by lowest index
//!
//! A miss is a normal outcome, not an error; the only hard failure is a
//! timestamp that is present but unparsable.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::correlation::models::{
    AnalysisResult, CorrelationWindow, ThreatId, ThreatIndex, ThreatRecord,
};
use crate::correlation::store::ThreatStore;
use crate::error::{OtwatchError, Result};

/// Reference to the threat record an analysis was bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedThreat {
    pub threat_id: ThreatId,
    pub threat_index: ThreatIndex,
    /// Event instant of the matched record, for callers persisting an
    /// analysis that carried no timestamp of its own
    pub event_timestamp: DateTime<Utc>,
}

/// Outcome of one resolution call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Resolved(ResolvedThreat),
    Unresolved,
}

impl MatchOutcome {
    pub fn resolved(&self) -> Option<&ResolvedThreat> {
        match self {
            MatchOutcome::Resolved(r) => Some(r),
            MatchOutcome::Unresolved => None,
        }
    }
}

/// Binds analysis results to threat records.
///
/// Holds no record references across calls; every resolution goes back
/// through the store's lookup and update methods.
pub struct CorrelationEngine {
    store: Arc<dyn ThreatStore>,
    window: CorrelationWindow,
}

impl CorrelationEngine {
    pub fn new(store: Arc<dyn ThreatStore>, window: CorrelationWindow) -> Self {
        Self { store, window }
    }

    /// Parse the optional ISO-8601 timestamp of an analysis result.
    ///
    /// Absent or blank is fine (`None`); a present but unparsable value is
    /// the one structurally-invalid input that fails a batch item.
    pub fn parse_timestamp(raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
        let Some(raw) = raw else {
            return Ok(None);
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        DateTime::parse_from_rfc3339(trimmed)
            .map(|parsed| Some(parsed.with_timezone(&Utc)))
            .map_err(|e| {
                OtwatchError::IngestError(format!("unparsable analysis timestamp '{}': {}", raw, e))
            })
    }

    /// Resolve an analysis result to the threat record it explains.
    ///
    /// On a match, synchronizes the incoming classification label onto the
    /// record (no-op when equal). Returns `Err` only for an unparsable
    /// timestamp; a plain miss is `Ok(Unresolved)`.
    pub async fn resolve(&self, analysis: &AnalysisResult) -> Result<MatchOutcome> {
        let timestamp = Self::parse_timestamp(analysis.timestamp.as_deref())?;

        if let Some(index) = analysis.threat_index {
            if let Some(record) = self.store.find_by_index(index).await {
                info!("threat matched by index: threat_index={}", index);
                return self.bind(&record, analysis).await;
            }
        }

        if let Some(target) = timestamp {
            if let Some(record) = self.store.find_by_timestamp(target).await {
                info!("threat matched by exact timestamp: {}", target);
                return self.bind(&record, analysis).await;
            }

            let (start, end) = self.window.bounds(target);
            let candidates = self.store.find_by_timestamp_range(start, end).await;
            if let Some(record) = pick_window_candidate(&candidates, target, analysis) {
                info!(
                    "threat matched in window: target={}, matched_index={}",
                    target, record.threat_index
                );
                return self.bind(&record, analysis).await;
            }
        }

        debug!(
            "no threat found for analysis: index={:?}, timestamp={:?}, label={:?}",
            analysis.threat_index, analysis.timestamp, analysis.threat_type
        );
        Ok(MatchOutcome::Unresolved)
    }

    /// Apply the classification side effect and return the binding
    async fn bind(&self, record: &ThreatRecord, analysis: &AnalysisResult) -> Result<MatchOutcome> {
        self.synchronize_classification(record, analysis).await?;
        Ok(MatchOutcome::Resolved(ResolvedThreat {
            threat_id: record.threat_id.clone(),
            threat_index: record.threat_index,
            event_timestamp: record.event_timestamp,
        }))
    }

    async fn synchronize_classification(
        &self,
        record: &ThreatRecord,
        analysis: &AnalysisResult,
    ) -> Result<()> {
        let Some(label) = analysis.threat_type.as_deref() else {
            return Ok(());
        };
        if label.trim().is_empty() || label == record.threat_type {
            return Ok(());
        }

        match self.store.update_classification(&record.threat_id, label).await {
            Ok(true) => {
                info!(
                    "threat {} classification updated to '{}'",
                    record.threat_id, label
                );
            }
            Ok(false) => {}
            Err(e) => {
                // A concurrent resolution may already have re-labelled or
                // the record may be gone; the binding itself still stands.
                warn!(
                    "classification update failed for {}: {}",
                    record.threat_id, e
                );
            }
        }
        Ok(())
    }
}

/// Select among window candidates: label match first, then closest in
/// time, equidistant ties to the lowest index
fn pick_window_candidate(
    candidates: &[ThreatRecord],
    target: DateTime<Utc>,
    analysis: &AnalysisResult,
) -> Option<ThreatRecord> {
    if candidates.is_empty() {
        return None;
    }

    if let Some(label) = analysis.threat_type.as_deref() {
        if !label.trim().is_empty() {
            if let Some(with_label) = candidates.iter().find(|c| c.threat_type == label) {
                return Some(with_label.clone());
            }
        }
    }

    candidates
        .iter()
        .min_by_key(|c| {
            let distance_ms = (target - c.event_timestamp).num_milliseconds().abs();
            (distance_ms, c.threat_index)
        })
        .cloned()
}
