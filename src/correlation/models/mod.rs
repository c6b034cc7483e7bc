// src/correlation/models/mod.rs
//!
//! Core data models for the threat correlation core

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique threat identifier (`{ENGINE}-{uuid}`)
pub type ThreatId = String;
/// Monotonic numeric threat index, the fast-path correlation key
pub type ThreatIndex = u32;
/// Unique analysis identifier
pub type AnalysisId = String;

/// Detection engine that raised a threat alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DetectionEngine {
    #[serde(rename = "ML")]
    Ml,
    #[serde(rename = "DL")]
    Dl,
    #[serde(rename = "RULE")]
    #[default]
    Rule,
}

impl DetectionEngine {
    /// Parse an engine tag from an ingestion path segment. Only the ML and
    /// DL pipelines may submit alarms.
    pub fn from_ingest_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_uppercase().as_str() {
            "ML" => Some(DetectionEngine::Ml),
            "DL" => Some(DetectionEngine::Dl),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionEngine::Ml => "ML",
            DetectionEngine::Dl => "DL",
            DetectionEngine::Rule => "RULE",
        }
    }
}

/// Severity level derived from the alarm score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ThreatLevel {
    #[serde(rename = "warning")]
    Warning,
    #[serde(rename = "attention")]
    #[default]
    Attention,
}

impl ThreatLevel {
    /// score >= 50 is urgent, everything below is advisory
    pub fn from_score(score: f64) -> Self {
        if score >= 50.0 {
            ThreatLevel::Warning
        } else {
            ThreatLevel::Attention
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Warning => "warning",
            ThreatLevel::Attention => "attention",
        }
    }
}

/// Triage status of a threat record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ThreatStatus {
    #[serde(rename = "new")]
    #[default]
    New,
    #[serde(rename = "acknowledged")]
    Acknowledged,
    #[serde(rename = "closed")]
    Closed,
}

/// Canonical stored representation of one detected security event.
///
/// Owned by the threat store; mutated only through its update API. The
/// numeric index, once assigned, never changes and is never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatRecord {
    pub threat_id: ThreatId,
    pub threat_index: ThreatIndex,
    pub event_timestamp: DateTime<Utc>,
    pub detection_engine: DetectionEngine,
    pub source_ip: String,
    pub source_asset: String,
    pub destination_ip: String,
    pub destination_asset: String,
    /// Classification label; empty until an analysis result supplies one
    pub threat_type: String,
    pub threat_level: ThreatLevel,
    pub status: ThreatStatus,
    pub score: f64,
    pub created_at: DateTime<Utc>,
}

impl ThreatRecord {
    pub fn new(
        engine: DetectionEngine,
        threat_index: ThreatIndex,
        event_timestamp: DateTime<Utc>,
        score: f64,
    ) -> Self {
        Self {
            threat_id: format!("{}-{}", engine.as_str(), Uuid::new_v4()),
            threat_index,
            event_timestamp,
            detection_engine: engine,
            source_ip: String::new(),
            source_asset: String::new(),
            destination_ip: String::new(),
            destination_asset: String::new(),
            threat_type: String::new(),
            threat_level: ThreatLevel::from_score(score),
            status: ThreatStatus::New,
            score,
            created_at: Utc::now(),
        }
    }
}

/// An inbound explainability report, not yet bound to a threat.
///
/// Ephemeral input to the correlation engine; every field the external
/// pipeline sends is optional and may be inconsistent with the stored
/// records it describes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, alias = "index")]
    pub threat_index: Option<ThreatIndex>,
    /// ISO-8601 timestamp as sent; parsed (and validated) at resolution time
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub threat_type: Option<String>,
    #[serde(default)]
    pub source_ip: Option<String>,
    #[serde(default)]
    pub destination_asset_ip: Option<String>,
    #[serde(default)]
    pub detection_engine: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub analysis: Option<AnalysisDetails>,
}

/// Free-text explanation block of an analysis result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisDetails {
    #[serde(default)]
    pub detection_details: Option<String>,
    #[serde(default)]
    pub violation: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
}

/// A resolved analysis persisted alongside the threat it explains
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub analysis_id: AnalysisId,
    pub timestamp: DateTime<Utc>,
    pub threat_type: Option<String>,
    pub source_ip: Option<String>,
    pub destination_asset_ip: Option<String>,
    /// Bound threat identifier; `None` when resolution failed
    pub threat_id: Option<ThreatId>,
    pub threat_index: Option<ThreatIndex>,
    pub detection_details: Option<String>,
    pub violation: Option<String>,
    pub conclusion: Option<String>,
}

impl AnalysisRecord {
    pub fn from_result(
        result: &AnalysisResult,
        timestamp: DateTime<Utc>,
        threat_id: Option<ThreatId>,
        threat_index: Option<ThreatIndex>,
    ) -> Self {
        let details = result.analysis.as_ref();
        Self {
            analysis_id: Uuid::new_v4().to_string(),
            timestamp,
            threat_type: result.threat_type.clone(),
            source_ip: result.source_ip.clone(),
            destination_asset_ip: result.destination_asset_ip.clone(),
            threat_id,
            threat_index,
            detection_details: details.and_then(|d| d.detection_details.clone()),
            violation: details.and_then(|d| d.violation.clone()),
            conclusion: details.and_then(|d| d.conclusion.clone()),
        }
    }
}

/// Inbound ML/DL risk alarm as posted by the detection pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskAlarm {
    #[serde(default)]
    pub risk: Option<RiskPayload>,
}

/// Body of a risk alarm
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskPayload {
    #[serde(default)]
    pub score: Option<f64>,
    /// ISO-8601 detection time; required for ingestion
    #[serde(default)]
    pub detected_time: Option<String>,
    #[serde(default)]
    pub src_ip: Option<String>,
    #[serde(default)]
    pub src_asset: Option<String>,
    #[serde(default)]
    pub dst_ip: Option<String>,
    #[serde(default)]
    pub dst_asset: Option<String>,
}

/// Symmetric time tolerance used for fuzzy timestamp matching.
///
/// Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationWindow {
    tolerance: Duration,
}

impl Default for CorrelationWindow {
    fn default() -> Self {
        Self::from_secs(5)
    }
}

impl CorrelationWindow {
    pub fn from_secs(secs: i64) -> Self {
        Self {
            tolerance: Duration::seconds(secs),
        }
    }

    /// Inclusive `[target - tolerance, target + tolerance]` bounds
    pub fn bounds(&self, target: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (target - self.tolerance, target + self.tolerance)
    }

    pub fn contains(&self, target: DateTime<Utc>, candidate: DateTime<Utc>) -> bool {
        let (start, end) = self.bounds(target);
        candidate >= start && candidate <= end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threat_level_cut_at_fifty() {
        assert_eq!(ThreatLevel::from_score(50.0), ThreatLevel::Warning);
        assert_eq!(ThreatLevel::from_score(82.3), ThreatLevel::Warning);
        assert_eq!(ThreatLevel::from_score(49.9), ThreatLevel::Attention);
        assert_eq!(ThreatLevel::from_score(0.0), ThreatLevel::Attention);
    }

    #[test]
    fn engine_tag_parsing_is_case_insensitive() {
        assert_eq!(DetectionEngine::from_ingest_tag("ml"), Some(DetectionEngine::Ml));
        assert_eq!(DetectionEngine::from_ingest_tag(" DL "), Some(DetectionEngine::Dl));
        assert_eq!(DetectionEngine::from_ingest_tag("rule"), None);
        assert_eq!(DetectionEngine::from_ingest_tag(""), None);
    }

    #[test]
    fn analysis_result_accepts_index_alias() {
        let parsed: AnalysisResult =
            serde_json::from_str(r#"{"index": 1500, "timestamp": "2025-11-10T08:43:40Z"}"#)
                .unwrap();
        assert_eq!(parsed.threat_index, Some(1500));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let window = CorrelationWindow::from_secs(5);
        let target = Utc::now();
        assert!(window.contains(target, target + Duration::seconds(5)));
        assert!(window.contains(target, target - Duration::seconds(5)));
        assert!(!window.contains(target, target + Duration::milliseconds(5001)));
    }
}
