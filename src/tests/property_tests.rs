//! Property-based tests for otwatch
//!
//! These tests use proptest to discover edge cases through randomized
//! input generation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;

use super::fixtures::{AnalysisResultBuilder, ThreatRecordBuilder};
use crate::correlation::engine::{CorrelationEngine, MatchOutcome};
use crate::correlation::models::{CorrelationWindow, DetectionEngine, ThreatLevel};
use crate::correlation::store::{MemoryThreatStore, ThreatStore};

fn base_time() -> DateTime<Utc> {
    "2025-11-10T08:43:40Z".parse().unwrap()
}

proptest! {
    #[test]
    fn timestamp_parsing_never_panics(raw in ".*") {
        let _ = CorrelationEngine::parse_timestamp(Some(&raw));
    }

    #[test]
    fn window_contains_iff_within_tolerance(offset_ms in -10_000i64..=10_000i64) {
        let window = CorrelationWindow::from_secs(5);
        let target = base_time();
        let candidate = target + Duration::milliseconds(offset_ms);
        prop_assert_eq!(window.contains(target, candidate), offset_ms.abs() <= 5_000);
    }

    #[test]
    fn threat_level_cut_is_consistent(score in 0.0f64..1000.0f64) {
        let level = ThreatLevel::from_score(score);
        prop_assert_eq!(level == ThreatLevel::Warning, score >= 50.0);
    }

    #[test]
    fn only_ml_and_dl_tags_are_accepted(tag in "[a-zA-Z]{0,6}") {
        let parsed = DetectionEngine::from_ingest_tag(&tag);
        let normalized = tag.trim().to_lowercase();
        prop_assert_eq!(parsed.is_some(), normalized == "ml" || normalized == "dl");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// A lone candidate resolves exactly when it sits inside the window
    #[test]
    fn window_resolution_matches_distance(offset_ms in -10_000i64..=10_000i64) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let store = Arc::new(MemoryThreatStore::new());
            store
                .insert(
                    ThreatRecordBuilder::new(1500, base_time() + Duration::milliseconds(offset_ms))
                        .build(),
                )
                .await
                .unwrap();
            let engine = CorrelationEngine::new(store, CorrelationWindow::from_secs(5));

            let input = AnalysisResultBuilder::new()
                .timestamp("2025-11-10T08:43:40Z")
                .build();
            let outcome = engine.resolve(&input).await.unwrap();

            let expect_match = offset_ms.abs() <= 5_000;
            prop_assert_eq!(outcome != MatchOutcome::Unresolved, expect_match);
            Ok(())
        })?;
    }
}
