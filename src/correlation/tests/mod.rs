// src/correlation/tests/mod.rs
//!
//! Matching-policy tests for the correlation engine

#[cfg(test)]
mod unit_tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, Utc};

    use crate::correlation::engine::{CorrelationEngine, MatchOutcome};
    use crate::correlation::models::{
        AnalysisResult, CorrelationWindow, DetectionEngine, ThreatRecord,
    };
    use crate::correlation::store::{MemoryThreatStore, ThreatStore};

    fn base_time() -> DateTime<Utc> {
        "2025-11-10T08:43:40Z".parse().unwrap()
    }

    fn engine_with_store() -> (CorrelationEngine, Arc<MemoryThreatStore>) {
        let store = Arc::new(MemoryThreatStore::new());
        let engine = CorrelationEngine::new(store.clone(), CorrelationWindow::from_secs(5));
        (engine, store)
    }

    async fn seed(
        store: &MemoryThreatStore,
        index: u32,
        at: DateTime<Utc>,
        label: &str,
    ) -> ThreatRecord {
        let mut record = ThreatRecord::new(DetectionEngine::Ml, index, at, 10.0);
        record.threat_type = label.to_string();
        store.insert(record.clone()).await.unwrap();
        record
    }

    fn analysis(index: Option<u32>, timestamp: Option<&str>, label: Option<&str>) -> AnalysisResult {
        AnalysisResult {
            threat_index: index,
            timestamp: timestamp.map(str::to_string),
            threat_type: label.map(str::to_string),
            ..Default::default()
        }
    }

    // ==================== Priority order ====================

    #[tokio::test]
    async fn index_match_wins_over_timestamp_mismatch() {
        let (engine, store) = engine_with_store();
        let target = seed(&store, 1500, base_time(), "").await;
        // Decoy sitting exactly on the analysis timestamp
        seed(&store, 1501, base_time() + Duration::hours(2), "").await;

        let input = analysis(
            Some(1500),
            Some("2025-11-10T10:43:40Z"), // two hours off the target record
            None,
        );
        let outcome = engine.resolve(&input).await.unwrap();
        assert_eq!(
            outcome.resolved().unwrap().threat_id,
            target.threat_id,
            "index must take priority over any timestamp evidence"
        );
    }

    #[tokio::test]
    async fn unknown_index_falls_through_to_timestamp_matching() {
        let (engine, store) = engine_with_store();
        let target = seed(&store, 1500, base_time(), "").await;

        let input = analysis(Some(9999), Some("2025-11-10T08:43:40Z"), None);
        let outcome = engine.resolve(&input).await.unwrap();
        assert_eq!(outcome.resolved().unwrap().threat_id, target.threat_id);
    }

    #[tokio::test]
    async fn exact_timestamp_matches_without_an_index() {
        let (engine, store) = engine_with_store();
        let target = seed(&store, 1500, base_time(), "").await;

        let input = analysis(None, Some("2025-11-10T08:43:40Z"), None);
        let outcome = engine.resolve(&input).await.unwrap();
        assert_eq!(outcome.resolved().unwrap().threat_index, target.threat_index);
    }

    #[tokio::test]
    async fn textual_timestamp_variants_still_match_exactly() {
        let (engine, store) = engine_with_store();
        let target = seed(&store, 1500, base_time(), "").await;

        // Same instant written with an explicit offset
        let input = analysis(None, Some("2025-11-10T17:43:40+09:00"), None);
        let outcome = engine.resolve(&input).await.unwrap();
        assert_eq!(outcome.resolved().unwrap().threat_index, target.threat_index);
    }

    // ==================== Window matching ====================

    #[tokio::test]
    async fn three_seconds_inside_the_window_matches() {
        let (engine, store) = engine_with_store();
        let target = seed(&store, 1500, base_time(), "").await;

        let input = analysis(None, Some("2025-11-10T08:43:43Z"), None);
        let outcome = engine.resolve(&input).await.unwrap();
        assert_eq!(outcome.resolved().unwrap().threat_index, target.threat_index);
    }

    #[tokio::test]
    async fn six_seconds_outside_the_window_is_unresolved() {
        let (engine, store) = engine_with_store();
        seed(&store, 1500, base_time(), "").await;

        let input = analysis(None, Some("2025-11-10T08:43:46Z"), None);
        let outcome = engine.resolve(&input).await.unwrap();
        assert_eq!(outcome, MatchOutcome::Unresolved);
    }

    #[tokio::test]
    async fn label_match_beats_closer_timestamp() {
        let (engine, store) = engine_with_store();
        // 4s away but carrying the incoming label
        let labelled = seed(
            &store,
            1500,
            base_time() - Duration::seconds(4),
            "protocol violation",
        )
        .await;
        // 1s away, different label
        seed(&store, 1501, base_time() + Duration::seconds(1), "parameter tampering").await;

        let input = analysis(None, Some("2025-11-10T08:43:40Z"), Some("protocol violation"));
        let outcome = engine.resolve(&input).await.unwrap();
        assert_eq!(outcome.resolved().unwrap().threat_id, labelled.threat_id);
    }

    #[tokio::test]
    async fn closest_candidate_wins_without_a_label_match() {
        let (engine, store) = engine_with_store();
        seed(&store, 1500, base_time() - Duration::seconds(4), "a").await;
        let closest = seed(&store, 1501, base_time() + Duration::seconds(1), "b").await;

        let input = analysis(None, Some("2025-11-10T08:43:40Z"), Some("c"));
        let outcome = engine.resolve(&input).await.unwrap();
        assert_eq!(outcome.resolved().unwrap().threat_id, closest.threat_id);
    }

    #[tokio::test]
    async fn window_tie_breaks_on_lowest_index() {
        let (engine, store) = engine_with_store();
        // Insert the higher index first so insertion order cannot decide
        seed(&store, 1501, base_time() + Duration::seconds(2), "a").await;
        let lowest = seed(&store, 1500, base_time() - Duration::seconds(2), "b").await;

        let input = analysis(None, Some("2025-11-10T08:43:40Z"), None);
        let outcome = engine.resolve(&input).await.unwrap();
        assert_eq!(outcome.resolved().unwrap().threat_index, lowest.threat_index);
    }

    #[tokio::test]
    async fn no_candidates_at_all_is_unresolved() {
        let (engine, _store) = engine_with_store();
        let input = analysis(None, Some("2025-11-10T08:43:40Z"), Some("anything"));
        assert_eq!(engine.resolve(&input).await.unwrap(), MatchOutcome::Unresolved);
    }

    // ==================== Classification side effect ====================

    #[tokio::test]
    async fn matching_synchronizes_the_classification_label() {
        let (engine, store) = engine_with_store();
        seed(&store, 1500, base_time(), "").await;

        let input = analysis(Some(1500), Some("2025-11-10T08:43:40Z"), Some("route manipulation"));
        engine.resolve(&input).await.unwrap();

        let updated = store.find_by_index(1500).await.unwrap();
        assert_eq!(updated.threat_type, "route manipulation");
    }

    #[tokio::test]
    async fn reapplying_the_same_label_is_a_no_op() {
        let (engine, store) = engine_with_store();
        seed(&store, 1500, base_time(), "").await;

        let input = analysis(Some(1500), None, Some("route manipulation"));
        engine.resolve(&input).await.unwrap();
        engine.resolve(&input).await.unwrap();

        assert_eq!(store.classification_update_count(), 1);
        assert_eq!(
            store.find_by_index(1500).await.unwrap().threat_type,
            "route manipulation"
        );
    }

    #[tokio::test]
    async fn empty_labels_never_touch_the_record() {
        let (engine, store) = engine_with_store();
        seed(&store, 1500, base_time(), "existing").await;

        engine
            .resolve(&analysis(Some(1500), None, Some("  ")))
            .await
            .unwrap();
        engine.resolve(&analysis(Some(1500), None, None)).await.unwrap();

        assert_eq!(store.classification_update_count(), 0);
        assert_eq!(store.find_by_index(1500).await.unwrap().threat_type, "existing");
    }

    // ==================== Malformed input ====================

    #[tokio::test]
    async fn unparsable_timestamp_fails_the_item_only() {
        let (engine, store) = engine_with_store();
        seed(&store, 1500, base_time(), "").await;

        let bad = analysis(Some(1500), Some("10/11/2025 08:43"), None);
        assert!(engine.resolve(&bad).await.is_err());

        // The store is untouched by the failed item
        assert_eq!(store.classification_update_count(), 0);
    }
}
