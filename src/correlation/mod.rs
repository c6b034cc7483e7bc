// src/correlation/mod.rs
//!
//! # Threat correlation core
//!
//! Binds asynchronously-arriving XAI analysis results to previously
//! ingested threat records. An analysis arrives with uncertain identity
//! information (maybe an index, maybe only a timestamp), so resolution
//! applies a prioritized, tolerant matching policy:
//!
//! ```text
//!  AnalysisResult ──► 1. exact threat_index hit
//!                     2. exact event_timestamp hit (parsed instants)
//!                     3. ±window scan
//!                        a. candidate with matching classification label
//!                        b. closest in time, ties → lowest index
//!                     4. Unresolved (logged, dropped)
//! ```
//!
//! On a match, the analysis's classification label is synchronized onto the
//! threat record through the store's narrow update API. Concurrent
//! resolutions against the same record are last-write-wins on that field;
//! the label converges once the analysis pipeline stabilizes, so this race
//! is documented rather than serialized.

pub mod engine;
pub mod models;
pub mod store;

#[cfg(test)]
mod tests;

pub use engine::{CorrelationEngine, MatchOutcome, ResolvedThreat};
pub use models::*;
pub use store::{AnalysisStore, MemoryAnalysisStore, MemoryThreatStore, ThreatStore};
