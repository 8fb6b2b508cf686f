//! Event types broadcast by the personalization engine.
//!
//! Consumers subscribe via `FeelingsEngine::subscribe_progress` /
//! `subscribe_status`. Wire forms are camelCase with lowercase enum values
//! so a host UI can forward them over JSON untouched.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Progress events
// ---------------------------------------------------------------------------

/// Emitted after every tile attempt during a personalization run.
///
/// Supports an incremental "N of Total" indicator; receivers must key any
/// per-tile bookkeeping by `tile_key`, not by arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineProgressEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    /// Run this event belongs to; stale runs keep their own generation.
    pub generation: u64,
    pub tile_key: String,
    pub outcome: TileOutcome,
    /// Tiles attempted so far in this run, including this one.
    pub completed: usize,
    /// Successful compositions so far in this run.
    pub composed: usize,
    /// Total tiles this run will attempt.
    pub total: usize,
}

/// What happened to a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileOutcome {
    /// Personalized image installed.
    Composed,
    /// Compose call failed; the tile falls back to its reference image.
    Failed,
    /// Composition succeeded but the run was superseded before install.
    Discarded,
}

// ---------------------------------------------------------------------------
// Status events
// ---------------------------------------------------------------------------

/// Emitted when a run reaches a terminal state (or a new one starts).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatusEvent {
    pub status: PipelineStatus,
    /// Optional human-readable detail (e.g. total-failure message).
    pub detail: Option<String>,
}

/// Lifecycle of the personalization engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    /// No run started yet, or the last set was cleared.
    Idle,
    /// A run is walking the catalog.
    Composing,
    /// Run finished with at least one personalized tile.
    Completed,
    /// Every tile failed — the caller should surface this.
    Failed,
    /// Run was cancelled before finishing.
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_event_serializes_with_camel_case_and_lowercase_outcome() {
        let event = PipelineProgressEvent {
            seq: 3,
            generation: 1,
            tile_key: "happy".into(),
            outcome: TileOutcome::Composed,
            completed: 4,
            composed: 3,
            total: 24,
        };

        let json = serde_json::to_value(&event).expect("serialize progress event");
        assert_eq!(json["seq"], 3);
        assert_eq!(json["tileKey"], "happy");
        assert_eq!(json["outcome"], "composed");
        assert_eq!(json["completed"], 4);
        assert_eq!(json["total"], 24);

        let round_trip: PipelineProgressEvent =
            serde_json::from_value(json).expect("deserialize progress event");
        assert_eq!(round_trip.outcome, TileOutcome::Composed);
        assert_eq!(round_trip.tile_key, "happy");
    }

    #[test]
    fn status_event_serializes_with_lowercase_status() {
        let event = PipelineStatusEvent {
            status: PipelineStatus::Failed,
            detail: Some("personalization failed for every tile".into()),
        };

        let json = serde_json::to_value(&event).expect("serialize status event");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["detail"], "personalization failed for every tile");

        let round_trip: PipelineStatusEvent =
            serde_json::from_value(json).expect("deserialize status event");
        assert_eq!(round_trip.status, PipelineStatus::Failed);
    }

    #[test]
    fn tile_outcome_rejects_non_lowercase_values() {
        let err = serde_json::from_str::<TileOutcome>(r#""Composed""#);
        assert!(err.is_err(), "expected invalid casing to fail");
    }
}
