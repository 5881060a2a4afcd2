//! Indicator state and escalation scoring.
//!
//! `snapshot` holds the total indicator mapping and its document shape;
//! `aggregator` owns the live snapshot and computes the scores.

pub mod aggregator;
pub mod snapshot;

pub use aggregator::{IndicatorAggregator, ScoringModel, Weights};
pub use snapshot::{Snapshot, SnapshotPatch};
