//! Indicator aggregation and escalation scoring.
//!
//! The [`IndicatorAggregator`] owns the live [`Snapshot`] and the immutable
//! [`ScoringModel`]. Every mutation goes through its operations, which clamp
//! values, mark the snapshot dirty for sync and publish a new revision to
//! subscribers.

use crate::analysis::snapshot::{Snapshot, SnapshotPatch};
use crate::models::{Category, Indicator, ThreatLevel};
use anyhow::{bail, Result};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Errors raised by direct single-indicator operations.
#[derive(Debug, Error, PartialEq)]
pub enum AggregatorError {
    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    #[error("unknown indicator '{key}' in category '{category}'")]
    UnknownIndicator { category: Category, key: String },

    #[error("value for {indicator} must be a finite number, got {value}")]
    NonFinite { indicator: Indicator, value: f64 },
}

impl AggregatorError {
    /// True for the unknown-category and unknown-key cases.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AggregatorError::UnknownCategory(_) | AggregatorError::UnknownIndicator { .. }
        )
    }
}

/// Per-category weights of the escalation score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub military: f64,
    pub maritime: f64,
    pub aviation: f64,
    pub cyber: f64,
    pub diplomacy: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            military: 0.35,
            maritime: 0.20,
            aviation: 0.15,
            cyber: 0.15,
            diplomacy: 0.15,
        }
    }
}

impl Weights {
    pub fn weight(&self, category: Category) -> f64 {
        match category {
            Category::Military => self.military,
            Category::Maritime => self.maritime,
            Category::Aviation => self.aviation,
            Category::Cyber => self.cyber,
            Category::Diplomacy => self.diplomacy,
        }
    }

    pub fn total(&self) -> f64 {
        Category::ALL.iter().map(|c| self.weight(*c)).sum()
    }
}

/// Immutable scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringModel {
    pub weights: Weights,
    /// Multiplier applied to the weighted sum before clamping.
    pub amplification: f64,
    /// Scores strictly above this are `Critical`.
    pub critical_above: u8,
    /// Scores strictly above this (and not critical) are `Elevated`.
    pub elevated_above: u8,
}

impl Default for ScoringModel {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            amplification: 1.3,
            critical_above: 75,
            elevated_above: 25,
        }
    }
}

impl ScoringModel {
    /// Reject parameters that would break the score's range or monotonicity.
    pub fn validate(&self) -> Result<()> {
        for category in Category::ALL {
            let w = self.weights.weight(category);
            if !w.is_finite() || w < 0.0 {
                bail!("Weight for {} must be a non-negative number, got {}", category, w);
            }
        }

        if !self.amplification.is_finite() || self.amplification < 0.0 {
            bail!(
                "Amplification must be a non-negative number, got {}",
                self.amplification
            );
        }

        if self.elevated_above > self.critical_above {
            bail!(
                "elevated_above ({}) must not exceed critical_above ({})",
                self.elevated_above,
                self.critical_above
            );
        }

        let total = self.weights.total();
        if (total - 1.0).abs() > 1e-6 {
            warn!("Category weights sum to {:.3}, not 1.0", total);
        }

        Ok(())
    }

    /// Classify a score into its threat band.
    pub fn threshold_label(&self, score: u8) -> ThreatLevel {
        if score > self.critical_above {
            ThreatLevel::Critical
        } else if score > self.elevated_above {
            ThreatLevel::Elevated
        } else {
            ThreatLevel::Baseline
        }
    }
}

/// Owner of the live snapshot.
pub struct IndicatorAggregator {
    snapshot: Snapshot,
    model: ScoringModel,
    dirty: bool,
    revision: watch::Sender<u64>,
}

impl IndicatorAggregator {
    /// Create an aggregator seeded with the baseline snapshot.
    pub fn new(model: ScoringModel) -> Self {
        Self::with_snapshot(model, Snapshot::baseline())
    }

    pub fn with_snapshot(model: ScoringModel, snapshot: Snapshot) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            snapshot,
            model,
            dirty: false,
            revision,
        }
    }

    pub fn model(&self) -> &ScoringModel {
        &self.model
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Typed read of one indicator.
    pub fn value(&self, indicator: Indicator) -> f64 {
        self.snapshot.get(indicator)
    }

    /// Read one indicator by its wire names.
    pub fn get_value(&self, category: &str, key: &str) -> Result<f64, AggregatorError> {
        let indicator = resolve(category, key)?;
        Ok(self.snapshot.get(indicator))
    }

    /// Assign one indicator by its wire names, clamping into range.
    pub fn set_value(
        &mut self,
        category: &str,
        key: &str,
        value: f64,
    ) -> Result<(), AggregatorError> {
        let indicator = resolve(category, key)?;
        self.set(indicator, value)
    }

    /// Typed assignment, clamping into range.
    pub fn set(&mut self, indicator: Indicator, value: f64) -> Result<(), AggregatorError> {
        if !value.is_finite() {
            return Err(AggregatorError::NonFinite { indicator, value });
        }
        self.snapshot.set(indicator, value);
        debug!("{} = {}", indicator, self.snapshot.get(indicator));
        self.touch();
        Ok(())
    }

    /// Merge a (possibly partial) document into the snapshot.
    ///
    /// Returns how many indicators were assigned. Unmentioned indicators keep
    /// their value; unknown fields are ignored.
    pub fn replace_snapshot(&mut self, patch: &SnapshotPatch) -> usize {
        if patch.ignored() > 0 {
            debug!("Ignoring {} unrecognised fields in snapshot update", patch.ignored());
        }

        for (indicator, value) in patch.entries() {
            self.snapshot.set(*indicator, *value);
        }

        let applied = patch.entries().len();
        if applied > 0 {
            self.touch();
        }
        applied
    }

    /// Merge a JSON document of the snapshot shape.
    pub fn replace_from_json(&mut self, doc: &serde_json::Value) -> usize {
        self.replace_snapshot(&SnapshotPatch::from_json(doc))
    }

    /// Put every indicator back to its baseline value.
    pub fn reset_to_baseline(&mut self) {
        self.snapshot = Snapshot::baseline();
        self.touch();
    }

    /// Mean value of a category, or 0 when it has no indicators.
    pub fn category_average(&self, category: Category) -> f64 {
        let count = category.indicators().len();
        if count == 0 {
            return 0.0;
        }
        self.snapshot.category_values(category).sum::<f64>() / count as f64
    }

    /// Weighted, amplified, clamped and rounded summary score.
    pub fn escalation_score(&self) -> u8 {
        let weighted: f64 = Category::ALL
            .iter()
            .map(|c| self.category_average(*c) * self.model.weights.weight(*c))
            .sum();

        let amplified = (weighted * self.model.amplification).clamp(0.0, 100.0);
        amplified.round() as u8
    }

    pub fn threshold_label(&self, score: u8) -> ThreatLevel {
        self.model.threshold_label(score)
    }

    /// Threat band of the current snapshot.
    pub fn threat_level(&self) -> ThreatLevel {
        self.threshold_label(self.escalation_score())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the dirty flag, returning whether it was set.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Monotonic mutation counter.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Receive the revision after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.revision.send_modify(|rev| *rev += 1);
    }
}

fn resolve(category: &str, key: &str) -> Result<Indicator, AggregatorError> {
    let category: Category = category
        .parse()
        .map_err(|_| AggregatorError::UnknownCategory(category.to_string()))?;

    category
        .indicator(key)
        .ok_or_else(|| AggregatorError::UnknownIndicator {
            category,
            key: key.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn aggregator() -> IndicatorAggregator {
        IndicatorAggregator::new(ScoringModel::default())
    }

    #[test]
    fn test_set_then_get_clamps() {
        let mut agg = aggregator();
        let cases = [
            (42.0, 42.0),
            (-10.0, 0.0),
            (150.0, 100.0),
            (0.0, 0.0),
            (100.0, 100.0),
            (33.5, 33.5),
        ];
        for (input, expected) in cases {
            agg.set_value("cyber", "gpsJamming", input).unwrap();
            assert_eq!(agg.get_value("cyber", "gpsJamming").unwrap(), expected);
        }
    }

    #[test]
    fn test_out_of_range_does_not_error() {
        let mut agg = aggregator();
        assert!(agg.set_value("military", "ussGeorgia", 1e9).is_ok());
        assert!(agg.set_value("military", "ussGeorgia", -1e9).is_ok());
        assert_eq!(agg.value(Indicator::UssGeorgia), 0.0);
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut agg = aggregator();
        let err = agg.set_value("military", "ussGeorgia", f64::NAN).unwrap_err();
        assert!(matches!(err, AggregatorError::NonFinite { .. }));
        assert!(!err.is_not_found());
        assert_eq!(agg.value(Indicator::UssGeorgia), 60.0);
        assert!(!agg.is_dirty());
    }

    #[test]
    fn test_not_found() {
        let mut agg = aggregator();

        let err = agg.get_value("space", "ussGeorgia").unwrap_err();
        assert_eq!(err, AggregatorError::UnknownCategory("space".to_string()));
        assert!(err.is_not_found());

        let err = agg.set_value("cyber", "ussGeorgia", 10.0).unwrap_err();
        assert!(matches!(
            err,
            AggregatorError::UnknownIndicator { category: Category::Cyber, .. }
        ));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_category_average() {
        let mut agg = aggregator();
        let indicators = Category::Aviation.indicators();
        agg.set(indicators[0], 40.0).unwrap();
        agg.set(indicators[1], 60.0).unwrap();
        agg.set(indicators[2], 40.0).unwrap();
        agg.set(indicators[3], 60.0).unwrap();
        assert_eq!(agg.category_average(Category::Aviation), 50.0);

        assert_eq!(agg.category_average(Category::Military), 33.0);
    }

    #[test]
    fn test_baseline_score_is_elevated() {
        let agg = aggregator();
        assert_eq!(agg.escalation_score(), 39);
        assert_eq!(agg.threat_level(), ThreatLevel::Elevated);
    }

    #[test]
    fn test_score_deterministic() {
        let mut agg = aggregator();
        agg.set(Indicator::ProxyChatter, 81.0).unwrap();
        let first = agg.escalation_score();
        for _ in 0..10 {
            assert_eq!(agg.escalation_score(), first);
        }
    }

    #[test]
    fn test_score_monotonic_in_each_indicator() {
        for indicator in Indicator::ALL {
            let mut agg = aggregator();
            let mut previous = 0;
            agg.set(indicator, 0.0).unwrap();
            for step in 0..=20 {
                agg.set(indicator, step as f64 * 5.0).unwrap();
                let score = agg.escalation_score();
                assert!(score >= previous, "{} lowered the score", indicator);
                previous = score;
            }
        }
    }

    #[test]
    fn test_score_extremes() {
        let model = ScoringModel::default();
        let zeros = IndicatorAggregator::with_snapshot(model, Snapshot::uniform(0.0));
        assert_eq!(zeros.escalation_score(), 0);

        let full = IndicatorAggregator::with_snapshot(model, Snapshot::uniform(100.0));
        assert_eq!(full.escalation_score(), 100);
    }

    #[test]
    fn test_all_hundreds_via_set_hits_clamp() {
        let mut agg = aggregator();
        for indicator in Indicator::ALL {
            agg.set_value(indicator.category().key(), indicator.key(), 100.0)
                .unwrap();
        }
        assert_eq!(agg.escalation_score(), 100);
        assert_eq!(agg.threat_level(), ThreatLevel::Critical);
    }

    #[test]
    fn test_uss_georgia_scenario() {
        let mut agg = aggregator();
        let model = *agg.model();
        let old_value = agg.value(Indicator::UssGeorgia);
        let old_avg = agg.category_average(Category::Military);

        agg.set_value("military", "ussGeorgia", 95.0).unwrap();

        let count = Category::Military.indicators().len() as f64;
        let new_avg = agg.category_average(Category::Military);
        assert_eq!(new_avg, old_avg + (95.0 - old_value) / count);
        assert_eq!(new_avg, 40.0);

        // 29.675 * 1.3 before, plus 0.35 * 7 * 1.3 after
        let delta = model.weights.military * (95.0 - old_value) / count * model.amplification;
        let expected = ((29.675 * model.amplification + delta).min(100.0)).round() as u8;
        assert_eq!(agg.escalation_score(), expected);
        assert_eq!(agg.escalation_score(), 42);
    }

    #[test]
    fn test_threshold_boundaries() {
        let model = ScoringModel::default();
        assert_eq!(model.threshold_label(76), ThreatLevel::Critical);
        assert_eq!(model.threshold_label(75), ThreatLevel::Elevated);
        assert_eq!(model.threshold_label(26), ThreatLevel::Elevated);
        assert_eq!(model.threshold_label(25), ThreatLevel::Baseline);
        assert_eq!(model.threshold_label(0), ThreatLevel::Baseline);
        assert_eq!(model.threshold_label(100), ThreatLevel::Critical);
    }

    #[test]
    fn test_replace_snapshot_partial_merge() {
        let mut agg = aggregator();
        let applied = agg.replace_from_json(&json!({
            "cyber": { "gpsJamming": 99 },
            "maritime": { "oilAnomaly": 180 }
        }));

        assert_eq!(applied, 2);
        assert_eq!(agg.value(Indicator::GpsJamming), 99.0);
        assert_eq!(agg.value(Indicator::OilAnomaly), 100.0);
        for indicator in Indicator::ALL {
            if indicator != Indicator::GpsJamming && indicator != Indicator::OilAnomaly {
                assert_eq!(agg.value(indicator), indicator.baseline());
            }
        }
    }

    #[test]
    fn test_replace_snapshot_unknown_keys_ignored() {
        let mut agg = aggregator();
        let before = agg.snapshot().clone();
        let applied = agg.replace_from_json(&json!({
            "space": { "satellites": 90 },
            "military": { "aircraftCarriers": 80 },
            "note": "extraneous"
        }));

        assert_eq!(applied, 0);
        assert_eq!(agg.snapshot(), &before);
        assert!(!agg.is_dirty());
    }

    #[test]
    fn test_dirty_and_revision() {
        let mut agg = aggregator();
        let mut rx = agg.subscribe();
        assert_eq!(agg.revision(), 0);
        assert!(!agg.is_dirty());

        agg.set(Indicator::KhargEvac, 12.0).unwrap();
        assert!(agg.is_dirty());
        assert_eq!(agg.revision(), 1);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);

        assert!(agg.take_dirty());
        assert!(!agg.take_dirty());

        agg.reset_to_baseline();
        assert_eq!(agg.value(Indicator::KhargEvac), 10.0);
        assert_eq!(agg.revision(), 2);
    }

    #[test]
    fn test_model_validation() {
        assert!(ScoringModel::default().validate().is_ok());

        let mut model = ScoringModel::default();
        model.weights.cyber = -0.1;
        assert!(model.validate().is_err());

        let mut model = ScoringModel::default();
        model.amplification = f64::INFINITY;
        assert!(model.validate().is_err());

        let mut model = ScoringModel::default();
        model.elevated_above = 80;
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_custom_amplification() {
        let model = ScoringModel {
            amplification: 1.0,
            ..ScoringModel::default()
        };
        let agg = IndicatorAggregator::new(model);
        // 29.675 rounds to 30
        assert_eq!(agg.escalation_score(), 30);
    }
}
