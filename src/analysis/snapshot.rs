//! Indicator snapshot and its JSON document shape.
//!
//! A [`Snapshot`] is total: it always holds a value for every declared
//! indicator. On the wire it is the nested object
//! `{category: {key: value, ...}, ...}` used by the state store and the
//! analysis service.

use crate::models::{Category, Indicator};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

/// Lowest representable indicator value.
pub const MIN_VALUE: f64 = 0.0;
/// Highest representable indicator value.
pub const MAX_VALUE: f64 = 100.0;

/// Clamp a finite value into the indicator range.
pub fn clamp_value(value: f64) -> f64 {
    value.clamp(MIN_VALUE, MAX_VALUE)
}

/// Current value of every indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    values: [f64; Indicator::COUNT],
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::baseline()
    }
}

impl Snapshot {
    /// Snapshot seeded with each indicator's documented baseline.
    pub fn baseline() -> Self {
        let mut values = [0.0; Indicator::COUNT];
        for indicator in Indicator::ALL {
            values[indicator.index()] = indicator.baseline();
        }
        Self { values }
    }

    /// Snapshot with every indicator at the same value (clamped).
    #[cfg(test)]
    pub fn uniform(value: f64) -> Self {
        Self {
            values: [clamp_value(value); Indicator::COUNT],
        }
    }

    pub fn get(&self, indicator: Indicator) -> f64 {
        self.values[indicator.index()]
    }

    /// Assign a clamped value. Callers guarantee `value` is finite.
    pub(crate) fn set(&mut self, indicator: Indicator, value: f64) {
        self.values[indicator.index()] = clamp_value(value);
    }

    /// Values of one category, in declaration order.
    pub fn category_values(&self, category: Category) -> impl Iterator<Item = f64> + '_ {
        category.indicators().iter().map(move |i| self.get(*i))
    }

    /// Encode as the nested JSON document.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

struct CategoryValues<'a> {
    snapshot: &'a Snapshot,
    category: Category,
}

impl Serialize for CategoryValues<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let indicators = self.category.indicators();
        let mut map = serializer.serialize_map(Some(indicators.len()))?;
        for indicator in indicators {
            map.serialize_entry(indicator.key(), &self.snapshot.get(*indicator))?;
        }
        map.end()
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Category::ALL.len()))?;
        for category in Category::ALL {
            map.serialize_entry(
                category.key(),
                &CategoryValues {
                    snapshot: self,
                    category,
                },
            )?;
        }
        map.end()
    }
}

/// Indicator assignments decoded from an untrusted document.
///
/// Decoding is lenient: unknown categories and keys are dropped, numeric
/// strings are accepted, and non-numeric or non-finite values are skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotPatch {
    entries: Vec<(Indicator, f64)>,
    ignored: usize,
}

impl SnapshotPatch {
    /// Build a patch from a JSON document of the snapshot shape.
    pub fn from_json(doc: &Value) -> Self {
        let mut patch = Self::default();

        let Some(categories) = doc.as_object() else {
            patch.ignored += 1;
            return patch;
        };

        for (category_key, entries) in categories {
            let Ok(category) = category_key.parse::<Category>() else {
                patch.ignored += 1;
                continue;
            };
            let Some(entries) = entries.as_object() else {
                patch.ignored += 1;
                continue;
            };
            for (key, raw) in entries {
                match (category.indicator(key), numeric_value(raw)) {
                    (Some(indicator), Some(value)) => patch.entries.push((indicator, value)),
                    _ => patch.ignored += 1,
                }
            }
        }

        patch
    }

    #[cfg(test)]
    pub fn with(mut self, indicator: Indicator, value: f64) -> Self {
        if value.is_finite() {
            self.entries.push((indicator, value));
        } else {
            self.ignored += 1;
        }
        self
    }

    pub fn entries(&self) -> &[(Indicator, f64)] {
        &self.entries
    }

    /// Number of fields that were dropped while decoding.
    pub fn ignored(&self) -> usize {
        self.ignored
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn numeric_value(raw: &Value) -> Option<f64> {
    let value = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}
