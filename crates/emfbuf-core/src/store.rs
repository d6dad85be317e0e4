//! Per-cycle stores for metrics, dimensions, and metadata.
//!
//! Each store keeps insertion order (records list keys in the order they were
//! first added). Stores are small and bounded by the record limits, so lookups
//! are linear scans over a `Vec`.

use serde_json::Value;

use crate::unit::{MetricResolution, Unit};

/// Maximum distinct metrics in one record.
pub const MAX_METRICS: usize = 100;
/// Maximum values a single metric may carry in one record.
pub const MAX_VALUES_PER_METRIC: usize = 100;
/// Maximum dimensions in the record's dimension set.
pub const MAX_DIMENSIONS: usize = 9;

/// One accumulated metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub unit: Unit,
    pub resolution: MetricResolution,
    pub values: Vec<f64>,
    /// Set when a later add used a different resolution than the first.
    pub resolution_conflict: bool,
}

/// Outcome of `MetricStore::add`, used to drive capacity flushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Below every ceiling.
    Buffered,
    /// The distinct-metric count or this metric's value count hit its ceiling.
    AtCapacity,
}

#[derive(Debug, Clone, Default)]
pub struct MetricStore {
    metrics: Vec<Metric>,
}

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` to `name`, creating the metric if absent.
    ///
    /// The most recent unit wins; a differing resolution is remembered as a conflict.
    pub fn add(&mut self, name: &str, unit: Unit, resolution: MetricResolution, value: f64) -> AddOutcome {
        let values_len = match self.metrics.iter_mut().find(|m| m.name == name) {
            Some(m) => {
                if m.resolution != resolution {
                    m.resolution_conflict = true;
                }
                m.unit = unit;
                m.values.push(value);
                m.values.len()
            }
            None => {
                self.metrics.push(Metric {
                    name: name.to_string(),
                    unit,
                    resolution,
                    values: vec![value],
                    resolution_conflict: false,
                });
                1
            }
        };

        if values_len >= MAX_VALUES_PER_METRIC || self.metrics.len() >= MAX_METRICS {
            AddOutcome::AtCapacity
        } else {
            AddOutcome::Buffered
        }
    }

    pub fn get(&self, name: &str) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.name == name)
    }

    /// True when adding a value for `name` would push a record past a limit.
    pub fn is_full_for(&self, name: &str) -> bool {
        match self.get(name) {
            Some(m) => m.values.len() >= MAX_VALUES_PER_METRIC,
            None => self.metrics.len() >= MAX_METRICS,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Metric> {
        self.metrics.iter()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn clear(&mut self) {
        self.metrics.clear();
    }
}

/// Dimension set shared by every metric in the cycle. Last write per name wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionStore {
    dims: Vec<(String, String)>,
}

impl DimensionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        match self.dims.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.dims.push((name.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.dims
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.dims.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.dims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn clear(&mut self) {
        self.dims.clear();
    }
}

/// Free-form top-level properties. Never validated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataStore {
    entries: Vec<(String, Value)>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
