//! One flush cycle's worth of state, plus the validate/serialize step.
//!
//! `MetricBuffer` is the piece shared by `Aggregator` and `SingleMetric`:
//! the namespace holder, the three stores, and the checks a record must pass.
//! Validation happens only in `serialize`, so adds never fail.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::{EmfError, Result, SchemaViolation};
use crate::record::{EmfRecord, MetricDefinition, AWS_KEY};
use crate::store::{
    AddOutcome, DimensionStore, MetadataStore, MetricStore, MAX_DIMENSIONS, MAX_METRICS,
    MAX_VALUES_PER_METRIC,
};
use crate::unit::{MetricResolution, Unit, UnitPolicy};

/// Longest metric name CloudWatch accepts.
pub const MAX_METRIC_NAME_LEN: usize = 255;

/// Reject a blank namespace; returns it trimmed.
pub(crate) fn checked_namespace(namespace: &str) -> Result<String> {
    let ns = namespace.trim();
    if ns.is_empty() {
        return Err(EmfError::Configuration("namespace must not be blank".into()));
    }
    Ok(ns.to_string())
}

#[derive(Debug, Clone, Default)]
pub struct MetricBuffer {
    namespace: Option<String>,
    metrics: MetricStore,
    dimensions: DimensionStore,
    metadata: MetadataStore,
    unit_policy: UnitPolicy,
    timestamp: Option<i64>,
}

impl MetricBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unit_policy(mut self, policy: UnitPolicy) -> Self {
        self.unit_policy = policy;
        self
    }

    pub fn unit_policy(&self) -> UnitPolicy {
        self.unit_policy
    }

    /// Set (or replace) the namespace. Blank input is a configuration error.
    pub fn set_namespace(&mut self, namespace: &str) -> Result<()> {
        self.namespace = Some(checked_namespace(namespace)?);
        Ok(())
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn add_metric(&mut self, name: &str, unit: Unit, resolution: MetricResolution, value: f64) -> AddOutcome {
        self.metrics.add(name, unit, resolution, value)
    }

    /// Insert or overwrite a dimension. Blank names or values are skipped.
    pub fn add_dimension(&mut self, name: &str, value: &str) {
        if name.trim().is_empty() || value.trim().is_empty() {
            tracing::warn!(dimension = %name, "skipping dimension with blank name or value");
            return;
        }
        self.dimensions.insert(name, value);
    }

    pub fn add_metadata(&mut self, key: &str, value: Value) {
        self.metadata.insert(key, value);
    }

    pub fn set_timestamp(&mut self, millis: i64) {
        self.timestamp = Some(millis);
    }

    pub fn timestamp_override(&self) -> Option<i64> {
        self.timestamp
    }

    pub fn metrics(&self) -> &MetricStore {
        &self.metrics
    }

    pub fn dimensions(&self) -> &DimensionStore {
        &self.dimensions
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Drop accumulated metrics only.
    pub fn clear_metrics(&mut self) {
        self.metrics.clear();
    }

    /// Empty the three stores and drop any timestamp override. Keeps the namespace.
    pub fn clear(&mut self) {
        self.metrics.clear();
        self.dimensions.clear();
        self.metadata.clear();
        self.timestamp = None;
    }

    /// Build the record stamped with `now_millis` (or the override). Never mutates.
    pub fn serialize(&self, now_millis: i64) -> Result<EmfRecord> {
        self.build(self.timestamp.unwrap_or(now_millis))
    }

    fn build(&self, timestamp: i64) -> Result<EmfRecord> {
        if self.metrics.is_empty() {
            return Err(SchemaViolation::NoMetrics.into());
        }
        let namespace = self
            .namespace
            .as_deref()
            .ok_or(SchemaViolation::MissingNamespace)?;

        match self.dimensions.len() {
            0 => return Err(SchemaViolation::TooFewDimensions.into()),
            n if n > MAX_DIMENSIONS => {
                return Err(SchemaViolation::TooManyDimensions {
                    count: n,
                    max: MAX_DIMENSIONS,
                }
                .into())
            }
            _ => {}
        }
        if self.metrics.len() > MAX_METRICS {
            return Err(SchemaViolation::TooManyMetrics {
                count: self.metrics.len(),
                max: MAX_METRICS,
            }
            .into());
        }

        let mut values = Vec::with_capacity(self.metrics.len());
        let mut definitions = Vec::with_capacity(self.metrics.len());
        for m in self.metrics.iter() {
            if m.name.is_empty() || m.name.chars().count() > MAX_METRIC_NAME_LEN {
                return Err(SchemaViolation::InvalidMetricName { name: m.name.clone() }.into());
            }
            if m.values.len() > MAX_VALUES_PER_METRIC {
                return Err(SchemaViolation::TooManyValues {
                    metric: m.name.clone(),
                    count: m.values.len(),
                    max: MAX_VALUES_PER_METRIC,
                }
                .into());
            }
            if m.values.iter().any(|v| !v.is_finite()) {
                return Err(SchemaViolation::NonFiniteValue { metric: m.name.clone() }.into());
            }
            if m.resolution_conflict {
                return Err(SchemaViolation::ConflictingResolution { metric: m.name.clone() }.into());
            }
            let unit = m.unit.resolve(self.unit_policy).ok_or_else(|| {
                SchemaViolation::UnsupportedUnit {
                    metric: m.name.clone(),
                    unit: m.unit.as_raw().to_string(),
                }
            })?;
            definitions.push(MetricDefinition::new(&m.name, unit, m.resolution));
            values.push((m.name.clone(), m.values.clone()));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(AWS_KEY);
        let keys = self
            .metrics
            .iter()
            .map(|m| m.name.as_str())
            .chain(self.dimensions.iter().map(|(k, _)| k))
            .chain(self.metadata.iter().map(|(k, _)| k));
        for key in keys {
            if !seen.insert(key) {
                return Err(SchemaViolation::KeyCollision { key: key.to_string() }.into());
            }
        }

        Ok(EmfRecord {
            timestamp,
            namespace: namespace.to_string(),
            values,
            definitions,
            dimensions: self
                .dimensions
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            metadata: self
                .metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        })
    }
}
