//! Embedded Metric Format record.
//!
//! Wire shape (one JSON object per flush):
//! - every metric as a top-level key holding a number, or an array of numbers
//!   when more than one value was accumulated
//! - `_aws` with `Timestamp` and a single `CloudWatchMetrics` directive whose
//!   `Dimensions` holds exactly one dimension set
//! - dimension name/value pairs and metadata entries flattened at the top level
//!
//! Top-level keys are written in that order; within each group, in insertion order.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::{EmfError, Result};
use crate::unit::MetricResolution;

/// Reserved top-level key holding the metric directive.
pub const AWS_KEY: &str = "_aws";

/// Largest magnitude at which every integer is exactly representable in an f64.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// `{ "Name", "Unit", "StorageResolution"? }` entry of the directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricDefinition {
    pub name: String,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_resolution: Option<u32>,
}

impl MetricDefinition {
    pub fn new(name: &str, unit: String, resolution: MetricResolution) -> Self {
        let storage_resolution = match resolution {
            MetricResolution::High => Some(resolution.seconds()),
            MetricResolution::Standard => None,
        };
        Self {
            name: name.to_string(),
            unit,
            storage_resolution,
        }
    }
}

/// A validated, serializable record. Built by `MetricBuffer::serialize`.
#[derive(Debug, Clone, PartialEq)]
pub struct EmfRecord {
    pub(crate) timestamp: i64,
    pub(crate) namespace: String,
    pub(crate) values: Vec<(String, Vec<f64>)>,
    pub(crate) definitions: Vec<MetricDefinition>,
    pub(crate) dimensions: Vec<(String, String)>,
    pub(crate) metadata: Vec<(String, Value)>,
}

impl EmfRecord {
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn metric_names(&self) -> Vec<&str> {
        self.values.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// All values accumulated for `name`, in insertion order.
    pub fn values(&self, name: &str) -> Option<&[f64]> {
        self.values
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn definitions(&self) -> &[MetricDefinition] {
        &self.definitions
    }

    pub fn dimension(&self, name: &str) -> Option<&str> {
        self.dimensions
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn dimension_names(&self) -> Vec<&str> {
        self.dimensions.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Same record with a different timestamp.
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| EmfError::Emission(format!("encode record failed: {e}")))
    }

    /// Compact single-line JSON, without the trailing newline.
    pub fn to_json_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| EmfError::Emission(format!("encode record failed: {e}")))
    }
}

/// Integral values go out as JSON integers (`1`, not `1.0`).
struct Number(f64);

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        let v = self.0;
        if v.fract() == 0.0 && v.abs() <= MAX_SAFE_INTEGER {
            s.serialize_i64(v as i64)
        } else {
            s.serialize_f64(v)
        }
    }
}

struct Values<'a>(&'a [f64]);

impl Serialize for Values<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        if let [single] = self.0 {
            return Number(*single).serialize(s);
        }
        let mut seq = s.serialize_seq(Some(self.0.len()))?;
        for v in self.0 {
            seq.serialize_element(&Number(*v))?;
        }
        seq.end()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AwsBlock<'a> {
    timestamp: i64,
    cloud_watch_metrics: [Directive<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Directive<'a> {
    namespace: &'a str,
    dimensions: [Vec<&'a str>; 1],
    metrics: &'a [MetricDefinition],
}

impl Serialize for EmfRecord {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        let entries = self.values.len() + 1 + self.dimensions.len() + self.metadata.len();
        let mut map = s.serialize_map(Some(entries))?;

        for (name, values) in &self.values {
            map.serialize_entry(name, &Values(values))?;
        }

        let aws = AwsBlock {
            timestamp: self.timestamp,
            cloud_watch_metrics: [Directive {
                namespace: &self.namespace,
                dimensions: [self.dimension_names()],
                metrics: &self.definitions,
            }],
        };
        map.serialize_entry(AWS_KEY, &aws)?;

        for (name, value) in &self.dimensions {
            map.serialize_entry(name, value)?;
        }
        for (key, value) in &self.metadata {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
