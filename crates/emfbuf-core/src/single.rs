//! Isolated scope for a one-off metric.
//!
//! A `SingleMetric` owns a private `MetricBuffer`, so a metric whose
//! dimensions differ from the rest of the application gets a record of its
//! own. It shares nothing with any `Aggregator`.
//!
//! The scope flushes exactly once: explicitly via `finish`, via
//! `single_metric` when the closure returns, or on drop (unwinding included)
//! if neither ran. Drop cannot return an error, so a failed drop-time flush
//! is logged instead.

use std::sync::Arc;

use serde_json::Value;

use crate::buffer::MetricBuffer;
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::record::EmfRecord;
use crate::sink::RecordSink;
use crate::unit::{MetricResolution, Unit, UnitPolicy};

pub struct SingleMetric {
    buffer: MetricBuffer,
    sink: Arc<dyn RecordSink>,
    clock: Arc<dyn Clock>,
    done: bool,
}

impl SingleMetric {
    /// Open a scope under `namespace`. Blank namespaces are a configuration error.
    pub fn new(namespace: &str, sink: Arc<dyn RecordSink>) -> Result<Self> {
        let mut buffer = MetricBuffer::new();
        buffer.set_namespace(namespace)?;
        Ok(Self {
            buffer,
            sink,
            clock: Arc::new(SystemClock),
            done: false,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_unit_policy(mut self, policy: UnitPolicy) -> Self {
        self.buffer = std::mem::take(&mut self.buffer).with_unit_policy(policy);
        self
    }

    /// Seed one extra dimension (e.g. the enclosing service).
    pub fn with_dimension(mut self, name: &str, value: impl AsRef<str>) -> Self {
        self.buffer.add_dimension(name, value.as_ref());
        self
    }

    pub fn with_metric(mut self, name: &str, unit: impl Into<Unit>, value: impl Into<f64>) -> Self {
        self.add_metric(name, unit, value);
        self
    }

    /// Set the scope's metric. A different name replaces the previous one.
    pub fn add_metric(&mut self, name: &str, unit: impl Into<Unit>, value: impl Into<f64>) {
        self.add_metric_with_resolution(name, unit, MetricResolution::Standard, value);
    }

    pub fn add_metric_with_resolution(
        &mut self,
        name: &str,
        unit: impl Into<Unit>,
        resolution: MetricResolution,
        value: impl Into<f64>,
    ) {
        let replaced = self
            .buffer
            .metrics()
            .iter()
            .find(|m| m.name != name)
            .map(|m| m.name.clone());
        if let Some(previous) = replaced {
            tracing::warn!(
                previous = %previous,
                metric = %name,
                "single metric scope holds one metric; replacing"
            );
            self.buffer.clear_metrics();
        }
        if self.buffer.metrics().is_full_for(name) {
            tracing::warn!(metric = %name, "single metric scope is full; dropping value");
            return;
        }
        // One record per scope; the capacity signal does not apply.
        let _ = self.buffer.add_metric(name, unit.into(), resolution, value.into());
    }

    pub fn add_dimension(&mut self, name: &str, value: impl AsRef<str>) {
        self.buffer.add_dimension(name, value.as_ref());
    }

    pub fn add_metadata(&mut self, key: &str, value: impl Into<Value>) {
        self.buffer.add_metadata(key, value.into());
    }

    pub fn set_timestamp(&mut self, millis: i64) {
        self.buffer.set_timestamp(millis);
    }

    pub fn buffer(&self) -> &MetricBuffer {
        &self.buffer
    }

    /// Validate, serialize, and emit. Emission is skipped when validation fails.
    pub fn finish(mut self) -> Result<EmfRecord> {
        self.done = true;
        self.emit()
    }

    fn emit(&self) -> Result<EmfRecord> {
        let record = self.buffer.serialize(self.clock.now_millis())?;
        self.sink.emit(&record)?;
        tracing::debug!(namespace = %record.namespace(), "emitted single metric record");
        Ok(record)
    }
}

impl Drop for SingleMetric {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        if let Err(e) = self.emit() {
            tracing::error!(error = %e, "single metric scope dropped without a valid record");
        }
    }
}

/// Run `f` inside a scope and flush once it returns.
///
/// ```ignore
/// single_metric(
///     SingleMetric::new("App", sink)?.with_metric("Refunds", MetricUnit::Count, 1),
///     |m| m.add_dimension("payment", "card"),
/// )?;
/// ```
pub fn single_metric<R>(mut scope: SingleMetric, f: impl FnOnce(&mut SingleMetric) -> R) -> Result<R> {
    let out = f(&mut scope);
    scope.finish()?;
    Ok(out)
}
