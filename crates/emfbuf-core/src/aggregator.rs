//! The shared metrics buffer for one execution context.
//!
//! Lifecycle of one cycle:
//! - add metrics, dimensions, and metadata freely (adds never validate)
//! - `serialize` checks invariants and builds the record without mutating
//! - `flush` serializes and emits; `clear` starts the next cycle
//!
//! The add that brings the buffer to a record limit (100 distinct metrics, or
//! 100 values for one metric) flushes and drops the metrics before returning.
//! Dimensions, metadata, and the timestamp override carry over to the metrics
//! that follow. If that flush fails the buffer stays at the limit, and the
//! next add that would exceed it retries the flush first; the value is only
//! buffered once the retry succeeds.
//!
//! Not internally synchronized: share across threads behind a `Mutex`, or
//! give each concurrent unit of work its own `Aggregator`.

use std::sync::Arc;

use serde_json::Value;

use crate::buffer::{checked_namespace, MetricBuffer};
use crate::clock::{Clock, SystemClock};
use crate::error::{EmfError, Result};
use crate::record::EmfRecord;
use crate::sink::{RecordSink, WriterSink};
use crate::store::{AddOutcome, DimensionStore};
use crate::unit::{MetricResolution, Unit, UnitPolicy};

/// Dimension name synthesized from the configured service.
pub const SERVICE_DIMENSION: &str = "service";

/// Timestamps older than this (14 days) are logged as suspicious.
const MAX_TIMESTAMP_PAST_MS: i64 = 14 * 24 * 60 * 60 * 1000;
/// Timestamps further ahead than this (2 hours) are logged as suspicious.
const MAX_TIMESTAMP_FUTURE_MS: i64 = 2 * 60 * 60 * 1000;

/// Builder for `Aggregator`.
#[derive(Default)]
pub struct AggregatorBuilder {
    namespace: Option<String>,
    service: Option<String>,
    default_dimensions: Vec<(String, String)>,
    unit_policy: UnitPolicy,
    sink: Option<Arc<dyn RecordSink>>,
    clock: Option<Arc<dyn Clock>>,
}

impl AggregatorBuilder {
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Adds a `service` default dimension.
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn default_dimension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_dimensions.push((name.into(), value.into()));
        self
    }

    pub fn unit_policy(mut self, policy: UnitPolicy) -> Self {
        self.unit_policy = policy;
        self
    }

    /// Defaults to stdout.
    pub fn sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Defaults to the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<Aggregator> {
        let mut buffer = MetricBuffer::new().with_unit_policy(self.unit_policy);
        if let Some(ns) = &self.namespace {
            buffer.set_namespace(ns)?;
        }

        let mut defaults = DimensionStore::new();
        if let Some(service) = &self.service {
            let service = service.trim();
            if service.is_empty() {
                return Err(EmfError::Configuration("service must not be blank".into()));
            }
            defaults.insert(SERVICE_DIMENSION, service);
        }
        for (name, value) in &self.default_dimensions {
            if name.trim().is_empty() || value.trim().is_empty() {
                return Err(EmfError::Configuration(format!(
                    "default dimension {name:?} must have a non-blank name and value"
                )));
            }
            defaults.insert(name, value);
        }

        let mut agg = Aggregator {
            buffer,
            defaults,
            sink: self.sink.unwrap_or_else(|| Arc::new(WriterSink::stdout())),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        };
        agg.reseed();
        Ok(agg)
    }
}

pub struct Aggregator {
    buffer: MetricBuffer,
    defaults: DimensionStore,
    sink: Arc<dyn RecordSink>,
    clock: Arc<dyn Clock>,
}

impl Aggregator {
    pub fn builder() -> AggregatorBuilder {
        AggregatorBuilder::default()
    }

    /// Replace the namespace. Blank input fails with a configuration error.
    pub fn set_namespace(&mut self, namespace: &str) -> Result<()> {
        self.buffer.set_namespace(namespace)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.buffer.namespace()
    }

    /// Insert or overwrite a dimension for this cycle.
    pub fn add_dimension(&mut self, name: &str, value: impl AsRef<str>) {
        self.buffer.add_dimension(name, value.as_ref());
    }

    /// Dimensions that survive `clear`. Also applied to the current cycle.
    pub fn set_default_dimensions<I, K, V>(&mut self, dims: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in dims {
            let (name, value) = (name.as_ref(), value.as_ref());
            if name.trim().is_empty() || value.trim().is_empty() {
                tracing::warn!(dimension = %name, "skipping default dimension with blank name or value");
                continue;
            }
            self.defaults.insert(name, value);
            self.buffer.add_dimension(name, value);
        }
    }

    /// Forget default dimensions (including `service`). The current cycle keeps its dimensions.
    pub fn clear_default_dimensions(&mut self) {
        self.defaults.clear();
    }

    pub fn default_dimensions(&self) -> &DimensionStore {
        &self.defaults
    }

    /// Append a standard-resolution value to `name`.
    ///
    /// Fails only when this add triggers a capacity flush and that flush fails.
    /// A value that would exceed a limit still held from an earlier failed
    /// flush is not buffered.
    pub fn add_metric(&mut self, name: &str, unit: impl Into<Unit>, value: impl Into<f64>) -> Result<()> {
        self.add_metric_with_resolution(name, unit, MetricResolution::Standard, value)
    }

    pub fn add_metric_with_resolution(
        &mut self,
        name: &str,
        unit: impl Into<Unit>,
        resolution: MetricResolution,
        value: impl Into<f64>,
    ) -> Result<()> {
        if self.buffer.metrics().is_full_for(name) {
            tracing::debug!(metric = %name, "buffer still at record limit, retrying flush");
            self.flush_metrics()?;
        }
        match self.buffer.add_metric(name, unit.into(), resolution, value.into()) {
            AddOutcome::Buffered => Ok(()),
            AddOutcome::AtCapacity => {
                tracing::debug!(
                    metric = %name,
                    metrics = self.buffer.metrics().len(),
                    "record limit reached, flushing"
                );
                self.flush_metrics()
            }
        }
    }

    fn flush_metrics(&mut self) -> Result<()> {
        self.flush()?;
        self.buffer.clear_metrics();
        Ok(())
    }

    pub fn add_metadata(&mut self, key: &str, value: impl Into<Value>) {
        self.buffer.add_metadata(key, value.into());
    }

    /// Pin this cycle's record timestamp (epoch millis). Cleared by `clear`.
    pub fn set_timestamp(&mut self, millis: i64) {
        let now = self.clock.now_millis();
        if millis < now.saturating_sub(MAX_TIMESTAMP_PAST_MS)
            || millis > now.saturating_add(MAX_TIMESTAMP_FUTURE_MS)
        {
            tracing::warn!(
                timestamp = millis,
                now,
                "timestamp is outside the window CloudWatch accepts (14 days back, 2 hours ahead)"
            );
        }
        self.buffer.set_timestamp(millis);
    }

    /// Current cycle state.
    pub fn buffer(&self) -> &MetricBuffer {
        &self.buffer
    }

    pub fn metric_count(&self) -> usize {
        self.buffer.metrics().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.metrics().is_empty()
    }

    /// Validate and build the record. Does not mutate.
    pub fn serialize(&self) -> Result<EmfRecord> {
        self.buffer.serialize(self.clock.now_millis())
    }

    /// Serialize and emit to the sink. Does not clear.
    pub fn flush(&self) -> Result<EmfRecord> {
        let record = self.serialize()?;
        self.sink.emit(&record)?;
        tracing::debug!(
            namespace = %record.namespace(),
            metrics = record.definitions().len(),
            "emitted metrics record"
        );
        Ok(record)
    }

    /// Flush, then clear on success. On failure the buffer is left as is.
    pub fn flush_and_clear(&mut self) -> Result<EmfRecord> {
        let record = self.flush()?;
        self.clear();
        Ok(record)
    }

    /// Empty metrics, dimensions, and metadata; restore default dimensions.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.reseed();
    }

    fn reseed(&mut self) {
        for (name, value) in self.defaults.iter() {
            self.buffer.add_dimension(name, value);
        }
    }
}

/// Shorthand for `checked_namespace`, exposed for collaborators validating config.
pub fn validate_namespace(namespace: &str) -> Result<String> {
    checked_namespace(namespace)
}
