//! emfbuf core: in-process metrics buffer serialized as CloudWatch Embedded Metric Format.
//!
//! This crate holds the aggregation model (metrics, dimensions, metadata,
//! namespace), the validation rules a record must satisfy, the serializer
//! that produces the EMF JSON object, and the flush/clear lifecycle. It has no
//! runtime dependencies; where records go is decided by a `RecordSink`.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Every fallible
//! path surfaces as `EmfError`, and add operations never fail on content.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod aggregator;
pub mod buffer;
pub mod clock;
pub mod error;
pub mod record;
pub mod single;
pub mod sink;
pub mod store;
pub mod unit;

pub use aggregator::{Aggregator, AggregatorBuilder, SERVICE_DIMENSION};
pub use clock::{Clock, FixedClock, SystemClock};
/// Shared result type.
pub use error::{EmfError, ErrorKind, Result, SchemaViolation};
pub use record::EmfRecord;
pub use single::{single_metric, SingleMetric};
pub use sink::{MemorySink, RecordSink, WriterSink};
pub use unit::{MetricResolution, MetricUnit, Unit, UnitPolicy};
