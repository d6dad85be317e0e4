#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::io;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;

use emfbuf_core::{
    Aggregator, EmfError, EmfRecord, ErrorKind, FixedClock, MemorySink, MetricResolution,
    MetricUnit, RecordSink, Result, SchemaViolation, WriterSink,
};

const NOW_MS: i64 = 1_700_000_000_000;

fn setup() -> (Aggregator, Arc<MemorySink>, Arc<FixedClock>) {
    let sink = Arc::new(MemorySink::new());
    let clock = Arc::new(FixedClock::new(NOW_MS));
    let agg = Aggregator::builder()
        .namespace("App")
        .service("booking")
        .sink(sink.clone())
        .clock(clock.clone())
        .build()
        .unwrap();
    (agg, sink, clock)
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn with_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, logs.text())
}

struct FailingSink;

impl RecordSink for FailingSink {
    fn emit(&self, _record: &EmfRecord) -> Result<()> {
        Err(EmfError::Emission("stdout closed".into()))
    }
}

#[test]
fn record_holds_every_distinct_metric_in_insertion_order() {
    let (mut agg, _, _) = setup();
    agg.add_metric("Orders", MetricUnit::Count, 1).unwrap();
    agg.add_metric("Latency", MetricUnit::Milliseconds, 40.5).unwrap();
    agg.add_metric("Orders", MetricUnit::Count, 2).unwrap();
    agg.add_metric("Orders", MetricUnit::Count, 5).unwrap();

    let record = agg.serialize().unwrap();
    assert_eq!(record.metric_names(), vec!["Orders", "Latency"]);
    assert_eq!(record.values("Orders").unwrap(), &[1.0, 2.0, 5.0]);
    assert_eq!(record.values("Latency").unwrap(), &[40.5]);
    assert_eq!(record.timestamp(), NOW_MS);
    assert_eq!(record.namespace(), "App");

    let json = record.to_value().unwrap();
    assert_eq!(json["Orders"], serde_json::json!([1, 2, 5]));
    assert_eq!(json["Latency"], 40.5);
    assert_eq!(json["service"], "booking");
}

#[test]
fn hundredth_distinct_metric_flushes_once() {
    let (mut agg, sink, _) = setup();
    for i in 0..99 {
        agg.add_metric(&format!("Metric{i}"), MetricUnit::Count, 1).unwrap();
    }
    assert!(sink.is_empty());
    assert_eq!(agg.metric_count(), 99);

    agg.add_metric("Metric99", MetricUnit::Count, 1).unwrap();
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].metric_names().len(), 100);
    assert_eq!(agg.metric_count(), 0);

    agg.add_metric("After", MetricUnit::Count, 1).unwrap();
    assert_eq!(sink.len(), 1);
    let next = agg.serialize().unwrap();
    assert_eq!(next.metric_names(), vec!["After"]);
    assert_eq!(next.dimension("service"), Some("booking"));
}

#[test]
fn hundredth_value_of_one_metric_flushes() {
    let (mut agg, sink, _) = setup();
    for _ in 0..99 {
        agg.add_metric("Hits", MetricUnit::Count, 1).unwrap();
    }
    assert!(sink.is_empty());

    agg.add_metric("Hits", MetricUnit::Count, 1).unwrap();
    let records = sink.take();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].values("Hits").unwrap().len(), 100);
    assert!(agg.is_empty());
}

#[test]
fn failed_capacity_flush_surfaces_from_add() {
    let mut agg = Aggregator::builder()
        .service("booking")
        .sink(Arc::new(MemorySink::new()))
        .build()
        .unwrap();
    for i in 0..99 {
        agg.add_metric(&format!("Metric{i}"), MetricUnit::Count, 1).unwrap();
    }
    let err = agg.add_metric("Metric99", MetricUnit::Count, 1).unwrap_err();
    assert_eq!(err.violation(), Some(&SchemaViolation::MissingNamespace));
    assert_eq!(agg.metric_count(), 100);
}

#[test]
fn buffer_at_metric_limit_never_grows_past_it() {
    let sink = Arc::new(MemorySink::new());
    let mut agg = Aggregator::builder()
        .service("booking")
        .sink(sink.clone())
        .build()
        .unwrap();
    for i in 0..100 {
        let _ = agg.add_metric(&format!("Metric{i}"), MetricUnit::Count, 1);
    }

    let err = agg.add_metric("Metric100", MetricUnit::Count, 1).unwrap_err();
    assert_eq!(err.violation(), Some(&SchemaViolation::MissingNamespace));
    assert_eq!(agg.metric_count(), 100);
    assert!(agg.buffer().metrics().get("Metric100").is_none());

    agg.set_namespace("App").unwrap();
    agg.add_metric("Metric100", MetricUnit::Count, 1).unwrap();
    let records = sink.take();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].metric_names().len(), 100);
    assert_eq!(agg.serialize().unwrap().metric_names(), vec!["Metric100"]);
}

#[test]
fn metric_at_value_limit_retries_flush_before_growing() {
    let sink = Arc::new(MemorySink::new());
    let mut agg = Aggregator::builder()
        .namespace("App")
        .sink(sink.clone())
        .build()
        .unwrap();
    for _ in 0..99 {
        agg.add_metric("Hits", MetricUnit::Count, 1).unwrap();
    }
    let err = agg.add_metric("Hits", MetricUnit::Count, 1).unwrap_err();
    assert_eq!(err.violation(), Some(&SchemaViolation::TooFewDimensions));
    assert_eq!(agg.buffer().metrics().get("Hits").unwrap().values.len(), 100);

    agg.add_dimension("region", "eu-west-1");
    agg.add_metric("Hits", MetricUnit::Count, 2).unwrap();

    let records = sink.take();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].values("Hits").unwrap().len(), 100);
    assert_eq!(agg.buffer().metrics().get("Hits").unwrap().values, vec![2.0]);
}

#[test]
fn capacity_flush_keeps_cycle_context() {
    let (mut agg, sink, _) = setup();
    agg.add_dimension("env", "prod");
    agg.add_metadata("request_id", "r-9");
    agg.set_timestamp(NOW_MS - 5_000);
    for i in 0..101 {
        agg.add_metric(&format!("Metric{i}"), MetricUnit::Count, 1).unwrap();
    }

    let flushed = sink.take();
    assert_eq!(flushed.len(), 1);
    assert_eq!(flushed[0].dimension("env"), Some("prod"));

    assert_eq!(agg.buffer().dimensions().get("env"), Some("prod"));
    assert_eq!(agg.buffer().metadata().get("request_id").unwrap(), "r-9");
    assert_eq!(agg.buffer().timestamp_override(), Some(NOW_MS - 5_000));

    let next = agg.serialize().unwrap();
    assert_eq!(next.metric_names(), vec!["Metric100"]);
    assert_eq!(next.dimension_names(), vec!["service", "env"]);
    assert_eq!(next.metadata("request_id").unwrap(), "r-9");
    assert_eq!(next.timestamp(), NOW_MS - 5_000);
}

#[test]
fn clear_then_serialize_reports_empty_metrics() {
    let (mut agg, _, _) = setup();
    agg.add_metric("Orders", MetricUnit::Count, 1).unwrap();
    agg.add_dimension("region", "eu-west-1");
    agg.add_metadata("request_id", "abc");
    agg.clear();

    let err = agg.serialize().unwrap_err();
    assert!(err.is_empty_metrics());
    assert_eq!(err.kind(), ErrorKind::SchemaValidation);

    assert_eq!(agg.namespace(), Some("App"));
    let dims: Vec<_> = agg.buffer().dimensions().iter().collect();
    assert_eq!(dims, vec![("service", "booking")]);
    assert!(agg.buffer().metadata().is_empty());
}

#[test]
fn serialize_is_repeatable_apart_from_timestamp() {
    let (mut agg, _, clock) = setup();
    agg.add_metric("Orders", MetricUnit::Count, 3).unwrap();
    agg.add_metadata("cart", serde_json::json!({ "items": 2 }));

    let first = agg.serialize().unwrap();
    clock.advance(1_500);
    let second = agg.serialize().unwrap();

    assert_eq!(second.timestamp(), first.timestamp() + 1_500);
    let second = second.with_timestamp(first.timestamp());
    assert_eq!(first.to_json_line().unwrap(), second.to_json_line().unwrap());
}

#[test]
fn flush_emits_without_clearing() {
    let (mut agg, sink, _) = setup();
    agg.add_metric("Orders", MetricUnit::Count, 1).unwrap();

    let record = agg.flush().unwrap();
    assert_eq!(sink.records(), vec![record]);
    assert_eq!(agg.metric_count(), 1);

    agg.flush_and_clear().unwrap();
    assert_eq!(sink.len(), 2);
    assert!(agg.is_empty());
}

#[test]
fn sink_failure_propagates_and_keeps_buffer() {
    let mut agg = Aggregator::builder()
        .namespace("App")
        .service("booking")
        .sink(Arc::new(FailingSink))
        .build()
        .unwrap();
    agg.add_metric("Orders", MetricUnit::Count, 1).unwrap();

    let err = agg.flush_and_clear().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Emission);
    assert_eq!(agg.metric_count(), 1);
}

#[test]
fn default_dimensions_survive_clear_but_overrides_do_not() {
    let (mut agg, _, _) = setup();
    agg.set_default_dimensions([("environment", "prod")]);
    agg.add_dimension("service", "override");
    agg.add_metric("Orders", MetricUnit::Count, 1).unwrap();

    let record = agg.serialize().unwrap();
    assert_eq!(record.dimension("service"), Some("override"));
    assert_eq!(record.dimension_names(), vec!["service", "environment"]);

    let defaults: Vec<_> = agg.default_dimensions().iter().collect();
    assert_eq!(defaults, vec![("service", "booking"), ("environment", "prod")]);

    agg.clear();
    agg.add_metric("Orders", MetricUnit::Count, 1).unwrap();
    let record = agg.serialize().unwrap();
    assert_eq!(record.dimension("service"), Some("booking"));
    assert_eq!(record.dimension("environment"), Some("prod"));

    agg.clear_default_dimensions();
    agg.clear();
    agg.add_metric("Orders", MetricUnit::Count, 1).unwrap();
    let err = agg.serialize().unwrap_err();
    assert_eq!(err.violation(), Some(&SchemaViolation::TooFewDimensions));
}

#[test]
fn timestamp_override_applies_to_one_cycle() {
    let (mut agg, _, _) = setup();
    agg.set_timestamp(NOW_MS - 60_000);
    agg.add_metric("Orders", MetricUnit::Count, 1).unwrap();
    assert_eq!(agg.serialize().unwrap().timestamp(), NOW_MS - 60_000);

    agg.clear();
    agg.add_metric("Orders", MetricUnit::Count, 1).unwrap();
    assert_eq!(agg.serialize().unwrap().timestamp(), NOW_MS);
}

#[test]
fn timestamp_outside_accepted_window_warns() {
    let (mut agg, _, clock) = setup();
    let ((), logs) = with_logs(|| agg.set_timestamp(NOW_MS - 60_000));
    assert!(!logs.contains("WARN"), "logs={logs}");

    let ((), logs) = with_logs(|| agg.set_timestamp(NOW_MS - 15 * 24 * 60 * 60 * 1000));
    assert!(logs.contains("WARN"), "logs={logs}");
    assert!(logs.contains("outside the window"), "logs={logs}");

    let ((), logs) = with_logs(|| agg.set_timestamp(NOW_MS + 3 * 60 * 60 * 1000));
    assert!(logs.contains("outside the window"), "logs={logs}");

    clock.set(i64::MIN);
    let ((), logs) = with_logs(|| agg.set_timestamp(i64::MAX));
    assert!(logs.contains("outside the window"), "logs={logs}");

    clock.set(NOW_MS);
    agg.add_metric("Orders", MetricUnit::Count, 1).unwrap();
    assert_eq!(agg.serialize().unwrap().timestamp(), i64::MAX);
}

#[test]
fn conflicting_resolution_fails_validation() {
    let (mut agg, _, _) = setup();
    agg.add_metric_with_resolution("Latency", MetricUnit::Milliseconds, MetricResolution::High, 3)
        .unwrap();
    agg.add_metric("Latency", MetricUnit::Milliseconds, 4).unwrap();

    let err = agg.serialize().unwrap_err();
    assert_eq!(
        err.violation(),
        Some(&SchemaViolation::ConflictingResolution { metric: "Latency".into() })
    );
}

#[test]
fn non_finite_values_and_bad_names_are_rejected() {
    let (mut agg, _, _) = setup();
    agg.add_metric("Ratio", MetricUnit::Percent, f64::NAN).unwrap();
    let err = agg.serialize().unwrap_err();
    assert_eq!(
        err.violation(),
        Some(&SchemaViolation::NonFiniteValue { metric: "Ratio".into() })
    );

    agg.clear();
    agg.add_metric("", MetricUnit::Count, 1).unwrap();
    let err = agg.serialize().unwrap_err();
    assert_eq!(
        err.violation(),
        Some(&SchemaViolation::InvalidMetricName { name: String::new() })
    );

    agg.clear();
    agg.add_metric(&"x".repeat(256), MetricUnit::Count, 1).unwrap();
    assert!(matches!(
        agg.serialize().unwrap_err().violation(),
        Some(SchemaViolation::InvalidMetricName { .. })
    ));
}

#[test]
fn blank_dimensions_are_skipped() {
    let (mut agg, _, _) = setup();
    agg.add_dimension("", "value");
    agg.add_dimension("region", "  ");
    assert_eq!(agg.buffer().dimensions().len(), 1);
}

#[test]
fn last_dimension_write_wins() {
    let (mut agg, _, _) = setup();
    agg.add_dimension("region", "eu-west-1");
    agg.add_dimension("region", "us-east-1");
    agg.add_metric("Orders", MetricUnit::Count, 1).unwrap();

    let record = agg.serialize().unwrap();
    assert_eq!(record.dimension("region"), Some("us-east-1"));
    assert_eq!(record.dimension_names(), vec!["service", "region"]);
}

#[test]
fn nine_dimensions_are_accepted() {
    let (mut agg, _, _) = setup();
    for i in 0..8 {
        agg.add_dimension(&format!("d{i}"), "v");
    }
    agg.add_metric("Orders", MetricUnit::Count, 1).unwrap();
    assert_eq!(agg.serialize().unwrap().dimension_names().len(), 9);

    agg.add_dimension("d8", "v");
    assert_eq!(
        agg.serialize().unwrap_err().violation(),
        Some(&SchemaViolation::TooManyDimensions { count: 10, max: 9 })
    );
}

#[test]
fn namespace_rules() {
    let (mut agg, _, _) = setup();
    let err = agg.set_namespace("  ").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(agg.namespace(), Some("App"));

    agg.set_namespace("Other").unwrap();
    assert_eq!(agg.namespace(), Some("Other"));

    let err = Aggregator::builder().service(" ").build().err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn writer_sink_writes_one_line_per_record() {
    let sink = Arc::new(WriterSink::new(Vec::new()));
    let mut agg = Aggregator::builder()
        .namespace("App")
        .service("booking")
        .sink(sink.clone())
        .clock(Arc::new(FixedClock::new(NOW_MS)))
        .build()
        .unwrap();
    agg.add_metric("Orders", MetricUnit::Count, 1).unwrap();
    agg.flush_and_clear().unwrap();
    agg.add_metric("Orders", MetricUnit::Count, 2).unwrap();
    agg.flush_and_clear().unwrap();
    drop(agg);

    let out = Arc::try_unwrap(sink).ok().unwrap().into_inner();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second["Orders"], 2);
    assert_eq!(second["_aws"]["Timestamp"], NOW_MS);
}

#[test]
fn units_parse_from_name_or_wire_value() {
    assert_eq!("Count".parse::<MetricUnit>().unwrap(), MetricUnit::Count);
    assert_eq!("Bytes/Second".parse::<MetricUnit>().unwrap(), MetricUnit::BytesPerSecond);
    assert_eq!("CountPerSecond".parse::<MetricUnit>().unwrap(), MetricUnit::CountPerSecond);
    assert!("Widgets".parse::<MetricUnit>().is_err());
}
