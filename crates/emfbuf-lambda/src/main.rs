//! emfbuf demo
//!
//! Runs a few simulated invocations of an order handler through the flush
//! orchestrator and writes one EMF record per invocation to stdout.
//! - Config: `emfbuf.yaml` if present, otherwise the environment
//! - Logs: `RUST_LOG` (stderr)

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing_subscriber::{fmt, EnvFilter};

use emfbuf_core::{Aggregator, MetricUnit, Result, WriterSink};
use emfbuf_lambda::{config, ColdStartTracker, FlushOrchestrator, InvokeError, MetricsConfig};

const CONFIG_PATH: &str = "emfbuf.yaml";

#[derive(Debug)]
struct Order {
    id: u32,
    items: u32,
}

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "emfbuf-demo failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cfg = load_config()?;
    let metrics = Mutex::new(
        cfg.aggregator_builder()
            .sink(Arc::new(WriterSink::stdout()))
            .build()?,
    );
    let orchestrator = FlushOrchestrator::new(cfg.orchestrator_options(), ColdStartTracker::process());

    let orders = [Order { id: 1, items: 3 }, Order { id: 2, items: 0 }, Order { id: 3, items: 7 }];
    for order in orders {
        let id = order.id;
        let res = orchestrator
            .invoke_async(&metrics, handle_order(&metrics, order))
            .await;
        match res {
            Ok(total) => tracing::info!(order = id, total, "order handled"),
            Err(InvokeError::Work(e)) => tracing::warn!(order = id, error = %e, "order rejected"),
            Err(InvokeError::Metrics(m)) => return Err(m),
            Err(InvokeError::Both { work, metrics }) => {
                tracing::warn!(order = id, error = %work, "order rejected");
                return Err(metrics);
            }
        }
    }
    Ok(())
}

fn load_config() -> Result<MetricsConfig> {
    let mut cfg = if Path::new(CONFIG_PATH).exists() {
        config::load_from_file(CONFIG_PATH)?.overlay(|k| std::env::var(k).ok())?
    } else {
        MetricsConfig::from_env()?
    };
    if cfg.namespace.is_none() {
        cfg.namespace = Some("EmfbufDemo".into());
    }
    if cfg.service.is_none() {
        cfg.service = Some("orders".into());
    }
    cfg.validate()?;
    Ok(cfg)
}

async fn handle_order(metrics: &Mutex<Aggregator>, order: Order) -> std::result::Result<u32, String> {
    let started = Instant::now();
    tokio::task::yield_now().await;

    let mut agg = metrics.lock().map_err(|_| "metrics lock poisoned".to_string())?;
    agg.add_metadata("order_id", order.id);
    if order.items == 0 {
        agg.add_metric("RejectedOrders", MetricUnit::Count, 1)
            .map_err(|e| e.to_string())?;
        return Err(format!("order {} has no items", order.id));
    }
    agg.add_metric("OrderItems", MetricUnit::Count, order.items)
        .map_err(|e| e.to_string())?;
    agg.add_metric(
        "HandlerLatency",
        MetricUnit::Microseconds,
        started.elapsed().as_micros() as f64,
    )
    .map_err(|e| e.to_string())?;
    Ok(order.items * 10)
}
