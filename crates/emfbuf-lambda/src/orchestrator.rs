//! Flush orchestration around a unit of work.
//!
//! One orchestrated invocation:
//! - run the unit of work (its result is held, not returned yet)
//! - on the first invocation in the process, if enabled, add `ColdStart`
//!   and a `function_name` dimension
//! - serialize; an empty buffer is a warning unless `raise_on_empty_metrics`
//! - emit and clear on success
//! - return the work's result, or the flush error, or both
//!
//! Buffers are cleared for emitted and suppressed flushes. A failed flush
//! leaves them intact for the caller to inspect.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use emfbuf_core::error::{EmfError, Result};
use emfbuf_core::{Aggregator, MetricUnit};

use crate::cold_start::ColdStartTracker;

pub const COLD_START_METRIC: &str = "ColdStart";
pub const FUNCTION_NAME_DIMENSION: &str = "function_name";

#[derive(Debug, Clone, Default)]
pub struct FlushOptions {
    pub capture_cold_start: bool,
    pub raise_on_empty_metrics: bool,
    /// Value of the `function_name` dimension added on cold start.
    pub function_name: Option<String>,
}

/// How a flush attempt ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// A record was written to the sink.
    Emitted,
    /// The buffer had no metrics; a warning was logged instead.
    Suppressed,
}

/// Error from an orchestrated invocation.
#[derive(Debug)]
pub enum InvokeError<E> {
    /// The unit of work failed; metrics were flushed.
    Work(E),
    /// The unit of work succeeded but the flush failed.
    Metrics(EmfError),
    /// Both failed.
    Both { work: E, metrics: EmfError },
}

impl<E> InvokeError<E> {
    pub fn work(&self) -> Option<&E> {
        match self {
            InvokeError::Work(w) | InvokeError::Both { work: w, .. } => Some(w),
            InvokeError::Metrics(_) => None,
        }
    }

    pub fn metrics(&self) -> Option<&EmfError> {
        match self {
            InvokeError::Metrics(m) | InvokeError::Both { metrics: m, .. } => Some(m),
            InvokeError::Work(_) => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for InvokeError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvokeError::Work(w) => write!(f, "unit of work failed: {w}"),
            InvokeError::Metrics(m) => write!(f, "metrics flush failed: {m}"),
            InvokeError::Both { work, metrics } => {
                write!(f, "unit of work failed: {work}; metrics flush failed: {metrics}")
            }
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for InvokeError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.metrics().map(|m| m as &(dyn std::error::Error + 'static))
    }
}

pub struct FlushOrchestrator {
    options: FlushOptions,
    cold_start: Arc<ColdStartTracker>,
}

impl FlushOrchestrator {
    pub fn new(options: FlushOptions, cold_start: Arc<ColdStartTracker>) -> Self {
        Self { options, cold_start }
    }

    pub fn options(&self) -> &FlushOptions {
        &self.options
    }

    /// Run `work`, then flush `metrics` whether or not it failed.
    pub fn invoke<T, E, F>(&self, metrics: &mut Aggregator, work: F) -> std::result::Result<T, InvokeError<E>>
    where
        F: FnOnce(&mut Aggregator) -> std::result::Result<T, E>,
    {
        let outcome = work(metrics);
        let flushed = self.finish(metrics);
        combine(outcome, flushed)
    }

    /// Await `work`, then flush the shared aggregator.
    ///
    /// The lock is taken only after `work` completes; `work` may lock it
    /// itself when adding metrics.
    pub async fn invoke_async<T, E, Fut>(
        &self,
        metrics: &Mutex<Aggregator>,
        work: Fut,
    ) -> std::result::Result<T, InvokeError<E>>
    where
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let outcome = work.await;
        let flushed = match metrics.lock() {
            Ok(mut agg) => self.finish(&mut agg),
            Err(_) => Err(EmfError::Emission("aggregator lock poisoned".into())),
        };
        combine(outcome, flushed)
    }

    /// Wrap a handler so every call goes through `invoke`.
    pub fn wrap<'a, A, T, E, F>(
        &'a self,
        mut handler: F,
    ) -> impl FnMut(&mut Aggregator, A) -> std::result::Result<T, InvokeError<E>> + 'a
    where
        F: FnMut(&mut Aggregator, A) -> std::result::Result<T, E> + 'a,
        A: 'a,
        T: 'a,
        E: 'a,
    {
        move |metrics: &mut Aggregator, event: A| self.invoke(metrics, |m| handler(m, event))
    }

    /// Cold start injection, validation, emission, and clearing for one invocation.
    pub fn finish(&self, metrics: &mut Aggregator) -> Result<FlushOutcome> {
        if self.options.capture_cold_start && self.cold_start.observe() {
            self.add_cold_start(metrics)?;
        }

        match metrics.flush_and_clear() {
            Ok(_) => Ok(FlushOutcome::Emitted),
            Err(e) if e.is_empty_metrics() && !self.options.raise_on_empty_metrics => {
                tracing::warn!(
                    namespace = metrics.namespace().unwrap_or_default(),
                    "no metrics to publish, skipping flush"
                );
                metrics.clear();
                Ok(FlushOutcome::Suppressed)
            }
            Err(e) => Err(e),
        }
    }

    fn add_cold_start(&self, metrics: &mut Aggregator) -> Result<()> {
        match &self.options.function_name {
            Some(name) => metrics.add_dimension(FUNCTION_NAME_DIMENSION, name),
            None => tracing::warn!("cold start captured without a function name"),
        }
        tracing::debug!("cold start observed");
        metrics.add_metric(COLD_START_METRIC, MetricUnit::Count, 1)
    }
}

fn combine<T, E>(outcome: std::result::Result<T, E>, flushed: Result<FlushOutcome>) -> std::result::Result<T, InvokeError<E>> {
    match (outcome, flushed) {
        (Ok(v), Ok(_)) => Ok(v),
        (Ok(_), Err(m)) => Err(InvokeError::Metrics(m)),
        (Err(w), Ok(_)) => Err(InvokeError::Work(w)),
        (Err(work), Err(metrics)) => Err(InvokeError::Both { work, metrics }),
    }
}
