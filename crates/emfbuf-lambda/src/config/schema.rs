use serde::Deserialize;

use emfbuf_core::aggregator::{validate_namespace, AggregatorBuilder};
use emfbuf_core::error::{EmfError, Result};
use emfbuf_core::store::MAX_DIMENSIONS;
use emfbuf_core::{Aggregator, UnitPolicy};

use crate::orchestrator::FlushOptions;

pub const ENV_NAMESPACE: &str = "POWERTOOLS_METRICS_NAMESPACE";
pub const ENV_SERVICE: &str = "POWERTOOLS_SERVICE_NAME";
pub const ENV_FUNCTION_NAME: &str = "AWS_LAMBDA_FUNCTION_NAME";
pub const ENV_CAPTURE_COLD_START: &str = "POWERTOOLS_METRICS_CAPTURE_COLD_START";
pub const ENV_RAISE_ON_EMPTY: &str = "POWERTOOLS_METRICS_RAISE_ON_EMPTY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub service: Option<String>,

    #[serde(default)]
    pub function_name: Option<String>,

    #[serde(default)]
    pub capture_cold_start: Option<bool>,

    #[serde(default)]
    pub raise_on_empty_metrics: Option<bool>,

    #[serde(default)]
    pub unit_policy: UnitPolicy,

    #[serde(default)]
    pub default_dimensions: Vec<DimensionConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DimensionConfig {
    pub name: String,
    pub value: String,
}

impl MetricsConfig {
    /// Read everything from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Read everything from `lookup` (an environment stand-in).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let cfg = Self::default().overlay(lookup)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Fill fields not set explicitly from `lookup`. Explicit values win.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if self.namespace.is_none() {
            self.namespace = lookup(ENV_NAMESPACE);
        }
        if self.service.is_none() {
            self.service = lookup(ENV_SERVICE);
        }
        if self.function_name.is_none() {
            self.function_name = lookup(ENV_FUNCTION_NAME);
        }
        if self.capture_cold_start.is_none() {
            self.capture_cold_start = lookup(ENV_CAPTURE_COLD_START)
                .map(|v| parse_flag(ENV_CAPTURE_COLD_START, &v))
                .transpose()?;
        }
        if self.raise_on_empty_metrics.is_none() {
            self.raise_on_empty_metrics = lookup(ENV_RAISE_ON_EMPTY)
                .map(|v| parse_flag(ENV_RAISE_ON_EMPTY, &v))
                .transpose()?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(ns) = &self.namespace {
            validate_namespace(ns)?;
        }
        if let Some(service) = &self.service {
            if service.trim().is_empty() {
                return Err(EmfError::Configuration("service must not be blank".into()));
            }
        }
        if let Some(name) = &self.function_name {
            if name.trim().is_empty() {
                return Err(EmfError::Configuration("function_name must not be blank".into()));
            }
        }

        let total = self.default_dimensions.len() + usize::from(self.service.is_some());
        if total > MAX_DIMENSIONS {
            return Err(EmfError::Configuration(format!(
                "default_dimensions: at most {MAX_DIMENSIONS} dimensions including service (got {total})"
            )));
        }
        for d in &self.default_dimensions {
            if d.name.trim().is_empty() || d.value.trim().is_empty() {
                return Err(EmfError::Configuration(format!(
                    "default_dimensions: {:?} must have a non-blank name and value",
                    d.name
                )));
            }
        }
        Ok(())
    }

    pub fn capture_cold_start(&self) -> bool {
        self.capture_cold_start.unwrap_or(false)
    }

    pub fn raise_on_empty_metrics(&self) -> bool {
        self.raise_on_empty_metrics.unwrap_or(false)
    }

    /// Builder seeded with namespace, service, default dimensions, and unit policy.
    /// Callers add sink and clock.
    pub fn aggregator_builder(&self) -> AggregatorBuilder {
        let mut b = Aggregator::builder().unit_policy(self.unit_policy);
        if let Some(ns) = &self.namespace {
            b = b.namespace(ns.clone());
        }
        if let Some(service) = &self.service {
            b = b.service(service.clone());
        }
        for d in &self.default_dimensions {
            b = b.default_dimension(d.name.clone(), d.value.clone());
        }
        b
    }

    pub fn orchestrator_options(&self) -> FlushOptions {
        FlushOptions {
            capture_cold_start: self.capture_cold_start(),
            raise_on_empty_metrics: self.raise_on_empty_metrics(),
            function_name: self.function_name.clone(),
        }
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(EmfError::Configuration(format!(
            "{key} must be a boolean (got {other:?})"
        ))),
    }
}
