//! Metrics config loader (strict parsing) and environment overlay.

pub mod schema;

use std::fs;

use emfbuf_core::error::{EmfError, Result};

pub use schema::{DimensionConfig, MetricsConfig};

pub fn load_from_file(path: &str) -> Result<MetricsConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| EmfError::Configuration(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<MetricsConfig> {
    let cfg: MetricsConfig = serde_yaml::from_str(s)
        .map_err(|e| EmfError::Configuration(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
