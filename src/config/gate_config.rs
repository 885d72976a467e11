//! Confidence gate configuration parsing from environment variables.

use anyhow::{Context, Result};
use std::env;

/// Confidence bounds a prediction must fall within to be traded
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateEnvConfig {
    pub min_confidence: f64,
    pub max_confidence: f64,
}

impl Default for GateEnvConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.30,
            max_confidence: 0.85,
        }
    }
}

impl GateEnvConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            min_confidence: Self::parse_f64("ML_MIN_CONFIDENCE", 0.30)?,
            max_confidence: Self::parse_f64("ML_MAX_CONFIDENCE", 0.85)?,
        })
    }

    fn parse_f64(key: &str, default: f64) -> Result<f64> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<f64>()
            .context(format!("Failed to parse {}", key))
    }
}
