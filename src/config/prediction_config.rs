//! Scoring service configuration parsing from environment variables.
//!
//! This module handles the prediction client endpoint, timeouts and caches, and
//! where retraining records are delivered.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Prediction service environment configuration
#[derive(Debug, Clone)]
pub struct PredictionEnvConfig {
    pub enabled: bool,
    pub service_url: String,
    pub timeout: Duration,
    pub health_cache_ttl: Duration,
    pub prediction_cache_size: usize,
    /// Analytics sink for retraining records; defaults to the scoring service
    pub analytics_url: String,
    /// Optional local CSV copy of every retraining record
    pub training_csv: Option<PathBuf>,
}

impl Default for PredictionEnvConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_url: "http://127.0.0.1:5000".to_string(),
            timeout: Duration::from_millis(5000),
            health_cache_ttl: Duration::from_secs(60),
            prediction_cache_size: 10,
            analytics_url: "http://127.0.0.1:5000".to_string(),
            training_csv: None,
        }
    }
}

impl PredictionEnvConfig {
    pub fn from_env() -> Result<Self> {
        let service_url =
            env::var("ML_SERVICE_URL").unwrap_or_else(|_| "http://127.0.0.1:5000".to_string());
        let analytics_url = env::var("ML_ANALYTICS_URL").unwrap_or_else(|_| service_url.clone());

        Ok(Self {
            enabled: env::var("ML_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse::<bool>()
                .context("Failed to parse ML_ENABLED")?,
            service_url: service_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(Self::parse_u64("ML_TIMEOUT_MS", 5000)?),
            health_cache_ttl: Duration::from_secs(Self::parse_u64("ML_HEALTH_CACHE_SECS", 60)?),
            prediction_cache_size: Self::parse_u64("ML_PREDICTION_CACHE_SIZE", 10)? as usize,
            analytics_url: analytics_url.trim_end_matches('/').to_string(),
            training_csv: env::var("ML_TRAINING_CSV").ok().map(PathBuf::from),
        })
    }

    fn parse_u64(key: &str, default: u64) -> Result<u64> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<u64>()
            .context(format!("Failed to parse {}", key))
    }
}
