//! Configuration module for tradegate.
//!
//! This module provides structured configuration loading from environment variables,
//! organized by concern: Prediction service, Confidence gate, Session and Observability.

mod gate_config;
mod observability_config;
mod prediction_config;
mod session_config;

pub use gate_config::GateEnvConfig;
pub use observability_config::{LogFormat, ObservabilityEnvConfig};
pub use prediction_config::PredictionEnvConfig;
pub use session_config::SessionEnvConfig;

use crate::domain::errors::ConfigError;
use crate::domain::trading::InstrumentSpec;
use anyhow::{Context, Result};

/// Main application configuration, aggregating every sub-config.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub prediction: PredictionEnvConfig,
    pub gate: GateEnvConfig,
    pub session: SessionEnvConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            prediction: PredictionEnvConfig::from_env()
                .context("Failed to load prediction config")?,
            gate: GateEnvConfig::from_env().context("Failed to load gate config")?,
            session: SessionEnvConfig::from_env().context("Failed to load session config")?,
            observability: ObservabilityEnvConfig::from_env(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let gate = &self.gate;
        if !(0.0..=1.0).contains(&gate.min_confidence)
            || !(0.0..=1.0).contains(&gate.max_confidence)
            || gate.min_confidence > gate.max_confidence
        {
            return Err(ConfigError::ConfidenceBounds {
                min: gate.min_confidence,
                max: gate.max_confidence,
            });
        }

        if self.session.point_size <= 0.0 || !self.session.point_size.is_finite() {
            return Err(ConfigError::PointSize {
                point: self.session.point_size,
            });
        }

        if self.prediction.timeout.is_zero() {
            return Err(ConfigError::NonPositive {
                field: "ML_TIMEOUT_MS",
            });
        }

        if self.prediction.prediction_cache_size == 0 {
            return Err(ConfigError::NonPositive {
                field: "ML_PREDICTION_CACHE_SIZE",
            });
        }

        for url in [&self.prediction.service_url, &self.prediction.analytics_url] {
            url::Url::parse(url).map_err(|e| ConfigError::ServiceUrl {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        }

        Ok(())
    }

    pub fn instrument(&self) -> InstrumentSpec {
        InstrumentSpec::new(
            self.session.symbol.clone(),
            self.session.point_size,
            self.session.digits,
        )
    }
}
