//! Prediction Client
//!
//! Sends a [`FeatureVector`] to the external scoring service and turns the reply
//! into a [`Prediction`]. Failures never surface as errors: every problem is folded
//! into an invalid prediction carrying a short reason.

use crate::config::{PredictionEnvConfig, SessionEnvConfig};
use crate::domain::errors::TransportError;
use crate::domain::ml::{FeatureVector, Prediction, SignalDirection};
use crate::domain::trading::TradeDirection;
use crate::infrastructure::core::ServiceTransport;
use crate::infrastructure::observability::Metrics;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const PREDICT_PATH: &str = "/predict";
pub const HEALTH_PATH: &str = "/health";

/// Flat prediction request: session identity plus every feature field
#[derive(Debug, Clone, Serialize)]
pub struct PredictionRequest<'a> {
    pub strategy: &'a str,
    pub symbol: &'a str,
    pub timeframe: &'a str,
    pub direction: TradeDirection,
    #[serde(flatten)]
    pub features: &'a FeatureVector,
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    status: Option<String>,
    prediction: Option<PredictionPayload>,
    #[serde(alias = "error")]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PredictionPayload {
    direction: Option<String>,
    probability: Option<f64>,
    confidence: Option<f64>,
    model_type: Option<String>,
    model_key: Option<String>,
}

/// Outcome of the last connectivity check
#[derive(Debug, Clone, Copy)]
struct HealthCheck {
    checked_at: Instant,
    healthy: bool,
}

impl HealthCheck {
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.checked_at) < ttl
    }
}

pub struct PredictionClient {
    enabled: bool,
    transport: ServiceTransport,
    strategy: String,
    symbol: String,
    timeframe: String,
    health_ttl: Duration,
    health: Option<HealthCheck>,
    cache: VecDeque<Prediction>,
    cache_size: usize,
    metrics: Option<Metrics>,
}

impl PredictionClient {
    pub fn new(config: &PredictionEnvConfig, session: &SessionEnvConfig) -> Self {
        let cache_size = config.prediction_cache_size.max(1);
        Self {
            enabled: config.enabled,
            transport: ServiceTransport::new(config.service_url.clone(), config.timeout),
            strategy: session.strategy_name.clone(),
            symbol: session.symbol.clone(),
            timeframe: session.timeframe.clone(),
            health_ttl: config.health_cache_ttl,
            health: None,
            cache: VecDeque::with_capacity(cache_size),
            cache_size,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Checks the service health endpoint, reusing a cached outcome younger
    /// than the configured interval.
    pub async fn check_connection(&mut self) -> bool {
        let now = Instant::now();
        if let Some(check) = self.health
            && check.is_fresh(now, self.health_ttl)
        {
            return check.healthy;
        }

        let healthy = match self.transport.get(HEALTH_PATH).await {
            Ok(body) => {
                let healthy = body.contains("healthy") && !body.contains("unhealthy");
                if !healthy {
                    warn!(
                        "PredictionClient [{}]: Service at {} reports unhealthy: {}",
                        self.symbol,
                        self.transport.base_url(),
                        body.trim()
                    );
                }
                healthy
            }
            Err(e) => {
                warn!(
                    "PredictionClient [{}]: Health check against {} failed: {}",
                    self.symbol,
                    self.transport.base_url(),
                    e
                );
                false
            }
        };

        if healthy && !self.health.is_some_and(|c| c.healthy) {
            info!(
                "PredictionClient [{}]: Connected to scoring service at {}",
                self.symbol,
                self.transport.base_url()
            );
        }

        self.health = Some(HealthCheck {
            checked_at: now,
            healthy,
        });
        healthy
    }

    /// Requests a score for `features`. Always returns a prediction; failures
    /// come back invalid with a reason.
    pub async fn predict(
        &mut self,
        features: &FeatureVector,
        direction_hint: TradeDirection,
    ) -> Prediction {
        let prediction = if !self.enabled {
            Prediction::invalid("prediction disabled")
        } else if !self.check_connection().await {
            Prediction::invalid("service not connected")
        } else {
            self.request(features, direction_hint).await
        };

        self.record(prediction.clone());
        prediction
    }

    async fn request(&mut self, features: &FeatureVector, direction: TradeDirection) -> Prediction {
        let request = PredictionRequest {
            strategy: &self.strategy,
            symbol: &self.symbol,
            timeframe: &self.timeframe,
            direction,
            features,
        };

        let started = Instant::now();
        let result = self.transport.post_json(PREDICT_PATH, &request).await;
        if let Some(metrics) = &self.metrics {
            metrics
                .prediction_latency_seconds
                .observe(started.elapsed().as_secs_f64());
        }

        match result {
            Ok(body) => Self::parse_response(&body),
            Err(e) => {
                if matches!(e, TransportError::Transport { .. }) {
                    // Force a fresh health check on the next call
                    self.health = None;
                }
                warn!(
                    "PredictionClient [{}]: Prediction request failed: {}",
                    self.symbol, e
                );
                Prediction::invalid(e.prediction_reason())
            }
        }
    }

    fn parse_response(body: &str) -> Prediction {
        let response: PredictionResponse = match serde_json::from_str(body) {
            Ok(r) => r,
            Err(e) => {
                debug!("PredictionClient: Unparseable response body ({}): {}", e, body);
                return Prediction::invalid("malformed response");
            }
        };

        match response.status.as_deref() {
            Some("success") => {}
            Some(status) => {
                return Prediction::invalid(match response.message {
                    Some(msg) => format!("service status '{}': {}", status, msg),
                    None => format!("service status '{}'", status),
                });
            }
            None => return Prediction::invalid("missing fields"),
        }

        let Some(payload) = response.prediction else {
            return Prediction::invalid("missing fields");
        };

        let direction = payload
            .direction
            .as_deref()
            .and_then(|d| d.parse::<SignalDirection>().ok());

        match (direction, payload.probability, payload.confidence) {
            (Some(direction), Some(probability), Some(confidence)) => Prediction::scored(
                direction,
                probability,
                confidence,
                payload.model_type.unwrap_or_else(|| "unknown".to_string()),
                payload.model_key.unwrap_or_default(),
            ),
            _ => Prediction::invalid("missing fields"),
        }
    }

    fn record(&mut self, prediction: Prediction) {
        if prediction.is_valid {
            debug!(
                "PredictionClient [{}]: {} p={:.3} conf={:.3} ({} / {})",
                self.symbol,
                prediction.direction,
                prediction.probability,
                prediction.confidence,
                prediction.model_type,
                prediction.model_key
            );
        } else {
            warn!(
                "PredictionClient [{}]: Invalid prediction: {}",
                self.symbol,
                prediction.error.as_deref().unwrap_or("unknown")
            );
        }

        if let Some(metrics) = &self.metrics {
            metrics.inc_prediction(if prediction.is_valid { "valid" } else { "invalid" });
        }

        if self.cache.len() == self.cache_size {
            self.cache.pop_front();
        }
        self.cache.push_back(prediction);
    }

    /// Most recent predictions, oldest first
    pub fn recent_predictions(&self) -> impl Iterator<Item = &Prediction> {
        self.cache.iter()
    }

    pub fn last_prediction(&self) -> Option<&Prediction> {
        self.cache.back()
    }
}
