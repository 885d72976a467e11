use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction suggested by the scoring service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalDirection {
    Buy,
    Sell,
    Hold,
}

impl SignalDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalDirection::Buy => "buy",
            SignalDirection::Sell => "sell",
            SignalDirection::Hold => "hold",
        }
    }
}

impl fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(SignalDirection::Buy),
            "sell" => Ok(SignalDirection::Sell),
            "hold" => Ok(SignalDirection::Hold),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

/// Scored outcome of one prediction request. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub direction: SignalDirection,
    pub probability: f64,
    pub confidence: f64,
    pub model_type: String,
    pub model_key: String,
    pub is_valid: bool,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Prediction {
    /// Builds a scored prediction. Probability and confidence must both be
    /// strictly positive, otherwise the result is invalid with "missing fields".
    pub fn scored(
        direction: SignalDirection,
        probability: f64,
        confidence: f64,
        model_type: impl Into<String>,
        model_key: impl Into<String>,
    ) -> Self {
        let usable = probability.is_finite()
            && confidence.is_finite()
            && probability > 0.0
            && confidence > 0.0;

        Self {
            direction,
            probability: probability.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            model_type: model_type.into(),
            model_key: model_key.into(),
            is_valid: usable,
            error: if usable {
                None
            } else {
                Some("missing fields".to_string())
            },
            timestamp: Utc::now(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            direction: SignalDirection::Hold,
            probability: 0.0,
            confidence: 0.0,
            model_type: String::new(),
            model_key: String::new(),
            is_valid: false,
            error: Some(reason.into()),
            timestamp: Utc::now(),
        }
    }
}
