use crate::config::GateEnvConfig;
use crate::domain::ml::Prediction;
use crate::domain::trading::TradeDirection;

/// Stop-loss scaling never leaves this band.
const STOP_LOSS_FACTOR_MIN: f64 = 0.9;
const STOP_LOSS_FACTOR_MAX: f64 = 1.1;

const HIGH_CONFIDENCE: f64 = 0.7;
const LOW_CONFIDENCE: f64 = 0.4;
const HIGH_CONFIDENCE_SIZE_FACTOR: f64 = 1.2;
const LOW_CONFIDENCE_SIZE_FACTOR: f64 = 0.8;

/// Accept/reject decision and sizing adjustments driven by prediction confidence.
///
/// Every method is pure. An invalid prediction is never accepted and leaves
/// base values untouched.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceGate {
    min_confidence: f64,
    max_confidence: f64,
}

impl Default for ConfidenceGate {
    fn default() -> Self {
        Self::new(&GateEnvConfig::default())
    }
}

impl ConfidenceGate {
    pub fn new(config: &GateEnvConfig) -> Self {
        Self {
            min_confidence: config.min_confidence,
            max_confidence: config.max_confidence,
        }
    }

    /// Valid and `min <= confidence <= max`.
    pub fn accept(&self, prediction: &Prediction) -> bool {
        prediction.is_valid
            && prediction.confidence >= self.min_confidence
            && prediction.confidence <= self.max_confidence
    }

    /// Scales the stop distance (entry to stop, in price units) by
    /// `1 + 0.2 * (confidence - 0.5)`, clamped to [0.9, 1.1]. Buys multiply,
    /// sells divide. The result is a distance, never a price.
    pub fn adjust_stop_loss(
        &self,
        base_distance: f64,
        prediction: &Prediction,
        direction: TradeDirection,
    ) -> f64 {
        if !prediction.is_valid {
            return base_distance;
        }
        let factor = (1.0 + 0.2 * (prediction.confidence - 0.5))
            .clamp(STOP_LOSS_FACTOR_MIN, STOP_LOSS_FACTOR_MAX);
        match direction {
            TradeDirection::Buy => base_distance * factor,
            TradeDirection::Sell => base_distance / factor,
        }
    }

    pub fn adjust_position_size(&self, base_lot: f64, prediction: &Prediction) -> f64 {
        if !prediction.is_valid {
            return base_lot;
        }
        if prediction.confidence > HIGH_CONFIDENCE {
            base_lot * HIGH_CONFIDENCE_SIZE_FACTOR
        } else if prediction.confidence < LOW_CONFIDENCE {
            base_lot * LOW_CONFIDENCE_SIZE_FACTOR
        } else {
            base_lot
        }
    }
}
