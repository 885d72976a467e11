use serde::{Deserialize, Serialize};

/// Ordered list of feature names.
/// This order MUST match the column order the scoring service was trained on.
/// Any change here is a breaking change for deployed models.
pub const FEATURE_NAMES: &[&str] = &[
    "rsi",
    "stoch_main",
    "stoch_signal",
    "macd_main",
    "macd_signal",
    "bb_upper",
    "bb_lower",
    "williams_r",
    "cci",
    "momentum",
    "force_index",
    "volume_ratio",
    "price_change",
    "volatility",
    "spread",
    "session_hour",
    "is_news_time",
    "day_of_week",
    "month",
];

pub const RSI_FALLBACK: f64 = 50.0;
pub const STOCH_FALLBACK: f64 = 50.0;
pub const MACD_FALLBACK: f64 = 0.0;
pub const WILLIAMS_R_FALLBACK: f64 = -50.0;
pub const CCI_FALLBACK: f64 = 0.0;
pub const MOMENTUM_FALLBACK: f64 = 100.0;
pub const FORCE_INDEX_FALLBACK: f64 = 0.0;
pub const VOLUME_RATIO_FALLBACK: f64 = 1.0;
pub const PRICE_CHANGE_FALLBACK: f64 = 0.0;
pub const VOLATILITY_FALLBACK: f64 = 0.0001;
pub const SPREAD_FALLBACK: f64 = 0.0;

/// Snapshot of market state sent to the scoring service.
///
/// Field names double as wire names in the prediction request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub rsi: f64,
    pub stoch_main: f64,
    pub stoch_signal: f64,
    pub macd_main: f64,
    pub macd_signal: f64,
    pub bb_upper: f64,
    pub bb_lower: f64,
    pub williams_r: f64,
    pub cci: f64,
    pub momentum: f64,
    pub force_index: f64,
    pub volume_ratio: f64,
    pub price_change: f64,
    pub volatility: f64,
    pub spread: f64,
    pub session_hour: u32,
    pub is_news_time: bool,
    pub day_of_week: u32,
    pub month: u32,
}

impl FeatureVector {
    /// Vector holding every fallback value. Bands collapse onto `price`.
    pub fn fallback(price: f64) -> Self {
        let band = if price.is_finite() { price } else { 0.0 };
        Self {
            rsi: RSI_FALLBACK,
            stoch_main: STOCH_FALLBACK,
            stoch_signal: STOCH_FALLBACK,
            macd_main: MACD_FALLBACK,
            macd_signal: MACD_FALLBACK,
            bb_upper: band,
            bb_lower: band,
            williams_r: WILLIAMS_R_FALLBACK,
            cci: CCI_FALLBACK,
            momentum: MOMENTUM_FALLBACK,
            force_index: FORCE_INDEX_FALLBACK,
            volume_ratio: VOLUME_RATIO_FALLBACK,
            price_change: PRICE_CHANGE_FALLBACK,
            volatility: VOLATILITY_FALLBACK,
            spread: SPREAD_FALLBACK,
            session_hour: 0,
            is_news_time: false,
            day_of_week: 0,
            month: 1,
        }
    }

    /// True when every numeric field is finite.
    pub fn is_valid(&self) -> bool {
        self.to_f64_vector().iter().all(|v| v.is_finite())
    }

    /// Replaces every non-finite field with its fallback.
    ///
    /// Returns the names of the corrected fields, in registry order.
    pub fn sanitize(&mut self, price: f64) -> Vec<&'static str> {
        let defaults = Self::fallback(price);
        let mut corrected = Vec::new();

        let mut fix = |name: &'static str, value: &mut f64, fallback: f64| {
            if !value.is_finite() {
                *value = fallback;
                corrected.push(name);
            }
        };

        fix("rsi", &mut self.rsi, defaults.rsi);
        fix("stoch_main", &mut self.stoch_main, defaults.stoch_main);
        fix("stoch_signal", &mut self.stoch_signal, defaults.stoch_signal);
        fix("macd_main", &mut self.macd_main, defaults.macd_main);
        fix("macd_signal", &mut self.macd_signal, defaults.macd_signal);
        fix("bb_upper", &mut self.bb_upper, defaults.bb_upper);
        fix("bb_lower", &mut self.bb_lower, defaults.bb_lower);
        fix("williams_r", &mut self.williams_r, defaults.williams_r);
        fix("cci", &mut self.cci, defaults.cci);
        fix("momentum", &mut self.momentum, defaults.momentum);
        fix("force_index", &mut self.force_index, defaults.force_index);
        fix("volume_ratio", &mut self.volume_ratio, defaults.volume_ratio);
        fix("price_change", &mut self.price_change, defaults.price_change);
        fix("volatility", &mut self.volatility, defaults.volatility);
        fix("spread", &mut self.spread, defaults.spread);

        corrected
    }

    /// Converts features into an ordered f64 vector matching [`FEATURE_NAMES`].
    pub fn to_f64_vector(&self) -> Vec<f64> {
        vec![
            self.rsi,
            self.stoch_main,
            self.stoch_signal,
            self.macd_main,
            self.macd_signal,
            self.bb_upper,
            self.bb_lower,
            self.williams_r,
            self.cci,
            self.momentum,
            self.force_index,
            self.volume_ratio,
            self.price_change,
            self.volatility,
            self.spread,
            self.session_hour as f64,
            if self.is_news_time { 1.0 } else { 0.0 },
            self.day_of_week as f64,
            self.month as f64,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_vector_length() {
        let fv = FeatureVector::fallback(1.1);
        assert_eq!(fv.to_f64_vector().len(), FEATURE_NAMES.len());
    }

    #[test]
    fn test_feature_order() {
        let fv = FeatureVector {
            rsi: 70.0,
            month: 11,
            ..FeatureVector::fallback(1.1)
        };
        let vec = fv.to_f64_vector();
        // RSI is index 0
        assert_eq!(vec[0], 70.0);
        // Month is last
        assert_eq!(vec[FEATURE_NAMES.len() - 1], 11.0);
    }

    #[test]
    fn test_sanitize_replaces_non_finite_fields() {
        let mut fv = FeatureVector {
            rsi: f64::NAN,
            bb_upper: f64::INFINITY,
            volatility: f64::NEG_INFINITY,
            ..FeatureVector::fallback(1.2)
        };
        assert!(!fv.is_valid());

        let corrected = fv.sanitize(1.2);

        assert_eq!(corrected, vec!["rsi", "bb_upper", "volatility"]);
        assert!(fv.is_valid());
        assert_eq!(fv.rsi, RSI_FALLBACK);
        assert_eq!(fv.bb_upper, 1.2);
        assert_eq!(fv.volatility, VOLATILITY_FALLBACK);
    }

    #[test]
    fn test_fallback_with_unusable_price() {
        let fv = FeatureVector::fallback(f64::NAN);
        assert!(fv.is_valid());
        assert_eq!(fv.bb_lower, 0.0);
    }

    #[test]
    fn test_serializes_with_wire_names() {
        let fv = FeatureVector::fallback(1.0);
        let json = serde_json::to_value(&fv).expect("serialize");
        for name in FEATURE_NAMES {
            assert!(json.get(*name).is_some(), "missing {}", name);
        }
    }
}
