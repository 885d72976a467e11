//! Feature Collector
//!
//! Builds a [`FeatureVector`] from the host's market data on demand. Every
//! indicator that cannot produce a reading contributes its fallback constant, so
//! collection as a whole never fails.

use crate::domain::ml::FeatureVector;
use crate::domain::ml::feature_registry::VOLATILITY_FALLBACK;
use crate::domain::ports::MarketDataSource;
use crate::domain::trading::Candle;
use chrono::{Datelike, Timelike};
use std::sync::Arc;
use ta::indicators::{
    AverageTrueRange, BollingerBands, ExponentialMovingAverage, FastStochastic, Maximum, Minimum,
    MovingAverageConvergenceDivergence, RelativeStrengthIndex, SimpleMovingAverage,
};
use ta::{Next, Reset};
use tracing::{debug, warn};

/// Indicator periods used by the collector
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPeriods {
    pub rsi: usize,
    pub stoch_k: usize,
    pub stoch_slowing: usize,
    pub stoch_d: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb: usize,
    pub bb_std_dev: f64,
    pub williams_r: usize,
    pub cci: usize,
    pub momentum: usize,
    pub force_index: usize,
    pub volume_average: usize,
    pub atr: usize,
}

impl Default for IndicatorPeriods {
    fn default() -> Self {
        Self {
            rsi: 14,
            stoch_k: 5,
            stoch_slowing: 3,
            stoch_d: 3,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb: 20,
            bb_std_dev: 2.0,
            williams_r: 14,
            cci: 14,
            momentum: 14,
            force_index: 13,
            volume_average: 20,
            atr: 14,
        }
    }
}

impl IndicatorPeriods {
    /// Bars requested per collection: enough for the slowest indicator to settle.
    pub fn history_len(&self) -> usize {
        let slowest = [
            self.rsi,
            self.stoch_k + self.stoch_slowing + self.stoch_d,
            self.macd_slow + self.macd_signal,
            self.bb,
            self.williams_r,
            self.cci,
            self.momentum,
            self.force_index,
            self.volume_average,
            self.atr,
        ]
        .into_iter()
        .max()
        .unwrap_or(0);
        (slowest * 3).max(50)
    }
}

/// Streaming indicator state, created once and reset before each recomputation
struct IndicatorHandles {
    rsi: RelativeStrengthIndex,
    fast_stoch: FastStochastic,
    stoch_main: SimpleMovingAverage,
    stoch_signal: SimpleMovingAverage,
    macd: MovingAverageConvergenceDivergence,
    bb: BollingerBands,
    highest: Maximum,
    lowest: Minimum,
    force: ExponentialMovingAverage,
    atr: AverageTrueRange,
}

impl IndicatorHandles {
    fn new(p: &IndicatorPeriods) -> anyhow::Result<Self> {
        Ok(Self {
            rsi: RelativeStrengthIndex::new(p.rsi).map_err(invalid_period("rsi"))?,
            fast_stoch: FastStochastic::new(p.stoch_k).map_err(invalid_period("stochastic"))?,
            stoch_main: SimpleMovingAverage::new(p.stoch_slowing).map_err(invalid_period("stoch slowing"))?,
            stoch_signal: SimpleMovingAverage::new(p.stoch_d).map_err(invalid_period("stoch signal"))?,
            macd: MovingAverageConvergenceDivergence::new(p.macd_fast, p.macd_slow, p.macd_signal)
                .map_err(invalid_period("macd"))?,
            bb: BollingerBands::new(p.bb, p.bb_std_dev).map_err(invalid_period("bollinger"))?,
            highest: Maximum::new(p.williams_r).map_err(invalid_period("williams %r"))?,
            lowest: Minimum::new(p.williams_r).map_err(invalid_period("williams %r"))?,
            force: ExponentialMovingAverage::new(p.force_index).map_err(invalid_period("force index"))?,
            atr: AverageTrueRange::new(p.atr).map_err(invalid_period("atr"))?,
        })
    }

    fn reset(&mut self) {
        self.rsi.reset();
        self.fast_stoch.reset();
        self.stoch_main.reset();
        self.stoch_signal.reset();
        self.macd.reset();
        self.bb.reset();
        self.highest.reset();
        self.lowest.reset();
        self.force.reset();
        self.atr.reset();
    }
}

fn invalid_period<E: std::fmt::Debug>(name: &'static str) -> impl Fn(E) -> anyhow::Error {
    move |e| anyhow::anyhow!("invalid {} period: {:?}", name, e)
}

/// Raw indicator readings; `None` means the indicator had nothing to say.
#[derive(Debug, Default, Clone, PartialEq)]
struct IndicatorReadings {
    rsi: Option<f64>,
    stoch_main: Option<f64>,
    stoch_signal: Option<f64>,
    macd_main: Option<f64>,
    macd_signal: Option<f64>,
    bb_upper: Option<f64>,
    bb_lower: Option<f64>,
    williams_r: Option<f64>,
    force_index: Option<f64>,
    atr: Option<f64>,
}

pub struct FeatureCollector {
    source: Arc<dyn MarketDataSource>,
    symbol: String,
    timeframe: String,
    periods: IndicatorPeriods,
    news_hours: Vec<u32>,
    handles: Option<IndicatorHandles>,
}

impl FeatureCollector {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        symbol: impl Into<String>,
        timeframe: impl Into<String>,
        news_hours: Vec<u32>,
    ) -> Self {
        Self {
            source,
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            periods: IndicatorPeriods::default(),
            news_hours,
            handles: None,
        }
    }

    pub fn with_periods(mut self, periods: IndicatorPeriods) -> Self {
        self.periods = periods;
        self.handles = None;
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Collects a validated feature vector. Never fails.
    pub fn collect(&mut self) -> FeatureVector {
        let bars = match self
            .source
            .bars(&self.symbol, &self.timeframe, self.periods.history_len())
        {
            Ok(bars) => bars,
            Err(e) => {
                warn!(
                    "FeatureCollector [{}]: Market data unavailable ({}), using fallbacks",
                    self.symbol, e
                );
                Vec::new()
            }
        };

        let last_close = bars.last().map(|c| c.close).unwrap_or(0.0);
        let mut features = FeatureVector::fallback(last_close);

        if let Some(current) = bars.last() {
            features.session_hour = current.time.hour();
            features.day_of_week = current.time.weekday().num_days_from_sunday();
            features.month = current.time.month();
            features.is_news_time = self.news_hours.contains(&features.session_hour);
        }

        let readings = self.read_indicators(&bars);
        let mut missing = Vec::new();
        let mut apply = |name: &'static str, reading: Option<f64>, slot: &mut f64| match reading {
            Some(v) => *slot = v,
            None => missing.push(name),
        };

        apply("rsi", readings.rsi, &mut features.rsi);
        apply("stoch_main", readings.stoch_main, &mut features.stoch_main);
        apply("stoch_signal", readings.stoch_signal, &mut features.stoch_signal);
        apply("macd_main", readings.macd_main, &mut features.macd_main);
        apply("macd_signal", readings.macd_signal, &mut features.macd_signal);
        apply("bb_upper", readings.bb_upper, &mut features.bb_upper);
        apply("bb_lower", readings.bb_lower, &mut features.bb_lower);
        apply("williams_r", readings.williams_r, &mut features.williams_r);
        apply("cci", cci(&bars, self.periods.cci), &mut features.cci);
        apply(
            "momentum",
            momentum(&bars, self.periods.momentum),
            &mut features.momentum,
        );
        apply("force_index", readings.force_index, &mut features.force_index);
        apply(
            "volume_ratio",
            volume_ratio(&bars, self.periods.volume_average),
            &mut features.volume_ratio,
        );
        apply("price_change", price_change(&bars), &mut features.price_change);
        apply(
            "volatility",
            readings
                .atr
                .filter(|_| last_close > 0.0)
                .map(|atr| (atr / last_close).max(VOLATILITY_FALLBACK)),
            &mut features.volatility,
        );
        apply("spread", self.source.spread(&self.symbol), &mut features.spread);

        if !missing.is_empty() {
            debug!(
                "FeatureCollector [{}]: {} bars, fallbacks used for {:?}",
                self.symbol,
                bars.len(),
                missing
            );
        }

        let corrected = features.sanitize(last_close);
        if !corrected.is_empty() {
            warn!(
                "FeatureCollector [{}]: Replaced non-finite features with fallbacks: {:?}",
                self.symbol, corrected
            );
        }

        features
    }

    fn read_indicators(&mut self, bars: &[Candle]) -> IndicatorReadings {
        if bars.is_empty() {
            return IndicatorReadings::default();
        }

        if self.handles.is_none() {
            match IndicatorHandles::new(&self.periods) {
                Ok(handles) => self.handles = Some(handles),
                Err(e) => {
                    warn!(
                        "FeatureCollector [{}]: Indicator setup failed ({}), using fallbacks",
                        self.symbol, e
                    );
                    return IndicatorReadings::default();
                }
            }
        }
        let Some(h) = self.handles.as_mut() else {
            return IndicatorReadings::default();
        };
        h.reset();

        let p = &self.periods;
        let n = bars.len();
        let mut rsi = f64::NAN;
        let mut stoch_main = f64::NAN;
        let mut stoch_signal = f64::NAN;
        let mut macd = None;
        let mut bb = None;
        let mut highest = f64::NAN;
        let mut lowest = f64::NAN;
        let mut force = f64::NAN;
        let mut atr = f64::NAN;
        let mut prev_close: Option<f64> = None;

        for bar in bars {
            let Some(item) = data_item(bar) else {
                continue;
            };
            rsi = h.rsi.next(bar.close);
            let fast = h.fast_stoch.next(&item);
            stoch_main = h.stoch_main.next(fast);
            stoch_signal = h.stoch_signal.next(stoch_main);
            macd = Some(h.macd.next(bar.close));
            bb = Some(h.bb.next(bar.close));
            highest = h.highest.next(&item);
            lowest = h.lowest.next(&item);
            atr = h.atr.next(&item);
            if let Some(prev) = prev_close {
                force = h.force.next((bar.close - prev) * bar.volume);
            }
            prev_close = Some(bar.close);
        }

        let close = bars[n - 1].close;
        let enough = |period: usize| n > period;

        IndicatorReadings {
            rsi: Some(rsi).filter(|_| enough(p.rsi)),
            stoch_main: Some(stoch_main).filter(|_| enough(p.stoch_k + p.stoch_slowing)),
            stoch_signal: Some(stoch_signal)
                .filter(|_| enough(p.stoch_k + p.stoch_slowing + p.stoch_d)),
            macd_main: macd.as_ref().map(|m| m.macd).filter(|_| enough(p.macd_slow)),
            macd_signal: macd
                .as_ref()
                .map(|m| m.signal)
                .filter(|_| enough(p.macd_slow + p.macd_signal)),
            bb_upper: bb.as_ref().map(|b| b.upper).filter(|_| enough(p.bb)),
            bb_lower: bb.as_ref().map(|b| b.lower).filter(|_| enough(p.bb)),
            williams_r: Some((highest, lowest))
                .filter(|_| enough(p.williams_r))
                .filter(|(hh, ll)| hh > ll)
                .map(|(hh, ll)| (hh - close) / (hh - ll) * -100.0),
            force_index: Some(force).filter(|_| enough(p.force_index)),
            atr: Some(atr).filter(|_| enough(p.atr)),
        }
    }
}

/// OHLCV item for the ta indicators. Inconsistent bars collapse onto the close;
/// bars without a usable close are skipped.
fn data_item(bar: &Candle) -> Option<ta::DataItem> {
    ta::DataItem::builder()
        .open(bar.open)
        .high(bar.high)
        .low(bar.low)
        .close(bar.close)
        .volume(bar.volume)
        .build()
        .or_else(|_| {
            ta::DataItem::builder()
                .open(bar.close)
                .high(bar.close)
                .low(bar.close)
                .close(bar.close)
                .volume(bar.volume.max(0.0))
                .build()
        })
        .ok()
}

/// Commodity Channel Index over the last `period` typical prices
fn cci(bars: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period {
        return None;
    }
    let window = &bars[bars.len() - period..];
    let typical: Vec<f64> = window
        .iter()
        .map(|c| (c.high + c.low + c.close) / 3.0)
        .collect();
    let mean = typical.iter().sum::<f64>() / period as f64;
    let mean_dev = typical.iter().map(|tp| (tp - mean).abs()).sum::<f64>() / period as f64;
    let last = typical[period - 1];
    if mean_dev == 0.0 {
        return Some(0.0);
    }
    Some((last - mean) / (0.015 * mean_dev))
}

/// Close relative to the close `period` bars ago, scaled to 100
fn momentum(bars: &[Candle], period: usize) -> Option<f64> {
    if bars.len() <= period {
        return None;
    }
    let base = bars[bars.len() - 1 - period].close;
    if base == 0.0 {
        return None;
    }
    Some(bars[bars.len() - 1].close / base * 100.0)
}

/// Current volume over the mean volume of the preceding `period` bars
fn volume_ratio(bars: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || bars.len() <= period {
        return None;
    }
    let current = bars[bars.len() - 1].volume;
    let previous = &bars[bars.len() - 1 - period..bars.len() - 1];
    let mean = previous.iter().map(|c| c.volume).sum::<f64>() / period as f64;
    if mean <= 0.0 {
        return None;
    }
    Some(current / mean)
}

/// Percent change of the current close versus the previous bar's close
fn price_change(bars: &[Candle]) -> Option<f64> {
    let [.., previous, current] = bars else {
        return None;
    };
    if previous.close == 0.0 {
        return None;
    }
    Some((current.close - previous.close) / previous.close * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ml::feature_registry::{
        MOMENTUM_FALLBACK, RSI_FALLBACK, VOLATILITY_FALLBACK, VOLUME_RATIO_FALLBACK,
    };
    use crate::infrastructure::repositories::CandleMarketSource;
    use chrono::{Duration, TimeZone, Utc};

    fn trending_bars(count: usize) -> Vec<Candle> {
        // 2024-03-04 is a Monday
        let t0 = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
        (0..count)
            .map(|i| {
                let base = 1.1000 + i as f64 * 0.0005 + ((i % 5) as f64) * 0.0002;
                Candle {
                    time: t0 + Duration::hours(i as i64),
                    open: base - 0.0002,
                    high: base + 0.0008,
                    low: base - 0.0007,
                    close: base,
                    volume: 1000.0 + (i % 7) as f64 * 100.0,
                }
            })
            .collect()
    }

    fn collector(bars: Vec<Candle>) -> FeatureCollector {
        FeatureCollector::new(
            Arc::new(CandleMarketSource::new(bars)),
            "EURUSD",
            "H1",
            vec![8, 13, 14],
        )
    }

    #[test]
    fn test_collect_with_full_history() {
        let bars = trending_bars(120);
        let last = bars.last().cloned().unwrap();
        let mut c = collector(bars);

        let fv = c.collect();

        assert!(fv.is_valid());
        assert!(fv.rsi > 50.0, "uptrend RSI should be above midpoint: {}", fv.rsi);
        assert!(fv.bb_upper > fv.bb_lower);
        assert!((-100.0..=0.0).contains(&fv.williams_r));
        assert!((0.0..=100.0).contains(&fv.stoch_main));
        assert!(fv.momentum > 100.0);
        assert!(fv.volatility > 0.0);
        assert_eq!(fv.session_hour, last.time.hour());
        assert_eq!(fv.month, 3);
    }

    #[test]
    fn test_collect_without_data_uses_fallbacks() {
        let mut c = collector(Vec::new());
        let fv = c.collect();

        assert!(fv.is_valid());
        assert_eq!(fv, FeatureVector::fallback(0.0));
    }

    #[test]
    fn test_short_history_falls_back_per_indicator() {
        let mut c = collector(trending_bars(3));
        let fv = c.collect();

        assert!(fv.is_valid());
        assert_eq!(fv.rsi, RSI_FALLBACK);
        assert_eq!(fv.momentum, MOMENTUM_FALLBACK);
        assert_eq!(fv.volume_ratio, VOLUME_RATIO_FALLBACK);
        assert_eq!(fv.volatility, VOLATILITY_FALLBACK);
        // Two bars are enough for a price change
        assert!(fv.price_change != 0.0);
    }

    #[test]
    fn test_non_finite_market_data_is_sanitized() {
        let mut bars = trending_bars(60);
        if let Some(last) = bars.last_mut() {
            last.close = f64::NAN;
            last.volume = f64::INFINITY;
        }
        let mut c = collector(bars);

        let fv = c.collect();
        assert!(fv.is_valid());
    }

    #[test]
    fn test_news_hour_flag() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 4, 13, 0, 0).unwrap();
        let bar = Candle {
            time: t0,
            open: 1.1,
            high: 1.1,
            low: 1.1,
            close: 1.1,
            volume: 1.0,
        };
        let mut c = collector(vec![bar]);
        let fv = c.collect();
        assert!(fv.is_news_time);
        assert_eq!(fv.day_of_week, 1);
    }

    #[test]
    fn test_repeated_collection_is_stable() {
        let mut c = collector(trending_bars(80));
        let first = c.collect();
        let second = c.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_spread_from_source() {
        let source = CandleMarketSource::new(trending_bars(30));
        source.set_spread(Some(12.0));
        let mut c = FeatureCollector::new(Arc::new(source), "EURUSD", "H1", vec![]);
        assert_eq!(c.collect().spread, 12.0);
    }

    #[test]
    fn test_helpers() {
        let bars = trending_bars(30);
        assert!(cci(&bars, 14).is_some());
        assert!(cci(&bars[..5], 14).is_none());
        assert!(volume_ratio(&bars, 20).is_some());
        assert!(price_change(&bars[..1]).is_none());
    }
}
