use crate::domain::ml::{FeatureVector, Prediction};
use crate::domain::trading::{Candle, DealRecord, TradeClose, TradeLifecycleRecord};
use async_trait::async_trait;

/// Read access to the host's market data for one symbol/timeframe.
pub trait MarketDataSource: Send + Sync {
    /// Most recent `count` closed-or-forming bars, oldest first.
    /// Fewer bars than requested is not an error.
    fn bars(&self, symbol: &str, timeframe: &str, count: usize) -> anyhow::Result<Vec<Candle>>;

    /// Current spread in points, if the venue reports one.
    fn spread(&self, symbol: &str) -> Option<f64>;
}

/// Read access to the account's deal history.
pub trait TransactionHistory: Send + Sync {
    /// All deals recorded for a position, in execution order.
    fn deals_for_position(&self, position_id: u64) -> Vec<DealRecord>;
}

/// Destination for lifecycle records used in model retraining.
///
/// Implementations never fail the caller: delivery problems are handled
/// (logged) internally.
#[async_trait]
pub trait TradeJournal: Send + Sync {
    async fn log_open(&self, record: &TradeLifecycleRecord);
    async fn log_close(&self, close: &TradeClose);
}

/// Optional strategy-specific hooks. Every method defaults to a no-op.
pub trait AnalyticsSink: Send + Sync {
    fn on_open(&self, _record: &TradeLifecycleRecord) {}
    fn on_exit(&self, _record: &TradeLifecycleRecord) {}
    fn on_market_conditions(&self, _features: &FeatureVector) {}
    fn on_prediction(&self, _prediction: &Prediction) {}
}
