//! In-Memory Repository Implementations
//!
//! Thread-safe, in-memory implementations of the history and market data ports
//! defined in `domain::ports`. Data is lost on restart; these back the CLI replay
//! tool and tests.

use crate::domain::ports::{MarketDataSource, TransactionHistory};
use crate::domain::trading::{Candle, DealRecord};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// In-memory deal history keyed by position id
#[derive(Clone, Default)]
pub struct InMemoryTransactionHistory {
    deals: Arc<RwLock<HashMap<u64, Vec<DealRecord>>>>,
}

impl InMemoryTransactionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a deal to its position's history
    pub fn record(&self, deal: DealRecord) {
        let mut deals = self.deals.write().unwrap_or_else(|p| p.into_inner());
        deals.entry(deal.position_id).or_default().push(deal);
    }
}

impl TransactionHistory for InMemoryTransactionHistory {
    fn deals_for_position(&self, position_id: u64) -> Vec<DealRecord> {
        let deals = self.deals.read().unwrap_or_else(|p| p.into_inner());
        let mut found = deals.get(&position_id).cloned().unwrap_or_default();
        found.sort_by_key(|d| d.time);
        found
    }
}

/// Market data source over a fixed bar series for one symbol
#[derive(Clone, Default)]
pub struct CandleMarketSource {
    candles: Arc<RwLock<Vec<Candle>>>,
    spread: Arc<RwLock<Option<f64>>>,
}

impl CandleMarketSource {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self {
            candles: Arc::new(RwLock::new(candles)),
            spread: Arc::new(RwLock::new(None)),
        }
    }

    pub fn set_spread(&self, spread: Option<f64>) {
        *self.spread.write().unwrap_or_else(|p| p.into_inner()) = spread;
    }
}

impl MarketDataSource for CandleMarketSource {
    fn bars(&self, _symbol: &str, _timeframe: &str, count: usize) -> anyhow::Result<Vec<Candle>> {
        let candles = self
            .candles
            .read()
            .map_err(|_| anyhow::anyhow!("candle store lock poisoned"))?;
        let start = candles.len().saturating_sub(count);
        Ok(candles[start..].to_vec())
    }

    fn spread(&self, _symbol: &str) -> Option<f64> {
        *self.spread.read().unwrap_or_else(|p| p.into_inner())
    }
}
