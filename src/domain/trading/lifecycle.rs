use super::transaction::DealReason;
use super::types::TradeDirection;
use crate::domain::ml::{FeatureVector, Prediction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleStatus {
    PendingId,
    Open,
    Closed,
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::PendingId => "PENDING_ID",
            LifecycleStatus::Open => "OPEN",
            LifecycleStatus::Closed => "CLOSED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    ManualClose,
    Unknown,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::TakeProfit => "take_profit",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::ManualClose => "manual_close",
            ExitReason::Unknown => "unknown",
        }
    }

    /// Sign heuristic: positive take_profit, negative stop_loss, flat manual_close.
    pub fn from_profit(profit: f64) -> Self {
        if !profit.is_finite() {
            ExitReason::Unknown
        } else if profit > 0.0 {
            ExitReason::TakeProfit
        } else if profit < 0.0 {
            ExitReason::StopLoss
        } else {
            ExitReason::ManualClose
        }
    }

    /// Venue-reported cause, when the deal reason identifies one.
    pub fn from_deal_reason(reason: DealReason) -> Option<Self> {
        match reason {
            DealReason::TakeProfit => Some(ExitReason::TakeProfit),
            DealReason::StopLoss | DealReason::StopOut => Some(ExitReason::StopLoss),
            DealReason::Client | DealReason::Mobile | DealReason::Web => {
                Some(ExitReason::ManualClose)
            }
            DealReason::Expert | DealReason::Other => None,
        }
    }

    /// Venue reason first, profit sign otherwise.
    pub fn resolve(reason: Option<DealReason>, profit: f64) -> Self {
        reason
            .and_then(Self::from_deal_reason)
            .unwrap_or_else(|| Self::from_profit(profit))
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trade data captured at submission, before the venue assigns a position ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTradeIntent {
    pub direction: TradeDirection,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub lot_size: f64,
    pub features: FeatureVector,
    pub prediction: Prediction,
    pub submitted_at: DateTime<Utc>,
}

/// Lifecycle of one real trade, keyed by the venue position ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLifecycleRecord {
    pub trade_id: u64,
    pub direction: TradeDirection,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub lot_size: f64,
    pub features: FeatureVector,
    pub prediction: Prediction,
    pub open_time: DateTime<Utc>,
    pub status: LifecycleStatus,
    pub close_price: Option<f64>,
    pub profit_loss: Option<f64>,
    pub profit_loss_pips: Option<f64>,
    pub close_time: Option<DateTime<Utc>>,
    pub exit_reason: Option<ExitReason>,
}

impl TradeLifecycleRecord {
    /// Flushes a pending intent into an OPEN record under the venue ticket.
    pub fn open(intent: PendingTradeIntent, trade_id: u64, open_time: DateTime<Utc>) -> Self {
        Self {
            trade_id,
            direction: intent.direction,
            entry_price: intent.entry_price,
            stop_loss: intent.stop_loss,
            take_profit: intent.take_profit,
            lot_size: intent.lot_size,
            features: intent.features,
            prediction: intent.prediction,
            open_time,
            status: LifecycleStatus::Open,
            close_price: None,
            profit_loss: None,
            profit_loss_pips: None,
            close_time: None,
            exit_reason: None,
        }
    }

    /// Replaces the requested entry with the venue fill, when the deal reports one.
    pub fn with_fill_price(mut self, fill_price: f64) -> Self {
        if fill_price.is_finite() && fill_price > 0.0 {
            self.entry_price = fill_price;
        }
        self
    }

    /// OPEN -> CLOSED. Returns `None` if the record is not open, so a record
    /// can never close twice.
    pub fn close(&mut self, outcome: &TradeClose) -> Option<()> {
        if self.status != LifecycleStatus::Open {
            return None;
        }
        self.status = LifecycleStatus::Closed;
        self.close_price = Some(outcome.close_price);
        self.profit_loss = Some(outcome.profit_loss);
        self.profit_loss_pips = Some(outcome.profit_loss_pips);
        self.close_time = Some(outcome.close_time);
        self.exit_reason = Some(outcome.exit_reason);
        Some(())
    }
}

/// Closing outcome handed to the retraining journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeClose {
    pub trade_id: u64,
    pub close_price: f64,
    pub profit_loss: f64,
    pub profit_loss_pips: f64,
    pub close_time: DateTime<Utc>,
    pub exit_reason: ExitReason,
}
