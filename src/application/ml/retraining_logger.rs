//! Retraining Logger
//!
//! Forwards open and close lifecycle records to the analytics sink as flat JSON.
//! Delivery is fire-and-forget: a failed post is logged and counted, and never
//! reaches the caller.

use crate::application::ml::prediction_client::PredictionRequest;
use crate::config::SessionEnvConfig;
use crate::domain::ports::TradeJournal;
use crate::domain::trading::{TradeClose, TradeLifecycleRecord};
use crate::infrastructure::core::ServiceTransport;
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::persistence::CsvTrainingJournal;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};

pub const TRADES_PATH: &str = "/trades";

/// Trade-open record: the original prediction request plus entry details
#[derive(Debug, Serialize)]
pub struct TradeOpenPayload<'a> {
    #[serde(flatten)]
    pub request: PredictionRequest<'a>,
    pub trade_id: String,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub lot_size: f64,
    pub ml_prediction: &'a str,
    pub ml_confidence: f64,
    pub ml_model_type: &'a str,
    pub ml_model_key: &'a str,
    pub trade_time: i64,
    pub status: &'static str,
    pub profit_loss: f64,
    pub close_price: f64,
    pub close_time: i64,
    pub exit_reason: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TradeClosePayload<'a> {
    pub trade_id: String,
    pub strategy: &'a str,
    pub symbol: &'a str,
    pub timeframe: &'a str,
    pub close_price: f64,
    pub profit_loss: f64,
    pub profit_loss_pips: f64,
    pub close_time: i64,
    pub exit_reason: &'static str,
    pub status: &'static str,
    pub success: bool,
}

pub struct RetrainingLogger {
    transport: ServiceTransport,
    strategy: String,
    symbol: String,
    timeframe: String,
    journal: Option<CsvTrainingJournal>,
    metrics: Option<Metrics>,
}

impl RetrainingLogger {
    pub fn new(analytics_url: impl Into<String>, timeout: Duration, session: &SessionEnvConfig) -> Self {
        Self {
            transport: ServiceTransport::new(analytics_url, timeout),
            strategy: session.strategy_name.clone(),
            symbol: session.symbol.clone(),
            timeframe: session.timeframe.clone(),
            journal: None,
            metrics: None,
        }
    }

    /// Also append every record to a local CSV journal
    pub fn with_journal(mut self, journal: CsvTrainingJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn open_payload<'a>(&'a self, record: &'a TradeLifecycleRecord) -> TradeOpenPayload<'a> {
        TradeOpenPayload {
            request: PredictionRequest {
                strategy: &self.strategy,
                symbol: &self.symbol,
                timeframe: &self.timeframe,
                direction: record.direction,
                features: &record.features,
            },
            trade_id: record.trade_id.to_string(),
            entry_price: record.entry_price,
            stop_loss: record.stop_loss,
            take_profit: record.take_profit,
            lot_size: record.lot_size,
            ml_prediction: record.prediction.direction.as_str(),
            ml_confidence: record.prediction.confidence,
            ml_model_type: &record.prediction.model_type,
            ml_model_key: &record.prediction.model_key,
            trade_time: record.open_time.timestamp(),
            status: "OPEN",
            profit_loss: 0.0,
            close_price: 0.0,
            close_time: 0,
            exit_reason: "",
        }
    }

    pub fn close_payload<'a>(&'a self, close: &TradeClose) -> TradeClosePayload<'a> {
        TradeClosePayload {
            trade_id: close.trade_id.to_string(),
            strategy: &self.strategy,
            symbol: &self.symbol,
            timeframe: &self.timeframe,
            close_price: close.close_price,
            profit_loss: close.profit_loss,
            profit_loss_pips: close.profit_loss_pips,
            close_time: close.close_time.timestamp(),
            exit_reason: close.exit_reason.as_str(),
            status: "CLOSED",
            success: close.profit_loss > 0.0,
        }
    }

    async fn deliver<T: Serialize + Sync>(&self, kind: &str, trade_id: u64, payload: &T) {
        match self.transport.post_json(TRADES_PATH, payload).await {
            Ok(_) => info!(
                "RetrainingLogger [{}]: Delivered {} record for trade {}",
                self.symbol, kind, trade_id
            ),
            Err(e) => {
                error!(
                    "RetrainingLogger [{}]: Failed to deliver {} record for trade {}: {}",
                    self.symbol, kind, trade_id, e
                );
                if let Some(metrics) = &self.metrics {
                    metrics.inc_journal_failure(kind);
                }
            }
        }
    }
}

#[async_trait]
impl TradeJournal for RetrainingLogger {
    async fn log_open(&self, record: &TradeLifecycleRecord) {
        if record.trade_id == 0 {
            warn!(
                "RetrainingLogger [{}]: Refusing to log open record without a position ticket",
                self.symbol
            );
            return;
        }

        if let Some(journal) = &self.journal
            && let Err(e) = journal.append_open(record)
        {
            error!(
                "RetrainingLogger [{}]: Failed to journal open record for trade {}: {:#}",
                self.symbol, record.trade_id, e
            );
            if let Some(metrics) = &self.metrics {
                metrics.inc_journal_failure("open_csv");
            }
        }

        let payload = self.open_payload(record);
        self.deliver("open", record.trade_id, &payload).await;
    }

    async fn log_close(&self, close: &TradeClose) {
        if close.trade_id == 0 {
            warn!(
                "RetrainingLogger [{}]: Refusing to log close record without a position ticket",
                self.symbol
            );
            return;
        }

        if let Some(journal) = &self.journal
            && let Err(e) = journal.append_close(close)
        {
            error!(
                "RetrainingLogger [{}]: Failed to journal close record for trade {}: {:#}",
                self.symbol, close.trade_id, e
            );
            if let Some(metrics) = &self.metrics {
                metrics.inc_journal_failure("close_csv");
            }
        }

        let payload = self.close_payload(close);
        self.deliver("close", close.trade_id, &payload).await;
    }
}
