//! Trading Session
//!
//! Owns one feature collector, prediction client, confidence gate and lifecycle
//! tracker for a single strategy run. Nothing here is global: two sessions never
//! share a client or a tracker.

use crate::application::ml::{FeatureCollector, PredictionClient, RetrainingLogger};
use crate::application::trading::{ConfidenceGate, LifecycleEvent, TradeLifecycleTracker};
use crate::config::Config;
use crate::domain::ml::{FeatureVector, Prediction};
use crate::domain::ports::{AnalyticsSink, MarketDataSource, TradeJournal, TransactionHistory};
use crate::domain::trading::{PendingTradeIntent, TradeDirection, TradeTransaction};
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::persistence::CsvTrainingJournal;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Order the rule-based strategy wants to place, before ML adjustment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeProposal {
    pub direction: TradeDirection,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub lot_size: f64,
}

impl TradeProposal {
    /// Distance from entry to the stop, or `None` when no stop is set.
    pub fn stop_distance(&self) -> Option<f64> {
        (self.stop_loss > 0.0 && self.stop_loss.is_finite())
            .then(|| (self.entry_price - self.stop_loss).abs())
    }

    /// Stop price `distance` away from entry, on the losing side.
    pub fn stop_at(&self, distance: f64) -> f64 {
        match self.direction {
            TradeDirection::Buy => self.entry_price - distance,
            TradeDirection::Sell => self.entry_price + distance,
        }
    }
}

/// Gate outcome for one proposal, with confidence-adjusted stop-loss and size
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeDecision {
    pub accepted: bool,
    pub proposal: TradeProposal,
    pub stop_loss: f64,
    pub lot_size: f64,
    pub features: FeatureVector,
    pub prediction: Prediction,
}

impl TradeDecision {
    /// Pending intent for an accepted decision
    pub fn to_intent(&self) -> Option<PendingTradeIntent> {
        self.accepted.then(|| PendingTradeIntent {
            direction: self.proposal.direction,
            entry_price: self.proposal.entry_price,
            stop_loss: self.stop_loss,
            take_profit: self.proposal.take_profit,
            lot_size: self.lot_size,
            features: self.features.clone(),
            prediction: self.prediction.clone(),
            submitted_at: Utc::now(),
        })
    }
}

pub struct TradingSession {
    symbol: String,
    collector: FeatureCollector,
    client: PredictionClient,
    gate: ConfidenceGate,
    tracker: TradeLifecycleTracker,
    sink: Option<Arc<dyn AnalyticsSink>>,
    metrics: Option<Metrics>,
}

impl TradingSession {
    /// Wires a session from configuration. Retraining records go to the
    /// analytics URL and, when configured, a local CSV journal.
    pub fn new(
        config: &Config,
        source: Arc<dyn MarketDataSource>,
        history: Arc<dyn TransactionHistory>,
        metrics: Option<Metrics>,
    ) -> Self {
        let session = &config.session;

        let mut logger = RetrainingLogger::new(
            config.prediction.analytics_url.clone(),
            config.prediction.timeout,
            session,
        );
        if let Some(path) = &config.prediction.training_csv {
            logger = logger.with_journal(CsvTrainingJournal::new(
                path.clone(),
                session.strategy_name.clone(),
                session.symbol.clone(),
                session.timeframe.clone(),
            ));
        }

        let mut client = PredictionClient::new(&config.prediction, session);
        if let Some(m) = &metrics {
            logger = logger.with_metrics(m.clone());
            client = client.with_metrics(m.clone());
        }

        let mut tracker = TradeLifecycleTracker::new(
            config.instrument(),
            session.comment_tag.clone(),
            Arc::new(logger),
            history,
        );
        if let Some(m) = &metrics {
            tracker = tracker.with_metrics(m.clone());
        }

        Self {
            symbol: session.symbol.clone(),
            collector: FeatureCollector::new(
                source,
                session.symbol.clone(),
                session.timeframe.clone(),
                session.news_hours.clone(),
            ),
            client,
            gate: ConfidenceGate::new(&config.gate),
            tracker,
            sink: None,
            metrics,
        }
    }

    /// Assembles a session from already-built parts.
    pub fn from_parts(
        collector: FeatureCollector,
        client: PredictionClient,
        gate: ConfidenceGate,
        tracker: TradeLifecycleTracker,
    ) -> Self {
        Self {
            symbol: collector.symbol().to_string(),
            collector,
            client,
            gate,
            tracker,
            sink: None,
            metrics: None,
        }
    }

    /// Convenience for hosts that supply their own journal
    pub fn with_journal(
        config: &Config,
        source: Arc<dyn MarketDataSource>,
        history: Arc<dyn TransactionHistory>,
        journal: Arc<dyn TradeJournal>,
    ) -> Self {
        let session = &config.session;
        Self::from_parts(
            FeatureCollector::new(
                source,
                session.symbol.clone(),
                session.timeframe.clone(),
                session.news_hours.clone(),
            ),
            PredictionClient::new(&config.prediction, session),
            ConfidenceGate::new(&config.gate),
            TradeLifecycleTracker::new(
                config.instrument(),
                session.comment_tag.clone(),
                journal,
                history,
            ),
        )
    }

    pub fn with_sink(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.tracker = self.tracker.with_sink(sink.clone());
        self.sink = Some(sink);
        self
    }

    /// Collects features, scores them and gates the proposal.
    pub async fn evaluate(&mut self, proposal: TradeProposal) -> TradeDecision {
        let features = self.collector.collect();
        if let Some(sink) = &self.sink {
            sink.on_market_conditions(&features);
        }

        let prediction = self.client.predict(&features, proposal.direction).await;
        if let Some(sink) = &self.sink {
            sink.on_prediction(&prediction);
        }

        let accepted = self.gate.accept(&prediction);
        if let Some(metrics) = &self.metrics {
            metrics.inc_gate_decision(accepted);
        }

        let stop_loss = match proposal.stop_distance().filter(|_| prediction.is_valid) {
            Some(distance) => proposal.stop_at(self.gate.adjust_stop_loss(
                distance,
                &prediction,
                proposal.direction,
            )),
            None => proposal.stop_loss,
        };

        let decision = TradeDecision {
            accepted,
            proposal,
            stop_loss,
            lot_size: self.gate.adjust_position_size(proposal.lot_size, &prediction),
            features,
            prediction,
        };

        info!(
            "TradingSession [{}]: {} proposal {} (confidence {:.2}, lot {:.2} -> {:.2})",
            self.symbol,
            proposal.direction,
            if accepted { "ACCEPTED" } else { "REJECTED" },
            decision.prediction.confidence,
            proposal.lot_size,
            decision.lot_size
        );

        decision
    }

    /// Queues an accepted decision for lifecycle tracking. Returns false for a
    /// rejected decision.
    pub fn submit(&mut self, decision: &TradeDecision) -> bool {
        match decision.to_intent() {
            Some(intent) => {
                self.tracker.submit_intent(intent);
                true
            }
            None => false,
        }
    }

    pub fn submit_intent(&mut self, intent: PendingTradeIntent) {
        self.tracker.submit_intent(intent);
    }

    pub async fn on_transaction(&mut self, tx: &TradeTransaction) -> Option<LifecycleEvent> {
        self.tracker.on_transaction(tx).await
    }

    pub fn tracker(&self) -> &TradeLifecycleTracker {
        &self.tracker
    }

    pub fn client(&self) -> &PredictionClient {
        &self.client
    }

}
