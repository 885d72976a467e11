//! Trade Lifecycle Tracker
//!
//! Reconciles raw broker transaction notifications into exactly one "opened" and
//! one "closed" event per real trade:
//! - A submitted intent waits in a single pending slot until the venue assigns a
//!   position ticket.
//! - The first opening deal for our symbol and tag flushes the intent into an
//!   OPEN record.
//! - The first closing deal (or history migration resolving to one) closes the
//!   record and evicts it. Later duplicates find nothing to close.
//! - Closed tickets are remembered for a while, so a late or replayed opening
//!   deal can never reopen one.

use crate::domain::ports::{AnalyticsSink, TradeJournal, TransactionHistory};
use crate::domain::trading::{
    DealReason, DealRecord, ExitReason, InstrumentSpec, LifecycleStatus, PendingTradeIntent,
    TradeClose, TradeLifecycleRecord, TradeTransaction, TransactionKind,
};
use crate::infrastructure::observability::Metrics;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Closed position tickets kept for duplicate suppression
const RECENTLY_CLOSED_CAPACITY: usize = 64;

/// Transition emitted by the tracker
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Opened(TradeLifecycleRecord),
    Closed(TradeLifecycleRecord),
}

impl LifecycleEvent {
    pub fn record(&self) -> &TradeLifecycleRecord {
        match self {
            LifecycleEvent::Opened(r) | LifecycleEvent::Closed(r) => r,
        }
    }
}

pub struct TradeLifecycleTracker {
    instrument: InstrumentSpec,
    comment_tag: String,
    journal: Arc<dyn TradeJournal>,
    history: Arc<dyn TransactionHistory>,
    sink: Option<Arc<dyn AnalyticsSink>>,
    metrics: Option<Metrics>,
    pending: Option<PendingTradeIntent>,
    open: Option<TradeLifecycleRecord>,
    recently_closed: VecDeque<u64>,
    lost_intents: u64,
}

impl TradeLifecycleTracker {
    pub fn new(
        instrument: InstrumentSpec,
        comment_tag: impl Into<String>,
        journal: Arc<dyn TradeJournal>,
        history: Arc<dyn TransactionHistory>,
    ) -> Self {
        Self {
            instrument,
            comment_tag: comment_tag.into(),
            journal,
            history,
            sink: None,
            metrics: None,
            pending: None,
            open: None,
            recently_closed: VecDeque::with_capacity(RECENTLY_CLOSED_CAPACITY),
            lost_intents: 0,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Current state: `None` when idle. An open record takes precedence over
    /// a pending intent queued behind it.
    pub fn status(&self) -> Option<LifecycleStatus> {
        if self.open.is_some() {
            Some(LifecycleStatus::Open)
        } else if self.pending.is_some() {
            Some(LifecycleStatus::PendingId)
        } else {
            None
        }
    }

    pub fn pending_intent(&self) -> Option<&PendingTradeIntent> {
        self.pending.as_ref()
    }

    /// Intents overwritten before a venue ticket arrived
    pub fn lost_intents(&self) -> u64 {
        self.lost_intents
    }

    /// Buffers trade data until the venue confirms the position.
    pub fn submit_intent(&mut self, intent: PendingTradeIntent) {
        if let Some(previous) = self.pending.replace(intent) {
            self.count_lost_intent();
            warn!(
                "LifecycleTracker [{}]: Pending {} intent from {} overwritten before confirmation (lost intents: {})",
                self.instrument.symbol,
                previous.direction,
                previous.submitted_at,
                self.lost_intents
            );
        }
    }

    /// Feeds one notification through the state machine.
    pub async fn on_transaction(&mut self, tx: &TradeTransaction) -> Option<LifecycleEvent> {
        let position_id = tx.position_id();
        if position_id == 0 {
            debug!(
                "LifecycleTracker [{}]: Ignoring {:?} notification without position id",
                self.instrument.symbol, tx.kind
            );
            return None;
        }

        match tx.kind {
            TransactionKind::DealAdd => {
                let Some(deal) = tx.deal.as_ref() else {
                    debug!(
                        "LifecycleTracker [{}]: Deal notification for {} carries no deal",
                        self.instrument.symbol, position_id
                    );
                    return None;
                };
                if deal.symbol != self.instrument.symbol {
                    debug!(
                        "LifecycleTracker [{}]: Ignoring foreign deal {} on {}",
                        self.instrument.symbol, deal.ticket, deal.symbol
                    );
                    return None;
                }

                if deal.entry.is_opening() {
                    self.handle_opening(position_id, deal).await
                } else if deal.entry.is_closing() {
                    self.handle_closing(position_id, deal).await
                } else {
                    None
                }
            }
            TransactionKind::HistoryAdd => self.handle_history(position_id).await,
            other => {
                debug!(
                    "LifecycleTracker [{}]: Ignoring {:?} notification for {}",
                    self.instrument.symbol, other, position_id
                );
                None
            }
        }
    }

    fn count_lost_intent(&mut self) {
        self.lost_intents += 1;
        if let Some(metrics) = &self.metrics {
            metrics.lost_intents_total.inc();
        }
    }

    fn was_closed(&self, position_id: u64) -> bool {
        self.recently_closed.contains(&position_id)
    }

    fn remember_closed(&mut self, position_id: u64) {
        if self.recently_closed.len() == RECENTLY_CLOSED_CAPACITY {
            self.recently_closed.pop_front();
        }
        self.recently_closed.push_back(position_id);
    }

    fn tag_matches(&self, comment: &str) -> bool {
        self.comment_tag.is_empty() || comment.contains(&self.comment_tag)
    }

    async fn handle_opening(
        &mut self,
        position_id: u64,
        deal: &DealRecord,
    ) -> Option<LifecycleEvent> {
        if self.was_closed(position_id) {
            debug!(
                "LifecycleTracker [{}]: Opening deal for already closed position {} ignored",
                self.instrument.symbol, position_id
            );
            return None;
        }
        if !self.tag_matches(&deal.comment) {
            debug!(
                "LifecycleTracker [{}]: Opening deal {} not tagged '{}' (comment '{}')",
                self.instrument.symbol, deal.ticket, self.comment_tag, deal.comment
            );
            return None;
        }
        if let Some(open) = &self.open {
            let tracked = open.trade_id;
            if tracked == position_id {
                debug!(
                    "LifecycleTracker [{}]: Duplicate opening deal for {}",
                    self.instrument.symbol, position_id
                );
                return None;
            }
            // The venue confirmed a second position while one is tracked. The
            // queued intent cannot be matched safely to either of them.
            match self.pending.take() {
                Some(intent) => {
                    self.count_lost_intent();
                    warn!(
                        "LifecycleTracker [{}]: Position {} opened while tracking {}; pending {} intent dropped (lost intents: {})",
                        self.instrument.symbol,
                        position_id,
                        tracked,
                        intent.direction,
                        self.lost_intents
                    );
                }
                None => warn!(
                    "LifecycleTracker [{}]: Position {} opened while tracking {}, not tracked",
                    self.instrument.symbol, position_id, tracked
                ),
            }
            return None;
        }
        let Some(intent) = self.pending.take() else {
            debug!(
                "LifecycleTracker [{}]: Opening deal for {} without a pending intent",
                self.instrument.symbol, position_id
            );
            return None;
        };

        let record =
            TradeLifecycleRecord::open(intent, position_id, deal.time).with_fill_price(deal.price);
        info!(
            "LifecycleTracker [{}]: Position {} OPEN ({} {} @ {})",
            self.instrument.symbol,
            position_id,
            record.direction,
            record.lot_size,
            record.entry_price
        );

        if let Some(metrics) = &self.metrics {
            metrics.inc_lifecycle("opened");
        }
        self.journal.log_open(&record).await;
        if let Some(sink) = &self.sink {
            sink.on_open(&record);
        }

        self.open = Some(record.clone());
        Some(LifecycleEvent::Opened(record))
    }

    async fn handle_closing(
        &mut self,
        position_id: u64,
        deal: &DealRecord,
    ) -> Option<LifecycleEvent> {
        if self.was_closed(position_id) {
            debug!(
                "LifecycleTracker [{}]: Closing deal for already closed position {}",
                self.instrument.symbol, position_id
            );
            return None;
        }
        if !self.is_tracking(position_id) {
            debug!(
                "LifecycleTracker [{}]: Closing deal for untracked position {}",
                self.instrument.symbol, position_id
            );
            return None;
        }
        self.finalize(deal.price, deal.net_profit(), deal.reason, deal.time)
            .await
    }

    /// Resolves a history migration by scanning the position's deals, most
    /// recent first, for a closing deal on our symbol.
    async fn handle_history(&mut self, position_id: u64) -> Option<LifecycleEvent> {
        if !self.is_tracking(position_id) {
            debug!(
                "LifecycleTracker [{}]: History notification for untracked position {}",
                self.instrument.symbol, position_id
            );
            return None;
        }

        let deals = self.history.deals_for_position(position_id);
        if !deals.iter().any(|d| self.tag_matches(&d.comment)) {
            debug!(
                "LifecycleTracker [{}]: History for {} carries no '{}' deals",
                self.instrument.symbol, position_id, self.comment_tag
            );
            return None;
        }

        let Some(closing) = deals
            .iter()
            .rev()
            .find(|d| d.entry.is_closing() && d.symbol == self.instrument.symbol)
        else {
            debug!(
                "LifecycleTracker [{}]: No closing deal in history for {} yet",
                self.instrument.symbol, position_id
            );
            return None;
        };

        self.finalize(
            closing.price,
            closing.net_profit(),
            closing.reason,
            closing.time,
        )
        .await
    }

    fn is_tracking(&self, position_id: u64) -> bool {
        self.open
            .as_ref()
            .is_some_and(|r| r.trade_id == position_id)
    }

    async fn finalize(
        &mut self,
        close_price: f64,
        profit: f64,
        reason: Option<DealReason>,
        close_time: DateTime<Utc>,
    ) -> Option<LifecycleEvent> {
        let mut record = self.open.take()?;
        self.remember_closed(record.trade_id);

        let close = TradeClose {
            trade_id: record.trade_id,
            close_price,
            profit_loss: profit,
            profit_loss_pips: self.instrument.pips_between(
                record.direction,
                record.entry_price,
                close_price,
            ),
            close_time,
            exit_reason: ExitReason::resolve(reason, profit),
        };
        record.close(&close)?;

        info!(
            "LifecycleTracker [{}]: Position {} CLOSED ({}, P/L {:.2}, {:.1} pips)",
            self.instrument.symbol,
            record.trade_id,
            close.exit_reason,
            close.profit_loss,
            close.profit_loss_pips
        );

        if let Some(metrics) = &self.metrics {
            metrics.inc_lifecycle("closed");
        }
        self.journal.log_close(&close).await;
        if let Some(sink) = &self.sink {
            sink.on_exit(&record);
        }

        Some(LifecycleEvent::Closed(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ml::{FeatureVector, Prediction, SignalDirection};
    use crate::domain::trading::{DealEntry, TradeDirection};
    use crate::infrastructure::repositories::InMemoryTransactionHistory;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingJournal {
        opens: Mutex<Vec<u64>>,
        closes: Mutex<Vec<TradeClose>>,
    }

    #[async_trait]
    impl TradeJournal for RecordingJournal {
        async fn log_open(&self, record: &TradeLifecycleRecord) {
            self.opens.lock().unwrap().push(record.trade_id);
        }
        async fn log_close(&self, close: &TradeClose) {
            self.closes.lock().unwrap().push(close.clone());
        }
    }

    fn intent(direction: TradeDirection) -> PendingTradeIntent {
        PendingTradeIntent {
            direction,
            entry_price: 1.1000,
            stop_loss: 1.0950,
            take_profit: 1.1100,
            lot_size: 0.10,
            features: FeatureVector::fallback(1.1),
            prediction: Prediction::scored(SignalDirection::Buy, 0.7, 0.66, "rf", "EURUSD_H1"),
            submitted_at: Utc::now(),
        }
    }

    fn deal(position_id: u64, entry: DealEntry, price: f64, profit: f64, comment: &str) -> DealRecord {
        DealRecord {
            ticket: position_id + 1,
            position_id,
            symbol: "EURUSD".to_string(),
            comment: comment.to_string(),
            entry,
            reason: None,
            price,
            volume: 0.10,
            profit,
            swap: 0.0,
            commission: 0.0,
            time: Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap(),
        }
    }

    fn tracker(
        journal: Arc<RecordingJournal>,
        history: Arc<InMemoryTransactionHistory>,
    ) -> TradeLifecycleTracker {
        TradeLifecycleTracker::new(
            InstrumentSpec::new("EURUSD", 0.00001, 5),
            "trend",
            journal,
            history,
        )
    }

    #[tokio::test]
    async fn test_open_then_close_then_duplicate() {
        let journal = Arc::new(RecordingJournal::default());
        let mut t = tracker(journal.clone(), Arc::new(InMemoryTransactionHistory::new()));

        t.submit_intent(intent(TradeDirection::Buy));
        assert_eq!(t.status(), Some(LifecycleStatus::PendingId));

        let opened = t
            .on_transaction(&TradeTransaction::deal_add(deal(555001, DealEntry::In, 1.1, 0.0, "trend")))
            .await;
        assert!(matches!(opened, Some(LifecycleEvent::Opened(ref r)) if r.trade_id == 555001));
        assert_eq!(t.status(), Some(LifecycleStatus::Open));

        let close_tx = TradeTransaction::deal_add(deal(555001, DealEntry::Out, 1.1010, 12.5, "tp 1.1010"));
        let closed = t.on_transaction(&close_tx).await;
        let Some(LifecycleEvent::Closed(record)) = closed else {
            panic!("expected close event");
        };
        assert_eq!(record.exit_reason, Some(ExitReason::TakeProfit));
        assert!((record.profit_loss_pips.unwrap() - 10.0).abs() < 1e-6);
        assert_eq!(t.status(), None);

        assert!(t.on_transaction(&close_tx).await.is_none());
        assert_eq!(*journal.opens.lock().unwrap(), vec![555001]);
        assert_eq!(journal.closes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_history_scan_closes_position() {
        let journal = Arc::new(RecordingJournal::default());
        let history = Arc::new(InMemoryTransactionHistory::new());
        let mut t = tracker(journal.clone(), history.clone());

        t.submit_intent(intent(TradeDirection::Sell));
        let open_deal = deal(777, DealEntry::In, 1.1, 0.0, "trend");
        history.record(open_deal.clone());
        t.on_transaction(&TradeTransaction::deal_add(open_deal)).await;

        // Migration before the closing deal exists resolves nothing
        assert!(t.on_transaction(&TradeTransaction::history_add(777, "EURUSD")).await.is_none());

        let mut closing = deal(777, DealEntry::Out, 1.1050, -25.0, "sl 1.1050");
        closing.reason = Some(DealReason::StopLoss);
        closing.commission = -0.7;
        history.record(closing);

        let event = t
            .on_transaction(&TradeTransaction::history_add(777, "EURUSD"))
            .await;
        let Some(LifecycleEvent::Closed(record)) = event else {
            panic!("expected close event");
        };
        assert_eq!(record.exit_reason, Some(ExitReason::StopLoss));
        assert!((record.profit_loss.unwrap() + 25.7).abs() < 1e-9);
        assert!((record.profit_loss_pips.unwrap() + 50.0).abs() < 1e-6);

        assert!(t.on_transaction(&TradeTransaction::history_add(777, "EURUSD")).await.is_none());
        assert_eq!(journal.closes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_foreign_and_placeholder_notifications_ignored() {
        let journal = Arc::new(RecordingJournal::default());
        let mut t = tracker(journal.clone(), Arc::new(InMemoryTransactionHistory::new()));
        t.submit_intent(intent(TradeDirection::Buy));

        let mut foreign = deal(42, DealEntry::In, 150.0, 0.0, "trend");
        foreign.symbol = "USDJPY".to_string();
        assert!(t.on_transaction(&TradeTransaction::deal_add(foreign)).await.is_none());

        let untagged = deal(43, DealEntry::In, 1.1, 0.0, "manual");
        assert!(t.on_transaction(&TradeTransaction::deal_add(untagged)).await.is_none());

        let placeholder = deal(0, DealEntry::In, 1.1, 0.0, "trend");
        assert!(t.on_transaction(&TradeTransaction::deal_add(placeholder)).await.is_none());

        assert_eq!(t.status(), Some(LifecycleStatus::PendingId));
        assert!(journal.opens.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overwritten_intent_is_counted() {
        let journal = Arc::new(RecordingJournal::default());
        let metrics = Metrics::new().expect("metrics");
        let mut t = tracker(journal, Arc::new(InMemoryTransactionHistory::new()))
            .with_metrics(metrics.clone());

        t.submit_intent(intent(TradeDirection::Buy));
        t.submit_intent(intent(TradeDirection::Sell));

        assert_eq!(t.lost_intents(), 1);
        assert_eq!(metrics.lost_intents_total.get(), 1);
        assert_eq!(
            t.pending_intent().map(|i| i.direction),
            Some(TradeDirection::Sell)
        );
    }

    #[tokio::test]
    async fn test_replayed_opening_cannot_reopen_closed_position() {
        let journal = Arc::new(RecordingJournal::default());
        let mut t = tracker(journal.clone(), Arc::new(InMemoryTransactionHistory::new()));

        let open_tx = TradeTransaction::deal_add(deal(555001, DealEntry::In, 1.1, 0.0, "trend"));
        t.submit_intent(intent(TradeDirection::Buy));
        t.on_transaction(&open_tx).await;
        t.on_transaction(&TradeTransaction::deal_add(deal(555001, DealEntry::Out, 1.1010, 12.5, "tp")))
            .await;

        // Next trade's intent is queued when the old opening deal arrives again
        t.submit_intent(intent(TradeDirection::Sell));
        assert!(t.on_transaction(&open_tx).await.is_none());
        assert_eq!(t.status(), Some(LifecycleStatus::PendingId));
        assert_eq!(
            t.pending_intent().map(|i| i.direction),
            Some(TradeDirection::Sell)
        );

        let next = t
            .on_transaction(&TradeTransaction::deal_add(deal(555002, DealEntry::In, 1.1, 0.0, "trend")))
            .await;
        assert!(matches!(next, Some(LifecycleEvent::Opened(ref r)) if r.trade_id == 555002));
        assert_eq!(*journal.opens.lock().unwrap(), vec![555001, 555002]);
        assert_eq!(journal.closes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_second_position_while_open_drops_intent() {
        let journal = Arc::new(RecordingJournal::default());
        let metrics = Metrics::new().expect("metrics");
        let mut t = tracker(journal.clone(), Arc::new(InMemoryTransactionHistory::new()))
            .with_metrics(metrics.clone());

        t.submit_intent(intent(TradeDirection::Buy));
        t.on_transaction(&TradeTransaction::deal_add(deal(100, DealEntry::In, 1.1, 0.0, "trend")))
            .await;

        t.submit_intent(intent(TradeDirection::Sell));
        let second = t
            .on_transaction(&TradeTransaction::deal_add(deal(200, DealEntry::In, 1.1, 0.0, "trend")))
            .await;
        assert!(second.is_none());
        assert!(t.pending_intent().is_none());
        assert_eq!(t.lost_intents(), 1);
        assert_eq!(metrics.lost_intents_total.get(), 1);

        // Tracked position is unaffected and the dropped intent never resurfaces
        let closed = t
            .on_transaction(&TradeTransaction::deal_add(deal(100, DealEntry::Out, 1.1, 0.0, "trend")))
            .await;
        assert!(matches!(closed, Some(LifecycleEvent::Closed(ref r)) if r.trade_id == 100));
        let third = t
            .on_transaction(&TradeTransaction::deal_add(deal(300, DealEntry::In, 1.1, 0.0, "trend")))
            .await;
        assert!(third.is_none());
        assert_eq!(*journal.opens.lock().unwrap(), vec![100]);
    }

    #[tokio::test]
    async fn test_pips_measured_from_fill_price() {
        let journal = Arc::new(RecordingJournal::default());
        let mut t = tracker(journal.clone(), Arc::new(InMemoryTransactionHistory::new()));

        // Requested 1.1000, filled 3 points worse
        t.submit_intent(intent(TradeDirection::Buy));
        let opened = t
            .on_transaction(&TradeTransaction::deal_add(deal(61, DealEntry::In, 1.10003, 0.0, "trend")))
            .await;
        assert!(matches!(opened, Some(LifecycleEvent::Opened(ref r)) if (r.entry_price - 1.10003).abs() < 1e-12));

        let closed = t
            .on_transaction(&TradeTransaction::deal_add(deal(61, DealEntry::Out, 1.10103, 10.0, "tp")))
            .await;
        let Some(LifecycleEvent::Closed(record)) = closed else {
            panic!("expected close event");
        };
        assert!((record.profit_loss_pips.unwrap() - 10.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_opening_without_intent_is_ignored() {
        let journal = Arc::new(RecordingJournal::default());
        let mut t = tracker(journal.clone(), Arc::new(InMemoryTransactionHistory::new()));

        let event = t
            .on_transaction(&TradeTransaction::deal_add(deal(9, DealEntry::In, 1.1, 0.0, "trend")))
            .await;
        assert!(event.is_none());
        assert_eq!(t.status(), None);
    }
}
