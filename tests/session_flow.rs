//! Full decision path through a `TradingSession`: features from bars, scoring,
//! gating, intent submission and reconciliation from deal history.

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tradegate::application::trading::{LifecycleEvent, TradeProposal, TradingSession};
use tradegate::config::Config;
use tradegate::domain::ml::{FeatureVector, Prediction};
use tradegate::domain::ports::AnalyticsSink;
use tradegate::domain::trading::{
    Candle, DealEntry, DealRecord, ExitReason, TradeDirection, TradeLifecycleRecord,
    TradeTransaction,
};
use tradegate::infrastructure::{CandleMarketSource, InMemoryTransactionHistory, Metrics};

#[derive(Default)]
struct CountingSink {
    events: Mutex<Vec<&'static str>>,
}

impl AnalyticsSink for CountingSink {
    fn on_open(&self, _record: &TradeLifecycleRecord) {
        self.events.lock().unwrap().push("open");
    }
    fn on_exit(&self, _record: &TradeLifecycleRecord) {
        self.events.lock().unwrap().push("exit");
    }
    fn on_market_conditions(&self, features: &FeatureVector) {
        assert!(features.is_valid());
        self.events.lock().unwrap().push("market");
    }
    fn on_prediction(&self, _prediction: &Prediction) {
        self.events.lock().unwrap().push("prediction");
    }
}

fn bars() -> Vec<Candle> {
    let t0 = Utc.with_ymd_and_hms(2024, 5, 6, 0, 0, 0).unwrap();
    (0..100)
        .map(|i| {
            let close = 1.0800 + (i as f64 * 0.3).sin() * 0.002 + i as f64 * 0.0001;
            Candle {
                time: t0 + ChronoDuration::hours(i),
                open: close - 0.0003,
                high: close + 0.0006,
                low: close - 0.0006,
                close,
                volume: 800.0 + (i % 10) as f64 * 40.0,
            }
        })
        .collect()
}

fn config(url: &str) -> Config {
    let mut config = Config::default();
    config.prediction.service_url = url.to_string();
    config.prediction.analytics_url = url.to_string();
    config.prediction.timeout = Duration::from_secs(2);
    config.session.strategy_name = "meanrev".to_string();
    config.session.comment_tag = "meanrev".to_string();
    config
}

fn deal(entry: DealEntry, price: f64, profit: f64, minutes: i64) -> DealRecord {
    DealRecord {
        ticket: 70 + minutes as u64,
        position_id: 8_812_345,
        symbol: "EURUSD".to_string(),
        comment: "meanrev".to_string(),
        entry,
        reason: None,
        price,
        volume: 0.12,
        profit,
        swap: -0.3,
        commission: -0.5,
        time: Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap() + ChronoDuration::minutes(minutes),
    }
}

#[tokio::test]
async fn test_accepted_decision_flows_into_lifecycle() {
    let mut server = mockito::Server::new_async().await;
    let _health = server
        .mock("GET", "/health")
        .with_status(200)
        .with_body(r#"{"status":"healthy"}"#)
        .create_async()
        .await;
    let _predict = server
        .mock("POST", "/predict")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"success","prediction":{"direction":"buy","probability":0.8,"confidence":0.75,"model_type":"rf","model_key":"EURUSD_H1"}}"#)
        .create_async()
        .await;
    let trades = server
        .mock("POST", "/trades")
        .with_status(200)
        .expect(2)
        .create_async()
        .await;

    let history = Arc::new(InMemoryTransactionHistory::new());
    let sink = Arc::new(CountingSink::default());
    let metrics = Metrics::new().expect("metrics");
    let mut session = TradingSession::new(
        &config(&server.url()),
        Arc::new(CandleMarketSource::new(bars())),
        history.clone(),
        Some(metrics.clone()),
    )
    .with_sink(sink.clone());

    let decision = session
        .evaluate(TradeProposal {
            direction: TradeDirection::Buy,
            entry_price: 1.0900,
            stop_loss: 1.0850,
            take_profit: 1.1000,
            lot_size: 0.10,
        })
        .await;

    assert!(decision.accepted);
    assert!(decision.features.is_valid());
    assert!((decision.lot_size - 0.12).abs() < 1e-12);
    // Stop distance 0.0050 widened by 1.05, still below entry
    assert!(decision.stop_loss < 1.0900);
    assert!((decision.stop_loss - (1.0900 - 0.0050 * 1.05)).abs() < 1e-9);
    assert!(session.submit(&decision));

    let open_deal = deal(DealEntry::In, 1.0901, 0.0, 0);
    history.record(open_deal.clone());
    let opened = session
        .on_transaction(&TradeTransaction::deal_add(open_deal))
        .await;
    assert!(matches!(opened, Some(LifecycleEvent::Opened(_))));

    // Close arrives only as a history migration
    history.record(deal(DealEntry::Out, 1.0950, 5.8, 90));
    let closed = session
        .on_transaction(&TradeTransaction::history_add(8_812_345, "EURUSD"))
        .await;
    let Some(LifecycleEvent::Closed(record)) = closed else {
        panic!("expected a close event");
    };
    assert_eq!(record.exit_reason, Some(ExitReason::TakeProfit));
    assert!((record.profit_loss.unwrap_or_default() - 5.0).abs() < 1e-9);

    trades.assert_async().await;
    assert_eq!(
        *sink.events.lock().unwrap(),
        vec!["market", "prediction", "open", "exit"]
    );
    assert_eq!(
        metrics.gate_decisions_total.with_label_values(&["accepted"]).get(),
        1.0
    );
    assert!(metrics.render().contains("tradegate_lifecycle_events_total"));
}

#[tokio::test]
async fn test_service_loss_degrades_to_rejection() {
    let mut session = TradingSession::new(
        &config("http://127.0.0.1:9"),
        Arc::new(CandleMarketSource::new(bars())),
        Arc::new(InMemoryTransactionHistory::new()),
        None,
    );

    let decision = session
        .evaluate(TradeProposal {
            direction: TradeDirection::Sell,
            entry_price: 1.0900,
            stop_loss: 1.0950,
            take_profit: 1.0800,
            lot_size: 0.10,
        })
        .await;

    assert!(!decision.accepted);
    assert_eq!(decision.lot_size, 0.10);
    assert_eq!(decision.stop_loss, 1.0950);
    assert!(!session.submit(&decision));
    assert_eq!(
        session.client().last_prediction().and_then(|p| p.error.clone()),
        Some("service not connected".to_string())
    );
}
