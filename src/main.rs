//! tradegate - ML-gated trade decisions and lifecycle reconciliation
//!
//! Operator tool around the library: checks the scoring service, scores a bar
//! file through the full decision path, and replays recorded broker
//! notifications through a lifecycle tracker.
//!
//! # Usage
//! ```sh
//! ML_SERVICE_URL=http://127.0.0.1:5000 tradegate health
//! tradegate predict --bars data/eurusd_h1.csv --direction buy --stop-loss 1.0950
//! tradegate replay --events data/transactions.jsonl --dry-run
//! ```
//!
//! Configuration is read from the environment (and `.env`), see `config`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use tradegate::application::ml::PredictionClient;
use tradegate::application::trading::{LifecycleEvent, TradeProposal, TradingSession};
use tradegate::config::{Config, LogFormat};
use tradegate::domain::ml::{FeatureVector, Prediction};
use tradegate::domain::ports::TradeJournal;
use tradegate::domain::trading::{
    Candle, PendingTradeIntent, TradeClose, TradeDirection, TradeLifecycleRecord,
    TradeTransaction, TransactionKind,
};
use tradegate::infrastructure::{CandleMarketSource, InMemoryTransactionHistory, Metrics};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Override ML_SERVICE_URL
    #[arg(long, global = true)]
    service_url: Option<String>,

    /// Print Prometheus metrics after the command
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check scoring service connectivity
    Health,
    /// Collect features from a bar file and run the decision path
    Predict {
        /// CSV of OHLCV bars (time,open,high,low,close,volume), oldest first
        #[arg(short, long)]
        bars: PathBuf,

        #[arg(short, long, default_value = "buy")]
        direction: TradeDirection,

        /// Entry price (defaults to the last close)
        #[arg(long)]
        entry: Option<f64>,

        #[arg(long, default_value = "0")]
        stop_loss: f64,

        #[arg(long, default_value = "0")]
        take_profit: f64,

        #[arg(short, long, default_value = "0.1")]
        lot: f64,
    },
    /// Feed recorded transaction notifications through a lifecycle tracker
    Replay {
        /// JSON Lines file, one transaction notification per line
        #[arg(short, long)]
        events: PathBuf,

        /// Direction of the pending intent submitted before replay
        #[arg(short, long, default_value = "buy")]
        direction: TradeDirection,

        #[arg(long)]
        entry: f64,

        #[arg(long, default_value = "0")]
        stop_loss: f64,

        #[arg(long, default_value = "0")]
        take_profit: f64,

        #[arg(short, long, default_value = "0.1")]
        lot: f64,

        /// Print records instead of posting them to the analytics sink
        #[arg(long)]
        dry_run: bool,
    },
}

/// Journal that prints records as JSON lines
struct StdoutJournal;

#[async_trait]
impl TradeJournal for StdoutJournal {
    async fn log_open(&self, record: &TradeLifecycleRecord) {
        match serde_json::to_string(record) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Replay: Failed to serialize open record: {}", e),
        }
    }

    async fn log_close(&self, close: &TradeClose) {
        match serde_json::to_string(close) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Replay: Failed to serialize close record: {}", e),
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::from_default_env().add_directive(Level::INFO.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

fn read_bars(path: &Path) -> Result<Vec<Candle>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("Failed to open bars {:?}", path))?;
    let mut bars = Vec::new();
    for (i, row) in reader.deserialize::<Candle>().enumerate() {
        bars.push(row.with_context(|| format!("Invalid bar on row {}", i + 1))?);
    }
    Ok(bars)
}

fn read_events(path: &Path) -> Result<Vec<TradeTransaction>> {
    let file = File::open(path).with_context(|| format!("Failed to open events {:?}", path))?;
    let mut events = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.context("Failed to read events file")?;
        if line.trim().is_empty() {
            continue;
        }
        let tx: TradeTransaction = serde_json::from_str(&line)
            .with_context(|| format!("Invalid transaction on line {}", i + 1))?;
        events.push(tx);
    }
    Ok(events)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(url) = cli.service_url {
        config.prediction.service_url = url.trim_end_matches('/').to_string();
        config.validate()?;
    }
    init_tracing(config.observability.log_format);

    let metrics = if config.observability.enabled || cli.metrics {
        Some(Metrics::new()?)
    } else {
        None
    };

    info!(
        "tradegate {} [{} {} / {}]",
        env!("CARGO_PKG_VERSION"),
        config.session.strategy_name,
        config.session.symbol,
        config.session.timeframe
    );

    match cli.command {
        Commands::Health => {
            let mut client = PredictionClient::new(&config.prediction, &config.session);
            let healthy = client.check_connection().await;
            println!(
                "{} {}",
                config.prediction.service_url,
                if healthy { "healthy" } else { "unreachable" }
            );
            if !healthy {
                std::process::exit(1);
            }
        }
        Commands::Predict {
            bars,
            direction,
            entry,
            stop_loss,
            take_profit,
            lot,
        } => {
            let candles = read_bars(&bars)?;
            let last_close = candles.last().map(|c| c.close).unwrap_or(0.0);
            info!("Predict: Loaded {} bars from {:?}", candles.len(), bars);

            let mut session = TradingSession::new(
                &config,
                Arc::new(CandleMarketSource::new(candles)),
                Arc::new(InMemoryTransactionHistory::new()),
                metrics.clone(),
            );
            let decision = session
                .evaluate(TradeProposal {
                    direction,
                    entry_price: entry.unwrap_or(last_close),
                    stop_loss,
                    take_profit,
                    lot_size: lot,
                })
                .await;
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
        Commands::Replay {
            events,
            direction,
            entry,
            stop_loss,
            take_profit,
            lot,
            dry_run,
        } => {
            let transactions = read_events(&events)?;
            let history = Arc::new(InMemoryTransactionHistory::new());
            let source = Arc::new(CandleMarketSource::default());

            let mut session = if dry_run {
                TradingSession::with_journal(&config, source, history.clone(), Arc::new(StdoutJournal))
            } else {
                TradingSession::new(&config, source, history.clone(), metrics.clone())
            };

            session.submit_intent(PendingTradeIntent {
                direction,
                entry_price: entry,
                stop_loss,
                take_profit,
                lot_size: lot,
                features: FeatureVector::fallback(entry),
                prediction: Prediction::invalid("replayed without prediction"),
                submitted_at: chrono::Utc::now(),
            });

            let (mut opened, mut closed) = (0usize, 0usize);
            for tx in &transactions {
                if tx.kind == TransactionKind::DealAdd
                    && let Some(deal) = &tx.deal
                {
                    history.record(deal.clone());
                }
                match session.on_transaction(tx).await {
                    Some(LifecycleEvent::Opened(_)) => opened += 1,
                    Some(LifecycleEvent::Closed(_)) => closed += 1,
                    None => {}
                }
            }
            info!(
                "Replay: {} notifications, {} opened, {} closed, {} lost intents",
                transactions.len(),
                opened,
                closed,
                session.tracker().lost_intents()
            );
        }
    }

    if cli.metrics
        && let Some(metrics) = &metrics
    {
        print!("{}", metrics.render());
    }

    Ok(())
}
