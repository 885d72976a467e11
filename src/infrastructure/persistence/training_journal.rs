//! Local CSV copy of retraining records.
//!
//! One row per lifecycle event. Open rows carry the entry, prediction and feature
//! columns; close rows carry the outcome columns. Columns that do not apply to a
//! row are left empty.

use crate::domain::ml::FEATURE_NAMES;
use crate::domain::trading::{TradeClose, TradeLifecycleRecord};
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;

const LEADING_COLUMNS: &[&str] = &[
    "event",
    "trade_id",
    "strategy",
    "symbol",
    "timeframe",
    "time",
    "direction",
    "entry_price",
    "stop_loss",
    "take_profit",
    "lot_size",
    "ml_prediction",
    "ml_confidence",
    "ml_model_type",
    "ml_model_key",
];

const TRAILING_COLUMNS: &[&str] = &[
    "close_price",
    "profit_loss",
    "profit_loss_pips",
    "exit_reason",
];

pub struct CsvTrainingJournal {
    output_path: PathBuf,
    strategy: String,
    symbol: String,
    timeframe: String,
}

impl CsvTrainingJournal {
    pub fn new(
        output_path: PathBuf,
        strategy: impl Into<String>,
        symbol: impl Into<String>,
        timeframe: impl Into<String>,
    ) -> Self {
        Self {
            output_path,
            strategy: strategy.into(),
            symbol: symbol.into(),
            timeframe: timeframe.into(),
        }
    }

    pub fn header() -> Vec<&'static str> {
        LEADING_COLUMNS
            .iter()
            .chain(FEATURE_NAMES.iter())
            .chain(TRAILING_COLUMNS.iter())
            .copied()
            .collect()
    }

    pub fn append_open(&self, record: &TradeLifecycleRecord) -> Result<()> {
        let mut row = vec![
            "OPEN".to_string(),
            record.trade_id.to_string(),
            self.strategy.clone(),
            self.symbol.clone(),
            self.timeframe.clone(),
            record.open_time.timestamp().to_string(),
            record.direction.to_string(),
            record.entry_price.to_string(),
            record.stop_loss.to_string(),
            record.take_profit.to_string(),
            record.lot_size.to_string(),
            record.prediction.direction.to_string(),
            record.prediction.confidence.to_string(),
            record.prediction.model_type.clone(),
            record.prediction.model_key.clone(),
        ];
        row.extend(record.features.to_f64_vector().iter().map(f64::to_string));
        row.extend(TRAILING_COLUMNS.iter().map(|_| String::new()));
        self.write_row(&row)
    }

    pub fn append_close(&self, close: &TradeClose) -> Result<()> {
        let mut row = vec![
            "CLOSED".to_string(),
            close.trade_id.to_string(),
            self.strategy.clone(),
            self.symbol.clone(),
            self.timeframe.clone(),
            close.close_time.timestamp().to_string(),
        ];
        row.extend((row.len()..LEADING_COLUMNS.len()).map(|_| String::new()));
        row.extend(FEATURE_NAMES.iter().map(|_| String::new()));
        row.extend([
            close.close_price.to_string(),
            close.profit_loss.to_string(),
            close.profit_loss_pips.to_string(),
            close.exit_reason.to_string(),
        ]);
        self.write_row(&row)
    }

    fn write_row(&self, row: &[String]) -> Result<()> {
        let file_exists = self.output_path.exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.output_path)
            .with_context(|| format!("Failed to open training journal {:?}", self.output_path))?;

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if !file_exists {
            wtr.write_record(Self::header())
                .context("Failed to write training journal header")?;
        }
        wtr.write_record(row)
            .context("Failed to write training journal row")?;
        wtr.flush().context("Failed to flush training journal")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ml::{FeatureVector, Prediction, SignalDirection};
    use crate::domain::trading::{ExitReason, PendingTradeIntent, TradeDirection};
    use chrono::Utc;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tradegate_{}_{}.csv", name, std::process::id()))
    }

    #[test]
    fn test_open_and_close_rows_share_header() {
        let path = temp_path("journal");
        let _ = std::fs::remove_file(&path);
        let journal = CsvTrainingJournal::new(path.clone(), "trend", "EURUSD", "H1");

        let intent = PendingTradeIntent {
            direction: TradeDirection::Buy,
            entry_price: 1.1,
            stop_loss: 1.095,
            take_profit: 1.11,
            lot_size: 0.1,
            features: FeatureVector::fallback(1.1),
            prediction: Prediction::scored(SignalDirection::Buy, 0.7, 0.66, "rf", "EURUSD_H1"),
            submitted_at: Utc::now(),
        };
        let record = TradeLifecycleRecord::open(intent, 555001, Utc::now());
        journal.append_open(&record).expect("open row");
        journal
            .append_close(&TradeClose {
                trade_id: 555001,
                close_price: 1.11,
                profit_loss: 12.5,
                profit_loss_pips: 100.0,
                close_time: Utc::now(),
                exit_reason: ExitReason::TakeProfit,
            })
            .expect("close row");

        let mut reader = csv::Reader::from_path(&path).expect("reader");
        let header = reader.headers().expect("headers").clone();
        assert_eq!(header.len(), CsvTrainingJournal::header().len());

        let rows: Vec<csv::StringRecord> = reader.records().filter_map(|r| r.ok()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "OPEN");
        assert_eq!(&rows[0][1], "555001");
        assert_eq!(&rows[1][0], "CLOSED");
        assert_eq!(rows[1].get(header.len() - 1), Some("take_profit"));
        assert_eq!(rows[1].len(), header.len());

        let _ = std::fs::remove_file(&path);
    }
}
