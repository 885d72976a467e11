//! Broker transaction notifications as delivered by the host terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of transaction notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// A deal was appended to the account's deal list
    DealAdd,
    /// A deal or order migrated into account history
    HistoryAdd,
    OrderAdd,
    OrderUpdate,
    OrderDelete,
    PositionUpdate,
    Other,
}

/// Whether a deal opens or closes exposure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealEntry {
    In,
    Out,
    /// Reversal: closes the position and opens the opposite side
    InOut,
    /// Closed by an opposite position
    OutBy,
}

impl DealEntry {
    pub fn is_opening(&self) -> bool {
        matches!(self, DealEntry::In)
    }

    pub fn is_closing(&self) -> bool {
        matches!(self, DealEntry::Out | DealEntry::OutBy | DealEntry::InOut)
    }
}

/// Venue-reported reason a deal was executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealReason {
    Client,
    Mobile,
    Web,
    Expert,
    StopLoss,
    TakeProfit,
    StopOut,
    Other,
}

/// A single executed deal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealRecord {
    pub ticket: u64,
    pub position_id: u64,
    pub symbol: String,
    #[serde(default)]
    pub comment: String,
    pub entry: DealEntry,
    #[serde(default)]
    pub reason: Option<DealReason>,
    pub price: f64,
    pub volume: f64,
    #[serde(default)]
    pub profit: f64,
    #[serde(default)]
    pub swap: f64,
    #[serde(default)]
    pub commission: f64,
    pub time: DateTime<Utc>,
}

impl DealRecord {
    /// Profit including swap and commission
    pub fn net_profit(&self) -> f64 {
        self.profit + self.swap + self.commission
    }
}

/// One notification from the host's transaction event channel.
///
/// `DealAdd` notifications carry the deal; `HistoryAdd` notifications may carry
/// only the position id, in which case the deal must be looked up in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeTransaction {
    pub kind: TransactionKind,
    #[serde(default)]
    pub position_id: u64,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub deal: Option<DealRecord>,
}

impl TradeTransaction {
    pub fn deal_add(deal: DealRecord) -> Self {
        Self {
            kind: TransactionKind::DealAdd,
            position_id: deal.position_id,
            symbol: deal.symbol.clone(),
            deal: Some(deal),
        }
    }

    pub fn history_add(position_id: u64, symbol: impl Into<String>) -> Self {
        Self {
            kind: TransactionKind::HistoryAdd,
            position_id,
            symbol: symbol.into(),
            deal: None,
        }
    }

    /// Position identifier, preferring the one carried by the deal
    pub fn position_id(&self) -> u64 {
        self.deal
            .as_ref()
            .map(|d| d.position_id)
            .filter(|id| *id != 0)
            .unwrap_or(self.position_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_classification() {
        assert!(DealEntry::In.is_opening());
        assert!(!DealEntry::In.is_closing());
        assert!(DealEntry::Out.is_closing());
        assert!(DealEntry::OutBy.is_closing());
        assert!(DealEntry::InOut.is_closing());
    }

    #[test]
    fn test_parse_history_notification_without_deal() {
        let json = r#"{"kind":"history_add","position_id":555001,"symbol":"EURUSD"}"#;
        let tx: TradeTransaction = serde_json::from_str(json).expect("parse");
        assert_eq!(tx.kind, TransactionKind::HistoryAdd);
        assert_eq!(tx.position_id(), 555001);
        assert!(tx.deal.is_none());
    }
}
