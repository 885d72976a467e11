pub mod lifecycle;
pub mod transaction;
pub mod types;

pub use lifecycle::{
    ExitReason, LifecycleStatus, PendingTradeIntent, TradeClose, TradeLifecycleRecord,
};
pub use transaction::{DealEntry, DealReason, DealRecord, TradeTransaction, TransactionKind};
pub use types::{Candle, InstrumentSpec, TradeDirection};
