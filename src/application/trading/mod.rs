pub mod confidence_gate;
pub mod lifecycle_tracker;
pub mod session;

pub use confidence_gate::ConfidenceGate;
pub use lifecycle_tracker::{LifecycleEvent, TradeLifecycleTracker};
pub use session::{TradeDecision, TradeProposal, TradingSession};
