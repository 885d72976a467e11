// Domain-specific error types
pub mod errors;

// Feature vectors and predictions
pub mod ml;

// Port interfaces
pub mod ports;

// Trades, deals and lifecycle records
pub mod trading;
