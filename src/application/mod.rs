// Feature collection, scoring and retraining records
pub mod ml;

// Confidence gating, lifecycle tracking and the per-strategy session
pub mod trading;
