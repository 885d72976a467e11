pub mod feature_collector;
pub mod prediction_client;
pub mod retraining_logger;

pub use feature_collector::{FeatureCollector, IndicatorPeriods};
pub use prediction_client::{PredictionClient, PredictionRequest};
pub use retraining_logger::RetrainingLogger;
