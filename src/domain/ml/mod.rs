pub mod feature_registry;
pub mod prediction;

pub use feature_registry::{FEATURE_NAMES, FeatureVector};
pub use prediction::{Prediction, SignalDirection};
