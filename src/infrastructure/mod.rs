pub mod core;
pub mod observability;
pub mod persistence;
pub mod repositories;

pub use self::core::{HttpClientFactory, ServiceTransport};
pub use observability::Metrics;
pub use repositories::{CandleMarketSource, InMemoryTransactionHistory};
