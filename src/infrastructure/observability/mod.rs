//! Pull-free observability for tradegate
//!
//! Metrics are kept in an in-process Prometheus registry and rendered as text on
//! demand. There is no HTTP server: the host decides where the text goes.

pub mod metrics;

pub use metrics::Metrics;
