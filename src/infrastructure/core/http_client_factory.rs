use reqwest::Client;
use std::time::Duration;
use tracing::warn;

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// Creates an HTTP client bounded by `timeout` for the whole request.
    ///
    /// No retry middleware: a failed call is reported to the caller, who may try
    /// again on the next triggering event.
    pub fn create_client(timeout: Duration) -> Client {
        Client::builder()
            .pool_max_idle_per_host(2)
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .unwrap_or_else(|e| {
                warn!("HttpClientFactory: Failed to build client ({}), using defaults", e);
                Client::new()
            })
    }
}

/// Joins a base URL and an endpoint path with exactly one slash between them.
pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("http://localhost:5000/", "/predict"),
            "http://localhost:5000/predict"
        );
        assert_eq!(
            join_url("http://localhost:5000", "health"),
            "http://localhost:5000/health"
        );
    }
}
