use super::http_client_factory::{HttpClientFactory, join_url};
use crate::domain::errors::TransportError;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Request/response transport shared by the prediction client and the
/// retraining logger. Every call is a single attempt bounded by the client timeout.
#[derive(Clone)]
pub struct ServiceTransport {
    client: Client,
    base_url: String,
}

impl ServiceTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: HttpClientFactory::create_client(timeout),
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POSTs a JSON body and returns the response body of a 2xx reply.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<String, TransportError> {
        let response = self
            .client
            .post(join_url(&self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(Self::transport_failure)?;

        Self::read_body(response).await
    }

    /// GETs an endpoint and returns the response body of a 2xx reply.
    pub async fn get(&self, path: &str) -> Result<String, TransportError> {
        let response = self
            .client
            .get(join_url(&self.base_url, path))
            .send()
            .await
            .map_err(Self::transport_failure)?;

        Self::read_body(response).await
    }

    async fn read_body(response: reqwest::Response) -> Result<String, TransportError> {
        if let Some(err) = TransportError::from_status(response.status()) {
            return Err(err);
        }
        response.text().await.map_err(Self::transport_failure)
    }

    fn transport_failure(e: reqwest::Error) -> TransportError {
        TransportError::Transport {
            reason: if e.is_timeout() {
                "request timed out".to_string()
            } else if e.is_connect() {
                "connection failed".to_string()
            } else {
                e.to_string()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_host_is_transport_failure() {
        // Port 9 (discard) on localhost is expected to refuse connections
        let transport = ServiceTransport::new("http://127.0.0.1:9", Duration::from_millis(300));
        let result = transport.get("health").await;
        assert!(matches!(result, Err(TransportError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_status_codes_are_classified() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;
        let _m2 = server
            .mock("POST", "/predict")
            .with_status(503)
            .create_async()
            .await;

        let transport = ServiceTransport::new(server.url(), Duration::from_secs(2));

        assert_eq!(
            transport.get("missing").await,
            Err(TransportError::NotFound)
        );
        assert_eq!(
            transport.post_json("predict", &serde_json::json!({})).await,
            Err(TransportError::ServiceUnavailable { status: 503 })
        );
    }
}
