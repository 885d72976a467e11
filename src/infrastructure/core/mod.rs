pub mod http_client_factory;
pub mod service_transport;

pub use http_client_factory::HttpClientFactory;
pub use service_transport::ServiceTransport;
