use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, LOCATION};
use reqwest::{Method, StatusCode};

pub mod api;
mod client;
pub mod config;
pub mod error;
mod store;

pub use api::{Document, DocumentDescriptor, Payload, StoreResult};
pub use client::HttpTransport;
pub use config::{StoreConfig, load_env_file};
pub use error::StoreError;
pub use store::DocumentStoreClient;

/// A request produced by the store client. `path` is relative to the
/// transport's base URL, e.g. `/cms/aperture/doc1?rev=3`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Bytes>,
    pub content_type: Option<String>,
}

#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn header(&self, name: impl reqwest::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn location(&self) -> Option<&str> {
        self.header(LOCATION)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE)
    }
}

/// HTTP capability the store client sends its requests through.
///
/// `Err` means no response was received at all; any response, including a
/// non-success status, comes back as `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> anyhow::Result<TransportResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, request: TransportRequest) -> anyhow::Result<TransportResponse> {
        (**self).send(request).await
    }
}

/// Sink for precondition violations detected before any request is made.
pub trait Logger: Send + Sync {
    fn error(&self, message: &str);
}

/// Default logger, forwards to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }
}
