use std::sync::Arc;

use bytes::Bytes;
use reqwest::Method;
use tokio::task::JoinHandle;
use tracing::{Level, event, instrument};

use crate::api::{Document, DocumentDescriptor, Payload, StoreResponse, StoreResult};
use crate::client::HttpTransport;
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::{Logger, TracingLogger, Transport, TransportRequest, TransportResponse};

/// Client for a revision-aware document store.
///
/// Requests follow a fixed grammar under the configured base path:
///
/// ```text
/// POST   <base>/<store>[/<id>][?rev=<rev>]
/// GET    <base>/<store>/<id>[?rev=<rev>]
/// DELETE <base>/<store>/<id>[?rev=<rev>]
/// ```
///
/// The client keeps no per-call state, so clones and concurrent calls are
/// independent of each other.
pub struct DocumentStoreClient<T, L = TracingLogger> {
    transport: Arc<T>,
    logger: Arc<L>,
    config: Arc<StoreConfig>,
}

impl<T, L> Clone for DocumentStoreClient<T, L> {
    fn clone(&self) -> Self {
        DocumentStoreClient {
            transport: self.transport.clone(),
            logger: self.logger.clone(),
            config: self.config.clone(),
        }
    }
}

impl<T: Transport> DocumentStoreClient<T, TracingLogger> {
    pub fn new(transport: T, config: StoreConfig) -> Self {
        Self::with_logger(transport, TracingLogger, config)
    }
}

impl DocumentStoreClient<HttpTransport, TracingLogger> {
    /// Client talking HTTP to `config.base_url`.
    pub fn from_config(config: StoreConfig) -> Self {
        let config = config.normalized();
        Self::new(HttpTransport::new(&config.base_url), config)
    }
}

impl<T: Transport, L: Logger> DocumentStoreClient<T, L> {
    pub fn with_logger(transport: T, logger: L, config: StoreConfig) -> Self {
        DocumentStoreClient {
            transport: Arc::new(transport),
            logger: Arc::new(logger),
            config: Arc::new(config.normalized()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Content type sent with `data`: the descriptor's override if set,
    /// otherwise inferred from the payload.
    pub fn resolve_content_type(data: &Payload, descriptor: &DocumentDescriptor) -> String {
        descriptor
            .present_content_type()
            .unwrap_or_else(|| data.content_type())
            .to_string()
    }

    /// Path a store request for `descriptor` is posted to. The id segment is
    /// optional here; without it the backend assigns one.
    pub fn store_url(&self, descriptor: &DocumentDescriptor) -> String {
        self.document_path(
            descriptor.resolved_store(&self.config.default_store),
            descriptor.present_id(),
            descriptor.present_rev(),
        )
    }

    /// Path of an existing document. Without a descriptor or an id this logs
    /// an error and returns `None`.
    pub fn get_url(&self, descriptor: Option<&DocumentDescriptor>) -> Option<String> {
        self.require_url("get", descriptor).ok()
    }

    fn require_url(
        &self,
        operation: &'static str,
        descriptor: Option<&DocumentDescriptor>,
    ) -> Result<String, StoreError> {
        let Some((descriptor, id)) = descriptor.and_then(|d| d.present_id().map(|id| (d, id)))
        else {
            let err = StoreError::MissingId(operation);
            self.logger.error(&err.to_string());
            return Err(err);
        };

        Ok(self.document_path(
            descriptor.resolved_store(&self.config.default_store),
            Some(id),
            descriptor.present_rev(),
        ))
    }

    fn document_path(&self, store: &str, id: Option<&str>, rev: Option<&str>) -> String {
        let mut path = format!("{}/{}", self.config.base_path, store);
        if let Some(id) = id {
            path.push('/');
            path.push_str(id);
        }
        if let Some(rev) = rev {
            path.push_str("?rev=");
            path.push_str(rev);
        }
        path
    }

    /// Store `data`, creating a document or, given a matching `rev`, updating one.
    #[instrument(level = "info", skip(self, data))]
    pub async fn store(
        &self,
        data: impl Into<Payload>,
        descriptor: Option<&DocumentDescriptor>,
    ) -> Result<StoreResult, StoreError> {
        let data = data.into();
        let defaults = DocumentDescriptor::default();
        let descriptor = descriptor.unwrap_or(&defaults);
        let store = descriptor.resolved_store(&self.config.default_store);

        let request = TransportRequest {
            method: Method::POST,
            path: self.store_url(descriptor),
            content_type: Some(Self::resolve_content_type(&data, descriptor)),
            body: Some(Bytes::from(data.to_body()?)),
        };

        let response = self.dispatch(request).await?;
        let url = response.location().map(str::to_string);
        let stored = StoreResponse::from_body(&response.body);

        Ok(StoreResult {
            id: stored.id.or_else(|| descriptor.present_id().map(str::to_string)),
            rev: stored.rev.or_else(|| descriptor.present_rev().map(str::to_string)),
            store: stored.store.unwrap_or_else(|| store.to_string()),
            url,
        })
    }

    /// Fetch a document. The descriptor is only read, never updated.
    #[instrument(level = "info", skip(self))]
    pub async fn get(&self, descriptor: Option<&DocumentDescriptor>) -> Result<Document, StoreError> {
        let path = self.require_url("get", descriptor)?;
        let response = self
            .dispatch(TransportRequest {
                method: Method::GET,
                path,
                body: None,
                content_type: None,
            })
            .await?;

        Document::from_body(response.content_type().map(str::to_string), &response.body)
    }

    /// Delete a document; `rev` guards against deleting a newer revision.
    #[instrument(level = "info", skip(self))]
    pub async fn delete(&self, descriptor: Option<&DocumentDescriptor>) -> Result<(), StoreError> {
        let path = self.require_url("delete", descriptor)?;
        self.dispatch(TransportRequest {
            method: Method::DELETE,
            path,
            body: None,
            content_type: None,
        })
        .await?;
        Ok(())
    }

    async fn dispatch(&self, request: TransportRequest) -> Result<TransportResponse, StoreError> {
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            event!(Level::WARN, status = %response.status, "request failed");
            return Err(StoreError::Status {
                status: response.status,
                body: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }
        Ok(response)
    }
}

impl<T, L> DocumentStoreClient<T, L>
where
    T: Transport + 'static,
    L: Logger + 'static,
{
    /// Run `store` on the tokio runtime and hand its outcome to
    /// `on_complete` exactly once. With `None` the request is fire-and-forget.
    pub fn spawn_store<F>(
        &self,
        data: impl Into<Payload>,
        descriptor: Option<DocumentDescriptor>,
        on_complete: Option<F>,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Result<StoreResult, StoreError>) + Send + 'static,
    {
        let client = self.clone();
        let data = data.into();
        tokio::spawn(async move {
            let result = client.store(data, descriptor.as_ref()).await;
            if let Some(on_complete) = on_complete {
                on_complete(result);
            }
        })
    }

    /// Run `get` on the tokio runtime; `on_complete` receives the outcome
    /// together with the caller's descriptor.
    pub fn spawn_get<F>(
        &self,
        descriptor: Option<DocumentDescriptor>,
        on_complete: Option<F>,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Result<Document, StoreError>, Option<DocumentDescriptor>) + Send + 'static,
    {
        let client = self.clone();
        tokio::spawn(async move {
            let result = client.get(descriptor.as_ref()).await;
            if let Some(on_complete) = on_complete {
                on_complete(result, descriptor);
            }
        })
    }
}
