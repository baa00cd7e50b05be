use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{Level, event, instrument};

use crate::{Transport, TransportRequest, TransportResponse};

/// `Transport` backed by a `reqwest::Client`. Request paths are appended to
/// `base_url` verbatim.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        HttpTransport {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn with_headers(base_url: &str, headers: HeaderMap) -> anyhow::Result<Self> {
        Ok(HttpTransport {
            client: reqwest::Client::builder().default_headers(headers).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(level = "debug", skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn send(&self, request: TransportRequest) -> anyhow::Result<TransportResponse> {
        let url = self.url_for(&request.path);
        let mut builder = self.client.request(request.method, &url);
        if let Some(content_type) = request.content_type {
            builder = builder.header(CONTENT_TYPE, HeaderValue::from_str(&content_type)?);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        event!(Level::DEBUG, status = %status, bytes = body.len());

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
