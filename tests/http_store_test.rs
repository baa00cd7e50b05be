//! End-to-end tests: a small in-process content service built on axum,
//! exercised through `HttpTransport` and `DocumentStoreClient`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use docstore::{DocumentDescriptor, DocumentStoreClient, HttpTransport, StoreConfig, StoreError};
use serde::Deserialize;
use serde_json::json;

struct StoredDocument {
    rev: u64,
    content_type: String,
    body: Bytes,
}

#[derive(Default)]
struct Cms {
    docs: Mutex<HashMap<(String, String), StoredDocument>>,
    next_id: AtomicU64,
    last_api_key: Mutex<Option<String>>,
}

#[derive(Deserialize)]
struct RevQuery {
    rev: Option<String>,
}

impl Cms {
    fn put(
        &self,
        store: String,
        id: String,
        rev: Option<String>,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Response {
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        *self.last_api_key.lock().unwrap() = headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut docs = self.docs.lock().unwrap();
        let key = (store.clone(), id.clone());
        let next = match (docs.get(&key).map(|d| d.rev), rev) {
            (None, _) => 1,
            (Some(current), Some(rev)) if rev == current.to_string() => current + 1,
            (Some(_), _) => return (StatusCode::CONFLICT, "stale revision").into_response(),
        };
        docs.insert(
            key,
            StoredDocument {
                rev: next,
                content_type,
                body,
            },
        );

        let location = format!("/cms/{}/{}", store, id);
        (
            StatusCode::CREATED,
            [(LOCATION, location)],
            axum::Json(json!({ "id": id, "rev": next.to_string(), "store": store })),
        )
            .into_response()
    }
}

async fn create(
    State(cms): State<Arc<Cms>>,
    Path(store): Path<String>,
    Query(query): Query<RevQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let id = format!("doc-{}", cms.next_id.fetch_add(1, Ordering::SeqCst) + 1);
    cms.put(store, id, query.rev, &headers, body)
}

async fn update(
    State(cms): State<Arc<Cms>>,
    Path((store, id)): Path<(String, String)>,
    Query(query): Query<RevQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    cms.put(store, id, query.rev, &headers, body)
}

async fn fetch(
    State(cms): State<Arc<Cms>>,
    Path((store, id)): Path<(String, String)>,
    Query(query): Query<RevQuery>,
) -> Response {
    let docs = cms.docs.lock().unwrap();
    match docs.get(&(store, id)) {
        Some(doc) if query.rev.as_deref().is_none_or(|rev| rev == doc.rev.to_string()) => (
            StatusCode::OK,
            [(CONTENT_TYPE, doc.content_type.clone())],
            doc.body.clone(),
        )
            .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn remove(
    State(cms): State<Arc<Cms>>,
    Path((store, id)): Path<(String, String)>,
    Query(query): Query<RevQuery>,
) -> Response {
    let mut docs = cms.docs.lock().unwrap();
    let key = (store, id);
    match (docs.get(&key).map(|d| d.rev), query.rev) {
        (None, _) => StatusCode::NOT_FOUND.into_response(),
        (Some(current), Some(rev)) if rev != current.to_string() => {
            StatusCode::CONFLICT.into_response()
        }
        _ => {
            docs.remove(&key);
            StatusCode::NO_CONTENT.into_response()
        }
    }
}

/// Bind to port 0 and return the actual address.
async fn start_server() -> String {
    start_server_with(Arc::new(Cms::default())).await
}

async fn start_server_with(cms: Arc<Cms>) -> String {
    let app = Router::new()
        .route("/cms/:store", post(create))
        .route("/cms/:store/:id", post(update).get(fetch).delete(remove))
        .with_state(cms);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn client() -> DocumentStoreClient<HttpTransport> {
    let base = start_server().await;
    DocumentStoreClient::from_config(StoreConfig::default().with_base_url(base))
}

#[tokio::test]
async fn store_and_get_text() {
    let client = client().await;

    let stored = client
        .store("hello", Some(&DocumentDescriptor::with_id("greeting")))
        .await
        .unwrap();
    assert_eq!(stored.id.as_deref(), Some("greeting"));
    assert_eq!(stored.rev.as_deref(), Some("1"));
    assert_eq!(stored.store, "aperture");
    assert_eq!(stored.url.as_deref(), Some("/cms/aperture/greeting"));

    let descriptor = DocumentDescriptor::with_id("greeting");
    let document = client.get(Some(&descriptor)).await.unwrap();
    assert_eq!(document.as_text(), Some("hello"));
    assert_eq!(document.content_type.as_deref(), Some("text/plain"));
    assert_eq!(descriptor, DocumentDescriptor::with_id("greeting"));
}

#[tokio::test]
async fn store_json_assigns_id() {
    let client = client().await;

    let stored = client.store(json!({"a": 1}), None).await.unwrap();
    assert_eq!(stored.id.as_deref(), Some("doc-1"));
    assert_eq!(stored.store, "aperture");

    let document = client.get(Some(&stored.descriptor())).await.unwrap();
    assert_eq!(document.as_json(), Some(&json!({"a": 1})));
}

#[tokio::test]
async fn update_requires_current_revision() {
    let client = client().await;
    let descriptor = DocumentDescriptor::with_id("report").store("reports");

    let first = client.store("v1", Some(&descriptor)).await.unwrap();
    assert_eq!(first.store, "reports");

    let err = client.store("v2", Some(&descriptor)).await.unwrap_err();
    assert!(err.is_conflict());

    let second = client
        .store("v2", Some(&first.descriptor()))
        .await
        .unwrap();
    assert_eq!(second.rev.as_deref(), Some("2"));

    let old = client.get(Some(&first.descriptor())).await.unwrap_err();
    assert!(old.is_not_found());

    let latest = client.get(Some(&descriptor)).await.unwrap();
    assert_eq!(latest.as_text(), Some("v2"));
}

#[tokio::test]
async fn explicit_content_type_wins() {
    let client = client().await;
    let descriptor = DocumentDescriptor::with_id("table").content_type("text/csv");

    client.store("a,b\n1,2\n", Some(&descriptor)).await.unwrap();

    let document = client.get(Some(&descriptor)).await.unwrap();
    assert_eq!(document.content_type.as_deref(), Some("text/csv"));
    assert_eq!(document.as_text(), Some("a,b\n1,2\n"));
}

#[tokio::test]
async fn delete_document() {
    let client = client().await;
    let stored = client
        .store("bye", Some(&DocumentDescriptor::with_id("temp")))
        .await
        .unwrap();

    client.delete(Some(&stored.descriptor())).await.unwrap();

    let err = client
        .get(Some(&DocumentDescriptor::with_id("temp")))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn concurrent_stores_are_independent() {
    let client = client().await;

    let other = DocumentDescriptor::new().store("other");
    let (a, b, c) = tokio::join!(
        client.store("a", None),
        client.store(json!({"b": true}), None),
        client.store("c", Some(&other)),
    );
    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

    let mut ids = vec![a.id, b.id, c.id];
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
    assert_eq!(c.store, "other");
}

#[tokio::test]
async fn spawned_get_reports_through_callback() {
    let client = client().await;
    client
        .store("payload", Some(&DocumentDescriptor::with_id("cb")))
        .await
        .unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel();
    client.spawn_get(
        Some(DocumentDescriptor::with_id("cb")),
        Some(
            move |result: Result<docstore::Document, StoreError>,
                  descriptor: Option<DocumentDescriptor>| {
                let _ = tx.send((result, descriptor));
            },
        ),
    );

    let (result, descriptor) = rx.await.unwrap();
    assert_eq!(result.unwrap().as_text(), Some("payload"));
    assert_eq!(descriptor, Some(DocumentDescriptor::with_id("cb")));
}

#[tokio::test]
async fn unreachable_server_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = DocumentStoreClient::from_config(
        StoreConfig::default().with_base_url(format!("http://{addr}")),
    );
    let err = client.store("lost", None).await.unwrap_err();
    assert!(matches!(err, StoreError::Transport(_)));
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn default_headers_are_sent() {
    let cms = Arc::new(Cms::default());
    let base = start_server_with(cms.clone()).await;

    let mut headers = HeaderMap::new();
    headers.insert("x-api-key", "secret".parse().unwrap());
    let transport = HttpTransport::with_headers(&base, headers).unwrap();
    let client = DocumentStoreClient::new(transport, StoreConfig::default());

    client
        .store("keyed", Some(&DocumentDescriptor::with_id("k1")))
        .await
        .unwrap();
    assert_eq!(cms.last_api_key.lock().unwrap().as_deref(), Some("secret"));
}
