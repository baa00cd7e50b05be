use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub const TEXT_PLAIN: &str = "text/plain";
pub const APPLICATION_JSON: &str = "application/json";

/// Identifies a document in the content store for a single operation.
///
/// Every field is optional. Empty strings count as absent, so `Some("")`
/// behaves exactly like `None` when requests are built.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl DocumentDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self::new().id(id)
    }

    pub fn store(mut self, store: impl Into<String>) -> Self {
        self.store = Some(store.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn rev(mut self, rev: impl Into<String>) -> Self {
        self.rev = Some(rev.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Store name after merging over `default_store`.
    pub fn resolved_store<'a>(&'a self, default_store: &'a str) -> &'a str {
        present(&self.store).unwrap_or(default_store)
    }

    pub fn present_id(&self) -> Option<&str> {
        present(&self.id)
    }

    pub fn present_rev(&self) -> Option<&str> {
        present(&self.rev)
    }

    pub fn present_content_type(&self) -> Option<&str> {
        present(&self.content_type)
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// Data handed to `store`: raw text is sent as is, anything else as JSON.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Text(String),
    Json(serde_json::Value),
}

impl Payload {
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, StoreError> {
        serde_json::to_value(value)
            .map(Payload::Json)
            .map_err(|e| StoreError::Serialize(e.to_string()))
    }

    /// Content type inferred from the payload kind.
    pub fn content_type(&self) -> &'static str {
        match self {
            Payload::Text(_) => TEXT_PLAIN,
            Payload::Json(_) => APPLICATION_JSON,
        }
    }

    pub fn to_body(&self) -> Result<Vec<u8>, StoreError> {
        match self {
            Payload::Text(text) => Ok(text.as_bytes().to_vec()),
            Payload::Json(value) => {
                serde_json::to_vec(value).map_err(|e| StoreError::Serialize(e.to_string()))
            }
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

/// Describes a successfully stored document.
///
/// `id` and `rev` come from the response body, falling back to the request
/// descriptor; they are `None` only when neither side supplied them.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct StoreResult {
    pub id: Option<String>,
    pub rev: Option<String>,
    pub store: String,
    /// Taken from the `Location` header of the response, when there is one.
    pub url: Option<String>,
}

impl StoreResult {
    /// Descriptor addressing exactly the stored revision.
    pub fn descriptor(&self) -> DocumentDescriptor {
        DocumentDescriptor {
            store: Some(self.store.clone()),
            id: self.id.clone(),
            rev: self.rev.clone(),
            content_type: None,
        }
    }
}

/// Fields the server reports back for a store request. Any body is accepted:
/// missing or non-JSON bodies yield no fields, and numeric values are kept
/// in their decimal form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct StoreResponse {
    pub(crate) id: Option<String>,
    pub(crate) rev: Option<String>,
    pub(crate) store: Option<String>,
}

impl StoreResponse {
    pub(crate) fn from_body(body: &[u8]) -> Self {
        let Ok(serde_json::Value::Object(fields)) = serde_json::from_slice(body) else {
            return Self::default();
        };
        let field = |name: &str| match fields.get(name) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        StoreResponse {
            id: field("id"),
            rev: field("rev"),
            store: field("store"),
        }
    }
}

/// Document data returned by `get`.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub content_type: Option<String>,
    pub data: Payload,
}

impl Document {
    /// Interprets a response body according to its content type. JSON bodies
    /// that fail to parse are an error; everything else is kept as text.
    pub(crate) fn from_body(content_type: Option<String>, body: &[u8]) -> Result<Self, StoreError> {
        let is_json = content_type.as_deref().is_some_and(is_json_media_type);

        let data = if is_json {
            Payload::Json(
                serde_json::from_slice(body).map_err(|e| StoreError::Decode(e.to_string()))?,
            )
        } else {
            Payload::Text(String::from_utf8_lossy(body).into_owned())
        };

        Ok(Document { content_type, data })
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            Payload::Text(text) => Some(text),
            Payload::Json(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match &self.data {
            Payload::Json(value) => Some(value),
            Payload::Text(_) => None,
        }
    }
}

fn is_json_media_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    essence == APPLICATION_JSON || essence.ends_with("+json")
}
