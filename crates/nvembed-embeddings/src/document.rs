//! Document records flowing through the document embedder

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// A piece of content plus metadata, optionally carrying its embedding
///
/// The embedder only reads `content` and `meta` and only writes `embedding`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: String,
    pub content: Option<String>,
    pub meta: Map<String, Value>,
    pub score: Option<f64>,
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    /// Document with the given content and no metadata
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_meta(content, Map::new())
    }

    /// Document with content and metadata
    pub fn with_meta(content: impl Into<String>, meta: Map<String, Value>) -> Self {
        let content = Some(content.into());
        let id = content_id(content.as_deref(), &meta);
        Self {
            id,
            content,
            meta,
            score: None,
            embedding: None,
        }
    }

    /// Metadata value rendered as text, `None` when absent or null
    pub fn meta_text(&self, key: &str) -> Option<String> {
        match self.meta.get(key)? {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// SHA-256 hex digest over content and metadata
fn content_id(content: Option<&str>, meta: &Map<String, Value>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.unwrap_or_default().as_bytes());
    hasher.update(Value::Object(meta.clone()).to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    meta: Map<String, Value>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawDocument::deserialize(deserializer)?;
        let id = raw
            .id
            .unwrap_or_else(|| content_id(raw.content.as_deref(), &raw.meta));
        Ok(Self {
            id,
            content: raw.content,
            meta: raw.meta,
            score: raw.score,
            embedding: raw.embedding,
        })
    }
}
