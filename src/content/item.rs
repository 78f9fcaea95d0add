//! The unit of work driven through a chain

use super::store::{MemoryStore, MetadataStore, Statement};
use std::sync::Arc;
use uuid::Uuid;

/// A content item: identifier, raw payload, media type, and the metadata
/// store every engine in a run appends to.
///
/// Clones are cheap and share the payload and the metadata store, which is
/// the only mutable part.
#[derive(Debug, Clone)]
pub struct ContentItem {
    uri: String,
    media_type: String,
    payload: Arc<[u8]>,
    metadata: Arc<dyn MetadataStore>,
}

impl ContentItem {
    /// Create an item with an in-memory metadata store.
    pub fn new(uri: impl Into<String>, media_type: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self::with_store(uri, media_type, payload, Arc::new(MemoryStore::new()))
    }

    /// Create an item around a caller-provided metadata store.
    pub fn with_store(
        uri: impl Into<String>,
        media_type: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        let payload: Vec<u8> = payload.into();
        Self {
            uri: uri.into(),
            media_type: media_type.into(),
            payload: Arc::from(payload),
            metadata,
        }
    }

    /// Create a plain-text item with a generated `urn:content-item-<uuid>` identifier.
    pub fn from_text(text: impl Into<String>) -> Self {
        let uri = format!("urn:content-item-{}", Uuid::new_v4());
        Self::new(uri, "text/plain", text.into().into_bytes())
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload as UTF-8 text, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    /// Convenience for `metadata().append_statements(batch)`.
    pub fn append_statements(&self, batch: Vec<Statement>) {
        self.metadata.append_statements(batch);
    }
}
