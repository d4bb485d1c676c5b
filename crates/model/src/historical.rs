//! Historical revisions
//!
//! Opening a document pinned to a revision other than the live one yields
//! a [`HistoricalDocument`]: a read-only snapshot that is never registered
//! and never returned by id-only construction. Every mutation fails with
//! `Error::ImmutableRevision`.

use crate::document::Document;
use serde::de::DeserializeOwned;
use serde_json::Value;
use settee_core::body::is_deleted;
use settee_core::{AttachmentStub, DocId, Error, JsonMap, Result, Revision};
use settee_transport::Headers;

/// Options for [`Database::open`](crate::Database::open)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Pin a specific revision
    pub rev: Option<Revision>,
    /// Headers merged into the document's request context
    pub headers: Headers,
}

impl OpenOptions {
    /// Default options: latest revision, no extra headers
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin a revision
    pub fn rev(mut self, rev: impl Into<Revision>) -> Self {
        self.rev = Some(rev.into());
        self
    }

    /// Add a request header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Immutable snapshot of one past revision
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalDocument {
    id: DocId,
    rev: Revision,
    body: JsonMap,
}

impl HistoricalDocument {
    pub(crate) fn new(id: DocId, rev: Revision, body: JsonMap) -> Self {
        HistoricalDocument { id, rev, body }
    }

    fn immutable(&self) -> Error {
        Error::ImmutableRevision {
            id: self.id.to_string(),
            rev: self.rev.to_string(),
        }
    }

    /// Document id
    pub fn id(&self) -> &DocId {
        &self.id
    }

    /// Pinned revision
    pub fn rev(&self) -> &Revision {
        &self.rev
    }

    /// Value of a top-level field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Value of a top-level field, deserialized
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.body.get(key) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| Error::invalid_input(format!("field {}: {}", key, e))),
            None => Ok(None),
        }
    }

    /// Check if a top-level field exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.body.contains_key(key)
    }

    /// Top-level field names
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.body.keys()
    }

    /// Number of top-level fields
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Check if the body has no fields
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Every top-level field
    pub fn items(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.body.iter()
    }

    /// The whole body
    pub fn to_json(&self) -> &JsonMap {
        &self.body
    }

    /// Check if this revision is a deletion
    pub fn is_deleted(&self) -> bool {
        is_deleted(&self.body)
    }

    /// Attachment metadata recorded in this revision
    pub fn attachments(&self) -> Vec<AttachmentStub> {
        AttachmentStub::from_body(&self.body)
    }

    /// Always fails: historical revisions are immutable
    pub fn set(&self, _key: &str, _value: impl Into<Value>) -> Result<()> {
        Err(self.immutable())
    }

    /// Always fails: historical revisions are immutable
    pub fn remove(&self, _key: &str) -> Result<Option<Value>> {
        Err(self.immutable())
    }

    /// Always fails: historical revisions are immutable
    pub fn extend<I, K>(&self, _fields: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Err(self.immutable())
    }
}

/// Result of [`Database::open`](crate::Database::open)
#[derive(Debug, Clone)]
pub enum DocumentRef {
    /// The tracked instance
    Live(Document),
    /// A past revision
    Historical(HistoricalDocument),
}

impl DocumentRef {
    /// Check if this is the tracked instance
    pub fn is_live(&self) -> bool {
        matches!(self, DocumentRef::Live(_))
    }

    /// The tracked instance, if this is one
    pub fn into_live(self) -> Option<Document> {
        match self {
            DocumentRef::Live(doc) => Some(doc),
            DocumentRef::Historical(_) => None,
        }
    }

    /// The snapshot, if this is one
    pub fn into_historical(self) -> Option<HistoricalDocument> {
        match self {
            DocumentRef::Historical(doc) => Some(doc),
            DocumentRef::Live(_) => None,
        }
    }

    /// Revision of the referenced content
    pub fn rev(&self) -> Option<Revision> {
        match self {
            DocumentRef::Live(doc) => doc.rev(),
            DocumentRef::Historical(doc) => Some(doc.rev().clone()),
        }
    }

    /// Value of a top-level field
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            DocumentRef::Live(doc) => doc.get(key),
            DocumentRef::Historical(doc) => doc.get(key).cloned(),
        }
    }
}
