//! Document handles
//!
//! A [`Document`] is a cheap-clone handle to the one in-memory instance the
//! identity registry tracks for an id. Clones share state: a `set` through
//! one handle is visible through every other.
//!
//! Each instance carries its own mutex. Network operations hold it across
//! the transport call, so operations on one document are serialized and
//! either fully apply (state, body, registry) or leave everything as it was.
//!
//! # Example
//!
//! ```ignore
//! let doc = db.new_document(Some("Fishstew"), JsonMap::new())?;
//! doc.set("servings", 4)?;
//! doc.create()?;                 // FRESH -> VALID
//! doc.set("servings", 6)?;       // VALID -> DIRTY
//! doc.update()?;                 // DIRTY -> VALID
//! ```

mod attachments;
mod ops;

pub use attachments::{Attachment, DEFAULT_CONTENT_TYPE};
pub use ops::CopyOutcome;

use crate::database::DatabaseShared;
use crate::lifecycle::{self, Event};
use parking_lot::{Mutex, MutexGuard};
use serde::de::DeserializeOwned;
use serde_json::Value;
use settee_core::body::{is_deleted, revision_of};
use settee_core::{
    AttachmentStub, DocId, DocState, Error, JsonMap, Result, Revision, KEY_ID, RESERVED_KEYS,
};
use settee_transport::Headers;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Inline payload waiting to be sent with `create`
#[derive(Debug, Clone)]
pub(crate) struct StagedAttachment {
    pub(crate) content_type: String,
    pub(crate) data: Vec<u8>,
}

/// Mutable state of one document, guarded by the document mutex
pub(crate) struct DocumentCell {
    pub(crate) id: Option<DocId>,
    pub(crate) state: DocState,
    pub(crate) body: JsonMap,
    pub(crate) headers: Headers,
    pub(crate) staged: BTreeMap<String, StagedAttachment>,
}

impl DocumentCell {
    /// Id for messages
    pub(crate) fn label(&self) -> String {
        self.id
            .as_ref()
            .map_or_else(|| "<unsaved>".to_string(), DocId::to_string)
    }

    pub(crate) fn rev(&self) -> Option<Revision> {
        revision_of(&self.body)
    }

    /// Legality check, before any network call
    pub(crate) fn check(&self, event: Event) -> Result<DocState> {
        lifecycle::transition(self.state, event)
            .map_err(|refusal| refusal.into_error(self.label(), self.state, event))
    }

    pub(crate) fn require_id(&self, event: Event) -> Result<DocId> {
        self.id.clone().ok_or_else(|| {
            Error::illegal(
                self.label(),
                self.state,
                event.operation(),
                "document has no id",
            )
        })
    }

    pub(crate) fn require_rev(&self, event: Event) -> Result<Revision> {
        self.rev().ok_or_else(|| {
            Error::illegal(
                self.label(),
                self.state,
                event.operation(),
                "revision unknown; fetch first",
            )
        })
    }

    /// Commit a transition that the server has confirmed
    pub(crate) fn apply(&mut self, next: DocState, event: Event) {
        if next != self.state {
            tracing::debug!(
                target: "settee::doc",
                id = %self.label(),
                from = %self.state,
                to = %next,
                op = %event.operation(),
                "transition"
            );
        }
        self.state = next;
    }
}

struct DocumentInner {
    database: Weak<DatabaseShared>,
    cell: Mutex<DocumentCell>,
}

/// Shared handle to a tracked document
#[derive(Clone)]
pub struct Document {
    inner: Arc<DocumentInner>,
}

impl Document {
    pub(crate) fn new(
        database: Weak<DatabaseShared>,
        id: Option<DocId>,
        state: DocState,
        mut body: JsonMap,
        headers: Headers,
    ) -> Self {
        if let Some(id) = &id {
            body.insert(KEY_ID.to_string(), Value::String(id.to_string()));
        }
        Document {
            inner: Arc::new(DocumentInner {
                database,
                cell: Mutex::new(DocumentCell {
                    id,
                    state,
                    body,
                    headers,
                    staged: BTreeMap::new(),
                }),
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn detached_for_tests() -> Self {
        Document::new(
            Weak::new(),
            None,
            DocState::Fresh,
            JsonMap::new(),
            Headers::new(),
        )
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, DocumentCell> {
        self.inner.cell.lock()
    }

    pub(crate) fn database(&self) -> Result<Arc<DatabaseShared>> {
        self.inner
            .database
            .upgrade()
            .ok_or_else(|| Error::invalid_input("the database session of this document was dropped"))
    }

    /// Check if two handles refer to the same instance
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Document id, `None` until the server assigns one
    pub fn id(&self) -> Option<DocId> {
        self.lock().id.clone()
    }

    /// Last-known revision
    pub fn rev(&self) -> Option<Revision> {
        self.lock().rev()
    }

    /// Lifecycle state
    pub fn state(&self) -> DocState {
        self.lock().state
    }

    /// Check if the body carries the tombstone marker
    pub fn is_deleted(&self) -> bool {
        is_deleted(&self.lock().body)
    }

    /// Value of a top-level field
    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().body.get(key).cloned()
    }

    /// Value of a top-level field, deserialized
    ///
    /// # Errors
    ///
    /// `Error::InvalidInput` when the field does not deserialize as `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| Error::invalid_input(format!("field {}: {}", key, e))),
            None => Ok(None),
        }
    }

    /// Check if a top-level field exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().body.contains_key(key)
    }

    /// Top-level field names, reserved ones included
    pub fn keys(&self) -> Vec<String> {
        self.lock().body.keys().cloned().collect()
    }

    /// Number of top-level fields
    pub fn len(&self) -> usize {
        self.lock().body.len()
    }

    /// Check if the body has no fields
    pub fn is_empty(&self) -> bool {
        self.lock().body.is_empty()
    }

    /// Snapshot of every top-level field
    pub fn items(&self) -> Vec<(String, Value)> {
        self.lock()
            .body
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Snapshot of the whole body
    pub fn to_json(&self) -> JsonMap {
        self.lock().body.clone()
    }

    /// Attachment metadata found under `_attachments`
    pub fn attachments(&self) -> Vec<AttachmentStub> {
        AttachmentStub::from_body(&self.lock().body)
    }

    /// Headers sent with every request for this document
    pub fn headers(&self) -> Headers {
        self.lock().headers.clone()
    }

    /// Merge headers into those sent with later requests
    pub fn merge_headers(&self, headers: &Headers) {
        let mut cell = self.lock();
        for (name, value) in headers {
            cell.headers.insert(name.clone(), value.clone());
        }
    }

    // =========================================================================
    // Local mutations
    // =========================================================================

    fn mutate<T>(&self, edit: impl FnOnce(&mut JsonMap) -> T) -> Result<T> {
        let mut cell = self.lock();
        let next = cell.check(Event::Mutate)?;
        let out = edit(&mut cell.body);
        cell.apply(next, Event::Mutate);
        Ok(out)
    }

    fn ensure_unreserved(key: &str) -> Result<()> {
        if RESERVED_KEYS.contains(&key) {
            return Err(Error::ReservedField {
                field: key.to_string(),
            });
        }
        Ok(())
    }

    /// Set a top-level field
    ///
    /// Any write marks a VALID document DIRTY, even when the value is
    /// unchanged.
    ///
    /// # Errors
    ///
    /// `Error::ReservedField` for `_id` and `_rev`; `IllegalTransition` once
    /// the document is EVICTED.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        Self::ensure_unreserved(key)?;
        let value = value.into();
        self.mutate(|body| {
            body.insert(key.to_string(), value);
        })
    }

    /// Remove a top-level field, returning its old value
    pub fn remove(&self, key: &str) -> Result<Option<Value>> {
        Self::ensure_unreserved(key)?;
        self.mutate(|body| body.remove(key))
    }

    /// Set many fields at once; `_id` and `_rev` are skipped
    pub fn extend<I, K>(&self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let fields: Vec<(String, Value)> = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
            .collect();
        self.mutate(|body| body.extend(fields))
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.cell.try_lock() {
            Some(cell) => {
                let rev = cell.rev();
                write!(
                    f,
                    "<Document {}:{} {}>",
                    cell.label(),
                    rev.as_ref().map_or("-", Revision::as_str),
                    cell.state
                )
            }
            None => f.write_str("<Document (busy)>"),
        }
    }
}
