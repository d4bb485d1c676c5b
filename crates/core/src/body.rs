//! Document body helpers
//!
//! A document body is a JSON object. A handful of top-level keys are owned
//! by the server:
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `_id` | identifier, immutable once assigned |
//! | `_rev` | revision token, required for every later write |
//! | `_deleted` | tombstone marker |
//! | `_attachments` | attachment stubs, or inline payloads before creation |
//!
//! This module also decodes the revision metadata the server returns for
//! `?revs=true` and `?revs_info=true` reads.

use crate::error::{Error, Result};
use crate::types::Revision;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON object backing a document
pub type JsonMap = serde_json::Map<String, Value>;

/// Identifier key
pub const KEY_ID: &str = "_id";
/// Revision key
pub const KEY_REV: &str = "_rev";
/// Tombstone key
pub const KEY_DELETED: &str = "_deleted";
/// Attachment map key
pub const KEY_ATTACHMENTS: &str = "_attachments";
/// Revision list key (present on `?revs=true` reads)
pub const KEY_REVISIONS: &str = "_revisions";
/// Extended revision list key (present on `?revs_info=true` reads)
pub const KEY_REVS_INFO: &str = "_revs_info";

/// Keys that field accessors may not write
pub const RESERVED_KEYS: &[&str] = &[KEY_ID, KEY_REV];

/// Metadata for one attachment, as found under `_attachments`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentStub {
    /// Attachment file name (the key under `_attachments`)
    #[serde(skip)]
    pub name: String,
    /// MIME type
    #[serde(default)]
    pub content_type: Option<String>,
    /// Size in bytes
    #[serde(default)]
    pub length: Option<u64>,
    /// Revision generation in which the attachment was last changed
    #[serde(default)]
    pub revpos: Option<u64>,
    /// Content digest
    #[serde(default)]
    pub digest: Option<String>,
    /// True when only metadata is present (no inline data)
    #[serde(default)]
    pub stub: bool,
}

impl AttachmentStub {
    /// Decode every entry of a body's `_attachments` map
    ///
    /// Entries that are not objects are skipped.
    pub fn from_body(body: &JsonMap) -> Vec<AttachmentStub> {
        let Some(Value::Object(entries)) = body.get(KEY_ATTACHMENTS) else {
            return Vec::new();
        };
        let mut stubs: Vec<AttachmentStub> = entries
            .iter()
            .filter_map(|(name, meta)| {
                serde_json::from_value::<AttachmentStub>(meta.clone())
                    .ok()
                    .map(|mut stub| {
                        stub.name = name.clone();
                        stub
                    })
            })
            .collect();
        stubs.sort_by(|a, b| a.name.cmp(&b.name));
        stubs
    }

    /// JSON form written back into `_attachments`
    pub fn to_value(&self) -> Value {
        let mut meta = JsonMap::new();
        if let Some(content_type) = &self.content_type {
            meta.insert("content_type".into(), Value::String(content_type.clone()));
        }
        if let Some(length) = self.length {
            meta.insert("length".into(), Value::from(length));
        }
        if let Some(revpos) = self.revpos {
            meta.insert("revpos".into(), Value::from(revpos));
        }
        if let Some(digest) = &self.digest {
            meta.insert("digest".into(), Value::String(digest.clone()));
        }
        meta.insert("stub".into(), Value::Bool(self.stub));
        Value::Object(meta)
    }
}

/// Availability of a revision, from `?revs_info=true`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionStatus {
    /// Body is stored and can be read
    Available,
    /// Body was compacted away
    Missing,
    /// Revision is a deletion
    Deleted,
}

/// One entry of `_revs_info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionInfo {
    /// Revision token
    pub rev: Revision,
    /// Availability
    pub status: RevisionStatus,
}

impl RevisionInfo {
    /// Decode `_revs_info` from a `?revs_info=true` body
    pub fn from_body(body: &JsonMap) -> Result<Vec<RevisionInfo>> {
        let raw = body
            .get(KEY_REVS_INFO)
            .cloned()
            .ok_or_else(|| Error::protocol("response has no _revs_info"))?;
        serde_json::from_value(raw)
            .map_err(|e| Error::protocol(format!("malformed _revs_info: {}", e)))
    }
}

#[derive(Deserialize)]
struct RevisionsField {
    start: u64,
    ids: Vec<String>,
}

/// Decode `_revisions` from a `?revs=true` body into full tokens, newest first
pub fn revisions_from_body(body: &JsonMap) -> Result<Vec<Revision>> {
    let raw = body
        .get(KEY_REVISIONS)
        .cloned()
        .ok_or_else(|| Error::protocol("response has no _revisions"))?;
    let field: RevisionsField = serde_json::from_value(raw)
        .map_err(|e| Error::protocol(format!("malformed _revisions: {}", e)))?;

    let mut revisions = Vec::with_capacity(field.ids.len());
    let mut generation = field.start;
    for hash in field.ids {
        revisions.push(Revision::new(format!("{}-{}", generation, hash)));
        generation = match generation.checked_sub(1) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(revisions)
}

/// Read `_rev` from a body
pub fn revision_of(body: &JsonMap) -> Option<Revision> {
    body.get(KEY_REV)
        .and_then(Value::as_str)
        .map(Revision::new)
}

/// Check if a body carries the tombstone marker
pub fn is_deleted(body: &JsonMap) -> bool {
    body.get(KEY_DELETED).and_then(Value::as_bool).unwrap_or(false)
}
