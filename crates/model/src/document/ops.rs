//! Network operations on a document
//!
//! Every operation follows the same shape:
//!
//! 1. lock the document
//! 2. ask the lifecycle for the resulting state (refusal = no network call)
//! 3. call the transport with the document lock held
//! 4. on confirmed success, update body, state and registry together

use super::{Document, DocumentCell};
use crate::lifecycle::Event;
use base64::Engine;
use serde_json::Value;
use settee_core::body::{revisions_from_body, KEY_REVISIONS, KEY_REVS_INFO};
use settee_core::{
    DocId, DocState, Error, JsonMap, Result, Revision, RevisionInfo, KEY_ATTACHMENTS, KEY_DELETED,
    KEY_ID, KEY_REV,
};
use settee_transport::{encode_path, Body};

/// Result of a server-side copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOutcome {
    /// Destination id
    pub id: DocId,
    /// Revision the destination now has
    pub rev: Revision,
}

enum HistoryKind {
    Revisions,
    RevsInfo,
}

fn query(name: &str, value: impl Into<String>) -> Vec<(String, String)> {
    vec![(name.to_string(), value.into())]
}

impl Document {
    /// Send a FRESH document to the server
    ///
    /// Documents with an id are created under that id (local documents via
    /// PUT); otherwise the server assigns one and the document joins the
    /// registry under it. Staged attachments travel inline and are replaced
    /// by stubs once the server accepts them.
    ///
    /// # Errors
    ///
    /// `IllegalTransition` unless FRESH; `RevisionConflict` when the id is
    /// taken. The document stays FRESH on any failure.
    pub fn create(&self) -> Result<()> {
        let event = Event::Create;
        let mut cell = self.lock();
        let next = cell.check(event)?;
        let db = self.database()?;

        let mut payload = cell.body.clone();
        payload.remove(KEY_REV);
        if !cell.staged.is_empty() {
            let mut inline = match payload.remove(KEY_ATTACHMENTS) {
                Some(Value::Object(existing)) => existing,
                _ => JsonMap::new(),
            };
            for (name, staged) in &cell.staged {
                let data = base64::engine::general_purpose::STANDARD.encode(&staged.data);
                inline.insert(
                    name.clone(),
                    serde_json::json!({"content_type": staged.content_type, "data": data}),
                );
            }
            payload.insert(KEY_ATTACHMENTS.to_string(), Value::Object(inline));
        }

        let (path, response) = match &cell.id {
            Some(id) if id.is_local() => {
                let path = db.document_path(id);
                let response =
                    db.transport
                        .write(path.clone(), &cell.headers, Body::Json(Value::Object(payload)), &[])?;
                (path, response)
            }
            _ => {
                let path = db.database_path();
                let response =
                    db.transport
                        .create(path.clone(), &cell.headers, Body::Json(Value::Object(payload)), &[])?;
                (path, response)
            }
        };
        let ack = response.error_for_status(&encode_path(&path))?.write_ack()?;
        let id = DocId::new(ack.id)?;

        cell.body
            .insert(KEY_ID.to_string(), Value::String(id.to_string()));
        cell.body
            .insert(KEY_REV.to_string(), Value::String(ack.rev.to_string()));
        stub_staged(&mut cell, ack.rev.generation());
        cell.id = Some(id.clone());
        cell.apply(next, event);
        db.registry.register(id, self.clone());
        Ok(())
    }

    /// Reload the body from the server
    ///
    /// # Errors
    ///
    /// `IllegalTransition` from FRESH or DIRTY (local edits are never
    /// silently discarded).
    pub fn fetch(&self) -> Result<()> {
        let event = Event::Fetch;
        let mut cell = self.lock();
        let next = cell.check(event)?;
        let id = cell.require_id(event)?;
        let db = self.database()?;

        let path = db.document_path(&id);
        let response = db.transport.read(path.clone(), &cell.headers, &[])?;
        let body = response
            .error_for_status(&encode_path(&path))?
            .into_json_map()?;

        cell.body = body;
        cell.apply(next, event);
        Ok(())
    }

    /// Send local changes with the current revision
    ///
    /// # Errors
    ///
    /// `IllegalTransition` unless DIRTY. On `RevisionConflict` the document
    /// stays DIRTY with its edits intact; fetch is refused from DIRTY, so
    /// resolving means deleting with an explicit revision or re-applying the
    /// edits on a fresh handle.
    pub fn update(&self) -> Result<()> {
        let event = Event::Update;
        let mut cell = self.lock();
        let next = cell.check(event)?;
        let id = cell.require_id(event)?;
        cell.require_rev(event)?;
        let db = self.database()?;

        let path = db.document_path(&id);
        let label = encode_path(&path);
        let response = db.transport.write(
            path,
            &cell.headers,
            Body::Json(Value::Object(cell.body.clone())),
            &[],
        )?;
        let ack = match response.error_for_status(&label) {
            Ok(response) => response.write_ack()?,
            Err(e) => {
                if e.is_conflict() {
                    tracing::warn!(target: "settee::doc", id = %id, "update conflict");
                }
                return Err(e);
            }
        };

        cell.body
            .insert(KEY_REV.to_string(), Value::String(ack.rev.to_string()));
        cell.apply(next, event);
        Ok(())
    }

    /// Delete the document on the server using its current revision
    ///
    /// On success the document is EVICTED and leaves the registry; the next
    /// construction for the id yields a new instance.
    pub fn delete(&self) -> Result<()> {
        self.delete_inner(None)
    }

    /// Delete a specific revision, overriding the local one
    ///
    /// Legal from FRESH and DIRTY as well; local edits are discarded.
    pub fn delete_with_revision(&self, rev: &Revision) -> Result<()> {
        self.delete_inner(Some(rev))
    }

    fn delete_inner(&self, explicit: Option<&Revision>) -> Result<()> {
        let event = Event::Delete {
            explicit_revision: explicit.is_some(),
        };
        let mut cell = self.lock();
        let next = cell.check(event)?;
        let id = cell.require_id(event)?;
        let rev = match explicit {
            Some(rev) => rev.clone(),
            None => cell.require_rev(event)?,
        };
        let db = self.database()?;

        let path = db.document_path(&id);
        let response =
            db.transport
                .delete(path.clone(), &cell.headers, &query("rev", rev.as_str()))?;
        let response = match response.error_for_status(&encode_path(&path)) {
            Ok(response) => response,
            Err(e) => {
                if e.is_conflict() {
                    tracing::warn!(target: "settee::doc", id = %id, rev = %rev, "delete conflict");
                }
                return Err(e);
            }
        };
        let tombstone = response.write_ack()?.rev;

        cell.body
            .insert(KEY_REV.to_string(), Value::String(tombstone.to_string()));
        cell.body.insert(KEY_DELETED.to_string(), Value::Bool(true));
        cell.apply(next, event);
        db.registry.evict(&id);
        Ok(())
    }

    /// Move the document out of active tracking into the cache
    ///
    /// The handle becomes EVICTED; constructing the id again promotes the
    /// same instance back as STALE.
    pub fn detach(&self) -> Result<()> {
        let event = Event::Demote;
        let mut cell = self.lock();
        let next = cell.check(event)?;
        if let Some(id) = cell.id.clone() {
            let db = self.database()?;
            db.registry.demote(&id);
        }
        cell.apply(next, event);
        Ok(())
    }

    // =========================================================================
    // Read-only probes
    // =========================================================================

    /// Check whether the local revision is still the latest on the server
    ///
    /// Uses HEAD and the `ETag` header. A document deleted on the server is
    /// not current.
    pub fn is_current(&self) -> Result<bool> {
        let event = Event::Inspect;
        let cell = self.lock();
        cell.check(event)?;
        let id = cell.require_id(event)?;
        let db = self.database()?;

        let path = db.document_path(&id);
        let response = db.transport.head(path.clone(), &cell.headers, &[])?;
        let latest = match response.error_for_status(&encode_path(&path)) {
            Ok(response) => response.etag(),
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        };
        Ok(latest.is_some() && latest == cell.rev())
    }

    /// Revision history of the current revision, newest first
    pub fn revisions(&self) -> Result<Vec<Revision>> {
        let body = self.read_history(HistoryKind::Revisions)?;
        revisions_from_body(&body)
    }

    /// Revision history with availability, newest first
    pub fn revisions_info(&self) -> Result<Vec<RevisionInfo>> {
        let body = self.read_history(HistoryKind::RevsInfo)?;
        RevisionInfo::from_body(&body)
    }

    fn read_history(&self, kind: HistoryKind) -> Result<JsonMap> {
        let event = Event::Inspect;
        let cell = self.lock();
        cell.check(event)?;
        let id = cell.require_id(event)?;
        let db = self.database()?;

        let (param, key) = match kind {
            HistoryKind::Revisions => ("revs", KEY_REVISIONS),
            HistoryKind::RevsInfo => ("revs_info", KEY_REVS_INFO),
        };
        let mut params = query(param, "true");
        if let Some(rev) = cell.rev() {
            params.push(("rev".to_string(), rev.to_string()));
        }
        let path = db.document_path(&id);
        let body = db
            .transport
            .read(path.clone(), &cell.headers, &params)?
            .error_for_status(&encode_path(&path))?
            .into_json_map()?;
        if !body.contains_key(key) {
            return Err(Error::protocol(format!("response has no {}", key)));
        }
        Ok(body)
    }

    /// Copy this document to `destination` on the server
    ///
    /// Pass `destination_rev` to overwrite an existing destination. A live
    /// destination instance is marked STALE afterwards, unless it is DIRTY.
    pub fn copy_to(
        &self,
        destination: &str,
        destination_rev: Option<&Revision>,
    ) -> Result<CopyOutcome> {
        let destination = DocId::new(destination)?;
        let event = Event::Inspect;
        let (outcome, db) = {
            let cell = self.lock();
            cell.check(event)?;
            let id = cell.require_id(event)?;
            let db = self.database()?;

            let target = match destination_rev {
                Some(rev) => format!("{}?rev={}", destination, rev),
                None => destination.to_string(),
            };
            let params = cell
                .rev()
                .map(|rev| query("rev", rev.as_str()))
                .unwrap_or_default();
            let path = db.document_path(&id);
            let ack = db
                .transport
                .copy(path.clone(), &target, &cell.headers, &params)?
                .error_for_status(&encode_path(&path))?
                .write_ack()?;
            let outcome = CopyOutcome {
                id: DocId::new(ack.id)?,
                rev: ack.rev,
            };
            (outcome, db)
        };

        // Document lock released: never hold two document locks at once
        if let Some(existing) = db.registry.resolve(&outcome.id) {
            if !existing.ptr_eq(self) {
                let mut other = existing.lock();
                if !matches!(other.state, DocState::Dirty | DocState::Evicted) {
                    other.apply(DocState::Stale, event);
                }
            }
        }
        Ok(outcome)
    }
}

/// Swap staged inline payloads for the stubs the server now holds
fn stub_staged(cell: &mut DocumentCell, revpos: Option<u64>) {
    if cell.staged.is_empty() {
        return;
    }
    let mut stubs = match cell.body.remove(KEY_ATTACHMENTS) {
        Some(Value::Object(existing)) => existing,
        _ => JsonMap::new(),
    };
    for (name, staged) in std::mem::take(&mut cell.staged) {
        let mut stub = serde_json::json!({
            "content_type": staged.content_type,
            "length": staged.data.len(),
            "stub": true,
        });
        if let (Some(revpos), Value::Object(meta)) = (revpos, &mut stub) {
            meta.insert("revpos".to_string(), Value::from(revpos));
        }
        stubs.insert(name, stub);
    }
    cell.body
        .insert(KEY_ATTACHMENTS.to_string(), Value::Object(stubs));
}
