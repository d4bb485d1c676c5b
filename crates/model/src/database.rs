//! Database sessions
//!
//! A [`Database`] names one remote database and owns its identity registry.
//! Every document handle is constructed here, so the registry sees every
//! instance. Handles are cheap to clone; clones share the registry.

use crate::document::Document;
use crate::historical::{DocumentRef, HistoricalDocument, OpenOptions};
use crate::lifecycle::{self, Instantiation, Prior};
use crate::registry::{IdentityRegistry, RegistryStats};
use serde_json::Value;
use settee_core::body::revision_of;
use settee_core::{DatabaseName, DocId, DocState, Error, JsonMap, Result, Revision, KEY_ID};
use settee_transport::{encode_path, Headers, Transport};
use std::sync::Arc;

/// State shared by a database handle and (weakly) its documents
pub(crate) struct DatabaseShared {
    pub(crate) name: DatabaseName,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) registry: IdentityRegistry,
}

impl DatabaseShared {
    pub(crate) fn database_path(&self) -> Vec<String> {
        vec![self.name.to_string()]
    }

    pub(crate) fn document_path(&self, id: &DocId) -> Vec<String> {
        let mut path = self.database_path();
        path.extend(id.path_segments());
        path
    }

    pub(crate) fn attachment_path(&self, id: &DocId, name: &str) -> Vec<String> {
        let mut path = self.document_path(id);
        path.push(name.to_string());
        path
    }
}

/// Handle to one remote database
#[derive(Clone)]
pub struct Database {
    shared: Arc<DatabaseShared>,
}

impl Database {
    /// Create a session for `name` over `transport`
    ///
    /// Applications normally go through
    /// [`Client::database`](crate::Client::database), which hands out one
    /// session per name.
    pub fn new(name: DatabaseName, transport: Arc<dyn Transport>, cache_capacity: usize) -> Self {
        Database {
            shared: Arc::new(DatabaseShared {
                name,
                transport,
                registry: IdentityRegistry::new(cache_capacity),
            }),
        }
    }

    /// Database name
    pub fn name(&self) -> &DatabaseName {
        &self.shared.name
    }

    /// Identity registry of this database
    pub fn registry(&self) -> &IdentityRegistry {
        &self.shared.registry
    }

    /// Pool sizes of the identity registry
    pub fn registry_stats(&self) -> RegistryStats {
        self.shared.registry.stats()
    }

    /// Check if two handles share one session
    pub fn ptr_eq(&self, other: &Database) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    fn make(&self, id: Option<DocId>, state: DocState, body: JsonMap, headers: Headers) -> Document {
        Document::new(Arc::downgrade(&self.shared), id, state, body, headers)
    }

    /// Resolve `id` through the registry, building a new instance if needed
    ///
    /// An instance found in the registry is re-checked under its own lock:
    /// if a delete or detach moved it while we waited, the lookup starts
    /// over.
    fn instantiate(
        &self,
        id: DocId,
        has_revision: bool,
        headers: &Headers,
        build: impl FnOnce() -> JsonMap,
    ) -> Document {
        let registry = &self.shared.registry;
        let mut build = Some(build);
        let mut candidate: Option<Document> = None;
        loop {
            let (existing, prior) = registry.lookup(&id);
            match (lifecycle::instantiate(prior, has_revision), existing) {
                (Instantiation::ReturnExisting, Some(doc)) => {
                    // Document lock first, then the registry
                    let mut cell = doc.lock();
                    if cell.state == DocState::Evicted && !self.is_active_instance(&id, &doc) {
                        tracing::trace!(target: "settee::doc", id = %id, "instance left the registry, retrying");
                        continue;
                    }
                    cell.headers.extend(headers.clone());
                    drop(cell);
                    return doc;
                }
                (Instantiation::Promote, Some(doc)) => {
                    let mut cell = doc.lock();
                    if !registry.promote_instance(&id, &doc) {
                        continue;
                    }
                    cell.headers.extend(headers.clone());
                    cell.state = DocState::Stale;
                    tracing::debug!(target: "settee::doc", id = %id, "promoted from cache as STALE");
                    drop(cell);
                    return doc;
                }
                (decision, _) => {
                    let doc = match candidate.take() {
                        Some(doc) => doc,
                        None => {
                            let state = decision.initial_state().unwrap_or(DocState::Stale);
                            let body = build.take().map(|build| build()).unwrap_or_default();
                            self.make(Some(id.clone()), state, body, headers.clone())
                        }
                    };
                    let kept = registry.register_if_absent(id.clone(), doc.clone());
                    if kept.ptr_eq(&doc) {
                        return doc;
                    }
                    // Lost the race; go through the winner's checks
                    candidate = Some(doc);
                }
            }
        }
    }

    fn is_active_instance(&self, id: &DocId, doc: &Document) -> bool {
        matches!(
            self.shared.registry.lookup(id),
            (Some(current), Prior::Active) if current.ptr_eq(doc)
        )
    }

    /// Construct a document from a body
    ///
    /// With an id (argument or `_id` in the body) the registry is consulted:
    /// an active instance is returned as-is and the body is ignored, a cached
    /// one is promoted as STALE, otherwise a new instance is registered
    /// (STALE when the body carries `_rev`, FRESH otherwise). Without an id
    /// the document is FRESH and joins the registry once `create` assigns
    /// one.
    ///
    /// # Errors
    ///
    /// `InvalidId` for a malformed id; `InvalidInput` when the argument and
    /// `_id` disagree, or an id-less body carries `_rev`.
    pub fn new_document(&self, id: Option<&str>, body: JsonMap) -> Result<Document> {
        let body_id = body.get(KEY_ID).and_then(Value::as_str).map(str::to_string);
        let id = match (id, body_id) {
            (Some(arg), Some(inner)) if arg != inner => {
                return Err(Error::invalid_input(format!(
                    "id {:?} does not match _id {:?} in the body",
                    arg, inner
                )))
            }
            (Some(arg), _) => Some(DocId::new(arg)?),
            (None, Some(inner)) => Some(DocId::new(inner)?),
            (None, None) => None,
        };
        let has_revision = revision_of(&body).is_some();

        match id {
            Some(id) => Ok(self.instantiate(id, has_revision, &Headers::new(), move || body)),
            None if has_revision => Err(Error::invalid_input(
                "a body with _rev needs an _id",
            )),
            None => Ok(self.make(None, DocState::Fresh, body, Headers::new())),
        }
    }

    /// Handle for an existing document, without any network call
    ///
    /// The document starts STALE: its revision is implied but not loaded.
    pub fn document(&self, id: &str) -> Result<Document> {
        let id = DocId::new(id)?;
        Ok(self.instantiate(id, true, &Headers::new(), JsonMap::new))
    }

    /// Load a document from the server
    ///
    /// A tracked instance is returned, fetched first when STALE. Otherwise
    /// the document is read before anything is registered, so `NotFound`
    /// leaves the registry untouched.
    pub fn get(&self, id: &str) -> Result<Document> {
        let opened = self.open(id, OpenOptions::default())?;
        opened
            .into_live()
            .ok_or_else(|| Error::protocol("open without a revision pin returned a snapshot"))
    }

    /// Open a document, optionally pinned to a revision
    ///
    /// A pinned revision that differs from the tracked instance's (or has no
    /// tracked instance to compare with) yields an unregistered
    /// [`HistoricalDocument`]; everything else yields the tracked instance.
    pub fn open(&self, id: &str, options: OpenOptions) -> Result<DocumentRef> {
        let id = DocId::new(id)?;
        let registry = &self.shared.registry;

        if let Some(rev) = &options.rev {
            let live = registry.resolve(&id).filter(|doc| {
                !doc.state().is_evicted() && doc.rev().as_ref() == Some(rev)
            });
            return match live {
                Some(doc) => {
                    doc.merge_headers(&options.headers);
                    Ok(DocumentRef::Live(doc))
                }
                None => self.read_revision(&id, rev, &options.headers),
            };
        }

        if registry.resolve(&id).is_some() {
            let doc = self.instantiate(id, true, &options.headers, JsonMap::new);
            if doc.state() == DocState::Stale {
                doc.fetch()?;
            }
            return Ok(DocumentRef::Live(doc));
        }

        let path = self.shared.document_path(&id);
        let body = self
            .shared
            .transport
            .read(path.clone(), &options.headers, &[])?
            .error_for_status(&encode_path(&path))?
            .into_json_map()?;
        let doc = self.make(Some(id.clone()), DocState::Valid, body, options.headers.clone());
        let kept = self.shared.registry.register_if_absent(id.clone(), doc.clone());
        if kept.ptr_eq(&doc) {
            return Ok(DocumentRef::Live(kept));
        }

        // Another caller registered the id while we were reading
        let existing = self.instantiate(id, true, &options.headers, JsonMap::new);
        if existing.state() == DocState::Stale {
            existing.fetch()?;
        }
        Ok(DocumentRef::Live(existing))
    }

    fn read_revision(&self, id: &DocId, rev: &Revision, headers: &Headers) -> Result<DocumentRef> {
        let path = self.shared.document_path(id);
        let query = vec![("rev".to_string(), rev.to_string())];
        let body = self
            .shared
            .transport
            .read(path.clone(), headers, &query)?
            .error_for_status(&encode_path(&path))?
            .into_json_map()?;
        let rev = revision_of(&body).unwrap_or_else(|| rev.clone());
        Ok(DocumentRef::Historical(HistoricalDocument::new(
            id.clone(),
            rev,
            body,
        )))
    }

    /// Latest revision of `id` on the server, `None` when it does not exist
    ///
    /// Uses HEAD; nothing is registered.
    pub fn exists(&self, id: &str) -> Result<Option<Revision>> {
        let id = DocId::new(id)?;
        let path = self.shared.document_path(&id);
        let response = self.shared.transport.head(path.clone(), &Headers::new(), &[])?;
        match response.error_for_status(&encode_path(&path)) {
            Ok(response) => response
                .etag()
                .map(Some)
                .ok_or_else(|| Error::protocol("HEAD response has no ETag")),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Build a local (non-replicated) document
    pub fn local_document(&self, name: &str, body: JsonMap) -> Result<Document> {
        let id = DocId::local(name)?;
        self.new_document(Some(id.as_str()), body)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.shared.name)
            .field("registry", &self.shared.registry)
            .finish()
    }
}
