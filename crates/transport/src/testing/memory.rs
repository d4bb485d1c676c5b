//! In-memory CouchDB stand-in
//!
//! `MemoryCouch` answers the document, attachment and revision endpoints
//! with the same statuses and bodies a CouchDB server would:
//!
//! - every write creates a new `<generation>-<hash>` revision
//! - writes against anything but the latest revision get `409 conflict`
//! - deletes leave a tombstone revision; reads of it get `404 deleted`
//! - `?rev=`, `?revs=true` and `?revs_info=true` reads see the full history
//! - `HEAD` answers with an `ETag` carrying the latest revision
//! - `COPY` honours the `Destination` header, including `?rev=`
//!
//! Databases must be created with [`MemoryCouch::create_database`] first;
//! requests against unknown databases get `404`.
//!
//! Clones share the same server state, so two clients built from clones of
//! one `MemoryCouch` behave like two processes talking to one server.

use crate::request::{Body, Method, Request};
use crate::response::Response;
use crate::transport::Transport;
use base64::Engine;
use parking_lot::Mutex;
use serde_json::{json, Value};
use settee_core::{JsonMap, Revision, TransportError};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Shared in-memory server
#[derive(Clone, Default)]
pub struct MemoryCouch {
    inner: Arc<Mutex<Server>>,
}

#[derive(Default)]
struct Server {
    databases: HashMap<String, HashMap<String, StoredDoc>>,
    requests: Vec<(Method, String)>,
    sequence: u64,
}

#[derive(Clone)]
struct StoredAttachment {
    content_type: String,
    data: Vec<u8>,
    revpos: u64,
}

#[derive(Clone)]
struct StoredRevision {
    rev: Revision,
    body: JsonMap,
    attachments: BTreeMap<String, StoredAttachment>,
    deleted: bool,
    compacted: bool,
}

/// Revision history, oldest first
#[derive(Default)]
struct StoredDoc {
    history: Vec<StoredRevision>,
}

impl StoredDoc {
    fn latest(&self) -> Option<&StoredRevision> {
        self.history.last()
    }

    fn is_live(&self) -> bool {
        self.latest().is_some_and(|r| !r.deleted)
    }

    fn position(&self, rev: &str) -> Option<usize> {
        self.history.iter().position(|r| r.rev.as_str() == rev)
    }

    fn next_generation(&self) -> u64 {
        self.latest()
            .and_then(|r| r.rev.generation())
            .map_or(1, |g| g + 1)
    }
}

enum Target {
    Database(String),
    Document(String, String),
    Attachment(String, String, String),
}

fn target(path: &[String]) -> Option<Target> {
    let prefixed = |prefix: &str| prefix == "_local" || prefix == "_design";
    match path {
        [db] => Some(Target::Database(db.clone())),
        [db, id] => Some(Target::Document(db.clone(), id.clone())),
        [db, prefix, name] if prefixed(prefix) => Some(Target::Document(
            db.clone(),
            format!("{}/{}", prefix, name),
        )),
        [db, id, name] => Some(Target::Attachment(db.clone(), id.clone(), name.clone())),
        [db, prefix, id, name] if prefix == "_design" => Some(Target::Attachment(
            db.clone(),
            format!("{}/{}", prefix, id),
            name.clone(),
        )),
        _ => None,
    }
}

fn error(status: u16, error: &str, reason: &str) -> Response {
    Response::json(status, json!({"error": error, "reason": reason}))
}

fn conflict() -> Response {
    error(409, "conflict", "Document update conflict.")
}

fn missing(reason: &str) -> Response {
    error(404, "not_found", reason)
}

fn ack(status: u16, id: &str, rev: &Revision) -> Response {
    Response::json(status, json!({"ok": true, "id": id, "rev": rev.as_str()}))
        .with_header("ETag", format!("\"{}\"", rev))
}

fn fnv(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

fn strip_reserved(body: &mut JsonMap) {
    body.retain(|key, _| !key.starts_with('_'));
}

fn render(id: &str, revision: &StoredRevision) -> JsonMap {
    let mut map = JsonMap::new();
    map.insert("_id".into(), Value::String(id.to_string()));
    map.insert("_rev".into(), Value::String(revision.rev.to_string()));
    if revision.deleted {
        map.insert("_deleted".into(), Value::Bool(true));
    }
    for (key, value) in &revision.body {
        map.insert(key.clone(), value.clone());
    }
    if !revision.attachments.is_empty() {
        let stubs: JsonMap = revision
            .attachments
            .iter()
            .map(|(name, att)| {
                let meta = json!({
                    "content_type": att.content_type,
                    "length": att.data.len(),
                    "revpos": att.revpos,
                    "digest": format!("fnv-{:016x}", fnv(&att.data)),
                    "stub": true,
                });
                (name.clone(), meta)
            })
            .collect();
        map.insert("_attachments".into(), Value::Object(stubs));
    }
    map
}

impl Server {
    fn next_rev(&mut self, generation: u64, body: &JsonMap) -> Revision {
        self.sequence += 1;
        let mut seed = self.sequence.to_le_bytes().to_vec();
        seed.extend(Value::Object(body.clone()).to_string().into_bytes());
        Revision::new(format!("{}-{:016x}", generation, fnv(&seed)))
    }

    fn handle(&mut self, request: &Request) -> Response {
        let Some(target) = target(&request.path) else {
            return error(400, "bad_request", "unsupported path");
        };
        let db = match &target {
            Target::Database(db) | Target::Document(db, _) | Target::Attachment(db, _, _) => {
                db.clone()
            }
        };
        if !self.databases.contains_key(&db) {
            return missing("Database does not exist.");
        }
        match (request.method, target) {
            (Method::Post, Target::Database(db)) => self.post_document(&db, request),
            (Method::Get, Target::Document(db, id)) => self.get_document(&db, &id, request),
            (Method::Head, Target::Document(db, id)) => {
                let response = self.get_document(&db, &id, request);
                Response {
                    body: Body::Empty,
                    ..response
                }
            }
            (Method::Put, Target::Document(db, id)) => self.put_document(&db, &id, request),
            (Method::Delete, Target::Document(db, id)) => {
                self.delete_document(&db, &id, request)
            }
            (Method::Copy, Target::Document(db, id)) => self.copy_document(&db, &id, request),
            (Method::Get, Target::Attachment(db, id, name)) => {
                self.get_attachment(&db, &id, &name, request)
            }
            (Method::Put, Target::Attachment(db, id, name)) => {
                self.put_attachment(&db, &id, &name, request)
            }
            (Method::Delete, Target::Attachment(db, id, name)) => {
                self.delete_attachment(&db, &id, &name, request)
            }
            _ => error(405, "method_not_allowed", "method not supported here"),
        }
    }

    fn docs(&mut self, db: &str) -> &mut HashMap<String, StoredDoc> {
        self.databases.entry(db.to_string()).or_default()
    }

    /// Resolve `_attachments` of an incoming body against the previous revision
    fn incoming_attachments(
        body: &JsonMap,
        previous: Option<&StoredRevision>,
        generation: u64,
    ) -> Result<BTreeMap<String, StoredAttachment>, Response> {
        let mut out = BTreeMap::new();
        let Some(Value::Object(entries)) = body.get("_attachments") else {
            return Ok(out);
        };
        for (name, meta) in entries {
            if let Some(data) = meta.get("data").and_then(Value::as_str) {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(data)
                    .map_err(|_| error(400, "bad_request", "invalid attachment data"))?;
                let content_type = meta
                    .get("content_type")
                    .and_then(Value::as_str)
                    .unwrap_or("application/octet-stream")
                    .to_string();
                out.insert(
                    name.clone(),
                    StoredAttachment {
                        content_type,
                        data: bytes,
                        revpos: generation,
                    },
                );
            } else {
                let kept = previous
                    .and_then(|p| p.attachments.get(name))
                    .cloned()
                    .ok_or_else(|| error(412, "missing_stub", "stub has no attachment"))?;
                out.insert(name.clone(), kept);
            }
        }
        Ok(out)
    }

    fn append(
        &mut self,
        db: &str,
        id: &str,
        mut body: JsonMap,
        deleted: bool,
    ) -> Result<Revision, Response> {
        let (generation, previous) = {
            let doc = self.docs(db).entry(id.to_string()).or_default();
            (doc.next_generation(), doc.latest().cloned())
        };
        let attachments = if deleted {
            BTreeMap::new()
        } else {
            Self::incoming_attachments(&body, previous.as_ref(), generation)?
        };
        strip_reserved(&mut body);
        let rev = self.next_rev(generation, &body);
        let revision = StoredRevision {
            rev: rev.clone(),
            body,
            attachments,
            deleted,
            compacted: false,
        };
        self.docs(db)
            .entry(id.to_string())
            .or_default()
            .history
            .push(revision);
        Ok(rev)
    }

    /// Check that `rev` may be used to write over the current state of `id`
    fn writable(&mut self, db: &str, id: &str, rev: Option<&str>) -> bool {
        match self.docs(db).get(id) {
            Some(doc) if doc.is_live() => {
                rev.is_some() && doc.latest().map(|r| r.rev.as_str()) == rev
            }
            Some(doc) => rev.is_none() || doc.latest().map(|r| r.rev.as_str()) == rev,
            None => rev.is_none(),
        }
    }

    fn post_document(&mut self, db: &str, request: &Request) -> Response {
        let Some(Value::Object(body)) = request.body.as_json().cloned() else {
            return error(400, "bad_request", "Document must be a JSON object");
        };
        let id = match body.get("_id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                self.sequence += 1;
                format!("{:032x}", fnv(&self.sequence.to_le_bytes()))
            }
        };
        let rev = body.get("_rev").and_then(Value::as_str).map(str::to_string);
        if !self.writable(db, &id, rev.as_deref()) {
            return conflict();
        }
        match self.append(db, &id, body, false) {
            Ok(rev) => ack(201, &id, &rev),
            Err(response) => response,
        }
    }

    fn put_document(&mut self, db: &str, id: &str, request: &Request) -> Response {
        let Some(Value::Object(body)) = request.body.as_json().cloned() else {
            return error(400, "bad_request", "Document must be a JSON object");
        };
        let rev = body
            .get("_rev")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| request.query_value("rev").map(str::to_string));
        if !self.writable(db, id, rev.as_deref()) {
            return conflict();
        }
        let deleted = body.get("_deleted").and_then(Value::as_bool) == Some(true);
        match self.append(db, id, body, deleted) {
            Ok(rev) => ack(201, id, &rev),
            Err(response) => response,
        }
    }

    fn get_document(&mut self, db: &str, id: &str, request: &Request) -> Response {
        let Some(doc) = self.docs(db).get(id) else {
            return missing("missing");
        };
        let position = match request.query_value("rev") {
            Some(rev) => match doc.position(rev) {
                Some(p) if !doc.history[p].compacted => p,
                _ => return missing("missing"),
            },
            None => {
                if !doc.is_live() {
                    return missing("deleted");
                }
                doc.history.len() - 1
            }
        };
        let revision = &doc.history[position];
        let mut body = render(id, revision);

        if request.query_value("revs") == Some("true") {
            let ids: Vec<Value> = doc.history[..=position]
                .iter()
                .rev()
                .map(|r| {
                    let token = r.rev.as_str();
                    let hash = token.split_once('-').map_or(token, |(_, h)| h);
                    Value::String(hash.to_string())
                })
                .collect();
            body.insert(
                "_revisions".into(),
                json!({"start": revision.rev.generation().unwrap_or(0), "ids": ids}),
            );
        }
        if request.query_value("revs_info") == Some("true") {
            let info: Vec<Value> = doc.history[..=position]
                .iter()
                .rev()
                .map(|r| {
                    let status = if r.deleted {
                        "deleted"
                    } else if r.compacted {
                        "missing"
                    } else {
                        "available"
                    };
                    json!({"rev": r.rev.as_str(), "status": status})
                })
                .collect();
            body.insert("_revs_info".into(), Value::Array(info));
        }

        Response::json(200, Value::Object(body))
            .with_header("ETag", format!("\"{}\"", revision.rev))
            .with_header("Content-Type", "application/json")
    }

    fn delete_document(&mut self, db: &str, id: &str, request: &Request) -> Response {
        let live = self.docs(db).get(id).is_some_and(StoredDoc::is_live);
        if !live {
            return missing("deleted");
        }
        let rev = request.query_value("rev").map(str::to_string);
        if rev.is_none() || !self.writable(db, id, rev.as_deref()) {
            return conflict();
        }
        match self.append(db, id, JsonMap::new(), true) {
            Ok(rev) => ack(200, id, &rev),
            Err(response) => response,
        }
    }

    fn copy_document(&mut self, db: &str, id: &str, request: &Request) -> Response {
        let Some(destination) = request.header_value("Destination").map(str::to_string) else {
            return error(400, "bad_request", "Destination header is mandatory for COPY.");
        };
        let (dest_id, dest_rev) = match destination.split_once("?rev=") {
            Some((dest, rev)) => (dest.to_string(), Some(rev.to_string())),
            None => (destination.clone(), None),
        };

        let source = {
            let Some(doc) = self.docs(db).get(id) else {
                return missing("missing");
            };
            let revision = match request.query_value("rev") {
                Some(rev) => doc.position(rev).map(|p| &doc.history[p]),
                None => doc.latest().filter(|r| !r.deleted),
            };
            match revision {
                Some(r) if !r.compacted && !r.deleted => r.clone(),
                _ => return missing("missing"),
            }
        };

        if !self.writable(db, &dest_id, dest_rev.as_deref()) {
            return conflict();
        }
        let generation = self
            .docs(db)
            .get(&dest_id)
            .map_or(1, StoredDoc::next_generation);
        let rev = self.next_rev(generation, &source.body);
        let attachments = source
            .attachments
            .into_iter()
            .map(|(name, att)| {
                (
                    name,
                    StoredAttachment {
                        revpos: generation,
                        ..att
                    },
                )
            })
            .collect();
        self.docs(db)
            .entry(dest_id.clone())
            .or_default()
            .history
            .push(StoredRevision {
                rev: rev.clone(),
                body: source.body,
                attachments,
                deleted: false,
                compacted: false,
            });
        Response::json(201, json!({"id": dest_id, "rev": rev.as_str()}))
    }

    fn get_attachment(&mut self, db: &str, id: &str, name: &str, request: &Request) -> Response {
        let Some(doc) = self.docs(db).get(id) else {
            return missing("missing");
        };
        let revision = match request.query_value("rev") {
            Some(rev) => doc.position(rev).map(|p| &doc.history[p]),
            None => doc.latest().filter(|r| !r.deleted),
        };
        match revision.and_then(|r| r.attachments.get(name)) {
            Some(att) => Response::new(
                200,
                Body::Bytes {
                    content_type: att.content_type.clone(),
                    data: att.data.clone(),
                },
            )
            .with_header("Content-Type", att.content_type.clone()),
            None => missing("Document is missing attachment"),
        }
    }

    fn put_attachment(&mut self, db: &str, id: &str, name: &str, request: &Request) -> Response {
        let (content_type, data) = match &request.body {
            Body::Bytes { content_type, data } => (content_type.clone(), data.clone()),
            Body::Json(value) => ("application/json".to_string(), value.to_string().into_bytes()),
            Body::Empty => ("application/octet-stream".to_string(), Vec::new()),
        };
        let rev = request.query_value("rev").map(str::to_string);
        if !self.writable(db, id, rev.as_deref()) {
            return conflict();
        }
        self.rewrite(db, id, |attachments, generation| {
            attachments.insert(
                name.to_string(),
                StoredAttachment {
                    content_type,
                    data,
                    revpos: generation,
                },
            );
            true
        })
        .map_or_else(|| missing("missing"), |rev| ack(201, id, &rev))
    }

    fn delete_attachment(
        &mut self,
        db: &str,
        id: &str,
        name: &str,
        request: &Request,
    ) -> Response {
        let live = self.docs(db).get(id).is_some_and(StoredDoc::is_live);
        if !live {
            return missing("missing");
        }
        let rev = request.query_value("rev").map(str::to_string);
        if rev.is_none() || !self.writable(db, id, rev.as_deref()) {
            return conflict();
        }
        self.rewrite(db, id, |attachments, _| attachments.remove(name).is_some())
            .map_or_else(
                || missing("Document is missing attachment"),
                |rev| ack(200, id, &rev),
            )
    }

    /// New revision carrying the latest body with edited attachments
    ///
    /// Returns `None` without writing when `edit` reports no change.
    fn rewrite(
        &mut self,
        db: &str,
        id: &str,
        edit: impl FnOnce(&mut BTreeMap<String, StoredAttachment>, u64) -> bool,
    ) -> Option<Revision> {
        let (generation, body, mut attachments) = {
            let doc = self.docs(db).entry(id.to_string()).or_default();
            let generation = doc.next_generation();
            match doc.latest().filter(|r| !r.deleted) {
                Some(latest) => (generation, latest.body.clone(), latest.attachments.clone()),
                None => (generation, JsonMap::new(), BTreeMap::new()),
            }
        };
        if !edit(&mut attachments, generation) {
            return None;
        }
        let rev = self.next_rev(generation, &body);
        self.docs(db)
            .entry(id.to_string())
            .or_default()
            .history
            .push(StoredRevision {
                rev: rev.clone(),
                body,
                attachments,
                deleted: false,
                compacted: false,
            });
        Some(rev)
    }
}

impl MemoryCouch {
    /// Create an empty server
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a database (no-op if it exists)
    pub fn create_database(&self, name: &str) {
        self.inner
            .lock()
            .databases
            .entry(name.to_string())
            .or_default();
    }

    /// Latest live revision of a document, as the server would return it
    pub fn document(&self, db: &str, id: &str) -> Option<JsonMap> {
        let server = self.inner.lock();
        let doc = server.databases.get(db)?.get(id)?;
        let latest = doc.latest().filter(|r| !r.deleted)?;
        Some(render(id, latest))
    }

    /// Write a document directly, bypassing revision checks
    ///
    /// Simulates another client updating the document. Returns the new
    /// revision.
    pub fn overwrite(&self, db: &str, id: &str, body: Value) -> Revision {
        let mut server = self.inner.lock();
        let mut map = match body {
            Value::Object(map) => map,
            other => {
                let mut map = JsonMap::new();
                map.insert("value".into(), other);
                map
            }
        };
        map.remove("_attachments");
        let attachments = server
            .docs(db)
            .get(id)
            .and_then(|d| d.latest().filter(|r| !r.deleted))
            .map(|r| r.attachments.clone())
            .unwrap_or_default();
        strip_reserved(&mut map);
        let generation = server
            .docs(db)
            .get(id)
            .map_or(1, StoredDoc::next_generation);
        let rev = server.next_rev(generation, &map);
        server
            .docs(db)
            .entry(id.to_string())
            .or_default()
            .history
            .push(StoredRevision {
                rev: rev.clone(),
                body: map,
                attachments,
                deleted: false,
                compacted: false,
            });
        rev
    }

    /// Drop the bodies of every non-latest revision in a database
    pub fn compact(&self, db: &str) {
        let mut server = self.inner.lock();
        if let Some(docs) = server.databases.get_mut(db) {
            for doc in docs.values_mut() {
                let last = doc.history.len().saturating_sub(1);
                for revision in &mut doc.history[..last] {
                    revision.compacted = true;
                }
            }
        }
    }

    /// Number of revisions stored for a document, tombstones included
    pub fn revision_count(&self, db: &str, id: &str) -> usize {
        self.inner
            .lock()
            .databases
            .get(db)
            .and_then(|docs| docs.get(id))
            .map_or(0, |doc| doc.history.len())
    }

    /// Every request received so far, as `(method, encoded path)`
    pub fn requests(&self) -> Vec<(Method, String)> {
        self.inner.lock().requests.clone()
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.inner.lock().requests.len()
    }
}

impl Transport for MemoryCouch {
    fn send(&self, request: Request) -> Result<Response, TransportError> {
        let mut server = self.inner.lock();
        server
            .requests
            .push((request.method, request.path_string()));
        Ok(server.handle(&request))
    }
}
