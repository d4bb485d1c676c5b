//! Settee - document-modeling client for CouchDB-style databases
//!
//! Settee maps documents in a remote HTTP/JSON database onto local objects
//! whose lifecycle is tracked explicitly. Every document is in exactly one
//! of five states (FRESH, VALID, DIRTY, STALE, EVICTED), operations that
//! would lose data are refused before any request is sent, and each
//! database session keeps at most one in-memory instance per document id.
//!
//! # Quick Start
//!
//! ```ignore
//! use settee::{Client, JsonMap};
//!
//! let client = Client::connect("http://localhost:5984")?;
//! let db = client.database("recipes")?;
//!
//! let doc = db.new_document(Some("Fishstew"), JsonMap::new())?;
//! doc.set("servings", 4)?;
//! doc.create()?;
//!
//! // Any handle for the id is the same instance
//! let again = db.document("Fishstew")?;
//! assert!(again.ptr_eq(&doc));
//! ```
//!
//! # Architecture
//!
//! - `settee-core`: identifiers, states, errors, body helpers
//! - `settee-transport`: the [`Transport`] seam, HTTP and in-memory servers
//! - `settee-model`: lifecycle, identity registry, documents and sessions

pub use settee_core::{
    AttachmentStub, DatabaseName, DocId, DocState, Error, JsonMap, Operation, Result,
    RevisionInfo, RevisionStatus, Revision, TransportError,
};
pub use settee_model::{
    Attachment, Client, ClientConfig, CopyOutcome, Database, Document, DocumentRef,
    HistoricalDocument, IdentityRegistry, OpenOptions, RegistryStats, CONFIG_FILE_NAME,
};
pub use settee_transport::{HttpOptions, HttpTransport, Transport};

/// In-process servers for tests and examples
pub mod testing {
    pub use settee_transport::testing::{MemoryCouch, ScriptedTransport};
}
