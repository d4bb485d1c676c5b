//! Test utilities for the lifecycle suite
//!
//! Every test gets its own in-memory server with one database, `recipes`.

#![allow(dead_code)]

pub use serde_json::{json, Value};
pub use settee_core::{DocState, Error, JsonMap, Revision};
pub use settee_model::{Client, Database, Document, DocumentRef, OpenOptions};
pub use settee_transport::testing::MemoryCouch;

pub const DB: &str = "recipes";

/// Server plus a database session with the default cache
pub fn setup() -> (MemoryCouch, Database) {
    setup_with_capacity(settee_model::DEFAULT_CACHE_CAPACITY)
}

/// Server plus a database session whose cache holds `capacity` documents
pub fn setup_with_capacity(capacity: usize) -> (MemoryCouch, Database) {
    let couch = MemoryCouch::new();
    couch.create_database(DB);
    let client = Client::new(couch.clone()).with_cache_capacity(capacity);
    let db = client.database(DB).expect("valid database name");
    (couch, db)
}

/// Turn a JSON object literal into a body
pub fn body(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        other => panic!("Expected object, got {}", other),
    }
}

/// Create `id` through the model and return the VALID instance
pub fn create_doc(db: &Database, id: &str, value: Value) -> Document {
    let doc = db
        .new_document(Some(id), body(value))
        .expect("construct document");
    doc.create().expect("create document");
    assert_eq!(doc.state(), DocState::Valid);
    doc
}

/// Latest revision the server holds for `id`
pub fn server_rev(couch: &MemoryCouch, id: &str) -> Option<Revision> {
    couch
        .document(DB, id)
        .and_then(|doc| doc.get("_rev").and_then(Value::as_str).map(Revision::new))
}

/// Assert an operation was refused as an illegal transition
pub fn assert_illegal<T: std::fmt::Debug>(result: settee_core::Result<T>) {
    match result {
        Err(Error::IllegalTransition { .. }) => {}
        other => panic!("Expected IllegalTransition, got {:?}", other),
    }
}
