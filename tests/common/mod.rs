//! Shared test utilities for the integration suites.
//!
//! Import via `mod common;` from any test's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::sync::Once;

pub use serde_json::{json, Value};
pub use settee::testing::{MemoryCouch, ScriptedTransport};
pub use settee::{Client, Database, DocState, Document, Error, JsonMap, OpenOptions, Revision};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route `settee::*` logs to the test harness output
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// Fixtures
// ============================================================================

/// In-memory server with the given databases and a client over it
pub fn memory_client(databases: &[&str]) -> (MemoryCouch, Client) {
    init_tracing();
    let couch = MemoryCouch::new();
    for name in databases {
        couch.create_database(name);
    }
    let client = Client::new(couch.clone());
    (couch, client)
}

/// Turn a JSON object literal into a body
pub fn body(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        other => panic!("Expected object, got {}", other),
    }
}
