//! Test transports
//!
//! - **ScriptedTransport**: replays queued responses and records requests
//! - **MemoryCouch**: in-memory server with CouchDB revision semantics
//!
//! # Example
//!
//! ```ignore
//! use settee_transport::testing::MemoryCouch;
//!
//! let couch = MemoryCouch::new();
//! couch.create_database("recipes");
//! let client = Client::new(couch.clone());
//! ```

mod memory;
mod scripted;

pub use memory::MemoryCouch;
pub use scripted::ScriptedTransport;
