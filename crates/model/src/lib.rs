//! Document modeling for Settee
//!
//! This crate turns raw CouchDB documents into tracked objects:
//! - lifecycle: the FRESH / VALID / DIRTY / STALE / EVICTED state machine
//! - registry: one in-memory instance per document id, per database
//! - document: handles with field access, network operations and attachments
//! - historical: read-only snapshots of past revisions
//! - database / client: sessions that construct every document
//! - config: `settee.toml`
//!
//! # Example
//!
//! ```ignore
//! use settee_model::Client;
//!
//! let client = Client::connect("http://localhost:5984")?;
//! let db = client.database("recipes")?;
//! let doc = db.get("Fishstew")?;
//! doc.set("servings", 6)?;
//! doc.update()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod database;
pub mod document;
pub mod historical;
pub mod lifecycle;
pub mod registry;

pub use client::Client;
pub use config::{ClientConfig, CONFIG_FILE_NAME, DEFAULT_CACHE_CAPACITY, DEFAULT_URL};
pub use database::Database;
pub use document::{Attachment, CopyOutcome, Document};
pub use historical::{DocumentRef, HistoricalDocument, OpenOptions};
pub use lifecycle::{Event, Instantiation, Prior, Refusal};
pub use registry::{IdentityRegistry, RegistryStats};
