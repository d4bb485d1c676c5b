//! Core types for Settee
//!
//! This crate defines the foundational types shared by the transport and
//! document-modeling layers:
//! - DocId / Revision / DatabaseName: validated identifiers
//! - DocState / Operation: the vocabulary of the document lifecycle
//! - Error / TransportError: the error taxonomy
//! - body: reserved document keys, attachment stubs, revision metadata

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod body;
pub mod error;
pub mod state;
pub mod types;

pub use body::{
    AttachmentStub, JsonMap, RevisionInfo, RevisionStatus, KEY_ATTACHMENTS, KEY_DELETED, KEY_ID,
    KEY_REV, RESERVED_KEYS,
};
pub use error::{Error, Result, TransportError};
pub use state::{DocState, Operation};
pub use types::{DatabaseName, DocId, Revision};
