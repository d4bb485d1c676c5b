//! Transport capability for Settee
//!
//! The document layer never talks HTTP directly. It builds [`Request`]s,
//! hands them to a [`Transport`], and classifies the [`Response`] with
//! [`Response::error_for_status`].
//!
//! - [`HttpTransport`]: blocking HTTP via `ureq`
//! - [`testing`]: scripted and in-memory transports for tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod http;
pub mod request;
pub mod response;
pub mod testing;
pub mod transport;

pub use http::{HttpOptions, HttpTransport, DEFAULT_MAX_BODY_BYTES};
pub use request::{encode_path, Body, Headers, Method, Request};
pub use response::{Response, WriteAck};
pub use transport::Transport;
