//! Response type and status classification
//!
//! Transports return every HTTP status as a [`Response`]; turning statuses
//! into errors happens here so all transports classify identically:
//!
//! | Status | Result |
//! |--------|--------|
//! | 2xx | `Ok` |
//! | 404 | `Error::NotFound` |
//! | 409 | `Error::RevisionConflict` |
//! | other | `Error::Server` |

use crate::request::{Body, Headers};
use serde_json::Value;
use settee_core::{Error, JsonMap, Result, Revision};

/// A transport-neutral response
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Headers, names lower-cased
    pub headers: Headers,
    /// Decoded payload
    pub body: Body,
}

/// `{"id", "rev"}` acknowledgement returned by successful writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteAck {
    /// Document id as stored by the server
    pub id: String,
    /// Revision assigned by the write
    pub rev: Revision,
}

impl Response {
    /// Create a response with no headers
    pub fn new(status: u16, body: Body) -> Self {
        Response {
            status,
            headers: Headers::new(),
            body,
        }
    }

    /// Create a JSON response
    pub fn json(status: u16, value: Value) -> Self {
        Response::new(status, Body::Json(value))
    }

    /// Create a response with no payload
    pub fn empty(status: u16) -> Self {
        Response::new(status, Body::Empty)
    }

    /// Add a header (the name is lower-cased)
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Look up a header by name, ignoring case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Revision carried by the `ETag` header, quotes stripped
    pub fn etag(&self) -> Option<Revision> {
        self.header("etag")
            .map(|tag| tag.trim().trim_matches('"'))
            .filter(|tag| !tag.is_empty())
            .map(Revision::new)
    }

    /// Check for a 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Classify the status, passing successful responses through
    ///
    /// `path` is only used to label the error.
    pub fn error_for_status(self, path: &str) -> Result<Response> {
        if self.is_success() {
            return Ok(self);
        }
        let (error, reason) = self.error_fields();
        match self.status {
            404 => Err(Error::NotFound {
                path: path.to_string(),
            }),
            409 => Err(Error::RevisionConflict {
                path: path.to_string(),
                reason,
            }),
            status => Err(Error::Server {
                status,
                path: path.to_string(),
                error,
                reason,
            }),
        }
    }

    /// Take the payload as a JSON object
    pub fn into_json_map(self) -> Result<JsonMap> {
        self.body.into_json_map()
    }

    /// Decode a write acknowledgement
    ///
    /// # Errors
    ///
    /// `Error::Protocol` when `id` or `rev` is missing.
    pub fn write_ack(self) -> Result<WriteAck> {
        let map = self.into_json_map()?;
        let id = map
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::protocol("write response has no id"))?;
        let rev = map
            .get("rev")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::protocol("write response has no rev"))?;
        Ok(WriteAck {
            id: id.to_string(),
            rev: Revision::new(rev),
        })
    }

    fn error_fields(&self) -> (String, String) {
        let field = |name: &str| {
            self.body
                .as_json()
                .and_then(|v| v.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let error = field("error").unwrap_or_else(|| format!("http_{}", self.status));
        let reason = field("reason").unwrap_or_default();
        (error, reason)
    }
}
