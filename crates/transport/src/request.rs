//! Request and body types
//!
//! A [`Request`] names its resource by path segments below the server root
//! (`["recipes", "Fishstew"]`), never by a pre-joined URL. Segments are
//! percent-encoded only when a transport renders them, so `a/b` stays one
//! segment and becomes `a%2Fb` on the wire.

use settee_core::{Error, JsonMap, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// Request headers (names compared case-insensitively by transports)
pub type Headers = BTreeMap<String, String>;

/// HTTP verbs used by the document layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Probe
    Head,
    /// Read
    Get,
    /// Create
    Post,
    /// Write
    Put,
    /// Delete
    Delete,
    /// Server-side copy (CouchDB extension)
    Copy,
}

impl Method {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Head => "HEAD",
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Copy => "COPY",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request or response payload
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    /// No payload
    #[default]
    Empty,
    /// JSON document
    Json(Value),
    /// Opaque bytes (attachments)
    Bytes {
        /// MIME type
        content_type: String,
        /// Raw content
        data: Vec<u8>,
    },
}

impl Body {
    /// Check if there is no payload
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// Borrow the JSON payload, if any
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Take the payload as a JSON object
    ///
    /// # Errors
    ///
    /// `Error::Protocol` when the payload is missing or not an object.
    pub fn into_json_map(self) -> Result<JsonMap> {
        match self {
            Body::Json(Value::Object(map)) => Ok(map),
            Body::Json(other) => Err(Error::protocol(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
            Body::Empty => Err(Error::protocol("expected a JSON object, got no body")),
            Body::Bytes { content_type, .. } => Err(Error::protocol(format!(
                "expected a JSON object, got {} bytes",
                content_type
            ))),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Percent-encode path segments into `/a/b`, or `/` when there are none
pub fn encode_path(segments: &[String]) -> String {
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        out.push_str(&urlencoding::encode(segment));
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// A transport-neutral request
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// HTTP verb
    pub method: Method,
    /// Path segments below the server root
    pub path: Vec<String>,
    /// Request headers
    pub headers: Headers,
    /// Query parameters, in order
    pub query: Vec<(String, String)>,
    /// Payload
    pub body: Body,
    /// Hand a successful response body back as bytes, whatever its content type
    pub raw: bool,
}

impl Request {
    /// Create a request with no headers, query or body
    pub fn new(method: Method, path: Vec<String>) -> Self {
        Request {
            method,
            path,
            headers: Headers::new(),
            query: Vec::new(),
            body: Body::Empty,
            raw: false,
        }
    }

    /// Add one header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Merge a set of headers, later values winning
    pub fn headers(mut self, headers: &Headers) -> Self {
        for (name, value) in headers {
            self.headers.insert(name.clone(), value.clone());
        }
        self
    }

    /// Append one query parameter
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Append several query parameters
    pub fn queries(mut self, query: &[(String, String)]) -> Self {
        self.query.extend(query.iter().cloned());
        self
    }

    /// Attach a payload
    pub fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Keep the response payload undecoded
    pub fn raw(mut self) -> Self {
        self.raw = true;
        self
    }

    /// Look up a query parameter
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Look up a header, ignoring case
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Encoded path, always starting with `/`
    pub fn path_string(&self) -> String {
        encode_path(&self.path)
    }

    /// Encoded query string without the leading `?` (empty when no params)
    pub fn query_string(&self) -> String {
        self.query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}
