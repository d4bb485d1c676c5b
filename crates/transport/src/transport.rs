//! The transport capability
//!
//! Everything the document layer needs from the network goes through
//! [`Transport::send`]. The provided methods name the verbs the lifecycle
//! uses so call sites read as `transport.write(..)` rather than building
//! requests by hand.

use crate::request::{Body, Headers, Method, Request};
use crate::response::Response;
use settee_core::TransportError;

/// Blocking request/response capability
///
/// Implementations must return every HTTP status as a [`Response`] and
/// reserve `TransportError` for failures where no status is available.
pub trait Transport: Send + Sync {
    /// Perform one request
    fn send(&self, request: Request) -> Result<Response, TransportError>;

    /// GET a resource
    fn read(
        &self,
        path: Vec<String>,
        headers: &Headers,
        query: &[(String, String)],
    ) -> Result<Response, TransportError> {
        self.send(
            Request::new(Method::Get, path)
                .headers(headers)
                .queries(query),
        )
    }

    /// GET a resource whose payload must come back byte for byte
    fn read_raw(
        &self,
        path: Vec<String>,
        headers: &Headers,
        query: &[(String, String)],
    ) -> Result<Response, TransportError> {
        self.send(
            Request::new(Method::Get, path)
                .headers(headers)
                .queries(query)
                .raw(),
        )
    }

    /// POST a new resource
    fn create(
        &self,
        path: Vec<String>,
        headers: &Headers,
        body: Body,
        query: &[(String, String)],
    ) -> Result<Response, TransportError> {
        self.send(
            Request::new(Method::Post, path)
                .headers(headers)
                .queries(query)
                .body(body),
        )
    }

    /// PUT a resource
    fn write(
        &self,
        path: Vec<String>,
        headers: &Headers,
        body: Body,
        query: &[(String, String)],
    ) -> Result<Response, TransportError> {
        self.send(
            Request::new(Method::Put, path)
                .headers(headers)
                .queries(query)
                .body(body),
        )
    }

    /// DELETE a resource
    fn delete(
        &self,
        path: Vec<String>,
        headers: &Headers,
        query: &[(String, String)],
    ) -> Result<Response, TransportError> {
        self.send(
            Request::new(Method::Delete, path)
                .headers(headers)
                .queries(query),
        )
    }

    /// HEAD a resource
    fn head(
        &self,
        path: Vec<String>,
        headers: &Headers,
        query: &[(String, String)],
    ) -> Result<Response, TransportError> {
        self.send(
            Request::new(Method::Head, path)
                .headers(headers)
                .queries(query),
        )
    }

    /// COPY a resource to `destination` (the raw `Destination` header value)
    fn copy(
        &self,
        path: Vec<String>,
        destination: &str,
        headers: &Headers,
        query: &[(String, String)],
    ) -> Result<Response, TransportError> {
        self.send(
            Request::new(Method::Copy, path)
                .headers(headers)
                .header("Destination", destination)
                .queries(query),
        )
    }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn send(&self, request: Request) -> Result<Response, TransportError> {
        (**self).send(request)
    }
}
