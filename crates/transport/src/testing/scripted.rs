//! Transport that replays a fixed script

use crate::request::Request;
use crate::response::Response;
use crate::transport::Transport;
use parking_lot::Mutex;
use serde_json::Value;
use settee_core::TransportError;
use std::collections::VecDeque;

/// Replays queued outcomes in order and records every request it receives
///
/// An exhausted script answers with a network error so unexpected calls
/// surface as failures instead of hanging.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<Response, TransportError>>>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedTransport {
    /// Create an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response
    pub fn respond(&self, response: Response) -> &Self {
        self.script.lock().push_back(Ok(response));
        self
    }

    /// Queue a JSON response
    pub fn respond_json(&self, status: u16, body: Value) -> &Self {
        self.respond(Response::json(status, body))
    }

    /// Queue a transport failure
    pub fn fail(&self, error: TransportError) -> &Self {
        self.script.lock().push_back(Err(error));
        self
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    /// Most recent request
    pub fn last_request(&self) -> Option<Request> {
        self.requests.lock().last().cloned()
    }

    /// Number of requests received
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Number of queued outcomes not yet consumed
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: Request) -> Result<Response, TransportError> {
        let path = request.path_string();
        self.requests.lock().push(request);
        self.script.lock().pop_front().unwrap_or_else(|| {
            Err(TransportError::Network(format!(
                "script exhausted at {}",
                path
            )))
        })
    }
}
