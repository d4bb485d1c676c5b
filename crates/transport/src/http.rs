//! Blocking HTTP transport backed by `ureq`

use crate::request::{Body, Headers, Method, Request};
use crate::response::Response;
use crate::transport::Transport;
use base64::Engine;
use settee_core::TransportError;
use std::time::{Duration, Instant};

/// Largest response body read by default (1 GiB)
pub const DEFAULT_MAX_BODY_BYTES: u64 = 1 << 30;

/// Connection options for [`HttpTransport`]
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Global per-request timeout
    pub timeout: Duration,
    /// Static basic-auth credentials
    pub credentials: Option<(String, String)>,
    /// Headers added to every request
    pub headers: Headers,
    /// Upper bound on a response body, in bytes
    pub max_body_bytes: u64,
}

impl Default for HttpOptions {
    fn default() -> Self {
        HttpOptions {
            timeout: Duration::from_secs(30),
            credentials: None,
            headers: Headers::new(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// [`Transport`] speaking HTTP/1.1 to a CouchDB-compatible server
pub struct HttpTransport {
    agent: ureq::Agent,
    base_url: String,
    headers: Headers,
    authorization: Option<String>,
    max_body_bytes: u64,
}

impl HttpTransport {
    /// Create a transport rooted at `base_url` (e.g. `http://localhost:5984`)
    pub fn new(base_url: impl Into<String>, options: HttpOptions) -> Self {
        // Error statuses are classified by the caller, and COPY is not a
        // standard method as far as the agent is concerned.
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(options.timeout))
            .http_status_as_error(false)
            .allow_non_standard_methods(true)
            .build();
        let agent = ureq::Agent::new_with_config(config);

        let authorization = options.credentials.map(|(user, password)| {
            let token = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", user, password));
            format!("Basic {}", token)
        });

        HttpTransport {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            headers: options.headers,
            authorization,
            max_body_bytes: options.max_body_bytes,
        }
    }

    /// Server root this transport talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a request
    pub fn url_for(&self, request: &Request) -> String {
        let query = request.query_string();
        if query.is_empty() {
            format!("{}{}", self.base_url, request.path_string())
        } else {
            format!("{}{}?{}", self.base_url, request.path_string(), query)
        }
    }

    fn build(&self, request: &Request, url: &str) -> ureq::http::request::Builder {
        let mut builder = ureq::http::Request::builder()
            .method(request.method.as_str())
            .uri(url)
            .header("Accept", "application/json");
        if let Some(auth) = &self.authorization {
            builder = builder.header("Authorization", auth.as_str());
        }
        for (name, value) in self.headers.iter().chain(request.headers.iter()) {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }

    fn run(&self, request: &Request, url: &str) -> Result<Response, TransportError> {
        let builder = self.build(request, url);
        let result = match &request.body {
            Body::Empty => {
                let http_request = builder
                    .body(())
                    .map_err(|e| TransportError::Encode(e.to_string()))?;
                self.agent.run(http_request)
            }
            Body::Json(value) => {
                let bytes = serde_json::to_vec(value)
                    .map_err(|e| TransportError::Encode(e.to_string()))?;
                let http_request = builder
                    .header("Content-Type", "application/json")
                    .body(bytes)
                    .map_err(|e| TransportError::Encode(e.to_string()))?;
                self.agent.run(http_request)
            }
            Body::Bytes { content_type, data } => {
                let http_request = builder
                    .header("Content-Type", content_type.as_str())
                    .body(data.clone())
                    .map_err(|e| TransportError::Encode(e.to_string()))?;
                self.agent.run(http_request)
            }
        };
        let mut response = result.map_err(map_ureq_error)?;

        let status = response.status().as_u16();
        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_ascii_lowercase(), value.to_string());
            }
        }

        let data = if request.method == Method::Head {
            Vec::new()
        } else {
            response
                .body_mut()
                .with_config()
                .limit(self.max_body_bytes)
                .read_to_vec()
                .map_err(|e| TransportError::Network(format!("failed to read response: {}", e)))?
        };

        Ok(Response {
            status,
            body: decode_body(&headers, data, request.raw && (200..300).contains(&status))?,
            headers,
        })
    }
}

fn map_ureq_error(error: ureq::Error) -> TransportError {
    match error {
        ureq::Error::Timeout(_) => TransportError::Timeout,
        other => TransportError::Network(other.to_string()),
    }
}

/// Turn a payload into a [`Body`]. JSON content types are parsed unless
/// `raw` is set.
fn decode_body(headers: &Headers, data: Vec<u8>, raw: bool) -> Result<Body, TransportError> {
    if data.is_empty() {
        return Ok(Body::Empty);
    }
    let content_type = headers
        .get("content-type")
        .cloned()
        .unwrap_or_else(|| "application/octet-stream".to_string());
    if !raw && content_type.contains("json") {
        let value = serde_json::from_slice(&data)
            .map_err(|e| TransportError::Decode(format!("invalid JSON response: {}", e)))?;
        Ok(Body::Json(value))
    } else {
        Ok(Body::Bytes { content_type, data })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: Request) -> Result<Response, TransportError> {
        let url = self.url_for(&request);
        let started = Instant::now();
        match self.run(&request, &url) {
            Ok(response) => {
                tracing::debug!(
                    target: "settee::http",
                    method = %request.method,
                    url = %url,
                    status = response.status,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "request completed"
                );
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(
                    target: "settee::http",
                    method = %request.method,
                    url = %url,
                    error = %e,
                    "request failed"
                );
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("headers", &self.headers)
            .field("authenticated", &self.authorization.is_some())
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}
