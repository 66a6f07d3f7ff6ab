//! One-shot REST calls against a configured backend.

use crate::config::{AuthScheme, BackendConfig};
use crate::error::{Result, UpstreamError};
use crate::redact::redact_url;
use reqwest::{Client, Method};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// A single REST request, relative to a backend's base URL.
///
/// Path segments are percent-encoded individually, so a segment may safely contain `/`
/// (GitLab project ids like `group/project`, repository file paths).
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub method: Method,
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl UpstreamRequest {
    #[must_use]
    pub fn new(method: Method) -> Self {
        Self {
            method,
            segments: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    #[must_use]
    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    #[must_use]
    pub fn put() -> Self {
        Self::new(Method::PUT)
    }

    #[must_use]
    pub fn patch() -> Self {
        Self::new(Method::PATCH)
    }

    #[must_use]
    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    /// Append one path segment verbatim (it will be percent-encoded as a whole).
    #[must_use]
    pub fn segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Append a static `/`-separated path. Empty pieces are skipped.
    #[must_use]
    pub fn path(mut self, path: &str) -> Self {
        self.segments.extend(
            path.split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        self
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// HTTP client bound to one backend.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct UpstreamClient {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    base_url: Url,
    auth: AuthScheme,
    headers: Vec<(String, String)>,
    client: Client,
    timeout: Duration,
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("name", &self.inner.name)
            .field("base_url", &redact_url(&self.inner.base_url))
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

impl UpstreamClient {
    /// Build a client for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Config`] if the base URL is not an absolute http(s) URL, if the
    /// timeout is zero, or if the HTTP client cannot be constructed.
    pub fn new(name: impl Into<String>, config: BackendConfig) -> Result<Self> {
        let name = name.into();
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            UpstreamError::Config(format!(
                "invalid base URL '{}' for backend '{name}': {e}",
                config.base_url
            ))
        })?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(UpstreamError::Config(format!(
                "base URL for backend '{name}' must be an absolute http(s) URL"
            )));
        }
        if config.timeout.is_zero() {
            return Err(UpstreamError::Config(format!(
                "timeout for backend '{name}' must be greater than zero"
            )));
        }

        let client = Client::builder()
            .user_agent(concat!("collab-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpstreamError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner: Arc::new(Inner {
                name,
                base_url,
                auth: config.auth,
                headers: config.headers,
                client,
                timeout: config.timeout,
            }),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Resolve `req` against the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Config`] if the base URL cannot carry path segments, or if a
    /// segment is `.` or `..` (the URL would be normalized to a different resource).
    pub fn build_url(&self, req: &UpstreamRequest) -> Result<Url> {
        if let Some(dot) = req.segments.iter().find(|s| *s == "." || *s == "..") {
            return Err(UpstreamError::Config(format!(
                "refusing '{dot}' path segment for backend '{}'",
                self.inner.name
            )));
        }
        let mut url = self.inner.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                UpstreamError::Config(format!(
                    "base URL for backend '{}' cannot carry a path",
                    self.inner.name
                ))
            })?;
            segments.pop_if_empty();
            segments.extend(req.segments.iter());
        }
        if !req.query.is_empty() {
            url.query_pairs_mut().extend_pairs(req.query.iter());
        }
        Ok(url)
    }

    /// Send `req` with `token` attached and normalize the outcome.
    ///
    /// On 2xx the body is decoded as JSON; an empty body becomes `{}` and a non-JSON body
    /// becomes `{"raw": "<text>"}`. Any other status becomes [`UpstreamError::Status`].
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Status`] for non-2xx responses and
    /// [`UpstreamError::Transport`] when the backend cannot be reached in time.
    pub async fn send(&self, token: &str, req: UpstreamRequest) -> Result<Value> {
        let url = self.build_url(&req)?;
        debug!(
            backend = %self.inner.name,
            method = %req.method,
            url = %redact_url(&url),
            "upstream request"
        );

        let mut request = self.inner.client.request(req.method.clone(), url);
        request = match &self.inner.auth {
            AuthScheme::Bearer => request.bearer_auth(token),
            AuthScheme::Header { name } => request.header(name, token),
        };
        for (key, value) in &self.inner.headers {
            request = request.header(key, value);
        }
        if let Some(body) = &req.body {
            request = request.json(body);
        }
        request = request.timeout(self.inner.timeout);

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        debug!(
            backend = %self.inner.name,
            status = status.as_u16(),
            "upstream response"
        );

        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(json!({}));
            }
            Ok(serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw": text })))
        } else {
            let body = serde_json::from_str(&text).unwrap_or_else(|_| json!(text));
            Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}
