//! Static configuration for one upstream backend.

use std::time::Duration;

/// Default per-request deadline applied to every upstream call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How the caller's token is attached to outbound requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`.
    Bearer,
    /// A custom header carrying the raw token (e.g. `PRIVATE-TOKEN`).
    Header { name: String },
}

/// Where a backend lives and how to talk to it.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// API root, e.g. `https://api.github.com` or `https://wiki.example.com/rest/api`.
    pub base_url: String,
    pub auth: AuthScheme,
    /// Headers sent with every request (after auth).
    pub headers: Vec<(String, String)>,
    /// Per-request timeout. `Duration::ZERO` is rejected by [`crate::UpstreamClient::new`].
    pub timeout: Duration,
}

impl BackendConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, auth: AuthScheme) -> Self {
        Self {
            base_url: base_url.into(),
            auth,
            headers: vec![("Accept".to_string(), "application/json".to_string())],
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Replace the default `Accept` header and append any extra headers.
    #[must_use]
    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        for (name, value) in headers {
            if let Some(existing) = self
                .headers
                .iter_mut()
                .find(|(k, _)| k.eq_ignore_ascii_case(&name))
            {
                existing.1 = value;
            } else {
                self.headers.push((name, value));
            }
        }
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
