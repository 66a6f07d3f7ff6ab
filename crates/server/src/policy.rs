//! Per-request policy derived from inbound HTTP headers.

use axum::http::HeaderMap;

/// Truthy values block mutating tools for the request.
pub const READONLY_HEADER: &str = "x-mcp-readonly";
/// Names the principal whose credential is used. Absent means the default principal.
pub const PRINCIPAL_HEADER: &str = "x-mcp-user";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestPolicy {
    pub readonly: bool,
    pub principal: Option<String>,
}

impl RequestPolicy {
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let readonly = headers
            .get(READONLY_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(is_truthy);
        let principal = headers
            .get(PRINCIPAL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        Self {
            readonly,
            principal,
        }
    }
}

/// `1 | true | yes | on`, case-insensitive.
#[must_use]
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
