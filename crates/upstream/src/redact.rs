//! Redaction helpers for anything that ends up in logs or error messages.

use std::fmt::Write as _;
use url::Url;

/// `scheme://host[:port]/path`. Userinfo, query and fragment are never rendered.
#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut out = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        let _ = write!(out, ":{port}");
    }
    out.push_str(url.path());
    out
}

/// Describe a failed request by category, the redacted URL and the source chain.
///
/// reqwest's own `Display` embeds the full request URL, query string included.
#[must_use]
pub fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let what = if e.is_timeout() {
        "request timed out"
    } else if e.is_connect() {
        "connection failed"
    } else if e.is_body() || e.is_decode() {
        "failed to read response body"
    } else {
        "request failed"
    };

    let mut msg = match e.url() {
        Some(url) => format!("{what} for {}", redact_url(url)),
        None => what.to_string(),
    };
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        let _ = write!(msg, ": {cause}");
        source = cause.source();
    }
    msg
}
