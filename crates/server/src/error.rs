//! Error types for the tool server.

use collab_mcp_upstream::UpstreamError;
use serde_json::{Value, json};
use thiserror::Error;

/// Why a tool invocation did not produce a result.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The tool name is not in the catalog of any enabled backend.
    #[error("unknown tool '{name}'{}", did_you_mean(.suggestions))]
    UnknownTool {
        name: String,
        suggestions: Vec<String>,
    },

    /// Missing, unknown or wrongly-typed arguments, or a violated cross-field rule.
    #[error("invalid arguments: {0}")]
    InvalidArgument(String),

    /// No credential is registered for the principal on this backend.
    #[error("no {backend} credential for principal '{principal}'")]
    Unauthenticated { backend: String, principal: String },

    /// A mutating tool was called with the readonly marker set.
    #[error("tool '{tool}' modifies upstream state and the request is readonly")]
    ForbiddenByPolicy { tool: String },

    /// A prerequisite read did not return what the follow-up call needs.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// The backend answered with a non-2xx status.
    #[error("upstream returned HTTP {status}: {body}")]
    Upstream { status: u16, body: Value },

    /// The backend could not be reached.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ToolError {
    /// Stable machine-readable category.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool { .. } | Self::InvalidArgument(_) => "invalid_argument",
            Self::Unauthenticated { .. } => "unauthenticated",
            Self::ForbiddenByPolicy { .. } => "forbidden_by_policy",
            Self::PreconditionFailed(_) => "precondition_failed",
            Self::Upstream { .. } => "upstream_error",
            Self::Transport(_) => "transport_error",
        }
    }

    /// `{"error": {kind, message, status?, body?}}`
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut error = json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        if let Self::Upstream { status, body } = self {
            error["status"] = json!(status);
            error["body"] = body.clone();
        }
        json!({ "error": error })
    }
}

impl From<UpstreamError> for ToolError {
    fn from(value: UpstreamError) -> Self {
        match value {
            UpstreamError::Status { status, body } => Self::Upstream { status, body },
            UpstreamError::Transport(msg) => Self::Transport(msg),
            // Only reachable if a request cannot be turned into a URL.
            UpstreamError::Config(msg) => Self::Transport(msg),
        }
    }
}

fn did_you_mean(suggestions: &[String]) -> String {
    match suggestions {
        [] => String::new(),
        [one] => format!(" (did you mean '{one}'?)"),
        many => format!(" (did you mean one of: {}?)", many.join(", ")),
    }
}

/// Startup configuration errors. The binary exits before binding when one is returned.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("failed to read credentials file {path}: {source}")]
    CredentialsIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse credentials file {path}: {source}")]
    CredentialsYaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("backend '{name}' is misconfigured: {source}")]
    Backend {
        name: String,
        #[source]
        source: UpstreamError,
    },
}

pub type Result<T> = std::result::Result<T, ToolError>;
