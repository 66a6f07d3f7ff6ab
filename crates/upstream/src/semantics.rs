//! HTTP semantics helpers.
//!
//! Tools are classified by the HTTP method of the upstream call they perform. The classification
//! drives both the MCP `ToolAnnotations` advertised in `tools/list` and readonly-policy
//! enforcement in the dispatcher.

use reqwest::Method;
use rmcp::model::ToolAnnotations;

/// Whether a tool may change upstream state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// GET / HEAD / OPTIONS.
    ReadOnly,
    /// POST: creates something new, leaves existing state alone.
    Additive,
    /// PUT / PATCH / DELETE, and any extension method we don't recognize.
    Destructive,
}

impl Access {
    #[must_use]
    pub fn of(method: &Method) -> Self {
        if method == Method::GET || method == Method::HEAD || method == Method::OPTIONS {
            Self::ReadOnly
        } else if method == Method::POST {
            Self::Additive
        } else {
            Self::Destructive
        }
    }

    #[must_use]
    pub const fn is_mutating(self) -> bool {
        !matches!(self, Self::ReadOnly)
    }
}

/// Generate MCP tool annotations for a tool whose primary upstream call uses `method`.
///
/// `openWorldHint` is always `true`: every tool talks to an external system.
#[must_use]
pub fn annotations_for(title: &str, method: &Method) -> ToolAnnotations {
    let access = Access::of(method);
    let idempotent_hint = if method == Method::POST {
        Some(false)
    } else if method == Method::PATCH {
        // PATCH may or may not be idempotent; do not guess.
        None
    } else if access == Access::ReadOnly || method == Method::PUT || method == Method::DELETE {
        Some(true)
    } else {
        None
    };

    ToolAnnotations {
        title: Some(title.to_string()),
        read_only_hint: Some(access == Access::ReadOnly),
        destructive_hint: Some(access == Access::Destructive),
        idempotent_hint,
        open_world_hint: Some(true),
    }
}
