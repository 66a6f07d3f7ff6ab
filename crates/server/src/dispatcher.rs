//! Tool dispatch: name lookup, readonly policy, argument decoding, credential resolution and the
//! upstream call(s), in that order.

use crate::credentials::{CredentialStore, DEFAULT_PRINCIPAL};
use crate::error::{Result, ToolError};
use crate::tools::{Platform, ToolRequest, ToolSpec, find_similar_strings};
use collab_mcp_upstream::UpstreamClient;
use rmcp::model::{JsonObject, Tool};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One named call, built per request and dropped once the result is produced.
#[derive(Debug, Clone, Default)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub arguments: JsonObject,
    /// `None` means [`DEFAULT_PRINCIPAL`].
    pub principal: Option<String>,
    pub readonly: bool,
}

impl ToolInvocation {
    #[must_use]
    pub fn new(tool_name: impl Into<String>, arguments: JsonObject) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    #[must_use]
    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }
}

/// An enabled backend: where to send requests and whose tokens to use.
#[derive(Clone)]
pub struct Backend {
    pub client: UpstreamClient,
    pub credentials: Arc<dyn CredentialStore>,
}

impl Backend {
    #[must_use]
    pub fn new(client: UpstreamClient, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            client,
            credentials,
        }
    }
}

/// Routes invocations to the tools of the enabled backends.
///
/// Immutable after construction; share it behind an `Arc`.
#[derive(Clone, Default)]
pub struct Dispatcher {
    backends: BTreeMap<Platform, Backend>,
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable `platform`. A second call for the same platform replaces the first.
    #[must_use]
    pub fn with_backend(mut self, platform: Platform, backend: Backend) -> Self {
        self.backends.insert(platform, backend);
        self
    }

    #[must_use]
    pub fn platforms(&self) -> Vec<Platform> {
        self.backends.keys().copied().collect()
    }

    /// Specs of every tool of every enabled backend, in catalog order.
    pub fn specs(&self) -> impl Iterator<Item = &'static ToolSpec> + '_ {
        self.backends.keys().flat_map(|p| p.tools().iter())
    }

    /// `tools/list` payload.
    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        self.specs().map(ToolSpec::to_tool).collect()
    }

    /// Look up an enabled tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] with close matches when the name is not served.
    pub fn lookup(&self, name: &str) -> Result<&'static ToolSpec> {
        if let Some(spec) = self.specs().find(|s| s.name == name) {
            return Ok(spec);
        }
        let known: Vec<&str> = self.specs().map(|s| s.name).collect();
        Err(ToolError::UnknownTool {
            name: name.to_string(),
            suggestions: find_similar_strings(name, &known),
        })
    }

    /// Run one invocation.
    ///
    /// # Errors
    ///
    /// Every [`ToolError`] variant; see the pipeline order in the module docs. Nothing is retried.
    pub async fn invoke(&self, invocation: ToolInvocation) -> Result<Value> {
        let ToolInvocation {
            tool_name,
            arguments,
            principal,
            readonly,
        } = invocation;

        let spec = self.lookup(&tool_name)?;
        debug!(tool = %tool_name, readonly, "tool call");

        if readonly && spec.access().is_mutating() {
            debug!(tool = %tool_name, "blocked by readonly policy");
            return Err(ToolError::ForbiddenByPolicy { tool: tool_name });
        }

        let request = ToolRequest::decode(spec, arguments)?;

        let backend = self.backends.get(&spec.platform).ok_or_else(|| {
            // `lookup` only returns tools of enabled backends.
            ToolError::UnknownTool {
                name: tool_name.clone(),
                suggestions: Vec::new(),
            }
        })?;

        let principal = principal.unwrap_or_else(|| DEFAULT_PRINCIPAL.to_string());
        let token = backend.credentials.get(&principal).await.ok_or_else(|| {
            ToolError::Unauthenticated {
                backend: spec.platform.to_string(),
                principal: principal.clone(),
            }
        })?;

        match request.execute(&backend.client, &token).await {
            Ok(v) => Ok(v),
            Err(e) => {
                match &e {
                    ToolError::Upstream { status, .. } => {
                        warn!(tool = %tool_name, status = *status, "upstream call failed");
                    }
                    ToolError::Transport(msg) => {
                        warn!(tool = %tool_name, error = %msg, "upstream unreachable");
                    }
                    _ => debug!(tool = %tool_name, kind = e.kind(), "tool call failed"),
                }
                Err(e)
            }
        }
    }
}
