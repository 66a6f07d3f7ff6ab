//! rmcp `ServerHandler` exposing the dispatcher over MCP.

use crate::dispatcher::{Dispatcher, ToolInvocation};
use crate::error::ToolError;
use crate::policy::RequestPolicy;
use axum::http::request::Parts;
use rmcp::ErrorData;
use rmcp::ServerHandler;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, ListToolsResult, PaginatedRequestParams,
    ServerCapabilities, ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Clone)]
pub struct CollabMcpServer {
    dispatcher: Arc<Dispatcher>,
}

impl CollabMcpServer {
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn instructions(&self) -> String {
        let platforms: Vec<&str> = self
            .dispatcher
            .platforms()
            .into_iter()
            .map(|p| p.as_str())
            .collect();
        format!(
            "Tools for {}. Send `X-MCP-Readonly: true` to block tools that modify upstream \
             state, and `X-MCP-User: <name>` to act with that user's credential.",
            platforms.join(", ")
        )
    }
}

/// Successful tool output: the JSON as text, plus structured content when it is an object.
#[must_use]
pub fn success_result(value: Value) -> CallToolResult {
    let mut result = CallToolResult::success(vec![Content::text(value.to_string())]);
    if value.is_object() {
        result.structured_content = Some(value);
    }
    result
}

/// Map a tool failure onto the MCP surface.
///
/// Unknown tools are a protocol-level `invalid_params` error; everything else is a tool result
/// with `isError: true` and `{"error": {...}}` as structured content.
///
/// # Errors
///
/// Returns `ErrorData` for [`ToolError::UnknownTool`].
pub fn error_result(err: &ToolError) -> Result<CallToolResult, ErrorData> {
    if let ToolError::UnknownTool { suggestions, .. } = err {
        return Err(ErrorData::invalid_params(
            err.to_string(),
            Some(json!({ "suggestions": suggestions })),
        ));
    }
    let mut result = CallToolResult::error(vec![Content::text(err.to_string())]);
    result.structured_content = Some(err.to_json());
    Ok(result)
}

impl ServerHandler for CollabMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(self.instructions()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(self.dispatcher.tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let policy = context
            .extensions
            .get::<Parts>()
            .map(|parts| RequestPolicy::from_headers(&parts.headers))
            .unwrap_or_default();

        let invocation = ToolInvocation {
            tool_name: request.name.to_string(),
            arguments: request.arguments.unwrap_or_default(),
            principal: policy.principal,
            readonly: policy.readonly,
        };

        match self.dispatcher.invoke(invocation).await {
            Ok(value) => Ok(success_result(value)),
            Err(e) => error_result(&e),
        }
    }
}
