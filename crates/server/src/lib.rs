//! MCP server exposing Confluence, GitHub and GitLab operations as tools.
//!
//! A tool call flows through [`Dispatcher::invoke`]: name lookup, readonly policy, argument
//! decoding, credential resolution, then one or more REST calls through
//! [`collab_mcp_upstream::UpstreamClient`]. Failures are normalized into [`ToolError`].

pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod logging;
pub mod policy;
pub mod tools;

pub use config::{Cli, LogFormat, Settings};
pub use credentials::{CredentialStore, DEFAULT_PRINCIPAL, InMemoryCredentialStore};
pub use dispatcher::{Backend, Dispatcher, ToolInvocation};
pub use error::{ConfigError, ToolError};
pub use handler::CollabMcpServer;
pub use lifecycle::{RunningServer, SessionLifecycle};
pub use policy::RequestPolicy;
pub use tools::{Platform, ToolSpec};
