//! Upstream gateway for collaboration backends.
//!
//! This crate is intended to be used by:
//! - `collab-mcp` (the tool dispatcher)
//! - integration tests that need to talk to a scripted backend the same way
//!
//! It knows how to build one REST request, inject the caller's credential, send it with an
//! explicit timeout and normalize the outcome. It intentionally contains **no** tool catalog and
//! **no** credential storage.

pub mod client;
pub mod config;
pub mod error;
pub mod redact;
pub mod semantics;

pub use client::{UpstreamClient, UpstreamRequest};
pub use config::{AuthScheme, BackendConfig};
pub use error::{Result, UpstreamError};
pub use reqwest::Method;
