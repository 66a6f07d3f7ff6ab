#![allow(dead_code)]

use anyhow::Context as _;
use collab_mcp::{Backend, DEFAULT_PRINCIPAL, Dispatcher, InMemoryCredentialStore, Platform, ToolError, ToolInvocation};
use collab_mcp_test_support::MockUpstream;
use collab_mcp_upstream::{AuthScheme, BackendConfig, UpstreamClient};
use futures::StreamExt as _;
use rmcp::model::JsonObject;
use serde_json::{Value, json};
use std::process::{Child, Command};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt as _;
use tokio_util::io::StreamReader;

pub const TOKEN: &str = "tok-default";

/// Backend config for `platform` pointed at `base_url`, authenticated the way the real
/// service authenticates against that platform.
pub fn backend_config(platform: Platform, base_url: &str) -> BackendConfig {
    match platform {
        Platform::Confluence => BackendConfig::new(format!("{base_url}/rest/api"), AuthScheme::Bearer),
        Platform::Github => BackendConfig::new(base_url, AuthScheme::Bearer).with_headers([(
            "Accept".to_string(),
            "application/vnd.github.v3+json".to_string(),
        )]),
        Platform::Gitlab => BackendConfig::new(
            format!("{base_url}/api/v4"),
            AuthScheme::Header {
                name: "PRIVATE-TOKEN".to_string(),
            },
        ),
    }
}

pub fn backend(platform: Platform, config: BackendConfig, tokens: &[(&str, &str)]) -> Backend {
    let client = UpstreamClient::new(platform.as_str(), config).expect("upstream client");
    Backend::new(client, Arc::new(InMemoryCredentialStore::from_pairs(tokens.iter().copied())))
}

/// Dispatcher with a single backend talking to `mock`, holding [`TOKEN`] for the default principal.
pub fn dispatcher_for(platform: Platform, mock: &MockUpstream) -> Dispatcher {
    Dispatcher::new().with_backend(
        platform,
        backend(
            platform,
            backend_config(platform, mock.base_url()),
            &[(DEFAULT_PRINCIPAL, TOKEN)],
        ),
    )
}

pub fn args(v: Value) -> JsonObject {
    match v {
        Value::Object(map) => map,
        other => panic!("arguments must be an object, got {other}"),
    }
}

pub async fn call(dispatcher: &Dispatcher, tool: &str, arguments: Value) -> Result<Value, ToolError> {
    dispatcher.invoke(ToolInvocation::new(tool, args(arguments))).await
}

pub fn spawn_server(port: u16, envs: &[(&str, &str)]) -> anyhow::Result<Child> {
    let bin = env!("CARGO_BIN_EXE_collab-mcp");
    let mut cmd = Command::new(bin);
    for key in [
        "COLLAB_MCP_BIND",
        "COLLAB_MCP_BACKENDS",
        "CONFLUENCE_BASE_URL",
        "CONFLUENCE_PAT",
        "GITHUB_API_URL",
        "GITHUB_TOKEN",
        "GITLAB_BASE_URL",
        "GITLAB_TOKEN",
        "COLLAB_MCP_CREDENTIALS_FILE",
        "RUST_LOG",
    ] {
        cmd.env_remove(key);
    }
    cmd.arg("--bind")
        .arg(format!("127.0.0.1:{port}"))
        .arg("--log-level")
        .arg("info")
        .envs(envs.iter().copied())
        .spawn()
        .context("spawn collab-mcp")
}

/// POST one JSON-RPC message to the stateless MCP endpoint and return the JSON-RPC reply.
pub async fn mcp_request(
    base_url: &str,
    headers: &[(&str, &str)],
    id: u64,
    method: &str,
    params: Value,
) -> anyhow::Result<Value> {
    let client = reqwest::Client::new();
    let mut req = client
        .post(format!("{}/", base_url.trim_end_matches('/')))
        .header("Accept", "application/json, text/event-stream")
        .header("Content-Type", "application/json")
        .json(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        }));
    for (name, value) in headers {
        req = req.header(*name, *value);
    }

    let resp = req
        .send()
        .await
        .context("POST mcp")?
        .error_for_status()
        .context("POST mcp status")?;

    let is_json = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        return resp.json().await.context("parse JSON reply");
    }

    tokio::time::timeout(Duration::from_secs(10), read_first_event_stream_json_message(resp))
        .await
        .context("timeout waiting for event-stream response")?
}

async fn read_first_event_stream_json_message(resp: reqwest::Response) -> anyhow::Result<Value> {
    let mut stream = resp.bytes_stream();
    let byte_stream = futures::stream::poll_fn(move |cx| stream.poll_next_unpin(cx))
        .map(|r| r.map_err(std::io::Error::other));
    let reader = StreamReader::new(byte_stream);
    let mut lines = tokio::io::BufReader::new(reader).lines();

    let mut data_lines: Vec<String> = Vec::new();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim_end().to_string();

        if line.is_empty() {
            let data = data_lines.join("\n");
            data_lines.clear();
            // Priming events carry an empty data field.
            if data.trim().is_empty() {
                continue;
            }
            return serde_json::from_str(&data).context("parse event-stream data as JSON");
        }

        if let Some(v) = line.strip_prefix("data:") {
            data_lines.push(v.trim().to_string());
        }
    }

    anyhow::bail!("event-stream ended without a JSON message")
}
