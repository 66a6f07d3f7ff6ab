//! Command-line / environment configuration.
//!
//! Everything is validated up front so that a bad setting fails before the listener is bound.

use crate::credentials::{CredentialStore as _, DEFAULT_PRINCIPAL, InMemoryCredentialStore};
use crate::dispatcher::{Backend, Dispatcher};
use crate::error::ConfigError;
use crate::tools::Platform;
use clap::{Parser, ValueEnum};
use collab_mcp_upstream::{AuthScheme, BackendConfig, UpstreamClient};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "collab-mcp", version, about = "MCP tools for Confluence, GitHub and GitLab")]
pub struct Cli {
    /// Address to listen on.
    #[arg(long, env = "COLLAB_MCP_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Backends to enable.
    #[arg(
        long,
        env = "COLLAB_MCP_BACKENDS",
        value_enum,
        value_delimiter = ',',
        default_value = "confluence,github,gitlab"
    )]
    pub backends: Vec<Platform>,

    /// Confluence site URL; `/rest/api` is appended.
    #[arg(long, env = "CONFLUENCE_BASE_URL")]
    pub confluence_base_url: Option<String>,

    #[arg(long, env = "CONFLUENCE_PAT", hide_env_values = true)]
    pub confluence_pat: Option<String>,

    /// GitHub API root (override for GitHub Enterprise).
    #[arg(long, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
    pub github_api_url: String,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// GitLab API root, including `/api/v4`.
    #[arg(long, env = "GITLAB_BASE_URL", default_value = "https://gitlab.com/api/v4")]
    pub gitlab_base_url: String,

    #[arg(long, env = "GITLAB_TOKEN", hide_env_values = true)]
    pub gitlab_token: Option<String>,

    /// YAML file mapping backend -> principal -> token.
    #[arg(long, env = "COLLAB_MCP_CREDENTIALS_FILE")]
    pub credentials_file: Option<PathBuf>,

    /// Per-request timeout for upstream calls, in seconds.
    #[arg(long, env = "COLLAB_MCP_UPSTREAM_TIMEOUT_SECS", default_value_t = 30)]
    pub upstream_timeout_secs: u64,

    /// Log filter (`RUST_LOG` syntax). `RUST_LOG` wins when set.
    #[arg(long, env = "COLLAB_MCP_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "COLLAB_MCP_LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,

    // OAuth app settings. Accepted for deployment compatibility; the login flow is not served.
    #[arg(long, env = "GITHUB_CLIENT_ID", hide = true)]
    pub github_client_id: Option<String>,

    #[arg(long, env = "GITHUB_CLIENT_SECRET", hide = true, hide_env_values = true)]
    pub github_client_secret: Option<String>,

    #[arg(long, env = "REDIRECT_URI", hide = true)]
    pub redirect_uri: Option<String>,
}

/// Resolved settings for one enabled backend.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub platform: Platform,
    pub config: BackendConfig,
    /// principal -> token. Always contains [`DEFAULT_PRINCIPAL`].
    pub tokens: BTreeMap<String, String>,
}

/// Validated runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind: SocketAddr,
    pub backends: Vec<BackendSettings>,
}

type CredentialsFile = HashMap<String, HashMap<String, String>>;

impl Cli {
    /// Validate and resolve everything needed to serve.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a missing token or URL of an enabled backend, a zero timeout,
    /// an empty backend list, or an unreadable/invalid credentials file.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        if self.upstream_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "--upstream-timeout-secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        let timeout = Duration::from_secs(self.upstream_timeout_secs);

        let mut platforms = self.backends.clone();
        platforms.sort();
        platforms.dedup();
        if platforms.is_empty() {
            return Err(ConfigError::Invalid {
                name: "--backends",
                reason: "at least one backend must be enabled".to_string(),
            });
        }

        let mut extra: HashMap<Platform, HashMap<String, String>> = HashMap::new();
        if let Some(path) = &self.credentials_file {
            for (backend, principals) in load_credentials_file(path)? {
                let platform = Platform::from_str(&backend, true).map_err(|_| {
                    ConfigError::Invalid {
                        name: "--credentials-file",
                        reason: format!("unknown backend '{backend}'"),
                    }
                })?;
                extra.entry(platform).or_default().extend(principals);
            }
        }

        let mut backends = Vec::with_capacity(platforms.len());
        for platform in platforms {
            let (config, token) = self.backend_config(platform)?;
            let mut tokens: BTreeMap<String, String> = extra
                .remove(&platform)
                .unwrap_or_default()
                .into_iter()
                .collect();
            tokens.insert(DEFAULT_PRINCIPAL.to_string(), token);
            backends.push(BackendSettings {
                platform,
                config: config.with_timeout(timeout),
                tokens,
            });
        }

        Ok(Settings {
            bind: self.bind,
            backends,
        })
    }

    fn backend_config(&self, platform: Platform) -> Result<(BackendConfig, String), ConfigError> {
        match platform {
            Platform::Confluence => {
                let base = non_empty(self.confluence_base_url.as_deref())
                    .ok_or(ConfigError::Missing("CONFLUENCE_BASE_URL"))?;
                let token = non_empty(self.confluence_pat.as_deref())
                    .ok_or(ConfigError::Missing("CONFLUENCE_PAT"))?;
                let api = format!("{}/rest/api", base.trim_end_matches('/'));
                Ok((BackendConfig::new(api, AuthScheme::Bearer), token.to_string()))
            }
            Platform::Github => {
                let token = non_empty(self.github_token.as_deref())
                    .ok_or(ConfigError::Missing("GITHUB_TOKEN"))?;
                let config = BackendConfig::new(self.github_api_url.clone(), AuthScheme::Bearer)
                    .with_headers([(
                        "Accept".to_string(),
                        "application/vnd.github.v3+json".to_string(),
                    )]);
                Ok((config, token.to_string()))
            }
            Platform::Gitlab => {
                let token = non_empty(self.gitlab_token.as_deref())
                    .ok_or(ConfigError::Missing("GITLAB_TOKEN"))?;
                let config = BackendConfig::new(
                    self.gitlab_base_url.clone(),
                    AuthScheme::Header {
                        name: "PRIVATE-TOKEN".to_string(),
                    },
                );
                Ok((config, token.to_string()))
            }
        }
    }

    /// Log which optional OAuth settings are present, never their values.
    pub fn log_oauth_settings(&self) {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        if present(&self.github_client_id)
            || present(&self.github_client_secret)
            || present(&self.redirect_uri)
        {
            info!(
                client_id = present(&self.github_client_id),
                client_secret = present(&self.github_client_secret),
                redirect_uri = present(&self.redirect_uri),
                "GitHub OAuth settings found; the login flow is not served, tokens come from \
                 GITHUB_TOKEN and the credentials file"
            );
        }
    }
}

impl Settings {
    /// Build the dispatcher: one HTTP client and one credential store per backend.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Backend`] if a base URL is not a usable http(s) URL.
    pub async fn dispatcher(&self) -> Result<Dispatcher, ConfigError> {
        let mut dispatcher = Dispatcher::new();
        for backend in &self.backends {
            let client = UpstreamClient::new(backend.platform.as_str(), backend.config.clone())
                .map_err(|source| ConfigError::Backend {
                    name: backend.platform.to_string(),
                    source,
                })?;

            let store = InMemoryCredentialStore::new();
            for (principal, token) in &backend.tokens {
                store.set(principal, Arc::from(token.as_str())).await;
            }

            info!(
                backend = %backend.platform,
                principals = backend.tokens.len(),
                "backend enabled"
            );
            dispatcher = dispatcher.with_backend(backend.platform, Backend::new(client, Arc::new(store)));
        }
        Ok(dispatcher)
    }
}

fn non_empty(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

fn load_credentials_file(path: &Path) -> Result<CredentialsFile, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::CredentialsIo {
        path: path.display().to_string(),
        source,
    })?;
    if raw.trim().is_empty() {
        return Ok(CredentialsFile::new());
    }
    serde_yaml::from_str(&raw).map_err(|source| ConfigError::CredentialsYaml {
        path: path.display().to_string(),
        source,
    })
}
