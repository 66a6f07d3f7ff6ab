//! GitHub REST tools.

use super::{
    FileEntry, ParamDefault, ParamKind, ParamSpec, Platform, ToolSpec, default_main,
    default_merge_message, present, require_non_empty, required_str,
};
use crate::error::{Result, ToolError};
use base64::Engine as _;
use collab_mcp_upstream::{Method, UpstreamClient, UpstreamRequest};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

const OWNER: ParamSpec = ParamSpec::required("owner", ParamKind::String, "Repository owner");
const REPO: ParamSpec = ParamSpec::required("repo", ParamKind::String, "Repository name");
const PR_NUMBER: ParamSpec =
    ParamSpec::required("pr_number", ParamKind::Integer, "Pull request number");

pub static TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "github_create_branch",
        title: "Create branch",
        description: "Create a branch pointing at the head of another branch.",
        platform: Platform::Github,
        method: Method::POST,
        params: &[
            OWNER,
            REPO,
            ParamSpec::required("new_branch", ParamKind::String, "Name of the branch to create"),
            ParamSpec::defaulted(
                "base_branch",
                ParamKind::String,
                ParamDefault::Str("main"),
                "Branch to start from",
            ),
        ],
    },
    ToolSpec {
        name: "github_create_or_update_file",
        title: "Create or update file",
        description: "Commit a single file to a branch. Pass `sha` of the existing blob to update.",
        platform: Platform::Github,
        method: Method::PUT,
        params: &[
            OWNER,
            REPO,
            ParamSpec::required("branch", ParamKind::String, "Target branch"),
            ParamSpec::required("path", ParamKind::String, "File path in the repository"),
            ParamSpec::required("content", ParamKind::String, "New file content (plain text)"),
            ParamSpec::required("message", ParamKind::String, "Commit message"),
            ParamSpec::optional("sha", ParamKind::String, "Blob sha of the file being replaced"),
        ],
    },
    ToolSpec {
        name: "github_get_contents",
        title: "Get contents",
        description: "Get a file or directory listing at a ref.",
        platform: Platform::Github,
        method: Method::GET,
        params: &[
            OWNER,
            REPO,
            ParamSpec::required("path", ParamKind::String, "File or directory path"),
            ParamSpec::defaulted(
                "ref",
                ParamKind::String,
                ParamDefault::Str("main"),
                "Branch, tag or commit",
            ),
        ],
    },
    ToolSpec {
        name: "github_create_pull_request",
        title: "Create pull request",
        description: "Open a pull request.",
        platform: Platform::Github,
        method: Method::POST,
        params: &[
            OWNER,
            REPO,
            ParamSpec::required("title", ParamKind::String, "Pull request title"),
            ParamSpec::required("head", ParamKind::String, "Branch with the changes"),
            ParamSpec::defaulted(
                "base",
                ParamKind::String,
                ParamDefault::Str("main"),
                "Branch to merge into",
            ),
            ParamSpec::defaulted(
                "body",
                ParamKind::String,
                ParamDefault::Str(""),
                "Pull request description",
            ),
        ],
    },
    ToolSpec {
        name: "github_merge_pull_request",
        title: "Merge pull request",
        description: "Merge a pull request.",
        platform: Platform::Github,
        method: Method::PUT,
        params: &[
            OWNER,
            REPO,
            PR_NUMBER,
            ParamSpec::defaulted(
                "commit_message",
                ParamKind::String,
                ParamDefault::Str("Merging via MCP"),
                "Merge commit message",
            ),
        ],
    },
    ToolSpec {
        name: "github_push_multiple_files",
        title: "Push multiple files",
        description: "Commit several files to a branch in one commit (blobs, tree, commit, then \
                      branch update). Steps already completed are not rolled back on failure.",
        platform: Platform::Github,
        method: Method::PATCH,
        params: &[
            OWNER,
            REPO,
            ParamSpec::required("branch", ParamKind::String, "Target branch"),
            ParamSpec::required("files", ParamKind::FileList, "Files to commit"),
            ParamSpec::required("message", ParamKind::String, "Commit message"),
        ],
    },
    ToolSpec {
        name: "github_update_pr_branch",
        title: "Update pull request branch",
        description: "Merge the base branch into a pull request's head branch.",
        platform: Platform::Github,
        method: Method::PUT,
        params: &[OWNER, REPO, PR_NUMBER],
    },
    ToolSpec {
        name: "github_query",
        title: "Query repository",
        description: "Answer a short question about a repository. Keyword heuristic, checked in \
                      order: 'pull' lists open pull requests, 'issue' lists open issues, \
                      'release' lists releases. Anything else is reported as unrecognized.",
        platform: Platform::Github,
        method: Method::GET,
        params: &[
            OWNER,
            REPO,
            ParamSpec::required("query", ParamKind::String, "Question in plain language"),
        ],
    },
    ToolSpec {
        name: "github_get_authenticated_user",
        title: "Get authenticated user",
        description: "Return the account the caller's token belongs to.",
        platform: Platform::Github,
        method: Method::GET,
        params: &[],
    },
];

#[derive(Debug, Deserialize)]
#[serde(tag = "tool", content = "arguments")]
pub enum GithubRequest {
    #[serde(rename = "github_create_branch")]
    CreateBranch(CreateBranch),
    #[serde(rename = "github_create_or_update_file")]
    CreateOrUpdateFile(CreateOrUpdateFile),
    #[serde(rename = "github_get_contents")]
    GetContents(GetContents),
    #[serde(rename = "github_create_pull_request")]
    CreatePullRequest(CreatePullRequest),
    #[serde(rename = "github_merge_pull_request")]
    MergePullRequest(MergePullRequest),
    #[serde(rename = "github_push_multiple_files")]
    PushMultipleFiles(PushMultipleFiles),
    #[serde(rename = "github_update_pr_branch")]
    UpdatePrBranch(UpdatePrBranch),
    #[serde(rename = "github_query")]
    Query(Query),
    #[serde(rename = "github_get_authenticated_user")]
    GetAuthenticatedUser(NoArguments),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateBranch {
    pub owner: String,
    pub repo: String,
    pub new_branch: String,
    #[serde(default = "default_main")]
    pub base_branch: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateOrUpdateFile {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub path: String,
    pub content: String,
    pub message: String,
    #[serde(default)]
    pub sha: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetContents {
    pub owner: String,
    pub repo: String,
    pub path: String,
    #[serde(rename = "ref", default = "default_main")]
    pub git_ref: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePullRequest {
    pub owner: String,
    pub repo: String,
    pub title: String,
    pub head: String,
    #[serde(default = "default_main")]
    pub base: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergePullRequest {
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
    #[serde(default = "default_merge_message")]
    pub commit_message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PushMultipleFiles {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub files: Vec<FileEntry>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePrBranch {
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Query {
    pub owner: String,
    pub repo: String,
    pub query: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoArguments {}

/// What a [`Query`] resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    OpenPullRequests,
    OpenIssues,
    Releases,
}

impl QueryIntent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenPullRequests => "open_pull_requests",
            Self::OpenIssues => "open_issues",
            Self::Releases => "releases",
        }
    }

    fn request(self, owner: &str, repo: &str) -> UpstreamRequest {
        let req = repo_request(UpstreamRequest::get(), owner, repo);
        match self {
            Self::OpenPullRequests => req.segment("pulls").query("state", "open"),
            Self::OpenIssues => req.segment("issues").query("state", "open"),
            Self::Releases => req.segment("releases"),
        }
    }
}

/// Keyword routing table, checked in order. First case-insensitive substring match wins.
pub const QUERY_KEYWORDS: &[(&str, QueryIntent)] = &[
    ("pull", QueryIntent::OpenPullRequests),
    ("issue", QueryIntent::OpenIssues),
    ("release", QueryIntent::Releases),
];

#[must_use]
pub fn classify_query(query: &str) -> Option<QueryIntent> {
    let lowered = query.to_lowercase();
    QUERY_KEYWORDS
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, intent)| *intent)
}

/// `/repos/{owner}/{repo}` prefix; owner and repo are single segments.
fn repo_request(req: UpstreamRequest, owner: &str, repo: &str) -> UpstreamRequest {
    req.segment("repos").segment(owner).segment(repo)
}

impl GithubRequest {
    /// Arguments that end up in the URL path.
    pub(crate) fn path_arguments(&self) -> Vec<(&'static str, &str)> {
        let (owner, repo, extra) = match self {
            Self::CreateBranch(r) => (&r.owner, &r.repo, Some(("base_branch", &r.base_branch))),
            Self::CreateOrUpdateFile(r) => (&r.owner, &r.repo, Some(("path", &r.path))),
            Self::GetContents(r) => (&r.owner, &r.repo, Some(("path", &r.path))),
            Self::CreatePullRequest(r) => (&r.owner, &r.repo, None),
            Self::MergePullRequest(r) => (&r.owner, &r.repo, None),
            Self::PushMultipleFiles(r) => (&r.owner, &r.repo, Some(("branch", &r.branch))),
            Self::UpdatePrBranch(r) => (&r.owner, &r.repo, None),
            Self::Query(r) => (&r.owner, &r.repo, None),
            Self::GetAuthenticatedUser(_) => return Vec::new(),
        };
        let mut args = vec![("owner", owner.as_str()), ("repo", repo.as_str())];
        args.extend(extra.map(|(name, value)| (name, value.as_str())));
        args
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            Self::PushMultipleFiles(r) => require_non_empty(&r.files, "files"),
            Self::Query(r) if present(Some(&r.query)).is_none() => Err(
                ToolError::InvalidArgument("'query' must not be empty".to_string()),
            ),
            _ => Ok(()),
        }
    }

    pub(crate) async fn execute(self, client: &UpstreamClient, token: &str) -> Result<Value> {
        match self {
            Self::CreateBranch(r) => {
                let base = client
                    .send(
                        token,
                        repo_request(UpstreamRequest::get(), &r.owner, &r.repo)
                            .path("git/ref/heads")
                            .path(&r.base_branch),
                    )
                    .await?;
                let sha = required_str(
                    &base,
                    "/object/sha",
                    &format!("commit sha of base branch '{}'", r.base_branch),
                )?;
                let created = client
                    .send(
                        token,
                        repo_request(UpstreamRequest::post(), &r.owner, &r.repo)
                            .path("git/refs")
                            .json(json!({
                                "ref": format!("refs/heads/{}", r.new_branch),
                                "sha": sha,
                            })),
                    )
                    .await?;
                Ok(json!({
                    "message": format!("Branch '{}' created", r.new_branch),
                    "ref": created,
                }))
            }

            Self::CreateOrUpdateFile(r) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(r.content.as_bytes());
                let mut payload = json!({
                    "message": r.message,
                    "content": encoded,
                    "branch": r.branch,
                });
                if let Some(sha) = present(r.sha.as_ref()) {
                    payload["sha"] = json!(sha);
                }
                let resp = client
                    .send(
                        token,
                        repo_request(UpstreamRequest::put(), &r.owner, &r.repo)
                            .segment("contents")
                            .path(&r.path)
                            .json(payload),
                    )
                    .await?;
                Ok(json!({
                    "message": format!("File '{}' updated", r.path),
                    "commit": resp.get("commit").cloned().unwrap_or(Value::Null),
                }))
            }

            Self::GetContents(r) => Ok(client
                .send(
                    token,
                    repo_request(UpstreamRequest::get(), &r.owner, &r.repo)
                        .segment("contents")
                        .path(&r.path)
                        .query("ref", &r.git_ref),
                )
                .await?),

            Self::CreatePullRequest(r) => {
                let resp = client
                    .send(
                        token,
                        repo_request(UpstreamRequest::post(), &r.owner, &r.repo)
                            .segment("pulls")
                            .json(json!({
                                "title": r.title,
                                "head": r.head,
                                "base": r.base,
                                "body": r.body,
                            })),
                    )
                    .await?;
                Ok(json!({
                    "message": "PR created",
                    "url": resp.get("html_url").cloned().unwrap_or(Value::Null),
                    "number": resp.get("number").cloned().unwrap_or(Value::Null),
                }))
            }

            Self::MergePullRequest(r) => {
                let resp = client
                    .send(
                        token,
                        repo_request(UpstreamRequest::put(), &r.owner, &r.repo)
                            .segment("pulls")
                            .segment(r.pr_number.to_string())
                            .segment("merge")
                            .json(json!({ "commit_message": r.commit_message })),
                    )
                    .await?;
                Ok(json!({
                    "message": format!("PR #{} merged", r.pr_number),
                    "sha": resp.get("sha").cloned().unwrap_or(Value::Null),
                }))
            }

            Self::PushMultipleFiles(r) => push_multiple_files(client, token, r).await,

            Self::UpdatePrBranch(r) => {
                let resp = client
                    .send(
                        token,
                        repo_request(UpstreamRequest::put(), &r.owner, &r.repo)
                            .segment("pulls")
                            .segment(r.pr_number.to_string())
                            .segment("update-branch")
                            .json(json!({})),
                    )
                    .await?;
                Ok(json!({
                    "message": format!("PR #{} branch update requested", r.pr_number),
                    "response": resp,
                }))
            }

            Self::Query(r) => {
                let Some(intent) = classify_query(&r.query) else {
                    return Ok(json!({
                        "message": format!("Query not understood: {}", r.query),
                        "intent": "unrecognized",
                    }));
                };
                debug!(intent = intent.as_str(), "github query routed");
                let results = client
                    .send(token, intent.request(&r.owner, &r.repo))
                    .await?;
                let count = results.as_array().map_or(0, Vec::len);
                Ok(json!({
                    "message": format!("{count} result(s) for {}", intent.as_str()),
                    "intent": intent.as_str(),
                    "results": results,
                }))
            }

            Self::GetAuthenticatedUser(NoArguments {}) => {
                Ok(client.send(token, UpstreamRequest::get().segment("user")).await?)
            }
        }
    }
}

/// ref -> commit -> blob per file -> tree -> commit -> ref update.
///
/// Each step feeds the next and the first failure aborts. Objects created before the failure
/// stay in the repository (unreferenced).
async fn push_multiple_files(
    client: &UpstreamClient,
    token: &str,
    r: PushMultipleFiles,
) -> Result<Value> {
    let git = |req: UpstreamRequest| repo_request(req, &r.owner, &r.repo).segment("git");

    let head = client
        .send(
            token,
            git(UpstreamRequest::get()).path("ref/heads").path(&r.branch),
        )
        .await?;
    let head_sha = required_str(&head, "/object/sha", "branch head commit sha")?.to_string();

    let head_commit = client
        .send(
            token,
            git(UpstreamRequest::get())
                .segment("commits")
                .segment(&head_sha),
        )
        .await?;
    let base_tree = required_str(&head_commit, "/tree/sha", "tree sha of the head commit")?.to_string();

    let mut entries = Vec::with_capacity(r.files.len());
    for file in &r.files {
        let blob = client
            .send(
                token,
                git(UpstreamRequest::post())
                    .segment("blobs")
                    .json(json!({ "content": file.content, "encoding": "utf-8" })),
            )
            .await?;
        let blob_sha = required_str(&blob, "/sha", &format!("blob sha for '{}'", file.path))?;
        entries.push(json!({
            "path": file.path,
            "mode": "100644",
            "type": "blob",
            "sha": blob_sha,
        }));
    }

    let tree = client
        .send(
            token,
            git(UpstreamRequest::post())
                .segment("trees")
                .json(json!({ "base_tree": base_tree, "tree": entries })),
        )
        .await?;
    let tree_sha = required_str(&tree, "/sha", "new tree sha")?;

    let commit = client
        .send(
            token,
            git(UpstreamRequest::post()).segment("commits").json(json!({
                "message": r.message,
                "tree": tree_sha,
                "parents": [head_sha],
            })),
        )
        .await?;
    let commit_sha = required_str(&commit, "/sha", "new commit sha")?;

    client
        .send(
            token,
            git(UpstreamRequest::patch())
                .path("refs/heads")
                .path(&r.branch)
                .json(json!({ "sha": commit_sha })),
        )
        .await?;

    Ok(json!({
        "message": format!("Committed {} files", r.files.len()),
        "commit": commit,
    }))
}
