//! GitLab REST v4 tools.
//!
//! Project ids (`42` or `group/project`) and file paths are sent as single, fully
//! percent-encoded path segments, the way the v4 API expects them.

use super::{
    FileEntry, ParamDefault, ParamKind, ParamSpec, Platform, ToolSpec, default_main,
    default_merge_message, present, require_non_empty, string_or_number,
};
use crate::error::Result;
use collab_mcp_upstream::{Method, UpstreamClient, UpstreamRequest};
use serde::Deserialize;
use serde_json::{Value, json};

const PROJECT_ID: ParamSpec = ParamSpec::required(
    "project_id",
    ParamKind::Id,
    "Numeric project id or URL path such as 'group/project'",
);
const MR_IID: ParamSpec = ParamSpec::required(
    "mr_iid",
    ParamKind::Integer,
    "Merge request IID (project-scoped number)",
);

pub static TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "gitlab_create_branch",
        title: "Create branch",
        description: "Create a branch from another branch.",
        platform: Platform::Gitlab,
        method: Method::POST,
        params: &[
            PROJECT_ID,
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
        name: "gitlab_create_or_update_file",
        title: "Create or update file",
        description: "Commit a single file to a branch. Without `sha` the file is created; with \
                      `sha` the existing file is updated.",
        platform: Platform::Gitlab,
        method: Method::POST,
        params: &[
            PROJECT_ID,
            ParamSpec::required("branch", ParamKind::String, "Target branch"),
            ParamSpec::required("path", ParamKind::String, "File path in the repository"),
            ParamSpec::required("content", ParamKind::String, "New file content"),
            ParamSpec::required("message", ParamKind::String, "Commit message"),
            ParamSpec::optional("sha", ParamKind::String, "Set when the file already exists"),
        ],
    },
    ToolSpec {
        name: "gitlab_get_contents",
        title: "Get file",
        description: "Get a file at a ref.",
        platform: Platform::Gitlab,
        method: Method::GET,
        params: &[
            PROJECT_ID,
            ParamSpec::required("path", ParamKind::String, "File path"),
            ParamSpec::defaulted(
                "ref",
                ParamKind::String,
                ParamDefault::Str("main"),
                "Branch, tag or commit",
            ),
        ],
    },
    ToolSpec {
        name: "gitlab_create_merge_request",
        title: "Create merge request",
        description: "Open a merge request.",
        platform: Platform::Gitlab,
        method: Method::POST,
        params: &[
            PROJECT_ID,
            ParamSpec::required("title", ParamKind::String, "Merge request title"),
            ParamSpec::required("source_branch", ParamKind::String, "Branch with the changes"),
            ParamSpec::defaulted(
                "target_branch",
                ParamKind::String,
                ParamDefault::Str("main"),
                "Branch to merge into",
            ),
            ParamSpec::defaulted(
                "description",
                ParamKind::String,
                ParamDefault::Str(""),
                "Merge request description",
            ),
        ],
    },
    ToolSpec {
        name: "gitlab_merge_merge_request",
        title: "Merge merge request",
        description: "Accept a merge request.",
        platform: Platform::Gitlab,
        method: Method::PUT,
        params: &[
            PROJECT_ID,
            MR_IID,
            ParamSpec::defaulted(
                "merge_commit_message",
                ParamKind::String,
                ParamDefault::Str("Merging via MCP"),
                "Merge commit message",
            ),
        ],
    },
    ToolSpec {
        name: "gitlab_push_multiple_files",
        title: "Push multiple files",
        description: "Create several files on a branch in a single commit.",
        platform: Platform::Gitlab,
        method: Method::POST,
        params: &[
            PROJECT_ID,
            ParamSpec::required("branch", ParamKind::String, "Target branch"),
            ParamSpec::required("files", ParamKind::FileList, "Files to create"),
            ParamSpec::required("message", ParamKind::String, "Commit message"),
        ],
    },
    ToolSpec {
        name: "gitlab_update_mr_branch",
        title: "Rebase merge request",
        description: "Rebase a merge request's source branch onto its target branch.",
        platform: Platform::Gitlab,
        method: Method::PUT,
        params: &[PROJECT_ID, MR_IID],
    },
];

#[derive(Debug, Deserialize)]
#[serde(tag = "tool", content = "arguments")]
pub enum GitlabRequest {
    #[serde(rename = "gitlab_create_branch")]
    CreateBranch(CreateBranch),
    #[serde(rename = "gitlab_create_or_update_file")]
    CreateOrUpdateFile(CreateOrUpdateFile),
    #[serde(rename = "gitlab_get_contents")]
    GetContents(GetContents),
    #[serde(rename = "gitlab_create_merge_request")]
    CreateMergeRequest(CreateMergeRequest),
    #[serde(rename = "gitlab_merge_merge_request")]
    MergeMergeRequest(MergeMergeRequest),
    #[serde(rename = "gitlab_push_multiple_files")]
    PushMultipleFiles(PushMultipleFiles),
    #[serde(rename = "gitlab_update_mr_branch")]
    UpdateMrBranch(UpdateMrBranch),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateBranch {
    #[serde(deserialize_with = "string_or_number")]
    pub project_id: String,
    pub new_branch: String,
    #[serde(default = "default_main")]
    pub base_branch: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateOrUpdateFile {
    #[serde(deserialize_with = "string_or_number")]
    pub project_id: String,
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
    #[serde(deserialize_with = "string_or_number")]
    pub project_id: String,
    pub path: String,
    #[serde(rename = "ref", default = "default_main")]
    pub git_ref: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMergeRequest {
    #[serde(deserialize_with = "string_or_number")]
    pub project_id: String,
    pub title: String,
    pub source_branch: String,
    #[serde(default = "default_main")]
    pub target_branch: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeMergeRequest {
    #[serde(deserialize_with = "string_or_number")]
    pub project_id: String,
    pub mr_iid: u64,
    #[serde(default = "default_merge_message")]
    pub merge_commit_message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PushMultipleFiles {
    #[serde(deserialize_with = "string_or_number")]
    pub project_id: String,
    pub branch: String,
    pub files: Vec<FileEntry>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMrBranch {
    #[serde(deserialize_with = "string_or_number")]
    pub project_id: String,
    pub mr_iid: u64,
}

/// `/projects/{id}`
fn project(req: UpstreamRequest, project_id: &str) -> UpstreamRequest {
    req.segment("projects").segment(project_id)
}

fn merge_request(req: UpstreamRequest, project_id: &str, iid: u64) -> UpstreamRequest {
    project(req, project_id)
        .segment("merge_requests")
        .segment(iid.to_string())
}

impl GitlabRequest {
    /// Arguments that end up in the URL path.
    pub(crate) fn path_arguments(&self) -> Vec<(&'static str, &str)> {
        let (project_id, path) = match self {
            Self::CreateBranch(r) => (&r.project_id, None),
            Self::CreateOrUpdateFile(r) => (&r.project_id, Some(&r.path)),
            Self::GetContents(r) => (&r.project_id, Some(&r.path)),
            Self::CreateMergeRequest(r) => (&r.project_id, None),
            Self::MergeMergeRequest(r) => (&r.project_id, None),
            Self::PushMultipleFiles(r) => (&r.project_id, None),
            Self::UpdateMrBranch(r) => (&r.project_id, None),
        };
        let mut args = vec![("project_id", project_id.as_str())];
        args.extend(path.map(|p| ("path", p.as_str())));
        args
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            Self::PushMultipleFiles(r) => require_non_empty(&r.files, "files"),
            _ => Ok(()),
        }
    }

    pub(crate) async fn execute(self, client: &UpstreamClient, token: &str) -> Result<Value> {
        match self {
            Self::CreateBranch(r) => {
                let resp = client
                    .send(
                        token,
                        project(UpstreamRequest::post(), &r.project_id)
                            .path("repository/branches")
                            .json(json!({ "branch": r.new_branch, "ref": r.base_branch })),
                    )
                    .await?;
                Ok(json!({
                    "message": format!("Branch '{}' created", r.new_branch),
                    "branch": resp,
                }))
            }

            Self::CreateOrUpdateFile(r) => {
                let (base, verb) = if present(r.sha.as_ref()).is_some() {
                    (UpstreamRequest::put(), "updated")
                } else {
                    (UpstreamRequest::post(), "created")
                };
                let resp = client
                    .send(
                        token,
                        project(base, &r.project_id)
                            .path("repository/files")
                            .segment(&r.path)
                            .json(json!({
                                "branch": r.branch,
                                "content": r.content,
                                "commit_message": r.message,
                            })),
                    )
                    .await?;
                Ok(json!({
                    "message": format!("File '{}' {verb}", r.path),
                    "response": resp,
                }))
            }

            Self::GetContents(r) => Ok(client
                .send(
                    token,
                    project(UpstreamRequest::get(), &r.project_id)
                        .path("repository/files")
                        .segment(&r.path)
                        .query("ref", &r.git_ref),
                )
                .await?),

            Self::CreateMergeRequest(r) => {
                let resp = client
                    .send(
                        token,
                        project(UpstreamRequest::post(), &r.project_id)
                            .segment("merge_requests")
                            .json(json!({
                                "title": r.title,
                                "source_branch": r.source_branch,
                                "target_branch": r.target_branch,
                                "description": r.description,
                            })),
                    )
                    .await?;
                Ok(json!({
                    "message": "Merge request created",
                    "url": resp.get("web_url").cloned().unwrap_or(Value::Null),
                    "iid": resp.get("iid").cloned().unwrap_or(Value::Null),
                }))
            }

            Self::MergeMergeRequest(r) => {
                let resp = client
                    .send(
                        token,
                        merge_request(UpstreamRequest::put(), &r.project_id, r.mr_iid)
                            .segment("merge")
                            .json(json!({ "merge_commit_message": r.merge_commit_message })),
                    )
                    .await?;
                Ok(json!({
                    "message": format!("MR !{} merged", r.mr_iid),
                    "sha": resp.get("sha").cloned().unwrap_or(Value::Null),
                }))
            }

            Self::PushMultipleFiles(r) => {
                let actions: Vec<Value> = r
                    .files
                    .iter()
                    .map(|f| json!({ "action": "create", "file_path": f.path, "content": f.content }))
                    .collect();
                let resp = client
                    .send(
                        token,
                        project(UpstreamRequest::post(), &r.project_id)
                            .path("repository/commits")
                            .json(json!({
                                "branch": r.branch,
                                "commit_message": r.message,
                                "actions": actions,
                            })),
                    )
                    .await?;
                Ok(json!({
                    "message": format!("Committed {} files", r.files.len()),
                    "commit": resp,
                }))
            }

            Self::UpdateMrBranch(r) => {
                let resp = client
                    .send(
                        token,
                        merge_request(UpstreamRequest::put(), &r.project_id, r.mr_iid)
                            .segment("rebase"),
                    )
                    .await?;
                Ok(json!({
                    "message": format!("MR !{} rebase requested", r.mr_iid),
                    "response": resp,
                }))
            }
        }
    }
}
