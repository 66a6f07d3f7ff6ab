//! Confluence tools. Requests are relative to `<base>/rest/api`.

use super::{
    ParamDefault, ParamKind, ParamSpec, Platform, ToolSpec, default_true, opt_string_or_number,
    present, require_non_empty, string_or_number,
};
use crate::error::{Result, ToolError};
use collab_mcp_upstream::{Method, UpstreamClient, UpstreamRequest};
use serde::Deserialize;
use serde_json::{Value, json};

const PAGE_ID: ParamSpec = ParamSpec::required("page_id", ParamKind::Id, "Confluence page id");
const LIMIT_50: ParamSpec = ParamSpec::defaulted(
    "limit",
    ParamKind::Integer,
    ParamDefault::Int(50),
    "Maximum number of results",
);
const START: ParamSpec = ParamSpec::defaulted(
    "start",
    ParamKind::Integer,
    ParamDefault::Int(0),
    "Offset of the first result",
);

pub static TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "confluence_create_page",
        title: "Create page",
        description: "Create a page in a space, optionally as a child of another page.",
        platform: Platform::Confluence,
        method: Method::POST,
        params: &[
            ParamSpec::required("space_key", ParamKind::String, "Space key"),
            ParamSpec::required("title", ParamKind::String, "Page title"),
            ParamSpec::required("html_content", ParamKind::String, "Body in storage format (XHTML)"),
            ParamSpec::optional("parent_page_id", ParamKind::Id, "Parent page id"),
        ],
    },
    ToolSpec {
        name: "confluence_get_page",
        title: "Get page",
        description: "Get a page by id, or by title and space key.",
        platform: Platform::Confluence,
        method: Method::GET,
        params: &[
            ParamSpec::optional("page_id", ParamKind::Id, "Page id"),
            ParamSpec::optional("title", ParamKind::String, "Page title (requires space_key)"),
            ParamSpec::optional("space_key", ParamKind::String, "Space key (requires title)"),
            ParamSpec::defaulted(
                "expand_body",
                ParamKind::Boolean,
                ParamDefault::Bool(true),
                "Include the storage-format body",
            ),
        ],
    },
    ToolSpec {
        name: "confluence_update_page",
        title: "Update page",
        description: "Update a page's title and/or body. The version number is incremented \
                      automatically.",
        platform: Platform::Confluence,
        method: Method::PUT,
        params: &[
            PAGE_ID,
            ParamSpec::optional("new_title", ParamKind::String, "New title"),
            ParamSpec::optional("new_html_content", ParamKind::String, "New body in storage format"),
            ParamSpec::defaulted(
                "minor_edit",
                ParamKind::Boolean,
                ParamDefault::Bool(false),
                "Mark the change as a minor edit",
            ),
        ],
    },
    ToolSpec {
        name: "confluence_delete_page",
        title: "Delete page",
        description: "Delete a page.",
        platform: Platform::Confluence,
        method: Method::DELETE,
        params: &[
            PAGE_ID,
            ParamSpec::defaulted(
                "status",
                ParamKind::String,
                ParamDefault::Str("current"),
                "Content status to delete",
            ),
        ],
    },
    ToolSpec {
        name: "confluence_add_comment",
        title: "Add comment",
        description: "Add a comment (storage format) to a page.",
        platform: Platform::Confluence,
        method: Method::POST,
        params: &[
            PAGE_ID,
            ParamSpec::required("html_content", ParamKind::String, "Comment body in storage format"),
        ],
    },
    ToolSpec {
        name: "confluence_get_comments",
        title: "Get comments",
        description: "List comments on a page.",
        platform: Platform::Confluence,
        method: Method::GET,
        params: &[PAGE_ID, LIMIT_50, START],
    },
    ToolSpec {
        name: "confluence_add_label",
        title: "Add labels",
        description: "Add one or more global labels to a page.",
        platform: Platform::Confluence,
        method: Method::POST,
        params: &[
            PAGE_ID,
            ParamSpec::required("labels", ParamKind::StringList, "Label names"),
        ],
    },
    ToolSpec {
        name: "confluence_get_labels",
        title: "Get labels",
        description: "List labels on a page.",
        platform: Platform::Confluence,
        method: Method::GET,
        params: &[
            PAGE_ID,
            ParamSpec::defaulted(
                "limit",
                ParamKind::Integer,
                ParamDefault::Int(200),
                "Maximum number of results",
            ),
            START,
        ],
    },
    ToolSpec {
        name: "confluence_get_page_children",
        title: "Get child pages",
        description: "List the child pages of a page.",
        platform: Platform::Confluence,
        method: Method::GET,
        params: &[
            PAGE_ID,
            LIMIT_50,
            START,
            ParamSpec::defaulted(
                "expand_body",
                ParamKind::Boolean,
                ParamDefault::Bool(false),
                "Include storage-format bodies",
            ),
        ],
    },
    ToolSpec {
        name: "confluence_search",
        title: "Search",
        description: "Search content with a plain-text query or a CQL expression. `cql` wins when \
                      both are given.",
        platform: Platform::Confluence,
        method: Method::GET,
        params: &[
            ParamSpec::optional("query", ParamKind::String, "Plain-text query (title and body)"),
            ParamSpec::optional("cql", ParamKind::String, "CQL expression"),
            ParamSpec::defaulted(
                "limit",
                ParamKind::Integer,
                ParamDefault::Int(25),
                "Maximum number of results",
            ),
            START,
            ParamSpec::defaulted(
                "expand_body",
                ParamKind::Boolean,
                ParamDefault::Bool(false),
                "Include storage-format bodies",
            ),
        ],
    },
];

#[derive(Debug, Deserialize)]
#[serde(tag = "tool", content = "arguments")]
pub enum ConfluenceRequest {
    #[serde(rename = "confluence_create_page")]
    CreatePage(CreatePage),
    #[serde(rename = "confluence_get_page")]
    GetPage(GetPage),
    #[serde(rename = "confluence_update_page")]
    UpdatePage(UpdatePage),
    #[serde(rename = "confluence_delete_page")]
    DeletePage(DeletePage),
    #[serde(rename = "confluence_add_comment")]
    AddComment(AddComment),
    #[serde(rename = "confluence_get_comments")]
    GetComments(GetComments),
    #[serde(rename = "confluence_add_label")]
    AddLabel(AddLabel),
    #[serde(rename = "confluence_get_labels")]
    GetLabels(GetLabels),
    #[serde(rename = "confluence_get_page_children")]
    GetPageChildren(GetPageChildren),
    #[serde(rename = "confluence_search")]
    Search(Search),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePage {
    pub space_key: String,
    pub title: String,
    pub html_content: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub parent_page_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetPage {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub page_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub space_key: Option<String>,
    #[serde(default = "default_true")]
    pub expand_body: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePage {
    #[serde(deserialize_with = "string_or_number")]
    pub page_id: String,
    #[serde(default)]
    pub new_title: Option<String>,
    #[serde(default)]
    pub new_html_content: Option<String>,
    #[serde(default)]
    pub minor_edit: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeletePage {
    #[serde(deserialize_with = "string_or_number")]
    pub page_id: String,
    #[serde(default = "default_status")]
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddComment {
    #[serde(deserialize_with = "string_or_number")]
    pub page_id: String,
    pub html_content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetComments {
    #[serde(deserialize_with = "string_or_number")]
    pub page_id: String,
    #[serde(default = "default_limit_50")]
    pub limit: u32,
    #[serde(default)]
    pub start: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddLabel {
    #[serde(deserialize_with = "string_or_number")]
    pub page_id: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetLabels {
    #[serde(deserialize_with = "string_or_number")]
    pub page_id: String,
    #[serde(default = "default_limit_200")]
    pub limit: u32,
    #[serde(default)]
    pub start: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetPageChildren {
    #[serde(deserialize_with = "string_or_number")]
    pub page_id: String,
    #[serde(default = "default_limit_50")]
    pub limit: u32,
    #[serde(default)]
    pub start: u32,
    #[serde(default)]
    pub expand_body: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Search {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub cql: Option<String>,
    #[serde(default = "default_limit_25")]
    pub limit: u32,
    #[serde(default)]
    pub start: u32,
    #[serde(default)]
    pub expand_body: bool,
}

fn default_status() -> String {
    "current".to_string()
}

fn default_limit_25() -> u32 {
    25
}

fn default_limit_50() -> u32 {
    50
}

fn default_limit_200() -> u32 {
    200
}

/// `{"storage": {"value": html, "representation": "storage"}}`
fn storage_body(html: &str) -> Value {
    json!({
        "storage": {
            "value": html,
            "representation": "storage",
        }
    })
}

fn expand(body: bool) -> &'static str {
    if body { "body.storage,version" } else { "version" }
}

fn content(page_id: &str) -> UpstreamRequest {
    UpstreamRequest::get().path("content").segment(page_id)
}

/// Plain-text search expressed as CQL over title and body.
fn text_cql(query: &str) -> String {
    let escaped = query.replace('\\', "\\\\").replace('"', "\\\"");
    format!("text ~ \"{escaped}\" OR title ~ \"{escaped}\"")
}

fn str_field(v: &Value, key: &str) -> Value {
    v.get(key).cloned().unwrap_or(Value::Null)
}

impl ConfluenceRequest {
    /// Arguments that end up in the URL path.
    pub(crate) fn path_arguments(&self) -> Vec<(&'static str, &str)> {
        let page_id = match self {
            Self::GetPage(r) => r.page_id.as_deref(),
            Self::UpdatePage(r) => Some(r.page_id.as_str()),
            Self::DeletePage(r) => Some(r.page_id.as_str()),
            Self::AddComment(r) => Some(r.page_id.as_str()),
            Self::GetComments(r) => Some(r.page_id.as_str()),
            Self::AddLabel(r) => Some(r.page_id.as_str()),
            Self::GetLabels(r) => Some(r.page_id.as_str()),
            Self::GetPageChildren(r) => Some(r.page_id.as_str()),
            Self::CreatePage(_) | Self::Search(_) => None,
        };
        page_id.map(|id| ("page_id", id)).into_iter().collect()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            Self::GetPage(r) => {
                let by_title = present(r.title.as_ref()).is_some()
                    && present(r.space_key.as_ref()).is_some();
                if present(r.page_id.as_ref()).is_none() && !by_title {
                    return Err(ToolError::InvalidArgument(
                        "provide either page_id or both title and space_key".to_string(),
                    ));
                }
                Ok(())
            }
            Self::Search(r) => {
                if present(r.cql.as_ref()).is_none() && present(r.query.as_ref()).is_none() {
                    return Err(ToolError::InvalidArgument(
                        "provide either 'query' or 'cql' for search".to_string(),
                    ));
                }
                Ok(())
            }
            Self::AddLabel(r) => require_non_empty(&r.labels, "labels"),
            _ => Ok(()),
        }
    }

    pub(crate) async fn execute(self, client: &UpstreamClient, token: &str) -> Result<Value> {
        match self {
            Self::CreatePage(r) => {
                let mut data = json!({
                    "type": "page",
                    "title": r.title,
                    "space": { "key": r.space_key },
                    "body": storage_body(&r.html_content),
                });
                if let Some(parent) = present(r.parent_page_id.as_ref()) {
                    data["ancestors"] = json!([{ "id": parent }]);
                }
                let created = client
                    .send(token, UpstreamRequest::post().path("content").json(data))
                    .await?;
                let link = format!(
                    "{}{}",
                    created
                        .pointer("/_links/base")
                        .and_then(Value::as_str)
                        .unwrap_or_default(),
                    created
                        .pointer("/_links/webui")
                        .and_then(Value::as_str)
                        .unwrap_or_default(),
                );
                Ok(json!({
                    "message": "Page created",
                    "id": str_field(&created, "id"),
                    "title": str_field(&created, "title"),
                    "link": link,
                }))
            }

            Self::GetPage(r) => {
                let expand = expand(r.expand_body);
                if let Some(page_id) = present(r.page_id.as_ref()) {
                    return Ok(client
                        .send(token, content(page_id).query("expand", expand))
                        .await?);
                }
                let (Some(title), Some(space_key)) = (r.title, r.space_key) else {
                    return Err(ToolError::InvalidArgument(
                        "provide either page_id or both title and space_key".to_string(),
                    ));
                };
                let found = client
                    .send(
                        token,
                        UpstreamRequest::get()
                            .path("content")
                            .query("title", title)
                            .query("spaceKey", space_key)
                            .query("expand", expand),
                    )
                    .await?;
                match found
                    .get("results")
                    .and_then(Value::as_array)
                    .and_then(|r| r.first())
                {
                    Some(page) => Ok(page.clone()),
                    None => Ok(json!({ "message": "No page found", "results": [] })),
                }
            }

            Self::UpdatePage(r) => {
                let current = client
                    .send(token, content(&r.page_id).query("expand", "version"))
                    .await?;
                let version = current
                    .pointer("/version/number")
                    .and_then(Value::as_u64)
                    .filter(|v| *v > 0)
                    .ok_or_else(|| {
                        ToolError::PreconditionFailed(format!(
                            "could not determine the current version of page {}",
                            r.page_id
                        ))
                    })?;

                let title = present(r.new_title.as_ref())
                    .map_or_else(|| str_field(&current, "title"), |t| json!(t));
                let mut payload = json!({
                    "id": r.page_id,
                    "type": "page",
                    "title": title,
                    "version": { "number": version + 1, "minorEdit": r.minor_edit },
                });
                if let Some(html) = &r.new_html_content {
                    payload["body"] = storage_body(html);
                }

                let updated = client
                    .send(
                        token,
                        UpstreamRequest::put()
                            .path("content")
                            .segment(&r.page_id)
                            .json(payload),
                    )
                    .await?;
                Ok(json!({
                    "message": "Page updated",
                    "id": str_field(&updated, "id"),
                    "title": str_field(&updated, "title"),
                    "version": updated.pointer("/version/number").cloned().unwrap_or(Value::Null),
                }))
            }

            Self::DeletePage(r) => {
                client
                    .send(
                        token,
                        UpstreamRequest::delete()
                            .path("content")
                            .segment(&r.page_id)
                            .query("status", &r.status),
                    )
                    .await?;
                Ok(json!({
                    "message": format!("Page {} deleted", r.page_id),
                    "status": r.status,
                }))
            }

            Self::AddComment(r) => {
                let data = json!({
                    "type": "comment",
                    "container": { "id": r.page_id, "type": "page" },
                    "body": storage_body(&r.html_content),
                });
                let created = client
                    .send(
                        token,
                        UpstreamRequest::post()
                            .path("content")
                            .segment(&r.page_id)
                            .path("child/comment")
                            .json(data),
                    )
                    .await?;
                Ok(json!({ "message": "Comment added", "id": str_field(&created, "id") }))
            }

            Self::GetComments(r) => Ok(client
                .send(
                    token,
                    content(&r.page_id)
                        .path("child/comment")
                        .query("expand", "body.storage,version")
                        .query("limit", r.limit)
                        .query("start", r.start),
                )
                .await?),

            Self::AddLabel(r) => {
                let payload: Vec<Value> = r
                    .labels
                    .iter()
                    .map(|name| json!({ "prefix": "global", "name": name }))
                    .collect();
                let resp = client
                    .send(
                        token,
                        UpstreamRequest::post()
                            .path("content")
                            .segment(&r.page_id)
                            .path("label")
                            .json(Value::Array(payload)),
                    )
                    .await?;
                Ok(json!({
                    "message": format!("Added {} label(s)", r.labels.len()),
                    "labels": resp,
                }))
            }

            Self::GetLabels(r) => Ok(client
                .send(
                    token,
                    content(&r.page_id)
                        .path("label")
                        .query("limit", r.limit)
                        .query("start", r.start),
                )
                .await?),

            Self::GetPageChildren(r) => Ok(client
                .send(
                    token,
                    content(&r.page_id)
                        .path("child/page")
                        .query("expand", expand(r.expand_body))
                        .query("limit", r.limit)
                        .query("start", r.start),
                )
                .await?),

            Self::Search(r) => {
                let cql = match (present(r.cql.as_ref()), present(r.query.as_ref())) {
                    (Some(cql), _) => cql.to_string(),
                    (None, Some(query)) => text_cql(query),
                    (None, None) => {
                        return Err(ToolError::InvalidArgument(
                            "provide either 'query' or 'cql' for search".to_string(),
                        ));
                    }
                };
                let mut req = UpstreamRequest::get()
                    .path("search")
                    .query("cql", cql)
                    .query("limit", r.limit)
                    .query("start", r.start);
                if r.expand_body {
                    req = req.query("expand", "body.storage");
                }
                Ok(client.send(token, req).await?)
            }
        }
    }
}
