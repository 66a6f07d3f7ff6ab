//! Tool catalog.
//!
//! Each platform module declares:
//! - `TOOLS`: one [`ToolSpec`] per tool (name, primary HTTP method, parameter table). This drives
//!   `tools/list`, readonly enforcement and the advertised input schema.
//! - a request enum with one typed struct per tool. Arguments are decoded into it with unknown
//!   fields rejected, then executed against the platform's [`UpstreamClient`].

pub mod confluence;
pub mod github;
pub mod gitlab;

use crate::error::{Result, ToolError};
use collab_mcp_upstream::{Method, UpstreamClient};
use collab_mcp_upstream::semantics::{Access, annotations_for};
use rmcp::model::{JsonObject, Tool};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};
use std::sync::Arc;

/// A collaboration backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, clap::ValueEnum)]
pub enum Platform {
    Confluence,
    Github,
    Gitlab,
}

impl Platform {
    pub const ALL: [Self; 3] = [Self::Confluence, Self::Github, Self::Gitlab];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confluence => "confluence",
            Self::Github => "github",
            Self::Gitlab => "gitlab",
        }
    }

    #[must_use]
    pub fn tools(self) -> &'static [ToolSpec] {
        match self {
            Self::Confluence => confluence::TOOLS,
            Self::Github => github::TOOLS,
            Self::Gitlab => gitlab::TOOLS,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    /// Accepts a string or an integer (page ids, project ids).
    Id,
    Integer,
    Boolean,
    StringList,
    /// `[{path, content}]`
    FileList,
}

impl ParamKind {
    fn schema(self) -> Value {
        match self {
            Self::String => json!({ "type": "string" }),
            Self::Id => json!({ "type": ["string", "integer"] }),
            Self::Integer => json!({ "type": "integer", "minimum": 0 }),
            Self::Boolean => json!({ "type": "boolean" }),
            Self::StringList => json!({
                "type": "array",
                "items": { "type": "string" },
                "minItems": 1,
            }),
            Self::FileList => json!({
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "properties": {
                        "path": { "type": "string" },
                        "content": { "type": "string" },
                    },
                    "required": ["path", "content"],
                    "additionalProperties": false,
                },
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDefault {
    Str(&'static str),
    Int(u64),
    Bool(bool),
}

impl ParamDefault {
    fn to_json(self) -> Value {
        match self {
            Self::Str(s) => json!(s),
            Self::Int(n) => json!(n),
            Self::Bool(b) => json!(b),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<ParamDefault>,
    pub description: &'static str,
}

impl ParamSpec {
    #[must_use]
    pub const fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
            description,
        }
    }

    #[must_use]
    pub const fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
            description,
        }
    }

    #[must_use]
    pub const fn defaulted(
        name: &'static str,
        kind: ParamKind,
        default: ParamDefault,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: Some(default),
            description,
        }
    }
}

/// Static description of one tool.
#[derive(Debug)]
pub struct ToolSpec {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub platform: Platform,
    /// Method of the call that does the tool's real work. For multi-call tools this is the
    /// mutating step.
    pub method: Method,
    pub params: &'static [ParamSpec],
}

impl ToolSpec {
    #[must_use]
    pub fn access(&self) -> Access {
        Access::of(&self.method)
    }

    #[must_use]
    pub fn input_schema(&self) -> JsonObject {
        match build_input_schema(self.params) {
            Value::Object(map) => map,
            _ => JsonObject::new(),
        }
    }

    #[must_use]
    pub fn to_tool(&self) -> Tool {
        let mut tool = Tool::new(self.name, self.description, Arc::new(self.input_schema()));
        tool.annotations = Some(annotations_for(self.title, &self.method));
        tool
    }
}

/// JSON schema for a parameter table: properties (with defaults) and the required list.
#[must_use]
pub fn build_input_schema(params: &[ParamSpec]) -> Value {
    let mut properties = json!({});
    let mut required: Vec<&str> = Vec::new();

    for param in params {
        let mut prop_schema = param.kind.schema();
        prop_schema["description"] = json!(param.description);
        if let Some(default) = param.default {
            prop_schema["default"] = default.to_json();
        }

        properties[param.name] = prop_schema;

        if param.required {
            required.push(param.name);
        }
    }

    let mut schema = json!({
        "type": "object",
        "properties": properties,
        "additionalProperties": false,
    });

    if !required.is_empty() {
        schema["required"] = json!(required);
    }

    schema
}

/// Catalog names close to `unknown`, best match first.
#[must_use]
pub fn find_similar_strings(unknown: &str, known: &[&str]) -> Vec<String> {
    let mut candidates: Vec<(f64, String)> = Vec::new();
    for k in known {
        let score = strsim::jaro(unknown, k);
        if score > 0.7 {
            candidates.push((score, (*k).to_string()));
        }
    }
    candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    candidates.truncate(3);
    candidates.into_iter().map(|(_, s)| s).collect()
}

/// A decoded, validated tool call.
#[derive(Debug)]
pub enum ToolRequest {
    Confluence(confluence::ConfluenceRequest),
    Github(github::GithubRequest),
    Gitlab(gitlab::GitlabRequest),
}

impl ToolRequest {
    /// Decode `arguments` for `spec` and check cross-field rules.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArgument`] for missing, unknown or wrongly-typed arguments.
    pub fn decode(spec: &ToolSpec, arguments: JsonObject) -> Result<Self> {
        let request = match spec.platform {
            Platform::Confluence => Self::Confluence(decode_tagged(spec.name, arguments)?),
            Platform::Github => Self::Github(decode_tagged(spec.name, arguments)?),
            Platform::Gitlab => Self::Gitlab(decode_tagged(spec.name, arguments)?),
        };
        request.validate()?;
        Ok(request)
    }

    fn validate(&self) -> Result<()> {
        let path_arguments = match self {
            Self::Confluence(r) => r.path_arguments(),
            Self::Github(r) => r.path_arguments(),
            Self::Gitlab(r) => r.path_arguments(),
        };
        for (name, value) in path_arguments {
            reject_dot_segments(name, value)?;
        }

        match self {
            Self::Confluence(r) => r.validate(),
            Self::Github(r) => r.validate(),
            Self::Gitlab(r) => r.validate(),
        }
    }

    /// Perform the upstream call(s).
    ///
    /// # Errors
    ///
    /// Propagates upstream failures; multi-call tools stop at the first failing step.
    pub async fn execute(self, client: &UpstreamClient, token: &str) -> Result<Value> {
        match self {
            Self::Confluence(r) => r.execute(client, token).await,
            Self::Github(r) => r.execute(client, token).await,
            Self::Gitlab(r) => r.execute(client, token).await,
        }
    }
}

/// Decode `{"tool": name, "arguments": {...}}` into an adjacently-tagged request enum.
fn decode_tagged<T: DeserializeOwned>(name: &str, arguments: JsonObject) -> Result<T> {
    serde_json::from_value(json!({ "tool": name, "arguments": Value::Object(arguments) }))
        .map_err(|e| ToolError::InvalidArgument(e.to_string()))
}

/// One file for multi-file commits.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileEntry {
    pub path: String,
    pub content: String,
}

pub(crate) fn require_non_empty<T>(items: &[T], name: &str) -> Result<()> {
    if items.is_empty() {
        return Err(ToolError::InvalidArgument(format!(
            "'{name}' must contain at least one entry"
        )));
    }
    Ok(())
}

/// URL normalization drops `.` and `..` segments, which would silently retarget the request.
pub(crate) fn reject_dot_segments(name: &str, value: &str) -> Result<()> {
    if value.split('/').any(|piece| piece == "." || piece == "..") {
        return Err(ToolError::InvalidArgument(format!(
            "'{name}' must not contain '.' or '..' path segments"
        )));
    }
    Ok(())
}

/// Non-empty string field, for "either A or B" rules where an empty value counts as absent.
pub(crate) fn present(v: Option<&String>) -> Option<&str> {
    v.map(String::as_str).filter(|s| !s.trim().is_empty())
}

/// Pull a string out of a prerequisite response, or fail before the dependent call.
pub(crate) fn required_str<'a>(v: &'a Value, pointer: &str, what: &str) -> Result<&'a str> {
    v.pointer(pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::PreconditionFailed(format!("{what} is missing from response")))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }
    }
}

pub(crate) fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(String::from)
}

pub(crate) fn opt_string_or_number<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(String::from))
}

pub(crate) fn default_main() -> String {
    "main".to_string()
}

pub(crate) fn default_merge_message() -> String {
    "Merging via MCP".to_string()
}

pub(crate) fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn all_specs() -> impl Iterator<Item = &'static ToolSpec> {
        Platform::ALL.iter().flat_map(|p| p.tools().iter())
    }

    fn sample(kind: ParamKind) -> Value {
        match kind {
            ParamKind::String => json!("x"),
            ParamKind::Id => json!(42),
            ParamKind::Integer => json!(7),
            ParamKind::Boolean => json!(true),
            ParamKind::StringList => json!(["a", "b"]),
            ParamKind::FileList => json!([{ "path": "a.txt", "content": "a" }]),
        }
    }

    fn full_arguments(spec: &ToolSpec) -> JsonObject {
        spec.params
            .iter()
            .map(|p| (p.name.to_string(), sample(p.kind)))
            .collect()
    }

    fn required_arguments(spec: &ToolSpec) -> JsonObject {
        spec.params
            .iter()
            .filter(|p| p.required)
            .map(|p| (p.name.to_string(), sample(p.kind)))
            .collect()
    }

    #[test]
    fn tool_names_are_unique_and_platform_prefixed() {
        let mut seen = HashSet::new();
        for spec in all_specs() {
            assert!(seen.insert(spec.name), "duplicate tool {}", spec.name);
            assert!(
                spec.name.starts_with(&format!("{}_", spec.platform.as_str())),
                "{} is not prefixed with its platform",
                spec.name
            );
        }
        assert_eq!(seen.len(), 26);
    }

    #[test]
    fn every_declared_parameter_is_accepted() {
        for spec in all_specs() {
            ToolRequest::decode(spec, full_arguments(spec))
                .unwrap_or_else(|e| panic!("{} rejected its own parameters: {e}", spec.name));
        }
    }

    #[test]
    fn each_required_parameter_is_enforced() {
        for spec in all_specs() {
            for param in spec.params.iter().filter(|p| p.required) {
                let mut args = required_arguments(spec);
                args.remove(param.name);
                let err = ToolRequest::decode(spec, args).expect_err(param.name);
                assert_eq!(err.kind(), "invalid_argument", "{}.{}", spec.name, param.name);
            }
        }
    }

    #[test]
    fn unknown_argument_is_rejected() {
        let spec = github::TOOLS
            .iter()
            .find(|s| s.name == "github_get_contents")
            .expect("tool");
        let mut args = required_arguments(spec);
        args.insert("branch".to_string(), json!("dev"));

        let err = ToolRequest::decode(spec, args).expect_err("unknown field");
        assert!(err.to_string().contains("branch"), "{err}");
    }

    #[test]
    fn wrongly_typed_argument_is_rejected() {
        let spec = github::TOOLS
            .iter()
            .find(|s| s.name == "github_merge_pull_request")
            .expect("tool");
        let mut args = required_arguments(spec);
        args.insert("pr_number".to_string(), json!("seven"));

        let err = ToolRequest::decode(spec, args).expect_err("bad type");
        assert_eq!(err.kind(), "invalid_argument");
    }

    #[test]
    fn schema_lists_required_and_defaults() {
        let spec = github::TOOLS
            .iter()
            .find(|s| s.name == "github_create_pull_request")
            .expect("tool");
        let schema = build_input_schema(spec.params);

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["base"]["default"], "main");
        assert_eq!(schema["properties"]["body"]["default"], "");
        let required: Vec<&str> = schema["required"]
            .as_array()
            .expect("required")
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(required, ["owner", "repo", "title", "head"]);
    }

    #[test]
    fn tool_without_parameters_has_no_required_list() {
        let spec = github::TOOLS
            .iter()
            .find(|s| s.name == "github_get_authenticated_user")
            .expect("tool");
        let schema = build_input_schema(spec.params);
        assert!(schema.get("required").is_none());
        assert_eq!(schema["properties"], json!({}));
    }

    #[test]
    fn annotations_follow_primary_method() {
        for spec in all_specs() {
            let tool = spec.to_tool();
            let annotations = tool.annotations.expect("annotations");
            assert_eq!(
                annotations.read_only_hint,
                Some(!spec.access().is_mutating()),
                "{}",
                spec.name
            );
        }
    }

    #[test]
    fn dot_segments_are_refused_anywhere_in_a_path() {
        for bad in [".", "..", "a/../b", "../x", "x/.", "a//./b"] {
            let err = reject_dot_segments("path", bad).expect_err(bad);
            assert_eq!(err.kind(), "invalid_argument", "{bad}");
        }
        for good in ["a.b", "..a", "a..", ".github/ci.yml", "group/sub"] {
            assert!(reject_dot_segments("path", good).is_ok(), "{good}");
        }
    }

    #[test]
    fn similar_names_are_suggested() {
        let known: Vec<&str> = all_specs().map(|s| s.name).collect();
        let suggestions = find_similar_strings("github_get_content", &known);
        assert_eq!(suggestions.first().map(String::as_str), Some("github_get_contents"));
        assert!(find_similar_strings("zzzz", &known).is_empty());
    }
}
