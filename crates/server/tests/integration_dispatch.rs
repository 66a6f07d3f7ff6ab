mod common;

use collab_mcp::{DEFAULT_PRINCIPAL, Dispatcher, Platform, ToolError, ToolInvocation};
use collab_mcp_test_support::{MockResponse, MockUpstream, pick_unused_port};
use common::{args, backend, backend_config, call, dispatcher_for};
use serde_json::json;

#[tokio::test]
async fn every_mutating_tool_is_blocked_when_readonly() -> anyhow::Result<()> {
    let mock = MockUpstream::start().await?;
    let dispatcher = Platform::ALL.iter().fold(Dispatcher::new(), |d, &p| {
        d.with_backend(
            p,
            backend(p, backend_config(p, mock.base_url()), &[(DEFAULT_PRINCIPAL, "t")]),
        )
    });

    let mut blocked = 0;
    for spec in dispatcher.specs() {
        if !spec.access().is_mutating() {
            continue;
        }
        let err = dispatcher
            .invoke(ToolInvocation::new(spec.name, args(json!({}))).readonly(true))
            .await
            .expect_err("readonly");
        assert!(matches!(err, ToolError::ForbiddenByPolicy { .. }), "{}: {err}", spec.name);
        blocked += 1;
    }

    assert!(blocked > 0);
    assert_eq!(mock.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn read_tools_still_run_when_readonly() -> anyhow::Result<()> {
    let mock = MockUpstream::start().await?;
    mock.on("GET", "/user", MockResponse::json(200, json!({ "login": "me" })));
    let dispatcher = dispatcher_for(Platform::Github, &mock);

    let out = dispatcher
        .invoke(ToolInvocation::new("github_get_authenticated_user", args(json!({}))).readonly(true))
        .await?;
    assert_eq!(out["login"], "me");
    Ok(())
}

#[tokio::test]
async fn missing_required_argument_makes_no_upstream_call() -> anyhow::Result<()> {
    let mock = MockUpstream::start().await?;
    let dispatcher = dispatcher_for(Platform::Gitlab, &mock);

    let err = call(&dispatcher, "gitlab_create_branch", json!({ "project_id": 1 }))
        .await
        .expect_err("new_branch missing");
    assert_eq!(err.kind(), "invalid_argument");
    assert!(err.to_string().contains("new_branch"), "{err}");
    assert_eq!(mock.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn principals_use_their_own_tokens() -> anyhow::Result<()> {
    let mock = MockUpstream::start().await?;
    mock.on("GET", "/user", MockResponse::json(200, json!({})));
    let dispatcher = Dispatcher::new().with_backend(
        Platform::Github,
        backend(
            Platform::Github,
            backend_config(Platform::Github, mock.base_url()),
            &[(DEFAULT_PRINCIPAL, "tok-default"), ("alice", "tok-alice")],
        ),
    );

    dispatcher
        .invoke(ToolInvocation::new("github_get_authenticated_user", args(json!({}))).with_principal("alice"))
        .await?;
    dispatcher
        .invoke(ToolInvocation::new("github_get_authenticated_user", args(json!({}))))
        .await?;
    let err = dispatcher
        .invoke(ToolInvocation::new("github_get_authenticated_user", args(json!({}))).with_principal("bob"))
        .await
        .expect_err("bob has no token");

    assert_eq!(err.kind(), "unauthenticated");
    let auth: Vec<_> = mock
        .calls()
        .iter()
        .map(|c| c.header("authorization").unwrap_or_default().to_string())
        .collect();
    assert_eq!(auth, vec!["Bearer tok-alice", "Bearer tok-default"]);
    Ok(())
}

#[tokio::test]
async fn non_success_status_keeps_status_and_body() -> anyhow::Result<()> {
    let mock = MockUpstream::start().await?;
    mock.on(
        "PUT",
        "/repos/o/r/pulls/1/merge",
        MockResponse::json(405, json!({ "message": "Pull Request is not mergeable" })),
    );
    mock.on("GET", "/user", MockResponse::text(503, "maintenance"));
    let dispatcher = dispatcher_for(Platform::Github, &mock);

    let err = call(
        &dispatcher,
        "github_merge_pull_request",
        json!({ "owner": "o", "repo": "r", "pr_number": 1 }),
    )
    .await
    .expect_err("405");
    let details = err.to_json();
    assert_eq!(details["error"]["kind"], "upstream_error");
    assert_eq!(details["error"]["status"], 405);
    assert_eq!(details["error"]["body"]["message"], "Pull Request is not mergeable");

    let err = call(&dispatcher, "github_get_authenticated_user", json!({}))
        .await
        .expect_err("503");
    match err {
        ToolError::Upstream { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, json!("maintenance"));
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() -> anyhow::Result<()> {
    let port = pick_unused_port()?;
    let base = format!("http://127.0.0.1:{port}");
    let dispatcher = Dispatcher::new().with_backend(
        Platform::Github,
        backend(
            Platform::Github,
            backend_config(Platform::Github, &base),
            &[(DEFAULT_PRINCIPAL, "t")],
        ),
    );

    let err = call(&dispatcher, "github_get_authenticated_user", json!({}))
        .await
        .expect_err("nothing listening");
    assert_eq!(err.kind(), "transport_error");
    assert!(!err.to_string().contains("Bearer"), "{err}");
    Ok(())
}

#[tokio::test]
async fn unknown_tool_suggests_close_names() -> anyhow::Result<()> {
    let mock = MockUpstream::start().await?;
    let dispatcher = dispatcher_for(Platform::Github, &mock);

    let err = call(&dispatcher, "github_get_content", json!({}))
        .await
        .expect_err("typo");
    match err {
        ToolError::UnknownTool { suggestions, .. } => {
            assert!(suggestions.iter().any(|s| s == "github_get_contents"), "{suggestions:?}");
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}
