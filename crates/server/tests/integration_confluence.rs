mod common;

use collab_mcp::Platform;
use collab_mcp_test_support::{MockResponse, MockUpstream};
use common::{TOKEN, call, dispatcher_for};
use serde_json::json;

#[tokio::test]
async fn created_page_can_be_fetched_by_id_and_by_title() -> anyhow::Result<()> {
    let mock = MockUpstream::start().await?;
    mock.on_fn("POST", "/rest/api/content", |req| {
        let body = req.body.clone().unwrap_or_default();
        MockResponse::json(
            200,
            json!({
                "id": "123",
                "title": body["title"],
                "_links": { "base": "https://wiki.test", "webui": "/pages/123" },
            }),
        )
    });
    let page = json!({ "id": "123", "title": "Runbook", "version": { "number": 1 } });
    mock.on("GET", "/rest/api/content/123", MockResponse::json(200, page.clone()));
    mock.on(
        "GET",
        "/rest/api/content",
        MockResponse::json(200, json!({ "results": [page.clone()], "size": 1 })),
    );
    let dispatcher = dispatcher_for(Platform::Confluence, &mock);

    let created = call(
        &dispatcher,
        "confluence_create_page",
        json!({
            "space_key": "OPS",
            "title": "Runbook",
            "html_content": "<p>hi</p>",
            "parent_page_id": 7,
        }),
    )
    .await?;
    assert_eq!(created["message"], "Page created");
    assert_eq!(created["id"], "123");
    assert_eq!(created["link"], "https://wiki.test/pages/123");

    let by_id = call(&dispatcher, "confluence_get_page", json!({ "page_id": "123" })).await?;
    assert_eq!(by_id["title"], "Runbook");

    let by_title = call(
        &dispatcher,
        "confluence_get_page",
        json!({ "title": "Runbook", "space_key": "OPS", "expand_body": true }),
    )
    .await?;
    assert_eq!(by_title, page);

    let calls = mock.calls();
    assert_eq!(
        calls[0].body,
        Some(json!({
            "type": "page",
            "title": "Runbook",
            "space": { "key": "OPS" },
            "body": { "storage": { "value": "<p>hi</p>", "representation": "storage" } },
            "ancestors": [{ "id": "7" }],
        }))
    );
    assert_eq!(calls[1].query_param("expand").as_deref(), Some("body.storage,version"));
    assert_eq!(calls[2].query_param("title").as_deref(), Some("Runbook"));
    assert_eq!(calls[2].query_param("spaceKey").as_deref(), Some("OPS"));
    assert_eq!(calls[2].query_param("expand").as_deref(), Some("body.storage,version"));

    let bearer = format!("Bearer {TOKEN}");
    assert!(calls.iter().all(|c| c.header("authorization") == Some(bearer.as_str())));
    Ok(())
}

#[tokio::test]
async fn title_lookup_without_results_is_not_an_error() -> anyhow::Result<()> {
    let mock = MockUpstream::start().await?;
    mock.on("GET", "/rest/api/content", MockResponse::json(200, json!({ "results": [] })));
    let dispatcher = dispatcher_for(Platform::Confluence, &mock);

    let out = call(
        &dispatcher,
        "confluence_get_page",
        json!({ "title": "Missing", "space_key": "OPS" }),
    )
    .await?;
    assert_eq!(out["message"], "No page found");
    Ok(())
}

#[tokio::test]
async fn get_page_needs_id_or_title_and_space() -> anyhow::Result<()> {
    let mock = MockUpstream::start().await?;
    let dispatcher = dispatcher_for(Platform::Confluence, &mock);

    let err = call(&dispatcher, "confluence_get_page", json!({ "title": "Runbook" }))
        .await
        .expect_err("space_key missing");
    assert_eq!(err.kind(), "invalid_argument");
    assert_eq!(mock.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn update_bumps_the_current_version() -> anyhow::Result<()> {
    let mock = MockUpstream::start().await?;
    mock.on(
        "GET",
        "/rest/api/content/42",
        MockResponse::json(200, json!({ "id": "42", "title": "Old", "version": { "number": 4 } })),
    );
    mock.on_fn("PUT", "/rest/api/content/42", |req| {
        let body = req.body.clone().unwrap_or_default();
        MockResponse::json(
            200,
            json!({ "id": "42", "title": body["title"], "version": body["version"] }),
        )
    });
    let dispatcher = dispatcher_for(Platform::Confluence, &mock);

    let out = call(
        &dispatcher,
        "confluence_update_page",
        json!({ "page_id": 42, "new_html_content": "<p>new</p>" }),
    )
    .await?;

    assert_eq!(out["message"], "Page updated");
    assert_eq!(out["version"], 5);
    assert_eq!(out["title"], "Old");

    let calls = mock.calls();
    assert_eq!(
        mock.call_lines(),
        vec!["GET /rest/api/content/42", "PUT /rest/api/content/42"]
    );
    assert_eq!(
        calls[1].body,
        Some(json!({
            "id": "42",
            "type": "page",
            "title": "Old",
            "version": { "number": 5, "minorEdit": false },
            "body": { "storage": { "value": "<p>new</p>", "representation": "storage" } },
        }))
    );
    Ok(())
}

#[tokio::test]
async fn update_with_blank_title_keeps_the_current_title() -> anyhow::Result<()> {
    let mock = MockUpstream::start().await?;
    mock.on(
        "GET",
        "/rest/api/content/42",
        MockResponse::json(200, json!({ "id": "42", "title": "Old", "version": { "number": 2 } })),
    );
    mock.on("PUT", "/rest/api/content/42", MockResponse::json(200, json!({ "id": "42" })));
    let dispatcher = dispatcher_for(Platform::Confluence, &mock);

    call(
        &dispatcher,
        "confluence_update_page",
        json!({ "page_id": "42", "new_title": "  ", "new_html_content": "<p>x</p>" }),
    )
    .await?;

    let calls = mock.calls();
    let body = calls[1].body.clone().unwrap_or_default();
    assert_eq!(body["title"], "Old");
    assert_eq!(body["version"]["number"], 3);
    Ok(())
}

#[tokio::test]
async fn update_without_a_known_version_sends_no_put() -> anyhow::Result<()> {
    let mock = MockUpstream::start().await?;
    mock.on(
        "GET",
        "/rest/api/content/42",
        MockResponse::json(200, json!({ "id": "42", "title": "Old" })),
    );
    let dispatcher = dispatcher_for(Platform::Confluence, &mock);

    let err = call(
        &dispatcher,
        "confluence_update_page",
        json!({ "page_id": "42", "new_title": "New" }),
    )
    .await
    .expect_err("no version");

    assert_eq!(err.kind(), "precondition_failed");
    assert_eq!(mock.call_lines(), vec!["GET /rest/api/content/42"]);
    Ok(())
}

#[tokio::test]
async fn delete_comment_and_labels() -> anyhow::Result<()> {
    let mock = MockUpstream::start().await?;
    mock.on("DELETE", "/rest/api/content/9", MockResponse::empty(204));
    mock.on(
        "POST",
        "/rest/api/content/9/child/comment",
        MockResponse::json(200, json!({ "id": "c1" })),
    );
    mock.on(
        "POST",
        "/rest/api/content/9/label",
        MockResponse::json(200, json!({ "results": [] })),
    );
    let dispatcher = dispatcher_for(Platform::Confluence, &mock);

    let deleted = call(&dispatcher, "confluence_delete_page", json!({ "page_id": "9" })).await?;
    assert_eq!(deleted["message"], "Page 9 deleted");

    let comment = call(
        &dispatcher,
        "confluence_add_comment",
        json!({ "page_id": "9", "html_content": "<p>lgtm</p>" }),
    )
    .await?;
    assert_eq!(comment["id"], "c1");

    call(
        &dispatcher,
        "confluence_add_label",
        json!({ "page_id": "9", "labels": ["ops", "runbook"] }),
    )
    .await?;

    let calls = mock.calls();
    assert_eq!(calls[0].query_param("status").as_deref(), Some("current"));
    assert_eq!(
        calls[1].body.as_ref().map(|b| b["container"].clone()),
        Some(json!({ "id": "9", "type": "page" }))
    );
    assert_eq!(
        calls[2].body,
        Some(json!([
            { "prefix": "global", "name": "ops" },
            { "prefix": "global", "name": "runbook" },
        ]))
    );
    Ok(())
}

#[tokio::test]
async fn paged_reads_forward_limit_and_start() -> anyhow::Result<()> {
    let mock = MockUpstream::start().await?;
    mock.on(
        "GET",
        "/rest/api/content/9/child/page",
        MockResponse::json(200, json!({ "results": [] })),
    );
    let dispatcher = dispatcher_for(Platform::Confluence, &mock);

    call(
        &dispatcher,
        "confluence_get_page_children",
        json!({ "page_id": "9", "limit": 10, "start": 20 }),
    )
    .await?;

    let calls = mock.calls();
    assert_eq!(calls[0].query_param("limit").as_deref(), Some("10"));
    assert_eq!(calls[0].query_param("start").as_deref(), Some("20"));
    Ok(())
}

#[tokio::test]
async fn comments_and_labels_use_default_paging() -> anyhow::Result<()> {
    let mock = MockUpstream::start().await?;
    mock.on(
        "GET",
        "/rest/api/content/9/child/comment",
        MockResponse::json(200, json!({ "results": [{ "id": "c1" }] })),
    );
    mock.on(
        "GET",
        "/rest/api/content/9/label",
        MockResponse::json(200, json!({ "results": [{ "name": "ops" }] })),
    );
    let dispatcher = dispatcher_for(Platform::Confluence, &mock);

    let comments = call(&dispatcher, "confluence_get_comments", json!({ "page_id": "9" })).await?;
    assert_eq!(comments["results"][0]["id"], "c1");
    let labels = call(&dispatcher, "confluence_get_labels", json!({ "page_id": 9 })).await?;
    assert_eq!(labels["results"][0]["name"], "ops");

    assert_eq!(
        mock.call_lines(),
        vec!["GET /rest/api/content/9/child/comment", "GET /rest/api/content/9/label"]
    );
    let calls = mock.calls();
    assert_eq!(calls[0].query_param("limit").as_deref(), Some("50"));
    assert_eq!(calls[0].query_param("start").as_deref(), Some("0"));
    assert_eq!(calls[0].query_param("expand").as_deref(), Some("body.storage,version"));
    assert_eq!(calls[1].query_param("limit").as_deref(), Some("200"));
    assert_eq!(calls[1].query_param("start").as_deref(), Some("0"));
    assert_eq!(calls[1].query_param("expand"), None);
    Ok(())
}

#[tokio::test]
async fn dot_segment_page_ids_are_rejected_before_any_request() -> anyhow::Result<()> {
    let mock = MockUpstream::start().await?;
    let dispatcher = dispatcher_for(Platform::Confluence, &mock);

    for page_id in ["..", "../../admin", "."] {
        let err = call(&dispatcher, "confluence_get_labels", json!({ "page_id": page_id }))
            .await
            .expect_err("dot segment");
        assert_eq!(err.kind(), "invalid_argument");
    }
    assert_eq!(mock.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn search_prefers_cql_over_query() -> anyhow::Result<()> {
    let mock = MockUpstream::start().await?;
    mock.on("GET", "/rest/api/search", MockResponse::json(200, json!({ "results": [] })));
    let dispatcher = dispatcher_for(Platform::Confluence, &mock);

    call(
        &dispatcher,
        "confluence_search",
        json!({ "query": "ignored", "cql": "space = OPS" }),
    )
    .await?;
    call(&dispatcher, "confluence_search", json!({ "query": "on-call" })).await?;

    let calls = mock.calls();
    assert_eq!(calls[0].query_param("cql").as_deref(), Some("space = OPS"));
    assert_eq!(
        calls[1].query_param("cql").as_deref(),
        Some(r#"text ~ "on-call" OR title ~ "on-call""#)
    );
    Ok(())
}

#[tokio::test]
async fn search_without_query_or_cql_is_rejected() -> anyhow::Result<()> {
    let mock = MockUpstream::start().await?;
    let dispatcher = dispatcher_for(Platform::Confluence, &mock);

    let err = call(&dispatcher, "confluence_search", json!({ "limit": 5 }))
        .await
        .expect_err("nothing to search for");
    assert_eq!(err.kind(), "invalid_argument");
    assert_eq!(mock.call_count(), 0);
    Ok(())
}
