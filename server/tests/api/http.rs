use std::sync::Arc;

use serde_json::{json, Value};
use tinypaste_common::{FetchedPaste, Health, StatelessPaste, TEST_NOW_HEADER_NAME};
use tinypaste_server::store::MemoryStore;

use crate::support::{create, fetch, start_server};

#[tokio::test]
async fn health_check() {
    let base = start_server(Some(Arc::new(MemoryStore::default()))).await;
    let resp = reqwest::get(format!("{base}/api/healthz")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let health: Health = resp.json().await.unwrap();
    assert!(health.ok);
    assert_eq!(health.backend, "memory");
}

#[tokio::test]
async fn view_limited_paste_lifecycle() {
    let base = start_server(Some(Arc::new(MemoryStore::default()))).await;
    let client = reqwest::Client::new();

    let created = create(
        &client,
        &base,
        1_000,
        json!({"content": "hello", "ttl_seconds": 60, "max_views": 2}),
    )
    .await;
    assert!(created.url.ends_with(&format!("/p/{}", created.id)));

    let first: FetchedPaste = fetch(&client, &base, &created.id, 1_000).await.json().await.unwrap();
    assert_eq!(
        first,
        FetchedPaste {
            content: "hello".to_string(),
            remaining_views: Some(1),
            expires_at: Some("1970-01-01T00:01:01.000Z".to_string()),
        }
    );

    let second: FetchedPaste = fetch(&client, &base, &created.id, 1_000).await.json().await.unwrap();
    assert_eq!(second.remaining_views, Some(0));

    let third = fetch(&client, &base, &created.id, 1_000).await;
    assert_eq!(third.status(), 404);
}

#[tokio::test]
async fn expiry_follows_the_simulated_clock() {
    let base = start_server(Some(Arc::new(MemoryStore::default()))).await;
    let client = reqwest::Client::new();
    let t0 = 1_700_000_000_000;

    let created = create(&client, &base, t0, json!({"content": "soon gone", "ttl_seconds": 1})).await;

    let before = fetch(&client, &base, &created.id, t0 + 999).await;
    assert_eq!(before.status(), 200);
    let body: FetchedPaste = before.json().await.unwrap();
    assert_eq!(body.remaining_views, None);

    let after = fetch(&client, &base, &created.id, t0 + 1_001).await;
    assert_eq!(after.status(), 404);
}

#[tokio::test]
async fn concurrent_fetches_respect_the_quota() {
    let base = start_server(Some(Arc::new(MemoryStore::default()))).await;
    let client = reqwest::Client::new();
    let created = create(&client, &base, 0, json!({"content": "race", "max_views": 3})).await;

    let requests: Vec<_> = (0..24)
        .map(|_| {
            let client = client.clone();
            let url = format!("{base}/api/pastes/{}", created.id);
            tokio::spawn(async move { client.get(url).send().await.unwrap().status() })
        })
        .collect();

    let mut ok = 0;
    for request in requests {
        let status = request.await.unwrap();
        if status == 200 {
            ok += 1;
        } else {
            assert_eq!(status, 404);
        }
    }
    assert_eq!(ok, 3);
}

#[tokio::test]
async fn validation_errors_name_the_field() {
    let store = Arc::new(MemoryStore::default());
    let base = start_server(Some(store.clone())).await;
    let client = reqwest::Client::new();

    for (body, field) in [
        (json!({"content": ""}), "content"),
        (json!({"content": "   "}), "content"),
        (json!({"content": "x", "ttl_seconds": -1}), "ttl_seconds"),
        (json!({"content": "x", "max_views": 0}), "max_views"),
        (json!({"content": "x", "max_views": 1.5}), "max_views"),
    ] {
        let resp = client
            .post(format!("{base}/api/pastes"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "{body}");
        let error: Value = resp.json().await.unwrap();
        assert_eq!(error["field"], field);
        assert!(error["error"].as_str().unwrap().ends_with('.'));
    }

    let garbage = client
        .post(format!("{base}/api/pastes"))
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(garbage.status(), 400);

    let too_far = client
        .post(format!("{base}/api/pastes"))
        .json(&json!({"content": "x", "ttl_seconds": 9_000_000_000_000_u64}))
        .send()
        .await
        .unwrap();
    assert_eq!(too_far.status(), 400);

    assert!(store.is_empty());
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let base = start_server(Some(Arc::new(MemoryStore::default()))).await;
    let client = reqwest::Client::new();

    let resp = fetch(&client, &base, "doesnotexist", 0).await;
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Paste not found or unavailable");

    let page = client.get(format!("{base}/p/doesnotexist")).send().await.unwrap();
    assert_eq!(page.status(), 404);
    assert!(page.text().await.unwrap().contains("404 - Paste not found or unavailable"));
}

#[tokio::test]
async fn html_page_escapes_content_and_counts_views() {
    let base = start_server(Some(Arc::new(MemoryStore::default()))).await;
    let client = reqwest::Client::new();
    let created = create(
        &client,
        &base,
        0,
        json!({"content": "<img src=x onerror=alert(1)>", "max_views": 5}),
    )
    .await;

    let page = client
        .get(format!("{base}/p/{}", created.id))
        .header(&*TEST_NOW_HEADER_NAME, 0)
        .send()
        .await
        .unwrap();
    assert_eq!(page.status(), 200);
    assert!(page
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let html = page.text().await.unwrap();
    assert!(html.contains("&lt;img src=x onerror=alert(1)&gt;"));
    assert!(!html.contains("<img"));
    assert!(html.contains("Views: 1/5"));
    assert!(html.contains("Never Expires"));

    // The page and the API share one view counter.
    let api: FetchedPaste = fetch(&client, &base, &created.id, 0).await.json().await.unwrap();
    assert_eq!(api.remaining_views, Some(3));
}

#[tokio::test]
async fn stateless_mode_round_trips_through_the_id() {
    let base = start_server(None).await;
    let client = reqwest::Client::new();

    let health: Health = reqwest::get(format!("{base}/api/healthz"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.backend, "stateless");

    let created = create(&client, &base, 0, json!({"content": "x"})).await;
    assert_eq!(
        StatelessPaste::decode(&created.id).unwrap(),
        StatelessPaste::new("x", None)
    );

    let far_future = fetch(&client, &base, &created.id, i64::MAX / 2).await;
    assert_eq!(far_future.status(), 200);

    let page = client.get(format!("{base}/p/{}", created.id)).send().await.unwrap();
    assert!(page.text().await.unwrap().contains("Views: N/A"));
}

#[tokio::test]
async fn stateless_paste_expires() {
    let base = start_server(None).await;
    let client = reqwest::Client::new();

    let created = create(&client, &base, 10_000, json!({"content": "x", "ttl_seconds": 5})).await;
    assert_eq!(
        StatelessPaste::decode(&created.id).unwrap().expires_at,
        Some(15_000)
    );
    assert_eq!(fetch(&client, &base, &created.id, 14_999).await.status(), 200);
    assert_eq!(fetch(&client, &base, &created.id, 15_001).await.status(), 404);

    let expired = StatelessPaste::new("old", Some(1)).encode();
    assert_eq!(fetch(&client, &base, &expired, 2).await.status(), 404);
}
