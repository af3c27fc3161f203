//! The KV backend against a minimal in-process server speaking the Upstash
//! REST protocol.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tinypaste_common::{FetchedPaste, Health, Url};
use tinypaste_server::lifecycle::Lookup;
use tinypaste_server::paste::Paste;
use tinypaste_server::store::{KvStore, PasteStore};

use crate::support::{create, fetch, start_server};

const TOKEN: &str = "secret-token";

#[derive(Clone, Default)]
struct FakeKv {
    values: Arc<Mutex<HashMap<String, String>>>,
    expiries: Arc<Mutex<HashMap<String, String>>>,
}

impl FakeKv {
    fn run(&self, command: &[Value]) -> Value {
        let arg = |i: usize| command.get(i).and_then(Value::as_str).unwrap_or_default();
        let mut values = self.values.lock();
        match arg(0) {
            "SET" => {
                values.insert(arg(1).to_string(), arg(2).to_string());
                if arg(3) == "EX" {
                    self.expiries
                        .lock()
                        .insert(arg(1).to_string(), arg(4).to_string());
                }
                json!({"result": "OK"})
            }
            "GET" => json!({"result": values.get(arg(1))}),
            "INCR" => Self::incr(&mut values, arg(1)),
            // Only the increment-if-present script is understood.
            "EVAL" if arg(1).contains("EXISTS") && arg(2) == "1" => {
                if values.contains_key(arg(3)) {
                    Self::incr(&mut values, arg(3))
                } else {
                    json!({"result": null})
                }
            }
            other => json!({"error": format!("ERR unknown command '{other}'")}),
        }
    }
}

impl FakeKv {
    fn incr(values: &mut HashMap<String, String>, key: &str) -> Value {
        let current = values.get(key).map_or(Some(0), |v| v.parse::<i64>().ok());
        match current {
            Some(current) => {
                values.insert(key.to_string(), (current + 1).to_string());
                json!({"result": current + 1})
            }
            None => json!({"error": "ERR value is not an integer or out of range"}),
        }
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

async fn single(
    State(kv): State<FakeKv>,
    headers: HeaderMap,
    Json(command): Json<Vec<Value>>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"})));
    }
    (StatusCode::OK, Json(kv.run(&command)))
}

async fn pipeline(
    State(kv): State<FakeKv>,
    headers: HeaderMap,
    Json(commands): Json<Vec<Vec<Value>>>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"})));
    }
    let replies: Vec<Value> = commands.iter().map(|command| kv.run(command)).collect();
    (StatusCode::OK, Json(Value::Array(replies)))
}

async fn start_fake_kv() -> (FakeKv, Url) {
    let kv = FakeKv::default();
    let app = Router::new()
        .route("/", post(single))
        .route("/pipeline", post(pipeline))
        .with_state(kv.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (kv, Url::parse(&format!("http://{addr}/")).unwrap())
}

async fn kv_store() -> (FakeKv, Arc<KvStore>) {
    let (kv, url) = start_fake_kv().await;
    (kv, Arc::new(KvStore::new(url, TOKEN.to_string()).unwrap()))
}

#[tokio::test]
async fn paste_lifecycle_over_kv() {
    let (kv, store) = kv_store().await;
    let base = start_server(Some(store)).await;
    let client = reqwest::Client::new();

    let created = create(
        &client,
        &base,
        1_000,
        json!({"content": "hello", "ttl_seconds": 60, "max_views": 2}),
    )
    .await;

    {
        let values = kv.values.lock();
        let record: Value =
            serde_json::from_str(&values[&format!("paste:{}", created.id)]).unwrap();
        assert_eq!(record["content"], "hello");
        assert_eq!(record["expires_at"], 61_000);
        assert_eq!(values[&format!("paste:{}:views", created.id)], "0");
    }
    {
        let expiries = kv.expiries.lock();
        assert_eq!(expiries[&format!("paste:{}", created.id)], "60");
        assert_eq!(expiries[&format!("paste:{}:views", created.id)], "60");
    }

    let first: FetchedPaste = fetch(&client, &base, &created.id, 1_000).await.json().await.unwrap();
    assert_eq!(first.remaining_views, Some(1));
    assert_eq!(first.expires_at.as_deref(), Some("1970-01-01T00:01:01.000Z"));

    let second: FetchedPaste = fetch(&client, &base, &created.id, 1_000).await.json().await.unwrap();
    assert_eq!(second.remaining_views, Some(0));

    assert_eq!(fetch(&client, &base, &created.id, 1_000).await.status(), 404);
    assert_eq!(fetch(&client, &base, &created.id, 1_000).await.status(), 404);
}

#[tokio::test]
async fn expired_record_is_withheld_without_counting() {
    let (kv, store) = kv_store().await;
    store
        .insert_paste(Paste::new("a", "x", 0, Some(1_000), Some(3)))
        .await
        .unwrap();

    assert_eq!(store.get_paste("a", 1_000).await.unwrap(), Lookup::Withheld);
    assert_eq!(kv.values.lock()["paste:a:views"], "0");
    assert_eq!(store.get_paste("missing", 0).await.unwrap(), Lookup::Missing);
}

#[tokio::test]
async fn vanished_counter_is_not_recreated() {
    let (kv, store) = kv_store().await;
    store
        .insert_paste(Paste::new("a", "x", 0, Some(60_000), Some(3)))
        .await
        .unwrap();
    assert!(matches!(store.get_paste("a", 0).await.unwrap(), Lookup::Granted(_)));

    kv.values.lock().remove("paste:a:views");
    kv.expiries.lock().remove("paste:a:views");

    assert_eq!(store.get_paste("a", 0).await.unwrap(), Lookup::Withheld);
    assert!(!kv.values.lock().contains_key("paste:a:views"));
    assert!(!kv.expiries.lock().contains_key("paste:a:views"));
}

#[tokio::test]
async fn concurrent_reads_respect_the_quota() {
    let (_kv, store) = kv_store().await;
    store
        .insert_paste(Paste::new("race", "x", 0, None, Some(4)))
        .await
        .unwrap();

    let reads: Vec<_> = (0..32)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.get_paste("race", 0).await.unwrap() })
        })
        .collect();

    let mut granted = Vec::new();
    for read in reads {
        if let Lookup::Granted(paste) = read.await.unwrap() {
            granted.push(paste.views);
        }
    }
    granted.sort_unstable();
    assert_eq!(granted, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn health_reflects_the_service() {
    let (_kv, store) = kv_store().await;
    let base = start_server(Some(store)).await;
    let resp = reqwest::get(format!("{base}/api/healthz")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let health: Health = resp.json().await.unwrap();
    assert_eq!(health, Health { ok: true, backend: "kv".to_string() });
}

#[tokio::test]
async fn bad_token_is_unhealthy_and_fails_writes() {
    let (_kv, url) = start_fake_kv().await;
    let store = Arc::new(KvStore::new(url, "wrong".to_string()).unwrap());
    assert!(!store.check_health().await);
    assert!(store
        .insert_paste(Paste::new("a", "x", 0, None, None))
        .await
        .is_err());

    let base = start_server(Some(store)).await;
    let client = reqwest::Client::new();
    let health = reqwest::get(format!("{base}/api/healthz")).await.unwrap();
    assert_eq!(health.status(), 503);

    let resp = client
        .post(format!("{base}/api/pastes"))
        .json(&json!({"content": "x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
}
