use std::sync::Arc;

use tinypaste_common::{CreatedPaste, TEST_NOW_HEADER_NAME};
use tinypaste_server::store::PasteStore;
use tinypaste_server::{router, AppState, Config};

/// Bind to port 0 and return the actual address.
pub async fn start_server(store: Option<Arc<dyn PasteStore>>) -> String {
    let config = Config {
        test_mode: true,
        ..Config::default()
    };
    let app = router(AppState::new(config, store));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub async fn create(
    client: &reqwest::Client,
    base: &str,
    now: i64,
    body: serde_json::Value,
) -> CreatedPaste {
    let resp = client
        .post(format!("{base}/api/pastes"))
        .header(&*TEST_NOW_HEADER_NAME, now)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    resp.json().await.unwrap()
}

pub async fn fetch(client: &reqwest::Client, base: &str, id: &str, now: i64) -> reqwest::Response {
    client
        .get(format!("{base}/api/pastes/{id}"))
        .header(&*TEST_NOW_HEADER_NAME, now)
        .send()
        .await
        .unwrap()
}
