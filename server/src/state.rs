use std::sync::Arc;

use axum::http::header::HOST;
use axum::http::HeaderMap;
use tinypaste_common::{time, TestNow, PASTE_PAGE_ENDPOINT};

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::store::PasteStore;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, store: Option<Arc<dyn PasteStore>>) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(store)),
            config: Arc::new(config),
        }
    }

    /// The request's notion of "now": the test header when test mode is on
    /// and the header parses, otherwise the wall clock.
    pub fn now(&self, test_now: Option<TestNow>) -> i64 {
        match test_now {
            Some(TestNow(millis)) if self.config.test_mode => millis,
            _ => time::now_millis(),
        }
    }

    /// Public link to a paste's HTML page.
    pub fn paste_url(&self, headers: &HeaderMap, id: &str) -> String {
        let base = self.config.public_url.as_ref().map_or_else(
            || {
                let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
                let proto = header("x-forwarded-proto").unwrap_or("http");
                let host = header("x-forwarded-host")
                    .or_else(|| header(HOST.as_str()))
                    .unwrap_or(&self.config.bind_addr);
                format!("{proto}://{host}")
            },
            |url| url.as_str().trim_end_matches('/').to_string(),
        );
        format!("{base}{PASTE_PAGE_ENDPOINT}/{id}")
    }
}
