//! Redis-compatible key-value service spoken over its REST protocol, as
//! offered by Vercel KV and Upstash.
//!
//! Commands are JSON arrays POSTed to the base URL (or to `/pipeline` as an
//! array of arrays) with a bearer token. Replies are `{"result": ...}` or
//! `{"error": "..."}`.
//!
//! Each paste occupies two keys: `paste:{id}` holds the immutable record and
//! `paste:{id}:views` the counter. Views are accounted increment-then-compare:
//! `INCR` is atomic on the service, so every reader gets a distinct count and
//! at most `max_views` of them can land within the quota. A counter that has
//! vanished while its record remains is treated as exhausted.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tinypaste_common::Url;
use tracing::{instrument, warn};

use super::PasteStore;
use crate::error::StoreError;
use crate::lifecycle::Lookup;
use crate::paste::Paste;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const HEALTH_KEY: &str = "tinypaste:healthcheck";

/// `INCR` that refuses to recreate a counter the service has dropped. A
/// recreated counter would restart the quota and never expire.
const INCR_EXISTING: &str =
    "if redis.call('EXISTS', KEYS[1]) == 0 then return nil end return redis.call('INCR', KEYS[1])";

/// What lives under `paste:{id}`. The view counter is kept separately.
#[derive(Serialize, Deserialize)]
struct Record {
    id: String,
    content: String,
    created_at: i64,
    expires_at: Option<i64>,
    max_views: Option<u64>,
}

impl From<&Paste> for Record {
    fn from(paste: &Paste) -> Self {
        Self {
            id: paste.id.clone(),
            content: paste.content.clone(),
            created_at: paste.created_at,
            expires_at: paste.expires_at,
            max_views: paste.max_views,
        }
    }
}

impl Record {
    fn into_paste(self, views: u64) -> Paste {
        Paste {
            id: self.id,
            content: self.content,
            created_at: self.created_at,
            expires_at: self.expires_at,
            max_views: self.max_views,
            views,
        }
    }
}

#[derive(Deserialize)]
struct Reply {
    #[serde(default)]
    result: Value,
    error: Option<String>,
}

impl Reply {
    fn into_result(self) -> Result<Value, StoreError> {
        match self.error {
            Some(error) => Err(StoreError::Service(error)),
            None => Ok(self.result),
        }
    }
}

/// Error statuses usually still carry an `{"error"}` body; anything else is
/// reported by status alone.
async fn read_reply<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, StoreError> {
    let status = response.status();
    response.json().await.map_err(|e| {
        if status.is_success() {
            StoreError::Request(e)
        } else {
            StoreError::Service(format!("HTTP {status}"))
        }
    })
}

fn meta_key(id: &str) -> String {
    format!("paste:{id}")
}

fn views_key(id: &str) -> String {
    format!("paste:{id}:views")
}

pub struct KvStore {
    client: Client,
    base_url: String,
    token: String,
}

impl KvStore {
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(url: Url, token: String) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: url.as_str().trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn post(&self, url: String, body: &Value) -> Result<reqwest::Response, StoreError> {
        Ok(self
            .client
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .json(body)
            .send()
            .await?)
    }

    async fn command(&self, args: Value) -> Result<Value, StoreError> {
        let response = self.post(self.base_url.clone(), &args).await?;
        read_reply::<Reply>(response).await?.into_result()
    }

    /// Sends several commands in one round trip. Fails if any of them failed.
    async fn pipeline(&self, commands: Vec<Value>) -> Result<Vec<Value>, StoreError> {
        let response = self
            .post(format!("{}/pipeline", self.base_url), &Value::Array(commands))
            .await?;
        read_reply::<Vec<Reply>>(response)
            .await?
            .into_iter()
            .map(Reply::into_result)
            .collect()
    }

    async fn probe(&self) -> Result<bool, StoreError> {
        let nonce = tinypaste_common::time::now_millis().to_string();
        let replies = self
            .pipeline(vec![
                json!(["SET", HEALTH_KEY, nonce, "EX", "10"]),
                json!(["GET", HEALTH_KEY]),
            ])
            .await?;
        Ok(replies.get(1).and_then(Value::as_str) == Some(nonce.as_str()))
    }
}

#[async_trait]
impl PasteStore for KvStore {
    fn name(&self) -> &'static str {
        "kv"
    }

    #[instrument(skip_all, fields(id = %paste.id), err)]
    async fn insert_paste(&self, paste: Paste) -> Result<(), StoreError> {
        let record = serde_json::to_string(&Record::from(&paste))?;
        let mut set_record = vec![json!("SET"), json!(meta_key(&paste.id)), json!(record)];
        let mut set_views = vec![json!("SET"), json!(views_key(&paste.id)), json!("0")];
        if let Some(ttl) = paste.ttl() {
            for command in [&mut set_record, &mut set_views] {
                command.push(json!("EX"));
                command.push(json!(ttl.as_secs().to_string()));
            }
        }

        self.pipeline(vec![Value::Array(set_record), Value::Array(set_views)])
            .await?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_paste(&self, id: &str, now: i64) -> Result<Lookup, StoreError> {
        let record: Record = match self.command(json!(["GET", meta_key(id)])).await? {
            Value::Null => return Ok(Lookup::Missing),
            Value::String(raw) => serde_json::from_str(&raw)?,
            other => return Err(StoreError::UnexpectedReply(other.to_string())),
        };

        if record.expires_at.is_some_and(|expires_at| now >= expires_at) {
            return Ok(Lookup::Withheld);
        }

        let views = match self
            .command(json!(["EVAL", INCR_EXISTING, "1", views_key(id)]))
            .await?
        {
            Value::Null => return Ok(Lookup::Withheld),
            Value::Number(n) => n
                .as_u64()
                .ok_or_else(|| StoreError::UnexpectedReply(n.to_string()))?,
            other => return Err(StoreError::UnexpectedReply(other.to_string())),
        };

        // The counter only grows, so a read that lands past the quota is
        // refused and every later one will be too.
        if record.max_views.is_some_and(|max| views > max) {
            return Ok(Lookup::Withheld);
        }

        Ok(Lookup::Granted(record.into_paste(views)))
    }

    async fn check_health(&self) -> bool {
        match self.probe().await {
            Ok(healthy) => healthy,
            Err(e) => {
                warn!("kv health check failed: {}", e);
                false
            }
        }
    }
}
