use std::path::PathBuf;

use anyhow::Context;
use tinypaste_common::Url;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DB_PATH: &str = "database";

/// Credential pairs for a Redis-compatible REST service, in priority order.
const KV_CREDENTIALS: [(&str, &str); 2] = [
    ("KV_REST_API_URL", "KV_REST_API_TOKEN"),
    ("UPSTASH_REDIS_REST_URL", "UPSTASH_REDIS_REST_TOKEN"),
];

/// Where pastes live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Storage {
    /// Nothing is stored; every id encodes its paste.
    Stateless,
    Memory,
    Kv { url: Url, token: String },
    Rocks { path: PathBuf },
}

impl Storage {
    pub const fn describe(&self) -> &'static str {
        match self {
            Self::Stateless => "stateless identifiers",
            Self::Memory => "in-process memory",
            Self::Kv { .. } => "kv rest service",
            Self::Rocks { .. } => "rocksdb",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    /// Base for generated paste links. Derived from request headers if unset.
    pub public_url: Option<Url>,
    /// Directory served for paths no route matches.
    pub static_dir: Option<PathBuf>,
    /// Honor the `x-test-now-ms` header.
    pub test_mode: bool,
    pub storage: Storage,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            public_url: None,
            static_dir: None,
            test_mode: false,
            storage: Storage::Stateless,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// - `TINYPASTE_BIND_ADDR`: bind address (default `0.0.0.0:8080`)
    /// - `TINYPASTE_PUBLIC_URL`: base URL for generated links
    /// - `TINYPASTE_STATIC_DIR`: fallback static directory
    /// - `TEST_MODE=1`: enable the simulated clock header
    /// - `KV_REST_API_URL` + `KV_REST_API_TOKEN`, or `UPSTASH_REDIS_REST_URL`
    ///   + `UPSTASH_REDIS_REST_TOKEN`: use the KV backend
    /// - otherwise `TINYPASTE_STORAGE` = `stateless` (default) | `memory` |
    ///   `rocksdb`, with `TINYPASTE_DB_PATH` for the latter
    ///
    /// # Errors
    ///
    /// Fails on malformed URLs or an unknown storage name.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let bind_addr = var("TINYPASTE_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let public_url = var("TINYPASTE_PUBLIC_URL")
            .map(|raw| Url::parse(&raw).context("TINYPASTE_PUBLIC_URL is not a valid URL"))
            .transpose()?;

        let static_dir = var("TINYPASTE_STATIC_DIR").map(PathBuf::from);
        let test_mode = var("TEST_MODE").as_deref() == Some("1");

        let kv = KV_CREDENTIALS
            .iter()
            .find_map(|(url, token)| Some((*url, var(*url)?, var(*token)?)));

        let storage = if let Some((name, url, token)) = kv {
            let url = Url::parse(&url).with_context(|| format!("{name} is not a valid URL"))?;
            Storage::Kv { url, token }
        } else {
            match var("TINYPASTE_STORAGE").as_deref() {
                None | Some("stateless") => Storage::Stateless,
                Some("memory") => Storage::Memory,
                Some("rocksdb") => Storage::Rocks {
                    path: var("TINYPASTE_DB_PATH")
                        .map_or_else(|| PathBuf::from(DEFAULT_DB_PATH), PathBuf::from),
                },
                Some(other) => anyhow::bail!("unknown TINYPASTE_STORAGE {other:?}"),
            }
        };

        Ok(Self {
            bind_addr,
            public_url,
            static_dir,
            test_mode,
            storage,
        })
    }
}
