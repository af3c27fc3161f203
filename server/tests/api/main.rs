//! HTTP API integration tests.
//!
//! Each test starts the router on an ephemeral port and drives it with reqwest.

mod http;
mod kv;
mod support;
