#![warn(clippy::nursery, clippy::pedantic)]

//! Paste sharing server: pastes are stored in a configurable backend, or
//! encoded entirely in their identifier when no backend is configured.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod paste;
pub mod render;
pub mod routes;
pub mod short_code;
pub mod state;
pub mod store;

pub use config::{Config, Storage};
pub use routes::router;
pub use state::AppState;
