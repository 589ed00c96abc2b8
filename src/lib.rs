//! Session-aware Tiny Tiny RSS client core.
//!
//! - [`cache`] - bounded FIFO response cache
//! - [`api`] - remote transport, session guard and the caching [`api::ApiClient`]
//! - [`config`] - `config.toml` loading and credential resolution
//! - [`util`] - API URL validation and terminal text helpers

pub mod api;
pub mod cache;
pub mod config;
pub mod util;
