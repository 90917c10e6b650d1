//! Core library for the marketspace client.
//!
//! This crate contains everything the platform frontends share:
//!
//! - `api`: the `MarketClient` REST client and error taxonomy
//! - `auth`: session management with single-flight token refresh,
//!   plus secure credential storage
//! - `models`: product, user, and payment data structures
//! - `config`: client configuration (base URL, timeouts)
//!
//! The library performs no UI work and installs no tracing subscriber;
//! both belong to the embedding application.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod utils;

pub use api::{ApiError, MarketClient};
pub use auth::{SessionManager, TokenPair};
pub use config::Config;
