//! REST API client module for the marketspace backend.
//!
//! This module provides the `MarketClient` for account, session, and
//! listing endpoints, the `ApiError` taxonomy, and the `Transport`
//! abstraction the client runs on.
//!
//! The API uses JWT bearer token authentication; expired tokens are
//! refreshed transparently through `POST /sessions/refresh-token`, with
//! concurrent failures sharing a single refresh round-trip.

pub mod client;
pub mod error;
pub mod transport;

pub use client::MarketClient;
pub use error::{ApiError, AuthReason, RefreshError};
pub use transport::{ApiRequest, ApiResponse, FileUpload, ReqwestTransport, Transport};
