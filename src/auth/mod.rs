//! Authentication module for managing the user session and credentials.
//!
//! This module provides:
//! - `SessionManager`: shared session state with single-flight token refresh
//! - `CredentialStore`: where the access/refresh token pair is persisted,
//!   with keyring-backed and in-memory implementations
//!
//! The refresh round-trip itself is performed by the API client; this
//! module only coordinates who performs it and who waits.

pub mod credentials;
pub mod session;

pub use credentials::{CredentialStore, KeyringStore, MemoryStore, StoreError, TokenPair};
pub use session::{RefreshGuard, RefreshTicket, SessionManager, SignOutRegistration};
