//! API client for the marketspace REST backend.
//!
//! This module provides the `MarketClient` struct for making
//! authenticated requests: account and session endpoints, listing CRUD,
//! and photo upload.
//!
//! Every authenticated call goes through the 401 interception path: an
//! expired or invalid token triggers a single shared refresh round-trip
//! (coordinated by `SessionManager`), the original request is replayed
//! once with the new token, and anything unrecoverable signs the user
//! out while still surfacing the error to the caller.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::{CredentialStore, KeyringStore, SessionManager, TokenPair};
use crate::config::Config;
use crate::models::{NewUser, Product, ProductDraft, ProductFilter, ProductImage, User};

use super::error::RefreshError;
use super::transport::{ApiRequest, ApiResponse, FileUpload, ReqwestTransport, Transport};
use super::ApiError;

/// Refresh endpoint path; fixed backend contract.
const REFRESH_PATH: &str = "/sessions/refresh-token";

#[derive(Debug, Deserialize)]
struct SessionResponse {
    token: String,
    refresh_token: String,
    user: User,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    token: String,
    refresh_token: String,
}

/// API client for the marketspace backend.
/// Clone is cheap - the transport and session state are shared via Arc.
#[derive(Clone)]
pub struct MarketClient {
    config: Config,
    transport: Arc<dyn Transport>,
    session: Arc<SessionManager>,
}

impl MarketClient {
    /// Create a client with the production transport and keychain store.
    pub fn new(config: Config) -> Result<Self, ApiError> {
        let transport = Arc::new(ReqwestTransport::new(config.request_timeout)?);
        let store = Arc::new(KeyringStore::new());
        Ok(Self::with_parts(config, transport, store))
    }

    /// Create a client from explicit collaborators (frontends, tests).
    pub fn with_parts(
        config: Config,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            config,
            transport,
            session: Arc::new(SessionManager::new(store)),
        }
    }

    /// Shared session state, e.g. for installing a sign-out handler.
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    // ===== Account and session =====

    /// Register a new account. The avatar photo travels as multipart.
    pub async fn sign_up(&self, user: &NewUser, avatar: Option<FileUpload>) -> Result<(), ApiError> {
        let fields = vec![
            ("name".to_string(), user.name.clone()),
            ("email".to_string(), user.email.clone()),
            ("tel".to_string(), user.tel.clone()),
            ("password".to_string(), user.password.clone()),
        ];
        let files = match avatar {
            Some(avatar) => vec![("avatar".to_string(), avatar)],
            None => Vec::new(),
        };
        let request = ApiRequest::new(Method::POST, self.config.url("/users"))
            .with_multipart(fields, files);
        self.send_public(request).await?;
        Ok(())
    }

    /// Sign in and persist the issued token pair.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let request = ApiRequest::new(Method::POST, self.config.url("/sessions"))
            .with_json(serde_json::json!({ "email": email, "password": password }));
        let response = self.send_public(request).await?;
        let session: SessionResponse = response.json()?;

        self.session.install_tokens(&TokenPair {
            access_token: session.token,
            refresh_token: session.refresh_token,
        })?;
        debug!("signed in, session tokens installed");
        Ok(session.user)
    }

    /// Clear the session and notify the sign-out handler.
    pub fn sign_out(&self) {
        self.session.sign_out();
    }

    /// Fetch the authenticated user's profile.
    pub async fn fetch_profile(&self) -> Result<User, ApiError> {
        let request = ApiRequest::new(Method::GET, self.config.url("/users/me"));
        self.send(request).await?.json()
    }

    // ===== Listings =====

    /// Fetch active listings from other sellers, optionally filtered.
    pub async fn fetch_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, ApiError> {
        let request = ApiRequest::new(Method::GET, self.config.url("/products"))
            .with_query(filter.to_query());
        self.send(request).await?.json()
    }

    /// Fetch one listing with images, payment methods, and seller info.
    pub async fn fetch_product(&self, product_id: &str) -> Result<Product, ApiError> {
        let url = self.config.url(&format!("/products/{}", product_id));
        self.send(ApiRequest::new(Method::GET, url)).await?.json()
    }

    /// Fetch the authenticated user's own ads, active and inactive.
    pub async fn fetch_my_products(&self) -> Result<Vec<Product>, ApiError> {
        let request = ApiRequest::new(Method::GET, self.config.url("/users/products"));
        self.send(request).await?.json()
    }

    /// Create a new ad; returns the created listing with its id.
    pub async fn create_product(&self, draft: &ProductDraft) -> Result<Product, ApiError> {
        let request = ApiRequest::new(Method::POST, self.config.url("/products"))
            .with_json(serde_json::json!({
                "name": draft.name,
                "description": draft.description,
                "is_new": draft.is_new,
                "price": draft.price,
                "accept_trade": draft.accept_trade,
                "payment_methods": draft.payment_methods,
            }));
        self.send(request).await?.json()
    }

    /// Replace an ad's editable fields.
    pub async fn update_product(
        &self,
        product_id: &str,
        draft: &ProductDraft,
    ) -> Result<(), ApiError> {
        let url = self.config.url(&format!("/products/{}", product_id));
        let request = ApiRequest::new(Method::PUT, url).with_json(serde_json::json!({
            "name": draft.name,
            "description": draft.description,
            "is_new": draft.is_new,
            "price": draft.price,
            "accept_trade": draft.accept_trade,
            "payment_methods": draft.payment_methods,
        }));
        self.send(request).await?;
        Ok(())
    }

    /// Show or hide an ad without deleting it.
    pub async fn set_product_active(
        &self,
        product_id: &str,
        is_active: bool,
    ) -> Result<(), ApiError> {
        let url = self.config.url(&format!("/products/{}", product_id));
        let request = ApiRequest::new(Method::PATCH, url)
            .with_json(serde_json::json!({ "is_active": is_active }));
        self.send(request).await?;
        Ok(())
    }

    /// Delete an ad permanently.
    pub async fn delete_product(&self, product_id: &str) -> Result<(), ApiError> {
        let url = self.config.url(&format!("/products/{}", product_id));
        self.send(ApiRequest::new(Method::DELETE, url)).await?;
        Ok(())
    }

    /// Attach photos to a listing.
    pub async fn upload_product_images(
        &self,
        product_id: &str,
        images: Vec<FileUpload>,
    ) -> Result<Vec<ProductImage>, ApiError> {
        let fields = vec![("product_id".to_string(), product_id.to_string())];
        let files = images
            .into_iter()
            .map(|file| ("images".to_string(), file))
            .collect();
        let request = ApiRequest::new(Method::POST, self.config.url("/products/images"))
            .with_multipart(fields, files);
        self.send(request).await?.json()
    }

    /// Remove photos from a listing.
    pub async fn delete_product_images(&self, image_ids: &[String]) -> Result<(), ApiError> {
        let request = ApiRequest::new(Method::DELETE, self.config.url("/products/images"))
            .with_json(serde_json::json!({ "productImagesIds": image_ids }));
        self.send(request).await?;
        Ok(())
    }

    /// Absolute URL for a stored image path.
    pub fn image_url(&self, path: &str) -> String {
        self.config.url(&format!("/images/{}", path))
    }

    // ===== Request plumbing =====

    /// Check if response is successful, returning an error with the
    /// server-provided message if not.
    fn check(response: ApiResponse) -> Result<ApiResponse, ApiError> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_response(response.status, &response.body))
        }
    }

    /// Issue an unauthenticated request (sign-up, sign-in). A 401 here is
    /// a plain failure, never a trigger for refresh or sign-out.
    async fn send_public(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let response = self.transport.execute(request).await?;
        Self::check(response)
    }

    /// Issue an authenticated request, recovering from token expiry.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let token = self.session.access_token()?;
        let response = self
            .transport
            .execute(request.clone().with_bearer(token))
            .await?;
        if response.status == StatusCode::UNAUTHORIZED {
            return self.recover_unauthorized(request, response).await;
        }
        Self::check(response)
    }

    /// 401 interception: refresh the session and replay the request, or
    /// sign out when the session cannot be recovered.
    async fn recover_unauthorized(
        &self,
        request: ApiRequest,
        response: ApiResponse,
    ) -> Result<ApiResponse, ApiError> {
        let (reason, message) = match ApiError::from_response(response.status, &response.body) {
            ApiError::Unauthorized { reason, message } => (reason, message),
            other => return Err(other),
        };

        // No session on record: nothing to recover, nothing to sign out of.
        let pair = match self.session.token_pair()? {
            Some(pair) if !pair.access_token.is_empty() => pair,
            _ => {
                debug!("401 with no stored session, forwarding error");
                return Err(ApiError::Unauthorized { reason, message });
            }
        };

        // A 401 for any reason other than token expiry/invalidity is
        // terminal: the refresh endpoint cannot help.
        if !reason.is_refreshable() {
            warn!(reason = %message, "unrecoverable auth failure, signing out");
            self.session.sign_out();
            return Err(ApiError::Unauthorized { reason, message });
        }

        if pair.refresh_token.is_empty() {
            warn!("token expired but no refresh token on record, signing out");
            self.session.sign_out();
            return Err(ApiError::Unauthorized { reason, message });
        }

        match self.session.begin_refresh_or_wait() {
            crate::auth::RefreshTicket::Waiter(rx) => {
                let outcome = rx.await.unwrap_or(Err(RefreshError::Abandoned));
                let new_token = outcome.map_err(ApiError::RefreshFailed)?;
                debug!("shared refresh succeeded, replaying request");
                let response = self
                    .transport
                    .execute(request.with_bearer(Some(new_token)))
                    .await?;
                Self::check(response)
            }
            crate::auth::RefreshTicket::Leader(guard) => {
                match self.run_refresh(&pair.refresh_token).await {
                    Ok(new_pair) => {
                        if let Err(err) = self.session.install_tokens(&new_pair) {
                            // A token we cannot persist would be lost on the
                            // next cold start; fail the episode instead.
                            let failure = RefreshError::Transport(format!(
                                "failed to persist refreshed tokens: {err}"
                            ));
                            guard.finish(Err(failure));
                            self.session.sign_out();
                            return Err(ApiError::Storage(err));
                        }
                        guard.finish(Ok(new_pair.access_token.clone()));
                        debug!("token refresh succeeded, replaying request");
                        let response = self
                            .transport
                            .execute(request.with_bearer(Some(new_pair.access_token)))
                            .await?;
                        Self::check(response)
                    }
                    Err(failure) => {
                        guard.finish(Err(failure.clone()));
                        warn!(error = %failure, "token refresh failed, signing out");
                        self.session.sign_out();
                        Err(ApiError::RefreshFailed(failure))
                    }
                }
            }
        }
    }

    /// The single refresh round-trip, bounded by the configured timeout.
    async fn run_refresh(&self, refresh_token: &str) -> Result<TokenPair, RefreshError> {
        debug!("refreshing session token");
        let request = ApiRequest::new(Method::POST, self.config.url(REFRESH_PATH))
            .with_json(serde_json::json!({ "refresh_token": refresh_token }));

        let call = self.transport.execute(request);
        let response = match tokio::time::timeout(self.config.refresh_timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return Err(RefreshError::Transport(err.to_string())),
            Err(_) => return Err(RefreshError::TimedOut(self.config.refresh_timeout)),
        };

        if !response.is_success() {
            let message = ApiError::extract_message(&response.body)
                .unwrap_or_else(|| response.status.to_string());
            return Err(RefreshError::Upstream {
                status: response.status.as_u16(),
                message,
            });
        }

        let parsed: RefreshResponse = response
            .json()
            .map_err(|err| RefreshError::Transport(err.to_string()))?;
        Ok(TokenPair {
            access_token: parsed.token,
            refresh_token: parsed.refresh_token,
        })
    }
}
