//! Transport abstraction under the API client.
//!
//! `MarketClient` builds `ApiRequest` values and hands them to a
//! `Transport`; the default implementation drives `reqwest`. Keeping the
//! wire layer behind a trait lets the 401-interception logic be tested
//! against a scripted transport without a live backend.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;

use super::ApiError;

/// A file payload for multipart endpoints (avatar, product photos).
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart {
        fields: Vec<(String, String)>,
        files: Vec<(String, FileUpload)>,
    },
}

/// One outbound call, transport-agnostic. Cloneable so the original
/// request can be replayed after a token refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(&'static str, String)>,
    pub body: RequestBody,
    pub bearer: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, url: String) -> Self {
        Self {
            method,
            url,
            query: Vec::new(),
            body: RequestBody::Empty,
            bearer: None,
        }
    }

    pub fn with_query(mut self, query: Vec<(&'static str, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_json(mut self, value: serde_json::Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    pub fn with_multipart(
        mut self,
        fields: Vec<(String, String)>,
        files: Vec<(String, FileUpload)>,
    ) -> Self {
        self.body = RequestBody::Multipart { fields, files };
        self
    }

    pub fn with_bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }
}

/// Raw response surface: status plus body text. The client layer owns
/// JSON decoding and error mapping.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body)
            .map_err(|err| ApiError::InvalidResponse(format!("{} (body: {})", err, self.body)))
    }
}

pub trait Transport: Send + Sync {
    fn execute(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse, ApiError>>;
}

/// Production transport backed by a pooled `reqwest::Client`.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse, ApiError>> {
        Box::pin(async move {
            let ApiRequest {
                method,
                url,
                query,
                body,
                bearer,
            } = request;

            let mut builder = self.client.request(method, &url);
            if !query.is_empty() {
                builder = builder.query(&query);
            }
            if let Some(token) = bearer {
                builder = builder.bearer_auth(token);
            }
            builder = match body {
                RequestBody::Empty => builder,
                RequestBody::Json(value) => builder.json(&value),
                RequestBody::Multipart { fields, files } => {
                    let mut form = reqwest::multipart::Form::new();
                    for (name, value) in fields {
                        form = form.text(name, value);
                    }
                    for (name, file) in files {
                        let part = reqwest::multipart::Part::bytes(file.bytes)
                            .file_name(file.file_name)
                            .mime_str(&file.mime_type)?;
                        form = form.part(name, part);
                    }
                    builder.multipart(form)
                }
            };

            let response = builder.send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok(ApiResponse { status, body })
        })
    }
}
