//! Remote API collaborator: JSON over HTTP.
//!
//! [`RemoteApi`] is the seam the rest of the client talks to. [`HttpApi`] is
//! the reqwest implementation; tests swap in a scripted one.

use async_trait::async_trait;
use lineup_cache::Identity;
use lineup_core::{ApiError, ApiResult};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::ClientResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// One request/response exchange with the team API.
///
/// `path` is relative to the API base URL and starts with `/`. An empty
/// success body comes back as [`Value::Null`].
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn request(&self, method: HttpMethod, path: &str, body: Option<Value>) -> ApiResult<Value>;
}

// ============================================================================
// TYPED HELPERS
// ============================================================================

pub async fn get_json<T: DeserializeOwned>(api: &dyn RemoteApi, path: &str) -> ApiResult<T> {
    let value = api.request(HttpMethod::Get, path, None).await?;
    Ok(serde_json::from_value(value)?)
}

pub async fn post_json<T, B>(api: &dyn RemoteApi, path: &str, body: &B) -> ApiResult<T>
where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
{
    send_json(api, HttpMethod::Post, path, body).await
}

pub async fn put_json<T, B>(api: &dyn RemoteApi, path: &str, body: &B) -> ApiResult<T>
where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
{
    send_json(api, HttpMethod::Put, path, body).await
}

pub async fn patch_json<T, B>(api: &dyn RemoteApi, path: &str, body: &B) -> ApiResult<T>
where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
{
    send_json(api, HttpMethod::Patch, path, body).await
}

pub async fn delete(api: &dyn RemoteApi, path: &str) -> ApiResult<()> {
    api.request(HttpMethod::Delete, path, None).await.map(|_| ())
}

async fn send_json<T, B>(api: &dyn RemoteApi, method: HttpMethod, path: &str, body: &B) -> ApiResult<T>
where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
{
    let body = serde_json::to_value(body)?;
    let value = api.request(method, path, Some(body)).await?;
    Ok(serde_json::from_value(value)?)
}

// ============================================================================
// HTTP IMPLEMENTATION
// ============================================================================

/// reqwest-backed [`RemoteApi`].
///
/// The bearer token is read from the identity collaborator on every request,
/// so a login or logout takes effect on the next call.
#[derive(Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    identity: Arc<dyn Identity>,
}

impl HttpApi {
    pub fn new(config: &ClientConfig, identity: Arc<dyn Identity>) -> ClientResult<Self> {
        let timeout = config.request_timeout();
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            timeout,
            identity,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout {
                after: self.timeout,
            }
        } else {
            ApiError::transport(err.to_string())
        }
    }

    async fn parse_response(&self, response: reqwest::Response) -> ApiResult<Value> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(ApiError::status(status.as_u16(), text));
        }
        if status == reqwest::StatusCode::NO_CONTENT || text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl RemoteApi for HttpApi {
    async fn request(&self, method: HttpMethod, path: &str, body: Option<Value>) -> ApiResult<Value> {
        let mut request = self.client.request(method.into(), self.url(path));
        if let Some(credential) = self.identity.credential() {
            request = request.bearer_auth(credential.expose());
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        tracing::debug!(method = %method, path, "Sending request");
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let result = self.parse_response(response).await;
        if let Err(err) = &result {
            tracing::debug!(method = %method, path, error = %err, "Request failed");
        }
        result
    }
}
