//! HTTP client for the application's REST API.
//!
//! Every endpoint answers with an envelope, `{ "success": true, "data": ... }`
//! or `{ "success": false, "error": "..." }`. [`ApiResponse`] keeps the status
//! and raw body so tests can assert on either; the typed helpers
//! (`create_post`, `get_post`, ...) unwrap the envelope and turn failures
//! into [`SiteError::Api`].

mod data;
mod types;
pub mod validate;

pub use data::{TestDataCleanup, TestDataFactory, TEST_MARKER};
pub use types::{
    BlogPost, HealthStatus, LoginData, NewPost, NewUser, PostPage, PostPatch, PostQuery,
    PostStatus, SeoMeta, User, UserRole,
};

use crate::config::{Credentials, TestConfig};
use crate::logging::RunLog;
use crate::result::{SiteError, SiteResult};
use crate::timeouts::TimeoutTier;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// User-Agent sent with every request
pub const USER_AGENT: &str = "sitecheck-test-runner";

/// Status code and decoded body of one API call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status
    pub status: u16,
    /// Body; `Null` when empty or not JSON
    pub body: Value,
}

impl ApiResponse {
    /// 2xx status and `success` not explicitly false
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
            && self.body.get("success").and_then(Value::as_bool) != Some(false)
    }

    /// The envelope's `data` member
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.body.get("data")
    }

    /// The envelope's `error` (or `message`) member
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.body
            .get("error")
            .or_else(|| self.body.get("message"))
            .and_then(Value::as_str)
    }

    /// Fail unless [`Self::is_success`]
    pub fn ensure_success(self) -> SiteResult<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let message = self
            .error_message()
            .map_or_else(|| format!("request failed with status {}", self.status), ToString::to_string);
        Err(SiteError::Api {
            status: self.status,
            message,
        })
    }

    /// Deserialize `data.{key}`, or `data` itself when `key` is empty
    pub fn data_as<T: DeserializeOwned>(&self, key: &str) -> SiteResult<T> {
        let data = self.data().ok_or_else(|| SiteError::Api {
            status: self.status,
            message: "response has no data".to_string(),
        })?;
        let value = if key.is_empty() {
            data
        } else {
            data.get(key).ok_or_else(|| SiteError::Api {
                status: self.status,
                message: format!("response data has no '{key}'"),
            })?
        };
        Ok(serde_json::from_value(value.clone())?)
    }
}

/// REST API client holding an optional bearer token
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    health_url: String,
    client: reqwest::Client,
    token: Arc<Mutex<Option<String>>>,
    production: bool,
    log: RunLog,
}

impl ApiClient {
    /// Client for the configured API
    pub fn new(config: &TestConfig, log: &RunLog) -> SiteResult<Self> {
        Self::with_timeout(config, log, TimeoutTier::ApiRequest.duration())
    }

    /// Client with a custom request timeout
    pub fn with_timeout(config: &TestConfig, log: &RunLog, timeout: Duration) -> SiteResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            base_url: config.api_url.as_str().trim_end_matches('/').to_string(),
            health_url: config.health_url(),
            client,
            token: Arc::new(Mutex::new(None)),
            production: config.is_production(),
            log: log.scoped("api"),
        })
    }

    /// Same connection pool, separate (empty) token
    #[must_use]
    pub fn detached(&self) -> Self {
        Self {
            token: Arc::new(Mutex::new(None)),
            ..self.clone()
        }
    }

    /// Whether the configured target is production
    #[must_use]
    pub const fn is_production(&self) -> bool {
        self.production
    }

    /// Refuse `operation` when the client points at production
    pub fn assert_not_production(&self, operation: &str) -> SiteResult<()> {
        if self.production {
            self.log
                .error(format!("Refusing '{operation}' against production"));
            return Err(SiteError::ProductionGuard {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    /// API base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether a bearer token is held
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn set_token(&self, token: Option<String>) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        let builder = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        let token = self
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> SiteResult<ApiResponse> {
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        self.log.debug(format!("API {status}"));
        Ok(ApiResponse { status, body })
    }

    /// Raw request with an optional JSON body
    pub async fn call<B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> SiteResult<ApiResponse> {
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        self.send(builder).await
    }

    async fn get(&self, path: &str) -> SiteResult<ApiResponse> {
        self.send(self.request(Method::GET, path)).await
    }

    async fn post_json<B: Serialize + Sync>(&self, path: &str, body: &B) -> SiteResult<ApiResponse> {
        self.call(Method::POST, path, Some(body)).await
    }

    async fn bare(&self, method: Method, path: &str) -> SiteResult<ApiResponse> {
        self.send(self.request(method, path)).await
    }

    // Authentication

    /// `POST /auth/login`; stores the token on success
    pub async fn login(&self, credentials: &Credentials) -> SiteResult<LoginData> {
        let body = serde_json::json!({
            "email": credentials.email,
            "password": credentials.password,
        });
        let response = self.post_json("/auth/login", &body).await?.ensure_success()?;
        let data: LoginData = response.data_as("")?;
        self.set_token(Some(data.token.clone()));
        self.log.info(format!("API login succeeded for {}", credentials.email));
        Ok(data)
    }

    /// `POST /auth/logout`; clears the token on success
    pub async fn logout(&self) -> SiteResult<()> {
        self.bare(Method::POST, "/auth/logout")
            .await?
            .ensure_success()?;
        self.set_token(None);
        Ok(())
    }

    /// `GET /auth/profile`
    pub async fn profile(&self) -> SiteResult<User> {
        self.get("/auth/profile").await?.ensure_success()?.data_as("user")
    }

    // Health

    /// Backend health check: status `OK` with a timestamp
    pub async fn health(&self) -> SiteResult<HealthStatus> {
        let response = self
            .send(self.client.get(&self.health_url))
            .await?
            .ensure_success()?;
        Ok(serde_json::from_value(response.body)?)
    }

    /// Whether [`Self::health`] reports a healthy backend; errors count as unhealthy
    pub async fn is_healthy(&self) -> bool {
        match self.health().await {
            Ok(status) => status.is_healthy(),
            Err(e) => {
                self.log.error(format!("Health check failed: {e}"));
                false
            }
        }
    }

    // Posts

    /// `GET /blog?...`
    pub async fn list_posts(&self, query: &PostQuery) -> SiteResult<PostPage> {
        let builder = self.request(Method::GET, "/blog").query(&query.pairs());
        self.send(builder).await?.ensure_success()?.data_as("")
    }

    /// Published posts matching `term`
    pub async fn search_posts(&self, term: &str, limit: Option<u32>) -> SiteResult<PostPage> {
        let query = PostQuery {
            limit,
            ..PostQuery::search(term)
        };
        self.list_posts(&query).await
    }

    /// `GET /blog/{id}`
    pub async fn get_post(&self, id: &str) -> SiteResult<BlogPost> {
        self.get(&format!("/blog/{id}"))
            .await?
            .ensure_success()?
            .data_as("post")
    }

    /// `POST /blog`
    pub async fn create_post(&self, post: &NewPost) -> SiteResult<BlogPost> {
        self.post_json("/blog", post)
            .await?
            .ensure_success()?
            .data_as("post")
    }

    /// `PUT /blog/{id}`
    pub async fn update_post(&self, id: &str, patch: &PostPatch) -> SiteResult<BlogPost> {
        self.call(Method::PUT, &format!("/blog/{id}"), Some(patch))
            .await?
            .ensure_success()?
            .data_as("post")
    }

    /// `DELETE /blog/{id}`
    pub async fn delete_post(&self, id: &str) -> SiteResult<()> {
        self.bare(Method::DELETE, &format!("/blog/{id}"))
            .await?
            .ensure_success()
            .map(|_| ())
    }

    /// `POST /blog/{id}/pin`
    pub async fn pin_post(&self, id: &str) -> SiteResult<()> {
        self.bare(Method::POST, &format!("/blog/{id}/pin"))
            .await?
            .ensure_success()
            .map(|_| ())
    }

    /// `DELETE /blog/{id}/pin`
    pub async fn unpin_post(&self, id: &str) -> SiteResult<()> {
        self.bare(Method::DELETE, &format!("/blog/{id}/pin"))
            .await?
            .ensure_success()
            .map(|_| ())
    }

    /// `POST /blog/{id}/like`
    pub async fn like_post(&self, id: &str) -> SiteResult<()> {
        self.bare(Method::POST, &format!("/blog/{id}/like"))
            .await?
            .ensure_success()
            .map(|_| ())
    }

    // Admin

    /// `GET /admin/stats`
    pub async fn admin_stats(&self) -> SiteResult<Value> {
        self.get("/admin/stats").await?.ensure_success()?.data_as("")
    }

    /// `POST /admin/users`
    pub async fn create_user(&self, user: &NewUser) -> SiteResult<User> {
        self.post_json("/admin/users", user)
            .await?
            .ensure_success()?
            .data_as("user")
    }
}
