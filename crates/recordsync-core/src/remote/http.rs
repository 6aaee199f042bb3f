//! Salesforce-style REST remote store.
//!
//! - `GET  {base}/services/data/{version}/sobjects/{object}/{id}?fields=...`
//! - `POST {base}/services/data/{version}/sobjects/{object}` returns `{id, success}`
//! - `PATCH {base}/services/data/{version}/sobjects/{object}/{id}` returns 204
//! - `GET  {base}/services/data/{version}/query?q=SOQL` for recency scans
//!
//! Creates and updates re-read the record so callers get the stored
//! modification stamp.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recordsync_types::{parse_timestamp, Attributes, ConfigError, RemoteCallError};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::soql::{recency_query, select_list};
use crate::modules::config::RemoteConfig;
use crate::modules::repository::{RemoteRecord, RemoteResult, RemoteStore, ScanCursor};
use crate::utils::http::redact_url;

const MAX_ERROR_BODY: usize = 500;

/// Backoff for transient failures of idempotent calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 3, base_delay_ms: 500, max_delay_ms: 30_000 }
    }
}

impl RetryConfig {
    pub fn none() -> Self {
        Self { max_retries: 0, ..Self::default() }
    }
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: String,
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    errors: Vec<Value>,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    records: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "errorCode", default)]
    error_code: String,
    #[serde(default)]
    message: String,
}

/// One remote object type behind the REST API.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: Client,
    base_url: Url,
    api_version: String,
    access_token: Option<String>,
    object: String,
    modstamp_field: String,
    retry: RetryConfig,
}

impl HttpRemoteStore {
    pub fn new(
        client: Client,
        remote: &RemoteConfig,
        object: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&remote.base_url)
            .map_err(|e| ConfigError::invalid("remote.base_url", e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::invalid("remote.base_url", "not an http(s) base URL"));
        }
        Ok(Self {
            client,
            base_url,
            api_version: remote.api_version.clone(),
            access_token: remote.access_token.clone(),
            object: object.into(),
            modstamp_field: remote.modstamp_field.clone(),
            retry: RetryConfig {
                max_retries: remote.max_retries,
                base_delay_ms: remote.retry_base_delay_ms,
                ..RetryConfig::default()
            },
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["services", "data", self.api_version.as_str()]);
            path.extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url).header("Accept", "application/json");
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send, retrying transient failures when `idempotent`.
    async fn send<F>(&self, build: F, id: &str, idempotent: bool) -> RemoteResult<Response>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut attempts = 0;
        let mut delay = self.retry.base_delay_ms;

        loop {
            let result = match build().send().await {
                Ok(resp) => check_status(resp, id).await,
                Err(e) => Err(map_reqwest_error(&e)),
            };

            match result {
                Err(err) if idempotent && err.is_transient() && attempts < self.retry.max_retries => {
                    attempts += 1;
                    let wait = match &err {
                        RemoteCallError::RateLimited { retry_after_secs: Some(secs) } => {
                            Duration::from_secs(*secs)
                        },
                        _ => Duration::from_millis(delay),
                    };
                    warn!(object = %self.object, error = %err, attempt = attempts, "retrying remote call");
                    tokio::time::sleep(wait).await;
                    delay = delay.saturating_mul(2).min(self.retry.max_delay_ms);
                },
                other => return other,
            }
        }
    }

    async fn fetch(&self, id: &str, fields: &[String]) -> RemoteResult<Option<RemoteRecord>> {
        let url = self.endpoint(&["sobjects", &self.object, id]);
        let select = select_list(&self.modstamp_field, fields).join(",");
        debug!(url = %redact_url(url.as_str()), "fetching remote record");

        let resp = self
            .send(|| self.request(Method::GET, url.clone()).query(&[("fields", &select)]), id, true)
            .await;
        let resp = match resp {
            Ok(resp) => resp,
            Err(RemoteCallError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let body: Value = resp.json().await.map_err(|e| map_reqwest_error(&e))?;
        self.decode_record(&body, fields).map(Some)
    }

    async fn refetch(&self, id: &str, fields: &[String]) -> RemoteResult<RemoteRecord> {
        self.fetch(id, fields).await?.ok_or_else(|| RemoteCallError::NotFound { id: id.to_string() })
    }

    fn decode_record(&self, body: &Value, fields: &[String]) -> RemoteResult<RemoteRecord> {
        let object = body.as_object().ok_or_else(|| invalid("expected a JSON object"))?;
        let id = object
            .get("Id")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("record has no Id"))?;
        let stamp = object
            .get(&self.modstamp_field)
            .and_then(Value::as_str)
            .ok_or_else(|| invalid(format!("record {id} has no {}", self.modstamp_field)))?;
        let last_modified = parse_timestamp(stamp)
            .ok_or_else(|| invalid(format!("record {id} has a malformed {}: {stamp}", self.modstamp_field)))?;

        let fields = fields
            .iter()
            .filter_map(|name| object.get(name).map(|value| (name.clone(), value.clone())))
            .collect();

        Ok(RemoteRecord { id: id.to_string(), fields, last_modified })
    }
}

fn invalid(message: impl Into<String>) -> RemoteCallError {
    RemoteCallError::InvalidResponse { message: message.into() }
}

fn map_reqwest_error(e: &reqwest::Error) -> RemoteCallError {
    if e.is_decode() {
        invalid(e.to_string())
    } else {
        RemoteCallError::Network { message: e.to_string() }
    }
}

async fn check_status(resp: Response, id: &str) -> RemoteResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok());
        return Err(RemoteCallError::RateLimited { retry_after_secs });
    }

    let message = error_message(&resp.text().await.unwrap_or_default());
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RemoteCallError::Authentication { message }
        },
        StatusCode::NOT_FOUND => RemoteCallError::NotFound { id: id.to_string() },
        _ => RemoteCallError::Status { status: status.as_u16(), message },
    })
}

/// Collapse the API's `[{errorCode, message}]` body into one line.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<Vec<ApiError>>(body) {
        Ok(errors) if !errors.is_empty() => errors
            .iter()
            .map(|e| format!("{}: {}", e.error_code, e.message))
            .collect::<Vec<_>>()
            .join("; "),
        _ => body.chars().take(MAX_ERROR_BODY).collect(),
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn find(&self, id: &str, fields: &[String]) -> RemoteResult<Option<RemoteRecord>> {
        self.fetch(id, fields).await
    }

    async fn create(&self, fields: &Attributes) -> RemoteResult<RemoteRecord> {
        let url = self.endpoint(&["sobjects", &self.object]);
        debug!(url = %redact_url(url.as_str()), "creating remote record");

        let resp = self
            .send(|| self.request(Method::POST, url.clone()).json(fields), &self.object, false)
            .await?;
        let created: CreateResponse = resp.json().await.map_err(|e| map_reqwest_error(&e))?;
        if !created.success {
            return Err(RemoteCallError::Status {
                status: 400,
                message: Value::Array(created.errors).to_string(),
            });
        }

        let written: Vec<String> = fields.keys().cloned().collect();
        self.refetch(&created.id, &written).await
    }

    async fn update(&self, id: &str, fields: &Attributes) -> RemoteResult<RemoteRecord> {
        let url = self.endpoint(&["sobjects", &self.object, id]);
        debug!(url = %redact_url(url.as_str()), "updating remote record");

        self.send(|| self.request(Method::PATCH, url.clone()).json(fields), id, true).await?;

        let written: Vec<String> = fields.keys().cloned().collect();
        self.refetch(id, &written).await
    }

    async fn query_recent(
        &self,
        fields: &[String],
        cursor: &ScanCursor<String>,
        until: DateTime<Utc>,
        limit: usize,
    ) -> RemoteResult<Vec<RemoteRecord>> {
        let soql = recency_query(&self.object, &self.modstamp_field, fields, cursor, until, limit);
        let url = self.endpoint(&["query"]);
        debug!(url = %redact_url(url.as_str()), soql = %soql, "querying remote records");

        let resp = self
            .send(|| self.request(Method::GET, url.clone()).query(&[("q", &soql)]), &self.object, true)
            .await?;
        let page: QueryResponse = resp.json().await.map_err(|e| map_reqwest_error(&e))?;

        page.records.iter().map(|record| self.decode_record(record, fields)).collect()
    }
}
