use std::time::Duration;

use export_logging::export_debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use serde_json::Value;
use url::Url;

use quipmark_core::{FolderNode, ThreadMeta};

use crate::types::{ApiError, ApiFailure, ExportError};

/// Production endpoint of the service's REST API.
pub const DEFAULT_BASE_URL: &str = "https://platform.quip.com/1/";

const CLIENT_USER_AGENT: &str = "quipmark/0.1";

/// Retry-with-backoff policy applied uniformly at the transport boundary.
///
/// Exhaustion surfaces as `ApiFailure::Transient`, a normal per-document
/// failure, never a process abort.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Exponential delay before retry number `attempt` (zero-based), capped
    /// at `max_delay`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Settings for the HTTP client.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(45),
            retry: RetryPolicy::default(),
        }
    }
}

/// Account surface needed to discover everything accessible to a token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub desktop_folder_id: Option<String>,
    pub private_folder_id: Option<String>,
    pub shared_folder_ids: Vec<String>,
    pub group_ids: Vec<String>,
    pub trash_folder_id: Option<String>,
    pub starred_folder_id: Option<String>,
    pub archive_folder_id: Option<String>,
}

/// Remote operations the exporter consumes.
///
/// `thread_meta` is the light metadata call used during traversal;
/// `thread_html` fetches the document body and is only issued for
/// documents that actually need export.
#[async_trait::async_trait]
pub trait QuipApi: Send + Sync {
    async fn current_user(&self) -> Result<UserInfo, ApiError>;
    async fn folder(&self, id: &str) -> Result<FolderNode, ApiError>;
    async fn thread_meta(&self, id: &str) -> Result<ThreadMeta, ApiError>;
    async fn thread_html(&self, id: &str) -> Result<String, ApiError>;
    async fn group_folder_id(&self, group_id: &str) -> Result<Option<String>, ApiError>;
}

/// reqwest-backed client with bearer-token auth and retrying transport.
#[derive(Debug, Clone)]
pub struct HttpQuipClient {
    http: reqwest::Client,
    base: Url,
    retry: RetryPolicy,
}

impl HttpQuipClient {
    pub fn new(token: &str, settings: ClientSettings) -> Result<Self, ExportError> {
        let mut base = settings.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base)
            .map_err(|err| ExportError::Client(format!("invalid base url: {err}")))?;

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|err| ExportError::Client(format!("invalid token: {err}")))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ExportError::Client(err.to_string()))?;

        Ok(Self {
            http,
            base,
            retry: settings.retry,
        })
    }

    async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let url = self
            .base
            .join(path)
            .map_err(|err| ApiError::new(ApiFailure::InvalidResponse, err.to_string()))?;

        let mut attempt: u32 = 0;
        loop {
            let outcome = self.http.get(url.clone()).send().await;
            let retry_message = match outcome {
                Ok(response) => {
                    let status = response.status().as_u16();
                    match status {
                        401 | 403 => {
                            return Err(ApiError::new(
                                ApiFailure::Auth,
                                format!("http status {status} for {url}"),
                            ));
                        }
                        404 => {
                            return Err(ApiError::new(
                                ApiFailure::NotFound,
                                format!("http status {status} for {url}"),
                            ));
                        }
                        429 | 502 | 503 | 504 => format!("http status {status}"),
                        _ if !response.status().is_success() => {
                            return Err(ApiError::new(
                                ApiFailure::Http(status),
                                format!("http status {status} for {url}"),
                            ));
                        }
                        _ => {
                            return response.json::<Value>().await.map_err(|err| {
                                ApiError::new(ApiFailure::InvalidResponse, err.to_string())
                            });
                        }
                    }
                }
                Err(err) => err.to_string(),
            };

            attempt += 1;
            if attempt >= self.retry.max_attempts {
                return Err(ApiError::new(
                    ApiFailure::Transient,
                    format!("retries exhausted for {url}: {retry_message}"),
                ));
            }
            let delay = self.retry.delay(attempt - 1);
            export_debug!(
                "Retrying {} after {:?} (attempt {}): {}",
                url,
                delay,
                attempt,
                retry_message
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl QuipApi for HttpQuipClient {
    async fn current_user(&self) -> Result<UserInfo, ApiError> {
        let value = self.get_json("users/current").await?;
        Ok(parse_user(&value))
    }

    async fn folder(&self, id: &str) -> Result<FolderNode, ApiError> {
        let value = self.get_json(&format!("folders/{id}")).await?;
        Ok(parse_folder(id, &value))
    }

    async fn thread_meta(&self, id: &str) -> Result<ThreadMeta, ApiError> {
        let value = self.get_json(&format!("threads/{id}")).await?;
        Ok(parse_thread_meta(id, &value))
    }

    async fn thread_html(&self, id: &str) -> Result<String, ApiError> {
        let value = self.get_json(&format!("threads/{id}")).await?;
        extract_html(&value).ok_or_else(|| {
            ApiError::new(
                ApiFailure::InvalidResponse,
                format!("no html in response for thread {id}"),
            )
        })
    }

    async fn group_folder_id(&self, group_id: &str) -> Result<Option<String>, ApiError> {
        let value = self.get_json(&format!("groups/{group_id}")).await?;
        let obj = value.get("group").unwrap_or(&value);
        Ok(obj
            .get("folder_id")
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

fn parse_user(value: &Value) -> UserInfo {
    let string_at = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    let list_at = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };
    UserInfo {
        desktop_folder_id: string_at("desktop_folder_id"),
        private_folder_id: string_at("private_folder_id"),
        shared_folder_ids: list_at("shared_folder_ids"),
        group_ids: list_at("group_ids"),
        trash_folder_id: string_at("trash_folder_id"),
        starred_folder_id: string_at("starred_folder_id"),
        archive_folder_id: string_at("archive_folder_id"),
    }
}

/// The folder object may sit at the top level or under `folder`; children
/// are listed beside it as `{thread_id}` / `{folder_id}` stubs.
fn parse_folder(id_hint: &str, value: &Value) -> FolderNode {
    let obj = value.get("folder").unwrap_or(value);
    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or(id_hint)
        .to_string();
    let title = obj
        .get("title")
        .or_else(|| obj.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| id.clone());

    let mut child_folders = Vec::new();
    let mut child_threads = Vec::new();
    if let Some(children) = value.get("children").and_then(Value::as_array) {
        for child in children {
            if let Some(tid) = child.get("thread_id").and_then(Value::as_str) {
                child_threads.push(tid.to_string());
            } else if let Some(fid) = child.get("folder_id").and_then(Value::as_str) {
                child_folders.push(fid.to_string());
            }
        }
    }

    FolderNode {
        id,
        title,
        child_folders,
        child_threads,
    }
}

fn parse_thread_meta(id_hint: &str, value: &Value) -> ThreadMeta {
    let obj = value.get("thread").unwrap_or(value);
    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or(id_hint)
        .to_string();
    let title = obj
        .get("title")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| id.clone());
    let updated_usec = obj.get("updated_usec").and_then(Value::as_u64);
    let link = obj
        .get("link")
        .or_else(|| obj.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string);

    ThreadMeta {
        id,
        title,
        updated_usec,
        link,
    }
}

/// HTML may be reported at the top level or nested one step down,
/// depending on the endpoint era.
fn extract_html(value: &Value) -> Option<String> {
    if let Some(html) = value.get("html").and_then(Value::as_str) {
        return Some(html.to_string());
    }
    for key in ["thread", "document", "content", "expanded"] {
        if let Some(html) = value
            .get(key)
            .and_then(|node| node.get("html"))
            .and_then(Value::as_str)
        {
            return Some(html.to_string());
        }
    }
    None
}
