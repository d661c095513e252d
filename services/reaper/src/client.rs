//! Panel API client.
//!
//! The only network boundary of the reaper. Every logical request goes
//! through [`PanelClient::execute`], which applies the same headers, timeout,
//! and retry policy to all of them.

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::config::{ApiKey, Config, HttpConfig};
use crate::error::RequestError;

/// Vendor media type the panel expects.
pub const PANEL_ACCEPT: &str = "Application/vnd.pterodactyl.v1+json";

/// Successful outcome of a panel request.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// 200 with a decoded JSON body.
    Body(serde_json::Value),

    /// 204.
    NoContent,
}

/// Panel API client. Cheap to share behind an `Arc`; holds no mutable state.
#[derive(Debug, Clone)]
pub struct PanelClient {
    client: reqwest::Client,
    base_url: String,
    http: HttpConfig,
}

impl PanelClient {
    /// Create a client from the reaper configuration.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_settings(&config.api_url, &config.api_key, config.http.clone())
    }

    /// Create a client for an explicit base URL and key.
    pub fn with_settings(base_url: &str, api_key: &ApiKey, http: HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(PANEL_ACCEPT));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.expose()))
            .context("Invalid API key format")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(http.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Build a URL for an endpoint.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Perform one logical request with retries.
    ///
    /// Attempts the call up to `retry_count` times, sleeping `retry_delay`
    /// between attempts. Returns the last failure once attempts run out.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Payload, RequestError> {
        let max_attempts = self.http.retry_count.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(&method, path, body).await {
                Ok(payload) => {
                    if attempt > 1 {
                        debug!(%method, path, attempt, "Request succeeded after retry");
                    }
                    return Ok(payload);
                }
                Err(e) if attempt >= max_attempts => {
                    error!(
                        %method,
                        path,
                        attempts = attempt,
                        error = %e,
                        "Request failed after all attempts"
                    );
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        %method,
                        path,
                        attempt,
                        max_attempts,
                        error = %e,
                        delay_ms = self.http.retry_delay.as_millis() as u64,
                        "Request attempt failed, will retry after delay"
                    );
                    tokio::time::sleep(self.http.retry_delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(
        &self,
        method: &Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Payload, RequestError> {
        let mut request = self.client.request(method.clone(), self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;

        match response.status() {
            StatusCode::OK => {
                let bytes = response.bytes().await?;
                serde_json::from_slice(&bytes)
                    .map(Payload::Body)
                    .map_err(|e| RequestError::InvalidBody(e.to_string()))
            }
            StatusCode::NO_CONTENT => Ok(Payload::NoContent),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(RequestError::Status { status, body })
            }
        }
    }

    /// Fetch every page of a listing endpoint and return the record attributes.
    ///
    /// A failure on any page fails the whole listing. A 204 counts as an
    /// empty page.
    pub async fn list_all<A, E>(&self, path: &str) -> Result<Vec<A>, E>
    where
        A: DeserializeOwned,
        E: From<RequestError> + From<serde_json::Error>,
    {
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let page_path = page_path(path, page);
            let Payload::Body(body) = self.execute(Method::GET, &page_path, None).await? else {
                break;
            };

            let list: ListResponse<A> = serde_json::from_value(body)?;
            items.extend(list.data.into_iter().map(|record| record.attributes));

            match list.meta.and_then(|m| m.pagination) {
                Some(pagination) if page < pagination.total_pages => page += 1,
                _ => break,
            }
        }

        debug!(path, pages = page, records = items.len(), "Fetched listing");
        Ok(items)
    }
}

fn page_path(path: &str, page: u32) -> String {
    if page == 1 {
        return path.to_string();
    }
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}page={page}")
}

/// List envelope shared by every panel listing endpoint.
#[derive(Debug, Deserialize)]
struct ListResponse<A> {
    #[serde(default = "Vec::new")]
    data: Vec<Record<A>>,
    #[serde(default)]
    meta: Option<ListMeta>,
}

#[derive(Debug, Deserialize)]
struct Record<A> {
    attributes: A,
}

#[derive(Debug, Deserialize)]
struct ListMeta {
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    total_pages: u32,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn test_client() -> PanelClient {
        PanelClient::with_settings(
            "https://panel.example.com/api/client/",
            &ApiKey::new("ptlc_test"),
            HttpConfig {
                timeout: Duration::from_secs(1),
                retry_count: 1,
                retry_delay: Duration::ZERO,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_url_building() {
        let client = test_client();
        assert_eq!(client.url("/"), "https://panel.example.com/api/client/");
        assert_eq!(
            client.url("/servers/1a2b/backups"),
            "https://panel.example.com/api/client/servers/1a2b/backups"
        );
    }

    #[test]
    fn test_page_path() {
        assert_eq!(page_path("/", 1), "/");
        assert_eq!(page_path("/", 3), "/?page=3");
        assert_eq!(page_path("/servers/x/backups?sort=1", 2), "/servers/x/backups?sort=1&page=2");
    }

    #[test]
    fn test_list_envelope_deserialization() {
        #[derive(Debug, Deserialize)]
        struct Item {
            name: String,
        }

        let json = serde_json::json!({
            "object": "list",
            "data": [
                {"object": "thing", "attributes": {"name": "a"}},
                {"object": "thing", "attributes": {"name": "b"}}
            ],
            "meta": {
                "pagination": {
                    "total": 2,
                    "count": 2,
                    "per_page": 50,
                    "current_page": 1,
                    "total_pages": 1,
                    "links": {}
                }
            }
        });

        let list: ListResponse<Item> = serde_json::from_value(json).unwrap();
        assert_eq!(list.data.len(), 2);
        assert_eq!(list.data[1].attributes.name, "b");
        assert_eq!(list.meta.unwrap().pagination.unwrap().total_pages, 1);
    }

    #[test]
    fn test_list_envelope_without_meta() {
        let list: ListResponse<serde_json::Value> =
            serde_json::from_value(serde_json::json!({"data": []})).unwrap();
        assert!(list.data.is_empty());
        assert!(list.meta.is_none());
    }
}
