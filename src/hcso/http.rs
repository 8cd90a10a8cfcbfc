//! Blocking HTTP client for the RDS list API
//!
//! One request per page; the client implements [`PageSource`] so the
//! locator can drive it without knowing about URLs or response bodies.

use super::config::Config;
use crate::resource::normalize::{extract_list, parse_body};
use crate::resource::protocol::{Page, PageCursor, PageSource, PaginationConfig, TransportError};
use anyhow::{anyhow, Result};
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::{debug, trace, warn};
use url::Url;

/// Response key carrying the total number of items in the listing
const TOTAL_COUNT_KEY: &str = "total_count";
/// Response path carrying the marker of the next page
const NEXT_MARKER_POINTER: &str = "/page_info/next_marker";

/// Mask sensitive values for logging
pub fn mask_credential(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

/// RDS HTTP client
pub struct RdsHttpClient {
    http_client: Client,
    endpoint: Url,
    auth_token: Option<String>,
    list_key: String,
}

impl RdsHttpClient {
    /// Create a client for the list endpoint whose items live under `list_key`
    pub fn new(config: &Config, list_key: &str) -> Result<Self> {
        let endpoint = Url::parse(&config.rds_endpoint()?)
            .map_err(|e| anyhow!("Invalid RDS endpoint: {}", e))?;
        debug!(
            "Creating RDS HTTP client for endpoint: {}, auth_token: {:?}",
            endpoint,
            config.auth_token.as_deref().map(mask_credential)
        );

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            endpoint,
            auth_token: config.auth_token.clone(),
            list_key: list_key.to_string(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// URL of one page: `path` relative to the endpoint plus paging parameters
    pub fn page_url(
        &self,
        path: &str,
        cursor: &PageCursor,
        pagination: &PaginationConfig,
    ) -> Result<Url, TransportError> {
        let mut url = self
            .endpoint
            .join(path.trim_start_matches('/'))
            .map_err(|e| anyhow!("Invalid request path '{}': {}", path, e))?;

        // Paging parameters replace any the template already carries
        let params = cursor.query_params(pagination);
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !params.iter().any(|(name, _)| name == k))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .extend_pairs(params);
        Ok(url)
    }

    /// Send a GET request and return the body of a successful response
    pub fn get(&self, url: &Url) -> Result<String, TransportError> {
        debug!("GET {}", url);

        let mut request = self
            .http_client
            .get(url.clone())
            .header("Accept", "application/json");
        if let Some(token) = &self.auth_token {
            request = request.header("X-Auth-Token", token);
        }

        let response = request.send()?;
        let status = response.status();
        let text = response.text()?;

        debug!("Response status: {}", status);
        trace!(
            "Response body (first 2000 chars): {}",
            truncate(&text, 2000)
        );

        if !status.is_success() {
            warn!(
                "RDS request failed: status={}, body={}",
                status,
                truncate(&text, 500)
            );
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }
}

impl PageSource for RdsHttpClient {
    fn fetch_page(
        &self,
        path: &str,
        cursor: &PageCursor,
        config: &PaginationConfig,
    ) -> Result<Page, TransportError> {
        let url = self.page_url(path, cursor, config)?;
        let body = self.get(&url)?;
        parse_page(&body, &self.list_key)
    }
}

/// Parse one list response into a page
pub fn parse_page(body: &str, list_key: &str) -> Result<Page, TransportError> {
    let json = parse_body(body)?;
    if !json.is_object() {
        return Err(TransportError::Other(anyhow!(
            "Expected a JSON object in list response, got: {}",
            truncate(body, 200)
        )));
    }

    let items = extract_list(&json, list_key);
    let total_count = json.get(TOTAL_COUNT_KEY).and_then(|v| v.as_u64());
    let next_marker = json
        .pointer(NEXT_MARKER_POINTER)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    Ok(Page {
        items,
        next_marker,
        total_count,
    })
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
