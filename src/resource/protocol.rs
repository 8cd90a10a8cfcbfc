//! Pagination protocol types
//!
//! This module defines how a list endpoint is paged and the capability a
//! transport must provide to serve one page at a time.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Default number of items requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 100;
/// Default upper bound on the number of page requests for one listing
pub const DEFAULT_MAX_PAGES: u32 = 1000;

/// How consecutive pages are addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaginationKind {
    /// `page=N&limit=L`, first page is 1
    Page,
    /// `offset=N&limit=L`, first offset is 0
    Offset,
    /// `marker=M&limit=L`, marker taken from the previous page
    Marker,
}

impl Default for PaginationKind {
    fn default() -> Self {
        PaginationKind::Page
    }
}

/// Pagination configuration for a list endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaginationConfig {
    #[serde(default)]
    pub kind: PaginationKind,

    /// Items requested per page
    #[serde(default = "default_page_size")]
    pub limit: u32,

    /// Query parameter carrying the page size (e.g., "limit")
    #[serde(default = "default_limit_param")]
    pub limit_param: String,

    /// Query parameter carrying the page number, offset or marker
    #[serde(default = "default_cursor_param")]
    pub cursor_param: String,

    /// For marker pagination: item field whose value on the last item of a
    /// page becomes the next marker when the page itself carries none
    #[serde(default)]
    pub marker_field: Option<String>,

    /// Safety bound on the number of page requests
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_limit_param() -> String {
    "limit".to_string()
}

fn default_cursor_param() -> String {
    "page".to_string()
}

fn default_max_pages() -> u32 {
    DEFAULT_MAX_PAGES
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            kind: PaginationKind::default(),
            limit: DEFAULT_PAGE_SIZE,
            limit_param: default_limit_param(),
            cursor_param: default_cursor_param(),
            marker_field: None,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// Position of one page request within a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    /// 1-based page number
    pub page: u32,
    /// Number of items received before this page
    pub offset: u64,
    /// Marker from the previous page (marker pagination only)
    pub marker: Option<String>,
    /// Requested page size
    pub limit: u32,
}

impl PageCursor {
    /// Cursor for the first page of a listing
    pub fn first(limit: u32) -> Self {
        Self {
            page: 1,
            offset: 0,
            marker: None,
            limit,
        }
    }

    /// Query parameters addressing this page
    pub fn query_params(&self, config: &PaginationConfig) -> Vec<(String, String)> {
        let mut params = vec![(config.limit_param.clone(), self.limit.to_string())];
        match config.kind {
            PaginationKind::Page => {
                params.push((config.cursor_param.clone(), self.page.to_string()));
            }
            PaginationKind::Offset => {
                params.push((config.cursor_param.clone(), self.offset.to_string()));
            }
            PaginationKind::Marker => {
                if let Some(marker) = &self.marker {
                    params.push((config.cursor_param.clone(), marker.clone()));
                }
            }
        }
        params
    }
}

/// One server response worth of items
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Value>,
    /// Marker for the next page, if the server returned one
    pub next_marker: Option<String>,
    /// Total number of items in the listing, if the server reported it
    pub total_count: Option<u64>,
}

impl Page {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }
}

/// Failure while retrieving pages
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request failed ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("listing did not finish within {max_pages} pages")]
    PageLimitExceeded { max_pages: u32 },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Capability to fetch a single page of a listing
///
/// Implementations must return a consistent item order across pages of the
/// same listing and be safe to call repeatedly. `config` is the one the
/// paginator advances `cursor` with, so both sides address pages alike.
pub trait PageSource: Send + Sync {
    fn fetch_page(
        &self,
        path: &str,
        cursor: &PageCursor,
        config: &PaginationConfig,
    ) -> Result<Page, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_kind_deserialize() {
        let kind: PaginationKind = serde_json::from_str(r#""page""#).unwrap();
        assert_eq!(kind, PaginationKind::Page);

        let kind: PaginationKind = serde_json::from_str(r#""offset""#).unwrap();
        assert_eq!(kind, PaginationKind::Offset);

        let kind: PaginationKind = serde_json::from_str(r#""marker""#).unwrap();
        assert_eq!(kind, PaginationKind::Marker);
    }

    #[test]
    fn test_pagination_config_defaults() {
        let config: PaginationConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.kind, PaginationKind::Page);
        assert_eq!(config.limit, 100);
        assert_eq!(config.limit_param, "limit");
        assert_eq!(config.cursor_param, "page");
        assert_eq!(config.max_pages, 1000);
    }

    #[test]
    fn test_page_query_params() {
        let config = PaginationConfig::default();
        let cursor = PageCursor {
            page: 3,
            offset: 200,
            marker: None,
            limit: 100,
        };

        let params = cursor.query_params(&config);
        assert_eq!(
            params,
            vec![
                ("limit".to_string(), "100".to_string()),
                ("page".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_marker_query_params_omit_first_marker() {
        let config = PaginationConfig {
            kind: PaginationKind::Marker,
            cursor_param: "marker".to_string(),
            ..Default::default()
        };

        let params = PageCursor::first(50).query_params(&config);
        assert_eq!(params, vec![("limit".to_string(), "50".to_string())]);
    }

    #[test]
    fn test_offset_query_params() {
        let config = PaginationConfig {
            kind: PaginationKind::Offset,
            cursor_param: "offset".to_string(),
            ..Default::default()
        };
        let cursor = PageCursor {
            page: 2,
            offset: 100,
            marker: None,
            limit: 100,
        };

        let params = cursor.query_params(&config);
        assert_eq!(params[1], ("offset".to_string(), "100".to_string()));
    }
}
