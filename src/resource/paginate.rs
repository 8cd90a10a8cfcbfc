//! Paginated listing
//!
//! Walks a list endpoint page by page and concatenates every item into a
//! single ordered sequence.

use super::protocol::{Page, PageCursor, PageSource, PaginationConfig, PaginationKind, TransportError};
use serde_json::Value;
use tracing::{debug, warn};

/// Fetch every page of a listing, in order.
///
/// Pages are requested sequentially starting from the first one. Fetching
/// stops after a short or empty page, when the reported total has been
/// reached, or (marker pagination) when no next marker is available. A
/// failed page aborts the whole listing, and so does reaching
/// `max_pages` while the server still reports more data.
pub fn fetch_all<S>(
    source: &S,
    path: &str,
    config: &PaginationConfig,
) -> Result<Vec<Value>, TransportError>
where
    S: PageSource + ?Sized,
{
    let limit = config.limit.max(1);
    let max_pages = config.max_pages.max(1);
    let mut cursor = PageCursor::first(limit);
    let mut items: Vec<Value> = Vec::new();

    for _ in 0..max_pages {
        debug!(
            "Fetching page {} of {} (offset={}, marker={:?})",
            cursor.page, path, cursor.offset, cursor.marker
        );
        let page = source.fetch_page(path, &cursor, config)?;
        let received = page.items.len();
        let next_marker = match config.kind {
            PaginationKind::Marker => next_marker(&page, config.marker_field.as_deref()),
            PaginationKind::Page | PaginationKind::Offset => None,
        };
        let total_count = page.total_count;
        items.extend(page.items);

        if received < limit as usize {
            debug!(
                "Listing {} complete: {} items in {} pages",
                path,
                items.len(),
                cursor.page
            );
            return Ok(items);
        }
        if total_count.is_some_and(|total| items.len() as u64 >= total) {
            debug!("Listing {} reached reported total of {:?}", path, total_count);
            return Ok(items);
        }
        if config.kind == PaginationKind::Marker && next_marker.is_none() {
            debug!("Listing {} has no further marker", path);
            return Ok(items);
        }

        cursor = PageCursor {
            page: cursor.page + 1,
            offset: items.len() as u64,
            marker: next_marker,
            limit,
        };
    }

    warn!(
        "Listing {} still had more data after {} pages, giving up",
        path, max_pages
    );
    Err(TransportError::PageLimitExceeded { max_pages })
}

/// Marker for the page after `page`: the server-supplied marker when present,
/// otherwise the configured field of the last item.
fn next_marker(page: &Page, marker_field: Option<&str>) -> Option<String> {
    if let Some(marker) = page.next_marker.as_deref().filter(|m| !m.is_empty()) {
        return Some(marker.to_string());
    }

    let field = marker_field?;
    let marker = match page.items.last()?.get(field)? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    if marker.is_empty() {
        None
    } else {
        Some(marker)
    }
}
