//! One page of a list endpoint, with its pagination cursors.

use crate::decode::{decode_list, Entity};
use crate::error::{DecodeError, LinkHeaderError};
use crate::link::{parse_link_header, PageCursor};

/// Default page size asked for when a [`Range`] does not set one.
pub const DEFAULT_LIMIT: u32 = 20;

/// Window of a list request: `max_id`, `since_id` and `limit`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct Range {
    pub max_id: Option<u64>,
    pub since_id: Option<u64>,
    pub limit: Option<u32>,
}

impl Range {
    /// Create an empty range (server defaults).
    pub fn new() -> Self {
        Self::default()
    }

    /// Only items with an id less than or equal to `id`.
    pub fn max_id(mut self, id: u64) -> Self {
        self.max_id = Some(id);
        self
    }

    /// Only items with an id greater than `id`.
    pub fn since_id(mut self, id: u64) -> Self {
        self.since_id = Some(id);
        self
    }

    /// Maximum number of items.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Convert to query parameters, unset values left out.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(id) = self.max_id {
            query.push(("max_id", id.to_string()));
        }
        if let Some(id) = self.since_id {
            query.push(("since_id", id.to_string()));
        }
        if let Some(limit) = self.limit {
            query.push(("limit", limit.to_string()));
        }
        query
    }
}

/// A decoded list response.
///
/// Items keep the order the server sent them in. The page is a plain value:
/// it never fetches anything by itself.
#[derive(Clone, Debug)]
pub struct Page<T> {
    items: Vec<T>,
    cursor: Result<PageCursor, LinkHeaderError>,
    raw_json: String,
}

impl<T: Entity> Page<T> {
    /// Assemble a page from a response body and its `Link` header, if any.
    ///
    /// Fails only if the body cannot be decoded. A bad `Link` header does
    /// not lose the items; it is reported by [`cursor`](Self::cursor).
    pub fn from_response(body: &str, link_header: Option<&str>) -> Result<Self, DecodeError> {
        let items = decode_list(body)?;
        let cursor = match link_header {
            Some(header) => parse_link_header(header),
            None => Ok(PageCursor::default()),
        };

        Ok(Self {
            items,
            cursor,
            raw_json: body.to_string(),
        })
    }
}

impl<T> Page<T> {
    /// Get the items.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Take the items.
    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// Number of items on this page.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the page is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over the items.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// The pagination cursors, or the reason they could not be read.
    pub fn cursor(&self) -> Result<PageCursor, LinkHeaderError> {
        self.cursor.clone()
    }

    /// The response body this page was decoded from.
    pub fn raw_json(&self) -> &str {
        &self.raw_json
    }

    /// Request window for the next (older) page, if there is one.
    pub fn next_range(&self, limit: Option<u32>) -> Option<Range> {
        let next = self.cursor.as_ref().ok()?.next?;
        Some(Range {
            max_id: Some(next),
            since_id: None,
            limit,
        })
    }

    /// Request window for the previous (newer) page, if there is one.
    pub fn prev_range(&self, limit: Option<u32>) -> Option<Range> {
        let prev = self.cursor.as_ref().ok()?.prev?;
        Some(Range {
            max_id: None,
            since_id: Some(prev),
            limit,
        })
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Page<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Status;

    const BODY: &str = r#"[{"id": 30, "content": "c"}, {"id": 20, "content": "b"}, {"id": 10, "content": "a"}]"#;
    const LINK: &str = "<https://h/api/v1/timelines/home?max_id=10>; rel=\"next\", <https://h/api/v1/timelines/home?since_id=30>; rel=\"prev\"";

    #[test]
    fn test_page_keeps_server_order() {
        let page: Page<Status> = Page::from_response(BODY, Some(LINK)).unwrap();
        let ids: Vec<u64> = page.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![30, 20, 10]);
        assert_eq!(page.len(), 3);
        assert_eq!(page.raw_json(), BODY);
        assert_eq!(
            page.cursor().unwrap(),
            PageCursor {
                next: Some(10),
                prev: Some(30)
            }
        );
    }

    #[test]
    fn test_page_without_link_header() {
        let page: Page<Status> = Page::from_response("[]", None).unwrap();
        assert!(page.is_empty());
        assert!(page.cursor().unwrap().is_empty());
        assert_eq!(page.next_range(None), None);
        assert_eq!(page.prev_range(None), None);
    }

    #[test]
    fn test_bad_link_header_keeps_items() {
        let link = "<https://h/x?max_id=abc>; rel=\"next\"";
        let page: Page<Status> = Page::from_response(BODY, Some(link)).unwrap();
        assert_eq!(page.len(), 3);
        assert!(page.cursor().is_err());
        assert_eq!(page.next_range(None), None);
    }

    #[test]
    fn test_ranges_from_cursor() {
        let page: Page<Status> = Page::from_response(BODY, Some(LINK)).unwrap();
        assert_eq!(page.next_range(Some(40)), Some(Range::new().max_id(10).limit(40)));
        assert_eq!(page.prev_range(None), Some(Range::new().since_id(30)));
    }

    #[test]
    fn test_range_query() {
        assert!(Range::new().to_query().is_empty());
        assert_eq!(
            Range::new().since_id(5).limit(DEFAULT_LIMIT).to_query(),
            vec![("since_id", "5".to_string()), ("limit", "20".to_string())]
        );
    }

    #[test]
    fn test_page_body_errors() {
        let err = Page::<Status>::from_response("not json", Some(LINK)).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }
}
