//! Pagination cursors from the `Link` response header.
//!
//! The header looks like
//!
//! ```text
//! <https://host/api/v1/timelines/public?max_id=3092746>; rel="next", <https://host/api/v1/timelines/public?since_id=3092777>; rel="prev"
//! ```
//!
//! Either relation may be missing. Entries that do not look like
//! `<url>; rel="token"` are skipped.

use crate::error::LinkHeaderError;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

const REL_NEXT: &str = "next";
const REL_PREV: &str = "prev";
const PARAM_MAX_ID: &str = "max_id";
const PARAM_SINCE_ID: &str = "since_id";

/// Edges of one page of results.
///
/// Both ids are independently optional; a single page has neither.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PageCursor {
    /// `max_id` of the next (older) page.
    pub next: Option<u64>,
    /// `since_id` of the previous (newer) page.
    pub prev: Option<u64>,
}

impl PageCursor {
    /// Check if there is neither a next nor a previous page.
    pub fn is_empty(&self) -> bool {
        self.next.is_none() && self.prev.is_none()
    }
}

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)^<(?P<url>[^>]*)>[^<]*?;\s*rel\s*=\s*"(?P<rel>[^"]*)""#)
            .expect("link pattern is valid")
    })
}

/// Parse a `Link` header value into a [`PageCursor`].
///
/// An empty header gives an empty cursor. A relation whose URL lacks the
/// expected query parameter leaves that side unset. A parameter that is
/// present but not an integer is an error.
pub fn parse_link_header(header: &str) -> Result<PageCursor, LinkHeaderError> {
    let links = relations(header);

    let next = match links.get(REL_NEXT) {
        Some(url) => query_id(url, PARAM_MAX_ID, REL_NEXT)?,
        None => None,
    };
    let prev = match links.get(REL_PREV) {
        Some(url) => query_id(url, PARAM_SINCE_ID, REL_PREV)?,
        None => None,
    };

    Ok(PageCursor { next, prev })
}

/// Map of lower-cased relation token to URL. The first entry wins.
fn relations(header: &str) -> HashMap<String, &str> {
    let mut links = HashMap::new();

    for entry in header.split(',').map(str::trim) {
        let Some(captures) = link_pattern().captures(entry) else {
            continue;
        };
        let (Some(url), Some(rel)) = (captures.name("url"), captures.name("rel")) else {
            continue;
        };
        links
            .entry(rel.as_str().trim().to_lowercase())
            .or_insert(url.as_str());
    }

    links
}

fn query_id(url: &str, param: &str, relation: &str) -> Result<Option<u64>, LinkHeaderError> {
    let Some((_, query)) = url.split_once('?') else {
        return Ok(None);
    };

    let value = url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == param)
        .map(|(_, value)| value.into_owned());

    match value {
        Some(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|_| LinkHeaderError::InvalidId {
                relation: relation.to_string(),
                value,
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEXT: &str = "<https://mastodon.cloud/api/v1/timelines/public?max_id=3092746>; rel=\"next\"";
    const PREV: &str =
        "<https://mastodon.cloud/api/v1/timelines/public?since_id=3092777>; rel=\"prev\"";

    #[test]
    fn test_both_relations() {
        let cursor = parse_link_header(&format!("{}, {}", NEXT, PREV)).unwrap();
        assert_eq!(
            cursor,
            PageCursor {
                next: Some(3092746),
                prev: Some(3092777)
            }
        );
    }

    #[test]
    fn test_order_does_not_matter() {
        let forward = parse_link_header(&format!("{}, {}", NEXT, PREV)).unwrap();
        let backward = parse_link_header(&format!("{}, {}", PREV, NEXT)).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_empty_header() {
        let cursor = parse_link_header("").unwrap();
        assert!(cursor.is_empty());
        assert_eq!(cursor, PageCursor::default());
    }

    #[test]
    fn test_single_relation() {
        let cursor = parse_link_header(NEXT).unwrap();
        assert_eq!(cursor.next, Some(3092746));
        assert_eq!(cursor.prev, None);
    }

    #[test]
    fn test_relation_without_expected_param() {
        // prev carries max_id only, which is not its cursor parameter
        let header = "<https://h/api/v1/notifications?limit=20&max_id=5>; rel=\"prev\"";
        assert_eq!(parse_link_header(header).unwrap(), PageCursor::default());

        let header = "<https://h/api/v1/notifications>; rel=\"next\"";
        assert_eq!(parse_link_header(header).unwrap(), PageCursor::default());
    }

    #[test]
    fn test_param_among_others() {
        let header = "<https://h/api/v1/timelines/home?limit=40&max_id=99&local=true>; rel=\"next\"";
        assert_eq!(parse_link_header(header).unwrap().next, Some(99));
    }

    #[test]
    fn test_tolerates_garbage_entries() {
        let header = format!("garbage, <no-rel>, {}, ;rel=\"prev\"", NEXT);
        let cursor = parse_link_header(&header).unwrap();
        assert_eq!(cursor.next, Some(3092746));
        assert_eq!(cursor.prev, None);
    }

    #[test]
    fn test_relation_token_is_case_insensitive() {
        let header = "<https://h/x?max_id=1>; REL=\"Next\"";
        assert_eq!(parse_link_header(header).unwrap().next, Some(1));
    }

    #[test]
    fn test_non_numeric_id_is_error() {
        let header = "<https://h/x?max_id=109348xyz>; rel=\"next\"";
        let err = parse_link_header(header).unwrap_err();
        assert_eq!(
            err,
            LinkHeaderError::InvalidId {
                relation: "next".to_string(),
                value: "109348xyz".to_string(),
            }
        );
    }
}
