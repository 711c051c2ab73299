//! since_id / max_id cursor for one pager invocation.

use crate::twitter::types::PageParams;

/// Outcome of moving the cursor past a non-empty page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Request the next, strictly older page.
    Next,
    /// No older tweet can match: the oldest id was 0 or the window closed
    /// onto `since_id`.
    Exhausted,
    /// The page carried no usable ids or did not move `max_id` backward.
    Stalled,
}

/// Ephemeral paging state of one search field's fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchCursor {
    /// Highest id already stored for the author; only newer tweets are asked for.
    pub since_id: Option<u64>,
    /// Upper bound for the next page, `min(ids on page) - 1`.
    pub max_id: Option<u64>,
}

impl FetchCursor {
    pub fn new(since_id: Option<u64>) -> Self {
        Self {
            since_id,
            max_id: None,
        }
    }

    /// Parameters of the next request.
    pub fn page_params(&self, query: &str, count: Option<u32>) -> PageParams {
        let mut params = PageParams::new();
        if let Some(since_id) = self.since_id {
            params.insert("since_id".to_string(), since_id.to_string());
        }
        if let Some(max_id) = self.max_id {
            params.insert("max_id".to_string(), max_id.to_string());
        }
        if let Some(count) = count {
            params.insert("count".to_string(), count.to_string());
        }
        params.insert("q".to_string(), query.to_string());
        params
    }

    /// Move `max_id` below the oldest id of a non-empty page.
    pub fn advance(&mut self, page_ids: impl IntoIterator<Item = u64>) -> Advance {
        let Some(oldest) = page_ids.into_iter().min() else {
            return Advance::Stalled;
        };
        let Some(next) = oldest.checked_sub(1) else {
            return Advance::Exhausted;
        };
        if self.max_id.is_some_and(|current| next >= current) {
            return Advance::Stalled;
        }

        self.max_id = Some(next);
        if self.since_id.is_some_and(|since| next <= since) {
            return Advance::Exhausted;
        }
        Advance::Next
    }

    /// Drop the upper bound at the end of a fetch.
    pub fn reset(&mut self) {
        self.max_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_max_id_is_below_oldest_on_page() {
        let mut cursor = FetchCursor::new(None);
        assert_eq!(cursor.advance([105, 104, 103]), Advance::Next);
        assert_eq!(cursor.max_id, Some(102));
    }

    #[test]
    fn test_first_page_params_have_no_max_id() {
        let cursor = FetchCursor::new(Some(99));
        let params = cursor.page_params("from:wojespn", Some(40));

        assert_eq!(params.get("since_id").map(String::as_str), Some("99"));
        assert_eq!(params.get("count").map(String::as_str), Some("40"));
        assert_eq!(params.get("q").map(String::as_str), Some("from:wojespn"));
        assert!(!params.contains_key("max_id"));
    }

    #[test]
    fn test_later_page_params_carry_max_id() {
        let mut cursor = FetchCursor::new(None);
        cursor.advance([10, 12]);
        let params = cursor.page_params("q", None);

        assert_eq!(params.get("max_id").map(String::as_str), Some("9"));
        assert!(!params.contains_key("since_id"));
        assert!(!params.contains_key("count"));
    }

    #[test]
    fn test_id_zero_is_terminal_not_wraparound() {
        let mut cursor = FetchCursor::new(None);
        assert_eq!(cursor.advance([3, 0, 1]), Advance::Exhausted);
        assert_eq!(cursor.max_id, None);
    }

    #[test]
    fn test_window_closing_on_since_id_is_terminal() {
        let mut cursor = FetchCursor::new(Some(100));
        assert_eq!(cursor.advance([103, 101]), Advance::Exhausted);
        assert_eq!(cursor.max_id, Some(100));
    }

    #[test]
    fn test_page_without_ids_stalls() {
        let mut cursor = FetchCursor::new(None);
        assert_eq!(cursor.advance(std::iter::empty()), Advance::Stalled);
    }

    #[test]
    fn test_page_not_older_than_max_id_stalls() {
        let mut cursor = FetchCursor::new(None);
        cursor.advance([50]);
        assert_eq!(cursor.advance([60, 70]), Advance::Stalled);
        assert_eq!(cursor.max_id, Some(49));
    }

    #[test]
    fn test_reset_clears_upper_bound_only() {
        let mut cursor = FetchCursor::new(Some(7));
        cursor.advance([20]);
        cursor.reset();
        assert_eq!(cursor, FetchCursor::new(Some(7)));
    }
}
