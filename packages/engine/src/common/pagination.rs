//! Offset pagination for owner-scoped listings.
//!
//! Listings fetch one row more than the requested page size; the overflow
//! row is trimmed off and only its existence is kept, as `has_more`. That
//! answers "is there a next page" without a second query.

use serde::{Deserialize, Serialize};

/// Page size applied when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Upper bound on page size; larger requests are clamped, not rejected.
pub const MAX_PAGE_SIZE: u32 = 100;

/// A validated page request. `page` is 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}

impl PageRequest {
    /// Builds a request, clamping `per_page` into `1..=MAX_PAGE_SIZE`.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page,
            per_page: per_page.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// The first page at the default size.
    pub fn first() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Row offset for the backing query.
    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.per_page)
    }

    /// Row limit for the backing query: one extra row to detect a next page.
    pub fn fetch_limit(&self) -> i64 {
        i64::from(self.per_page) + 1
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first()
    }
}

/// One page of results. `total` is filled only by listings that run a
/// count query; `has_more` is always meaningful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub has_more: bool,
    pub total: Option<i64>,
}

impl<T> Paged<T> {
    /// Builds a page from rows fetched with [`PageRequest::fetch_limit`],
    /// trimming the overflow row.
    pub fn from_overfetched(request: PageRequest, mut items: Vec<T>) -> Self {
        let has_more = items.len() as u32 > request.per_page();
        items.truncate(request.per_page() as usize);
        Self {
            items,
            page: request.page(),
            per_page: request.per_page(),
            has_more,
            total: None,
        }
    }

    /// Attaches the full result-set count from a separate count query.
    pub fn with_total(mut self, total: i64) -> Self {
        self.total = Some(total);
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_page_is_clamped_to_bounds() {
        assert_eq!(PageRequest::new(0, 0).per_page(), 1);
        assert_eq!(PageRequest::new(0, 5000).per_page(), MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(0, 50).per_page(), 50);
    }

    #[test]
    fn offset_and_limit_follow_the_page() {
        let request = PageRequest::new(3, 25);
        assert_eq!(request.offset(), 75);
        assert_eq!(request.fetch_limit(), 26);
    }

    #[test]
    fn overflow_row_becomes_has_more() {
        let request = PageRequest::new(0, 2);
        let paged = Paged::from_overfetched(request, vec![1, 2, 3]);
        assert_eq!(paged.items, vec![1, 2]);
        assert!(paged.has_more);
    }

    #[test]
    fn exact_fit_has_no_next_page() {
        let request = PageRequest::new(0, 2);
        let paged = Paged::from_overfetched(request, vec![1, 2]);
        assert_eq!(paged.items, vec![1, 2]);
        assert!(!paged.has_more);
    }

    #[test]
    fn empty_result_is_an_empty_page() {
        let paged: Paged<i32> = Paged::from_overfetched(PageRequest::first(), vec![]);
        assert!(paged.is_empty());
        assert!(!paged.has_more);
        assert_eq!(paged.total, None);
    }

    #[test]
    fn with_total_keeps_items_and_records_count() {
        let request = PageRequest::new(0, 2);
        let paged = Paged::from_overfetched(request, vec![1, 2, 3]).with_total(7);
        assert_eq!(paged.items, vec![1, 2]);
        assert!(paged.has_more);
        assert_eq!(paged.total, Some(7));
    }
}
