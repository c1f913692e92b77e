//! Paged query results

use serde::{Deserialize, Serialize};

/// One page of results with paging metadata
///
/// `total_pages` is computed once at construction.
///
/// # Example
///
/// ```rust
/// use acton_data::query::PagedResult;
///
/// let page = PagedResult::new(vec![6, 7, 8, 9, 10], 2, 5, 12);
/// assert_eq!(page.total_pages, 3);
/// assert!(page.has_next());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResult<T> {
    /// Records on this page
    pub items: Vec<T>,
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Requested page size
    pub page_size: u32,
    /// Total number of matching records across all pages
    pub total_records: u64,
    /// Number of pages needed for `total_records`
    pub total_pages: u64,
}

impl<T> PagedResult<T> {
    /// Create a page, deriving `total_pages`
    #[must_use]
    pub fn new(items: Vec<T>, page_number: u32, page_size: u32, total_records: u64) -> Self {
        Self {
            items,
            page_number,
            page_size,
            total_records,
            total_pages: calculate_total_pages(total_records, page_size),
        }
    }

    /// An empty first page
    #[must_use]
    pub fn empty(page_size: u32) -> Self {
        Self::new(Vec::new(), 1, page_size, 0)
    }

    /// Whether a later page exists
    pub fn has_next(&self) -> bool {
        u64::from(self.page_number) < self.total_pages
    }

    /// Whether an earlier page exists
    pub fn has_previous(&self) -> bool {
        self.page_number > 1
    }

    /// Transform the items, keeping the paging metadata
    pub fn map<U, F>(self, f: F) -> PagedResult<U>
    where
        F: FnMut(T) -> U,
    {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            page_number: self.page_number,
            page_size: self.page_size,
            total_records: self.total_records,
            total_pages: self.total_pages,
        }
    }
}

/// Ceiling division with a page size of zero treated as one
fn calculate_total_pages(total: u64, page_size: u32) -> u64 {
    let page_size = u64::from(page_size.max(1));
    total.div_ceil(page_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(calculate_total_pages(0, 10), 0);
        assert_eq!(calculate_total_pages(1, 10), 1);
        assert_eq!(calculate_total_pages(10, 10), 1);
        assert_eq!(calculate_total_pages(11, 10), 2);
        assert_eq!(calculate_total_pages(12, 5), 3);
        assert_eq!(calculate_total_pages(7, 0), 7);
    }

    #[test]
    fn test_total_pages_matches_ceiling_for_many_sizes() {
        for size in 1..=25_u32 {
            for total in 0..=100_u64 {
                let expected = (total as f64 / f64::from(size)).ceil() as u64;
                assert_eq!(calculate_total_pages(total, size), expected);
            }
        }
    }

    #[test]
    fn test_navigation() {
        let first = PagedResult::new(vec![1, 2], 1, 2, 5);
        assert!(first.has_next());
        assert!(!first.has_previous());

        let last = PagedResult::new(vec![5], 3, 2, 5);
        assert!(!last.has_next());
        assert!(last.has_previous());
    }

    #[test]
    fn test_empty() {
        let page: PagedResult<i32> = PagedResult::empty(10);
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_next());
    }

    #[test]
    fn test_map_keeps_metadata() {
        let page = PagedResult::new(vec![1, 2, 3], 2, 3, 9).map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20, 30]);
        assert_eq!(page.page_number, 2);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn test_serialize_camel_case() {
        let page = PagedResult::new(vec!["a"], 1, 10, 1);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["pageNumber"], 1);
        assert_eq!(json["pageSize"], 10);
        assert_eq!(json["totalRecords"], 1);
        assert_eq!(json["totalPages"], 1);
        assert_eq!(json["items"][0], "a");
    }
}
