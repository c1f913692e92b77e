//! Query execution configuration
//!
//! A [`QueryConfiguration`] is a plain value: every setter consumes the old
//! value and returns a new one. Adapters only ever read it.

use super::parameters::{RequestParameters, SortOrder, DEFAULT_PAGE_SIZE};

/// Resolved skip/take window
///
/// Both halves are always set together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Paging {
    /// Number of records to skip
    pub skip: u64,
    /// Maximum number of records to return
    pub take: u64,
}

impl Paging {
    /// Paging window for a 1-indexed page
    ///
    /// Page numbers below 1 are treated as page 1, and a page size of 0 falls
    /// back to [`DEFAULT_PAGE_SIZE`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use acton_data::query::Paging;
    ///
    /// let page = Paging::page(3, 20);
    /// assert_eq!(page.skip, 40);
    /// assert_eq!(page.take, 20);
    /// ```
    #[must_use]
    pub const fn page(page_number: u64, page_size: u64) -> Self {
        let page_number = if page_number == 0 { 1 } else { page_number };
        let page_size = if page_size == 0 {
            DEFAULT_PAGE_SIZE as u64
        } else {
            page_size
        };
        Self {
            skip: (page_number - 1).saturating_mul(page_size),
            take: page_size,
        }
    }
}

/// Requested sort
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Sorting {
    /// Direction
    pub order: SortOrder,
    /// Field to sort by; sorting is skipped when unset
    pub by: Option<String>,
}

impl Sorting {
    /// The field and direction, when a field is configured
    pub fn field(&self) -> Option<(&str, SortOrder)> {
        self.by.as_deref().map(|field| (field, self.order))
    }
}

/// Execution toggles applied to every query
///
/// # Example
///
/// ```rust
/// use acton_data::query::QueryConfiguration;
///
/// let config = QueryConfiguration::default()
///     .as_no_tracking()
///     .as_paging(2, 10);
///
/// assert!(config.no_tracking);
/// assert_eq!(config.paging.map(|p| p.skip), Some(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct QueryConfiguration {
    /// Do not track returned entities
    pub no_tracking: bool,
    /// Load related collections in separate round-trips
    pub split_query: bool,
    /// Bypass the store's global filters
    pub ignore_global_filter: bool,
    /// Skip/take window, if paging is enabled
    pub paging: Option<Paging>,
    /// Sort, if one was requested
    pub sort: Option<Sorting>,
}

impl QueryConfiguration {
    /// Disable tracking
    #[must_use]
    pub fn as_no_tracking(mut self) -> Self {
        self.no_tracking = true;
        self
    }

    /// Enable tracking
    #[must_use]
    pub fn as_tracking(mut self) -> Self {
        self.no_tracking = false;
        self
    }

    /// Load related collections in separate queries
    #[must_use]
    pub fn as_split_query(mut self) -> Self {
        self.split_query = true;
        self
    }

    /// Load related collections in one joined query
    #[must_use]
    pub fn as_single_query(mut self) -> Self {
        self.split_query = false;
        self
    }

    /// Bypass global filters
    #[must_use]
    pub fn ignore_global_filters(mut self) -> Self {
        self.ignore_global_filter = true;
        self
    }

    /// Apply global filters again
    #[must_use]
    pub fn include_global_filter(mut self) -> Self {
        self.ignore_global_filter = false;
        self
    }

    /// Page through results, 1-indexed
    #[must_use]
    pub fn as_paging(mut self, page_number: u32, page_size: u32) -> Self {
        self.paging = Some(Paging::page(u64::from(page_number), u64::from(page_size)));
        self
    }

    /// Page through results using request parameters
    #[must_use]
    pub fn as_paging_with(self, params: &RequestParameters) -> Self {
        self.as_paging(params.page_number(), params.page_size())
    }

    /// Disable paging
    #[must_use]
    pub fn without_paging(mut self) -> Self {
        self.paging = None;
        self
    }

    /// Sort results
    ///
    /// Without a field the direction is remembered but no ordering is applied.
    #[must_use]
    pub fn as_sorting(mut self, order: SortOrder, by: Option<String>) -> Self {
        self.sort = Some(Sorting {
            order,
            by: by.filter(|field| !field.is_empty()),
        });
        self
    }

    /// The configured sort field and direction, if any
    pub fn sort_field(&self) -> Option<(&str, SortOrder)> {
        self.sort.as_ref().and_then(Sorting::field)
    }

    /// Skip count, if paging is enabled
    pub fn skip(&self) -> Option<u64> {
        self.paging.map(|p| p.skip)
    }

    /// Take count, if paging is enabled
    pub fn take(&self) -> Option<u64> {
        self.paging.map(|p| p.take)
    }
}
