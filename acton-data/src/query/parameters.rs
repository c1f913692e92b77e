//! Request parameter objects
//!
//! Immutable value objects describing which page of which ordering a caller
//! wants. They normalize their input on construction (and on deserialization),
//! and render their state as a stable string for cache-key composition.
//!
//! # Example
//!
//! ```rust
//! use acton_data::query::{Deconstruct, RequestParameters, SortOrder, SortedRequestParameters};
//!
//! let params = RequestParameters::new(0, 500);
//! assert_eq!(params.page_number(), 1);
//! assert_eq!(params.page_size(), 10);
//!
//! let sorted = SortedRequestParameters::new(2, 5, SortOrder::Asc, Some("name".to_string()));
//! assert_eq!(
//!     sorted.deconstruct(false),
//!     "pageNumber:2:pageSize:5:sortOrder:Asc:sortOrderBy:name:"
//! );
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::PagingConfig;

/// Page size used when the requested size is out of range
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page size a caller may request
pub const MAX_PAGE_SIZE: u32 = 20;

/// Sort direction
///
/// Descending ("newest first") is the default everywhere.
///
/// # Example
///
/// ```rust
/// use acton_data::query::SortOrder;
///
/// assert_eq!(SortOrder::default(), SortOrder::Desc);
/// assert_eq!(format!("{}", SortOrder::Asc), "Asc");
/// assert_eq!(SortOrder::Desc.as_sql(), "DESC");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    /// Sort in descending order (Z-A, 9-0, newest first)
    #[default]
    #[serde(alias = "desc", alias = "DESC")]
    Desc,
    /// Sort in ascending order (A-Z, 0-9, oldest first)
    #[serde(alias = "asc", alias = "ASC")]
    Asc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Desc => write!(f, "Desc"),
            Self::Asc => write!(f, "Asc"),
        }
    }
}

impl SortOrder {
    /// Convert to SQL ORDER BY clause fragment
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Stable string rendering of a parameter object
///
/// With `with_type_name` set, the outermost layer inserts a type marker before
/// its own fields so that differently-shaped parameter objects never collide.
pub trait Deconstruct {
    /// Render the object state
    fn deconstruct(&self, with_type_name: bool) -> String;
}

fn normalize_page_number(page_number: i64) -> u32 {
    page_number.clamp(1, i64::from(u32::MAX)) as u32
}

fn normalize_page_size(page_size: i64, limits: &PagingConfig) -> u32 {
    if page_size < 1 || page_size > i64::from(limits.max_page_size) {
        limits.default_page_size
    } else {
        page_size as u32
    }
}

/// Paging request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawPaging")]
pub struct RequestParameters {
    page_number: u32,
    page_size: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPaging {
    page_number: Option<i64>,
    page_size: Option<i64>,
}

impl From<RawPaging> for RequestParameters {
    fn from(raw: RawPaging) -> Self {
        Self::new(
            raw.page_number.unwrap_or(1),
            raw.page_size.unwrap_or(i64::from(DEFAULT_PAGE_SIZE)),
        )
    }
}

impl Default for RequestParameters {
    fn default() -> Self {
        Self {
            page_number: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl RequestParameters {
    /// Create paging parameters with the built-in limits
    ///
    /// A page number below 1 becomes 1; a page size outside `1..=20` becomes 10.
    #[must_use]
    pub fn new(page_number: i64, page_size: i64) -> Self {
        Self::with_limits(page_number, page_size, &PagingConfig::default())
    }

    /// Create paging parameters with configured limits
    #[must_use]
    pub fn with_limits(page_number: i64, page_size: i64, limits: &PagingConfig) -> Self {
        Self {
            page_number: normalize_page_number(page_number),
            page_size: normalize_page_size(page_size, limits),
        }
    }

    /// Requested page, 1-indexed
    #[must_use]
    pub const fn page_number(&self) -> u32 {
        self.page_number
    }

    /// Requested page size
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of records to skip
    #[must_use]
    pub fn skip(&self) -> u64 {
        u64::from(self.page_number.saturating_sub(1)) * u64::from(self.page_size)
    }
}

impl Deconstruct for RequestParameters {
    fn deconstruct(&self, with_type_name: bool) -> String {
        format!(
            "{}pageNumber:{}:pageSize:{}:",
            if with_type_name { "requestparameters:" } else { "" },
            self.page_number,
            self.page_size
        )
    }
}

/// Paging request with a sort
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawSorted")]
pub struct SortedRequestParameters {
    #[serde(flatten)]
    paging: RequestParameters,
    sort_order: SortOrder,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort_order_by: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSorted {
    #[serde(flatten)]
    paging: RawPaging,
    #[serde(default)]
    sort_order: SortOrder,
    sort_order_by: Option<String>,
}

impl From<RawSorted> for SortedRequestParameters {
    fn from(raw: RawSorted) -> Self {
        Self {
            paging: raw.paging.into(),
            sort_order: raw.sort_order,
            sort_order_by: raw.sort_order_by.filter(|field| !field.is_empty()),
        }
    }
}

impl SortedRequestParameters {
    /// Create sorted paging parameters with the built-in limits
    #[must_use]
    pub fn new(
        page_number: i64,
        page_size: i64,
        sort_order: SortOrder,
        sort_order_by: Option<String>,
    ) -> Self {
        Self::from_paging(
            RequestParameters::new(page_number, page_size),
            sort_order,
            sort_order_by,
        )
    }

    /// Attach a sort to existing paging parameters
    #[must_use]
    pub fn from_paging(
        paging: RequestParameters,
        sort_order: SortOrder,
        sort_order_by: Option<String>,
    ) -> Self {
        Self {
            paging,
            sort_order,
            sort_order_by: sort_order_by.filter(|field| !field.is_empty()),
        }
    }

    /// The paging part
    #[must_use]
    pub const fn paging(&self) -> &RequestParameters {
        &self.paging
    }

    /// Requested page, 1-indexed
    #[must_use]
    pub const fn page_number(&self) -> u32 {
        self.paging.page_number
    }

    /// Requested page size
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.paging.page_size
    }

    /// Sort direction
    #[must_use]
    pub const fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    /// Field to sort by, if any
    #[must_use]
    pub fn sort_order_by(&self) -> Option<&str> {
        self.sort_order_by.as_deref()
    }
}

impl Deconstruct for SortedRequestParameters {
    fn deconstruct(&self, with_type_name: bool) -> String {
        let mut rendered = self.paging.deconstruct(false);
        if with_type_name {
            rendered.push_str("requestparameterswithsort:");
        }
        rendered.push_str(&format!("sortOrder:{}", self.sort_order));
        if let Some(field) = &self.sort_order_by {
            rendered.push_str(&format!(":sortOrderBy:{}", field));
        }
        rendered.push(':');
        rendered
    }
}

/// Sorted paging request with a free-text search term
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequestParameters {
    #[serde(flatten)]
    sorted: SortedRequestParameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    search_term: Option<String>,
}

impl SearchRequestParameters {
    /// Attach a search term to sorted paging parameters
    #[must_use]
    pub fn new(sorted: SortedRequestParameters, search_term: Option<String>) -> Self {
        Self {
            sorted,
            search_term,
        }
    }

    /// The sorted paging part
    #[must_use]
    pub const fn sorted(&self) -> &SortedRequestParameters {
        &self.sorted
    }

    /// The search term, if any
    #[must_use]
    pub fn search_term(&self) -> Option<&str> {
        self.search_term.as_deref()
    }
}

impl Deconstruct for SearchRequestParameters {
    fn deconstruct(&self, with_type_name: bool) -> String {
        format!(
            "{}{}searchTerm:{}:",
            self.sorted.deconstruct(false),
            if with_type_name { "requestParameterWithSearch:" } else { "" },
            self.search_term.as_deref().unwrap_or_default()
        )
    }
}

/// Sort request for unpaged listings
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortParameters {
    #[serde(default)]
    sort_order: SortOrder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sort_order_by: Option<String>,
}

impl SortParameters {
    /// Create a sort request
    #[must_use]
    pub fn new(sort_order: SortOrder, sort_order_by: Option<String>) -> Self {
        Self {
            sort_order,
            sort_order_by: sort_order_by.filter(|field| !field.is_empty()),
        }
    }

    /// Sort direction
    #[must_use]
    pub const fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    /// Field to sort by, if any
    #[must_use]
    pub fn sort_order_by(&self) -> Option<&str> {
        self.sort_order_by.as_deref()
    }
}

impl Deconstruct for SortParameters {
    fn deconstruct(&self, _with_type_name: bool) -> String {
        format!(
            "sortOrder:{}:sortOrderBy:{}:",
            self.sort_order,
            self.sort_order_by.as_deref().unwrap_or_default()
        )
    }
}
