//! Query parameters, execution configuration and paged results

mod configuration;
mod paged;
mod parameters;

pub use configuration::{Paging, QueryConfiguration, Sorting};
pub use paged::PagedResult;
pub use parameters::{
    Deconstruct, RequestParameters, SearchRequestParameters, SortOrder, SortParameters,
    SortedRequestParameters, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
