//! # Pagination
//!
//! Normalizes `page` / `page_size` query parameters and wraps list results.
//!
//! ## Rules
//! - `page < 1` → `1`
//! - `page_size` outside `[1, 100]` → `10`
//! - `offset = (page - 1) * page_size`, saturating at `i64::MAX`

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// A normalized page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    /// Builds a page request from raw (possibly missing) parameters.
    ///
    /// ## Example
    /// ```rust
    /// use mall_core::pagination::PageRequest;
    ///
    /// let p = PageRequest::new(Some(0), Some(500));
    /// assert_eq!((p.page, p.page_size), (1, 10));
    /// assert_eq!(PageRequest::new(Some(3), Some(20)).offset(), 40);
    /// ```
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        let (page, page_size) = normalize(
            page.unwrap_or(DEFAULT_PAGE),
            page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        );
        PageRequest { page, page_size }
    }

    #[inline]
    pub fn offset(&self) -> i64 {
        offset(self.page, self.page_size)
    }

    #[inline]
    pub fn limit(&self) -> i64 {
        self.page_size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Clamps `page` to at least 1 and resets an out-of-range `page_size`.
pub fn normalize(page: i64, page_size: i64) -> (i64, i64) {
    let page = if page < 1 { DEFAULT_PAGE } else { page };
    let page_size = if (1..=MAX_PAGE_SIZE).contains(&page_size) {
        page_size
    } else {
        DEFAULT_PAGE_SIZE
    };
    (page, page_size)
}

/// Row offset of the first item on `page`. Pages past the addressable
/// range land on `i64::MAX` and read as empty.
#[inline]
pub fn offset(page: i64, page_size: i64) -> i64 {
    page.saturating_sub(1).saturating_mul(page_size)
}

/// One page of results.
///
/// Serialized as `{list, total, page, page_size}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub list: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

impl<T> Page<T> {
    pub fn new(list: Vec<T>, total: i64, request: PageRequest) -> Self {
        Page {
            list,
            total,
            page: request.page,
            page_size: request.page_size,
        }
    }

    /// Converts the items, keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            list: self.list.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}
