use serde::Serialize;

use crate::{Result, StoreError};

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    /// Default number of items per page.
    pub const DEFAULT_PAGE_SIZE: u32 = 10;

    /// Creates a page request. Both `page` and `page_size` must be at least 1.
    pub fn new(page: u32, page_size: u32) -> Result<Self> {
        if page == 0 || page_size == 0 {
            return Err(StoreError::InvalidPage { page, page_size });
        }
        Ok(Self { page, page_size })
    }

    /// Requests the first page with the default page size.
    pub fn first() -> Self {
        Self {
            page: 1,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of items to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    /// Maximum number of items to return.
    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first()
    }
}

/// One page of results together with the counts needed to navigate.
///
/// A page past the end holds no items but still reports the true totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    /// Assembles a page from the fetched items and the unpaginated count.
    pub fn new(items: Vec<T>, request: PageRequest, total_items: u64) -> Self {
        let total_pages = total_items.div_ceil(request.limit());
        let page = u64::from(request.page());
        Self {
            items,
            page: request.page(),
            page_size: request.page_size(),
            total_items,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }

    /// Maps the items, keeping the navigation counts.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total_items: self.total_items,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_prev: self.has_prev,
        }
    }
}
