//! Pagination request/response shapes.

use crate::error::{CoreError, CoreResult, FieldError};

pub const DEFAULT_ITEMS_PER_PAGE: u32 = 10;

/// 1-indexed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub items_per_page: u32,
}

impl Page {
    /// Builds a page request, rejecting `page == 0` and `items_per_page == 0`.
    pub fn new(page: u32, items_per_page: u32) -> CoreResult<Self> {
        let mut errors = Vec::new();
        if page == 0 {
            errors.push(FieldError::new("page", "must be at least 1"));
        }
        if items_per_page == 0 {
            errors.push(FieldError::new("items_per_page", "must be at least 1"));
        }
        if !errors.is_empty() {
            return Err(CoreError::Validation(errors));
        }
        Ok(Self {
            page,
            items_per_page,
        })
    }

    /// Number of rows to skip: `(page - 1) * items_per_page`.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.items_per_page)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.items_per_page)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
        }
    }
}

/// One page of results plus the total row count across all pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paged<T> {
    pub total_count: u64,
    pub items: Vec<T>,
}

impl<T> Paged<T> {
    pub fn empty() -> Self {
        Self {
            total_count: 0,
            items: Vec::new(),
        }
    }
}
