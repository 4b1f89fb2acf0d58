//! Offset pagination shared by the listing queries.

use serde::Serialize;

/// A validated page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: i64,
    per_page: i64,
}

impl PageRequest {
    /// Build a window from optional caller input.
    ///
    /// Pages start at 1; anything lower is treated as the first page. The page
    /// size falls back to `default_per_page` and is clamped to `1..=max_per_page`.
    #[must_use]
    pub fn new(
        page: Option<i64>,
        per_page: Option<i64>,
        default_per_page: i64,
        max_per_page: i64,
    ) -> Self {
        let max = max_per_page.max(1);
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(default_per_page).clamp(1, max),
        }
    }

    /// One-based page number.
    #[must_use]
    pub const fn page(&self) -> i64 { self.page }

    /// Rows per page.
    #[must_use]
    pub const fn per_page(&self) -> i64 { self.per_page }

    /// Rows to skip before this page.
    #[must_use]
    pub const fn offset(&self) -> i64 { (self.page - 1).saturating_mul(self.per_page) }

    /// Wrap a page of rows with its totals.
    #[must_use]
    pub fn wrap<T>(&self, items: Vec<T>, total: i64) -> Page<T> {
        Page {
            items,
            total,
            pages: total_pages(total, self.per_page),
            current_page: self.page,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self { Self::new(None, None, 20, 100) }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    /// Rows on this page.
    pub items: Vec<T>,
    /// Rows matching the query across all pages.
    pub total: i64,
    /// Number of pages at the current page size.
    pub pages: i64,
    /// The requested page number.
    pub current_page: i64,
}

impl<T> Page<T> {
    /// Transform every row while keeping the totals.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            pages: self.pages,
            current_page: self.current_page,
        }
    }
}

const fn total_pages(total: i64, per_page: i64) -> i64 {
    if total <= 0 { 0 } else { (total - 1).div_euclid(per_page) + 1 }
}
