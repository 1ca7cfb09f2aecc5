//! Pagination state and activity phases

use crate::math;
use serde::Serialize;

/// Where the user is and how much there is to page through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationState {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    effective_batch_size: u32,
}

impl PaginationState {
    pub fn new(page_size: u32, requested_batch_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            total: 0,
            effective_batch_size: math::effective_batch_size(requested_batch_size),
        }
    }

    pub fn effective_batch_size(&self) -> u32 {
        self.effective_batch_size
    }

    pub fn total_pages(&self) -> u32 {
        math::total_pages(self.total, self.page_size)
    }

    /// Batches the current page needs, bounded by `known_total`.
    pub fn fetchable_offsets(&self, known_total: Option<u64>) -> Vec<u64> {
        math::fetchable_offsets_for_page(
            self.page,
            self.page_size,
            self.effective_batch_size,
            known_total,
        )
    }

    /// Restore `1 <= page <= total_pages`. Only ever moves the page down.
    #[must_use]
    pub fn clamp(mut self) -> Self {
        let max_page = self.total_pages();
        if self.page > max_page {
            self.page = max_page;
        }
        self.page = self.page.max(1);
        self
    }

    /// Move to `page` without bounds restoration; only zero is lifted to one.
    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    /// New page size always starts over at page 1.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self.page = 1;
        self.clamp()
    }

    #[must_use]
    pub fn with_total(mut self, total: u64) -> Self {
        self.total = total;
        self.clamp()
    }
}

/// Main load axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPhase {
    /// Nothing requested yet.
    Idle,
    /// An on-demand fetch is outstanding.
    Loading,
    Ready,
}

/// Read-ahead axis, orthogonal to [`LoadPhase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefetchPhase {
    NotPrefetching,
    Prefetching,
}

impl LoadPhase {
    pub fn resolve(started: bool, loading: bool) -> Self {
        match (started, loading) {
            (_, true) => LoadPhase::Loading,
            (false, false) => LoadPhase::Idle,
            (true, false) => LoadPhase::Ready,
        }
    }
}

impl PrefetchPhase {
    pub fn resolve(prefetching: bool) -> Self {
        if prefetching {
            PrefetchPhase::Prefetching
        } else {
            PrefetchPhase::NotPrefetching
        }
    }
}
