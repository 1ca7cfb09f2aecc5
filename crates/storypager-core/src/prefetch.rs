//! Read-ahead scheduling
//!
//! After every page derivation the scheduler looks at how far the buffered
//! tail reaches. When the current page is within `threshold` pages of it, the
//! batch after the tail is requested speculatively.

use crate::buffer::BatchBuffer;
use crate::math;
use crate::state::PaginationState;

pub const DEFAULT_PREFETCH_THRESHOLD: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchScheduler {
    threshold: u32,
}

impl Default for PrefetchScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_PREFETCH_THRESHOLD)
    }
}

impl PrefetchScheduler {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    /// Offset to prefetch next, if any.
    ///
    /// Never returns an offset at or past `state.total`, nor one that is
    /// already claimed in the buffer.
    pub fn next_prefetch<T>(&self, buffer: &BatchBuffer<T>, state: &PaginationState) -> Option<u64> {
        let tail = buffer.last()?;
        let last_page = math::last_servable_page(tail.offset, tail.len(), state.page_size);
        let distance = last_page as i64 - i64::from(state.page);
        if distance > i64::from(self.threshold) {
            return None;
        }

        let next = tail.offset + u64::from(state.effective_batch_size());
        if next >= state.total || !buffer.needs_fetch(next) {
            return None;
        }
        Some(next)
    }
}
