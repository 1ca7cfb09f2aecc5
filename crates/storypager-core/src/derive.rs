//! Page derivation
//!
//! Computes what to render for a page from whatever is buffered. Never
//! fetches; callers are responsible for having requested the batches.

use crate::buffer::BatchBuffer;
use crate::math;

/// Items of `page`, read from the buffered batches that cover it.
///
/// Returns an empty vector when the page's first batch is absent. When a page
/// spans several batches, the result stops at the first batch that is missing
/// or short.
pub fn derive_page<T: Clone>(
    page: u32,
    page_size: u32,
    batch_size: u32,
    buffer: &BatchBuffer<T>,
) -> Vec<T> {
    let page_size = page_size.max(1);
    let start = math::page_start_index(page, page_size);
    let end = start + u64::from(page_size);
    let mut items = Vec::new();

    for offset in math::batch_offsets_for_page(page, page_size, batch_size) {
        let Some(batch) = buffer.get(offset) else {
            break;
        };

        let from = start.max(offset);
        let wanted = (end - from) as u32;
        let (begin, finish) = math::slice_within_batch(offset, from, wanted);
        let finish = finish.min(batch.len());
        if begin < finish {
            items.extend_from_slice(&batch.items[begin..finish]);
        }

        if batch.len() < batch.capacity as usize {
            break;
        }
    }

    items
}
