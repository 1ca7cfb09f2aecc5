//! Batch/page arithmetic
//!
//! Maps UI pages onto server batches and back. Everything here is pure and
//! total: no error cases.

/// Largest batch the listing endpoint is ever asked for.
pub const MAX_BATCH_SIZE: u32 = 50;

/// Clamp a requested batch size into `[1, MAX_BATCH_SIZE]`.
pub fn effective_batch_size(requested: u32) -> u32 {
    requested.clamp(1, MAX_BATCH_SIZE)
}

/// Zero-based index of the first item on `page`.
pub fn page_start_index(page: u32, page_size: u32) -> u64 {
    u64::from(page.max(1) - 1) * u64::from(page_size)
}

/// Offset of the batch that contains the first item of `page`.
///
/// Always a multiple of `batch_size` and never greater than the page's start
/// index.
pub fn batch_offset_for_page(page: u32, page_size: u32, batch_size: u32) -> u64 {
    let batch_size = u64::from(batch_size.max(1));
    let start = page_start_index(page, page_size);
    (start / batch_size) * batch_size
}

/// Offsets of every batch that holds part of `page`, first one included.
///
/// A page is covered by a single batch unless it straddles a batch boundary
/// or is larger than a batch.
pub fn batch_offsets_for_page(
    page: u32,
    page_size: u32,
    batch_size: u32,
) -> impl Iterator<Item = u64> {
    let step = u64::from(batch_size.max(1));
    let first = batch_offset_for_page(page, page_size, batch_size);
    let last_index = page_start_index(page, page_size) + u64::from(page_size.max(1)) - 1;
    (first..=last_index).step_by(step as usize)
}

/// Covering offsets of `page` that are worth requesting.
///
/// With a known total only offsets below it are returned. Before the first
/// response only the first covering offset is, since the rest may not exist.
pub fn fetchable_offsets_for_page(
    page: u32,
    page_size: u32,
    batch_size: u32,
    known_total: Option<u64>,
) -> Vec<u64> {
    let offsets = batch_offsets_for_page(page, page_size, batch_size);
    match known_total {
        Some(total) => offsets.take_while(|offset| *offset < total).collect(),
        None => offsets.take(1).collect(),
    }
}

/// Half-open `[begin, end)` range of a page inside the batch at `offset`.
pub fn slice_within_batch(offset: u64, start_index: u64, page_size: u32) -> (usize, usize) {
    let begin = start_index.saturating_sub(offset) as usize;
    (begin, begin + page_size as usize)
}

/// Highest page whose first item is served by the batch at `offset`.
///
/// An empty batch serves nothing, so the answer falls back to the page that
/// ends just before `offset` (page 0 when `offset` is 0).
pub fn last_servable_page(offset: u64, batch_len: usize, page_size: u32) -> u64 {
    let page_size = u64::from(page_size.max(1));
    let end = offset + batch_len as u64;
    if end == 0 {
        return 0;
    }
    (end - 1) / page_size + 1
}

/// Number of pages needed to show `total` items; never less than one.
pub fn total_pages(total: u64, page_size: u32) -> u32 {
    let page_size = u64::from(page_size.max(1));
    let pages = total.div_ceil(page_size).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_batch_size_clamps() {
        assert_eq!(effective_batch_size(0), 1);
        assert_eq!(effective_batch_size(1), 1);
        assert_eq!(effective_batch_size(25), 25);
        assert_eq!(effective_batch_size(50), 50);
        assert_eq!(effective_batch_size(500), 50);
    }

    #[test]
    fn test_batch_offset_examples() {
        assert_eq!(batch_offset_for_page(1, 10, 50), 0);
        assert_eq!(batch_offset_for_page(5, 10, 50), 0);
        assert_eq!(batch_offset_for_page(6, 10, 50), 50);
        assert_eq!(batch_offset_for_page(3, 20, 50), 0);
        assert_eq!(batch_offset_for_page(4, 20, 50), 50);
        assert_eq!(batch_offset_for_page(2, 7, 3), 6);
    }

    #[test]
    fn test_batch_offset_is_aligned_and_not_past_start() {
        for batch_size in 1..=MAX_BATCH_SIZE {
            for page_size in 1..=60 {
                for page in 1..=40 {
                    let offset = batch_offset_for_page(page, page_size, batch_size);
                    let start = page_start_index(page, page_size);
                    assert_eq!(offset % u64::from(batch_size), 0);
                    assert!(offset <= start);
                    assert!(start - offset < u64::from(batch_size));
                }
            }
        }
    }

    #[test]
    fn test_batch_offsets_for_page() {
        assert_eq!(batch_offsets_for_page(6, 10, 50).collect::<Vec<_>>(), vec![50]);
        // items 40..60 straddle the boundary at 50
        assert_eq!(
            batch_offsets_for_page(3, 20, 50).collect::<Vec<_>>(),
            vec![0, 50]
        );
        assert_eq!(
            batch_offsets_for_page(1, 120, 50).collect::<Vec<_>>(),
            vec![0, 50, 100]
        );
    }

    #[test]
    fn test_fetchable_offsets_stop_at_total() {
        assert_eq!(fetchable_offsets_for_page(1, u32::MAX, 50, Some(120)), vec![0, 50, 100]);
        assert_eq!(fetchable_offsets_for_page(1, u32::MAX, 50, None), vec![0]);
        assert_eq!(fetchable_offsets_for_page(3, 20, 50, Some(45)), vec![0]);
        assert!(fetchable_offsets_for_page(20, 10, 50, Some(120)).is_empty());
        assert!(fetchable_offsets_for_page(1, 10, 50, Some(0)).is_empty());
    }

    #[test]
    fn test_slice_within_batch() {
        assert_eq!(slice_within_batch(50, 50, 10), (0, 10));
        assert_eq!(slice_within_batch(50, 70, 10), (20, 30));
        assert_eq!(slice_within_batch(0, 0, 25), (0, 25));
    }

    #[test]
    fn test_last_servable_page() {
        assert_eq!(last_servable_page(0, 50, 10), 5);
        assert_eq!(last_servable_page(50, 50, 10), 10);
        assert_eq!(last_servable_page(0, 7, 10), 1);
        assert_eq!(last_servable_page(0, 50, 20), 3);
        assert_eq!(last_servable_page(0, 0, 10), 0);
        assert_eq!(last_servable_page(50, 0, 10), 5);
    }

    #[test]
    fn test_total_pages_never_zero() {
        assert_eq!(total_pages(0, 10), 1);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(100, 10), 10);
    }
}
