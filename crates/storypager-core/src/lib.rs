// storypager-core - Paging model without I/O
//
// Batch/page arithmetic, the per-session batch buffer, page derivation and
// the prefetch heuristic. Everything in this crate is synchronous; the
// session in the root crate drives it from async fetches.

pub mod buffer;
pub mod derive;
pub mod filters;
pub mod math;
pub mod prefetch;
pub mod state;

pub use buffer::{Batch, BatchBuffer, FetchKind};
pub use derive::derive_page;
pub use filters::{FilterError, FilterValue, RequestFilters};
pub use math::MAX_BATCH_SIZE;
pub use prefetch::{PrefetchScheduler, DEFAULT_PREFETCH_THRESHOLD};
pub use state::{LoadPhase, PaginationState, PrefetchPhase};
