//! Paged listing session
//!
//! [`PagedListing`] owns one batch buffer and drives it from page, page-size
//! and filter changes. State lives behind a single mutex that is never held
//! across an `.await`; fetches claim their offset before suspending, so two
//! callers never request the same batch twice within an epoch.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use storypager_core::{
    derive_page, Batch, BatchBuffer, FetchKind, FilterError, LoadPhase, PaginationState,
    PrefetchPhase, PrefetchScheduler, RequestFilters, DEFAULT_PREFETCH_THRESHOLD, MAX_BATCH_SIZE,
};
use storypager_http::{
    EndpointError, FetchError, FetchGate, HeadersProvider, HttpClient, ReqwestHttpClient,
};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Anything a listing can hold.
pub trait ListingItem: DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> ListingItem for T where T: DeserializeOwned + Clone + Send + Sync + 'static {}

/// Caller mistakes rejected before any I/O.
#[derive(Debug, Error)]
pub enum ListingError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    #[error("invalid listing filters: {0}")]
    Filters(#[from] FilterError),
}

#[derive(Debug, Clone)]
pub struct ListingOptions {
    pub page_size: u32,
    /// Requested batch size; clamped to `[1, 50]`.
    pub batch_size: u32,
    pub prefetch_threshold: u32,
    pub filters: RequestFilters,
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            page_size: 10,
            batch_size: MAX_BATCH_SIZE,
            prefetch_threshold: DEFAULT_PREFETCH_THRESHOLD,
            filters: RequestFilters::new(),
        }
    }
}

/// What the rendering layer sees.
#[derive(Debug, Clone, Serialize)]
pub struct ListingSnapshot<T> {
    pub items_for_page: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u32,
    pub load_phase: LoadPhase,
    pub prefetch_phase: PrefetchPhase,
    pub is_loading: bool,
    pub is_prefetching: bool,
    /// Sticky until the next successful fetch.
    pub unauthorized: bool,
    /// Last failure of a batch the current page needs. Read-ahead failures
    /// are only logged.
    #[serde(skip)]
    pub last_error: Option<FetchError>,
}

impl<T> ListingSnapshot<T> {
    pub fn has_next_page(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous_page(&self) -> bool {
        self.page > 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchOutcome {
    /// Already claimed, past the known end, or the session is closed.
    Skipped,
    Committed,
    Failed,
    /// Completed after a reset or teardown; result dropped.
    Discarded,
}

struct SessionState<T> {
    buffer: BatchBuffer<T>,
    pagination: PaginationState,
    filters: RequestFilters,
    started: bool,
    unauthorized: bool,
    last_error: Option<FetchError>,
    closed: bool,
}

impl<T: Clone> SessionState<T> {
    fn snapshot(&self) -> ListingSnapshot<T> {
        let pagination = self.pagination;
        let is_loading = self.buffer.is_loading();
        let is_prefetching = self.buffer.is_prefetching();
        ListingSnapshot {
            items_for_page: derive_page(
                pagination.page,
                pagination.page_size,
                pagination.effective_batch_size(),
                &self.buffer,
            ),
            page: pagination.page,
            page_size: pagination.page_size,
            total: pagination.total,
            total_pages: pagination.total_pages(),
            load_phase: LoadPhase::resolve(self.started, is_loading),
            prefetch_phase: PrefetchPhase::resolve(is_prefetching),
            is_loading,
            is_prefetching,
            unauthorized: self.unauthorized,
            last_error: self.last_error.clone(),
        }
    }

    fn current_page_offsets(&self) -> Vec<u64> {
        self.pagination.fetchable_offsets(self.buffer.total())
    }

    /// Errors are only reported for batches the visible page is waiting on.
    fn backs_current_page(&self, offset: u64) -> bool {
        self.buffer.in_flight_kind(offset) == Some(FetchKind::OnDemand)
            || self.current_page_offsets().contains(&offset)
    }

    fn reset(&mut self) {
        self.buffer.reset();
        self.last_error = None;
    }
}

struct Shared<T, C: HttpClient> {
    gate: FetchGate<C>,
    scheduler: PrefetchScheduler,
    state: Mutex<SessionState<T>>,
    snapshots: watch::Sender<ListingSnapshot<T>>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: ListingItem, C: HttpClient + 'static> Shared<T, C> {
    fn publish(&self, state: &SessionState<T>) {
        self.snapshots.send_replace(state.snapshot());
    }

    async fn fetch_offset(&self, offset: u64, kind: FetchKind) -> FetchOutcome {
        let (epoch, filters) = {
            let mut state = self.state.lock();
            if state.closed {
                return FetchOutcome::Skipped;
            }
            if matches!(state.buffer.total(), Some(total) if offset >= total) {
                debug!(offset, "offset past the end of the listing, not fetching");
                return FetchOutcome::Skipped;
            }
            if !state.buffer.begin_fetch(offset, kind) {
                if kind == FetchKind::OnDemand && state.buffer.promote(offset) {
                    debug!(offset, "prefetch in flight now backs the current page");
                    self.publish(&state);
                }
                return FetchOutcome::Skipped;
            }
            state.started = true;
            self.publish(&state);
            (state.buffer.epoch(), state.filters.clone())
        };

        let result = self.gate.fetch::<T>(offset, &filters).await;

        let mut state = self.state.lock();
        if state.closed || state.buffer.epoch() != epoch {
            debug!(offset, epoch, "dropping result from a stale fetch");
            return FetchOutcome::Discarded;
        }

        let visible = state.backs_current_page(offset);
        let outcome = match result {
            Ok(batch) => {
                let capacity = self.gate.batch_size();
                state
                    .buffer
                    .commit(Batch::new(offset, capacity, batch.items), batch.total);
                state.pagination = state.pagination.with_total(batch.total);
                state.unauthorized = false;
                if visible {
                    state.last_error = None;
                }
                FetchOutcome::Committed
            }
            Err(err) => {
                state.buffer.rollback(offset);
                if err.is_unauthorized() {
                    warn!(offset, "listing requires authentication");
                    state.unauthorized = true;
                } else {
                    warn!(
                        offset,
                        fetch = ?kind,
                        error_kind = err.kind(),
                        error = %err,
                        "listing fetch failed"
                    );
                }
                if visible {
                    state.last_error = Some(err);
                }
                FetchOutcome::Failed
            }
        };
        self.publish(&state);
        outcome
    }

    /// Fetch whatever the current page still needs, then look ahead.
    ///
    /// A commit can clamp the page down, so the page's offsets are re-read
    /// after every fetch. Each offset is tried at most once per call.
    async fn ensure_current_page(self: &Arc<Self>) {
        let mut tried = HashSet::new();
        loop {
            let next = self
                .state
                .lock()
                .current_page_offsets()
                .into_iter()
                .find(|offset| !tried.contains(offset));
            let Some(offset) = next else {
                break;
            };
            tried.insert(offset);
            self.fetch_offset(offset, FetchKind::OnDemand).await;
        }
        self.schedule_prefetch();
    }

    fn schedule_prefetch(self: &Arc<Self>) {
        let next = {
            let state = self.state.lock();
            if state.closed {
                return;
            }
            self.scheduler
                .next_prefetch(&state.buffer, &state.pagination)
        };
        let Some(offset) = next else {
            return;
        };

        debug!(offset, "scheduling prefetch");
        let shared = Arc::clone(self);
        let handle = tokio::spawn(async move {
            if shared.fetch_offset(offset, FetchKind::Prefetch).await == FetchOutcome::Committed {
                shared.schedule_prefetch();
            }
        });

        let mut background = self.background.lock();
        background.retain(|task| !task.is_finished());
        background.push(handle);
    }

    /// Start a new epoch. Callers hold the lock for the whole change that
    /// motivates the reset.
    fn begin_reload(&self, state: &mut SessionState<T>) {
        state.reset();
        info!(
            endpoint = self.gate.endpoint(),
            epoch = state.buffer.epoch(),
            filters = %state.filters.serialized(),
            "reloading listing"
        );
        self.publish(state);
    }

    /// Refetch offset 0, then whatever the (possibly clamped) page needs.
    async fn refill(self: &Arc<Self>) {
        if self.fetch_offset(0, FetchKind::OnDemand).await == FetchOutcome::Committed {
            self.ensure_current_page().await;
        }
    }

    async fn reload(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            self.begin_reload(&mut state);
        }
        self.refill().await;
    }
}

/// Buffered, prefetching view over one listing endpoint.
pub struct PagedListing<T = serde_json::Value, C: HttpClient + 'static = ReqwestHttpClient>
where
    T: ListingItem,
{
    shared: Arc<Shared<T, C>>,
}

impl<T: ListingItem, C: HttpClient + 'static> PagedListing<T, C> {
    /// Build an idle session. Nothing is fetched until [`refresh`](Self::refresh)
    /// or a page change.
    pub fn new(
        http: C,
        endpoint: &str,
        options: ListingOptions,
        headers: Arc<dyn HeadersProvider>,
    ) -> Result<Self, ListingError> {
        options.filters.validate()?;
        let gate = FetchGate::new(http, endpoint, options.batch_size, headers)?;
        let state = SessionState {
            buffer: BatchBuffer::new(),
            pagination: PaginationState::new(options.page_size, options.batch_size),
            filters: options.filters,
            started: false,
            unauthorized: false,
            last_error: None,
            closed: false,
        };
        let (snapshots, _) = watch::channel(state.snapshot());

        Ok(Self {
            shared: Arc::new(Shared {
                gate,
                scheduler: PrefetchScheduler::new(options.prefetch_threshold),
                state: Mutex::new(state),
                snapshots,
                background: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Build a session and load the first batch.
    pub async fn open(
        http: C,
        endpoint: &str,
        options: ListingOptions,
        headers: Arc<dyn HeadersProvider>,
    ) -> Result<Self, ListingError> {
        let listing = Self::new(http, endpoint, options, headers)?;
        listing.refresh().await;
        Ok(listing)
    }

    pub fn snapshot(&self) -> ListingSnapshot<T> {
        self.shared.state.lock().snapshot()
    }

    /// Receive a fresh snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<ListingSnapshot<T>> {
        self.shared.snapshots.subscribe()
    }

    pub fn page(&self) -> u32 {
        self.shared.state.lock().pagination.page
    }

    pub fn page_size(&self) -> u32 {
        self.shared.state.lock().pagination.page_size
    }

    pub fn total(&self) -> u64 {
        self.shared.state.lock().pagination.total
    }

    pub fn batch_size(&self) -> u32 {
        self.shared.gate.batch_size()
    }

    pub fn filters(&self) -> RequestFilters {
        self.shared.state.lock().filters.clone()
    }

    /// Move to `page` and make sure its batch is buffered.
    ///
    /// The page is not clamped here; bounds are restored when the total or
    /// page size changes. Fetch failures leave the page empty rather than
    /// erroring. Returns early when another caller already has the batch in
    /// flight; watch [`subscribe`](Self::subscribe) for its arrival.
    pub async fn set_page(&self, page: u32) {
        {
            let mut state = self.shared.state.lock();
            if state.closed {
                return;
            }
            state.pagination = state.pagination.with_page(page);
            self.shared.publish(&state);
        }
        self.shared.ensure_current_page().await;
    }

    /// Change the page size. Always returns to page 1.
    pub async fn set_page_size(&self, page_size: u32) {
        {
            let mut state = self.shared.state.lock();
            if state.closed {
                return;
            }
            state.pagination = state.pagination.with_page_size(page_size);
            self.shared.publish(&state);
        }
        self.shared.ensure_current_page().await;
    }

    /// Replace the filters. A different serialized form drops the buffer and
    /// reloads from offset 0; an equivalent one is a no-op.
    pub async fn set_filters(&self, filters: RequestFilters) -> Result<(), ListingError> {
        filters.validate()?;
        {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Ok(());
            }
            let unchanged = state.filters.serialized() == filters.serialized();
            state.filters = filters;
            if unchanged {
                return Ok(());
            }
            self.shared.begin_reload(&mut state);
        }
        self.shared.refill().await;
        Ok(())
    }

    /// Drop everything buffered and reload from offset 0.
    ///
    /// Resolves once the reload has settled, successfully or not. Afterwards
    /// the page is clamped down if the listing shrank.
    pub async fn refresh(&self) {
        self.shared.reload().await;
    }

    pub async fn next_page(&self) {
        let snapshot = self.snapshot();
        if snapshot.has_next_page() {
            self.set_page(snapshot.page + 1).await;
        }
    }

    pub async fn previous_page(&self) {
        let snapshot = self.snapshot();
        if snapshot.has_previous_page() {
            self.set_page(snapshot.page - 1).await;
        }
    }

    /// Wait for background prefetches, including the ones they schedule.
    pub async fn settle(&self) {
        loop {
            let handles = std::mem::take(&mut *self.shared.background.lock());
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "prefetch task did not complete");
                }
            }
        }
    }

    /// Tear the session down. In-flight fetches run to completion but their
    /// results are dropped.
    pub fn close(&self) {
        let mut state = self.shared.state.lock();
        if !state.closed {
            debug!("closing listing session");
            state.closed = true;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }
}

impl<T: ListingItem, C: HttpClient + 'static> Drop for PagedListing<T, C> {
    fn drop(&mut self) {
        self.close();
    }
}
