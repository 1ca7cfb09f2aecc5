//! In-memory batch buffer
//!
//! Holds the most recent batch fetched for each offset plus a claim map that
//! records every offset a fetch has been issued for. Claims are taken before
//! the fetch suspends, which is what keeps two callers from requesting the
//! same offset twice within one epoch.

use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Why a batch is being fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    /// The batch backs the page the user is looking at.
    OnDemand,
    /// Speculative read-ahead.
    Prefetch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    InFlight(FetchKind),
    Settled,
}

/// One server-fetched chunk of items.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    /// Items skipped on the server to produce this batch.
    pub offset: u64,
    /// Effective batch size the batch was requested with.
    pub capacity: u32,
    pub items: Vec<T>,
}

impl<T> Batch<T> {
    pub fn new(offset: u64, capacity: u32, items: Vec<T>) -> Self {
        Self {
            offset,
            capacity,
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Batches keyed by offset, scoped to a fetch epoch.
#[derive(Debug)]
pub struct BatchBuffer<T> {
    batches: BTreeMap<u64, Batch<T>>,
    claims: HashMap<u64, Claim>,
    total: Option<u64>,
    epoch: u64,
}

impl<T> Default for BatchBuffer<T> {
    fn default() -> Self {
        Self {
            batches: BTreeMap::new(),
            claims: HashMap::new(),
            total: None,
            epoch: 0,
        }
    }
}

impl<T> BatchBuffer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current epoch. Bumped by every [`reset`](Self::reset).
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Total reported by the last successful fetch of this epoch.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn needs_fetch(&self, offset: u64) -> bool {
        !self.claims.contains_key(&offset)
    }

    /// Claim `offset` for a fetch. Returns false when it is already claimed.
    pub fn begin_fetch(&mut self, offset: u64, kind: FetchKind) -> bool {
        if self.claims.contains_key(&offset) {
            debug!(offset, ?kind, "fetch already claimed, skipping");
            return false;
        }
        self.claims.insert(offset, Claim::InFlight(kind));
        true
    }

    /// Turn an outstanding prefetch into an on-demand fetch.
    pub fn promote(&mut self, offset: u64) -> bool {
        match self.claims.get_mut(&offset) {
            Some(claim) if *claim == Claim::InFlight(FetchKind::Prefetch) => {
                *claim = Claim::InFlight(FetchKind::OnDemand);
                true
            }
            _ => false,
        }
    }

    /// Store a fetched batch and the total that came with it.
    pub fn commit(&mut self, batch: Batch<T>, total: u64) {
        let offset = batch.offset;
        debug!(offset, items = batch.len(), total, "committing batch");
        self.claims.insert(offset, Claim::Settled);
        self.batches.insert(offset, batch);
        self.total = Some(total);
    }

    /// Forget a failed fetch so the offset can be requested again.
    pub fn rollback(&mut self, offset: u64) {
        debug!(offset, "rolling back fetch claim");
        self.claims.remove(&offset);
    }

    /// Drop every batch and claim and start a new epoch.
    pub fn reset(&mut self) {
        self.batches.clear();
        self.claims.clear();
        self.total = None;
        self.epoch += 1;
        debug!(epoch = self.epoch, "buffer reset");
    }

    pub fn get(&self, offset: u64) -> Option<&Batch<T>> {
        self.batches.get(&offset)
    }

    /// Highest buffered offset together with its batch.
    pub fn last(&self) -> Option<&Batch<T>> {
        self.batches.values().next_back()
    }

    pub fn last_offset(&self) -> Option<u64> {
        self.batches.keys().next_back().copied()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    /// Why `offset` is currently being fetched, if it is. Reflects promotion.
    pub fn in_flight_kind(&self, offset: u64) -> Option<FetchKind> {
        match self.claims.get(&offset) {
            Some(Claim::InFlight(kind)) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.has_in_flight(FetchKind::OnDemand)
    }

    pub fn is_prefetching(&self) -> bool {
        self.has_in_flight(FetchKind::Prefetch)
    }

    fn has_in_flight(&self, kind: FetchKind) -> bool {
        self.claims
            .values()
            .any(|claim| *claim == Claim::InFlight(kind))
    }
}
