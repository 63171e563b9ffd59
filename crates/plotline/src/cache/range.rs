//! Per-chunk range summaries.
//!
//! ## Purpose
//!
//! Autoscaling, culling and nearest-sample lookup all need finite min/max
//! bounds over a column. Scanning millions of retained rows per query is
//! not workable, so bounds are summarized per chunk and cached in a small
//! pool of slots keyed by (dataset, source column).
//!
//! ## Key concepts
//!
//! * **Trust but re-verify the tail**: a chunk marked `computed` is
//!   trusted without rescanning, except the chunk holding the ring tail,
//!   which may still be receiving writes and is always re-scanned with
//!   its prior bounds carried in.
//! * **Wipe memo**: writes invalidate the touched chunk in every slot of
//!   the dataset. Consecutive writes into the same chunk coalesce through
//!   a single-entry memo, reset whenever a fetch recomputes.
//! * **Conditional ranges**: `range_cond` restricts one column's bounds
//!   to rows whose condition column lands in [0,1] under an affine
//!   window. Chunk bounds of both columns let whole chunks be skipped
//!   (provably outside) or folded in without scanning (provably inside).
//!
//! ## Invariants
//!
//! * A slot with `cached` set holds the exact finite min/max over all
//!   retained rows of its column at the time of the last fetch.
//! * Non-finite values never enter any bound.
//! * Slot reuse is round-robin; losing a slot costs a rescan, never
//!   correctness.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

// Internal dependencies
use crate::math::affine::Affine;
use crate::primitives::value::Real;
use crate::storage::dataset::{Dataset, Source};

// ============================================================================
// Accumulator
// ============================================================================

/// Running finite min/max over any number of merge calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeAcc {
    started: bool,
    min: f64,
    max: f64,
}

impl RangeAcc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one finite value in.
    #[inline]
    pub fn include(&mut self, v: f64) {
        if self.started {
            self.min = if v < self.min { v } else { self.min };
            self.max = if v > self.max { v } else { self.max };
        } else {
            self.started = true;
            self.min = v;
            self.max = v;
        }
    }

    /// Fold a closed interval in.
    #[inline]
    pub fn include_span(&mut self, lo: f64, hi: f64) {
        self.include(lo);
        self.include(hi);
    }

    pub fn is_empty(&self) -> bool {
        !self.started
    }

    /// Observed bounds, `(0, 0)` when nothing was folded in.
    pub fn bounds(&self) -> (f64, f64) {
        if self.started {
            (self.min, self.max)
        } else {
            (0.0, 0.0)
        }
    }
}

// ============================================================================
// Slots
// ============================================================================

/// Summary of one chunk's retained rows.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChunkStat<T> {
    pub computed: bool,
    pub finite: bool,
    pub min: T,
    pub max: T,
}

impl<T: Real> Default for ChunkStat<T> {
    fn default() -> Self {
        Self {
            computed: false,
            finite: false,
            min: T::default(),
            max: T::default(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct RangeSlot<T> {
    pub busy: bool,
    pub dataset: usize,
    pub source: Source,
    /// Aggregate bounds valid.
    pub cached: bool,
    pub min: T,
    pub max: T,
    pub chunks: Vec<ChunkStat<T>>,
}

impl<T: Real> RangeSlot<T> {
    fn vacant() -> Self {
        Self {
            busy: false,
            dataset: 0,
            source: Source::RowId,
            cached: false,
            min: T::default(),
            max: T::default(),
            chunks: Vec::new(),
        }
    }
}

// ============================================================================
// Range Cache
// ============================================================================

/// Pool of per-(dataset, column) chunk summaries.
#[derive(Debug)]
pub struct RangeCache<T: Real> {
    pub(crate) slots: Vec<RangeSlot<T>>,
    cursor: usize,
    /// Last (dataset, chunk) wiped; coalesces repeated wipes.
    memo: Option<(usize, usize)>,
}

impl<T: Real> RangeCache<T> {
    pub fn new(slots: usize) -> Self {
        let mut pool = Vec::with_capacity(slots.max(1));
        pool.resize_with(slots.max(1), RangeSlot::vacant);
        Self {
            slots: pool,
            cursor: 0,
            memo: None,
        }
    }

    /// Slot currently bound to (dataset, source), if any.
    fn lookup(&self, dataset: usize, source: Source) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.busy && s.dataset == dataset && s.source == source)
    }

    /// Invalidate one chunk of a dataset in every bound slot.
    ///
    /// Repeated wipes of the same chunk are coalesced until the next
    /// fetch.
    pub fn wipe_chunk(&mut self, dataset: usize, chunk: usize) {
        if self.memo == Some((dataset, chunk)) {
            return;
        }
        for slot in self.slots.iter_mut() {
            if slot.busy && slot.dataset == dataset {
                if let Some(entry) = slot.chunks.get_mut(chunk) {
                    entry.computed = false;
                }
                slot.cached = false;
            }
        }
        self.memo = Some((dataset, chunk));
    }

    /// Drop every slot bound to a dataset (structural change).
    pub fn drop_dataset(&mut self, dataset: usize) {
        for slot in self.slots.iter_mut() {
            if slot.dataset == dataset {
                slot.busy = false;
            }
        }
    }

    /// Drop slots covering derived columns of a dataset (slot re-armed
    /// or freed).
    pub fn drop_derived(&mut self, dataset: usize, primary: usize) {
        for slot in self.slots.iter_mut() {
            if slot.busy && slot.dataset == dataset {
                if let Source::Col(c) = slot.source {
                    if c >= primary {
                        slot.busy = false;
                    }
                }
            }
        }
    }

    /// Ensure bounds for (dataset, source) are current; returns the slot.
    ///
    /// Walks retained rows chunk-run by chunk-run. Computed chunks are
    /// trusted except the tail chunk, whose prior bounds are carried in
    /// and merged with a fresh scan of its retained rows.
    pub fn fetch(&mut self, data: &mut Dataset<T>, dataset: usize, source: Source) -> usize {
        let x = match self.lookup(dataset, source) {
            Some(x) => {
                if self.slots[x].cached {
                    return x;
                }
                x
            }
            None => {
                let x = self.cursor;
                self.cursor = (self.cursor + 1) % self.slots.len();
                for entry in self.slots[x].chunks.iter_mut() {
                    *entry = ChunkStat::default();
                }
                x
            }
        };

        let chunks = data.layout().chunks_for(data.length());
        if self.slots[x].chunks.len() < chunks {
            self.slots[x].chunks.resize(chunks, ChunkStat::default());
        }

        let tail_chunk = data.tail_chunk();
        let mut agg = RangeAcc::new();
        let mut id = data.head_id();
        let tail = data.tail_id();

        while id < tail {
            let (pos, len) = match data.run(id) {
                Some(run) => run,
                None => break,
            };
            let k = data.layout().chunk_of(pos);
            let entry = self.slots[x].chunks[k];

            let scan = !entry.computed || k == tail_chunk;
            if scan {
                let mut finite = entry.computed && entry.finite;
                let mut lo = entry.min;
                let mut hi = entry.max;

                let base = data.layout().chunk_base(k);
                let stride = data.stride();
                let slab = match data.chunk_cells(k) {
                    Some(slab) => slab,
                    None => break,
                };
                for r in 0..len {
                    let v = match source {
                        Source::RowId => T::from_f64((id + r as u64) as f64),
                        Source::Col(c) => slab[(pos - base + r) * stride + c],
                    };
                    if v.is_finite() {
                        if finite {
                            lo = if v < lo { v } else { lo };
                            hi = if v > hi { v } else { hi };
                        } else {
                            finite = true;
                            lo = v;
                            hi = v;
                        }
                    }
                }

                let entry = &mut self.slots[x].chunks[k];
                entry.computed = true;
                entry.finite = finite;
                if finite {
                    entry.min = lo;
                    entry.max = hi;
                }
            }

            let entry = self.slots[x].chunks[k];
            if entry.finite {
                agg.include_span(entry.min.as_f64(), entry.max.as_f64());
            }
            id += len as u64;
        }

        let (lo, hi) = agg.bounds();
        let slot = &mut self.slots[x];
        slot.busy = true;
        slot.dataset = dataset;
        slot.source = source;
        slot.cached = true;
        slot.min = T::from_f64(lo);
        slot.max = T::from_f64(hi);

        self.memo = None;
        x
    }

    /// Finite bounds of a column over all retained rows.
    pub fn range(&mut self, data: &mut Dataset<T>, dataset: usize, source: Source) -> (f64, f64) {
        let x = self.fetch(data, dataset, source);
        (self.slots[x].min.as_f64(), self.slots[x].max.as_f64())
    }

    /// Fold in the bounds of `source` restricted to rows whose `cond`
    /// value lands in [0,1] under `window`.
    ///
    /// Chunk summaries of both columns classify whole chunks: provably
    /// outside chunks are skipped, provably inside chunks contribute
    /// their cached bounds, the rest are scanned row by row.
    pub fn range_cond(
        &mut self,
        data: &mut Dataset<T>,
        dataset: usize,
        source: Source,
        cond: Source,
        window: Affine<f64>,
        acc: &mut RangeAcc,
    ) {
        let xc = self.fetch(data, dataset, cond);
        let xs = self.fetch(data, dataset, source);

        let mut id = data.head_id();
        let tail = data.tail_id();

        while id < tail {
            let (pos, len) = match data.run(id) {
                Some(run) => run,
                None => break,
            };
            let k = data.layout().chunk_of(pos);

            let centry = self.slots[xc].chunks.get(k).copied().unwrap_or_default();
            let sentry = self.slots[xs].chunks.get(k).copied().unwrap_or_default();

            let mut scan = true;
            if centry.computed {
                if centry.finite {
                    let a = window.apply(centry.min.as_f64());
                    let b = window.apply(centry.max.as_f64());
                    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };

                    if sentry.computed && lo >= 0.0 && hi <= 1.0 {
                        scan = false;
                        if sentry.finite {
                            acc.include_span(sentry.min.as_f64(), sentry.max.as_f64());
                        }
                    } else if lo > 1.0 || hi < 0.0 {
                        scan = false;
                    }
                } else {
                    scan = false;
                }
            }

            if scan {
                let base = data.layout().chunk_base(k);
                let stride = data.stride();
                let slab = match data.chunk_cells(k) {
                    Some(slab) => slab,
                    None => break,
                };
                for r in 0..len {
                    let off = (pos - base + r) * stride;
                    let rid = id + r as u64;
                    let v = match source {
                        Source::RowId => rid as f64,
                        Source::Col(c) => slab[off + c].as_f64(),
                    };
                    let c = match cond {
                        Source::RowId => rid as f64,
                        Source::Col(c) => slab[off + c].as_f64(),
                    };
                    let c = window.apply(c);
                    if (0.0..=1.0).contains(&c) && v.is_finite() {
                        acc.include(v);
                    }
                }
            }

            id += len as u64;
        }
    }
}
