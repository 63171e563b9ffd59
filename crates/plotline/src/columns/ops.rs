//! Derived-column operator slots.
//!
//! ## Purpose
//!
//! Each dataset carries a bounded bank of operator slots. An armed slot
//! owns one derived column (column index = primary count + slot index)
//! and describes how its cells are produced from other columns, together
//! with whatever running state the operator needs between streaming
//! refreshes.
//!
//! ## Design notes
//!
//! Operators are a tagged variant dispatched once per refresh pass, not
//! per row. The stateful kinds persist their running state in `f64` so a
//! resumed pass continues bit-identically to a single full pass.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

// Internal dependencies
use crate::storage::dataset::Source;

/// Highest polynomial degree the fit evaluator accepts.
///
/// One degree-`n` fit feeds `n + 2` columns into the solver, which caps
/// out at [`crate::math::lse::FULL_MAX`].
pub const POLY_MAX: usize = 8;

/// Pairwise combination applied sample by sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Subtract,
    Add,
    Multiply,
    /// `sqrt(a*a + b*b)`.
    Hypot,
}

/// One armed operator, with per-kind parameters and running state.
#[derive(Debug, Clone, Copy)]
pub enum SlotOp {
    /// `x * scale + offset`.
    Scale {
        source: Source,
        scale: f64,
        offset: f64,
    },
    /// Pairwise combination of two sources.
    Binary {
        op: BinaryOp,
        a: Source,
        b: Source,
    },
    /// Monotonic unwrap of a wrapping or glitching clock column.
    ///
    /// A backward step adds the gap to a cumulative offset; a backward
    /// step following a one-sample spike also swallows the spike, using
    /// a two-sample history.
    TimeUnwrap {
        source: Source,
        offset: f64,
        prev: f64,
        prev2: f64,
    },
    /// Current minus previous sample.
    Difference { source: Source, prev: f64 },
    /// Running sum; non-finite samples leave the sum unchanged.
    Cumulative { source: Source, sum: f64 },
    /// Extract the inclusive bit range `low..=high` of the sample's
    /// integer value, shifted down to bit zero.
    Bitmask {
        source: Source,
        low: u32,
        high: u32,
    },
    /// One-pole low-pass `y += (x - y) * gain`, seeded by the first
    /// finite sample.
    LowPass {
        source: Source,
        gain: f64,
        state: f64,
    },
    /// One-shot linear interpolation of another dataset's (X, Y) samples
    /// onto this dataset's X grid. Not refreshed by streaming passes.
    Resample {
        x: Source,
        in_dataset: usize,
        in_x: Source,
        in_y: Source,
    },
    /// Horner evaluation of fitted polynomial coefficients.
    Polyfit {
        x: Source,
        coefs: [f64; POLY_MAX + 1],
        degree: usize,
    },
}

impl SlotOp {
    /// Does this operator read `column` of its own dataset?
    pub fn reads(&self, column: usize) -> bool {
        let col = Source::Col(column);
        match *self {
            SlotOp::Scale { source, .. }
            | SlotOp::TimeUnwrap { source, .. }
            | SlotOp::Difference { source, .. }
            | SlotOp::Cumulative { source, .. }
            | SlotOp::Bitmask { source, .. }
            | SlotOp::LowPass { source, .. } => source == col,
            SlotOp::Binary { a, b, .. } => a == col || b == col,
            SlotOp::Resample { x, .. } | SlotOp::Polyfit { x, .. } => x == col,
        }
    }
}

// ============================================================================
// Slot Bank
// ============================================================================

/// The operator slots of one dataset.
#[derive(Debug, Default)]
pub struct SlotBank {
    slots: Vec<Option<SlotOp>>,
}

impl SlotBank {
    pub fn new(slots: usize) -> Self {
        Self {
            slots: alloc_slots(slots),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }

    pub fn get(&self, slot: usize) -> Option<&SlotOp> {
        self.slots.get(slot)?.as_ref()
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut SlotOp> {
        self.slots.get_mut(slot)?.as_mut()
    }

    /// First unarmed slot.
    pub fn free_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.is_none())
    }

    pub fn arm(&mut self, slot: usize, op: SlotOp) {
        self.slots[slot] = Some(op);
    }

    pub fn release(&mut self, slot: usize) {
        if let Some(s) = self.slots.get_mut(slot) {
            *s = None;
        }
    }

    pub fn clear(&mut self) {
        for s in self.slots.iter_mut() {
            *s = None;
        }
    }

    /// Armed slots and their indices.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &SlotOp)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|op| (i, op)))
    }

    /// Existing scale slot with identical parameters (dedup on reuse).
    pub fn find_scale(&self, source: Source, scale: f64, offset: f64) -> Option<usize> {
        self.iter().find_map(|(i, op)| match *op {
            SlotOp::Scale {
                source: s,
                scale: sc,
                offset: of,
            } if s == source && sc == scale && of == offset => Some(i),
            _ => None,
        })
    }

    /// Existing time-unwrap slot over the same source.
    pub fn find_unwrap(&self, source: Source) -> Option<usize> {
        self.iter().find_map(|(i, op)| match *op {
            SlotOp::TimeUnwrap { source: s, .. } if s == source => Some(i),
            _ => None,
        })
    }

    /// Does any armed slot read `column`?
    pub fn references(&self, column: usize) -> bool {
        self.iter().any(|(_, op)| op.reads(column))
    }
}

fn alloc_slots(slots: usize) -> Vec<Option<SlotOp>> {
    let mut v = Vec::with_capacity(slots);
    v.resize(slots, None);
    v
}
