//! Incremental derived-column refresh.
//!
//! ## Purpose
//!
//! Brings derived columns up to date as rows arrive. A streaming refresh
//! resumes every armed slot from the dataset's resume cursor; arming a
//! slot (or structural change) triggers a full pass from the head with
//! operator state reset.
//!
//! ## Design notes
//!
//! * Passes are slot-major: each slot walks its whole id range before
//!   the next slot runs, so an operator reading another derived column
//!   sees that column fully refreshed.
//! * A resumed pass continues from persisted state and produces exactly
//!   the cells a single full pass would have produced, for every stateful
//!   kind.
//! * Every cell written invalidates that chunk's range summaries through
//!   the wipe protocol.
//!
//! ## Edge cases
//!
//! * Resample slots are one-shot: they recompute on full passes only and
//!   ignore streaming refreshes.
//! * A row whose chunk is absent ends the pass early; remaining rows
//!   keep their previous derived cells.

// External dependencies
use log::error;
use num_traits::Float;

// Internal dependencies
use crate::cache::range::RangeCache;
use crate::columns::ops::{BinaryOp, SlotBank, SlotOp, POLY_MAX};
use crate::primitives::errors::PlotError;
use crate::primitives::value::Real;
use crate::storage::dataset::{Dataset, Source};

/// Sample a source out of a borrowed row.
#[inline]
fn src_val<T: Real>(row: &[T], id: u64, source: Source) -> T {
    match source {
        Source::RowId => T::from_f64(id as f64),
        Source::Col(c) => row[c],
    }
}

/// Walk `start..tail`, computing one derived cell per row.
///
/// Ends early when a row's chunk is absent.
fn pass<T: Real>(
    data: &mut [Dataset<T>],
    rcache: &mut RangeCache<T>,
    d: usize,
    col: usize,
    start: u64,
    mut f: impl FnMut(&[T], u64) -> T,
) {
    let tail = data[d].tail_id();
    for id in start..tail {
        let v = {
            let row = match data[d].read_row(id) {
                Some(row) => row,
                None => break,
            };
            f(row, id)
        };
        match data[d].write_cell(id, col, v) {
            Some(k) => rcache.wipe_chunk(d, k),
            None => break,
        }
    }
}

// ============================================================================
// Refresh Passes
// ============================================================================

/// Refresh every armed slot over the rows inserted since the last
/// streaming refresh, then advance the resume cursor.
pub fn refresh_streaming<T: Real>(
    data: &mut [Dataset<T>],
    banks: &mut [SlotBank],
    rcache: &mut RangeCache<T>,
    d: usize,
) {
    if !data[d].is_allocated() {
        return;
    }
    let start = data[d].sub_resume();
    let tail = data[d].tail_id();
    data[d].set_sub_resume(tail);

    for slot in 0..banks[d].len() {
        refresh_one(data, banks, rcache, d, slot, start);
    }
}

/// Fully recompute one slot from the head, resetting its state.
pub fn refresh_slot<T: Real>(
    data: &mut [Dataset<T>],
    banks: &mut [SlotBank],
    rcache: &mut RangeCache<T>,
    d: usize,
    slot: usize,
) {
    let start = data[d].head_id();
    refresh_one(data, banks, rcache, d, slot, start);
}

fn refresh_one<T: Real>(
    data: &mut [Dataset<T>],
    banks: &mut [SlotBank],
    rcache: &mut RangeCache<T>,
    d: usize,
    slot: usize,
    start: u64,
) {
    let op = match banks[d].get(slot) {
        Some(op) => *op,
        None => return,
    };
    let col = data[d].columns() + slot;
    let from_head = start == data[d].head_id();

    match op {
        SlotOp::Scale {
            source,
            scale,
            offset,
        } => {
            pass(data, rcache, d, col, start, |row, id| {
                T::from_f64(src_val(row, id, source).as_f64() * scale + offset)
            });
        }

        SlotOp::Binary { op, a, b } => {
            pass(data, rcache, d, col, start, |row, id| {
                let x = src_val(row, id, a);
                let y = src_val(row, id, b);
                match op {
                    BinaryOp::Subtract => x - y,
                    BinaryOp::Add => x + y,
                    BinaryOp::Multiply => x * y,
                    BinaryOp::Hypot => {
                        let (x, y) = (x.as_f64(), y.as_f64());
                        T::from_f64(Float::sqrt(x * x + y * y))
                    }
                }
            });
        }

        SlotOp::TimeUnwrap {
            source,
            offset,
            prev,
            prev2,
        } => {
            let mut off = offset;
            let mut prev = T::from_f64(prev);
            let mut prev2 = T::from_f64(prev2);
            if from_head {
                off = 0.0;
                prev = T::nan();
                prev2 = T::nan();
            }
            pass(data, rcache, d, col, start, |row, id| {
                let x = src_val(row, id, source);
                if x < prev {
                    off += (prev - x).as_f64();
                    if prev2 < prev {
                        off += (prev - prev2).as_f64();
                    }
                }
                let out = T::from_f64(x.as_f64() + off);
                if x.is_finite() {
                    prev2 = prev;
                    prev = x;
                }
                out
            });
            banks[d].arm(
                slot,
                SlotOp::TimeUnwrap {
                    source,
                    offset: off,
                    prev: prev.as_f64(),
                    prev2: prev2.as_f64(),
                },
            );
        }

        SlotOp::Difference { source, prev } => {
            let mut prev = T::from_f64(prev);
            if from_head {
                prev = T::nan();
            }
            pass(data, rcache, d, col, start, |row, id| {
                let x = src_val(row, id, source);
                let out = x - prev;
                prev = x;
                out
            });
            banks[d].arm(
                slot,
                SlotOp::Difference {
                    source,
                    prev: prev.as_f64(),
                },
            );
        }

        SlotOp::Cumulative { source, sum } => {
            let mut sum = T::from_f64(sum);
            if from_head {
                sum = T::zero();
            }
            pass(data, rcache, d, col, start, |row, id| {
                let x = src_val(row, id, source);
                if x.is_finite() {
                    sum = sum + x;
                }
                sum
            });
            banks[d].arm(
                slot,
                SlotOp::Cumulative {
                    source,
                    sum: sum.as_f64(),
                },
            );
        }

        SlotOp::Bitmask { source, low, high } => {
            let mask = mask_bits(low, high);
            pass(data, rcache, d, col, start, |row, id| {
                let bits = src_val(row, id, source).as_f64() as u64;
                T::from_f64(((bits & mask) >> low) as f64)
            });
        }

        SlotOp::LowPass {
            source,
            gain,
            state,
        } => {
            let mut y = T::from_f64(state);
            if from_head {
                y = T::nan();
            }
            pass(data, rcache, d, col, start, |row, id| {
                let x = src_val(row, id, source);
                if x.is_finite() {
                    if y.is_finite() {
                        y = T::from_f64(y.as_f64() + (x - y).as_f64() * gain);
                    } else {
                        y = x;
                    }
                }
                y
            });
            banks[d].arm(
                slot,
                SlotOp::LowPass {
                    source,
                    gain,
                    state: y.as_f64(),
                },
            );
        }

        SlotOp::Resample {
            x,
            in_dataset,
            in_x,
            in_y,
        } => {
            // One-shot; streaming rows keep stale cells until the next
            // full pass.
            if from_head {
                resample_into(data, rcache, d, x, col, in_dataset, in_x, in_y);
            }
        }

        SlotOp::Polyfit { x, coefs, degree } => {
            pass(data, rcache, d, col, start, |row, id| {
                let xv = src_val(row, id, x).as_f64();
                let mut acc = coefs[degree];
                for i in (0..degree).rev() {
                    acc = acc * xv + coefs[i];
                }
                T::from_f64(acc)
            });
        }
    }
}

/// Inclusive bit range `low..=high` as a mask; empty when `low > high`.
fn mask_bits(low: u32, high: u32) -> u64 {
    let mut mask = 0u64;
    let mut bit = high.min(63);
    loop {
        if bit < low {
            break;
        }
        mask |= 1u64 << bit;
        if bit == 0 {
            break;
        }
        bit -= 1;
    }
    mask
}

// ============================================================================
// Resample
// ============================================================================

/// Linearly interpolate a source dataset's (X, Y) samples onto the
/// target dataset's X grid, writing into `col`.
///
/// X values outside the source span extend flat; non-finite target X
/// yields NaN. Both cursors advance monotonically, so the whole pass is
/// linear in the two datasets' lengths.
pub fn resample_into<T: Real>(
    data: &mut [Dataset<T>],
    rcache: &mut RangeCache<T>,
    d: usize,
    x: Source,
    col: usize,
    in_dataset: usize,
    in_x: Source,
    in_y: Source,
) {
    let r_tail = data[in_dataset].tail_id();
    let mut r_id = data[in_dataset].head_id();

    // Seek the first sample with a usable X.
    let mut rx = T::nan();
    let mut ry = T::nan();
    let mut advanced = false;

    while r_id < r_tail {
        let pair = {
            let row = match data[in_dataset].read_row(r_id) {
                Some(row) => row,
                None => break,
            };
            (src_val(row, r_id, in_x), src_val(row, r_id, in_y))
        };
        rx = pair.0;
        ry = pair.1;
        r_id += 1;
        advanced = true;
        if !rx.is_nan() {
            break;
        }
    }

    if !advanced {
        error!("no rows to resample from dataset {}", in_dataset);
        return;
    }

    let mut px = rx;
    let mut py = ry;

    let start = data[d].head_id();
    let tail = data[d].tail_id();

    for id in start..tail {
        let xv = {
            let row = match data[d].read_row(id) {
                Some(row) => row,
                None => break,
            };
            src_val(row, id, x)
        };

        let y = if xv.is_finite() {
            loop {
                if rx >= xv || r_id >= r_tail {
                    break;
                }
                let pair = {
                    let row = match data[in_dataset].read_row(r_id) {
                        Some(row) => row,
                        None => break,
                    };
                    (src_val(row, r_id, in_x), src_val(row, r_id, in_y))
                };
                if rx.is_finite() {
                    px = rx;
                    py = ry;
                }
                rx = pair.0;
                ry = pair.1;
                r_id += 1;
            }

            if rx >= xv {
                if px <= xv {
                    let q = (xv - px) / (rx - px);
                    py + (ry - py) * q
                } else {
                    py
                }
            } else {
                ry
            }
        } else {
            T::nan()
        };

        match data[d].write_cell(id, col, y) {
            Some(k) => rcache.wipe_chunk(d, k),
            None => break,
        }
    }
}

// ============================================================================
// Slot Constructors
// ============================================================================

fn check_source<T: Real>(data: &Dataset<T>, source: Source) -> Result<(), PlotError> {
    match source {
        Source::RowId => Ok(()),
        Source::Col(c) if c < data.stride() => Ok(()),
        Source::Col(c) => Err(PlotError::ColumnIndex {
            got: c,
            span: data.stride(),
        }),
    }
}

fn take_slot<T: Real>(
    data: &mut [Dataset<T>],
    banks: &mut [SlotBank],
    rcache: &mut RangeCache<T>,
    d: usize,
    op: SlotOp,
) -> Result<usize, PlotError> {
    let slot = banks[d]
        .free_slot()
        .ok_or(PlotError::NoFreeSlot { dataset: d })?;
    banks[d].arm(slot, op);
    rcache.drop_derived(d, data[d].columns());
    refresh_slot(data, banks, rcache, d, slot);
    Ok(data[d].columns() + slot)
}

/// Get or create a scale column; identical parameters reuse the slot.
pub fn get_scale<T: Real>(
    data: &mut [Dataset<T>],
    banks: &mut [SlotBank],
    rcache: &mut RangeCache<T>,
    d: usize,
    source: Source,
    scale: f64,
    offset: f64,
) -> Result<usize, PlotError> {
    check_source(&data[d], source)?;
    if let Some(slot) = banks[d].find_scale(source, scale, offset) {
        return Ok(data[d].columns() + slot);
    }
    take_slot(
        data,
        banks,
        rcache,
        d,
        SlotOp::Scale {
            source,
            scale,
            offset,
        },
    )
}

/// Get or create a time-unwrap column over a source.
pub fn get_unwrap<T: Real>(
    data: &mut [Dataset<T>],
    banks: &mut [SlotBank],
    rcache: &mut RangeCache<T>,
    d: usize,
    source: Source,
) -> Result<usize, PlotError> {
    check_source(&data[d], source)?;
    if let Some(slot) = banks[d].find_unwrap(source) {
        return Ok(data[d].columns() + slot);
    }
    take_slot(
        data,
        banks,
        rcache,
        d,
        SlotOp::TimeUnwrap {
            source,
            offset: 0.0,
            prev: f64::NAN,
            prev2: f64::NAN,
        },
    )
}

/// Create a binary combination column.
pub fn get_binary<T: Real>(
    data: &mut [Dataset<T>],
    banks: &mut [SlotBank],
    rcache: &mut RangeCache<T>,
    d: usize,
    op: BinaryOp,
    a: Source,
    b: Source,
) -> Result<usize, PlotError> {
    check_source(&data[d], a)?;
    check_source(&data[d], b)?;
    take_slot(data, banks, rcache, d, SlotOp::Binary { op, a, b })
}

/// Create a difference (current minus previous) column.
pub fn get_difference<T: Real>(
    data: &mut [Dataset<T>],
    banks: &mut [SlotBank],
    rcache: &mut RangeCache<T>,
    d: usize,
    source: Source,
) -> Result<usize, PlotError> {
    check_source(&data[d], source)?;
    take_slot(
        data,
        banks,
        rcache,
        d,
        SlotOp::Difference {
            source,
            prev: f64::NAN,
        },
    )
}

/// Create a running-sum column.
pub fn get_cumulative<T: Real>(
    data: &mut [Dataset<T>],
    banks: &mut [SlotBank],
    rcache: &mut RangeCache<T>,
    d: usize,
    source: Source,
) -> Result<usize, PlotError> {
    check_source(&data[d], source)?;
    take_slot(data, banks, rcache, d, SlotOp::Cumulative { source, sum: 0.0 })
}

/// Create a bit-range extraction column over `low..=high`.
pub fn get_bitmask<T: Real>(
    data: &mut [Dataset<T>],
    banks: &mut [SlotBank],
    rcache: &mut RangeCache<T>,
    d: usize,
    source: Source,
    low: u32,
    high: u32,
) -> Result<usize, PlotError> {
    check_source(&data[d], source)?;
    if high > 63 || low > high {
        return Err(PlotError::BitRange { low, high });
    }
    take_slot(data, banks, rcache, d, SlotOp::Bitmask { source, low, high })
}

/// Create a one-pole low-pass column with the given gain.
pub fn get_lowpass<T: Real>(
    data: &mut [Dataset<T>],
    banks: &mut [SlotBank],
    rcache: &mut RangeCache<T>,
    d: usize,
    source: Source,
    gain: f64,
) -> Result<usize, PlotError> {
    check_source(&data[d], source)?;
    take_slot(
        data,
        banks,
        rcache,
        d,
        SlotOp::LowPass {
            source,
            gain,
            state: f64::NAN,
        },
    )
}

/// Create a resample column interpolating another dataset onto this X
/// grid. Always takes a fresh slot.
pub fn get_resample<T: Real>(
    data: &mut [Dataset<T>],
    banks: &mut [SlotBank],
    rcache: &mut RangeCache<T>,
    d: usize,
    x: Source,
    in_dataset: usize,
    in_x: Source,
    in_y: Source,
) -> Result<usize, PlotError> {
    check_source(&data[d], x)?;
    check_source(&data[in_dataset], in_x)?;
    check_source(&data[in_dataset], in_y)?;
    take_slot(
        data,
        banks,
        rcache,
        d,
        SlotOp::Resample {
            x,
            in_dataset,
            in_x,
            in_y,
        },
    )
}

/// Create a polynomial evaluation column from fitted coefficients.
pub fn get_polyfit<T: Real>(
    data: &mut [Dataset<T>],
    banks: &mut [SlotBank],
    rcache: &mut RangeCache<T>,
    d: usize,
    x: Source,
    coefs: &[f64],
) -> Result<usize, PlotError> {
    check_source(&data[d], x)?;
    if coefs.is_empty() || coefs.len() > POLY_MAX + 1 {
        return Err(PlotError::DegreeTooHigh {
            got: coefs.len().saturating_sub(1),
            max: POLY_MAX,
        });
    }
    let mut packed = [0.0; POLY_MAX + 1];
    packed[..coefs.len()].copy_from_slice(coefs);
    take_slot(
        data,
        banks,
        rcache,
        d,
        SlotOp::Polyfit {
            x,
            coefs: packed,
            degree: coefs.len() - 1,
        },
    )
}

// ============================================================================
// Garbage Collection
// ============================================================================

/// Free slots whose columns nothing references, to a fixpoint.
///
/// `pinned` reports whether a column index is referenced from outside
/// the bank (figures). Freeing one slot can unpin another's source, so
/// rounds repeat until nothing moves.
pub fn collect_garbage(bank: &mut SlotBank, primary: usize, pinned: impl Fn(usize) -> bool) {
    loop {
        let mut freed = 0;
        for slot in 0..bank.len() {
            if bank.get(slot).is_some() {
                let col = primary + slot;
                if !pinned(col) && !bank.references(col) {
                    bank.release(slot);
                    freed += 1;
                }
            }
        }
        if freed == 0 {
            break;
        }
    }
}
