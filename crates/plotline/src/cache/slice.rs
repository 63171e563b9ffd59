//! Nearest-sample lookup by coordinate.
//!
//! Finds the retained row whose column value lies closest to a probe
//! value, scanning only the chunks whose cached bounds straddle the probe
//! (capped at a few chunks) and falling back to the chunk whose bounds
//! come nearest when none straddle.

// Internal dependencies
use crate::primitives::value::Real;
use crate::storage::dataset::{Dataset, Source};

use crate::cache::range::RangeCache;

impl<T: Real> RangeCache<T> {
    /// Logical id of the row whose `source` value is nearest to `value`.
    ///
    /// At most `span_cap` straddling chunks are scanned per lookup; the
    /// result is exact within the scanned chunks and a close
    /// approximation beyond them.
    pub fn slice_nearest(
        &mut self,
        data: &mut Dataset<T>,
        dataset: usize,
        source: Source,
        value: f64,
        span_cap: usize,
    ) -> Option<u64> {
        let x = self.fetch(data, dataset, source);

        let mut best: Option<(f64, u64)> = None;
        let mut rep: Option<(f64, usize)> = None;
        let mut span = 0;

        let mut id = data.head_id();
        let tail = data.tail_id();

        while id < tail {
            let (pos, len) = match data.run(id) {
                Some(run) => run,
                None => break,
            };
            let k = data.layout().chunk_of(pos);
            let entry = self.slots[x].chunks.get(k).copied().unwrap_or_default();

            let mut scan = true;
            if entry.computed {
                if entry.finite {
                    let lo = entry.min.as_f64();
                    let hi = entry.max.as_f64();
                    if value < lo || value > hi {
                        scan = false;
                        let d = f64::min((lo - value).abs(), (hi - value).abs());
                        rep = match rep {
                            Some((near, _)) if near <= d => rep,
                            _ => Some((d, k)),
                        };
                    }
                } else {
                    scan = false;
                }
            }

            if scan {
                span += 1;
                best = Self::scan_nearest(data, source, value, id, pos, len, best);
                if span >= span_cap {
                    break;
                }
            }

            id += len as u64;
        }

        // Nothing straddled the probe; scan the chunk whose bounds come
        // closest.
        if best.is_none() {
            if let Some((_, rep_k)) = rep {
                let mut id = data.head_id();
                while id < tail {
                    let (pos, len) = match data.run(id) {
                        Some(run) => run,
                        None => break,
                    };
                    if data.layout().chunk_of(pos) == rep_k {
                        best = Self::scan_nearest(data, source, value, id, pos, len, best);
                    }
                    id += len as u64;
                }
            }
        }

        best.map(|(_, id)| id)
    }

    fn scan_nearest(
        data: &mut Dataset<T>,
        source: Source,
        value: f64,
        id: u64,
        pos: usize,
        len: usize,
        mut best: Option<(f64, u64)>,
    ) -> Option<(f64, u64)> {
        let k = data.layout().chunk_of(pos);
        let base = data.layout().chunk_base(k);
        let stride = data.stride();
        let slab = match data.chunk_cells(k) {
            Some(slab) => slab,
            None => return best,
        };

        for r in 0..len {
            let rid = id + r as u64;
            let v = match source {
                Source::RowId => rid as f64,
                Source::Col(c) => slab[(pos - base + r) * stride + c].as_f64(),
            };
            if v.is_finite() {
                let d = (value - v).abs();
                best = match best {
                    Some((b, _)) if b <= d => best,
                    _ => Some((d, rid)),
                };
            }
        }

        best
    }
}
