//! Tests for the chunk-summary range cache.
//!
//! These tests verify the bounds layer between storage and the model:
//! - The finite min/max accumulator
//! - Cached column bounds against brute-force scans
//! - The insert/wipe invalidation protocol and its memo
//! - Structural drops for datasets and derived columns
//! - Windowed bounds and nearest-sample lookups
//!
//! ## Test Organization
//!
//! 1. **Accumulator** - Folding values and spans
//! 2. **Column Bounds** - Brute-force agreement, NaN handling
//! 3. **Invalidation** - Wipe protocol, memo coalescing, drops
//! 4. **Conditional Bounds** - Window classification against scans
//! 5. **Nearest Lookup** - Straddling chunks, caps, fallbacks

use plotline::cache::range::{RangeAcc, RangeCache};
use plotline::math::affine::Affine;
use plotline::storage::dataset::Source::{Col, RowId};
use plotline::storage::dataset::{Dataset, StoreConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Two f64 primary columns plus one derived cell: stride 3, 96-byte
/// chunks hold 4 rows each.
fn cfg() -> StoreConfig {
    StoreConfig {
        derived: 1,
        chunk_bytes: 96,
        chunk_cap: 64,
        cache_slots: 4,
        compress: false,
    }
}

/// Dataset with col 0 = i and col 1 from the supplied generator.
fn filled(length: usize, rows: usize, y: impl Fn(usize) -> f64) -> Dataset<f64> {
    let mut data = Dataset::default();
    data.alloc(2, length, &cfg()).expect("alloc should succeed");
    for i in 0..rows {
        data.insert(&[i as f64, y(i)]);
    }
    data
}

/// Brute-force finite bounds of col 1 over the retained window.
fn brute_bounds(data: &mut Dataset<f64>) -> (f64, f64) {
    let mut acc = RangeAcc::new();
    for id in data.ids() {
        if let Some(v) = data.read_cell(id, 1) {
            if v.is_finite() {
                acc.include(v);
            }
        }
    }
    acc.bounds()
}

// ============================================================================
// Accumulator Tests
// ============================================================================

/// Test accumulator folding.
///
/// Verifies emptiness, single values, and interval folding.
#[test]
fn test_acc_folding() {
    let mut acc = RangeAcc::new();
    assert!(acc.is_empty(), "Fresh accumulator is empty");
    assert_eq!(acc.bounds(), (0.0, 0.0), "Empty bounds are zero");

    acc.include(2.0);
    acc.include(-1.0);
    assert_eq!(acc.bounds(), (-1.0, 2.0), "Values widen both ends");

    acc.include_span(5.0, 7.0);
    assert!(!acc.is_empty(), "Accumulator started");
    assert_eq!(acc.bounds(), (-1.0, 7.0), "Span folds both endpoints");
}

// ============================================================================
// Column Bounds Tests
// ============================================================================

/// Test cached bounds against a brute-force scan.
///
/// Verifies a NaN-laced multi-chunk column and the row-id
/// pseudo-column.
#[test]
fn test_range_matches_brute_force() {
    let mut data = filled(16, 16, |i| {
        if i % 3 == 0 {
            f64::NAN
        } else {
            i as f64 * 1.5 - 4.0
        }
    });
    let mut rcache: RangeCache<f64> = RangeCache::new(8);

    let expected = brute_bounds(&mut data);
    assert_eq!(
        rcache.range(&mut data, 0, Col(1)),
        expected,
        "Cached bounds agree with the scan"
    );
    assert_eq!(
        rcache.range(&mut data, 0, RowId),
        (0.0, 15.0),
        "Row-id bounds span the retained window"
    );
}

/// Test cached bounds under randomized traffic.
///
/// Verifies that full, row-id, and windowed bounds keep agreeing with
/// brute-force scans across random NaN-laced insert bursts that wrap
/// the ring several times over.
#[test]
fn test_random_traffic_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(0x00C0_FFEE);
    let mut data = filled(24, 0, |_| 0.0);
    let mut rcache: RangeCache<f64> = RangeCache::new(8);
    let mut next = 0usize;

    for round in 0..8 {
        for _ in 0..rng.gen_range(5..40) {
            let y = if rng.gen_bool(1.0 / 6.0) {
                f64::NAN
            } else {
                rng.gen_range(-1000.0..1000.0)
            };
            let k = data
                .insert(&[next as f64, y])
                .expect("insert should land");
            rcache.wipe_chunk(0, k);
            next += 1;
        }

        assert_eq!(
            rcache.range(&mut data, 0, Col(1)),
            brute_bounds(&mut data),
            "Cached bounds track the scan after round {round}"
        );

        let ids = data.ids();
        assert_eq!(
            rcache.range(&mut data, 0, RowId),
            (ids.start as f64, ids.end as f64 - 1.0),
            "Row-id bounds track the retained window after round {round}"
        );

        let lo = rng.gen_range(-10.0..next as f64);
        let window = Affine::onto_unit(lo, lo + rng.gen_range(0.5..30.0));
        let mut acc = RangeAcc::new();
        rcache.range_cond(&mut data, 0, Col(1), Col(0), window, &mut acc);

        let mut expected = RangeAcc::new();
        for id in data.ids() {
            if let (Some(x), Some(y)) = (data.read_cell(id, 0), data.read_cell(id, 1)) {
                if (0.0..=1.0).contains(&window.apply(x)) && y.is_finite() {
                    expected.include(y);
                }
            }
        }
        assert_eq!(
            acc.bounds(),
            expected.bounds(),
            "Windowed bounds track the scan after round {round}"
        );
    }
}

/// Test bounds of an all-NaN column.
///
/// Verifies the empty-bounds convention when nothing is finite.
#[test]
fn test_range_all_nan() {
    let mut data = filled(16, 16, |_| f64::NAN);
    let mut rcache: RangeCache<f64> = RangeCache::new(8);
    assert_eq!(
        rcache.range(&mut data, 0, Col(1)),
        (0.0, 0.0),
        "No finite value leaves the zero bounds"
    );
}

// ============================================================================
// Invalidation Tests
// ============================================================================

/// Test the insert-then-wipe protocol under eviction.
///
/// Verifies that wiping each landing chunk keeps bounds exact as the
/// ring wraps and old extrema fall out.
#[test]
fn test_insert_wipe_protocol() {
    let mut data = filled(8, 8, |i| 100.0 - i as f64);
    let mut rcache: RangeCache<f64> = RangeCache::new(8);
    assert_eq!(rcache.range(&mut data, 0, Col(1)), (93.0, 100.0));

    for i in 8..20 {
        let k = data
            .insert(&[i as f64, 100.0 - i as f64])
            .expect("insert should land");
        rcache.wipe_chunk(0, k);
    }

    assert_eq!(data.ids(), 12..20, "Ring wrapped past the old rows");
    assert_eq!(
        rcache.range(&mut data, 0, Col(1)),
        (81.0, 88.0),
        "Wiped bounds drop the evicted extrema"
    );
}

/// Test that an unwiped edit leaves the cache stale.
///
/// Verifies the cache trusts computed chunks until told otherwise.
#[test]
fn test_stale_without_wipe() {
    let mut data = filled(16, 14, |i| i as f64);
    let mut rcache: RangeCache<f64> = RangeCache::new(8);
    assert_eq!(rcache.range(&mut data, 0, Col(1)), (0.0, 13.0));

    // Row 1 lives in chunk 0, away from the tail chunk.
    let k = data.write_cell(1, 1, 500.0).expect("write should land");
    assert_eq!(k, 0, "Edit landed in a non-tail chunk");
    assert_eq!(
        rcache.range(&mut data, 0, Col(1)),
        (0.0, 13.0),
        "No wipe: bounds are served from the cache"
    );

    rcache.wipe_chunk(0, k);
    assert_eq!(
        rcache.range(&mut data, 0, Col(1)),
        (0.0, 500.0),
        "Wipe forces a rescan of the edited chunk"
    );
}

/// Test wipe memo coalescing.
///
/// Verifies that repeated wipes of one chunk between fetches are
/// harmless and that a fetch re-arms the memo.
#[test]
fn test_wipe_memo_coalesced() {
    let mut data = filled(16, 14, |i| i as f64);
    let mut rcache: RangeCache<f64> = RangeCache::new(8);
    rcache.range(&mut data, 0, Col(1));

    data.write_cell(1, 1, 200.0);
    rcache.wipe_chunk(0, 0);
    data.write_cell(2, 1, 300.0);
    rcache.wipe_chunk(0, 0); // coalesced; chunk 0 is already invalid
    assert_eq!(
        rcache.range(&mut data, 0, Col(1)),
        (0.0, 300.0),
        "Coalesced wipe still sees every edit"
    );

    data.write_cell(3, 1, 400.0);
    rcache.wipe_chunk(0, 0); // memo cleared by the fetch above
    assert_eq!(
        rcache.range(&mut data, 0, Col(1)),
        (0.0, 400.0),
        "Memo re-arms after a fetch"
    );
}

/// Test dropping every slot of a dataset.
///
/// Verifies that stale bounds disappear without chunk-level wipes.
#[test]
fn test_drop_dataset() {
    let mut data = filled(16, 14, |i| i as f64);
    let mut rcache: RangeCache<f64> = RangeCache::new(8);
    rcache.range(&mut data, 0, Col(1));

    data.write_cell(1, 1, 500.0);
    rcache.drop_dataset(0);
    assert_eq!(
        rcache.range(&mut data, 0, Col(1)),
        (0.0, 500.0),
        "Dropped dataset recomputes from scratch"
    );
}

/// Test the selective derived-column drop.
///
/// Verifies that derived-column slots recompute while primary-column
/// slots keep serving their cached bounds.
#[test]
fn test_drop_derived_selective() {
    let mut data = filled(16, 14, |i| i as f64);
    for id in 0..14u64 {
        data.write_cell(id, 2, id as f64 * 2.0);
    }
    let mut rcache: RangeCache<f64> = RangeCache::new(8);
    assert_eq!(rcache.range(&mut data, 0, Col(0)), (0.0, 13.0));
    assert_eq!(rcache.range(&mut data, 0, Col(2)), (0.0, 26.0));

    // Both columns change in a non-tail chunk; only derived slots drop.
    data.write_cell(1, 0, 700.0);
    data.write_cell(1, 2, 900.0);
    rcache.drop_derived(0, 2);

    assert_eq!(
        rcache.range(&mut data, 0, Col(2)),
        (0.0, 900.0),
        "Derived slot recomputed"
    );
    assert_eq!(
        rcache.range(&mut data, 0, Col(0)),
        (0.0, 13.0),
        "Primary slot still cached"
    );
}

/// Test slot reuse under pressure.
///
/// Verifies that a two-slot cache serving three columns stays correct
/// as slots are recycled.
#[test]
fn test_slot_reuse_under_pressure() {
    let mut data = filled(16, 16, |i| -(i as f64));
    let mut rcache: RangeCache<f64> = RangeCache::new(2);

    for _ in 0..3 {
        assert_eq!(rcache.range(&mut data, 0, Col(0)), (0.0, 15.0));
        assert_eq!(rcache.range(&mut data, 0, Col(1)), (-15.0, 0.0));
        assert_eq!(rcache.range(&mut data, 0, RowId), (0.0, 15.0));
    }
}

// ============================================================================
// Conditional Bounds Tests
// ============================================================================

/// Test windowed bounds against a brute-force scan.
///
/// Verifies chunk classification over an ascending condition column
/// with NaN-laced values.
#[test]
fn test_range_cond_matches_brute_force() {
    let mut data = filled(32, 32, |i| {
        if i % 5 == 0 {
            f64::NAN
        } else {
            ((i * 7) % 13) as f64 - 6.0
        }
    });
    let mut rcache: RangeCache<f64> = RangeCache::new(8);
    let window = Affine::onto_unit(10.5, 20.5);

    let mut acc = RangeAcc::new();
    rcache.range_cond(&mut data, 0, Col(1), Col(0), window, &mut acc);

    let mut expected = RangeAcc::new();
    for i in 0..32 {
        let x = i as f64;
        let y = if i % 5 == 0 {
            f64::NAN
        } else {
            ((i * 7) % 13) as f64 - 6.0
        };
        if (10.5..=20.5).contains(&x) && y.is_finite() {
            expected.include(y);
        }
    }
    assert!(!acc.is_empty(), "Window covers finite rows");
    assert_eq!(acc.bounds(), expected.bounds(), "Windowed bounds agree");
}

/// Test a window beyond every chunk.
///
/// Verifies that nothing is folded in when no row can land in the
/// window.
#[test]
fn test_range_cond_empty_window() {
    let mut data = filled(32, 32, |i| i as f64);
    let mut rcache: RangeCache<f64> = RangeCache::new(8);

    let mut acc = RangeAcc::new();
    rcache.range_cond(
        &mut data,
        0,
        Col(1),
        Col(0),
        Affine::onto_unit(100.0, 110.0),
        &mut acc,
    );
    assert!(acc.is_empty(), "No row lands in the window");
}

/// Test the row-id pseudo-column as the condition.
///
/// Verifies bounds restricted to an id interval.
#[test]
fn test_range_cond_rowid_condition() {
    let mut data = filled(32, 32, |i| i as f64 * 3.0);
    let mut rcache: RangeCache<f64> = RangeCache::new(8);

    let mut acc = RangeAcc::new();
    rcache.range_cond(
        &mut data,
        0,
        Col(1),
        RowId,
        Affine::onto_unit(4.0, 11.0),
        &mut acc,
    );
    assert_eq!(acc.bounds(), (12.0, 33.0), "Bounds of ids 4 through 11");
}

// ============================================================================
// Nearest Lookup Tests
// ============================================================================

/// Test the fallback across a value gap.
///
/// Verifies that a probe between two chunk spans scans the chunk with
/// the nearer bounds.
#[test]
fn test_nearest_gap_fallback() {
    let mut data = filled(8, 8, |i| if i < 4 { i as f64 } else { 96.0 + i as f64 });
    let mut rcache: RangeCache<f64> = RangeCache::new(8);

    assert_eq!(
        rcache.slice_nearest(&mut data, 0, Col(1), 50.0, 4),
        Some(3),
        "Chunk 0 ends nearer to the probe than chunk 1 starts"
    );
}

/// Test the straddling-chunk scan cap.
///
/// Verifies that a low cap settles for the first straddling chunk and
/// a higher cap finds the true nearest row.
#[test]
fn test_nearest_span_cap() {
    let values = [0.0, 5.0, 10.0, 3.0, 6.9, 8.0, 7.2, 6.0];
    let mut data = filled(8, 8, |i| values[i]);
    let mut rcache: RangeCache<f64> = RangeCache::new(8);

    assert_eq!(
        rcache.slice_nearest(&mut data, 0, Col(1), 7.0, 1),
        Some(1),
        "Capped at one chunk: nearest within chunk 0"
    );
    assert_eq!(
        rcache.slice_nearest(&mut data, 0, Col(1), 7.0, 4),
        Some(4),
        "Uncapped: chunk 1 holds the closer value"
    );
}

/// Test that an all-NaN chunk is skipped.
///
/// Verifies the lookup lands in the finite chunk regardless of the
/// probe side.
#[test]
fn test_nearest_skips_nan_chunk() {
    let mut data = filled(8, 8, |i| if i < 4 { f64::NAN } else { 6.0 + i as f64 });
    let mut rcache: RangeCache<f64> = RangeCache::new(8);

    assert_eq!(
        rcache.slice_nearest(&mut data, 0, Col(1), 0.0, 4),
        Some(4),
        "First finite row is the nearest"
    );
}

/// Test a probe beyond every chunk.
///
/// Verifies the representative-chunk fallback on the far side.
#[test]
fn test_nearest_beyond_all_bounds() {
    let mut data = filled(8, 8, |i| if i < 4 { i as f64 } else { 96.0 + i as f64 });
    let mut rcache: RangeCache<f64> = RangeCache::new(8);

    assert_eq!(
        rcache.slice_nearest(&mut data, 0, Col(1), 1000.0, 4),
        Some(7),
        "Largest value is the nearest to a far probe"
    );
}

/// Test tie breaking and the empty dataset.
///
/// Verifies the earliest id wins ties and an empty ring yields
/// nothing.
#[test]
fn test_nearest_ties_and_empty() {
    let mut data = filled(8, 8, |_| 5.0);
    let mut rcache: RangeCache<f64> = RangeCache::new(8);
    assert_eq!(
        rcache.slice_nearest(&mut data, 0, Col(1), 5.0, 4),
        Some(0),
        "Earliest of the tied rows wins"
    );

    let mut empty = filled(8, 0, |_| 0.0);
    assert_eq!(
        rcache.slice_nearest(&mut empty, 1, Col(1), 5.0, 4),
        None,
        "Empty ring has no nearest row"
    );
}
