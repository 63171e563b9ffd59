//! Tests for clipping, the sketch pool, and trial drawing.
//!
//! These tests drive the renderer headlessly with a recording surface
//! and a frozen clock:
//! - Cohen-Sutherland segment and point clipping
//! - Sketch node chaining, per-figure splicing, and pool exhaustion
//! - The budgeted recording walk: work units, NaN breaks, chunk
//!   culling with polyline continuity, and ring overrun
//! - Replay through the live axis mappings
//!
//! ## Test Organization
//!
//! 1. **Clipping** - Inside, crossing, outside, degenerate
//! 2. **Sketch Pool** - Splicing, capacity, exhaustion, blanking
//! 3. **Trial Drawing** - Budget slices, NaN, culling, dots, replay

use approx::assert_relative_eq;
use plotline::cache::range::RangeCache;
use plotline::math::affine::Viewport;
use plotline::model::axis::Axes;
use plotline::model::figure::{figure_add, Drawing, Figures};
use plotline::render::clip::{clip_segment, point_visible, segment_visible};
use plotline::render::renderer::{DrawPhase, Render};
use plotline::render::sketch::{SketchPool, SKETCH_POINTS};
use plotline::render::surface::{Clock, Pen, Surface};
use plotline::storage::dataset::Source::Col;
use plotline::storage::dataset::{Dataset, StoreConfig};

// ============================================================================
// Test Harness
// ============================================================================

/// Surface that records every primitive it receives.
#[derive(Default)]
struct TestSurface {
    lines: Vec<(f64, f64, f64, f64)>,
    dashes: Vec<(f64, f64, f64, f64)>,
    dots: Vec<(f64, f64)>,
}

impl Surface for TestSurface {
    fn line(&mut self, _pen: &Pen, x0: f64, y0: f64, x1: f64, y1: f64) {
        self.lines.push((x0, y0, x1, y1));
    }

    fn dash(&mut self, _pen: &Pen, x0: f64, y0: f64, x1: f64, y1: f64) {
        self.dashes.push((x0, y0, x1, y1));
    }

    fn dot(&mut self, _pen: &Pen, x: f64, y: f64) {
        self.dots.push((x, y));
    }

    fn fill_rect(&mut self, _pen: &Pen, _x0: i32, _y0: i32, _x1: i32, _y1: i32) {}

    fn text(&mut self, _pen: &Pen, _x: i32, _y: i32, _s: &str) {}

    fn text_extent(&mut self, s: &str) -> (i32, i32) {
        (8 * s.len() as i32, 16)
    }
}

/// Clock pinned at zero, so every budget expires after one work unit.
struct FixedClock;

impl Clock for FixedClock {
    fn now_ms(&mut self) -> u64 {
        0
    }
}

fn cfg() -> StoreConfig {
    StoreConfig {
        derived: 2,
        chunk_bytes: 128,
        chunk_cap: 64,
        cache_slots: 4,
        compress: false,
    }
}

type Rig = (Axes, Figures, Vec<Dataset<f64>>, RangeCache<f64>);

/// One figure over rows `[i, y(i)]`, four rows per chunk.
fn rig(length: u64, rows: u64, y: impl Fn(u64) -> f64, drawing: Drawing) -> Rig {
    let mut axes = Axes::new(4);
    let mut figures = Figures::new(4);
    let mut data: Vec<Dataset<f64>> = vec![Dataset::default()];
    let mut rcache = RangeCache::new(8);

    data[0].alloc(2, length as usize, &cfg()).expect("alloc should succeed");
    for i in 0..rows {
        if let Some(k) = data[0].insert(&[i as f64, y(i)]) {
            rcache.wipe_chunk(0, k);
        }
    }
    figure_add(
        &mut axes, &mut figures, &data,
        0, 0, Col(0), Col(1), 0, 1,
        "trace", drawing, 1,
    )
    .expect("figure should bind");
    (axes, figures, data, rcache)
}

fn vp() -> Viewport {
    Viewport::new(0, 400, 0, 200)
}

/// Drive the pass to completion, returning the number of calls taken.
#[allow(clippy::too_many_arguments)]
fn run_pass(
    render: &mut Render,
    surface: &mut TestSurface,
    data: &mut [Dataset<f64>],
    rcache: &mut RangeCache<f64>,
    axes: &Axes,
    figures: &Figures,
    vp: &Viewport,
) -> usize {
    let mut calls = 0;
    for _ in 0..100 {
        calls += 1;
        render.trial_all(
            surface,
            data,
            rcache,
            axes,
            figures,
            vp,
            0,
            &mut FixedClock,
            0,
        );
        if !render.in_progress() {
            break;
        }
    }
    assert!(!render.in_progress(), "Pass should complete");
    calls
}

/// Total recorded segment pairs over the replay chain.
fn replay_pairs(render: &Render) -> usize {
    render
        .sketches()
        .replay()
        .map(|node| node.points().len() / 2)
        .sum()
}

// ============================================================================
// Clipping Tests
// ============================================================================

/// Test a fully visible segment.
///
/// Verifies that it passes through unchanged.
#[test]
fn clip_keeps_inside_segments() {
    let vp = Viewport::new(0, 100, 0, 100);
    let clipped = clip_segment(&vp, (10.0, 10.0), (90.0, 90.0));
    assert_eq!(clipped, Some(((10.0, 10.0), (90.0, 90.0))));
    assert!(segment_visible(&vp, (10.0, 10.0), (90.0, 90.0)));
}

/// Test crossing segments.
///
/// Verifies the intersection points against hand-computed values.
#[test]
fn clip_intersects_crossing_segments() {
    let vp = Viewport::new(0, 100, 0, 100);

    // Horizontal entry through the left border.
    let ((x0, y0), (x1, y1)) =
        clip_segment(&vp, (-50.0, 50.0), (50.0, 50.0)).expect("should intersect");
    assert_relative_eq!(x0, 0.0, epsilon = 1e-12);
    assert_relative_eq!(y0, 50.0, epsilon = 1e-12);
    assert_relative_eq!(x1, 50.0, epsilon = 1e-12);
    assert_relative_eq!(y1, 50.0, epsilon = 1e-12);

    // Diagonal crossing the top-left corner region.
    let ((x0, y0), (x1, y1)) =
        clip_segment(&vp, (-10.0, 50.0), (50.0, -10.0)).expect("should intersect");
    assert_relative_eq!(x0, 0.0, epsilon = 1e-12);
    assert_relative_eq!(y0, 40.0, epsilon = 1e-12);
    assert_relative_eq!(y1, 0.0, epsilon = 1e-12);
    assert_relative_eq!(x1, 100.0 / 3.0, epsilon = 1e-12);
}

/// Test invisible segments.
///
/// Verifies the one-sided fast reject and the corner miss that needs
/// an intersection step to discover.
#[test]
fn clip_rejects_outside_segments() {
    let vp = Viewport::new(0, 100, 0, 100);

    assert_eq!(clip_segment(&vp, (-50.0, 10.0), (-10.0, 90.0)), None);
    assert_eq!(clip_segment(&vp, (10.0, -5.0), (90.0, -50.0)), None);

    // Passes the outcode screen but misses the corner.
    assert_eq!(clip_segment(&vp, (-10.0, 5.0), (5.0, -10.0)), None);
    assert!(!segment_visible(&vp, (-10.0, 5.0), (5.0, -10.0)));
}

/// Test degenerate segments and points.
///
/// Verifies that zero-length segments clip like points and that the
/// viewport border counts as inside.
#[test]
fn clip_handles_degenerate_points() {
    let vp = Viewport::new(0, 100, 0, 100);

    assert_eq!(
        clip_segment(&vp, (50.0, 50.0), (50.0, 50.0)),
        Some(((50.0, 50.0), (50.0, 50.0)))
    );
    assert_eq!(clip_segment(&vp, (-5.0, -5.0), (-5.0, -5.0)), None);

    assert!(point_visible(&vp, 50.0, 50.0));
    assert!(point_visible(&vp, 0.0, 0.0), "Border is inside");
    assert!(point_visible(&vp, 100.0, 100.0), "Border is inside");
    assert!(!point_visible(&vp, 100.5, 50.0));
}

// ============================================================================
// Sketch Pool Tests
// ============================================================================

/// Test per-figure node splicing.
///
/// Verifies that a figure's later nodes splice in right after its
/// first one, so replay keeps each figure's primitives together.
#[test]
fn pool_splices_nodes_per_figure() {
    let mut pool = SketchPool::new(8, 4);

    pool.add_pair(0, Drawing::Line, 1, (0.0, 0.0), (1.0, 1.0));
    pool.add_pair(1, Drawing::Line, 1, (5.0, 5.0), (6.0, 6.0));
    // Width change forces a fresh node for figure 0.
    pool.add_pair(0, Drawing::Line, 2, (2.0, 2.0), (3.0, 3.0));
    pool.garbage();

    let order: Vec<(usize, i32)> = pool.replay().map(|n| (n.figure(), n.width())).collect();
    assert_eq!(
        order,
        vec![(0, 1), (0, 2), (1, 1)],
        "Figure 0's second node splices before figure 1"
    );
    assert_eq!(pool.free_nodes(), 5, "Three nodes live in the replay chain");
}

/// Test node capacity.
///
/// Verifies that a run longer than one node chains into a successor
/// without splitting any pair.
#[test]
fn pool_chains_at_capacity() {
    let mut pool = SketchPool::new(4, 1);
    let pairs = SKETCH_POINTS / 2 + 1;

    for i in 0..pairs {
        let x = i as f64;
        pool.add_pair(0, Drawing::Line, 1, (x, 0.0), (x + 1.0, 1.0));
    }
    pool.garbage();

    let lens: Vec<usize> = pool.replay().map(|n| n.points().len()).collect();
    assert_eq!(lens, vec![SKETCH_POINTS, 2]);
    assert_eq!(pool.free_nodes(), 2);
}

/// Test pool exhaustion.
///
/// Verifies that a starved recording drops further primitives but the
/// swap still shows the partial picture.
#[test]
fn pool_exhaustion_drops_rest_of_pass() {
    let mut pool = SketchPool::new(1, 2);

    pool.add_pair(0, Drawing::Line, 1, (0.0, 0.0), (1.0, 1.0));
    // No node left for figure 1; the pair vanishes.
    pool.add_pair(1, Drawing::Line, 1, (5.0, 5.0), (6.0, 6.0));
    // Figure 0's open node still accepts points.
    pool.add_pair(0, Drawing::Line, 1, (1.0, 1.0), (2.0, 2.0));
    pool.garbage();

    let nodes: Vec<(usize, usize)> = pool
        .replay()
        .map(|n| (n.figure(), n.points().len()))
        .collect();
    assert_eq!(nodes, vec![(0, 4)], "Only figure 0 survived starvation");
    assert_eq!(pool.free_nodes(), 0);

    // An empty follow-up recording swaps the picture away.
    pool.garbage();
    assert_eq!(pool.replay().count(), 0);
    assert_eq!(pool.free_nodes(), 1);
}

/// Test the blanking drop.
///
/// Verifies that clean releases both chains back to the free list.
#[test]
fn pool_clean_blanks_replay() {
    let mut pool = SketchPool::new(6, 2);

    pool.add_pair(0, Drawing::Line, 1, (0.0, 0.0), (1.0, 1.0));
    pool.garbage();
    pool.add_point(1, Drawing::Dot, 1, (2.0, 2.0));

    pool.clean();
    assert_eq!(pool.replay().count(), 0);
    assert_eq!(pool.free_nodes(), 6);
}

// ============================================================================
// Trial Drawing Tests
// ============================================================================

/// Test the work unit slicing.
///
/// Verifies that a zero budget advances one chunk's worth of rows per
/// call, and that the pass needs a final call to swap the sketches.
#[test]
fn zero_budget_advances_one_unit() {
    let (mut axes, figures, mut data, mut rcache) = rig(16, 8, |i| i as f64, Drawing::Line);
    axes.scale_manual(0, 0.0, 8.0);
    axes.scale_manual(1, 0.0, 8.0);
    let vp = vp();
    let mut render = Render::new(4, 8);
    let mut surface = TestSurface::default();

    render.trial_all(
        &mut surface, &mut data, &mut rcache, &axes, &figures, &vp, 0, &mut FixedClock, 0,
    );
    assert!(render.in_progress());
    assert_eq!(render.state(0).map(|s| s.phase), Some(DrawPhase::Interrupted));
    assert_eq!(render.state(0).map(|s| s.id), Some(4));
    assert_eq!(surface.lines.len(), 3, "First chunk paints three segments");

    render.trial_all(
        &mut surface, &mut data, &mut rcache, &axes, &figures, &vp, 0, &mut FixedClock, 0,
    );
    assert!(render.in_progress(), "Swap waits for the next call");
    assert_eq!(render.state(0).map(|s| s.phase), Some(DrawPhase::Finished));
    assert_eq!(surface.lines.len(), 7);

    render.trial_all(
        &mut surface, &mut data, &mut rcache, &axes, &figures, &vp, 0, &mut FixedClock, 0,
    );
    assert!(!render.in_progress());
    assert_eq!(replay_pairs(&render), 7);

    // The first live segment maps (0,0)-(1,1) through 50 px per unit.
    let (x0, y0, x1, y1) = surface.lines[0];
    assert_relative_eq!(x0, 0.0, epsilon = 1e-9);
    assert_relative_eq!(y0, 200.0, epsilon = 1e-9);
    assert_relative_eq!(x1, 50.0, epsilon = 1e-9);
    assert_relative_eq!(y1, 175.0, epsilon = 1e-9);
}

/// Test NaN handling in a line run.
///
/// Verifies that a NaN row breaks the polyline and the run restarts
/// at the next finite row.
#[test]
fn nan_rows_break_the_polyline() {
    let y = |i: u64| if i == 3 { f64::NAN } else { i as f64 };
    let (mut axes, figures, mut data, mut rcache) = rig(16, 8, y, Drawing::Line);
    axes.scale_manual(0, 0.0, 8.0);
    axes.scale_manual(1, 0.0, 8.0);
    let vp = vp();
    let mut render = Render::new(4, 8);
    let mut surface = TestSurface::default();

    run_pass(
        &mut render, &mut surface, &mut data, &mut rcache, &axes, &figures, &vp,
    );

    // Two segments before the gap, three after.
    assert_eq!(surface.lines.len(), 5);
    assert_eq!(replay_pairs(&render), 5);
}

/// Test chunk culling with polyline continuity.
///
/// Verifies that a chunk whose cached bounds are off screen skips
/// without row reads, while one segment into it and one out of it
/// keep the polyline joined.
#[test]
fn offscreen_chunks_cull_with_continuity() {
    let y = |i: u64| if (4..8).contains(&i) { 1000.0 } else { i as f64 };
    let (mut axes, figures, mut data, mut rcache) = rig(16, 16, y, Drawing::Line);
    axes.scale_manual(0, 0.0, 16.0);
    axes.scale_manual(1, 0.0, 20.0);
    let vp = vp();
    let mut render = Render::new(4, 8);
    let mut surface = TestSurface::default();

    let before = surface.lines.len();
    render.trial_all(
        &mut surface, &mut data, &mut rcache, &axes, &figures, &vp, 0, &mut FixedClock, 0,
    );
    assert_eq!(surface.lines.len() - before, 3, "Chunk 0 paints fully");

    // Second unit: the whole culled chunk advances in one step, with
    // one clipped segment drawn on the way off screen.
    let before = surface.lines.len();
    render.trial_all(
        &mut surface, &mut data, &mut rcache, &axes, &figures, &vp, 0, &mut FixedClock, 0,
    );
    assert_eq!(render.state(0).map(|s| s.id), Some(8));
    assert_eq!(surface.lines.len() - before, 1);

    run_pass(
        &mut render, &mut surface, &mut data, &mut rcache, &axes, &figures, &vp,
    );

    // 3 + 1 into the gap + (re-entry 1 + 3) + 4 in the tail chunk.
    assert_eq!(surface.lines.len(), 12);
    assert_eq!(replay_pairs(&render), 12);
}

/// Test dot mode.
///
/// Verifies that NaN rows and off-screen points drop while the rest
/// paint and record.
#[test]
fn dot_mode_paints_visible_points() {
    let y = |i: u64| match i {
        3 => f64::NAN,
        6 => 1000.0,
        _ => i as f64,
    };
    let (mut axes, figures, mut data, mut rcache) = rig(16, 8, y, Drawing::Dot);
    axes.scale_manual(0, 0.0, 8.0);
    axes.scale_manual(1, 0.0, 8.0);
    let vp = vp();
    let mut render = Render::new(4, 8);
    let mut surface = TestSurface::default();

    run_pass(
        &mut render, &mut surface, &mut data, &mut rcache, &axes, &figures, &vp,
    );
    assert_eq!(surface.dots.len(), 6);

    let mut replayed = TestSurface::default();
    render.replay(&mut replayed, &axes, &figures, &vp);
    assert_eq!(replayed.dots.len(), 6);
}

/// Test dashed drawing.
///
/// Verifies that Dash figures emit dashed strokes, not solid ones.
#[test]
fn dash_mode_uses_dashed_strokes() {
    let (mut axes, figures, mut data, mut rcache) = rig(16, 8, |i| i as f64, Drawing::Dash);
    axes.scale_manual(0, 0.0, 8.0);
    axes.scale_manual(1, 0.0, 8.0);
    let vp = vp();
    let mut render = Render::new(4, 8);
    let mut surface = TestSurface::default();

    run_pass(
        &mut render, &mut surface, &mut data, &mut rcache, &axes, &figures, &vp,
    );
    assert_eq!(surface.dashes.len(), 7);
    assert!(surface.lines.is_empty());
    assert_eq!(replay_pairs(&render), 7);
}

/// Test replay through changed axis mappings.
///
/// Verifies that recorded data-space points re-map with the live
/// window, so a zoomed axis moves the replayed picture.
#[test]
fn replay_follows_live_axes() {
    let (mut axes, figures, mut data, mut rcache) = rig(16, 8, |i| i as f64, Drawing::Line);
    axes.scale_manual(0, 0.0, 8.0);
    axes.scale_manual(1, 0.0, 8.0);
    let vp = vp();
    let mut render = Render::new(4, 8);
    let mut surface = TestSurface::default();

    run_pass(
        &mut render, &mut surface, &mut data, &mut rcache, &axes, &figures, &vp,
    );

    // Halve the X resolution and replay the same sketches.
    axes.scale_manual(0, 0.0, 16.0);
    let mut replayed = TestSurface::default();
    render.replay(&mut replayed, &axes, &figures, &vp);

    assert_eq!(replayed.lines.len(), 7);
    let (x0, y0, x1, y1) = replayed.lines[0];
    assert_relative_eq!(x0, 0.0, epsilon = 1e-9);
    assert_relative_eq!(y0, 200.0, epsilon = 1e-9);
    assert_relative_eq!(x1, 25.0, epsilon = 1e-9);
    assert_relative_eq!(y1, 175.0, epsilon = 1e-9);
}

/// Test ring overrun during a pass.
///
/// Verifies that a cursor left behind by eviction clamps forward to
/// the new head and the line run restarts there.
#[test]
fn ring_overrun_clamps_forward() {
    let (mut axes, figures, mut data, mut rcache) = rig(8, 8, |i| i as f64, Drawing::Line);
    axes.scale_manual(0, 0.0, 16.0);
    axes.scale_manual(1, 0.0, 16.0);
    let vp = vp();
    let mut render = Render::new(4, 8);
    let mut surface = TestSurface::default();

    render.trial_all(
        &mut surface, &mut data, &mut rcache, &axes, &figures, &vp, 0, &mut FixedClock, 0,
    );
    assert_eq!(render.state(0).map(|s| s.id), Some(4));

    // Six inserts into the full ring evict rows 0..6.
    for i in 8..14u64 {
        if let Some(k) = data[0].insert(&[i as f64, i as f64]) {
            rcache.wipe_chunk(0, k);
        }
    }

    let before = surface.lines.len();
    render.trial_all(
        &mut surface, &mut data, &mut rcache, &axes, &figures, &vp, 0, &mut FixedClock, 0,
    );
    assert_eq!(render.state(0).map(|s| s.id), Some(10), "Clamped to head 6");
    assert_eq!(
        render.state(0).map(|s| s.phase),
        Some(DrawPhase::Interrupted)
    );
    assert_eq!(
        surface.lines.len() - before,
        3,
        "Restarted run paints 6-7, 7-8, 8-9"
    );

    run_pass(
        &mut render, &mut surface, &mut data, &mut rcache, &axes, &figures, &vp,
    );
    assert_eq!(surface.lines.len(), 3 + 3 + 4);
    assert_eq!(replay_pairs(&render), 10);
}

/// Test structural invalidation.
///
/// Verifies that invalidate blanks the replay chain and the next pass
/// rebuilds it.
#[test]
fn invalidate_restarts_recording() {
    let (mut axes, figures, mut data, mut rcache) = rig(16, 8, |i| i as f64, Drawing::Line);
    axes.scale_manual(0, 0.0, 8.0);
    axes.scale_manual(1, 0.0, 8.0);
    let vp = vp();
    let mut render = Render::new(4, 8);
    let mut surface = TestSurface::default();

    run_pass(
        &mut render, &mut surface, &mut data, &mut rcache, &axes, &figures, &vp,
    );
    assert_eq!(replay_pairs(&render), 7);

    render.invalidate();
    assert_eq!(render.sketches().replay().count(), 0);
    assert!(!render.in_progress());

    run_pass(
        &mut render, &mut surface, &mut data, &mut rcache, &axes, &figures, &vp,
    );
    assert_eq!(replay_pairs(&render), 7);
}
