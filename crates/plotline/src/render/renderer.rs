//! Trial drawing: budgeted visibility recording and sketch replay.
//!
//! ## Purpose
//!
//! Recording a figure means walking its retained rows, mapping each
//! point through the live axis windows and keeping only primitives
//! that land in the viewport. Visible primitives paint straight onto
//! the surface as the walk finds them and record in data space for
//! later replay. The walk is sliced into work units of one chunk's
//! worth of rows; a scheduler spends a per-frame time budget advancing
//! whichever figure is furthest behind, so several large figures make
//! even progress across frames.
//!
//! ## Key concepts
//!
//! 1. **Chunk culling**: cached per-chunk bounds prove whole chunks
//!    invisible before any row is read. An all-NaN chunk culls too.
//! 2. **Polyline continuity**: one segment is drawn into a culled
//!    chunk while a line run is active, and the walk backs up one row
//!    when it re-enters visible territory, so the polyline stays
//!    joined across skipped chunks.
//! 3. **Double buffer**: primitives record into the sketch pool's
//!    current chain; when every figure finishes, the chains swap and
//!    the new picture replays from then on.
//!
//! ## Edge cases
//!
//! * A row id that fell off the ring head mid-pass clamps forward and
//!   the line run restarts.
//! * Hidden figures record before visible ones at equal progress, so
//!   replay paints them underneath.
//! * A zero budget still advances one work unit per call.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

// Internal dependencies
use crate::cache::range::{ChunkStat, RangeCache};
use crate::math::affine::{Affine, Viewport};
use crate::model::axis::Axes;
use crate::model::figure::{Drawing, Figures};
use crate::primitives::value::Real;
use crate::render::clip::{clip_segment, point_visible};
use crate::render::sketch::SketchPool;
use crate::render::surface::{Clock, Pen, Surface};
use crate::storage::dataset::{Dataset, Source};

// ============================================================================
// Draw State
// ============================================================================

/// Progress of one figure through the current recording pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawPhase {
    /// Nothing left to record; unused slots rest here.
    #[default]
    Finished,
    /// Reset and ready to walk from the ring head.
    Started,
    /// Mid-walk, waiting for the next work unit.
    Interrupted,
}

/// Per-figure cursor for the recording walk.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrawState {
    pub phase: DrawPhase,
    /// Next row id to process.
    pub id: u64,
    /// A culled chunk lies just behind the cursor.
    pub skipped: bool,
    /// `last` holds a finite point of the active line run.
    pub line: bool,
    /// Previous row's data-space point.
    pub last: (f64, f64),
}

// ============================================================================
// Render
// ============================================================================

/// Recording scheduler and double-buffered sketches.
#[derive(Debug)]
pub struct Render {
    pub(crate) states: Vec<DrawState>,
    pub(crate) pool: SketchPool,
    in_progress: bool,
}

impl Render {
    /// Scheduler over `figures` figure slots and `nodes` sketch nodes.
    pub fn new(figures: usize, nodes: usize) -> Self {
        let mut states = Vec::with_capacity(figures);
        states.resize(figures, DrawState::default());
        Self {
            states,
            pool: SketchPool::new(nodes, figures),
            in_progress: false,
        }
    }

    /// Whether a recording pass is underway.
    #[inline]
    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    /// Recording cursor of one figure slot.
    pub fn state(&self, f: usize) -> Option<&DrawState> {
        self.states.get(f)
    }

    /// Completed sketch chain for replay.
    pub fn sketches(&self) -> &SketchPool {
        &self.pool
    }

    /// Drop all recorded primitives and restart recording from scratch.
    ///
    /// Called after structural changes; the display goes blank until
    /// the next pass completes.
    pub fn invalidate(&mut self) {
        self.pool.clean();
        self.in_progress = false;
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Advance the recording pass until the time budget runs out.
    ///
    /// Newly visible primitives paint onto `surface` as they are
    /// found, so fresh data appears without waiting for the pass to
    /// complete. Starts a fresh pass when none is underway; swaps the
    /// sketch chains when every figure finishes. At least one work
    /// unit runs per call.
    #[allow(clippy::too_many_arguments)]
    pub fn trial_all<T: Real, S: Surface, C: Clock>(
        &mut self,
        surface: &mut S,
        data: &mut [Dataset<T>],
        rcache: &mut RangeCache<T>,
        axes: &Axes,
        figures: &Figures,
        vp: &Viewport,
        margin: i32,
        clock: &mut C,
        budget_ms: u64,
    ) {
        if !self.in_progress {
            for (f, fig) in figures.list.iter().enumerate() {
                self.states[f] = if fig.busy() && fig.dataset() < data.len() {
                    DrawState {
                        phase: DrawPhase::Started,
                        id: data[fig.dataset()].head_id(),
                        skipped: false,
                        line: false,
                        last: (0.0, 0.0),
                    }
                } else {
                    DrawState::default()
                };
            }
            self.in_progress = true;
        }

        let deadline = clock.now_ms() + budget_ms;
        loop {
            // Furthest-behind figure next; hidden wins ties so replay
            // paints it underneath.
            let mut pick: Option<usize> = None;
            for hidden in [true, false] {
                for (f, fig) in figures.list.iter().enumerate() {
                    if !fig.busy() || fig.hidden() != hidden {
                        continue;
                    }
                    if self.states[f].phase == DrawPhase::Finished {
                        continue;
                    }
                    let better = match pick {
                        None => true,
                        Some(p) => self.states[f].id < self.states[p].id,
                    };
                    if better {
                        pick = Some(f);
                    }
                }
            }

            let f = match pick {
                Some(f) => f,
                None => {
                    self.pool.garbage();
                    self.in_progress = false;
                    return;
                }
            };

            self.trial(surface, data, rcache, axes, figures, vp, margin, f);

            if clock.now_ms() >= deadline {
                return;
            }
        }
    }

    /// One work unit of recording for figure `f`.
    #[allow(clippy::too_many_arguments)]
    fn trial<T: Real, S: Surface>(
        &mut self,
        surface: &mut S,
        data: &mut [Dataset<T>],
        rcache: &mut RangeCache<T>,
        axes: &Axes,
        figures: &Figures,
        vp: &Viewport,
        margin: i32,
        f: usize,
    ) {
        let fig = &figures.list[f];
        let d = fig.dataset();
        let (col_x, col_y) = (fig.col_x(), fig.col_y());
        let (drawing, width) = (fig.drawing(), fig.width());
        let pen = Pen::figure(f, fig.hidden(), width);
        let map_x = axes.to_pixels(fig.axis_x(), vp);
        let map_y = axes.to_pixels(fig.axis_y(), vp);

        let sx = rcache.fetch(&mut data[d], d, col_x);
        let sy = rcache.fetch(&mut data[d], d, col_y);

        let mut st = self.states[f];
        let head = data[d].head_id();
        let tail = data[d].tail_id();

        // The ring may have dropped rows since the pass started.
        if st.id < head {
            st.id = head;
            st.skipped = false;
            st.line = false;
        }

        let top = st.id + data[d].layout().rows_per_chunk() as u64;

        'unit: loop {
            if st.id >= tail {
                st.phase = DrawPhase::Finished;
                break;
            }
            let (pos, len) = match data[d].run(st.id) {
                Some(run) => run,
                None => {
                    st.phase = DrawPhase::Finished;
                    break;
                }
            };
            let k = data[d].layout().chunk_of(pos);
            let stretch_end = st.id + len as u64;

            let off_x = stat_offscreen(
                rcache.slots[sx].chunks.get(k).copied(),
                &map_x,
                (vp.min_x - margin) as f64,
                (vp.max_x + margin) as f64,
            );
            let off_y = stat_offscreen(
                rcache.slots[sy].chunks.get(k).copied(),
                &map_y,
                (vp.min_y - margin) as f64,
                (vp.max_y + margin) as f64,
            );

            if off_x || off_y {
                if matches!(drawing, Drawing::Line | Drawing::Dash) {
                    if st.line {
                        // One segment into the culled chunk keeps the
                        // polyline joined on its way off screen.
                        let point = data[d]
                            .read_row(st.id)
                            .map(|row| row_point(row, st.id, col_x, col_y));
                        if let Some((xv, yv)) = point {
                            if xv.is_finite() && yv.is_finite() {
                                let a = (map_x.apply(st.last.0), map_y.apply(st.last.1));
                                let b = (map_x.apply(xv), map_y.apply(yv));
                                if let Some(clipped) = clip_segment(vp, a, b) {
                                    emit_segment(surface, &pen, drawing, clipped);
                                    self.pool.add_pair(f, drawing, width, st.last, (xv, yv));
                                }
                            }
                        }
                    }
                    st.line = false;
                }
                st.skipped = true;
                st.id = stretch_end;
                if st.id >= top {
                    st.phase = if st.id >= tail {
                        DrawPhase::Finished
                    } else {
                        DrawPhase::Interrupted
                    };
                    break;
                }
                continue;
            }

            if st.skipped {
                // Re-entering visible territory: seed the run from the
                // culled chunk's final row so the connecting segment
                // gets drawn.
                if matches!(drawing, Drawing::Line | Drawing::Dash) && st.id > head {
                    let seed = data[d]
                        .read_row(st.id - 1)
                        .map(|row| row_point(row, st.id - 1, col_x, col_y));
                    if let Some((xv, yv)) = seed {
                        if xv.is_finite() && yv.is_finite() {
                            st.last = (xv, yv);
                            st.line = true;
                        }
                    }
                }
                st.skipped = false;
            }

            let until = stretch_end.min(top).min(tail);
            while st.id < until {
                let point = match data[d].read_row(st.id) {
                    Some(row) => row_point(row, st.id, col_x, col_y),
                    None => {
                        st.phase = DrawPhase::Finished;
                        break 'unit;
                    }
                };
                let (xv, yv) = point;
                let finite = xv.is_finite() && yv.is_finite();

                match drawing {
                    Drawing::Line | Drawing::Dash => {
                        if finite {
                            if st.line {
                                let a = (map_x.apply(st.last.0), map_y.apply(st.last.1));
                                let b = (map_x.apply(xv), map_y.apply(yv));
                                if let Some(clipped) = clip_segment(vp, a, b) {
                                    emit_segment(surface, &pen, drawing, clipped);
                                    self.pool.add_pair(f, drawing, width, st.last, (xv, yv));
                                }
                            }
                            st.last = (xv, yv);
                            st.line = true;
                        } else {
                            st.line = false;
                        }
                    }
                    Drawing::Dot => {
                        if finite {
                            let px = map_x.apply(xv);
                            let py = map_y.apply(yv);
                            if point_visible(vp, px, py) {
                                surface.dot(&pen, px, py);
                                self.pool.add_point(f, drawing, width, (xv, yv));
                            }
                        }
                    }
                }
                st.id += 1;
            }

            if st.id >= tail {
                st.phase = DrawPhase::Finished;
                break;
            }
            if st.id >= top {
                st.phase = DrawPhase::Interrupted;
                break;
            }
        }

        self.states[f] = st;
    }

    // ========================================================================
    // Replay
    // ========================================================================

    /// Paint the completed sketch chain through the live axis windows.
    pub fn replay<S: Surface>(
        &self,
        surface: &mut S,
        axes: &Axes,
        figures: &Figures,
        vp: &Viewport,
    ) {
        for node in self.pool.replay() {
            let f = node.figure();
            let fig = match figures.get(f) {
                Some(fig) if fig.busy() => fig,
                _ => continue,
            };
            let map_x = axes.to_pixels(fig.axis_x(), vp);
            let map_y = axes.to_pixels(fig.axis_y(), vp);
            let pen = Pen::figure(f, fig.hidden(), node.width());

            match node.drawing() {
                Drawing::Line | Drawing::Dash => {
                    for pair in node.points().chunks_exact(2) {
                        let a = (map_x.apply(pair[0].0), map_y.apply(pair[0].1));
                        let b = (map_x.apply(pair[1].0), map_y.apply(pair[1].1));
                        if let Some(clipped) = clip_segment(vp, a, b) {
                            emit_segment(surface, &pen, node.drawing(), clipped);
                        }
                    }
                }
                Drawing::Dot => {
                    for p in node.points() {
                        let px = map_x.apply(p.0);
                        let py = map_y.apply(p.1);
                        if point_visible(vp, px, py) {
                            surface.dot(&pen, px, py);
                        }
                    }
                }
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn emit_segment<S: Surface>(
    surface: &mut S,
    pen: &Pen,
    drawing: Drawing,
    ((ax, ay), (bx, by)): ((f64, f64), (f64, f64)),
) {
    if drawing == Drawing::Dash {
        surface.dash(pen, ax, ay, bx, by);
    } else {
        surface.line(pen, ax, ay, bx, by);
    }
}

fn row_point<T: Real>(row: &[T], id: u64, col_x: Source, col_y: Source) -> (f64, f64) {
    let value = |source: Source| match source {
        Source::RowId => id as f64,
        Source::Col(c) => row.get(c).map_or(f64::NAN, |v| v.as_f64()),
    };
    (value(col_x), value(col_y))
}

/// Whether cached chunk bounds prove the chunk invisible on one axis.
fn stat_offscreen<T: Real>(
    stat: Option<ChunkStat<T>>,
    map: &Affine<f64>,
    lo_edge: f64,
    hi_edge: f64,
) -> bool {
    let stat = match stat {
        Some(stat) if stat.computed => stat,
        _ => return false,
    };
    if !stat.finite {
        return true;
    }
    let a = map.apply(stat.min.as_f64());
    let b = map.apply(stat.max.as_f64());
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    hi < lo_edge || lo > hi_edge
}
