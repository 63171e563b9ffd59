//! High-level plotting facade.
//!
//! ## Purpose
//!
//! This module is the user-facing entry point. A [`PlotBuilder`]
//! validates capacities and produces a [`Plot`], which owns every lower
//! layer: datasets, derived-column banks, the range cache, axes,
//! figures, groups, and the trial renderer. Hosts feed rows in, bind
//! figures, and call [`Plot::draw`] once per frame with their surface
//! and clock; everything else (streaming refresh, layout, budgeted
//! recording, overlays) happens inside.
//!
//! ## Design notes
//!
//! * **Validated**: the builder rejects out-of-range capacities before
//!   any allocation happens, and flags parameters supplied twice.
//! * **Degrading**: per-frame paths never return errors. A figure flow
//!   that cannot finish (no free slot, no free axis) logs and leaves
//!   the model as it was.
//! * **Pixel-free model**: the plot keeps data-space state; pixels
//!   exist only during a `draw` call and in the hit-test helpers.
//!
//! ## Key concepts
//!
//! 1. **Figure flows**: `figure_binary`, `figure_polyfit` and friends
//!    compose derived columns, claim axes, and label the result the
//!    way the source figures were labelled.
//! 2. **Overlays**: legend and readout box live in screen space with
//!    draggable anchors, clamped to the viewport each frame.
//! 3. **Slicing**: a cursor probe snaps to the nearest sample per
//!    visible figure along one axis; a second switch freezes a base
//!    point and readouts turn into deltas.
//!
//! ## Edge cases
//!
//! * `draw` with no busy figures still lays out axes and clears
//!   overlay geometry; hit tests then miss everywhere.
//! * Readout text formatting falls back to exponent form when a value
//!   does not fit the fixed-point window.
//! * A polynomial fit over an empty window fails with `NoSamples`
//!   rather than producing a garbage curve.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::string::String;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

// External dependencies
use core::fmt::Write as _;
use log::error;
use num_traits::Float;

// Internal dependencies
use crate::cache::range::{ChunkStat, RangeCache};
use crate::columns::engine::{
    get_binary, get_bitmask, get_cumulative, get_difference, get_lowpass, get_polyfit,
    get_resample, get_scale, get_unwrap, refresh_streaming,
};
use crate::columns::ops::{BinaryOp, SlotBank, SlotOp, POLY_MAX};
use crate::math::affine::{Affine, Viewport};
use crate::math::lse::{Lse, LseSolution, CASCADE_MAX, FULL_MAX};
use crate::model::axis::{Axes, AxisRole, SlaveAction};
use crate::model::figure::{
    axis_remove, figure_add, figure_garbage, figure_make_individual, figure_move_axes,
    figure_remove, scale_auto, scale_auto_cond, scale_default, Drawing, Figures, Groups,
};
use crate::primitives::errors::PlotError;
use crate::primitives::value::Real;
use crate::render::renderer::Render;
use crate::render::surface::{Clock, Ink, Pen, Surface};
use crate::storage::dataset::{Dataset, Source, StoreConfig};

// ============================================================================
// Defaults
// ============================================================================

const DATASETS_DEFAULT: usize = 10;
const FIGURES_DEFAULT: usize = 8;
const AXES_DEFAULT: usize = 9;
const GROUPS_DEFAULT: usize = 8;
const DERIVED_DEFAULT: usize = 10;
const CHUNK_BYTES_DEFAULT: usize = 16384;
const CHUNK_CAP_DEFAULT: usize = 4096;
const CACHE_SLOTS_DEFAULT: usize = 8;
const RANGE_SLOTS_DEFAULT: usize = 40;
const SKETCH_NODES_DEFAULT: usize = 800;
const SLICE_SPAN_DEFAULT: usize = 4;
const BUDGET_MS_DEFAULT: u64 = 20;
const MARGIN_DEFAULT: usize = 16;
const PRECISION_DEFAULT: usize = 9;
const LINE_WIDTH_DEFAULT: usize = 2;
const HIT_RADIUS_DEFAULT: usize = 5;

/// Gap between the screen edge and anything drawn, in pixels.
const BORDER: i32 = 5;
/// Pixels reserved for an axis rail's tick teeth.
const TICK_TOOTH: i32 = 5;
/// Label characters kept when composing a combined figure's label.
const COMBINE_LABEL_CAP: usize = 35;
/// Label characters kept when prefixing a filtered figure's label.
const FILTER_LABEL_CAP: usize = 75;

// ============================================================================
// Builder
// ============================================================================

/// Fluent configuration for a [`Plot`].
///
/// Every capacity has a default; setters override it. Supplying the
/// same parameter twice is an error at `build` time.
#[derive(Debug, Clone)]
pub struct PlotBuilder {
    datasets: Option<usize>,
    figures: Option<usize>,
    axes: Option<usize>,
    groups: Option<usize>,
    derived: Option<usize>,
    chunk_bytes: Option<usize>,
    chunk_cap: Option<usize>,
    cache_slots: Option<usize>,
    range_slots: Option<usize>,
    sketch_nodes: Option<usize>,
    slice_span: Option<usize>,
    budget_ms: Option<u64>,
    margin: Option<usize>,
    precision: Option<usize>,
    line_width: Option<usize>,
    hit_radius: Option<usize>,
    compress: Option<bool>,
    /// First parameter that was provided more than once, if any.
    duplicate_param: Option<&'static str>,
}

impl PlotBuilder {
    /// Start from defaults.
    pub fn new() -> Self {
        Self {
            datasets: None,
            figures: None,
            axes: None,
            groups: None,
            derived: None,
            chunk_bytes: None,
            chunk_cap: None,
            cache_slots: None,
            range_slots: None,
            sketch_nodes: None,
            slice_span: None,
            budget_ms: None,
            margin: None,
            precision: None,
            line_width: None,
            hit_radius: None,
            compress: None,
            duplicate_param: None,
        }
    }

    /// Dataset table size. Defaults to 10.
    pub fn datasets(mut self, count: usize) -> Self {
        if self.datasets.is_some() {
            self.duplicate_param = Some("datasets");
        }
        self.datasets = Some(count);
        self
    }

    /// Figure table size. Defaults to 8.
    pub fn figures(mut self, count: usize) -> Self {
        if self.figures.is_some() {
            self.duplicate_param = Some("figures");
        }
        self.figures = Some(count);
        self
    }

    /// Axis table size, at least two. Defaults to 9.
    pub fn axes(mut self, count: usize) -> Self {
        if self.axes.is_some() {
            self.duplicate_param = Some("axes");
        }
        self.axes = Some(count);
        self
    }

    /// Group table size. Defaults to 8.
    pub fn groups(mut self, count: usize) -> Self {
        if self.groups.is_some() {
            self.duplicate_param = Some("groups");
        }
        self.groups = Some(count);
        self
    }

    /// Derived-column slots per dataset. Defaults to 10.
    pub fn derived(mut self, count: usize) -> Self {
        if self.derived.is_some() {
            self.duplicate_param = Some("derived");
        }
        self.derived = Some(count);
        self
    }

    /// Target chunk size in bytes. Defaults to 16384.
    pub fn chunk_bytes(mut self, bytes: usize) -> Self {
        if self.chunk_bytes.is_some() {
            self.duplicate_param = Some("chunk_bytes");
        }
        self.chunk_bytes = Some(bytes);
        self
    }

    /// Upper bound on chunks per dataset. Defaults to 4096.
    pub fn chunk_cap(mut self, chunks: usize) -> Self {
        if self.chunk_cap.is_some() {
            self.duplicate_param = Some("chunk_cap");
        }
        self.chunk_cap = Some(chunks);
        self
    }

    /// Decompression cache slots per dataset. Defaults to 8.
    pub fn cache_slots(mut self, slots: usize) -> Self {
        if self.cache_slots.is_some() {
            self.duplicate_param = Some("cache_slots");
        }
        self.cache_slots = Some(slots);
        self
    }

    /// Range cache slots shared across datasets. Defaults to 40.
    pub fn range_slots(mut self, slots: usize) -> Self {
        if self.range_slots.is_some() {
            self.duplicate_param = Some("range_slots");
        }
        self.range_slots = Some(slots);
        self
    }

    /// Sketch pool node count. Defaults to 800.
    pub fn sketch_nodes(mut self, nodes: usize) -> Self {
        if self.sketch_nodes.is_some() {
            self.duplicate_param = Some("sketch_nodes");
        }
        self.sketch_nodes = Some(nodes);
        self
    }

    /// Chunks probed around a slice cursor hit. Defaults to 4.
    pub fn slice_span(mut self, chunks: usize) -> Self {
        if self.slice_span.is_some() {
            self.duplicate_param = Some("slice_span");
        }
        self.slice_span = Some(chunks);
        self
    }

    /// Per-frame recording budget in milliseconds. Defaults to 20.
    /// Zero still advances one work unit per frame.
    pub fn budget_ms(mut self, ms: u64) -> Self {
        if self.budget_ms.is_some() {
            self.duplicate_param = Some("budget_ms");
        }
        self.budget_ms = Some(ms);
        self
    }

    /// Autoscale margin in pixels. Defaults to 16.
    pub fn margin(mut self, pixels: usize) -> Self {
        if self.margin.is_some() {
            self.duplicate_param = Some("margin");
        }
        self.margin = Some(pixels);
        self
    }

    /// Significant digits in readout text. Defaults to 9.
    pub fn precision(mut self, digits: usize) -> Self {
        if self.precision.is_some() {
            self.duplicate_param = Some("precision");
        }
        self.precision = Some(digits);
        self
    }

    /// Default figure line width in pixels. Defaults to 2.
    pub fn line_width(mut self, pixels: usize) -> Self {
        if self.line_width.is_some() {
            self.duplicate_param = Some("line_width");
        }
        self.line_width = Some(pixels);
        self
    }

    /// Pixel tolerance for picking a figure by its curve. Defaults to 5.
    pub fn hit_radius(mut self, pixels: usize) -> Self {
        if self.hit_radius.is_some() {
            self.duplicate_param = Some("hit_radius");
        }
        self.hit_radius = Some(pixels);
        self
    }

    /// Store chunks compressed. Defaults to off.
    pub fn compress(mut self, on: bool) -> Self {
        if self.compress.is_some() {
            self.duplicate_param = Some("compress");
        }
        self.compress = Some(on);
        self
    }

    /// Validate the configuration, failing fast on the first violation.
    fn validate(&self) -> Result<(), PlotError> {
        // Check 1: no parameter was supplied twice.
        if let Some(name) = self.duplicate_param {
            return Err(PlotError::DuplicateParameter(name));
        }

        // Check 2: table capacities.
        at_least(self.datasets, "datasets", 1)?;
        at_least(self.figures, "figures", 1)?;
        at_least(self.axes, "axes", 2)?;
        at_least(self.groups, "groups", 1)?;

        // Check 3: storage geometry.
        at_least(self.chunk_bytes, "chunk_bytes", 256)?;
        at_least(self.chunk_cap, "chunk_cap", 1)?;
        at_least(self.cache_slots, "cache_slots", 1)?;

        // Check 4: shared caches. The trial walk and conditional
        // ranging each hold two fetched range slots at once, so one
        // slot would thrash.
        at_least(self.range_slots, "range_slots", 2)?;
        at_least(self.sketch_nodes, "sketch_nodes", 1)?;
        at_least(self.slice_span, "slice_span", 1)?;

        // Check 5: cosmetics.
        at_least(self.precision, "precision", 1)?;
        at_least(self.line_width, "line_width", 1)?;
        at_least(self.hit_radius, "hit_radius", 1)?;

        Ok(())
    }

    /// Build the plot, allocating every table at its configured size.
    pub fn build<T: Real>(self) -> Result<Plot<T>, PlotError> {
        self.validate()?;

        let datasets = self.datasets.unwrap_or(DATASETS_DEFAULT);
        let figures = self.figures.unwrap_or(FIGURES_DEFAULT);
        let axes = self.axes.unwrap_or(AXES_DEFAULT);
        let groups = self.groups.unwrap_or(GROUPS_DEFAULT);
        let derived = self.derived.unwrap_or(DERIVED_DEFAULT);
        let sketch_nodes = self.sketch_nodes.unwrap_or(SKETCH_NODES_DEFAULT);

        let cfg = StoreConfig {
            derived,
            chunk_bytes: self.chunk_bytes.unwrap_or(CHUNK_BYTES_DEFAULT),
            chunk_cap: self.chunk_cap.unwrap_or(CHUNK_CAP_DEFAULT),
            cache_slots: self.cache_slots.unwrap_or(CACHE_SLOTS_DEFAULT),
            compress: self.compress.unwrap_or(false),
        };

        let mut data = Vec::new();
        data.resize_with(datasets, Dataset::default);
        let mut banks = Vec::new();
        banks.resize_with(datasets, || SlotBank::new(derived));

        // Readout rows serve both slice values (one per figure) and
        // polynomial reports (one per coefficient plus the deviation).
        let rows = figures.max(POLY_MAX + 2);
        let mut box_text = Vec::new();
        box_text.resize_with(rows, String::new);

        let mut slice = Vec::new();
        slice.resize_with(figures, SliceHit::default);

        Ok(Plot {
            cfg,
            data,
            banks,
            rcache: RangeCache::new(self.range_slots.unwrap_or(RANGE_SLOTS_DEFAULT)),
            axes: Axes::new(axes),
            figures: Figures::new(figures),
            groups: Groups::new(groups, datasets),
            render: Render::new(figures, sketch_nodes),
            screen: Viewport::new(0, 0, 0, 0),
            viewport: Viewport::new(0, 0, 0, 0),
            font_height: 0,
            font_long: 0,
            margin: self.margin.unwrap_or(MARGIN_DEFAULT) as i32,
            budget_ms: self.budget_ms.unwrap_or(BUDGET_MS_DEFAULT),
            slice_span: self.slice_span.unwrap_or(SLICE_SPAN_DEFAULT),
            precision: self.precision.unwrap_or(PRECISION_DEFAULT),
            default_width: self.line_width.unwrap_or(LINE_WIDTH_DEFAULT) as i32,
            hit_radius: self.hit_radius.unwrap_or(HIT_RADIUS_DEFAULT) as i32,
            legend_x: 0,
            legend_y: 0,
            legend_size_x: 0,
            legend_rows: 0,
            data_box: DataBoxMode::Free,
            data_box_x: 0,
            data_box_y: 0,
            data_box_size_x: 0,
            data_box_rows: 0,
            box_text,
            slice_on: false,
            slice_range_on: 0,
            slice_axis: None,
            slice,
            hover_axis: None,
            hover_figure: None,
            hover_legend: false,
            hover_data_box: false,
        })
    }
}

impl Default for PlotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn at_least(v: Option<usize>, name: &'static str, min: usize) -> Result<(), PlotError> {
    if let Some(got) = v {
        if got < min {
            return Err(PlotError::InvalidParameter { name, got, min });
        }
    }
    Ok(())
}

// ============================================================================
// Overlay State
// ============================================================================

/// What the readout box is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataBoxMode {
    /// Hidden.
    #[default]
    Free,
    /// Per-figure slice values or deltas.
    Slice,
    /// Polynomial fit coefficients and deviation.
    Polyfit,
}

/// Snapped slice sample for one figure, in data space.
#[derive(Debug, Clone, Copy, Default)]
struct SliceHit {
    busy: bool,
    x: f64,
    y: f64,
    base_x: f64,
    base_y: f64,
}

/// Derivation applied by a filter flow.
enum FilterKind {
    Difference,
    Cumulative,
    Bitmask { low: u32, high: u32 },
    LowPass { gain: f64 },
}

// ============================================================================
// Plot
// ============================================================================

/// A complete plotting instrument.
///
/// Owns the storage, model, and render layers. One `Plot` serves one
/// drawing area; hosts drive it with rows, bindings, cursor events,
/// and one [`draw`](Plot::draw) per frame.
#[derive(Debug)]
pub struct Plot<T: Real> {
    /// Storage geometry applied to every dataset allocation.
    cfg: StoreConfig,
    data: Vec<Dataset<T>>,
    banks: Vec<SlotBank>,
    rcache: RangeCache<T>,
    axes: Axes,
    figures: Figures,
    groups: Groups,
    render: Render,

    /// Host drawing area, set each frame.
    screen: Viewport,
    /// Curve area left after axis rails and borders.
    viewport: Viewport,
    font_height: i32,
    font_long: i32,

    margin: i32,
    budget_ms: u64,
    slice_span: usize,
    precision: usize,
    default_width: i32,
    hit_radius: i32,

    legend_x: i32,
    legend_y: i32,
    legend_size_x: i32,
    legend_rows: usize,

    data_box: DataBoxMode,
    data_box_x: i32,
    data_box_y: i32,
    data_box_size_x: i32,
    data_box_rows: usize,
    box_text: Vec<String>,

    slice_on: bool,
    /// 0 off, 1 tracking deltas, 2 frozen.
    slice_range_on: u8,
    slice_axis: Option<usize>,
    slice: Vec<SliceHit>,

    hover_axis: Option<usize>,
    hover_figure: Option<usize>,
    hover_legend: bool,
    hover_data_box: bool,
}

// ============================================================================
// Dataset Lifecycle
// ============================================================================

impl<T: Real> Plot<T> {
    /// Allocate (or re-arm) a dataset with `columns` primary columns
    /// and a ring capacity of `length` rows.
    pub fn data_alloc(&mut self, d: usize, columns: usize, length: usize) -> Result<(), PlotError> {
        self.check_dataset(d)?;
        self.data[d].alloc(columns, length, &self.cfg)?;
        self.rcache.drop_dataset(d);
        self.render.invalidate();
        Ok(())
    }

    /// Change a dataset's ring capacity. Growing preserves retained
    /// rows; shrinking discards them.
    pub fn data_resize(&mut self, d: usize, length: usize) -> Result<(), PlotError> {
        self.check_dataset(d)?;
        if !self.data[d].is_allocated() {
            return Err(PlotError::DatasetUnallocated(d));
        }
        self.data[d].resize(length)?;
        self.rcache.drop_dataset(d);
        self.render.invalidate();
        Ok(())
    }

    /// Double a dataset's ring capacity.
    pub fn data_grow(&mut self, d: usize) -> Result<(), PlotError> {
        self.check_dataset(d)?;
        if !self.data[d].is_allocated() {
            return Err(PlotError::DatasetUnallocated(d));
        }
        self.data[d].grow()?;
        self.rcache.drop_dataset(d);
        self.render.invalidate();
        Ok(())
    }

    /// Append one row of primary cells.
    pub fn data_insert(&mut self, d: usize, row: &[T]) -> Result<(), PlotError> {
        self.check_dataset(d)?;
        if !self.data[d].is_allocated() {
            return Err(PlotError::DatasetUnallocated(d));
        }
        let columns = self.data[d].columns();
        if row.len() != columns {
            return Err(PlotError::ColumnCountConflict {
                requested: row.len(),
                allocated: columns,
            });
        }
        if let Some(k) = self.data[d].insert(row) {
            self.rcache.wipe_chunk(d, k);
        }
        Ok(())
    }

    /// Tear one dataset down: remove its figures, release its derived
    /// slots, and free its rows.
    pub fn data_clean(&mut self, d: usize) -> Result<(), PlotError> {
        self.check_dataset(d)?;
        figure_garbage(
            &mut self.axes,
            &mut self.figures,
            &mut self.data,
            &mut self.banks,
            &mut self.rcache,
            d,
        );
        self.banks[d].clear();
        self.data[d].clean();
        self.rcache.drop_dataset(d);
        self.render.invalidate();
        Ok(())
    }

    /// Resident bytes of one dataset's chunk backing.
    pub fn memory_usage(&self, d: usize) -> Result<u64, PlotError> {
        self.check_dataset(d)?;
        Ok(self.data[d].memory_usage())
    }

    /// Bytes the same rows would occupy uncompressed.
    pub fn memory_uncompressed(&self, d: usize) -> Result<u64, PlotError> {
        self.check_dataset(d)?;
        Ok(self.data[d].memory_uncompressed())
    }

    fn check_dataset(&self, d: usize) -> Result<(), PlotError> {
        if d >= self.data.len() {
            return Err(PlotError::DatasetIndex {
                got: d,
                max: self.data.len(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Derived Columns
// ============================================================================

impl<T: Real> Plot<T> {
    /// Register `source * scale + offset`, reusing an identical slot.
    pub fn column_scale(
        &mut self,
        d: usize,
        source: Source,
        scale: f64,
        offset: f64,
    ) -> Result<usize, PlotError> {
        self.check_dataset(d)?;
        get_scale(
            &mut self.data,
            &mut self.banks,
            &mut self.rcache,
            d,
            source,
            scale,
            offset,
        )
    }

    /// Register a monotonic unwrap of a wrapping clock column.
    pub fn column_unwrap(&mut self, d: usize, source: Source) -> Result<usize, PlotError> {
        self.check_dataset(d)?;
        get_unwrap(&mut self.data, &mut self.banks, &mut self.rcache, d, source)
    }

    /// Register a pairwise combination of two columns.
    pub fn column_binary(
        &mut self,
        d: usize,
        op: BinaryOp,
        a: Source,
        b: Source,
    ) -> Result<usize, PlotError> {
        self.check_dataset(d)?;
        get_binary(&mut self.data, &mut self.banks, &mut self.rcache, d, op, a, b)
    }

    /// Register a sample-to-sample difference.
    pub fn column_difference(&mut self, d: usize, source: Source) -> Result<usize, PlotError> {
        self.check_dataset(d)?;
        get_difference(&mut self.data, &mut self.banks, &mut self.rcache, d, source)
    }

    /// Register a running sum.
    pub fn column_cumulative(&mut self, d: usize, source: Source) -> Result<usize, PlotError> {
        self.check_dataset(d)?;
        get_cumulative(&mut self.data, &mut self.banks, &mut self.rcache, d, source)
    }

    /// Register a bit-field extraction of `low..=high`.
    pub fn column_bitmask(
        &mut self,
        d: usize,
        source: Source,
        low: u32,
        high: u32,
    ) -> Result<usize, PlotError> {
        self.check_dataset(d)?;
        get_bitmask(
            &mut self.data,
            &mut self.banks,
            &mut self.rcache,
            d,
            source,
            low,
            high,
        )
    }

    /// Register a one-pole low-pass with the given gain.
    pub fn column_lowpass(
        &mut self,
        d: usize,
        source: Source,
        gain: f64,
    ) -> Result<usize, PlotError> {
        self.check_dataset(d)?;
        get_lowpass(
            &mut self.data,
            &mut self.banks,
            &mut self.rcache,
            d,
            source,
            gain,
        )
    }

    /// Register a resample of another dataset's (X, Y) onto this
    /// dataset's X grid.
    pub fn column_resample(
        &mut self,
        d: usize,
        x: Source,
        in_dataset: usize,
        in_x: Source,
        in_y: Source,
    ) -> Result<usize, PlotError> {
        self.check_dataset(d)?;
        self.check_dataset(in_dataset)?;
        get_resample(
            &mut self.data,
            &mut self.banks,
            &mut self.rcache,
            d,
            x,
            in_dataset,
            in_x,
            in_y,
        )
    }
}

// ============================================================================
// Groups
// ============================================================================

impl<T: Real> Plot<T> {
    /// Put a dataset into a group.
    pub fn group_assign(&mut self, g: usize, d: usize) -> Result<(), PlotError> {
        self.check_dataset(d)?;
        self.groups.assign(g, d)
    }

    /// Set a group's label; an empty label keeps the current one.
    pub fn group_label(&mut self, g: usize, label: &str) -> Result<(), PlotError> {
        self.groups.set_label(g, label)
    }

    /// The label of the group a dataset belongs to, if any.
    pub fn group_text(&self, d: usize) -> Option<&str> {
        self.groups.of_dataset(d)
    }
}

// ============================================================================
// Axes
// ============================================================================

impl<T: Real> Plot<T> {
    /// Set an axis label; an empty label keeps the current one.
    pub fn axis_label(&mut self, a: usize, label: &str) -> Result<(), PlotError> {
        self.axes.check(a)?;
        self.axes.set_label(a, label);
        Ok(())
    }

    /// Window an axis onto `[min, max]` and release its scale lock.
    pub fn axis_scale_manual(&mut self, a: usize, min: f64, max: f64) -> Result<(), PlotError> {
        self.axes.check(a)?;
        self.axes.scale_manual(a, min, max);
        self.render.invalidate();
        Ok(())
    }

    /// Autoscale an axis to its figures' bounds and arm its scale lock.
    pub fn axis_scale_auto(&mut self, a: usize) -> Result<(), PlotError> {
        self.axes.check(a)?;
        scale_auto(
            &mut self.data,
            &mut self.rcache,
            &mut self.axes,
            &self.figures,
            a,
            &self.viewport,
            self.margin,
        );
        self.render.invalidate();
        Ok(())
    }

    /// Autoscale an axis over the rows whose paired value on `cond`
    /// lies inside that axis's current window.
    pub fn axis_scale_auto_cond(&mut self, a: usize, cond: usize) -> Result<(), PlotError> {
        self.axes.check(a)?;
        self.axes.check(cond)?;
        scale_auto_cond(
            &mut self.data,
            &mut self.rcache,
            &mut self.axes,
            &self.figures,
            a,
            Some(cond),
            &self.viewport,
            self.margin,
        );
        self.render.invalidate();
        Ok(())
    }

    /// Autoscale every busy axis whose scale lock is armed.
    pub fn axis_scale_default(&mut self) {
        scale_default(
            &mut self.data,
            &mut self.rcache,
            &mut self.axes,
            &self.figures,
            &self.viewport,
            self.margin,
        );
        self.render.invalidate();
    }

    /// Zoom an axis around a pixel origin; releases its scale lock.
    pub fn axis_zoom(&mut self, a: usize, origin: i32, zoom: f64) -> Result<(), PlotError> {
        self.axes.check(a)?;
        self.axes.zoom(a, &self.viewport, origin, zoom);
        self.render.invalidate();
        Ok(())
    }

    /// Pan an axis by a pixel delta.
    pub fn axis_shift(&mut self, a: usize, delta: i32) -> Result<(), PlotError> {
        self.axes.check(a)?;
        self.axes.shift(a, &self.viewport, delta);
        self.render.invalidate();
        Ok(())
    }

    /// Give the default Y axis the same units-per-pixel as the default X.
    pub fn axis_scale_equal(&mut self) {
        self.axes.scale_equal(&self.viewport);
        self.render.invalidate();
    }

    /// Arm or release the scale lock on every busy axis.
    pub fn axis_scale_lock(&mut self, lock: bool) {
        self.axes.scale_lock(lock);
    }

    /// Slave an axis to a base so they pan and zoom together.
    pub fn axis_slave(
        &mut self,
        a: usize,
        base: usize,
        action: SlaveAction,
    ) -> Result<(), PlotError> {
        self.axes.slave(a, base, action)?;
        self.render.invalidate();
        Ok(())
    }

    /// Unbind a slave axis, folding the combined mapping into it.
    pub fn axis_slave_disable(&mut self, a: usize) -> Result<(), PlotError> {
        self.axes.slave_disable(a)?;
        self.render.invalidate();
        Ok(())
    }

    /// Free an axis, rebinding its figures onto defaults or bases.
    pub fn axis_remove(&mut self, a: usize) -> Result<(), PlotError> {
        axis_remove(
            &mut self.axes,
            &mut self.figures,
            &mut self.data,
            &mut self.banks,
            &mut self.rcache,
            a,
        )?;
        if self.slice_axis == Some(a) {
            self.slice_axis = None;
        }
        self.render.invalidate();
        Ok(())
    }
}

// ============================================================================
// Figures
// ============================================================================

impl<T: Real> Plot<T> {
    /// Bind a figure slot to a dataset's (X, Y) columns and two axes.
    ///
    /// Free axes are claimed and their scale locks armed; the first
    /// bound figure becomes the pan/zoom default.
    #[allow(clippy::too_many_arguments)]
    pub fn figure_add(
        &mut self,
        f: usize,
        dataset: usize,
        col_x: Source,
        col_y: Source,
        axis_x: usize,
        axis_y: usize,
        label: &str,
    ) -> Result<(), PlotError> {
        figure_add(
            &mut self.axes,
            &mut self.figures,
            &self.data,
            f,
            dataset,
            col_x,
            col_y,
            axis_x,
            axis_y,
            label,
            Drawing::Line,
            self.default_width,
        )?;
        self.render.invalidate();
        Ok(())
    }

    /// Unbind a figure, freeing orphaned axes and derived slots.
    pub fn figure_remove(&mut self, f: usize) -> Result<(), PlotError> {
        figure_remove(
            &mut self.axes,
            &mut self.figures,
            &mut self.data,
            &mut self.banks,
            &mut self.rcache,
            f,
        )?;
        self.render.invalidate();
        Ok(())
    }

    /// Hide or show a figure without unbinding it.
    pub fn figure_hide(&mut self, f: usize, hidden: bool) -> Result<(), PlotError> {
        self.figures.check_busy(f)?;
        self.figures.list[f].hidden = hidden;
        self.render.invalidate();
        Ok(())
    }

    /// Change a figure's drawing style and line width.
    pub fn figure_drawing(
        &mut self,
        f: usize,
        drawing: Drawing,
        width: i32,
    ) -> Result<(), PlotError> {
        self.figures.check_busy(f)?;
        self.figures.list[f].drawing = drawing;
        self.figures.list[f].width = width.max(1);
        self.render.invalidate();
        Ok(())
    }

    /// Swap two figure slots, keeping overlay row order stable.
    pub fn figure_exchange(&mut self, f1: usize, f2: usize) -> Result<(), PlotError> {
        self.figures.exchange(f1, f2)?;
        self.render.invalidate();
        Ok(())
    }

    /// Rebind a figure onto the current default axes.
    pub fn figure_move_axes(&mut self, f: usize) -> Result<(), PlotError> {
        figure_move_axes(
            &mut self.axes,
            &mut self.figures,
            &mut self.data,
            &mut self.banks,
            &mut self.rcache,
            f,
        )?;
        self.render.invalidate();
        Ok(())
    }

    /// Move a figure off shared axes onto private ones, windowed like
    /// the axes it left.
    pub fn figure_make_individual(&mut self, f: usize) -> Result<(), PlotError> {
        figure_make_individual(
            &mut self.axes,
            &mut self.figures,
            &mut self.data,
            &mut self.rcache,
            f,
            &self.viewport,
            self.margin,
        )?;
        self.render.invalidate();
        Ok(())
    }

    /// Unbind every figure and reset axes, overlays, and slicing.
    ///
    /// Axis windows and scale locks survive so a rebuilt binding lands
    /// in familiar coordinates. Dataset rows are untouched.
    pub fn figure_clean(&mut self) {
        for fig in &mut self.figures.list {
            fig.busy = false;
            fig.hidden = false;
            fig.label.clear();
        }
        for a in 0..self.axes.list.len() {
            self.axes.reset_entry(a);
        }
        self.axes.on_x = None;
        self.axes.on_y = None;

        self.legend_x = 0;
        self.legend_y = 0;
        self.data_box = DataBoxMode::Free;
        self.data_box_x = self.viewport.max_x;
        self.data_box_y = 0;
        for text in &mut self.box_text {
            text.clear();
        }

        self.slice_on = false;
        self.slice_range_on = 0;
        self.slice_axis = None;
        for hit in &mut self.slice {
            *hit = SliceHit::default();
        }

        self.hover_clear();
        self.render.invalidate();
    }
}

// ============================================================================
// Figure Flows
// ============================================================================

impl<T: Real> Plot<T> {
    /// Replace a figure's X column with its monotonic unwrap.
    pub fn figure_time_unwrap(&mut self, f: usize) -> Result<(), PlotError> {
        self.figures.check_busy(f)?;
        let d = self.figures.list[f].dataset;
        let src = self.figures.list[f].col_x;
        let col = get_unwrap(&mut self.data, &mut self.banks, &mut self.rcache, d, src)?;
        self.figures.list[f].col_x = Source::Col(col);
        self.render.invalidate();
        Ok(())
    }

    /// Replace a figure's X or Y column with a scaled derivation.
    pub fn figure_scale(
        &mut self,
        f: usize,
        role: AxisRole,
        scale: f64,
        offset: f64,
    ) -> Result<(), PlotError> {
        self.figures.check_busy(f)?;
        let d = self.figures.list[f].dataset;
        match role {
            AxisRole::BusyX => {
                let src = self.figures.list[f].col_x;
                let col = get_scale(
                    &mut self.data,
                    &mut self.banks,
                    &mut self.rcache,
                    d,
                    src,
                    scale,
                    offset,
                )?;
                self.figures.list[f].col_x = Source::Col(col);
            }
            AxisRole::BusyY => {
                let src = self.figures.list[f].col_y;
                let col = get_scale(
                    &mut self.data,
                    &mut self.banks,
                    &mut self.rcache,
                    d,
                    src,
                    scale,
                    offset,
                )?;
                self.figures.list[f].col_y = Source::Col(col);
            }
            AxisRole::Free => {}
        }
        self.render.invalidate();
        Ok(())
    }

    /// Combine two figures pointwise into a new one.
    ///
    /// Both must share their X axis. When the second figure lives on a
    /// different dataset or X column, its Y is first resampled onto
    /// the first figure's X grid. The result claims a free Y axis when
    /// one exists and is autoscaled against the shared X window.
    pub fn figure_binary(
        &mut self,
        f1: usize,
        f2: usize,
        op: BinaryOp,
    ) -> Result<usize, PlotError> {
        self.figures.check_busy(f1)?;
        self.figures.check_busy(f2)?;
        let f = self.figures.free_figure().ok_or(PlotError::NoFreeFigure)?;
        self.binary_add(f, f1, f2, op)?;

        let ax = self.figures.list[f].axis_x;
        let ay = self.figures.list[f].axis_y;
        scale_auto_cond(
            &mut self.data,
            &mut self.rcache,
            &mut self.axes,
            &self.figures,
            ay,
            Some(ax),
            &self.viewport,
            self.margin,
        );
        self.focus_axes(ax, ay);
        self.render.invalidate();
        Ok(f)
    }

    /// Toggle between two visible figures and their combination.
    ///
    /// With one visible figure that is a recorded combination, the
    /// operands come back and it hides. With two visible figures, an
    /// existing combination of exactly those two is shown instead, or
    /// a new one is built. Failures log and leave the view unchanged.
    pub fn figure_binary_switch(&mut self, op: BinaryOp) {
        let mut visible = [0usize; 2];
        let mut seen = 0;
        for (f, fig) in self.figures.list.iter().enumerate() {
            if fig.busy && !fig.hidden {
                if seen < 2 {
                    visible[seen] = f;
                }
                seen += 1;
            }
        }

        if seen == 1 {
            let f = visible[0];
            if let Some((f1, f2)) = self.binary_operands(f, op) {
                self.figures.list[f].hidden = true;
                self.figures.list[f1].hidden = false;
                self.figures.list[f2].hidden = false;
                let ax = self.figures.list[f1].axis_x;
                let ay = self.figures.list[f1].axis_y;
                self.focus_axes(ax, ay);
                self.render.invalidate();
            }
            return;
        }
        if seen != 2 {
            return;
        }

        let (f1, f2) = (visible[0], visible[1]);

        let mut found = None;
        for f in 0..self.figures.list.len() {
            if !self.figures.list[f].busy {
                continue;
            }
            if let Some((a, b)) = self.binary_operands(f, op) {
                if (a == f1 && b == f2) || (a == f2 && b == f1) {
                    found = Some(f);
                    break;
                }
            }
        }

        let f = match found {
            Some(f) => {
                self.figures.list[f1].hidden = true;
                self.figures.list[f2].hidden = true;
                self.figures.list[f].hidden = false;

                let ax = self.figures.list[f].axis_x;
                let ay = self.figures.list[f].axis_y;
                let shared_x = ax == self.figures.list[f1].axis_x
                    && ax == self.figures.list[f2].axis_x;
                let shared_y = ay == self.figures.list[f1].axis_y
                    && ay == self.figures.list[f2].axis_y;
                if shared_x {
                    scale_auto_cond(
                        &mut self.data,
                        &mut self.rcache,
                        &mut self.axes,
                        &self.figures,
                        ay,
                        Some(ax),
                        &self.viewport,
                        self.margin,
                    );
                } else if shared_y {
                    scale_auto_cond(
                        &mut self.data,
                        &mut self.rcache,
                        &mut self.axes,
                        &self.figures,
                        ax,
                        Some(ay),
                        &self.viewport,
                        self.margin,
                    );
                }
                f
            }
            None => {
                let f = match self.figures.free_figure() {
                    Some(f) => f,
                    None => {
                        error!("no free figure slot for the combination");
                        return;
                    }
                };
                if let Err(err) = self.binary_add(f, f1, f2, op) {
                    error!("figure combination failed: {err}");
                    return;
                }
                self.figures.list[f1].hidden = true;
                self.figures.list[f2].hidden = true;

                let ax = self.figures.list[f].axis_x;
                let ay = self.figures.list[f].axis_y;
                scale_auto_cond(
                    &mut self.data,
                    &mut self.rcache,
                    &mut self.axes,
                    &self.figures,
                    ay,
                    Some(ax),
                    &self.viewport,
                    self.margin,
                );
                f
            }
        };

        let ax = self.figures.list[f].axis_x;
        let ay = self.figures.list[f].axis_y;
        self.focus_axes(ax, ay);
        self.render.invalidate();
    }

    /// Derive the sample-to-sample difference of a figure's Y.
    pub fn figure_difference(&mut self, f: usize) -> Result<usize, PlotError> {
        self.filter_add(f, FilterKind::Difference)
    }

    /// Derive the running sum of a figure's Y.
    pub fn figure_cumulative(&mut self, f: usize) -> Result<usize, PlotError> {
        self.filter_add(f, FilterKind::Cumulative)
    }

    /// Derive a bit-field extraction of a figure's Y.
    pub fn figure_bitmask(&mut self, f: usize, low: u32, high: u32) -> Result<usize, PlotError> {
        self.filter_add(f, FilterKind::Bitmask { low, high })
    }

    /// Derive a low-pass of a figure's Y, kept on the same Y axis.
    pub fn figure_lowpass(&mut self, f: usize, gain: f64) -> Result<usize, PlotError> {
        self.filter_add(f, FilterKind::LowPass { gain })
    }

    /// Fit a polynomial to a figure's visible window and plot it.
    ///
    /// Only rows whose (X, Y) both land in the current axis windows
    /// enter the fit. The curve shares both axes with its source, and
    /// the readout box shows the coefficients and the deviation.
    pub fn figure_polyfit(&mut self, f1: usize, degree: usize) -> Result<usize, PlotError> {
        self.figures.check_busy(f1)?;
        if degree > POLY_MAX {
            return Err(PlotError::DegreeTooHigh {
                got: degree,
                max: POLY_MAX,
            });
        }
        let f = self.figures.free_figure().ok_or(PlotError::NoFreeFigure)?;

        let d = self.figures.list[f1].dataset;
        let col_x = self.figures.list[f1].col_x;
        let col_y = self.figures.list[f1].col_y;
        let axis_x = self.figures.list[f1].axis_x;
        let axis_y = self.figures.list[f1].axis_y;
        let drawing = self.figures.list[f1].drawing;
        let width = self.figures.list[f1].width;

        let wx = self.axes.composed(axis_x);
        let wy = self.axes.composed(axis_y);
        let solution = self.polyfit_solve(d, col_x, col_y, wx, wy, degree)?;
        let col = get_polyfit(
            &mut self.data,
            &mut self.banks,
            &mut self.rcache,
            d,
            col_x,
            solution.coefficients(0),
        )?;

        figure_add(
            &mut self.axes,
            &mut self.figures,
            &self.data,
            f,
            d,
            col_x,
            Source::Col(col),
            axis_x,
            axis_y,
            "",
            drawing,
            width,
        )?;

        let mut label = String::new();
        {
            let l = clip_label(&self.figures.list[f1].label, FILTER_LABEL_CAP);
            let _ = write!(label, "P: {l}");
        }
        self.figures.list[f].label = label;

        for text in &mut self.box_text {
            text.clear();
        }
        let coefs = solution.coefficients(0);
        for (n, &v) in coefs.iter().enumerate() {
            let mut row = String::new();
            let _ = write!(row, " [{n}] = ");
            if degree == 0 {
                fmt_value(&mut row, v, self.precision);
            } else {
                if !v.is_sign_negative() {
                    row.push(' ');
                }
                let digits = self.precision.saturating_sub(1);
                let _ = write!(row, "{v:.digits$E} ");
            }
            self.box_text[n] = row;
        }
        let mut std_row = String::from(" STD = ");
        fmt_value(&mut std_row, solution.deviation(0), self.precision);
        self.box_text[degree + 1] = std_row;

        if self.data_box != DataBoxMode::Polyfit {
            self.data_box = DataBoxMode::Polyfit;
            self.data_box_x = self.viewport.max_x;
            self.data_box_y = 0;
        }

        self.render.invalidate();
        Ok(f)
    }
}

// ============================================================================
// Flow Helpers
// ============================================================================

impl<T: Real> Plot<T> {
    /// Make `ax`/`ay` the pan and zoom defaults, through slave bases.
    fn focus_axes(&mut self, ax: usize, ay: usize) {
        let ax = self.axes.list[ax].slave.unwrap_or(ax);
        let ay = self.axes.list[ay].slave.unwrap_or(ay);
        self.axes.on_x = Some(ax);
        self.axes.on_y = Some(ay);
    }

    /// Build the combined figure `f` out of `f1 op f2`.
    fn binary_add(
        &mut self,
        f: usize,
        f1: usize,
        f2: usize,
        op: BinaryOp,
    ) -> Result<(), PlotError> {
        let d = self.figures.list[f1].dataset;
        let col_x = self.figures.list[f1].col_x;
        let axis_x = self.figures.list[f1].axis_x;
        let drawing = self.figures.list[f1].drawing;
        let width = self.figures.list[f1].width;

        let other_x = self.figures.list[f2].axis_x;
        if other_x != axis_x {
            return Err(PlotError::BinaryAxes {
                axis_1: axis_x,
                axis_2: other_x,
            });
        }

        // A second operand on a foreign grid is interpolated onto the
        // first operand's X before combining.
        let rhs = if self.figures.list[f2].dataset != d || self.figures.list[f2].col_x != col_x {
            let col = get_resample(
                &mut self.data,
                &mut self.banks,
                &mut self.rcache,
                d,
                col_x,
                self.figures.list[f2].dataset,
                self.figures.list[f2].col_x,
                self.figures.list[f2].col_y,
            )?;
            Source::Col(col)
        } else {
            self.figures.list[f2].col_y
        };

        let lhs = self.figures.list[f1].col_y;
        let col_y = get_binary(
            &mut self.data,
            &mut self.banks,
            &mut self.rcache,
            d,
            op,
            lhs,
            rhs,
        )?;

        let axis_y = match self.axes.free_axis() {
            Some(a) => {
                self.axes.list[a].role = AxisRole::BusyY;
                let label = self.axes.list[self.figures.list[f1].axis_y].label.clone();
                self.axes.set_label(a, &label);
                a
            }
            None => self.figures.list[f1].axis_y,
        };

        figure_add(
            &mut self.axes,
            &mut self.figures,
            &self.data,
            f,
            d,
            col_x,
            Source::Col(col_y),
            axis_x,
            axis_y,
            "",
            drawing,
            width,
        )?;

        let mut label = String::new();
        {
            let l1 = clip_label(&self.figures.list[f1].label, COMBINE_LABEL_CAP);
            let l2 = clip_label(&self.figures.list[f2].label, COMBINE_LABEL_CAP);
            let _ = match op {
                BinaryOp::Subtract => write!(label, "R: ({l1}) - ({l2})"),
                BinaryOp::Add => write!(label, "A: ({l1}) + ({l2})"),
                BinaryOp::Multiply => write!(label, "M: ({l1}) * ({l2})"),
                BinaryOp::Hypot => write!(label, "H: ({l1}) ({l2})"),
            };
        }
        self.figures.list[f].label = label;

        Ok(())
    }

    /// The two busy figures a combined figure was built from, if its
    /// Y column is a matching binary slot and both operands are still
    /// bound.
    fn binary_operands(&self, f: usize, op: BinaryOp) -> Option<(usize, usize)> {
        let fig = &self.figures.list[f];
        let d = fig.dataset;
        let primary = self.data[d].columns();
        let slot = match fig.col_y {
            Source::Col(c) if c >= primary => c - primary,
            _ => return None,
        };
        let (sa, sb) = match self.banks[d].get(slot) {
            Some(SlotOp::Binary { op: sop, a, b }) if *sop == op => (*a, *b),
            _ => return None,
        };

        let (da, ca) = self.through_resample(d, sa);
        let (db, cb) = self.through_resample(d, sb);

        let mut f1 = None;
        let mut f2 = None;
        for (n, other) in self.figures.list.iter().enumerate() {
            if !other.busy {
                continue;
            }
            if f1.is_none() && other.dataset == da && other.col_y == ca {
                f1 = Some(n);
            }
            if f2.is_none() && other.dataset == db && other.col_y == cb {
                f2 = Some(n);
            }
        }
        Some((f1?, f2?))
    }

    /// Resolve a resample slot back to the (dataset, column) it reads.
    fn through_resample(&self, d: usize, src: Source) -> (usize, Source) {
        if let Source::Col(c) = src {
            let primary = self.data[d].columns();
            if c >= primary {
                if let Some(SlotOp::Resample {
                    in_dataset, in_y, ..
                }) = self.banks[d].get(c - primary)
                {
                    return (*in_dataset, *in_y);
                }
            }
        }
        (d, src)
    }

    /// Shared tail of the filter flows.
    fn filter_add(&mut self, f1: usize, kind: FilterKind) -> Result<usize, PlotError> {
        self.figures.check_busy(f1)?;
        let f = self.figures.free_figure().ok_or(PlotError::NoFreeFigure)?;

        let d = self.figures.list[f1].dataset;
        let src = self.figures.list[f1].col_y;
        let col_x = self.figures.list[f1].col_x;
        let axis_x = self.figures.list[f1].axis_x;
        let drawing = self.figures.list[f1].drawing;
        let width = self.figures.list[f1].width;

        let col = match kind {
            FilterKind::Difference => {
                get_difference(&mut self.data, &mut self.banks, &mut self.rcache, d, src)?
            }
            FilterKind::Cumulative => {
                get_cumulative(&mut self.data, &mut self.banks, &mut self.rcache, d, src)?
            }
            FilterKind::Bitmask { low, high } => get_bitmask(
                &mut self.data,
                &mut self.banks,
                &mut self.rcache,
                d,
                src,
                low,
                high,
            )?,
            FilterKind::LowPass { gain } => get_lowpass(
                &mut self.data,
                &mut self.banks,
                &mut self.rcache,
                d,
                src,
                gain,
            )?,
        };

        // A low-pass stays in its source's units and axis; the other
        // filters change units and prefer a fresh Y axis.
        let keep_axis = matches!(kind, FilterKind::LowPass { .. });
        let axis_y = if keep_axis {
            self.figures.list[f1].axis_y
        } else {
            match self.axes.free_axis() {
                Some(a) => {
                    self.axes.list[a].role = AxisRole::BusyY;
                    let label = self.axes.list[self.figures.list[f1].axis_y].label.clone();
                    self.axes.set_label(a, &label);
                    a
                }
                None => self.figures.list[f1].axis_y,
            }
        };

        figure_add(
            &mut self.axes,
            &mut self.figures,
            &self.data,
            f,
            d,
            col_x,
            Source::Col(col),
            axis_x,
            axis_y,
            "",
            drawing,
            width,
        )?;

        let mut label = String::new();
        {
            let l = clip_label(&self.figures.list[f1].label, FILTER_LABEL_CAP);
            let _ = match kind {
                FilterKind::Difference => write!(label, "D: {l}"),
                FilterKind::Cumulative => write!(label, "C: {l}"),
                FilterKind::Bitmask { low, high } if low == high => {
                    write!(label, "B({low}): {l}")
                }
                FilterKind::Bitmask { low, high } => write!(label, "B({low}-{high}): {l}"),
                FilterKind::LowPass { gain } => write!(label, "L({gain:.2E}): {l}"),
            };
        }
        self.figures.list[f].label = label;

        if !keep_axis {
            scale_auto_cond(
                &mut self.data,
                &mut self.rcache,
                &mut self.axes,
                &self.figures,
                axis_y,
                Some(axis_x),
                &self.viewport,
                self.margin,
            );
            self.focus_axes(axis_x, axis_y);
        }
        self.render.invalidate();
        Ok(f)
    }

    /// Accumulate windowed rows into a least-squares fit of
    /// `y = b0 + b1 x + ... + b_deg x^deg`.
    fn polyfit_solve(
        &mut self,
        d: usize,
        col_x: Source,
        col_y: Source,
        wx: Affine<f64>,
        wy: Affine<f64>,
        degree: usize,
    ) -> Result<LseSolution, PlotError> {
        let mut lse = Lse::new(CASCADE_MAX, degree + 1, 1)?;

        let sx = self.rcache.fetch(&mut self.data[d], d, col_x);
        let sy = self.rcache.fetch(&mut self.data[d], d, col_y);

        let mut row = [0.0f64; FULL_MAX];
        let mut id = self.data[d].head_id();
        let tail = self.data[d].tail_id();

        while id < tail {
            let (pos, len) = match self.data[d].run(id) {
                Some(r) => r,
                None => break,
            };
            let k = self.data[d].layout().chunk_of(pos);
            let stretch_end = id + len as u64;

            // Chunk bounds prove whole chunks outside the fit window.
            let skip = window_rejects(self.rcache.slots[sx].chunks.get(k).copied(), &wx)
                || window_rejects(self.rcache.slots[sy].chunks.get(k).copied(), &wy);
            if skip {
                id = stretch_end;
                continue;
            }

            while id < stretch_end {
                let (vx, vy) = {
                    let cells = match self.data[d].read_row(id) {
                        Some(r) => r,
                        None => break,
                    };
                    (cell_value(cells, id, col_x), cell_value(cells, id, col_y))
                };
                if vx.is_finite() && vy.is_finite() {
                    let ux = wx.apply(vx);
                    let uy = wy.apply(vy);
                    if (0.0..=1.0).contains(&ux) && (0.0..=1.0).contains(&uy) {
                        // The basis uses raw X powers; the windows only
                        // gate which rows participate.
                        row[0] = 1.0;
                        for n in 0..degree {
                            row[n + 1] = row[n] * vx;
                        }
                        row[degree + 1] = vy;
                        lse.insert(&row[..degree + 2]);
                    }
                }
                id += 1;
            }
        }

        if lse.total() == 0 {
            return Err(PlotError::NoSamples);
        }
        Ok(lse.solve())
    }
}

// ============================================================================
// Slicing
// ============================================================================

impl<T: Real> Plot<T> {
    /// Turn slice probing on or off. Turning it off drops any range
    /// base and hides a slice readout.
    pub fn slice_enable(&mut self, on: bool) {
        self.slice_on = on;
        if !on {
            self.slice_range_on = 0;
            for hit in &mut self.slice {
                hit.busy = false;
            }
            if self.data_box == DataBoxMode::Slice {
                self.data_box = DataBoxMode::Free;
            }
        }
    }

    /// Whether slice probing is on.
    pub fn slice_enabled(&self) -> bool {
        self.slice_on
    }

    /// Choose the axis the slice cursor probes along.
    pub fn slice_select(&mut self, a: usize) -> Result<(), PlotError> {
        self.axes.check(a)?;
        self.slice_axis = Some(a);
        Ok(())
    }

    /// Step the range mode: capture a base, freeze it, then release.
    pub fn slice_switch(&mut self) {
        match self.slice_range_on {
            0 => {
                self.slice_range_on = 1;
                for hit in &mut self.slice {
                    if hit.busy {
                        hit.base_x = hit.x;
                        hit.base_y = hit.y;
                    }
                }
            }
            1 => self.slice_range_on = 2,
            _ => self.slice_range_on = 0,
        }
    }

    /// Snap every visible figure to the sample nearest the cursor
    /// along the slice axis and rebuild the readout rows.
    pub fn slice_track(&mut self, cur_x: i32, cur_y: i32) {
        if !self.slice_on || self.slice_range_on == 2 {
            return;
        }

        let axis = match self.slice_axis.or(self.axes.on_x) {
            Some(a) => a,
            None => {
                error!("no axis to slice along");
                return;
            }
        };
        self.slice_axis = Some(axis);
        let role = self.axes.list[axis].role;

        // Figures sharing a probe column resolve the cursor once.
        let mut memo: Option<(usize, usize, Source, Option<u64>)> = None;

        for f in 0..self.figures.list.len() {
            self.slice[f].busy = false;

            let (busy, hidden, d, col_x, col_y, fig_ax, fig_ay) = {
                let fig = &self.figures.list[f];
                (
                    fig.busy, fig.hidden, fig.dataset, fig.col_x, fig.col_y, fig.axis_x,
                    fig.axis_y,
                )
            };
            if !busy || hidden {
                continue;
            }

            let (own_axis, probe_col, cursor) = match role {
                AxisRole::BusyX => (fig_ax, col_x, cur_x as f64),
                AxisRole::BusyY => (fig_ay, col_y, cur_y as f64),
                AxisRole::Free => continue,
            };
            let related = own_axis == axis
                || self.axes.list[own_axis].slave == Some(axis)
                || self.axes.list[axis].slave == Some(own_axis);
            if !related {
                continue;
            }

            let probe = self.axes.conv_inv(own_axis, &self.viewport, cursor);
            let row_id = match memo {
                Some((md, ma, mc, id)) if md == d && ma == own_axis && mc == probe_col => id,
                _ => {
                    let id = self.rcache.slice_nearest(
                        &mut self.data[d],
                        d,
                        probe_col,
                        probe,
                        self.slice_span,
                    );
                    memo = Some((d, own_axis, probe_col, id));
                    id
                }
            };

            if let Some(id) = row_id {
                let vx = self.data[d].sample(id, col_x);
                let vy = self.data[d].sample(id, col_y);
                if let (Some(vx), Some(vy)) = (vx, vy) {
                    self.slice[f].x = vx.as_f64();
                    self.slice[f].y = vy.as_f64();
                    self.slice[f].busy = true;
                }
            }
        }

        for f in 0..self.figures.list.len() {
            self.box_text[f].clear();
            if !self.slice[f].busy {
                continue;
            }
            let hit = self.slice[f];
            let text = &mut self.box_text[f];
            if self.slice_range_on != 0 {
                text.push_str(" \u{0394}");
                fmt_value(text, hit.x - hit.base_x, self.precision);
                text.push('\u{0394}');
                fmt_value(text, hit.y - hit.base_y, self.precision);
            } else {
                fmt_value(text, hit.x, self.precision);
                fmt_value(text, hit.y, self.precision);
            }
        }

        if self.data_box != DataBoxMode::Slice {
            self.data_box = DataBoxMode::Slice;
            self.data_box_x = self.viewport.max_x;
            self.data_box_y = 0;
        }
    }
}

// ============================================================================
// Frame
// ============================================================================

impl<T: Real> Plot<T> {
    /// Draw one frame onto `surface` within `screen`.
    ///
    /// Refreshes streaming derived cells, recomputes layout from the
    /// surface's font metrics, advances the budgeted recording pass
    /// (painting newly visible primitives live), replays the last
    /// completed picture, and draws the overlays on top.
    pub fn draw<S: Surface, C: Clock>(
        &mut self,
        surface: &mut S,
        screen: &Viewport,
        clock: &mut C,
    ) {
        self.screen = *screen;

        for d in 0..self.data.len() {
            refresh_streaming(&mut self.data, &mut self.banks, &mut self.rcache, d);
        }

        self.layout(surface);

        if self.slice_range_on != 0 {
            self.slice_band(surface);
        }

        self.render.trial_all(
            surface,
            &mut self.data,
            &mut self.rcache,
            &self.axes,
            &self.figures,
            &self.viewport,
            self.margin,
            clock,
            self.budget_ms,
        );
        self.render
            .replay(surface, &self.axes, &self.figures, &self.viewport);

        if self.slice_on {
            self.slice_fences(surface);
        }

        self.legend_draw(surface);

        if self.data_box != DataBoxMode::Free {
            self.data_box_draw(surface);
        }
    }

    /// Measure fonts, stack axis rails, and place the overlays.
    fn layout<S: Surface>(&mut self, surface: &mut S) {
        self.font_long = surface.text_extent("M").0;
        self.font_height = surface.font_height();
        let axis_box = TICK_TOOTH + self.font_height;
        let label_box = self.font_height;

        let mut pos_x = 0;
        let mut pos_y = 0;
        for ax in &mut self.axes.list {
            match ax.role {
                AxisRole::BusyX => {
                    if ax.label.is_empty() {
                        ax.compact = true;
                    }
                    ax.band = pos_x;
                    pos_x += axis_box + if ax.compact { 0 } else { label_box };
                }
                AxisRole::BusyY => {
                    if ax.label.is_empty() {
                        ax.compact = true;
                    }
                    ax.band = pos_y;
                    pos_y += axis_box + if ax.compact { 0 } else { label_box };
                }
                AxisRole::Free => {}
            }
        }

        self.viewport = Viewport::new(
            self.screen.min_x + pos_y + BORDER,
            self.screen.max_x - BORDER,
            self.screen.min_y + BORDER,
            self.screen.max_y - pos_x - BORDER,
        );

        self.legend_layout(surface);
        if self.data_box != DataBoxMode::Free {
            self.data_box_layout(surface);
        }
    }

    fn legend_layout<S: Surface>(&mut self, surface: &mut S) {
        let mut size_max = 0;
        let mut rows = 0;
        for fig in &self.figures.list {
            if fig.busy {
                size_max = size_max.max(surface.text_extent(&fig.label).0);
                rows += 1;
            }
        }
        self.legend_size_x = size_max + self.font_long * 2;
        self.legend_rows = rows;

        let fh = self.font_height;
        let vp = self.viewport;
        self.legend_x = self.legend_x.min(vp.max_x - (size_max + fh * 3));
        self.legend_y = self.legend_y.min(vp.max_y - fh * (rows as i32 + 1));
        self.legend_x = self.legend_x.max(vp.min_x + fh);
        self.legend_y = self.legend_y.max(vp.min_y + fh);
    }

    fn legend_draw<S: Surface>(&self, surface: &mut S) {
        if self.legend_rows == 0 {
            return;
        }
        let fh = self.font_height;
        let leg_x = self.legend_x;
        let box_w = fh * 2 + self.legend_size_x;
        let box_h = fh * self.legend_rows as i32;
        surface.fill_rect(
            &Pen::fill(self.hover_legend),
            leg_x,
            self.legend_y,
            leg_x + box_w,
            self.legend_y + box_h,
        );

        let mut row_y = self.legend_y;
        for (f, fig) in self.figures.list.iter().enumerate() {
            if !fig.busy {
                continue;
            }
            if self.hover_figure == Some(f) {
                surface.fill_rect(
                    &Pen::fill(true),
                    leg_x + fh * 2,
                    row_y,
                    leg_x + fh * 2 + self.legend_size_x,
                    row_y + fh,
                );
            }

            let mid = (row_y + fh / 2) as f64;
            let pen = Pen::figure(f, fig.hidden, fig.width.max(1));
            match fig.drawing {
                Drawing::Line => {
                    surface.line(&pen, (leg_x + fh / 2) as f64, mid, (leg_x + fh / 2 + fh) as f64, mid)
                }
                Drawing::Dash => {
                    surface.dash(&pen, (leg_x + fh / 2) as f64, mid, (leg_x + fh / 2 + fh) as f64, mid)
                }
                Drawing::Dot => surface.dot(&pen, (leg_x + fh) as f64, mid),
            }

            let tpen = Pen {
                ink: Ink::Chrome,
                muted: fig.hidden,
                width: 1,
            };
            surface.text(&tpen, leg_x + fh * 2 + self.font_long, row_y, &fig.label);
            row_y += fh;
        }
    }

    fn data_box_layout<S: Surface>(&mut self, surface: &mut S) {
        let mut size_max = 0;
        let mut rows = 0;
        match self.data_box {
            DataBoxMode::Slice => {
                for (f, fig) in self.figures.list.iter().enumerate() {
                    if fig.busy {
                        size_max = size_max.max(surface.text_extent(&self.box_text[f]).0);
                        rows += 1;
                    }
                }
            }
            DataBoxMode::Polyfit => {
                for text in &self.box_text {
                    if !text.is_empty() {
                        size_max = size_max.max(surface.text_extent(text).0);
                        rows += 1;
                    }
                }
            }
            DataBoxMode::Free => {}
        }
        self.data_box_size_x = size_max;
        self.data_box_rows = rows;

        let fh = self.font_height;
        let vp = self.viewport;
        self.data_box_x = self.data_box_x.min(vp.max_x - (size_max + fh));
        self.data_box_y = self.data_box_y.min(vp.max_y - fh * (rows as i32 + 1));
        self.data_box_x = self.data_box_x.max(vp.min_x + fh);
        self.data_box_y = self.data_box_y.max(vp.min_y + fh);
    }

    fn data_box_draw<S: Surface>(&self, surface: &mut S) {
        if self.data_box_rows == 0 {
            return;
        }
        let fh = self.font_height;
        let box_x = self.data_box_x;
        let box_h = fh * self.data_box_rows as i32;
        surface.fill_rect(
            &Pen::fill(self.hover_data_box),
            box_x,
            self.data_box_y,
            box_x + self.data_box_size_x,
            self.data_box_y + box_h,
        );

        let mut row_y = self.data_box_y;
        match self.data_box {
            DataBoxMode::Slice => {
                // Rows keep figure order; an idle figure leaves a gap.
                for (f, fig) in self.figures.list.iter().enumerate() {
                    if !fig.busy {
                        continue;
                    }
                    if !self.box_text[f].is_empty() {
                        let pen = Pen::figure(f, false, 1);
                        surface.text(&pen, box_x, row_y, &self.box_text[f]);
                    }
                    row_y += fh;
                }
            }
            DataBoxMode::Polyfit => {
                for text in &self.box_text {
                    if text.is_empty() {
                        continue;
                    }
                    surface.text(&Pen::chrome(), box_x, row_y, text);
                    row_y += fh;
                }
            }
            DataBoxMode::Free => {}
        }
    }

    /// Shade the span between the range base and the cursor sample.
    fn slice_band<S: Surface>(&self, surface: &mut S) {
        let axis = match self.slice_axis {
            Some(a) => a,
            None => return,
        };
        let role = self.axes.list[axis].role;
        let vp = self.viewport;
        let pen = Pen {
            ink: Ink::Chrome,
            muted: true,
            width: 1,
        };

        for (f, hit) in self.slice.iter().enumerate() {
            if !hit.busy {
                continue;
            }
            let fig = match self.figures.get(f) {
                Some(fig) if fig.busy() => fig,
                _ => continue,
            };
            let mut bx = self.axes.conv(fig.axis_x(), &vp, hit.base_x);
            let mut dx = self.axes.conv(fig.axis_x(), &vp, hit.x);
            let mut by = self.axes.conv(fig.axis_y(), &vp, hit.base_y);
            let mut dy = self.axes.conv(fig.axis_y(), &vp, hit.y);
            if dx < bx {
                core::mem::swap(&mut bx, &mut dx);
            }
            if dy < by {
                core::mem::swap(&mut by, &mut dy);
            }

            match role {
                AxisRole::BusyX if bx.is_finite() && dx.is_finite() => {
                    let lo = (bx.max(vp.min_x as f64)) as i32;
                    let hi = (dx.min(vp.max_x as f64)) as i32;
                    if lo < hi {
                        surface.fill_rect(&pen, lo, vp.min_y, hi, vp.max_y);
                    }
                }
                AxisRole::BusyY if by.is_finite() && dy.is_finite() => {
                    let lo = (by.max(vp.min_y as f64)) as i32;
                    let hi = (dy.min(vp.max_y as f64)) as i32;
                    if lo < hi {
                        surface.fill_rect(&pen, vp.min_x, lo, vp.max_x, hi);
                    }
                }
                _ => {}
            }
        }
    }

    /// Dashed fence lines and sample dots at the slice hits.
    fn slice_fences<S: Surface>(&self, surface: &mut S) {
        let axis = match self.slice_axis {
            Some(a) => a,
            None => return,
        };
        let role = self.axes.list[axis].role;
        let vp = self.viewport;
        let pen = Pen::chrome();
        let dot_pen = Pen {
            ink: Ink::Chrome,
            muted: false,
            width: 3,
        };

        for (f, hit) in self.slice.iter().enumerate() {
            if !hit.busy {
                continue;
            }
            let fig = match self.figures.get(f) {
                Some(fig) if fig.busy() => fig,
                _ => continue,
            };
            let bx = self.axes.conv(fig.axis_x(), &vp, hit.base_x);
            let by = self.axes.conv(fig.axis_y(), &vp, hit.base_y);
            let dx = self.axes.conv(fig.axis_x(), &vp, hit.x);
            let dy = self.axes.conv(fig.axis_y(), &vp, hit.y);

            match role {
                AxisRole::BusyX => {
                    if self.slice_range_on != 0 && bx.is_finite() {
                        fence_v(surface, &pen, &vp, bx);
                    }
                    if dx.is_finite() {
                        fence_v(surface, &pen, &vp, dx);
                    }
                }
                AxisRole::BusyY => {
                    if self.slice_range_on != 0 && by.is_finite() {
                        fence_h(surface, &pen, &vp, by);
                    }
                    if dy.is_finite() {
                        fence_h(surface, &pen, &vp, dy);
                    }
                }
                AxisRole::Free => {}
            }

            if self.slice_range_on != 0 && bx.is_finite() && by.is_finite() && vp.contains(bx, by)
            {
                surface.dot(&dot_pen, bx, by);
            }
            if dx.is_finite() && dy.is_finite() && vp.contains(dx, dy) {
                surface.dot(&dot_pen, dx, dy);
            }
        }
    }
}

// ============================================================================
// Hit Tests
// ============================================================================

impl<T: Real> Plot<T> {
    /// The axis whose rail band contains the pixel, if any.
    pub fn axis_by_click(&mut self, x: i32, y: i32) -> Option<usize> {
        let cx = self.viewport.min_x - BORDER - x;
        let cy = y - self.viewport.max_y - BORDER;
        let axis_box = TICK_TOOTH + self.font_height;
        let label_box = self.font_height;

        let mut hit = None;
        for (a, ax) in self.axes.list.iter().enumerate() {
            let size = axis_box + if ax.compact { 0 } else { label_box };
            let inside = match ax.role {
                AxisRole::BusyX => cy > ax.band && cy < ax.band + size,
                AxisRole::BusyY => cx > ax.band && cx < ax.band + size,
                AxisRole::Free => false,
            };
            if inside {
                hit = Some(a);
                break;
            }
        }
        self.hover_axis = hit;
        hit
    }

    /// The figure whose drawn curve passes nearest the pixel, within
    /// the hit radius. Walks the completed sketch picture.
    pub fn figure_by_click(&mut self, x: i32, y: i32) -> Option<usize> {
        let px = x as f64;
        let py = y as f64;
        let tol = self.hit_radius as f64;
        let mut best: Option<(f64, usize)> = None;

        for node in self.render.sketches().replay() {
            let f = node.figure();
            let fig = match self.figures.get(f) {
                Some(fig) if fig.busy() && !fig.hidden() => fig,
                _ => continue,
            };
            let map_x = self.axes.to_pixels(fig.axis_x(), &self.viewport);
            let map_y = self.axes.to_pixels(fig.axis_y(), &self.viewport);

            match node.drawing() {
                Drawing::Line | Drawing::Dash => {
                    for pair in node.points().chunks_exact(2) {
                        let a = (map_x.apply(pair[0].0), map_y.apply(pair[0].1));
                        let b = (map_x.apply(pair[1].0), map_y.apply(pair[1].1));
                        let dist = segment_distance(a, b, (px, py));
                        if dist <= tol && best.map_or(true, |(d, _)| dist < d) {
                            best = Some((dist, f));
                        }
                    }
                }
                Drawing::Dot => {
                    for p in node.points() {
                        let ex = map_x.apply(p.0) - px;
                        let ey = map_y.apply(p.1) - py;
                        let dist = Float::sqrt(ex * ex + ey * ey);
                        if dist <= tol && best.map_or(true, |(d, _)| dist < d) {
                            best = Some((dist, f));
                        }
                    }
                }
            }
        }

        let hit = best.map(|(_, f)| f);
        self.hover_figure = hit;
        hit
    }

    /// The legend row under the pixel, if any.
    pub fn legend_by_click(&mut self, x: i32, y: i32) -> Option<usize> {
        let fh = self.font_height;
        let mut row_y = self.legend_y;
        let mut hit = None;
        for (f, fig) in self.figures.list.iter().enumerate() {
            if !fig.busy {
                continue;
            }
            let rel_x = x - (self.legend_x + fh * 2);
            let rel_y = y - row_y;
            if rel_x > 0 && rel_x < self.legend_size_x && rel_y > 0 && rel_y < fh {
                hit = Some(f);
                break;
            }
            row_y += fh;
        }
        self.hover_figure = hit;
        hit
    }

    /// Whether the pixel is on the legend's drag handle.
    pub fn legend_box_by_click(&mut self, x: i32, y: i32) -> bool {
        let fh = self.font_height;
        let rel_x = x - self.legend_x;
        let rel_y = y - self.legend_y;
        let hit =
            rel_x > 0 && rel_x < fh * 2 && rel_y > 0 && rel_y < fh * self.legend_rows as i32;
        self.hover_legend = hit;
        hit
    }

    /// Whether the pixel is on the readout box.
    pub fn data_box_by_click(&mut self, x: i32, y: i32) -> bool {
        let fh = self.font_height;
        let rel_x = x - self.data_box_x;
        let rel_y = y - self.data_box_y;
        let hit = rel_x > 0
            && rel_x < self.data_box_size_x
            && rel_y > 0
            && rel_y < fh * self.data_box_rows as i32;
        self.hover_data_box = hit;
        hit
    }

    /// Move the legend anchor; it is re-clamped at the next layout.
    pub fn legend_move(&mut self, x: i32, y: i32) {
        self.legend_x = x;
        self.legend_y = y;
    }

    /// Move the readout box anchor.
    pub fn data_box_move(&mut self, x: i32, y: i32) {
        self.data_box_x = x;
        self.data_box_y = y;
    }

    /// Drop every hover highlight.
    pub fn hover_clear(&mut self) {
        self.hover_axis = None;
        self.hover_figure = None;
        self.hover_legend = false;
        self.hover_data_box = false;
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl<T: Real> Plot<T> {
    /// Curve area of the last laid-out frame.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// The axis table.
    pub fn axes(&self) -> &Axes {
        &self.axes
    }

    /// The figure table.
    pub fn figures(&self) -> &Figures {
        &self.figures
    }

    /// One dataset, if the handle is in range.
    pub fn dataset(&self, d: usize) -> Option<&Dataset<T>> {
        self.data.get(d)
    }

    /// The recording engine, for draw-progress inspection.
    pub fn renderer(&self) -> &Render {
        &self.render
    }

    /// What the readout box is showing.
    pub fn data_box_mode(&self) -> DataBoxMode {
        self.data_box
    }

    /// Raw readout rows; empty rows are not drawn.
    pub fn data_box_text(&self) -> &[String] {
        &self.box_text
    }

    /// The axis last picked by a slice selection, if any.
    pub fn slice_axis(&self) -> Option<usize> {
        self.slice_axis
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Row cell as `f64`, with the row id standing in for `RowId`.
fn cell_value<T: Real>(cells: &[T], id: u64, source: Source) -> f64 {
    match source {
        Source::RowId => id as f64,
        Source::Col(c) => cells.get(c).map_or(f64::NAN, |v| v.as_f64()),
    }
}

/// Whether cached chunk bounds prove the chunk misses `[0, 1]` after
/// windowing. Uncomputed bounds keep the chunk; all-NaN chunks drop.
fn window_rejects<T: Real>(stat: Option<ChunkStat<T>>, window: &Affine<f64>) -> bool {
    let stat = match stat {
        Some(s) if s.computed => s,
        _ => return false,
    };
    if !stat.finite {
        return true;
    }
    let a = window.apply(stat.min.as_f64());
    let b = window.apply(stat.max.as_f64());
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    lo > 1.0 || hi < 0.0
}

/// Distance from `p` to the segment `a..b`.
fn segment_distance(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> f64 {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let len2 = dx * dx + dy * dy;
    let t = if len2 > 0.0 {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let qx = a.0 + t * dx - p.0;
    let qy = a.1 + t * dy - p.1;
    Float::sqrt(qx * qx + qy * qy)
}

/// Dashed vertical fence across the viewport, clipped to it.
fn fence_v<S: Surface>(surface: &mut S, pen: &Pen, vp: &Viewport, x: f64) {
    if x >= vp.min_x as f64 && x <= vp.max_x as f64 {
        surface.dash(pen, x, vp.min_y as f64, x, vp.max_y as f64);
    }
}

/// Dashed horizontal fence across the viewport, clipped to it.
fn fence_h<S: Surface>(surface: &mut S, pen: &Pen, vp: &Viewport, y: f64) {
    if y >= vp.min_y as f64 && y <= vp.max_y as f64 {
        surface.dash(pen, vp.min_x as f64, y, vp.max_x as f64, y);
    }
}

/// Format a readout value: fixed point while the magnitude fits the
/// precision window, exponent form otherwise. Non-negative values get
/// a leading space so columns align with negatives.
fn fmt_value(out: &mut String, v: f64, precision: usize) {
    let mut fexp: i32 = 1;
    if v != 0.0 {
        let e = Float::floor(Float::log10(Float::abs(v)));
        if e.is_finite() {
            fexp = fexp.saturating_add(e as i32);
        }
    }
    if !v.is_sign_negative() {
        out.push(' ');
    }
    let p = precision as i32;
    if fexp >= -2 && fexp < p {
        let digits = (p - fexp.max(1)) as usize;
        let _ = write!(out, "{v:.digits$} ");
    } else {
        let digits = precision.saturating_sub(1);
        let _ = write!(out, "{v:.digits$E} ");
    }
}

/// At most `cap` characters of a label, on a char boundary.
fn clip_label(label: &str, cap: usize) -> &str {
    match label.char_indices().nth(cap) {
        Some((n, _)) => &label[..n],
        None => label,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn text(v: f64, precision: usize) -> String {
        let mut out = String::new();
        fmt_value(&mut out, v, precision);
        out
    }

    #[test]
    fn fmt_value_fixed_point_window() {
        assert_eq!(text(0.0, 9), " 0.00000000 ");
        assert_eq!(text(123.456, 9), " 123.456000 ");
        assert_eq!(text(-1.5, 9), "-1.50000000 ");
    }

    #[test]
    fn fmt_value_exponent_fallback() {
        assert_eq!(text(0.0005, 9), " 5.00000000E-4 ");
        assert_eq!(text(1.0e12, 9), " 1.00000000E12 ");
    }

    #[test]
    fn fmt_value_small_but_displayable() {
        // One leading zero still fits the fixed-point window.
        assert_eq!(text(0.005, 9), " 0.00500000 ");
    }

    #[test]
    fn clip_label_respects_char_boundaries() {
        assert_eq!(clip_label("abcdef", 3), "abc");
        assert_eq!(clip_label("ab", 35), "ab");
        assert_eq!(clip_label("\u{0394}\u{0394}\u{0394}", 2), "\u{0394}\u{0394}");
    }

    #[test]
    fn segment_distance_endpoints_and_interior() {
        let d = segment_distance((0.0, 0.0), (10.0, 0.0), (5.0, 3.0));
        assert!((d - 3.0).abs() < 1e-12);
        let d = segment_distance((0.0, 0.0), (10.0, 0.0), (-4.0, 3.0));
        assert!((d - 5.0).abs() < 1e-12);
        // Degenerate segment collapses to point distance.
        let d = segment_distance((2.0, 2.0), (2.0, 2.0), (2.0, 6.0));
        assert!((d - 4.0).abs() < 1e-12);
    }
}
