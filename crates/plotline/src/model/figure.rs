//! Figures, groups, and referential integrity.
//!
//! ## Purpose
//!
//! This module binds datasets to axes: a figure names a dataset, an X
//! and a Y column, and the two axes they render on. Removal keeps the
//! model consistent, freeing axes no figure uses, promoting new default
//! axes, rebinding figures off removed slave axes through substitute
//! scale columns, and garbage-collecting orphaned derived slots.
//!
//! ## Key concepts
//!
//! 1. **Axis claims**: the first figure to use a free axis claims it
//!    for X or Y and arms its scale lock so autoscale tracks inserts.
//! 2. **Autoscale**: observed finite bounds over every visible figure
//!    on the axis, optionally restricted to the paired axis's current
//!    window, widened by a pixel margin.
//! 3. **Liveness**: a derived slot stays alive while a figure on its
//!    dataset or another armed slot reads its column.
//!
//! ## Edge cases
//!
//! * Removing the figure that owns a default axis promotes another busy
//!   non-slave axis; when none exists the axis stays claimed.
//! * Autoscale over an empty or fully non-finite column leaves the axis
//!   mapping untouched.
//! * A degenerate observed range (min == max) is widened by ±1 before
//!   mapping.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::string::String;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

// Internal dependencies
use crate::cache::range::{RangeAcc, RangeCache};
use crate::columns::engine::{collect_garbage, get_scale};
use crate::columns::ops::SlotBank;
use crate::math::affine::{Affine, Viewport};
use crate::model::axis::{Axes, AxisRole};
use crate::primitives::errors::PlotError;
use crate::primitives::value::Real;
use crate::storage::dataset::{Dataset, Source};

// ============================================================================
// Figure Types
// ============================================================================

/// Primitive a figure is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Drawing {
    /// Solid polyline.
    #[default]
    Line,
    /// Dashed polyline.
    Dash,
    /// Isolated points.
    Dot,
}

/// One figure table entry.
#[derive(Debug, Clone)]
pub struct Figure {
    pub(crate) busy: bool,
    pub(crate) hidden: bool,
    pub(crate) dataset: usize,
    pub(crate) col_x: Source,
    pub(crate) col_y: Source,
    pub(crate) axis_x: usize,
    pub(crate) axis_y: usize,
    pub(crate) drawing: Drawing,
    pub(crate) width: i32,
    pub(crate) label: String,
}

impl Default for Figure {
    fn default() -> Self {
        Self {
            busy: false,
            hidden: false,
            dataset: 0,
            col_x: Source::RowId,
            col_y: Source::RowId,
            axis_x: 0,
            axis_y: 0,
            drawing: Drawing::Line,
            width: 1,
            label: String::new(),
        }
    }
}

impl Figure {
    /// Whether the slot holds a live figure.
    #[inline]
    pub fn busy(&self) -> bool {
        self.busy
    }

    /// Whether the figure draws muted and stays out of autoscale.
    #[inline]
    pub fn hidden(&self) -> bool {
        self.hidden
    }

    /// Dataset the figure reads.
    #[inline]
    pub fn dataset(&self) -> usize {
        self.dataset
    }

    /// X column source.
    #[inline]
    pub fn col_x(&self) -> Source {
        self.col_x
    }

    /// Y column source.
    #[inline]
    pub fn col_y(&self) -> Source {
        self.col_y
    }

    /// X axis handle.
    #[inline]
    pub fn axis_x(&self) -> usize {
        self.axis_x
    }

    /// Y axis handle.
    #[inline]
    pub fn axis_y(&self) -> usize {
        self.axis_y
    }

    /// Drawing primitive.
    #[inline]
    pub fn drawing(&self) -> Drawing {
        self.drawing
    }

    /// Stroke width in pixels.
    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Legend label.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Fixed table of figure slots.
#[derive(Debug, Default)]
pub struct Figures {
    pub(crate) list: Vec<Figure>,
}

impl Figures {
    /// Table with `count` unused slots.
    pub fn new(count: usize) -> Self {
        let mut list = Vec::with_capacity(count);
        list.resize_with(count, Figure::default);
        Self { list }
    }

    /// Number of figure slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Whether the table holds no slots.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Borrow one entry.
    #[inline]
    pub fn get(&self, f: usize) -> Option<&Figure> {
        self.list.get(f)
    }

    /// Validate a figure handle.
    pub fn check(&self, f: usize) -> Result<(), PlotError> {
        if f >= self.list.len() {
            return Err(PlotError::FigureIndex {
                got: f,
                max: self.list.len(),
            });
        }
        Ok(())
    }

    /// Validate a handle and require the slot to be in use.
    pub fn check_busy(&self, f: usize) -> Result<(), PlotError> {
        self.check(f)?;
        if !self.list[f].busy {
            return Err(PlotError::FigureUnused(f));
        }
        Ok(())
    }

    /// First unused slot, if any.
    pub fn free_figure(&self) -> Option<usize> {
        self.list.iter().position(|fig| !fig.busy)
    }

    /// Whether any live figure on `dataset` reads column `col`.
    pub fn pins_column(&self, dataset: usize, col: usize) -> bool {
        let col = Source::Col(col);
        self.list
            .iter()
            .any(|fig| fig.busy && fig.dataset == dataset && (fig.col_x == col || fig.col_y == col))
    }

    /// Swap two slots, labels and display state included.
    pub fn exchange(&mut self, f1: usize, f2: usize) -> Result<(), PlotError> {
        self.check(f1)?;
        self.check(f2)?;
        self.list.swap(f1, f2);
        Ok(())
    }
}

// ============================================================================
// Groups
// ============================================================================

/// Dataset → shared label association for overlay text.
#[derive(Debug, Default)]
pub struct Groups {
    labels: Vec<String>,
    map: Vec<Option<usize>>,
}

impl Groups {
    /// `groups` label slots over `datasets` dataset handles.
    pub fn new(groups: usize, datasets: usize) -> Self {
        let mut labels = Vec::with_capacity(groups);
        labels.resize_with(groups, String::new);
        let mut map = Vec::with_capacity(datasets);
        map.resize(datasets, None);
        Self { labels, map }
    }

    /// Validate a group handle.
    pub fn check(&self, g: usize) -> Result<(), PlotError> {
        if g >= self.labels.len() {
            return Err(PlotError::GroupIndex {
                got: g,
                max: self.labels.len(),
            });
        }
        Ok(())
    }

    /// Bind a dataset to a group.
    pub fn assign(&mut self, g: usize, dataset: usize) -> Result<(), PlotError> {
        self.check(g)?;
        if let Some(slot) = self.map.get_mut(dataset) {
            *slot = Some(g);
        }
        Ok(())
    }

    /// Replace a group's label; empty text keeps the current one.
    pub fn set_label(&mut self, g: usize, label: &str) -> Result<(), PlotError> {
        self.check(g)?;
        if !label.is_empty() {
            self.labels[g].clear();
            self.labels[g].push_str(label);
        }
        Ok(())
    }

    /// Label of the group a dataset belongs to, when non-empty.
    pub fn of_dataset(&self, dataset: usize) -> Option<&str> {
        let g = (*self.map.get(dataset)?)?;
        let label = &self.labels[g];
        if label.is_empty() {
            None
        } else {
            Some(label)
        }
    }
}

// ============================================================================
// Figure Lifecycle
// ============================================================================

fn check_column<T: Real>(data: &Dataset<T>, source: Source) -> Result<(), PlotError> {
    match source {
        Source::RowId => Ok(()),
        Source::Col(c) if c < data.stride() => Ok(()),
        Source::Col(c) => Err(PlotError::ColumnIndex {
            got: c,
            span: data.stride(),
        }),
    }
}

/// Bind a figure slot to dataset columns and axes.
///
/// Free axes are claimed with the proper role and their scale lock
/// armed; the first figure establishes the default axes.
#[allow(clippy::too_many_arguments)]
pub fn figure_add<T: Real>(
    axes: &mut Axes,
    figures: &mut Figures,
    data: &[Dataset<T>],
    f: usize,
    dataset: usize,
    col_x: Source,
    col_y: Source,
    axis_x: usize,
    axis_y: usize,
    label: &str,
    drawing: Drawing,
    width: i32,
) -> Result<(), PlotError> {
    figures.check(f)?;
    if dataset >= data.len() {
        return Err(PlotError::DatasetIndex {
            got: dataset,
            max: data.len(),
        });
    }
    if !data[dataset].is_allocated() {
        return Err(PlotError::DatasetUnallocated(dataset));
    }
    check_column(&data[dataset], col_x)?;
    check_column(&data[dataset], col_y)?;
    axes.check(axis_x)?;
    axes.check(axis_y)?;

    if axis_x == axis_y {
        return Err(PlotError::SameAxis(axis_x));
    }
    if axes.list[axis_x].role == AxisRole::BusyY {
        return Err(PlotError::AxisBusy { axis: axis_x });
    }
    if axes.list[axis_y].role == AxisRole::BusyX {
        return Err(PlotError::AxisBusy { axis: axis_y });
    }

    let fig = &mut figures.list[f];
    fig.busy = true;
    fig.hidden = false;
    fig.dataset = dataset;
    fig.col_x = col_x;
    fig.col_y = col_y;
    fig.axis_x = axis_x;
    fig.axis_y = axis_y;
    fig.drawing = drawing;
    fig.width = width;
    fig.label.clear();
    fig.label.push_str(label);

    if axes.list[axis_x].role == AxisRole::Free {
        axes.list[axis_x].role = AxisRole::BusyX;
        axes.list[axis_x].lock_scale = true;
    }
    if axes.list[axis_y].role == AxisRole::Free {
        axes.list[axis_y].role = AxisRole::BusyY;
        axes.list[axis_y].lock_scale = true;
    }

    if axes.on_x.is_none() {
        axes.on_x = Some(axis_x);
    }
    if axes.on_y.is_none() {
        axes.on_y = Some(axis_y);
    }
    Ok(())
}

/// Release a figure and restore model consistency.
///
/// Axes the figure used alone are removed (unless still the default),
/// and derived slots nothing references any more are collected.
pub fn figure_remove<T: Real>(
    axes: &mut Axes,
    figures: &mut Figures,
    data: &mut [Dataset<T>],
    banks: &mut [SlotBank],
    rcache: &mut RangeCache<T>,
    f: usize,
) -> Result<(), PlotError> {
    figures.check_busy(f)?;

    let axis_x = figures.list[f].axis_x;
    let axis_y = figures.list[f].axis_y;
    let dataset = figures.list[f].dataset;

    let mut sole_x = true;
    let mut sole_y = true;
    for (n, fig) in figures.list.iter().enumerate() {
        if fig.busy && n != f {
            if fig.axis_x == axis_x {
                sole_x = false;
            }
            if fig.axis_y == axis_y {
                sole_y = false;
            }
        }
    }

    figures.list[f].busy = false;

    if sole_x {
        if axes.on_x == Some(axis_x) {
            let promoted = axes.list.iter().enumerate().position(|(n, ax)| {
                n != axis_x && ax.role == AxisRole::BusyX && ax.slave.is_none()
            });
            if let Some(n) = promoted {
                axes.on_x = Some(n);
            }
        }
        if axes.on_x != Some(axis_x) {
            axis_remove(axes, figures, data, banks, rcache, axis_x)?;
        }
    }

    if sole_y {
        if axes.on_y == Some(axis_y) {
            let promoted = axes.list.iter().enumerate().position(|(n, ax)| {
                n != axis_y && ax.role == AxisRole::BusyY && ax.slave.is_none()
            });
            if let Some(n) = promoted {
                axes.on_y = Some(n);
            }
        }
        if axes.on_y != Some(axis_y) {
            axis_remove(axes, figures, data, banks, rcache, axis_y)?;
        }
    }

    let primary = data[dataset].columns();
    collect_garbage(&mut banks[dataset], primary, |col| {
        figures.pins_column(dataset, col)
    });
    Ok(())
}

/// Remove every figure bound to a dataset.
pub fn figure_garbage<T: Real>(
    axes: &mut Axes,
    figures: &mut Figures,
    data: &mut [Dataset<T>],
    banks: &mut [SlotBank],
    rcache: &mut RangeCache<T>,
    dataset: usize,
) {
    for f in 0..figures.list.len() {
        if figures.list[f].busy && figures.list[f].dataset == dataset {
            let _ = figure_remove(axes, figures, data, banks, rcache, f);
        }
    }
}

/// Free an axis, rebinding its figures.
///
/// Figures on a removed slave axis move to its base through a
/// substitute scale column reproducing the slave mapping; figures on a
/// removed plain axis fall back to the default. Slaves based on the
/// removed axis are unbound first.
pub fn axis_remove<T: Real>(
    axes: &mut Axes,
    figures: &mut Figures,
    data: &mut [Dataset<T>],
    banks: &mut [SlotBank],
    rcache: &mut RangeCache<T>,
    a: usize,
) -> Result<(), PlotError> {
    axes.check(a)?;
    if axes.on_x == Some(a) || axes.on_y == Some(a) {
        return Err(PlotError::AxisIsDefault(a));
    }

    let slave = axes.list[a].slave;
    let map = axes.list[a].map;

    for f in 0..figures.list.len() {
        if !figures.list[f].busy {
            continue;
        }

        if figures.list[f].axis_x == a {
            match slave {
                Some(base) => {
                    let d = figures.list[f].dataset;
                    let source = figures.list[f].col_x;
                    if let Ok(col) =
                        get_scale(data, banks, rcache, d, source, map.scale, map.offset)
                    {
                        figures.list[f].col_x = Source::Col(col);
                    }
                    figures.list[f].axis_x = base;
                }
                None => {
                    if let Some(x) = axes.on_x {
                        figures.list[f].axis_x = x;
                    }
                }
            }
        }

        if figures.list[f].axis_y == a {
            match slave {
                Some(base) => {
                    let d = figures.list[f].dataset;
                    let source = figures.list[f].col_y;
                    if let Ok(col) =
                        get_scale(data, banks, rcache, d, source, map.scale, map.offset)
                    {
                        figures.list[f].col_y = Source::Col(col);
                    }
                    figures.list[f].axis_y = base;
                }
                None => {
                    if let Some(y) = axes.on_y {
                        figures.list[f].axis_y = y;
                    }
                }
            }
        }
    }

    for n in 0..axes.list.len() {
        if axes.list[n].role != AxisRole::Free && axes.list[n].slave == Some(a) {
            axes.slave_disable(n)?;
        }
    }

    axes.reset_entry(a);
    Ok(())
}

/// Move a figure onto the default axes, removing axes it used alone.
pub fn figure_move_axes<T: Real>(
    axes: &mut Axes,
    figures: &mut Figures,
    data: &mut [Dataset<T>],
    banks: &mut [SlotBank],
    rcache: &mut RangeCache<T>,
    f: usize,
) -> Result<(), PlotError> {
    figures.check_busy(f)?;
    let (on_x, on_y) = match (axes.on_x, axes.on_y) {
        (Some(x), Some(y)) => (x, y),
        _ => return Ok(()),
    };

    let mut sole_x = true;
    let mut sole_y = true;
    for (n, fig) in figures.list.iter().enumerate() {
        if fig.busy && n != f {
            if fig.axis_x == figures.list[f].axis_x {
                sole_x = false;
            }
            if fig.axis_y == figures.list[f].axis_y {
                sole_y = false;
            }
        }
    }

    if figures.list[f].axis_x != on_x {
        let old = figures.list[f].axis_x;
        figures.list[f].axis_x = on_x;
        if sole_x {
            axis_remove(axes, figures, data, banks, rcache, old)?;
        }
    }

    if figures.list[f].axis_y != on_y {
        let old = figures.list[f].axis_y;
        figures.list[f].axis_y = on_y;
        if sole_y {
            axis_remove(axes, figures, data, banks, rcache, old)?;
        }
    }
    Ok(())
}

/// Give a figure private axes when it currently shares them.
///
/// The new axis inherits the shared axis's label and is autoscaled
/// immediately.
pub fn figure_make_individual<T: Real>(
    axes: &mut Axes,
    figures: &mut Figures,
    data: &mut [Dataset<T>],
    rcache: &mut RangeCache<T>,
    f: usize,
    vp: &Viewport,
    margin: i32,
) -> Result<(), PlotError> {
    figures.check_busy(f)?;

    let mut shared_x = false;
    let mut shared_y = false;
    for (n, fig) in figures.list.iter().enumerate() {
        if fig.busy && n != f {
            if fig.axis_x == figures.list[f].axis_x {
                shared_x = true;
            }
            if fig.axis_y == figures.list[f].axis_y {
                shared_y = true;
            }
        }
    }

    if shared_x {
        let a = axes.free_axis().ok_or(PlotError::NoFreeAxis)?;
        let old = figures.list[f].axis_x;
        axes.list[a].role = AxisRole::BusyX;
        figures.list[f].axis_x = a;
        scale_auto(data, rcache, axes, figures, a, vp, margin);
        let label = axes.list[old].label.clone();
        axes.set_label(a, &label);
    }

    if shared_y {
        let a = axes.free_axis().ok_or(PlotError::NoFreeAxis)?;
        let old = figures.list[f].axis_y;
        axes.list[a].role = AxisRole::BusyY;
        figures.list[f].axis_y = a;
        scale_auto(data, rcache, axes, figures, a, vp, margin);
        let label = axes.list[old].label.clone();
        axes.set_label(a, &label);
    }
    Ok(())
}

// ============================================================================
// Autoscale
// ============================================================================

/// Bounds of `source` restricted to the rows visible on axis `a`,
/// accumulated over every figure that pairs them.
///
/// Falls back to the unconditional range when no figure relates the
/// column to the axis.
pub fn range_axis<T: Real>(
    data: &mut [Dataset<T>],
    rcache: &mut RangeCache<T>,
    axes: &Axes,
    figures: &Figures,
    dataset: usize,
    source: Source,
    a: usize,
) -> (f64, f64) {
    let mut acc = RangeAcc::new();

    for fig in &figures.list {
        if !fig.busy || fig.hidden || fig.dataset != dataset {
            continue;
        }

        let mut job = None;

        if fig.axis_x == a && fig.col_y == source {
            job = Some((fig.col_x, Affine::unit()));
        } else if fig.axis_y == a && fig.col_x == source {
            job = Some((fig.col_y, Affine::unit()));
        }

        let ax = &axes.list[fig.axis_x];
        let ay = &axes.list[fig.axis_y];

        if ax.slave == Some(a) && fig.col_y == source {
            job = Some((fig.col_x, ax.map));
        } else if ay.slave == Some(a) && fig.col_x == source {
            job = Some((fig.col_y, ay.map));
        }

        if let Some((cond, window)) = job {
            let window = window.then(&axes.list[a].map);
            rcache.range_cond(&mut data[dataset], dataset, source, cond, window, &mut acc);
        }
    }

    if acc.is_empty() {
        rcache.range(&mut data[dataset], dataset, source)
    } else {
        acc.bounds()
    }
}

/// Rescale an axis to the observed bounds of its visible figures,
/// optionally restricted to the window of axis `cond`.
pub fn scale_auto_cond<T: Real>(
    data: &mut [Dataset<T>],
    rcache: &mut RangeCache<T>,
    axes: &mut Axes,
    figures: &Figures,
    a: usize,
    cond: Option<usize>,
    vp: &Viewport,
    margin: i32,
) {
    if axes.list[a].role == AxisRole::Free || axes.list[a].slave.is_some() {
        return;
    }

    let mut acc = RangeAcc::new();

    for f in 0..figures.list.len() {
        let fig = &figures.list[f];
        if !fig.busy || fig.hidden {
            continue;
        }
        let (dataset, axis_x, axis_y) = (fig.dataset, fig.axis_x, fig.axis_y);
        let (col_x, col_y) = (fig.col_x, fig.col_y);

        // Direct binding: the figure renders a column on this axis.
        let direct = if axis_x == a {
            Some(col_x)
        } else if axis_y == a {
            Some(col_y)
        } else {
            None
        };
        if let Some(col) = direct {
            let (min, max) = match cond {
                None => rcache.range(&mut data[dataset], dataset, col),
                Some(b) => range_axis(data, rcache, axes, figures, dataset, col, b),
            };
            acc.include_span(min, max);
        }

        // Slave binding: the figure renders on a slave of this axis,
        // so its bounds project through the slave mapping.
        let slaved = if axes.list[axis_x].slave == Some(a) {
            Some((col_x, axes.list[axis_x].map))
        } else if axes.list[axis_y].slave == Some(a) {
            Some((col_y, axes.list[axis_y].map))
        } else {
            None
        };
        if let Some((col, window)) = slaved {
            let (min, max) = match cond {
                None => rcache.range(&mut data[dataset], dataset, col),
                Some(b) => range_axis(data, rcache, axes, figures, dataset, col, b),
            };
            acc.include_span(window.apply(min), window.apply(max));
        }
    }

    if acc.is_empty() {
        return;
    }

    let (mut fmin, mut fmax) = acc.bounds();
    if fmin == fmax {
        fmin -= 1.0;
        fmax += 1.0;
    }
    axes.scale_manual(a, fmin, fmax);

    // Widen so the extremes sit a margin inside the viewport edges.
    match axes.list[a].role {
        AxisRole::BusyX => {
            let lo = axes.conv_inv(a, vp, (vp.min_x - margin) as f64);
            let hi = axes.conv_inv(a, vp, (vp.max_x + margin) as f64);
            axes.scale_manual(a, lo, hi);
        }
        AxisRole::BusyY => {
            let lo = axes.conv_inv(a, vp, (vp.max_y + margin) as f64);
            let hi = axes.conv_inv(a, vp, (vp.min_y - margin) as f64);
            axes.scale_manual(a, lo, hi);
        }
        AxisRole::Free => {}
    }
}

/// Autoscale one axis and arm its scale lock.
pub fn scale_auto<T: Real>(
    data: &mut [Dataset<T>],
    rcache: &mut RangeCache<T>,
    axes: &mut Axes,
    figures: &Figures,
    a: usize,
    vp: &Viewport,
    margin: i32,
) {
    scale_auto_cond(data, rcache, axes, figures, a, None, vp, margin);
    axes.list[a].lock_scale = true;
}

/// Autoscale every busy axis whose scale lock is armed.
pub fn scale_default<T: Real>(
    data: &mut [Dataset<T>],
    rcache: &mut RangeCache<T>,
    axes: &mut Axes,
    figures: &Figures,
    vp: &Viewport,
    margin: i32,
) {
    for a in 0..axes.list.len() {
        if axes.list[a].role != AxisRole::Free && axes.list[a].lock_scale {
            scale_auto(data, rcache, axes, figures, a, vp, margin);
        }
    }
}
