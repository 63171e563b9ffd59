//! Axis roles, slave binding, and scale state.
//!
//! ## Purpose
//!
//! This module owns the axis table: each axis maps data values into
//! normalized [0,1] space through an affine pair, optionally expressed
//! relative to a base axis (master/slave, one level deep). Interactive
//! rescaling (manual, zoom, shift, equalize) mutates the mapping in
//! normalized terms; the viewport stage is composed on demand.
//!
//! ## Key concepts
//!
//! 1. **Roles**: an axis is `Free` until a figure claims it for X or Y;
//!    the role fixes which viewport span the pixel stage uses.
//! 2. **Slaving**: a slave stores its mapping relative to its base.
//!    `HoldAsIs` rebases the current absolute mapping so nothing moves
//!    on screen; `Disable` folds the relative mapping back to absolute.
//! 3. **Scale lock**: autoscale on insertion only retargets axes whose
//!    lock flag is set; any manual gesture clears it.
//!
//! ## Invariants
//!
//! * A slave's base is never itself a slave, and an axis serving as a
//!   base never becomes a slave (rejected at bind time).
//! * The active `on_x`/`on_y` axes are never slaves; binding redirects
//!   them to the base.
//!
//! ## Edge cases
//!
//! * Re-slaving an already slaved axis is a silent no-op.
//! * Zoom and shift ignore slave axes; the gesture belongs to the base.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::string::String;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

// Internal dependencies
use crate::math::affine::{Affine, Viewport};
use crate::primitives::errors::PlotError;

// ============================================================================
// Axis Types
// ============================================================================

/// Orientation a figure has claimed the axis for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxisRole {
    /// Unclaimed.
    #[default]
    Free,
    /// Maps to the horizontal viewport span.
    BusyX,
    /// Maps to the vertical viewport span.
    BusyY,
}

/// How to bind a slave axis to its base.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlaveAction {
    /// Bind with the given base-relative mapping.
    Enable {
        /// Relative scale.
        scale: f64,
        /// Relative offset.
        offset: f64,
    },
    /// Bind, rebasing the current absolute mapping so the screen image
    /// does not move.
    HoldAsIs,
}

/// One axis table entry.
#[derive(Debug, Clone)]
pub struct Axis {
    pub(crate) role: AxisRole,
    pub(crate) slave: Option<usize>,
    pub(crate) map: Affine<f64>,
    pub(crate) label: String,
    pub(crate) lock_scale: bool,
    pub(crate) compact: bool,
    pub(crate) band: i32,
}

impl Default for Axis {
    fn default() -> Self {
        Self {
            role: AxisRole::Free,
            slave: None,
            map: Affine::unit(),
            label: String::new(),
            lock_scale: false,
            compact: false,
            band: 0,
        }
    }
}

impl Axis {
    /// Current role.
    #[inline]
    pub fn role(&self) -> AxisRole {
        self.role
    }

    /// Base axis index when slaved.
    #[inline]
    pub fn slave_base(&self) -> Option<usize> {
        self.slave
    }

    /// Normalized-space mapping, base composition not applied.
    #[inline]
    pub fn map(&self) -> Affine<f64> {
        self.map
    }

    /// Axis label text.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether bulk autoscale retargets this axis.
    #[inline]
    pub fn locked(&self) -> bool {
        self.lock_scale
    }
}

// ============================================================================
// Axis Table
// ============================================================================

/// Fixed table of axes plus the active (default) X and Y axes.
#[derive(Debug, Default)]
pub struct Axes {
    pub(crate) list: Vec<Axis>,
    pub(crate) on_x: Option<usize>,
    pub(crate) on_y: Option<usize>,
}

impl Axes {
    /// Table with `count` free axes.
    pub fn new(count: usize) -> Self {
        let mut list = Vec::with_capacity(count);
        list.resize_with(count, Axis::default);
        Self {
            list,
            on_x: None,
            on_y: None,
        }
    }

    /// Number of axis slots.
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
    pub fn get(&self, a: usize) -> Option<&Axis> {
        self.list.get(a)
    }

    /// Active X axis, if any figure established one.
    #[inline]
    pub fn on_x(&self) -> Option<usize> {
        self.on_x
    }

    /// Active Y axis.
    #[inline]
    pub fn on_y(&self) -> Option<usize> {
        self.on_y
    }

    /// Validate an axis handle.
    pub fn check(&self, a: usize) -> Result<(), PlotError> {
        if a >= self.list.len() {
            return Err(PlotError::AxisIndex {
                got: a,
                max: self.list.len(),
            });
        }
        Ok(())
    }

    /// First free axis, if any.
    pub fn free_axis(&self) -> Option<usize> {
        self.list.iter().position(|ax| ax.role == AxisRole::Free)
    }

    /// Replace the label; empty text keeps the current one.
    pub fn set_label(&mut self, a: usize, label: &str) {
        if !label.is_empty() {
            self.list[a].label.clear();
            self.list[a].label.push_str(label);
        }
    }

    /// Whether any slaved axis uses `a` as its base.
    pub fn is_base(&self, a: usize) -> bool {
        self.list
            .iter()
            .any(|ax| ax.role != AxisRole::Free && ax.slave == Some(a))
    }

    // ========================================================================
    // Mapping Composition
    // ========================================================================

    /// Data → normalized [0,1], composed through the slave base.
    pub fn composed(&self, a: usize) -> Affine<f64> {
        let ax = &self.list[a];
        match ax.slave {
            Some(b) => ax.map.then(&self.list[b].map),
            None => ax.map,
        }
    }

    /// Data → pixels for the axis role under the given viewport.
    pub fn to_pixels(&self, a: usize, vp: &Viewport) -> Affine<f64> {
        let norm = self.composed(a);
        match self.list[a].role {
            AxisRole::BusyX => norm.then(&vp.x_map()),
            AxisRole::BusyY => norm.then(&vp.y_map()),
            AxisRole::Free => norm,
        }
    }

    /// Map one data value to a pixel coordinate.
    #[inline]
    pub fn conv(&self, a: usize, vp: &Viewport, v: f64) -> f64 {
        self.to_pixels(a, vp).apply(v)
    }

    /// Map one pixel coordinate back to a data value.
    #[inline]
    pub fn conv_inv(&self, a: usize, vp: &Viewport, px: f64) -> f64 {
        self.to_pixels(a, vp).invert().apply(px)
    }

    // ========================================================================
    // Interactive Scaling
    // ========================================================================

    /// Point the mapping at `[min, max]`; ignored for free or slave axes.
    pub fn scale_manual(&mut self, a: usize, min: f64, max: f64) {
        let ax = &mut self.list[a];
        if ax.role == AxisRole::Free || ax.slave.is_some() {
            return;
        }
        ax.map = Affine::onto_unit(min, max);
    }

    /// Zoom about a pixel origin; clears the scale lock.
    pub fn zoom(&mut self, a: usize, vp: &Viewport, origin: i32, zoom: f64) {
        let ax = &mut self.list[a];
        if ax.slave.is_some() {
            return;
        }
        match ax.role {
            AxisRole::BusyX => {
                ax.map.offset = ax.map.offset * zoom
                    + (vp.min_x - origin) as f64 / (vp.max_x - vp.min_x) as f64 * (zoom - 1.0);
                ax.map.scale *= zoom;
            }
            AxisRole::BusyY => {
                ax.map.offset = ax.map.offset * zoom
                    + (vp.max_y - origin) as f64 / (vp.min_y - vp.max_y) as f64 * (zoom - 1.0);
                ax.map.scale *= zoom;
            }
            AxisRole::Free => {}
        }
        ax.lock_scale = false;
    }

    /// Pan by a pixel delta; clears the scale lock.
    pub fn shift(&mut self, a: usize, vp: &Viewport, delta: i32) {
        let ax = &mut self.list[a];
        if ax.slave.is_some() {
            return;
        }
        match ax.role {
            AxisRole::BusyX => {
                ax.map.offset += delta as f64 / (vp.max_x - vp.min_x) as f64;
            }
            AxisRole::BusyY => {
                ax.map.offset += delta as f64 / (vp.min_y - vp.max_y) as f64;
            }
            AxisRole::Free => {}
        }
        ax.lock_scale = false;
    }

    /// Copy the finer of the two active axes' units onto the other so X
    /// and Y spans are isometric in pixels.
    pub fn scale_equal(&mut self, vp: &Viewport) {
        let (x, y) = match (self.on_x, self.on_y) {
            (Some(x), Some(y)) => (x, y),
            _ => return,
        };

        let aspect_x = (vp.max_x - vp.min_x) as f64;
        let aspect_y = (vp.max_y - vp.min_y) as f64;

        if self.list[y].map.scale < self.list[x].map.scale {
            let zoom = self.list[y].map.scale / self.list[x].map.scale * (aspect_y / aspect_x);
            let ax = &mut self.list[x];
            ax.map.offset = ax.map.offset * zoom + (1.0 - zoom) / 2.0;
            ax.map.scale *= zoom;
        } else {
            let zoom = self.list[x].map.scale / self.list[y].map.scale * (aspect_x / aspect_y);
            let ay = &mut self.list[y];
            ay.map.offset = ay.map.offset * zoom + (1.0 - zoom) / 2.0;
            ay.map.scale *= zoom;
        }

        self.list[x].lock_scale = false;
        self.list[y].lock_scale = false;
    }

    /// Set every axis's scale lock at once.
    pub fn scale_lock(&mut self, lock: bool) {
        for ax in &mut self.list {
            ax.lock_scale = lock;
        }
    }

    // ========================================================================
    // Slave Binding
    // ========================================================================

    /// Bind `a` as a slave of `base`; no-op when already slaved.
    pub fn slave(&mut self, a: usize, base: usize, action: SlaveAction) -> Result<(), PlotError> {
        self.check(a)?;
        self.check(base)?;

        if base == a {
            return Err(PlotError::SlaveSelf(a));
        }
        if self.list[base].slave.is_some() {
            return Err(PlotError::SlaveOfSlave { base });
        }
        if self.is_base(a) {
            return Err(PlotError::BaseInUse(a));
        }
        if self.list[a].slave.is_some() {
            return Ok(());
        }

        match action {
            SlaveAction::Enable { scale, offset } => {
                self.list[a].slave = Some(base);
                self.list[a].map = Affine::new(scale, offset);
            }
            SlaveAction::HoldAsIs => {
                let rebased = self.list[a].map.rebase(&self.list[base].map);
                self.list[a].slave = Some(base);
                self.list[a].map = rebased;
            }
        }

        if self.on_x == Some(a) {
            self.on_x = Some(base);
        }
        if self.on_y == Some(a) {
            self.on_y = Some(base);
        }
        Ok(())
    }

    /// Unbind a slave, folding its relative mapping back into an
    /// absolute one; no-op when not slaved.
    pub fn slave_disable(&mut self, a: usize) -> Result<(), PlotError> {
        self.check(a)?;
        if let Some(base) = self.list[a].slave {
            let folded = self.list[a].map.then(&self.list[base].map);
            self.list[a].slave = None;
            self.list[a].map = folded;
        }
        Ok(())
    }

    /// Return an axis to the free pool, keeping its mapping.
    pub(crate) fn reset_entry(&mut self, a: usize) {
        let ax = &mut self.list[a];
        ax.role = AxisRole::Free;
        ax.slave = None;
        ax.label.clear();
        ax.compact = false;
    }
}
