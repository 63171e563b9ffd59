//! Affine scale/offset mappings.
//!
//! ## Purpose
//!
//! This module provides the one-dimensional affine transform used by the
//! axis model: data → normalized [0,1] → pixel space, each step a
//! `v * scale + offset` pair, composed and inverted without ever building
//! matrices. The pixel rectangle itself lives here too, as the terminal
//! stage of that composition.
//!
//! ## Key concepts
//!
//! * **Composition**: `a.then(b)` applies `a` first, then `b`; slave axes
//!   compose their relative mapping through the base, then the viewport.
//! * **Inversion**: exact algebraic inverse; a zero scale inverts to
//!   non-finite values by design, which downstream range checks reject.

// External dependencies
use num_traits::Float;

// ============================================================================
// Affine Transform
// ============================================================================

/// One-dimensional affine transform `v ↦ v * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine<T> {
    /// Multiplicative part.
    pub scale: T,
    /// Additive part.
    pub offset: T,
}

impl<T: Float> Affine<T> {
    /// Build a transform from its parts.
    #[inline]
    pub fn new(scale: T, offset: T) -> Self {
        Self { scale, offset }
    }

    /// The identity transform.
    #[inline]
    pub fn unit() -> Self {
        Self {
            scale: T::one(),
            offset: T::zero(),
        }
    }

    /// Transform mapping `[lo, hi]` onto `[0, 1]`.
    ///
    /// A degenerate interval yields non-finite parts; callers widen the
    /// interval before mapping.
    #[inline]
    pub fn onto_unit(lo: T, hi: T) -> Self {
        let scale = T::one() / (hi - lo);
        Self {
            scale,
            offset: -lo * scale,
        }
    }

    /// Apply the transform.
    #[inline]
    pub fn apply(&self, v: T) -> T {
        v * self.scale + self.offset
    }

    /// Compose: apply `self` first, then `outer`.
    #[inline]
    pub fn then(&self, outer: &Self) -> Self {
        Self {
            scale: self.scale * outer.scale,
            offset: self.offset * outer.scale + outer.offset,
        }
    }

    /// Algebraic inverse.
    #[inline]
    pub fn invert(&self) -> Self {
        let scale = T::one() / self.scale;
        Self {
            scale,
            offset: -self.offset * scale,
        }
    }

    /// Express this absolute mapping relative to `base`, so that
    /// `rebased.then(base) == self`.
    #[inline]
    pub fn rebase(&self, base: &Self) -> Self {
        Self {
            scale: self.scale / base.scale,
            offset: (self.offset - base.offset) / base.scale,
        }
    }
}

// ============================================================================
// Viewport
// ============================================================================

/// Pixel rectangle the plot area occupies, all edges inclusive.
///
/// Pixel Y grows downward, so the Y mapping runs the data direction
/// bottom-up: normalized 0 lands on `max_y`, 1 on `min_y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    /// Left edge.
    pub min_x: i32,
    /// Right edge.
    pub max_x: i32,
    /// Top edge.
    pub min_y: i32,
    /// Bottom edge.
    pub max_y: i32,
}

impl Viewport {
    /// Build a viewport from its pixel edges.
    #[inline]
    pub fn new(min_x: i32, max_x: i32, min_y: i32, max_y: i32) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// Affine taking normalized [0,1] onto the horizontal pixel span.
    #[inline]
    pub fn x_map(&self) -> Affine<f64> {
        Affine::new((self.max_x - self.min_x) as f64, self.min_x as f64)
    }

    /// Affine taking normalized [0,1] onto the vertical pixel span,
    /// inverted so larger values land higher on screen.
    #[inline]
    pub fn y_map(&self) -> Affine<f64> {
        Affine::new((self.min_y - self.max_y) as f64, self.max_y as f64)
    }

    /// Horizontal pixel extent.
    #[inline]
    pub fn width(&self) -> i32 {
        self.max_x - self.min_x
    }

    /// Vertical pixel extent.
    #[inline]
    pub fn height(&self) -> i32 {
        self.max_y - self.min_y
    }

    /// Whether a pixel point falls inside the rectangle.
    #[inline]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x as f64
            && x <= self.max_x as f64
            && y >= self.min_y as f64
            && y <= self.max_y as f64
    }
}
