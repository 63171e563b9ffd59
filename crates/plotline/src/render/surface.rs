//! Drawing surface and frame clock abstractions.
//!
//! ## Purpose
//!
//! The library renders through a host-supplied [`Surface`]: primitives
//! arrive in pixel coordinates with a [`Pen`] naming the figure they
//! belong to, and the host maps pens to its own colors and stroke
//! styles. Time-budgeted drawing reads a [`Clock`] so headless tests
//! can drive the scheduler deterministically.
//!
//! ## Design notes
//!
//! * Figure primitives are clipped to the viewport before they reach
//!   the surface; overlay text and rectangles may extend into the
//!   margins and the host clips those to the screen.
//! * Text extents feed overlay layout, so a surface must measure with
//!   the same font it draws with.

// Feature-gated imports
#[cfg(feature = "std")]
use std::time::Instant;

// ============================================================================
// Pen
// ============================================================================

/// What a primitive belongs to, for host-side styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ink {
    /// Chrome: overlay text, fences, the slice band.
    #[default]
    Chrome,
    /// A figure's own primitives, colored per figure slot.
    Figure(usize),
    /// Backing fill behind legend and readout boxes.
    Background,
    /// Fill under the hovered overlay row.
    Hover,
}

/// Styling handle passed with every primitive.
#[derive(Debug, Clone, Copy)]
pub struct Pen {
    /// Color selector.
    pub ink: Ink,
    /// Muted rendering for hidden figures and stale overlays.
    pub muted: bool,
    /// Stroke width in pixels.
    pub width: i32,
}

impl Pen {
    /// Chrome pen at unit width.
    pub fn chrome() -> Self {
        Self {
            ink: Ink::Chrome,
            muted: false,
            width: 1,
        }
    }

    /// Pen for one figure slot.
    pub fn figure(f: usize, muted: bool, width: i32) -> Self {
        Self {
            ink: Ink::Figure(f),
            muted,
            width,
        }
    }

    /// Backing fill pen; hover fill when `hover` is set.
    pub fn fill(hover: bool) -> Self {
        Self {
            ink: if hover { Ink::Hover } else { Ink::Background },
            muted: false,
            width: 1,
        }
    }
}

// ============================================================================
// Surface
// ============================================================================

/// Host drawing backend.
///
/// Coordinates are pixels with the origin at the top left corner and y
/// growing downward.
pub trait Surface {
    /// Draw a solid segment.
    fn line(&mut self, pen: &Pen, x0: f64, y0: f64, x1: f64, y1: f64);

    /// Draw a dashed segment.
    fn dash(&mut self, pen: &Pen, x0: f64, y0: f64, x1: f64, y1: f64);

    /// Draw an isolated point.
    fn dot(&mut self, pen: &Pen, x: f64, y: f64);

    /// Fill an axis-aligned rectangle.
    fn fill_rect(&mut self, pen: &Pen, x0: i32, y0: i32, x1: i32, y1: i32);

    /// Draw text with its top left corner at the given pixel.
    fn text(&mut self, pen: &Pen, x: i32, y: i32, s: &str);

    /// Pixel width and height the text would occupy.
    fn text_extent(&mut self, s: &str) -> (i32, i32);

    /// Height of one text row in pixels.
    fn font_height(&mut self) -> i32 {
        self.text_extent("M").1
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Monotonic frame clock in milliseconds.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin.
    fn now_ms(&mut self) -> u64;
}

/// Wall clock over [`std::time::Instant`].
#[cfg(feature = "std")]
#[derive(Debug)]
pub struct WallClock {
    origin: Instant,
}

#[cfg(feature = "std")]
impl WallClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for WallClock {
    fn now_ms(&mut self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}
