//! # Plotline — incremental plotting engine for streaming telemetry
//!
//! A ring-buffered plotting core. Datasets ingest rows continuously,
//! derived columns refresh incrementally as rows arrive, and drawing
//! is sliced into per-frame time budgets so million-row figures stay
//! responsive while streaming. Pixels go through a host-supplied
//! [`Surface`](crate::render::surface::Surface); the crate never
//! touches a GUI toolkit, a file, or a thread.
//!
//! ## What it does
//!
//! * **Storage**: fixed-capacity row rings in compressible chunks;
//!   the oldest rows fall off as new ones arrive.
//! * **Derived columns**: scaled copies, clock unwraps, pointwise
//!   combinations, differences, running sums, bit fields, low-pass
//!   filters, cross-dataset resampling, and polynomial fits, all
//!   registered once and refreshed incrementally.
//! * **Model**: figures bind dataset columns to axes; axes window the
//!   data through affine maps, can be slaved together, autoscaled,
//!   zoomed, and panned.
//! * **Rendering**: a budgeted recording pass walks rows, culls whole
//!   chunks with cached bounds, paints visible primitives live, and
//!   replays the last completed picture each frame until the next
//!   pass completes.
//! * **Overlays**: a draggable legend, a value readout box, and a
//!   cursor slice that snaps to the nearest sample per figure.
//!
//! ## Quick Start
//!
//! ```rust
//! use plotline::prelude::*;
//!
//! // Two primary columns: a timestamp and a reading.
//! let mut plot: Plot<f32> = PlotBuilder::new()
//!     .datasets(2)
//!     .figures(4)
//!     .build()?;
//!
//! plot.data_alloc(0, 2, 1000)?;
//! for n in 0..500 {
//!     let t = n as f32 * 0.01;
//!     plot.data_insert(0, &[t, (t * 6.28).sin()])?;
//! }
//!
//! // Column 0 against column 1 on two fresh axes.
//! plot.figure_add(0, 0, Col(0), Col(1), 0, 1, "sine")?;
//!
//! // A derived running sum, plotted on its own Y axis.
//! let sum = plot.column_cumulative(0, Col(1))?;
//! plot.figure_add(1, 0, Col(0), Col(sum), 0, 2, "sum")?;
//! # Result::<(), PlotError>::Ok(())
//! ```
//!
//! ## Drawing
//!
//! One [`draw`](crate::api::Plot::draw) per frame: the host hands in
//! its surface, the screen rectangle, and a clock for the budget.
//!
//! ```rust
//! # #[cfg(feature = "std")] {
//! use plotline::prelude::*;
//!
//! // A surface that counts primitives instead of painting them.
//! #[derive(Default)]
//! struct Counter {
//!     lines: usize,
//! }
//!
//! impl Surface for Counter {
//!     fn line(&mut self, _: &Pen, _: f64, _: f64, _: f64, _: f64) {
//!         self.lines += 1;
//!     }
//!     fn dash(&mut self, _: &Pen, _: f64, _: f64, _: f64, _: f64) {
//!         self.lines += 1;
//!     }
//!     fn dot(&mut self, _: &Pen, _: f64, _: f64) {}
//!     fn fill_rect(&mut self, _: &Pen, _: i32, _: i32, _: i32, _: i32) {}
//!     fn text(&mut self, _: &Pen, _: i32, _: i32, _: &str) {}
//!     fn text_extent(&mut self, s: &str) -> (i32, i32) {
//!         (8 * s.len() as i32, 16)
//!     }
//! }
//!
//! let mut plot: Plot<f64> = PlotBuilder::new().build()?;
//! plot.data_alloc(0, 2, 100)?;
//! for n in 0..100 {
//!     plot.data_insert(0, &[n as f64, (n * n) as f64])?;
//! }
//! plot.figure_add(0, 0, Col(0), Col(1), 0, 1, "ramp")?;
//!
//! let mut surface = Counter::default();
//! let mut clock = WallClock::new();
//! let screen = Viewport::new(0, 800, 0, 600);
//!
//! // The first frame fixes the layout; autoscale then works in
//! // real pixels.
//! plot.draw(&mut surface, &screen, &mut clock);
//! plot.axis_scale_default();
//! plot.draw(&mut surface, &screen, &mut clock);
//! assert!(surface.lines > 0);
//! # }
//! # Result::<(), plotline::prelude::PlotError>::Ok(())
//! ```
//!
//! ## no_std
//!
//! The crate runs without the standard library (with `alloc`) for
//! instrument firmware drawing over a framebuffer:
//!
//! ```toml
//! [dependencies]
//! plotline = { version = "0.1", default-features = false }
//! ```
//!
//! Hosts then supply their own [`Clock`](crate::render::surface::Clock)
//! in place of `WallClock`.
//!
//! ## Layers
//!
//! 1. `primitives` - errors, numeric values, chunk layout, codec.
//! 2. `math` - affine windows and the recursive least-squares solver.
//! 3. `storage` - chunked ring-buffer datasets.
//! 4. `cache` - chunk-level range summaries and slice lookup.
//! 5. `columns` - derived-column operators and the refresh engine.
//! 6. `model` - axes, figures, groups, referential integrity.
//! 7. `render` - clipping, sketch pool, budgeted trial drawing.
//! 8. `api` - the builder and the `Plot` facade.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
#[macro_use]
extern crate alloc;

// Layer 1: Primitives - errors, values, layout, and codec.
pub mod primitives;

// Layer 2: Math - affine windows and least-squares solving.
pub mod math;

// Layer 3: Storage - chunked ring-buffer datasets.
pub mod storage;

// Layer 4: Cache - range summaries and slice lookup.
pub mod cache;

// Layer 5: Columns - derived-column operators and refresh.
pub mod columns;

// Layer 6: Model - axes, figures, and groups.
pub mod model;

// Layer 7: Render - clipping, sketches, and trial drawing.
pub mod render;

// Layer 8: API - the builder and the Plot facade.
pub mod api;

// Standard plotline prelude.
pub mod prelude {
    pub use crate::api::{DataBoxMode, Plot, PlotBuilder};
    pub use crate::columns::ops::BinaryOp::{self, Add, Hypot, Multiply, Subtract};
    pub use crate::math::affine::Viewport;
    pub use crate::model::axis::AxisRole::{self, BusyX, BusyY};
    pub use crate::model::axis::SlaveAction;
    pub use crate::model::figure::Drawing;
    pub use crate::primitives::errors::PlotError;
    pub use crate::render::surface::{Clock, Ink, Pen, Surface};
    #[cfg(feature = "std")]
    pub use crate::render::surface::WallClock;
    pub use crate::storage::dataset::Source::{self, Col, RowId};
}
