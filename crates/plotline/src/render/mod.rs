//! Layer 7: Rendering.
//!
//! ## Purpose
//!
//! This layer turns the model into pixels without ever blocking the
//! frame: a budgeted scheduler walks figure rows and records visible
//! primitives into double-buffered sketches, and a replay pass paints
//! the last complete recording through the live axis windows. Hosts
//! plug in a drawing surface and a frame clock.
//!
//! ## Architecture
//!
//! ```text
//! Layer 8: API            (plot context, builder)
//!            ↓
//! Layer 7: Rendering      (scheduler, sketches, clipping) ← You are here
//!            ↓
//! Layer 6: Model          (axes, figures, groups)
//!            ↓
//! Layer 5: Columns        (derived-column engine)
//!            ↓
//! Layer 4: Caching        (range summaries, slicing)
//!            ↓
//! Layer 3: Storage        (datasets, chunks)
//!            ↓
//! Layer 2: Math           (affine maps, least squares)
//!            ↓
//! Layer 1: Primitives     (errors, values, layout, codec)
//! ```
//!
//! ## Modules
//!
//! * `clip`: Cohen-Sutherland segment clipping
//! * `sketch`: recorded primitive pool, double buffered
//! * `renderer`: trial scheduler and replay
//! * `surface`: host drawing and clock abstractions

pub mod clip;
pub mod renderer;
pub mod sketch;
pub mod surface;
