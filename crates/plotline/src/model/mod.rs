//! Layer 6: Model.
//!
//! ## Purpose
//!
//! This layer holds the presentation model: axes with affine windows,
//! slave relations and roles, figures binding dataset columns to axis
//! pairs, and dataset groups for shared overlay labels. Lifecycle
//! operations keep the tables referentially consistent as figures and
//! axes come and go.
//!
//! ## Architecture
//!
//! ```text
//! Layer 8: API            (plot context, builder)
//!            ↓
//! Layer 7: Rendering      (scheduler, sketches, clipping)
//!            ↓
//! Layer 6: Model          (axes, figures, groups) ← You are here
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
//! * `axis`: axis table, windows, zoom, shift, slave relations
//! * `figure`: figure and group tables, lifecycle, autoscale

pub mod axis;
pub mod figure;
