//! Layer 5: Derived columns.
//!
//! ## Purpose
//!
//! This layer computes derived columns next to a dataset's primary
//! columns: scaling, binary combinations, time unwrapping, filters,
//! bit extraction, cross-dataset resampling and fitted-polynomial
//! evaluation. Slots refresh incrementally as rows stream in.
//!
//! ## Architecture
//!
//! ```text
//! Layer 8: API            (plot context, builder)
//!            ↓
//! Layer 7: Rendering      (scheduler, sketches, clipping)
//!            ↓
//! Layer 6: Model          (axes, figures, groups)
//!            ↓
//! Layer 5: Columns        (derived-column engine) ← You are here
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
//! * `ops`: operator definitions and the per-dataset slot bank
//! * `engine`: refresh passes, resampling, constructors, collection

pub mod engine;
pub mod ops;
