//! Layer 4: Range summaries and nearest-sample lookup.
//!
//! ## Purpose
//!
//! This layer caches per-chunk finite min/max statistics of dataset
//! columns and answers range, conditional-range and nearest-sample
//! queries in near-constant time once warm.
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
//! Layer 5: Columns        (derived-column engine)
//!            ↓
//! Layer 4: Caching        (range summaries, slicing) ← You are here
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
//! * `range`: the slot pool, fetch, conditional ranges, wipe protocol
//! * `slice`: nearest-sample lookup over cached bounds

pub mod range;
pub mod slice;
