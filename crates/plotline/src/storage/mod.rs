//! Layer 3: Ring-buffered dataset storage.
//!
//! ## Purpose
//!
//! This layer owns the sample memory. Datasets are fixed-capacity rings of
//! rows split into chunks; chunks are either materialized cell slabs or
//! compressed blobs behind a small decompression cache.
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
//! Layer 4: Caching        (range summaries, slicing)
//!            ↓
//! Layer 3: Storage        (datasets, chunks) ← You are here
//!            ↓
//! Layer 2: Math           (affine maps, least squares)
//!            ↓
//! Layer 1: Primitives     (errors, values, layout, codec)
//! ```
//!
//! ## Modules
//!
//! * `chunk`: slab/blob backing and the decompression cache
//! * `dataset`: the ring protocol and row addressing

pub(crate) mod chunk;
pub mod dataset;
