//! Layer 2: Math
//!
//! # Purpose
//!
//! This layer provides pure mathematical building blocks with no knowledge
//! of datasets or rendering:
//! - Affine scale/offset transforms for the axis model
//! - The least-squares cascade accumulator for polynomial fitting
//!
//! # Architecture
//!
//! ```text
//! Layer 8: API
//!   ↓
//! Layer 7: Render
//!   ↓
//! Layer 6: Model
//!   ↓
//! Layer 5: Columns
//!   ↓
//! Layer 4: Cache
//!   ↓
//! Layer 3: Storage
//!   ↓
//! Layer 2: Math ← You are here
//!   ↓
//! Layer 1: Primitives
//! ```

/// One-dimensional affine transforms.
pub mod affine;

/// Least-squares cascade accumulator.
pub mod lse;
