//! Layer 1: Primitives
//!
//! # Purpose
//!
//! This layer provides the primitive abstractions shared by every other
//! layer: the scalar sample trait, chunk geometry, the bit-exact chunk
//! codec, and the engine's error type. It has zero internal dependencies
//! within the crate.
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
//! Layer 2: Math
//!   ↓
//! Layer 1: Primitives ← You are here
//! ```

/// Shared error types.
pub mod errors;

/// Scalar sample trait for dataset cells.
pub mod value;

/// Power-of-two chunk geometry.
pub mod layout;

/// Bit-exact XOR chunk compression.
pub mod codec;
