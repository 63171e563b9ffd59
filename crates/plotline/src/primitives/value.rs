//! Scalar sample type for dataset cells.
//!
//! ## Purpose
//!
//! This module defines the `Real` trait, the scalar type datasets store and
//! every layer computes with. It extends `num_traits::Float` with raw-bit
//! access so the chunk codec can compress samples bit-exactly, including
//! NaN payloads.
//!
//! ## Design notes
//!
//! * **Widths**: Implemented for `f32` and `f64`; raw bits are widened to
//!   `u64` so the codec has a single bit-stream path.
//! * **Sealed**: The trait cannot be implemented outside the crate; codec
//!   framing depends on the exact `RAW_BITS` values.
//! * **Solver precision**: The least-squares cascade always computes in
//!   `f64`; `Real` only governs storage and per-row arithmetic.
//!
//! ## Invariants
//!
//! * `from_raw(to_raw(v))` reproduces `v` bit-for-bit, NaN included.
//! * `to_raw` zero-extends; bits above `RAW_BITS` are always zero.

// External dependencies
use core::fmt::Debug;
use num_traits::Float;

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

// ============================================================================
// Real Trait
// ============================================================================

/// Scalar sample type stored in dataset cells.
pub trait Real: Float + Debug + Default + sealed::Sealed + 'static {
    /// Width of the raw representation in bits (32 or 64).
    const RAW_BITS: u32;

    /// Bit width of the leading-zero field in the codec's window header.
    const WINDOW_BITS: u8;

    /// Raw bit pattern, zero-extended to 64 bits.
    fn to_raw(self) -> u64;

    /// Rebuild a sample from a raw bit pattern (upper bits ignored).
    fn from_raw(raw: u64) -> Self;

    /// Lossless widening for solver input and pixel mapping.
    fn as_f64(self) -> f64;

    /// Narrowing conversion from solver output.
    fn from_f64(v: f64) -> Self;
}

impl Real for f32 {
    const RAW_BITS: u32 = 32;
    const WINDOW_BITS: u8 = 5;

    #[inline]
    fn to_raw(self) -> u64 {
        self.to_bits() as u64
    }

    #[inline]
    fn from_raw(raw: u64) -> Self {
        f32::from_bits(raw as u32)
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }
}

impl Real for f64 {
    const RAW_BITS: u32 = 64;
    const WINDOW_BITS: u8 = 6;

    #[inline]
    fn to_raw(self) -> u64 {
        self.to_bits()
    }

    #[inline]
    fn from_raw(raw: u64) -> Self {
        f64::from_bits(raw)
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }
}
