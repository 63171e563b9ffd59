//! Bit-exact XOR compression for chunk slabs.
//!
//! ## Purpose
//!
//! This module packs a chunk's cells into a compressed byte blob and back.
//! Samples in a chunk are highly correlated (monotonic time columns, slowly
//! moving signals), so XOR-with-previous leaves long zero runs that a
//! leading/trailing-zero window encodes in a few bits per cell.
//!
//! ## Design notes
//!
//! * **Framing**: first cell raw, then per cell: `0` = identical bits,
//!   `10` + significand reusing the previous window, `11` + new window
//!   (leading-zero count, significand length − 1, significand).
//! * **Bit-exact**: raw bit patterns are compressed as-is. NaN payloads,
//!   negative zero, and denormals all survive the round trip unchanged,
//!   which the storage layer relies on when recompressing dirty chunks.
//! * **Widths**: the stream is parameterized by `Real::RAW_BITS` and
//!   `Real::WINDOW_BITS`, so `f32` chunks spend 5-bit window headers and
//!   `f64` chunks 6-bit ones.
//!
//! ## Invariants
//!
//! * `decompress(compress(cells), cells.len()) == cells` bit-for-bit.
//! * The blob carries no cell count; the caller supplies it on decode.
//!
//! ## Non-goals
//!
//! * No checksums or versioning; blobs never leave the process.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

// Internal dependencies
use crate::primitives::value::Real;

// ============================================================================
// Bit Writer
// ============================================================================

struct BitWriter {
    buf: Vec<u8>,
    acc: u128,
    nbits: u32,
}

impl BitWriter {
    fn new(buf: Vec<u8>) -> Self {
        Self { buf, acc: 0, nbits: 0 }
    }

    fn write_bits(&mut self, v: u64, n: u8) {
        if n == 0 {
            return;
        }
        let n = n as u32;
        let mask: u128 = if n == 64 { u64::MAX as u128 } else { (1u128 << n) - 1 };
        self.acc |= ((v as u128) & mask) << self.nbits;
        self.nbits += n;

        while self.nbits >= 8 {
            self.buf.push((self.acc & 0xFF) as u8);
            self.acc >>= 8;
            self.nbits -= 8;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.nbits > 0 {
            self.buf.push((self.acc & 0xFF) as u8);
        }
        self.buf
    }
}

// ============================================================================
// Bit Reader
// ============================================================================

struct BitReader<'a> {
    buf: &'a [u8],
    pos: usize,
    acc: u128,
    nbits: u32,
}

impl<'a> BitReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            acc: 0,
            nbits: 0,
        }
    }

    fn read_bits(&mut self, n: u8) -> Result<u64, &'static str> {
        if n == 0 {
            return Ok(0);
        }
        let n = n as u32;

        while self.nbits < n {
            if self.pos >= self.buf.len() {
                return Err("codec: truncated blob");
            }
            self.acc |= (self.buf[self.pos] as u128) << self.nbits;
            self.nbits += 8;
            self.pos += 1;
        }

        let mask: u128 = if n == 64 { u64::MAX as u128 } else { (1u128 << n) - 1 };
        let v = (self.acc & mask) as u64;
        self.acc >>= n;
        self.nbits -= n;

        Ok(v)
    }
}

// ============================================================================
// Compression
// ============================================================================

/// Compress cells into `blob`, replacing its contents.
pub fn compress_into<T: Real>(cells: &[T], blob: &mut Vec<u8>) {
    blob.clear();
    if cells.is_empty() {
        return;
    }

    let width = T::RAW_BITS as u8;
    let mut writer = BitWriter::new(core::mem::take(blob));

    let mut prev = cells[0].to_raw();
    writer.write_bits(prev, width);

    let mut prev_leading: u8 = 0;
    let mut prev_trailing: u8 = 0;
    let mut prev_sig: u8 = 0;
    let mut has_window = false;

    for &cell in &cells[1..] {
        let curr = cell.to_raw();
        let xor = prev ^ curr;
        if xor == 0 {
            writer.write_bits(0, 1);
        } else {
            writer.write_bits(1, 1);

            let leading = (xor.leading_zeros() - (64 - T::RAW_BITS)) as u8;
            let trailing = xor.trailing_zeros() as u8;
            let sig = width - leading - trailing;

            if has_window && leading >= prev_leading && trailing >= prev_trailing {
                writer.write_bits(0, 1);
                writer.write_bits(xor >> prev_trailing, prev_sig);
            } else {
                writer.write_bits(1, 1);
                // Significand length is 1..=width, stored biased by one so
                // a full-width significand still fits the window field.
                writer.write_bits(leading as u64, T::WINDOW_BITS);
                writer.write_bits((sig - 1) as u64, T::WINDOW_BITS);
                writer.write_bits(xor >> trailing, sig);
                prev_leading = leading;
                prev_trailing = trailing;
                prev_sig = sig;
                has_window = true;
            }
        }
        prev = curr;
    }

    *blob = writer.finish();
}

/// Compress cells into a fresh blob.
pub fn compress<T: Real>(cells: &[T]) -> Vec<u8> {
    let mut blob = Vec::new();
    compress_into(cells, &mut blob);
    blob
}

// ============================================================================
// Decompression
// ============================================================================

/// Decompress `count` cells from a blob into `out`, replacing its contents.
pub fn decompress_into<T: Real>(
    blob: &[u8],
    count: usize,
    out: &mut Vec<T>,
) -> Result<(), &'static str> {
    out.clear();
    if count == 0 {
        return Ok(());
    }

    let width = T::RAW_BITS as u8;
    let mut reader = BitReader::new(blob);

    let first = reader.read_bits(width)?;
    out.reserve(count);
    out.push(T::from_raw(first));

    let mut prev = first;
    let mut prev_trailing: u8 = 0;
    let mut prev_sig: u8 = 0;
    let mut has_window = false;

    while out.len() < count {
        if reader.read_bits(1)? == 0 {
            out.push(T::from_raw(prev));
            continue;
        }

        let xor = if reader.read_bits(1)? == 0 {
            if !has_window {
                return Err("codec: stream reuses a window before defining one");
            }
            reader.read_bits(prev_sig)? << prev_trailing
        } else {
            let leading = reader.read_bits(T::WINDOW_BITS)? as u8;
            let sig = reader.read_bits(T::WINDOW_BITS)? as u8 + 1;
            if leading + sig > width {
                return Err("codec: window exceeds sample width");
            }
            let trailing = width - leading - sig;
            let x = reader.read_bits(sig)?;
            has_window = true;
            prev_trailing = trailing;
            prev_sig = sig;
            x << trailing
        };

        prev ^= xor;
        out.push(T::from_raw(prev));
    }

    Ok(())
}

/// Decompress `count` cells from a blob.
pub fn decompress<T: Real>(blob: &[u8], count: usize) -> Result<Vec<T>, &'static str> {
    let mut out = Vec::new();
    decompress_into(blob, count, &mut out)?;
    Ok(out)
}

// ============================================================================
// Tests
// ============================================================================
