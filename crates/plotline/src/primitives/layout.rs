//! Chunk geometry for ring-buffer datasets.
//!
//! ## Purpose
//!
//! This module computes and applies the power-of-two chunk layout shared by
//! the storage, cache, and render layers: how many rows a chunk holds, which
//! chunk a ring position falls into, and how many chunks a capacity needs.
//!
//! ## Design notes
//!
//! * **Sizing rule**: The chunk row count is the smallest power of two whose
//!   chunk byte size reaches the configured minimum. Small row strides get
//!   deep chunks, wide strides get shallow ones, keeping the chunk byte size
//!   roughly constant across datasets.
//! * **Shift/mask**: All addressing is shift/mask arithmetic; no division.
//!
//! ## Invariants
//!
//! * `rows_per_chunk` is a power of two.
//! * `chunk_of(r) * rows_per_chunk + offset_of(r) == r` for all `r`.
//! * `chunks_for(len)` covers `len` rows with no spare chunk.

// ============================================================================
// Chunk Layout
// ============================================================================

/// Power-of-two chunk addressing for one dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    /// log2 of rows per chunk.
    pub shift: u32,
    /// `rows_per_chunk - 1`, the row-offset mask.
    pub mask: usize,
    /// Cells per row (primary columns + derived slots).
    pub stride: usize,
}

impl ChunkLayout {
    /// Upper bound on the sizing search; caps chunks at 2^30 rows.
    const SHIFT_MAX: u32 = 30;

    /// Choose the layout for a row stride.
    ///
    /// `cell_bytes` is the byte size of one cell, `chunk_bytes` the minimum
    /// chunk byte size the layout must reach.
    pub fn new(stride: usize, cell_bytes: usize, chunk_bytes: usize) -> Self {
        let row_bytes = cell_bytes * stride;
        let mut shift = 0;
        while shift < Self::SHIFT_MAX {
            if (row_bytes << shift) >= chunk_bytes {
                break;
            }
            shift += 1;
        }
        Self {
            shift,
            mask: (1usize << shift) - 1,
            stride,
        }
    }

    /// Rows held by one chunk.
    #[inline]
    pub fn rows_per_chunk(&self) -> usize {
        1usize << self.shift
    }

    /// Cells held by one chunk.
    #[inline]
    pub fn cells_per_chunk(&self) -> usize {
        self.stride << self.shift
    }

    /// Chunk index containing ring position `r`.
    #[inline]
    pub fn chunk_of(&self, r: usize) -> usize {
        r >> self.shift
    }

    /// Row offset of ring position `r` within its chunk.
    #[inline]
    pub fn offset_of(&self, r: usize) -> usize {
        r & self.mask
    }

    /// Number of chunks required to hold `len` rows.
    #[inline]
    pub fn chunks_for(&self, len: usize) -> usize {
        (len + self.mask) >> self.shift
    }

    /// Rows of chunk `k` that exist for a capacity of `len` rows.
    #[inline]
    pub fn rows_in_chunk(&self, k: usize, len: usize) -> usize {
        let base = k << self.shift;
        if base >= len {
            0
        } else {
            (len - base).min(self.rows_per_chunk())
        }
    }

    /// First ring position of chunk `k`.
    #[inline]
    pub fn chunk_base(&self, k: usize) -> usize {
        k << self.shift
    }
}
