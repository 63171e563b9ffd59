//! Ring-buffered dataset storage.
//!
//! ## Purpose
//!
//! A dataset is a fixed-capacity ring of rows. Each row carries the
//! dataset's primary columns followed by a bank of derived-column cells.
//! Rows are addressed by monotonically increasing logical ids, so readers
//! never see an index shift when old rows are overwritten.
//!
//! ## Key concepts
//!
//! * **Logical ids**: `head_id..tail_id` spans the retained rows. The id
//!   of a row never changes; overwriting the oldest row advances
//!   `head_id`. With capacity `L` after `N` inserts the retained span is
//!   `max(0, N - L)..N`.
//! * **Chunks**: rows live in power-of-two-row chunks sized by
//!   [`ChunkLayout`]. A chunk is the unit of compression, caching and
//!   range summarization.
//! * **Resume cursor**: `sub_resume` marks the first row whose derived
//!   cells have not been refreshed. It only moves forward, except when
//!   dragged up by an advancing head.
//!
//! ## Invariants
//!
//! * `tail_id - head_id <= length` at all times.
//! * `position_of(head_id) == head` and ids map to positions by offset
//!   modulo `length`.
//! * An insert touches exactly one chunk; the caller is told which so
//!   range summaries can be invalidated.
//!
//! ## Edge cases
//!
//! * Inserting into an unallocated or zero-length dataset drops the row.
//! * A chunk whose slab allocation failed truncates the usable length;
//!   reads beyond it see end of data.
//! * Shrinking discards all rows; growing preserves them.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

// External dependencies
use log::{debug, error};

// Internal dependencies
use crate::primitives::errors::PlotError;
use crate::primitives::layout::ChunkLayout;
use crate::primitives::value::Real;
use crate::storage::chunk::ChunkBacking;

// ============================================================================
// Column Sources
// ============================================================================

/// What a reader samples from a row: a stored column or the synthetic
/// row-id pseudo-column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// The row's logical id as a value.
    RowId,
    /// A stored cell, primary or derived.
    Col(usize),
}

// ============================================================================
// Storage Configuration
// ============================================================================

/// Storage tuning shared by every dataset of a plot.
#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    /// Derived-column cells appended to each row.
    pub derived: usize,
    /// Target chunk size in bytes.
    pub chunk_bytes: usize,
    /// Upper bound on chunks per dataset.
    pub chunk_cap: usize,
    /// Decompression cache slots per dataset (packed mode).
    pub cache_slots: usize,
    /// Store chunks compressed.
    pub compress: bool,
}

// ============================================================================
// Dataset
// ============================================================================

/// One ring-buffered dataset.
///
/// `columns == 0` marks the unallocated state; every accessor short-circuits
/// until [`Dataset::alloc`] is called.
#[derive(Debug)]
pub struct Dataset<T: Real> {
    /// Primary columns per row; zero while unallocated.
    columns: usize,
    /// Derived cells per row.
    derived: usize,
    /// Row addressing; valid only while allocated.
    layout: ChunkLayout,
    /// Ring capacity in rows.
    length: usize,
    /// Chunk table cap, in chunks.
    chunk_cap: usize,
    /// Ring position of the oldest retained row.
    head: usize,
    /// Ring position the next insert writes to.
    tail: usize,
    /// Logical id of the oldest retained row.
    head_id: u64,
    /// Logical id the next insert receives.
    tail_id: u64,
    /// First logical id with unrefreshed derived cells.
    sub_resume: u64,
    backing: ChunkBacking<T>,
}

impl<T: Real> Default for Dataset<T> {
    fn default() -> Self {
        Self {
            columns: 0,
            derived: 0,
            layout: ChunkLayout::new(1, core::mem::size_of::<T>(), 1),
            length: 0,
            chunk_cap: 0,
            head: 0,
            tail: 0,
            head_id: 0,
            tail_id: 0,
            sub_resume: 0,
            backing: ChunkBacking::Raw { slabs: Vec::new() },
        }
    }
}

impl<T: Real> Dataset<T> {
    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    /// Allocate the dataset, or re-arm it when already allocated.
    ///
    /// Re-allocation keeps the chunk table where possible but discards all
    /// rows. The column count of an allocated dataset is fixed; asking for
    /// a different one is rejected.
    pub fn alloc(&mut self, columns: usize, length: usize, cfg: &StoreConfig) -> Result<(), PlotError> {
        if columns == 0 {
            return Err(PlotError::InvalidParameter {
                name: "columns",
                got: 0,
                min: 1,
            });
        }
        if length == 0 {
            return Err(PlotError::EmptyLength);
        }

        if self.columns != 0 {
            if self.columns != columns {
                return Err(PlotError::ColumnCountConflict {
                    requested: columns,
                    allocated: self.columns,
                });
            }
        } else {
            self.columns = columns;
            self.derived = cfg.derived;
            self.chunk_cap = cfg.chunk_cap.max(1);
            self.layout = ChunkLayout::new(
                columns + cfg.derived,
                core::mem::size_of::<T>(),
                cfg.chunk_bytes,
            );
            self.backing = ChunkBacking::new(cfg.compress, cfg.cache_slots);
        }

        self.chunk_realloc(length);
        self.reset_ring();
        Ok(())
    }

    /// Resize the ring to `length` rows.
    ///
    /// Shrinking discards all retained rows; growing preserves them.
    pub fn resize(&mut self, length: usize) -> Result<(), PlotError> {
        if self.columns == 0 {
            return Err(PlotError::DatasetUnallocated(0));
        }
        if length == 0 {
            return Err(PlotError::EmptyLength);
        }
        if length < self.length {
            self.reset_ring();
        }
        self.chunk_realloc(length);
        Ok(())
    }

    /// Grow the ring to the next chunk boundary.
    pub fn grow(&mut self) -> Result<(), PlotError> {
        let rows = self.layout.rows_per_chunk();
        let target = (self.length / rows + 1) * rows;
        self.resize(target)
    }

    /// Release all storage and return to the unallocated state.
    pub fn clean(&mut self) {
        self.backing.release();
        self.columns = 0;
        self.derived = 0;
        self.length = 0;
        self.reset_ring();
    }

    fn reset_ring(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.head_id = 0;
        self.tail_id = 0;
        self.sub_resume = 0;
    }

    /// Bring the chunk table in line with a requested length.
    fn chunk_realloc(&mut self, length: usize) {
        let rows = self.layout.rows_per_chunk();
        let mut length = length;
        let cap_rows = self.chunk_cap * rows;
        if length > cap_rows {
            debug!("dataset length {} clamped to {} rows", length, cap_rows);
            length = cap_rows;
        }
        let chunks = self.layout.chunks_for(length);
        let backed = self.backing.realloc(chunks, self.layout.cells_per_chunk());
        if backed < chunks {
            length = backed * rows;
            error!("dataset truncated to {} rows", length);
        }
        self.length = length;
    }

    // ------------------------------------------------------------------
    // Ring protocol
    // ------------------------------------------------------------------

    /// Append one row, overwriting the oldest when full.
    ///
    /// Returns the chunk the row landed in so the caller can invalidate
    /// derived state, or `None` when the row was dropped.
    pub fn insert(&mut self, row: &[T]) -> Option<usize> {
        if self.columns == 0 || self.length == 0 {
            return None;
        }

        if self.tail_id - self.head_id == self.length as u64 {
            self.head = self.advance(self.head);
            self.head_id += 1;
            if self.sub_resume < self.head_id {
                self.sub_resume = self.head_id;
            }
        }

        let pos = self.tail;
        let k = self.layout.chunk_of(pos);
        let base = self.layout.offset_of(pos) * self.layout.stride;
        let cells = self.layout.cells_per_chunk();
        let slab = self.backing.chunk_mut(k, cells, k)?;
        let dst = &mut slab[base..base + self.columns.min(row.len())];
        dst.copy_from_slice(&row[..dst.len()]);

        self.tail = self.advance(self.tail);
        self.tail_id += 1;
        Some(k)
    }

    #[inline]
    fn advance(&self, pos: usize) -> usize {
        if pos + 1 == self.length {
            0
        } else {
            pos + 1
        }
    }

    /// Ring position of a retained logical id.
    #[inline]
    pub fn position_of(&self, id: u64) -> usize {
        debug_assert!(self.length > 0);
        debug_assert!(id >= self.head_id && id < self.tail_id);
        (self.head + (id - self.head_id) as usize) % self.length
    }

    // ------------------------------------------------------------------
    // Row access
    // ------------------------------------------------------------------

    /// Borrow the cells of one retained row.
    pub fn read_row(&mut self, id: u64) -> Option<&[T]> {
        if id < self.head_id || id >= self.tail_id {
            return None;
        }
        let pos = self.position_of(id);
        let k = self.layout.chunk_of(pos);
        let stride = self.layout.stride;
        let base = self.layout.offset_of(pos) * stride;
        let cells = self.layout.cells_per_chunk();
        let tail_chunk = self.layout.chunk_of(self.tail);
        let slab = self.backing.chunk(k, cells, tail_chunk)?;
        Some(&slab[base..base + stride])
    }

    /// Read a single cell of a retained row.
    pub fn read_cell(&mut self, id: u64, col: usize) -> Option<T> {
        let stride = self.layout.stride;
        if col >= stride {
            return None;
        }
        self.read_row(id).map(|row| row[col])
    }

    /// Sample a source at a retained row.
    pub fn sample(&mut self, id: u64, source: Source) -> Option<T> {
        match source {
            Source::RowId => {
                if id >= self.head_id && id < self.tail_id {
                    Some(T::from_f64(id as f64))
                } else {
                    None
                }
            }
            Source::Col(c) => self.read_cell(id, c),
        }
    }

    /// Overwrite a single cell, returning the touched chunk.
    pub fn write_cell(&mut self, id: u64, col: usize, value: T) -> Option<usize> {
        if id < self.head_id || id >= self.tail_id || col >= self.layout.stride {
            return None;
        }
        let pos = self.position_of(id);
        let k = self.layout.chunk_of(pos);
        let base = self.layout.offset_of(pos) * self.layout.stride;
        let cells = self.layout.cells_per_chunk();
        let tail_chunk = self.layout.chunk_of(self.tail);
        let slab = self.backing.chunk_mut(k, cells, tail_chunk)?;
        slab[base + col] = value;
        Some(k)
    }

    /// Longest contiguous stretch of retained rows starting at `id`.
    ///
    /// The run ends at the first chunk boundary, ring wrap or tail,
    /// whichever comes first. Returns the start position and row count.
    pub fn run(&self, id: u64) -> Option<(usize, usize)> {
        if id < self.head_id || id >= self.tail_id {
            return None;
        }
        let pos = self.position_of(id);
        let rows = self.layout.rows_per_chunk();
        let chunk_end = self.layout.chunk_base(self.layout.chunk_of(pos)) + rows;
        let len = ((self.tail_id - id) as usize)
            .min(chunk_end - pos)
            .min(self.length - pos);
        Some((pos, len))
    }

    /// Borrow a chunk's cell slab for scanning.
    pub fn chunk_cells(&mut self, k: usize) -> Option<&[T]> {
        let cells = self.layout.cells_per_chunk();
        let tail_chunk = self.layout.chunk_of(self.tail);
        self.backing.chunk(k, cells, tail_chunk)
    }

    // ------------------------------------------------------------------
    // Geometry and cursors
    // ------------------------------------------------------------------

    pub fn is_allocated(&self) -> bool {
        self.columns != 0
    }

    /// Primary columns per row.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Derived cells per row.
    pub fn derived(&self) -> usize {
        self.derived
    }

    /// Cells per row, primary plus derived.
    pub fn stride(&self) -> usize {
        self.layout.stride
    }

    /// Ring capacity in rows.
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    /// Retained logical ids, oldest first.
    pub fn ids(&self) -> core::ops::Range<u64> {
        self.head_id..self.tail_id
    }

    pub fn head_id(&self) -> u64 {
        self.head_id
    }

    pub fn tail_id(&self) -> u64 {
        self.tail_id
    }

    /// Retained row count.
    pub fn rows_retained(&self) -> usize {
        (self.tail_id - self.head_id) as usize
    }

    /// Rows that can still be inserted before the ring overwrites.
    pub fn space_left(&self) -> usize {
        self.length - self.rows_retained()
    }

    /// Chunk holding the ring tail.
    pub fn tail_chunk(&self) -> usize {
        self.layout.chunk_of(self.tail)
    }

    pub fn sub_resume(&self) -> u64 {
        self.sub_resume
    }

    /// Move the derived-refresh cursor forward (clamped to retained ids).
    pub fn set_sub_resume(&mut self, id: u64) {
        self.sub_resume = id.clamp(self.head_id, self.tail_id);
    }

    // ------------------------------------------------------------------
    // Accounting
    // ------------------------------------------------------------------

    /// Bytes currently held by this dataset's chunks.
    pub fn memory_usage(&self) -> u64 {
        self.backing.memory_usage(core::mem::size_of::<T>())
    }

    /// Bytes the chunk table would occupy fully materialized.
    pub fn memory_uncompressed(&self) -> u64 {
        self.backing
            .memory_uncompressed(self.layout.cells_per_chunk(), core::mem::size_of::<T>())
    }
}
