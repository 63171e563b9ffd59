//! Chunk backing: raw slabs or compressed blobs with a decompression cache.
//!
//! ## Purpose
//!
//! This module owns the memory behind a dataset's chunks. In raw mode every
//! chunk is a materialized cell slab. In packed mode chunks live as
//! compressed blobs and at most a handful are materialized at a time in a
//! small cache of reusable slabs.
//!
//! ## Design notes
//!
//! * **Victim choice**: a fetch that misses takes the first vacant slot,
//!   else advances a round-robin cursor, skipping the slot that holds the
//!   chunk containing the ring tail (the chunk still receiving writes).
//! * **Dirty write-back**: a slab mutated since decompression is
//!   recompressed into its blob before the slot is reused. A blob that
//!   fails to decode is reported and the slab zero-filled; the ring
//!   protocol never reads cells that were not written.
//! * **Graceful allocation**: slab allocation uses `try_reserve_exact`;
//!   failure is logged and the chunk stays absent, which readers treat as
//!   end of data.
//!
//! ## Invariants
//!
//! * At most one materialized copy of a chunk exists across cache slots.
//! * A vacant slot never reports a chunk index.
//! * Blobs hold exactly one chunk's cells, compressed bit-exactly.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, vec::Vec};

// External dependencies
use log::error;

// Internal dependencies
use crate::primitives::codec;
use crate::primitives::value::Real;

/// Allocate a zeroed cell slab, reporting failure instead of aborting.
pub(crate) fn alloc_cells<T: Real>(cells: usize) -> Option<Box<[T]>> {
    let mut v: Vec<T> = Vec::new();
    if v.try_reserve_exact(cells).is_err() {
        error!("chunk slab allocation of {} cells failed", cells);
        return None;
    }
    v.resize(cells, T::default());
    Some(v.into_boxed_slice())
}

// ============================================================================
// Decompression Cache Slot
// ============================================================================

/// One reusable slab of the decompression cache.
#[derive(Debug)]
pub(crate) struct CacheSlot<T> {
    /// Chunk currently materialized here; `None` while vacant.
    pub chunk: Option<usize>,
    /// Slab mutated since it was loaded.
    pub dirty: bool,
    /// Cell slab; allocated lazily on first use.
    pub slab: Box<[T]>,
}

impl<T> CacheSlot<T> {
    fn vacant() -> Self {
        Self {
            chunk: None,
            dirty: false,
            slab: Box::default(),
        }
    }
}

// ============================================================================
// Chunk Backing
// ============================================================================

/// Memory behind one dataset's chunks.
#[derive(Debug)]
pub(crate) enum ChunkBacking<T> {
    /// Every chunk materialized.
    Raw {
        /// Chunk index → cell slab; `None` when absent (allocation failed
        /// or never allocated).
        slabs: Vec<Option<Box<[T]>>>,
    },
    /// Chunks compressed, with a bounded materialization cache.
    Packed {
        /// Chunk index → compressed blob; `None` when never written back.
        blobs: Vec<Option<Box<[u8]>>>,
        /// Materialization slots.
        cache: Vec<CacheSlot<T>>,
        /// Round-robin eviction cursor.
        victim: usize,
        /// Reusable compression output.
        scratch: Vec<u8>,
    },
}

impl<T: Real> ChunkBacking<T> {
    pub fn new(compress: bool, cache_slots: usize) -> Self {
        if compress {
            let mut cache = Vec::with_capacity(cache_slots);
            cache.resize_with(cache_slots.max(1), CacheSlot::vacant);
            Self::Packed {
                blobs: Vec::new(),
                cache,
                victim: 0,
                scratch: Vec::new(),
            }
        } else {
            Self::Raw { slabs: Vec::new() }
        }
    }

    /// Resize the chunk table to `chunks` entries of `cells` cells each.
    ///
    /// Raw mode materializes missing slabs eagerly and returns the number
    /// of leading chunks that are actually backed (allocation failure
    /// truncates). Packed mode drops state beyond the new table.
    pub fn realloc(&mut self, chunks: usize, cells: usize) -> usize {
        match self {
            Self::Raw { slabs } => {
                slabs.truncate(chunks);
                slabs.resize_with(chunks, || None);
                for (k, slab) in slabs.iter_mut().enumerate() {
                    if slab.is_none() {
                        match alloc_cells(cells) {
                            Some(s) => *slab = Some(s),
                            None => return k,
                        }
                    }
                }
                chunks
            }
            Self::Packed { blobs, cache, .. } => {
                blobs.truncate(chunks);
                blobs.resize_with(chunks, || None);
                for slot in cache.iter_mut() {
                    if slot.chunk.is_some_and(|k| k >= chunks) {
                        slot.chunk = None;
                        slot.dirty = false;
                    }
                }
                chunks
            }
        }
    }

    /// Release all chunk memory.
    pub fn release(&mut self) {
        match self {
            Self::Raw { slabs } => slabs.clear(),
            Self::Packed {
                blobs,
                cache,
                victim,
                scratch,
            } => {
                blobs.clear();
                scratch.clear();
                *victim = 0;
                for slot in cache.iter_mut() {
                    slot.chunk = None;
                    slot.dirty = false;
                    slot.slab = Box::default();
                }
            }
        }
    }

    /// Cache slot index currently holding `k`, if any.
    fn cached_slot(cache: &[CacheSlot<T>], k: usize) -> Option<usize> {
        cache.iter().position(|s| s.chunk == Some(k))
    }

    /// Materialize chunk `k` (`cells` cells, tail inside `tail_chunk`) and
    /// return its cache slot. `None` means the slab could not be allocated.
    fn fetch(
        blobs: &mut [Option<Box<[u8]>>],
        cache: &mut Vec<CacheSlot<T>>,
        victim: &mut usize,
        scratch: &mut Vec<u8>,
        k: usize,
        cells: usize,
        tail_chunk: usize,
    ) -> Option<usize> {
        if let Some(i) = Self::cached_slot(cache, k) {
            return Some(i);
        }

        let i = match cache.iter().position(|s| s.chunk.is_none()) {
            Some(i) => i,
            None => {
                let mut n = (*victim + 1) % cache.len();
                if cache[n].chunk == Some(tail_chunk) {
                    n = (n + 1) % cache.len();
                }
                *victim = n;
                n
            }
        };

        // Write back the evicted occupant before reusing the slab.
        if let Some(old) = cache[i].chunk {
            if cache[i].dirty {
                codec::compress_into(&cache[i].slab, scratch);
                blobs[old] = Some(scratch.as_slice().into());
            }
        }

        if cache[i].slab.len() != cells {
            match alloc_cells(cells) {
                Some(s) => cache[i].slab = s,
                None => {
                    cache[i].chunk = None;
                    cache[i].dirty = false;
                    return None;
                }
            }
        }

        match &blobs[k] {
            Some(blob) => {
                let mut out: Vec<T> = core::mem::take(&mut cache[i].slab).into_vec();
                if let Err(why) = codec::decompress_into(blob, cells, &mut out) {
                    error!("chunk {} blob rejected: {}", k, why);
                    out.clear();
                    out.resize(cells, T::default());
                }
                out.resize(cells, T::default());
                cache[i].slab = out.into_boxed_slice();
            }
            None => cache[i].slab.iter_mut().for_each(|c| *c = T::default()),
        }

        cache[i].chunk = Some(k);
        cache[i].dirty = false;
        Some(i)
    }

    /// Borrow chunk `k` for reading.
    pub fn chunk(&mut self, k: usize, cells: usize, tail_chunk: usize) -> Option<&[T]> {
        match self {
            Self::Raw { slabs } => slabs.get(k)?.as_deref(),
            Self::Packed {
                blobs,
                cache,
                victim,
                scratch,
            } => {
                if k >= blobs.len() {
                    return None;
                }
                let i = Self::fetch(blobs, cache, victim, scratch, k, cells, tail_chunk)?;
                Some(&cache[i].slab)
            }
        }
    }

    /// Borrow chunk `k` for writing, marking it dirty in packed mode.
    pub fn chunk_mut(&mut self, k: usize, cells: usize, tail_chunk: usize) -> Option<&mut [T]> {
        match self {
            Self::Raw { slabs } => slabs.get_mut(k)?.as_deref_mut(),
            Self::Packed {
                blobs,
                cache,
                victim,
                scratch,
            } => {
                if k >= blobs.len() {
                    return None;
                }
                let i = Self::fetch(blobs, cache, victim, scratch, k, cells, tail_chunk)?;
                cache[i].dirty = true;
                Some(&mut cache[i].slab)
            }
        }
    }

    /// Bytes held by materialized slabs and compressed blobs.
    pub fn memory_usage(&self, cell_bytes: usize) -> u64 {
        match self {
            Self::Raw { slabs } => slabs
                .iter()
                .flatten()
                .map(|s| (s.len() * cell_bytes) as u64)
                .sum(),
            Self::Packed { blobs, cache, .. } => {
                let blobs: u64 = blobs.iter().flatten().map(|b| b.len() as u64).sum();
                let slabs: u64 = cache
                    .iter()
                    .filter(|s| s.chunk.is_some())
                    .map(|s| (s.slab.len() * cell_bytes) as u64)
                    .sum();
                blobs + slabs
            }
        }
    }

    /// Bytes the chunk table would occupy fully materialized.
    pub fn memory_uncompressed(&self, cells: usize, cell_bytes: usize) -> u64 {
        let populated = match self {
            Self::Raw { slabs } => slabs.iter().filter(|s| s.is_some()).count(),
            Self::Packed { blobs, cache, .. } => {
                let cached_only = cache
                    .iter()
                    .filter(|s| s.chunk.is_some_and(|k| blobs.get(k).map_or(true, |b| b.is_none())))
                    .count();
                blobs.iter().filter(|b| b.is_some()).count() + cached_only
            }
        };
        (populated * cells * cell_bytes) as u64
    }
}
