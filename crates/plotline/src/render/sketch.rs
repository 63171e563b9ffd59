//! Sketch pool: recorded visible primitives, double buffered.
//!
//! ## Purpose
//!
//! Trial drawing records the visible primitives of each figure into a
//! chain of fixed-capacity nodes holding data-space points. Two chains
//! alternate: `todraw` replays every frame while `current` accumulates
//! the next recording, and a completed recording swaps in atomically.
//! Replaying data-space points through the live axis mappings keeps
//! zoom and shift gestures responsive between recordings.
//!
//! ## Design notes
//!
//! * Nodes come from a fixed pool and link into chains by index; a
//!   figure's nodes splice after its first node so replay keeps each
//!   figure's primitives together.
//! * A node records one primitive kind at one stroke width; changing
//!   either starts a fresh node.
//!
//! ## Edge cases
//!
//! * Pool exhaustion logs once and drops further primitives for the
//!   rest of the recording; the swap still happens so the display
//!   shows the partial picture.
//! * Node capacity is checked against the incoming point count, so a
//!   pair never splits across two nodes.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

// External dependencies
use log::error;

// Internal dependencies
use crate::model::figure::Drawing;

/// Points a node can hold before a successor is chained.
pub const SKETCH_POINTS: usize = 256;

// ============================================================================
// Nodes
// ============================================================================

/// One chained run of recorded points for a figure.
#[derive(Debug)]
pub struct SketchNode {
    pub(crate) figure: usize,
    pub(crate) drawing: Drawing,
    pub(crate) width: i32,
    pub(crate) points: Vec<(f64, f64)>,
    next: Option<usize>,
}

impl SketchNode {
    fn vacant() -> Self {
        Self {
            figure: 0,
            drawing: Drawing::Line,
            width: 1,
            points: Vec::new(),
            next: None,
        }
    }

    /// Figure the node belongs to.
    #[inline]
    pub fn figure(&self) -> usize {
        self.figure
    }

    /// Primitive kind recorded in this node.
    #[inline]
    pub fn drawing(&self) -> Drawing {
        self.drawing
    }

    /// Stroke width recorded with the primitives.
    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Recorded data-space points; pairs for segments, singles for dots.
    #[inline]
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }
}

// ============================================================================
// Pool
// ============================================================================

/// Fixed node pool with recording and replay chains.
#[derive(Debug)]
pub struct SketchPool {
    nodes: Vec<SketchNode>,
    free: Option<usize>,
    current: Option<usize>,
    current_end: Option<usize>,
    todraw: Option<usize>,
    /// Recording node per figure slot.
    active: Vec<Option<usize>>,
    starved: bool,
}

impl SketchPool {
    /// Pool of `count` nodes serving `figures` figure slots.
    pub fn new(count: usize, figures: usize) -> Self {
        let mut nodes = Vec::with_capacity(count);
        nodes.resize_with(count, SketchNode::vacant);
        for (i, node) in nodes.iter_mut().enumerate() {
            node.next = if i + 1 < count { Some(i + 1) } else { None };
        }
        let mut active = Vec::with_capacity(figures);
        active.resize(figures, None);
        Self {
            nodes,
            free: if count > 0 { Some(0) } else { None },
            current: None,
            current_end: None,
            todraw: None,
            active,
            starved: false,
        }
    }

    fn take_free(&mut self) -> Option<usize> {
        let n = self.free?;
        self.free = self.nodes[n].next;
        Some(n)
    }

    fn free_chain(&mut self, head: Option<usize>) {
        let mut n = head;
        while let Some(i) = n {
            n = self.nodes[i].next;
            self.nodes[i].next = self.free;
            self.free = Some(i);
        }
    }

    /// Ensure the figure's recording node can take `need` more points.
    ///
    /// Returns `false` when the pool is exhausted; recording stops for
    /// the rest of this pass.
    fn set_up(&mut self, f: usize, drawing: Drawing, width: i32, need: usize) -> bool {
        if let Some(n) = self.active[f] {
            let node = &self.nodes[n];
            if node.drawing == drawing
                && node.width == width
                && node.points.len() + need <= SKETCH_POINTS
            {
                return true;
            }
        }

        let n = match self.take_free() {
            Some(n) => n,
            None => {
                if !self.starved {
                    error!("sketch pool exhausted, dropping primitives for this pass");
                    self.starved = true;
                }
                return false;
            }
        };

        self.nodes[n].figure = f;
        self.nodes[n].drawing = drawing;
        self.nodes[n].width = width;
        self.nodes[n].points.clear();

        match self.active[f] {
            Some(prev) => {
                self.nodes[n].next = self.nodes[prev].next;
                self.nodes[prev].next = Some(n);
                if self.current_end == Some(prev) {
                    self.current_end = Some(n);
                }
            }
            None => {
                self.nodes[n].next = None;
                match self.current_end {
                    Some(end) => self.nodes[end].next = Some(n),
                    None => self.current = Some(n),
                }
                self.current_end = Some(n);
            }
        }
        self.active[f] = Some(n);
        true
    }

    /// Record one visible segment in data space.
    pub fn add_pair(
        &mut self,
        f: usize,
        drawing: Drawing,
        width: i32,
        a: (f64, f64),
        b: (f64, f64),
    ) {
        if self.set_up(f, drawing, width, 2) {
            if let Some(n) = self.active[f] {
                self.nodes[n].points.push(a);
                self.nodes[n].points.push(b);
            }
        }
    }

    /// Record one visible dot in data space.
    pub fn add_point(&mut self, f: usize, drawing: Drawing, width: i32, p: (f64, f64)) {
        if self.set_up(f, drawing, width, 1) {
            if let Some(n) = self.active[f] {
                self.nodes[n].points.push(p);
            }
        }
    }

    /// Swap: the finished recording becomes the replay chain.
    pub fn garbage(&mut self) {
        let old = self.todraw;
        self.free_chain(old);
        self.todraw = self.current;
        self.current = None;
        self.current_end = None;
        self.active.fill(None);
        self.starved = false;
    }

    /// Drop both chains; the display goes blank until the next swap.
    pub fn clean(&mut self) {
        let todraw = self.todraw;
        let current = self.current;
        self.free_chain(todraw);
        self.free_chain(current);
        self.todraw = None;
        self.current = None;
        self.current_end = None;
        self.active.fill(None);
        self.starved = false;
    }

    /// Walk the replay chain in recording order.
    pub fn replay(&self) -> SketchIter<'_> {
        SketchIter {
            pool: self,
            next: self.todraw,
        }
    }

    /// Nodes left in the free list.
    pub fn free_nodes(&self) -> usize {
        let mut count = 0;
        let mut n = self.free;
        while let Some(i) = n {
            count += 1;
            n = self.nodes[i].next;
        }
        count
    }
}

/// Iterator over the replay chain.
#[derive(Debug)]
pub struct SketchIter<'a> {
    pool: &'a SketchPool,
    next: Option<usize>,
}

impl<'a> Iterator for SketchIter<'a> {
    type Item = &'a SketchNode;

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.next?;
        self.next = self.pool.nodes[i].next;
        Some(&self.pool.nodes[i])
    }
}
