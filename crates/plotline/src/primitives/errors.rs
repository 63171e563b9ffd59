//! Error types for plotting-engine operations.
//!
//! ## Purpose
//!
//! This module defines error conditions surfaced by the engine's fallible
//! operations: dataset lifecycle, derived-column registration, figure and
//! axis wiring, and fitting.
//!
//! ## Design notes
//!
//! * **Contextual**: Errors carry the offending values (index vs. bound,
//!   requested vs. allocated).
//! * **Caller errors only**: Resource-exhaustion degradation is logged and
//!   absorbed by the affected layer, not raised through this type.
//! * **No-std**: Dynamic messages are avoided entirely; every variant is
//!   `Copy`-cheap and allocation free.
//! * **Trait implementation**: Implements `Display` and `std::error::Error`
//!   (when `std` is enabled).
//!
//! ## Key concepts
//!
//! 1. **Index validation**: Dataset, column, figure, axis, and group handles
//!    checked against configured maxima.
//! 2. **Structural conflicts**: Column-count mismatch on reallocation, busy
//!    axis roles, slave-axis binding rules.
//! 3. **Capacity**: No free operator slot, fit row too wide for the solver.
//!
//! ## Invariants
//!
//! * All variants provide sufficient context for diagnosis.
//! * Error messages are consistent in tone and formatting.
//!
//! ## Non-goals
//!
//! * This module does not perform the validation logic itself.
//! * This module does not provide recovery or fallback strategies.

// Feature-gated imports
#[cfg(feature = "std")]
use std::error::Error;

// External dependencies
use core::fmt::{Display, Formatter, Result};

// ============================================================================
// Error Type
// ============================================================================

/// Error type for plotting-engine operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotError {
    /// Dataset handle outside the configured dataset table.
    DatasetIndex {
        /// Handle provided.
        got: usize,
        /// Number of dataset slots configured.
        max: usize,
    },

    /// Dataset handle names a slot that was never allocated.
    DatasetUnallocated(usize),

    /// Column index outside the dataset's primary+derived column span.
    ColumnIndex {
        /// Column provided.
        got: usize,
        /// One past the last addressable column.
        span: usize,
    },

    /// Dataset reallocation with a different primary column count.
    ColumnCountConflict {
        /// Column count requested by the caller.
        requested: usize,
        /// Column count the dataset was allocated with.
        allocated: usize,
    },

    /// Dataset capacity must be at least one row.
    EmptyLength,

    /// Figure handle outside the configured figure table.
    FigureIndex {
        /// Handle provided.
        got: usize,
        /// Number of figure slots configured.
        max: usize,
    },

    /// Figure handle names a slot that is not in use.
    FigureUnused(usize),

    /// Axis handle outside the configured axis table.
    AxisIndex {
        /// Handle provided.
        got: usize,
        /// Number of axis slots configured.
        max: usize,
    },

    /// Group handle outside the configured group table.
    GroupIndex {
        /// Handle provided.
        got: usize,
        /// Number of group slots configured.
        max: usize,
    },

    /// A figure's X and Y axes must be distinct.
    SameAxis(usize),

    /// Two figures can only be combined over a shared X axis.
    BinaryAxes {
        /// X axis of the first operand.
        axis_1: usize,
        /// X axis of the second operand.
        axis_2: usize,
    },

    /// Axis already busy with the opposite orientation.
    AxisBusy {
        /// Axis handle.
        axis: usize,
    },

    /// An axis cannot be slaved to itself.
    SlaveSelf(usize),

    /// A slave's base must not itself be a slave.
    SlaveOfSlave {
        /// The base axis that is already a slave.
        base: usize,
    },

    /// An axis serving as a base for others cannot become a slave.
    BaseInUse(usize),

    /// The shared default axes cannot be removed.
    AxisIsDefault(usize),

    /// No free derived-column slot is available on the dataset.
    NoFreeSlot {
        /// Dataset handle.
        dataset: usize,
    },

    /// Every axis slot is claimed.
    NoFreeAxis,

    /// Every figure slot is in use.
    NoFreeFigure,

    /// Bit-range bounds must satisfy `low <= high <= 63`.
    BitRange {
        /// Lowest bit requested.
        low: u32,
        /// Highest bit requested.
        high: u32,
    },

    /// Polynomial degree exceeds what the solver row can hold.
    DegreeTooHigh {
        /// Degree requested.
        got: usize,
        /// Largest supported degree.
        max: usize,
    },

    /// Solver row shape exceeds the cascade's fixed width.
    SolverShape {
        /// Regressor count requested.
        len_x: usize,
        /// Observation count requested.
        len_z: usize,
        /// Combined width limit.
        max: usize,
    },

    /// A fit pass found no rows inside the fitting window.
    NoSamples,

    /// Builder parameter out of range.
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Value provided.
        got: usize,
        /// Smallest accepted value.
        min: usize,
    },

    /// Builder parameter supplied more than once.
    DuplicateParameter(&'static str),
}

// ============================================================================
// Display Implementation
// ============================================================================

impl Display for PlotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::DatasetIndex { got, max } => {
                write!(f, "Invalid dataset {got} (table holds {max})")
            }
            Self::DatasetUnallocated(d) => write!(f, "Dataset {d} is not allocated"),
            Self::ColumnIndex { got, span } => {
                write!(f, "Invalid column {got} (dataset spans {span} columns)")
            }
            Self::ColumnCountConflict {
                requested,
                allocated,
            } => {
                write!(
                    f,
                    "Column count conflict: requested {requested}, dataset allocated with {allocated}"
                )
            }
            Self::EmptyLength => write!(f, "Dataset capacity must be at least one row"),
            Self::FigureIndex { got, max } => {
                write!(f, "Invalid figure {got} (table holds {max})")
            }
            Self::FigureUnused(n) => write!(f, "Figure {n} is not in use"),
            Self::AxisIndex { got, max } => {
                write!(f, "Invalid axis {got} (table holds {max})")
            }
            Self::GroupIndex { got, max } => {
                write!(f, "Invalid group {got} (table holds {max})")
            }
            Self::SameAxis(a) => write!(f, "Figure X and Y axes must differ (both {a})"),
            Self::BinaryAxes { axis_1, axis_2 } => {
                write!(f, "Figures must share the X axis (got {axis_1} and {axis_2})")
            }
            Self::AxisBusy { axis } => {
                write!(f, "Axis {axis} is busy with the opposite orientation")
            }
            Self::SlaveSelf(a) => write!(f, "Axis {a} cannot be slaved to itself"),
            Self::SlaveOfSlave { base } => {
                write!(f, "Base axis {base} is itself a slave")
            }
            Self::BaseInUse(a) => {
                write!(f, "Axis {a} is a base for other axes and cannot become a slave")
            }
            Self::AxisIsDefault(a) => write!(f, "Axis {a} is a shared default and cannot be removed"),
            Self::NoFreeSlot { dataset } => {
                write!(f, "No free derived-column slot on dataset {dataset}")
            }
            Self::NoFreeAxis => write!(f, "No free axis slot available"),
            Self::NoFreeFigure => write!(f, "No free figure slot available"),
            Self::BitRange { low, high } => {
                write!(f, "Invalid bit range {low}..={high} (bits span 0..=63)")
            }
            Self::DegreeTooHigh { got, max } => {
                write!(f, "Invalid degree: {got} (must be at most {max})")
            }
            Self::SolverShape { len_x, len_z, max } => {
                write!(
                    f,
                    "Solver row too wide: {len_x}+{len_z} columns (must be at most {max})"
                )
            }
            Self::NoSamples => write!(f, "No samples inside the fitting window"),
            Self::InvalidParameter { name, got, min } => {
                write!(f, "Invalid {name}: {got} (must be at least {min})")
            }
            Self::DuplicateParameter(name) => {
                write!(f, "Duplicate parameter: {name} was provided more than once")
            }
        }
    }
}

// ============================================================================
// Standard Error Trait
// ============================================================================

#[cfg(feature = "std")]
impl Error for PlotError {}
