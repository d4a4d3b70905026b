//! Error types for drawing-stream parsing and mutation.
//!
//! Corruption of the byte stream is fatal: the loader reports it and never
//! attempts repair. Invalid caller input is rejected before any mutation, so
//! the in-memory model stays consistent after an error.
use thiserror::Error;

use crate::obj::{FmlaRole, ObjectKind};

/// Main error type for drawing operations.
#[derive(Error, Debug)]
pub enum DrawingError {
    /// IO error from a record source or sink
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Structural corruption in the drawing byte stream
    #[error("corrupt drawing stream: {0}")]
    Corrupt(String),

    /// Caller-supplied index outside the valid range
    #[error("{what} index {index} out of range ({len} present)")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// Caller-supplied object id with no matching object on the sheet
    #[error("no object with id {id} on this sheet")]
    UnknownObjectId { id: u16 },

    /// Operation requires a subrecord the object kind cannot hold
    #[error("{kind:?} objects cannot hold a {role:?} reference")]
    CapabilityMismatch { kind: ObjectKind, role: FmlaRole },

    /// Text attached to an object kind that cannot carry any
    #[error("{kind:?} objects cannot hold text")]
    TextNotSupported { kind: ObjectKind },

    /// Anchor coordinates beyond the sheet grid
    #[error("anchor outside the sheet grid at row {row}, column {col}")]
    AnchorOutOfBounds { row: u32, col: u32 },

    /// Text longer than a text object record can describe
    #[error("text of {units} UTF-16 units exceeds the text object limit")]
    TextTooLong { units: usize },

    /// Operation addressed a sheet that has no drawing objects
    #[error("sheet has no drawing objects")]
    MissingDrawing,
}

impl DrawingError {
    /// Shorthand for a corruption error with formatted context.
    #[inline]
    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt(message.into())
    }
}

/// Result type for drawing operations.
pub type Result<T> = std::result::Result<T, DrawingError>;
