//! Anchor records: where a shape sits on the sheet or inside its group.
//!
//! # Format
//!
//! A client anchor (top-level shapes, 18 bytes) stores a flags word and two
//! cell corners, each corner a (column, x offset, row, y offset) quadruple of
//! u16 values. Offsets are fractions of the anchor cell: 1/1024 of the column
//! width, 1/256 of the row height.
//!
//! A child anchor (shapes inside a group, 16 bytes) stores a rectangle of
//! four i32 coordinates in the owning group's coordinate space.
use crate::binary::{read_i32_le, read_u16_le};
use crate::consts::{MAX_COLS, MAX_ROWS};
use crate::error::{DrawingError, Result};

/// How a shape reacts when the cells under it move or resize.
///
/// The flags word stores this as two bits: 0x0001 keeps the shape in place
/// when cells move, 0x0002 keeps its size when cells resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorAttachment {
    /// Shape moves and resizes with the cells beneath it.
    #[default]
    MoveAndSize,
    /// Shape moves with the cells but keeps its size.
    MoveDontSize,
    /// Shape ignores cell edits entirely.
    DontMoveOrSize,
}

impl AnchorAttachment {
    pub const fn from_flags(flags: u16) -> Self {
        match flags & 0x0003 {
            0x0003 => Self::DontMoveOrSize,
            0x0002 => Self::MoveDontSize,
            _ => Self::MoveAndSize,
        }
    }

    pub const fn to_flags(self) -> u16 {
        match self {
            Self::MoveAndSize => 0x0000,
            Self::MoveDontSize => 0x0002,
            Self::DontMoveOrSize => 0x0003,
        }
    }
}

/// Sheet-space anchor of a top-level shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientAnchor {
    pub flags: u16,
    pub col1: u16,
    pub dx1: u16,
    pub row1: u16,
    pub dy1: u16,
    pub col2: u16,
    pub dx2: u16,
    pub row2: u16,
    pub dy2: u16,
}

impl ClientAnchor {
    /// Payload size in bytes.
    pub const SIZE: usize = 18;

    /// Anchor covering a cell range, flush with the cell borders.
    pub fn over_cells(row1: u16, col1: u16, row2: u16, col2: u16) -> Self {
        Self {
            flags: 0,
            col1,
            dx1: 0,
            row1,
            dy1: 0,
            col2,
            dx2: 0,
            row2,
            dy2: 0,
        }
    }

    /// [`Self::over_cells`] for caller-supplied wide coordinates, rejecting
    /// corners outside the sheet grid before they can wrap.
    pub fn over_cells_checked(row1: u32, col1: u32, row2: u32, col2: u32) -> Result<Self> {
        let row = row1.max(row2);
        let col = col1.max(col2);
        if row >= MAX_ROWS || col >= MAX_COLS {
            return Err(DrawingError::AnchorOutOfBounds { row, col });
        }
        Ok(Self::over_cells(
            row1 as u16,
            col1 as u16,
            row2 as u16,
            col2 as u16,
        ))
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(DrawingError::corrupt(format!(
                "client anchor needs {} bytes, found {}",
                Self::SIZE,
                data.len()
            )));
        }
        Ok(Self {
            flags: read_u16_le(data, 0)?,
            col1: read_u16_le(data, 2)?,
            dx1: read_u16_le(data, 4)?,
            row1: read_u16_le(data, 6)?,
            dy1: read_u16_le(data, 8)?,
            col2: read_u16_le(data, 10)?,
            dx2: read_u16_le(data, 12)?,
            row2: read_u16_le(data, 14)?,
            dy2: read_u16_le(data, 16)?,
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        for value in [
            self.flags, self.col1, self.dx1, self.row1, self.dy1, self.col2, self.dx2, self.row2,
            self.dy2,
        ] {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }

    #[inline]
    pub fn attachment(&self) -> AnchorAttachment {
        AnchorAttachment::from_flags(self.flags)
    }

    pub fn set_attachment(&mut self, attachment: AnchorAttachment) {
        self.flags = (self.flags & !0x0003) | attachment.to_flags();
    }

    /// Reject anchors whose corners lie outside the sheet grid. Rows cannot
    /// overflow a u16 grid, so only the column span can fail here.
    pub fn validate(&self) -> Result<()> {
        let col = self.col1.max(self.col2) as u32;
        if col >= MAX_COLS {
            return Err(DrawingError::AnchorOutOfBounds {
                row: self.row1.max(self.row2) as u32,
                col,
            });
        }
        Ok(())
    }

    /// Translate by whole rows, clamping at the grid edges.
    pub fn shift_rows(&mut self, delta: i32) {
        self.row1 = clamp_coord(self.row1 as i32 + delta, MAX_ROWS);
        self.row2 = clamp_coord(self.row2 as i32 + delta, MAX_ROWS);
    }

    /// Translate by whole columns, clamping at the grid edges.
    pub fn shift_cols(&mut self, delta: i32) {
        self.col1 = clamp_coord(self.col1 as i32 + delta, MAX_COLS);
        self.col2 = clamp_coord(self.col2 as i32 + delta, MAX_COLS);
    }
}

#[inline]
fn clamp_coord(value: i32, limit: u32) -> u16 {
    value.clamp(0, limit as i32 - 1) as u16
}

/// Rectangle of four i32 coordinates: child anchors and group coordinate
/// systems share this layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoordRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl CoordRect {
    /// Payload size in bytes.
    pub const SIZE: usize = 16;

    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(DrawingError::corrupt(format!(
                "coordinate rectangle needs {} bytes, found {}",
                Self::SIZE,
                data.len()
            )));
        }
        Ok(Self {
            left: read_i32_le(data, 0)?,
            top: read_i32_le(data, 4)?,
            right: read_i32_le(data, 8)?,
            bottom: read_i32_le(data, 12)?,
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        for value in [self.left, self.top, self.right, self.bottom] {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }

    #[inline]
    pub const fn width(&self) -> i32 {
        self.right - self.left
    }

    #[inline]
    pub const fn height(&self) -> i32 {
        self.bottom - self.top
    }
}
