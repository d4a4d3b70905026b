//! Object-held formulas and the reference-rewrite seam.
//!
//! Objects store parsed formula token streams (rgce) for macros, linked
//! cells, input ranges, and picture links. Token semantics belong to the
//! workbook's formula engine; this crate treats the bytes as opaque and asks
//! a [`RefRewriter`] whenever references need adjusting, rendering, or
//! parsing.
//!
//! # Format
//!
//! An ObjFmla is `cbFmla: u16` (byte count of everything after the field,
//! kept even with a padding byte) followed, when nonzero, by `cce: u16`,
//! four unused bytes, `cce` token bytes, and for picture links an embed-info
//! tail that this crate preserves verbatim.
use crate::binary::read_u16_le;
use crate::edit::RangeEdit;
use crate::error::{DrawingError, Result};

/// The roles a formula can play inside an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FmlaRole {
    /// Macro run when the object is clicked.
    Macro,
    /// Cell receiving the control's value.
    LinkedCell,
    /// Range feeding a list or combo box.
    InputRange,
    /// Source range of a picture link.
    PictureLink,
}

/// One parsed-formula span held by an object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjFmla {
    /// Formula token bytes, opaque to this crate.
    pub rgce: Vec<u8>,
    /// Embed-info bytes after the tokens (picture links), preserved
    /// verbatim, wire padding included.
    pub tail: Vec<u8>,
}

impl ObjFmla {
    pub fn new(rgce: Vec<u8>) -> Self {
        Self {
            rgce,
            tail: Vec::new(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rgce.is_empty() && self.tail.is_empty()
    }

    /// Parse from the front of `data`, returning the span and the bytes
    /// consumed.
    pub fn parse(data: &[u8]) -> Result<(Self, usize)> {
        let cb_fmla = read_u16_le(data, 0)? as usize;
        if cb_fmla == 0 {
            return Ok((Self::default(), 2));
        }
        let end = 2 + cb_fmla;
        if end > data.len() {
            return Err(DrawingError::corrupt(format!(
                "object formula declares {cb_fmla} bytes but {} remain",
                data.len().saturating_sub(2)
            )));
        }
        if cb_fmla < 6 {
            return Err(DrawingError::corrupt(format!(
                "object formula length {cb_fmla} below the fixed header"
            )));
        }
        let cce = read_u16_le(data, 2)? as usize;
        if 6 + cce > cb_fmla {
            return Err(DrawingError::corrupt(format!(
                "object formula tokens ({cce} bytes) overrun the declared {cb_fmla}"
            )));
        }
        let rgce = data[8..8 + cce].to_vec();
        let tail = data[8 + cce..end].to_vec();
        Ok((Self { rgce, tail }, end))
    }

    /// Encoded size, the leading length field included.
    pub fn wire_size(&self) -> usize {
        if self.is_empty() {
            2
        } else {
            let body = 6 + self.rgce.len() + self.tail.len();
            2 + body + (body & 1)
        }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        if self.is_empty() {
            out.extend_from_slice(&0u16.to_le_bytes());
            return;
        }
        let body = 6 + self.rgce.len() + self.tail.len();
        let padded = body + (body & 1);
        out.extend_from_slice(&(padded as u16).to_le_bytes());
        out.extend_from_slice(&(self.rgce.len() as u16).to_le_bytes());
        out.extend_from_slice(&[0, 0, 0, 0]);
        out.extend_from_slice(&self.rgce);
        out.extend_from_slice(&self.tail);
        if body & 1 == 1 {
            out.push(0);
        }
    }
}

/// A 0-based cell position, the origin for relative references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellPos {
    pub row: u32,
    pub col: u32,
}

/// Reference rendering style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefStyle {
    A1,
    R1C1,
}

/// What a reference adjustment did to a token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefAdjust {
    /// References were outside the edited region.
    Unchanged,
    /// References moved with the edit.
    Shifted,
    /// References pointed into a deleted range; the caller should clear
    /// the formula.
    Deleted,
}

/// Black-box formula operations supplied by the workbook's formula engine.
///
/// The drawing layer never inspects token bytes itself. Structural edits
/// pass every held formula through `adjust_for_edit`; the facade's get and
/// set text forms go through `render` and `parse`.
pub trait RefRewriter {
    /// Rewrite cell references in `rgce` for a structural edit.
    fn adjust_for_edit(&self, rgce: &mut Vec<u8>, edit: &RangeEdit) -> Result<RefAdjust>;

    /// Whether the token stream references another workbook.
    fn is_external(&self, rgce: &[u8]) -> bool;

    /// Render tokens as formula text.
    fn render(&self, rgce: &[u8], origin: CellPos, style: RefStyle) -> Result<String>;

    /// Parse formula text into tokens.
    fn parse(&self, text: &str, origin: CellPos) -> Result<Vec<u8>>;
}

/// [`RefRewriter`] for hosts without a formula engine: references are kept
/// frozen through edits and text conversion is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRewriter;

impl RefRewriter for NoopRewriter {
    fn adjust_for_edit(&self, _rgce: &mut Vec<u8>, _edit: &RangeEdit) -> Result<RefAdjust> {
        Ok(RefAdjust::Unchanged)
    }

    fn is_external(&self, _rgce: &[u8]) -> bool {
        false
    }

    fn render(&self, _rgce: &[u8], _origin: CellPos, _style: RefStyle) -> Result<String> {
        Err(DrawingError::corrupt(
            "no formula engine attached to render references",
        ))
    }

    fn parse(&self, _text: &str, _origin: CellPos) -> Result<Vec<u8>> {
        Err(DrawingError::corrupt(
            "no formula engine attached to parse references",
        ))
    }
}
