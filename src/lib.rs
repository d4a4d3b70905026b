//! Longan - worksheet drawing objects for the Excel 97-2003 binary format
//!
//! This library models the drawing layer of BIFF8 workbooks: the Office
//! drawing (Escher) record trees, the `Obj` and `Txo` records riding with
//! them, and every mutation a workbook performs on sheet objects.
//!
//! # Features
//!
//! - **Record codec**: Parse and write the workbook- and sheet-level
//!   drawing streams, continuation slicing included, with unknown records
//!   preserved byte for byte
//! - **Object facade**: Add, query, and mutate form controls, pictures,
//!   comments, and plain shapes by their z-order position
//! - **Form control state**: Typed views over check box, radio, list,
//!   combo, and scroll subrecords
//! - **Grid edits**: Row and column insert, delete, move, and copy-insert
//!   carried through anchors and object-held references
//! - **Picture store**: Content-addressed blip store with reference
//!   counting shared across sheets
//!
//! # Example - Building a sheet drawing
//!
//! ```
//! use longan::{ClientAnchor, DrawingGroup, ObjectKind, SheetDrawing, VecSink};
//!
//! # fn main() -> longan::Result<()> {
//! let mut group = DrawingGroup::new();
//! let mut sheet = SheetDrawing::create(&mut group);
//! let checkbox = sheet.add_object(
//!     &mut group,
//!     ObjectKind::Checkbox,
//!     ClientAnchor::over_cells(1, 1, 3, 2),
//! )?;
//! sheet.set_text(checkbox, "Approve")?;
//!
//! let mut sink = VecSink::new();
//! sheet.save(&mut sink)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Anchors follow grid edits
//!
//! ```
//! use longan::edit::{Axis, SheetRange};
//! use longan::obj::formula::NoopRewriter;
//! use longan::{ClientAnchor, DrawingGroup, ObjectKind, SheetDrawing};
//!
//! # fn main() -> longan::Result<()> {
//! let mut group = DrawingGroup::new();
//! let mut sheet = SheetDrawing::create(&mut group);
//! let button = sheet.add_object(
//!     &mut group,
//!     ObjectKind::Button,
//!     ClientAnchor::over_cells(10, 1, 12, 3),
//! )?;
//!
//! // two rows open up above the button; its anchor follows the cells
//! sheet.insert_range(&mut group, SheetRange::rows(5, 5), Axis::Rows, 2, &NoopRewriter)?;
//! assert_eq!(sheet.anchor(button)?.row1, 12);
//! # Ok(())
//! # }
//! ```

/// Little-endian primitive readers and writers shared by every codec.
pub mod binary;

/// Record ids, grid limits, and other format constants.
pub mod consts;

/// Sheet drawings, the workbook drawing group, and the picture store.
pub mod drawing;

/// Grid edit descriptions and their effect on anchors.
pub mod edit;

/// Error type shared across the crate.
pub mod error;

/// Office drawing (Escher) record trees: nodes, anchors, properties, and
/// the stream codec.
pub mod escher;

/// `Obj` and `Txo` record bodies: subrecords, control state, formulas,
/// and text.
pub mod obj;

/// Physical record transport at the workbook stream boundary.
pub mod stream;

// Re-export the types most callers touch
pub use drawing::{
    BlipKind, DrawingGroup, ObjectIndex, PixelRect, RadioSelection, SheetDrawing, SheetMetrics,
};
pub use error::{DrawingError, Result};
pub use escher::anchor::{AnchorAttachment, ClientAnchor};
pub use obj::{FmlaRole, ObjectKind};
pub use stream::{RecordSink, RecordSource, SliceSource, VecSink};
