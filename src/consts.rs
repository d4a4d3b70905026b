//! BIFF8 record identifiers and stream limits shared across the crate.

/// BIFF record identifiers consumed and produced by the drawing subsystem.
pub mod record_id {
    /// MsoDrawingGroup: workbook-global drawing group stream root.
    pub const MSO_DRAWING_GROUP: u16 = 0x00EB;
    /// MsoDrawing: per-sheet drawing stream root, also reopened after each
    /// interleaved object record.
    pub const MSO_DRAWING: u16 = 0x00EC;
    /// Continue: overflow slice of the preceding record.
    pub const CONTINUE: u16 = 0x003C;
    /// Obj: client data for one drawing object.
    pub const OBJ: u16 = 0x005D;
    /// TxO: text attached to a drawing object.
    pub const TXO: u16 = 0x01B6;
}

/// Maximum data payload of one physical BIFF record.
pub const MAX_RECORD_DATA: usize = 8224;

/// BIFF8 sheet grid extents (exclusive upper bounds for anchors).
pub const MAX_ROWS: u32 = 65536;
pub const MAX_COLS: u32 = 256;
