//! Escher (Office Drawing) record layer.
//!
//! Worksheet drawings and the workbook blip store are serialized as Escher
//! record streams: length-prefixed records nested by declared length, packed
//! into `MsoDrawing`/`MsoDrawingGroup` workbook records with `Continue`
//! overflow and `Obj`/`TxO` records spliced in at client data markers.
//!
//! # Architecture
//!
//! - `types`: record tags, the raw 8-byte header, shape flags
//! - `node` / `tree`: decoded records and the arena holding them
//! - `anchor`: cell-relative and group-relative placement rectangles
//! - `properties`: the Opt property table
//! - `read` / `write`: stream grammar in both directions
pub mod anchor;
pub mod node;
pub mod properties;
pub mod read;
pub mod tree;
pub mod types;
pub mod write;

pub use anchor::{AnchorAttachment, ClientAnchor, CoordRect};
pub use node::{BlipStoreEntry, DgAtom, DggAtom, EscherNode, IdCluster, NodePayload, SpAtom};
pub use properties::{PropertyEntry, ShapeProperties};
pub use read::{read_drawing_group, read_sheet_drawing, shape_containers};
pub use tree::{EscherTree, NodeId};
pub use types::{EscherRecordType, RawRecordHeader, ShapeFlags};
pub use write::{write_drawing_group, write_sheet_drawing};
