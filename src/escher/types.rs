//! Escher record types, headers, and shape flags.
//!
//! Based on the Microsoft Office Drawing specification (MS-ODRAW) and the
//! Apache POI implementation.
use crate::error::{DrawingError, Result};
use bitflags::bitflags;
use zerocopy::{FromBytes, IntoBytes, LE, U16, U32};
use zerocopy_derive::*;

/// Escher record types understood by this crate.
///
/// The drawing streams written by Excel use exactly this set; any other type
/// tag means the stream is damaged and the load fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EscherRecordType {
    // Container records
    /// Drawing Group Container
    DggContainer = 0xF000,
    /// Blip Store Container
    BStoreContainer = 0xF001,
    /// Drawing Container
    DgContainer = 0xF002,
    /// Shape Group Container
    SpgrContainer = 0xF003,
    /// Shape Container
    SpContainer = 0xF004,
    /// Solver Container
    SolverContainer = 0xF005,

    // Atom records
    /// File Drawing Group atom
    Dgg = 0xF006,
    /// Blip Store Entry
    Bse = 0xF007,
    /// Drawing atom
    Dg = 0xF008,
    /// Shape Group atom
    Spgr = 0xF009,
    /// Shape atom
    Sp = 0xF00A,
    /// Shape Options
    Opt = 0xF00B,
    /// Client Textbox
    ClientTextbox = 0xF00D,
    /// Child Anchor
    ChildAnchor = 0xF00F,
    /// Client Anchor
    ClientAnchor = 0xF010,
    /// Client Data
    ClientData = 0xF011,
    /// Split Menu Colors
    SplitMenuColors = 0xF11E,

    // Blip records (embedded in blip store entries)
    /// EMF Blip
    BlipEmf = 0xF01A,
    /// WMF Blip
    BlipWmf = 0xF01B,
    /// PICT Blip
    BlipPict = 0xF01C,
    /// JPEG Blip
    BlipJpeg = 0xF01D,
    /// PNG Blip
    BlipPng = 0xF01E,
    /// DIB Blip
    BlipDib = 0xF01F,
    /// TIFF Blip
    BlipTiff = 0xF029,
}

impl EscherRecordType {
    /// Map a wire tag to a record type; `None` for tags outside the set.
    pub const fn from_tag(value: u16) -> Option<Self> {
        Some(match value {
            0xF000 => Self::DggContainer,
            0xF001 => Self::BStoreContainer,
            0xF002 => Self::DgContainer,
            0xF003 => Self::SpgrContainer,
            0xF004 => Self::SpContainer,
            0xF005 => Self::SolverContainer,
            0xF006 => Self::Dgg,
            0xF007 => Self::Bse,
            0xF008 => Self::Dg,
            0xF009 => Self::Spgr,
            0xF00A => Self::Sp,
            0xF00B => Self::Opt,
            0xF00D => Self::ClientTextbox,
            0xF00F => Self::ChildAnchor,
            0xF010 => Self::ClientAnchor,
            0xF011 => Self::ClientData,
            0xF01A => Self::BlipEmf,
            0xF01B => Self::BlipWmf,
            0xF01C => Self::BlipPict,
            0xF01D => Self::BlipJpeg,
            0xF01E => Self::BlipPng,
            0xF01F => Self::BlipDib,
            0xF029 => Self::BlipTiff,
            0xF11E => Self::SplitMenuColors,
            _ => return None,
        })
    }

    /// Check if this is a container record type.
    ///
    /// Container records have version field 0xF (15) and hold child records.
    #[inline]
    pub const fn is_container(self) -> bool {
        matches!(
            self,
            Self::DggContainer
                | Self::BStoreContainer
                | Self::DgContainer
                | Self::SpgrContainer
                | Self::SpContainer
                | Self::SolverContainer
        )
    }

    /// Check if this is a BLIP (image) record type.
    #[inline]
    pub const fn is_blip(self) -> bool {
        matches!(
            self,
            Self::BlipEmf
                | Self::BlipWmf
                | Self::BlipPict
                | Self::BlipJpeg
                | Self::BlipPng
                | Self::BlipDib
                | Self::BlipTiff
        )
    }
}

impl From<EscherRecordType> for u16 {
    fn from(record_type: EscherRecordType) -> Self {
        record_type as u16
    }
}

/// Escher record header (8 bytes).
///
/// # Format
///
/// - Bytes 0-1: Version (4 bits) | Instance (12 bits)
/// - Bytes 2-3: Record Type
/// - Bytes 4-7: Record Length (payload bytes only)
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct RawRecordHeader {
    pub ver_inst: U16<LE>,
    pub rec_type: U16<LE>,
    pub length: U32<LE>,
}

/// Byte size of an Escher record header.
pub const HEADER_SIZE: usize = 8;

impl RawRecordHeader {
    pub fn new(version: u8, instance: u16, rec_type: u16, length: u32) -> Self {
        let ver_inst = (version as u16 & 0x0F) | ((instance & 0x0FFF) << 4);
        Self {
            ver_inst: U16::new(ver_inst),
            rec_type: U16::new(rec_type),
            length: U32::new(length),
        }
    }

    pub fn container(rec_type: u16, length: u32) -> Self {
        Self::new(0x0F, 0, rec_type, length)
    }

    #[inline]
    pub fn version(&self) -> u8 {
        (self.ver_inst.get() & 0x0F) as u8
    }

    #[inline]
    pub fn instance(&self) -> u16 {
        (self.ver_inst.get() >> 4) & 0x0FFF
    }

    /// Parse a header from the front of a byte slice.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::read_from_bytes(data.get(0..HEADER_SIZE).ok_or_else(|| {
            DrawingError::corrupt("not enough data for an Escher record header")
        })?)
        .map_err(|_| DrawingError::corrupt("failed to read Escher record header"))
    }
}

bitflags! {
    /// Shape flags for the Sp atom (MS-ODRAW 2.2.40).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ShapeFlags: u32 {
        /// Shape is a group
        const GROUP = 0x0001;
        /// Shape is a child of a group
        const CHILD = 0x0002;
        /// Shape is the topmost group (patriarch)
        const PATRIARCH = 0x0004;
        /// Shape has been deleted
        const DELETED = 0x0008;
        /// Shape is an OLE object
        const OLE_SHAPE = 0x0010;
        /// Shape has a valid master
        const HAVE_MASTER = 0x0020;
        /// Shape is flipped horizontally
        const FLIP_H = 0x0040;
        /// Shape is flipped vertically
        const FLIP_V = 0x0080;
        /// Shape is a connector
        const CONNECTOR = 0x0100;
        /// Shape has an anchor
        const HAVE_ANCHOR = 0x0200;
        /// Shape is a background shape
        const BACKGROUND = 0x0400;
        /// Shape has a shape type property
        const HAVE_SPT = 0x0800;
    }
}

/// Shape type constants (MS-ODRAW 2.4.6 MSOSPT) used by worksheet objects.
pub mod shape_type {
    pub const NOT_PRIMITIVE: u16 = 0;
    pub const RECTANGLE: u16 = 1;
    pub const ELLIPSE: u16 = 3;
    pub const LINE: u16 = 20;
    pub const PICTURE_FRAME: u16 = 75;
    pub const HOST_CONTROL: u16 = 201;
    pub const TEXT_BOX: u16 = 202;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_packing() {
        let header = RawRecordHeader::new(0x02, 0x3FF, 0xF00A, 8);
        assert_eq!(header.version(), 0x02);
        assert_eq!(header.instance(), 0x3FF);
        assert_eq!(header.rec_type.get(), 0xF00A);
        assert_eq!(header.length.get(), 8);
    }

    #[test]
    fn test_header_parse_round_trip() {
        let header = RawRecordHeader::container(0xF004, 120);
        let parsed = RawRecordHeader::parse(header.as_bytes()).unwrap();
        assert_eq!(parsed.version(), 0x0F);
        assert_eq!(parsed.instance(), 0);
        assert_eq!(parsed.rec_type.get(), 0xF004);
        assert_eq!(parsed.length.get(), 120);
    }

    #[test]
    fn test_header_parse_truncated() {
        assert!(RawRecordHeader::parse(&[0x0F, 0x00, 0x02]).is_err());
    }

    #[test]
    fn test_record_type_closed_set() {
        assert_eq!(
            EscherRecordType::from_tag(0xF002),
            Some(EscherRecordType::DgContainer)
        );
        assert!(EscherRecordType::from_tag(0xF002).unwrap().is_container());
        assert!(!EscherRecordType::from_tag(0xF00A).unwrap().is_container());
        assert!(EscherRecordType::from_tag(0xF01E).unwrap().is_blip());
        assert_eq!(EscherRecordType::from_tag(0xABCD), None);
    }
}
