//! Obj record subrecord framing.
//!
//! # Format
//!
//! An Obj record body is a sequence of subrecords, each framed as
//! `ft: u16, cb: u16, payload`. The first is always ftCmo carrying the
//! object type and id, the last is ftEnd with an empty payload. Control
//! state and formula links sit in between.
//!
//! Two documented unreliabilities are handled here rather than treated as
//! corruption: the cb of ftLbsData does not describe its payload, so the
//! payload is taken positionally as everything up to the terminator, and a
//! declared cb may overrun the record tail on files written by other
//! producers, in which case the payload is clamped to the bytes present.
use crate::binary::read_u16_le;
use crate::error::{DrawingError, Result};
use crate::obj::formula::{FmlaRole, ObjFmla};
use crate::obj::{CmoFlags, ObjectKind};
use log::debug;
use smallvec::SmallVec;

/// Subrecord type identifiers inside an Obj record.
///
/// The set is closed; an unknown ft value fails the load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SubrecordKind {
    /// ftEnd, closes the subrecord list.
    End = 0x0000,
    /// ftMacro, attached macro formula.
    Macro = 0x0004,
    /// ftButton.
    Button = 0x0005,
    /// ftGmo, marker on group objects.
    GroupMarker = 0x0006,
    /// ftCf, clipboard format of a picture.
    ClipboardFormat = 0x0007,
    /// ftPioGrbit, picture option flags.
    PictureFlags = 0x0008,
    /// ftPictFmla, link to embedded or pasted content.
    PictureFmla = 0x0009,
    /// ftCbls, check box and option button state.
    CheckBox = 0x000A,
    /// ftRbo, marker on option buttons.
    RadioMarker = 0x000B,
    /// ftSbs, scroll bar and spinner state.
    ScrollBar = 0x000C,
    /// ftNts, comment identity.
    Note = 0x000D,
    /// ftSbsFmla, linked cell of a scrollable control.
    ScrollBarFmla = 0x000E,
    /// ftGboData, group box state.
    GroupBox = 0x000F,
    /// ftEdoData, edit box state.
    EditBox = 0x0010,
    /// ftRboData, option button grouping chain.
    RadioData = 0x0011,
    /// ftCblsData.
    CheckBoxData = 0x0012,
    /// ftLbsData, list and combo box state with the input range.
    ListBox = 0x0013,
    /// ftCblsFmla, linked cell of a check box or option button.
    CheckBoxFmla = 0x0014,
    /// ftCmo, common object header.
    CommonObj = 0x0015,
}

impl SubrecordKind {
    pub const fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            0x0000 => Self::End,
            0x0004 => Self::Macro,
            0x0005 => Self::Button,
            0x0006 => Self::GroupMarker,
            0x0007 => Self::ClipboardFormat,
            0x0008 => Self::PictureFlags,
            0x0009 => Self::PictureFmla,
            0x000A => Self::CheckBox,
            0x000B => Self::RadioMarker,
            0x000C => Self::ScrollBar,
            0x000D => Self::Note,
            0x000E => Self::ScrollBarFmla,
            0x000F => Self::GroupBox,
            0x0010 => Self::EditBox,
            0x0011 => Self::RadioData,
            0x0012 => Self::CheckBoxData,
            0x0013 => Self::ListBox,
            0x0014 => Self::CheckBoxFmla,
            0x0015 => Self::CommonObj,
            _ => return None,
        })
    }

    /// Whether the payload starts with an ObjFmla.
    pub const fn is_formula_bearing(self) -> bool {
        matches!(
            self,
            Self::Macro
                | Self::PictureFmla
                | Self::ScrollBarFmla
                | Self::CheckBoxFmla
                | Self::ListBox
        )
    }

    /// Position of the subrecord in a well-formed Obj body. New subrecords
    /// are inserted at this rank; decoded order is kept as found.
    const fn rank(self) -> u8 {
        match self {
            Self::CommonObj => 0,
            Self::GroupMarker => 1,
            Self::ClipboardFormat => 2,
            Self::PictureFlags => 3,
            Self::CheckBox => 4,
            Self::RadioMarker => 5,
            Self::ScrollBar => 6,
            Self::Note => 7,
            Self::Button => 8,
            Self::Macro => 9,
            Self::PictureFmla => 10,
            Self::ScrollBarFmla => 11,
            Self::CheckBoxFmla => 12,
            Self::RadioData => 13,
            Self::CheckBoxData => 14,
            Self::EditBox => 15,
            Self::ListBox => 16,
            Self::GroupBox => 17,
            Self::End => 18,
        }
    }
}

/// Subrecord holding the formula for a given role on a given object kind,
/// or `None` when the kind has no slot for that role.
pub fn role_subrecord(kind: ObjectKind, role: FmlaRole) -> Option<SubrecordKind> {
    match role {
        FmlaRole::Macro => {
            if kind.can_hold(FmlaRole::Macro) {
                Some(SubrecordKind::Macro)
            } else {
                None
            }
        }
        FmlaRole::PictureLink => (kind == ObjectKind::Picture).then_some(SubrecordKind::PictureFmla),
        FmlaRole::InputRange => match kind {
            ObjectKind::ListBox | ObjectKind::ComboBox => Some(SubrecordKind::ListBox),
            _ => None,
        },
        FmlaRole::LinkedCell => match kind {
            ObjectKind::Checkbox | ObjectKind::OptionButton => Some(SubrecordKind::CheckBoxFmla),
            ObjectKind::Spinner
            | ObjectKind::ScrollBar
            | ObjectKind::ListBox
            | ObjectKind::ComboBox
            | ObjectKind::EditBox => Some(SubrecordKind::ScrollBarFmla),
            _ => None,
        },
    }
}

/// Decoded ftCmo header.
///
/// The 12 reserved bytes are not kept; they re-encode as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonObj {
    pub kind: ObjectKind,
    /// Object id, unique per sheet.
    pub id: u16,
    pub flags: CmoFlags,
}

impl CommonObj {
    pub const SIZE: usize = 18;

    pub fn new(kind: ObjectKind, id: u16) -> Self {
        Self {
            kind,
            id,
            flags: CmoFlags::LOCKED | CmoFlags::PRINT,
        }
    }

    fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(DrawingError::corrupt(format!(
                "common object header needs {} bytes, found {}",
                Self::SIZE,
                data.len()
            )));
        }
        let ot = read_u16_le(data, 0)?;
        let kind = ObjectKind::from_ot(ot).ok_or_else(|| {
            DrawingError::corrupt(format!("object type 0x{ot:04X} is not recognized"))
        })?;
        let id = read_u16_le(data, 2)?;
        let flags = CmoFlags::from_bits_retain(read_u16_le(data, 4)?);
        if data[6..Self::SIZE].iter().any(|&b| b != 0) {
            debug!("common object header for id {id} carries nonzero reserved bytes, dropping them");
        }
        Ok(Self { kind, id, flags })
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.kind as u16).to_le_bytes());
        out.extend_from_slice(&self.id.to_le_bytes());
        out.extend_from_slice(&self.flags.bits().to_le_bytes());
        out.extend_from_slice(&[0u8; 12]);
    }
}

/// One subrecord of an Obj record.
#[derive(Debug, Clone, PartialEq)]
pub enum Subrecord {
    Cmo(CommonObj),
    /// Formula-bearing subrecord: the leading ObjFmla plus whatever the
    /// payload carries after it (the list box head and drop-down tail for
    /// ftLbsData, padding for the others).
    Fmla {
        kind: SubrecordKind,
        fmla: ObjFmla,
        after: Vec<u8>,
    },
    /// Fixed-layout or unmodeled payload, kept verbatim.
    Opaque { kind: SubrecordKind, data: Vec<u8> },
}

impl Subrecord {
    pub fn kind(&self) -> SubrecordKind {
        match self {
            Self::Cmo(_) => SubrecordKind::CommonObj,
            Self::Fmla { kind, .. } => *kind,
            Self::Opaque { kind, .. } => *kind,
        }
    }

    fn payload_size(&self) -> usize {
        match self {
            Self::Cmo(_) => CommonObj::SIZE,
            Self::Fmla { fmla, after, .. } => fmla.wire_size() + after.len(),
            Self::Opaque { data, .. } => data.len(),
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.kind() as u16).to_le_bytes());
        out.extend_from_slice(&(self.payload_size() as u16).to_le_bytes());
        match self {
            Self::Cmo(cmo) => cmo.write_to(out),
            Self::Fmla { fmla, after, .. } => {
                fmla.write_to(out);
                out.extend_from_slice(after);
            }
            Self::Opaque { data, .. } => out.extend_from_slice(data),
        }
    }

    fn decode_fmla(kind: SubrecordKind, payload: &[u8]) -> Result<Self> {
        let (fmla, used) = ObjFmla::parse(payload)?;
        Ok(Self::Fmla {
            kind,
            fmla,
            after: payload[used..].to_vec(),
        })
    }
}

/// Decoded body of one Obj record.
///
/// Subrecords keep the order they were decoded in; insertion places new
/// subrecords at their canonical rank. The ftEnd terminator is implicit.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectData {
    subrecords: SmallVec<[Subrecord; 4]>,
    /// False when the source record stopped without an ftEnd.
    terminated: bool,
    /// Zero bytes trailing the terminator in the source record.
    padding: usize,
}

impl Default for ObjectData {
    fn default() -> Self {
        Self {
            subrecords: SmallVec::new(),
            terminated: true,
            padding: 0,
        }
    }
}

impl ObjectData {
    pub fn new(common: CommonObj) -> Self {
        let mut data = Self::default();
        data.subrecords.push(Subrecord::Cmo(common));
        data
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(DrawingError::corrupt("object data is empty"));
        }
        let mut decoded = Self::default();
        decoded.terminated = false;
        let mut pos = 0usize;
        while pos < data.len() {
            if data.len() - pos < 4 {
                return Err(DrawingError::corrupt(
                    "object data ends inside a subrecord header",
                ));
            }
            let ft = read_u16_le(data, pos)?;
            let cb = read_u16_le(data, pos + 2)? as usize;
            let kind = SubrecordKind::from_u16(ft).ok_or_else(|| {
                DrawingError::corrupt(format!("unknown object subrecord 0x{ft:04X}"))
            })?;
            if decoded.subrecords.is_empty() && kind != SubrecordKind::CommonObj {
                return Err(DrawingError::corrupt(
                    "object data does not start with a common object header",
                ));
            }
            pos += 4;
            match kind {
                SubrecordKind::End => {
                    if cb != 0 {
                        return Err(DrawingError::corrupt(
                            "object data terminator declares a payload",
                        ));
                    }
                    let tail = &data[pos..];
                    if tail.iter().any(|&b| b != 0) {
                        return Err(DrawingError::corrupt(
                            "object data continues past the terminator",
                        ));
                    }
                    decoded.terminated = true;
                    decoded.padding = tail.len();
                    pos = data.len();
                }
                SubrecordKind::ListBox => {
                    // cb of ftLbsData does not describe the payload; the
                    // payload runs to the terminator when one is present.
                    let limit = match data.len().checked_sub(4) {
                        Some(n) if data[n..] == [0u8; 4] && n >= pos => n,
                        _ => data.len(),
                    };
                    let span = &data[pos..limit];
                    if cb != span.len() {
                        debug!(
                            "list box subrecord declares {cb} bytes, payload spans {}",
                            span.len()
                        );
                    }
                    decoded.subrecords.push(Subrecord::decode_fmla(kind, span)?);
                    pos = limit;
                }
                _ => {
                    let remaining = data.len() - pos;
                    let take = if cb > remaining {
                        debug!(
                            "subrecord {kind:?} declares {cb} bytes with {remaining} left, clamping"
                        );
                        remaining
                    } else {
                        cb
                    };
                    let span = &data[pos..pos + take];
                    let sub = if kind == SubrecordKind::CommonObj {
                        Subrecord::Cmo(CommonObj::parse(span)?)
                    } else if kind.is_formula_bearing() {
                        Subrecord::decode_fmla(kind, span)?
                    } else {
                        Subrecord::Opaque {
                            kind,
                            data: span.to_vec(),
                        }
                    };
                    decoded.subrecords.push(sub);
                    pos += take;
                }
            }
        }
        if !decoded.terminated {
            debug!("object data for id {:?} ends without a terminator", decoded.object_id());
        }
        Ok(decoded)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.wire_size());
        for sub in &self.subrecords {
            sub.write_to(&mut out);
        }
        if self.terminated {
            out.extend_from_slice(&[0u8; 4]);
            out.resize(out.len() + self.padding, 0);
        }
        out
    }

    pub fn wire_size(&self) -> usize {
        let body: usize = self.subrecords.iter().map(|s| 4 + s.payload_size()).sum();
        if self.terminated {
            body + 4 + self.padding
        } else {
            body
        }
    }

    #[inline]
    pub fn subrecords(&self) -> &[Subrecord] {
        &self.subrecords
    }

    pub fn common(&self) -> Option<&CommonObj> {
        match self.subrecords.first() {
            Some(Subrecord::Cmo(cmo)) => Some(cmo),
            _ => None,
        }
    }

    pub fn common_mut(&mut self) -> Option<&mut CommonObj> {
        match self.subrecords.first_mut() {
            Some(Subrecord::Cmo(cmo)) => Some(cmo),
            _ => None,
        }
    }

    #[inline]
    pub fn object_kind(&self) -> Option<ObjectKind> {
        self.common().map(|c| c.kind)
    }

    #[inline]
    pub fn object_id(&self) -> Option<u16> {
        self.common().map(|c| c.id)
    }

    pub fn set_object_id(&mut self, id: u16) {
        if let Some(cmo) = self.common_mut() {
            cmo.id = id;
        }
    }

    pub fn get(&self, kind: SubrecordKind) -> Option<&Subrecord> {
        self.subrecords.iter().find(|s| s.kind() == kind)
    }

    pub fn get_mut(&mut self, kind: SubrecordKind) -> Option<&mut Subrecord> {
        self.subrecords.iter_mut().find(|s| s.kind() == kind)
    }

    #[inline]
    pub fn contains(&self, kind: SubrecordKind) -> bool {
        self.get(kind).is_some()
    }

    /// Payload bytes of an opaque subrecord.
    pub fn opaque_payload(&self, kind: SubrecordKind) -> Option<&[u8]> {
        match self.get(kind)? {
            Subrecord::Opaque { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn opaque_payload_mut(&mut self, kind: SubrecordKind) -> Option<&mut Vec<u8>> {
        match self.get_mut(kind)? {
            Subrecord::Opaque { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn fmla(&self, kind: SubrecordKind) -> Option<&ObjFmla> {
        match self.get(kind)? {
            Subrecord::Fmla { fmla, .. } => Some(fmla),
            _ => None,
        }
    }

    pub fn fmla_mut(&mut self, kind: SubrecordKind) -> Option<&mut ObjFmla> {
        match self.get_mut(kind)? {
            Subrecord::Fmla { fmla, .. } => Some(fmla),
            _ => None,
        }
    }

    /// List box head and drop-down tail, after the input range formula.
    pub fn list_tail(&self) -> Option<&[u8]> {
        match self.get(SubrecordKind::ListBox)? {
            Subrecord::Fmla { after, .. } => Some(after),
            _ => None,
        }
    }

    pub fn list_tail_mut(&mut self) -> Option<&mut Vec<u8>> {
        match self.get_mut(SubrecordKind::ListBox)? {
            Subrecord::Fmla { after, .. } => Some(after),
            _ => None,
        }
    }

    /// Replaces the subrecord of the same kind, or inserts at its
    /// canonical rank.
    pub fn insert(&mut self, sub: Subrecord) {
        let kind = sub.kind();
        if let Some(existing) = self.get_mut(kind) {
            *existing = sub;
            return;
        }
        let at = self
            .subrecords
            .iter()
            .position(|s| s.kind().rank() > kind.rank())
            .unwrap_or(self.subrecords.len());
        self.subrecords.insert(at, sub);
    }

    pub fn remove(&mut self, kind: SubrecordKind) -> Option<Subrecord> {
        let at = self.subrecords.iter().position(|s| s.kind() == kind)?;
        Some(self.subrecords.remove(at))
    }
}
