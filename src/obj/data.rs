//! Typed views over fixed-layout subrecord payloads.
//!
//! Control state inside an Obj record lives in fixed little-endian layouts.
//! Each layout gets a zerocopy struct; accessors view the stored payload in
//! place instead of poking bytes at magic offsets. Bytes outside the named
//! fields round-trip untouched.
use crate::error::{DrawingError, Result};
use zerocopy::{FromBytes, IntoBytes, LE, U16};
use zerocopy_derive::*;

fn view_error(what: &'static str, need: usize, have: usize) -> DrawingError {
    DrawingError::corrupt(format!("{what} subrecord needs {need} bytes, found {have}"))
}

macro_rules! subrecord_view {
    ($type:ty, $what:literal) => {
        impl $type {
            pub const SIZE: usize = size_of::<$type>();

            pub fn view(data: &[u8]) -> Result<&Self> {
                let span = data
                    .get(..Self::SIZE)
                    .ok_or_else(|| view_error($what, Self::SIZE, data.len()))?;
                <$type>::ref_from_bytes(span)
                    .map_err(|_| view_error($what, Self::SIZE, data.len()))
            }

            pub fn view_mut(data: &mut [u8]) -> Result<&mut Self> {
                let len = data.len();
                let span = data
                    .get_mut(..Self::SIZE)
                    .ok_or_else(|| view_error($what, Self::SIZE, len))?;
                <$type>::mut_from_bytes(span).map_err(|_| view_error($what, Self::SIZE, len))
            }
        }
    };
}

/// Tri-state value of a check box or option button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u16)]
pub enum TriState {
    #[default]
    Unchecked = 0,
    Checked = 1,
    Mixed = 2,
}

impl TriState {
    pub const fn from_wire(value: u16) -> Self {
        match value {
            1 => Self::Checked,
            2 => Self::Mixed,
            _ => Self::Unchecked,
        }
    }
}

/// Selection behavior of a list box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListSelection {
    #[default]
    Single,
    Multi,
    Extend,
}

/// Scroll bar and spinner state (ftSbs payload, 20 bytes).
#[derive(Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct ScrollBarData {
    pub unused: [u8; 4],
    /// Current value.
    pub ival: U16<LE>,
    pub imin: U16<LE>,
    pub imax: U16<LE>,
    /// Step per arrow click.
    pub dinc: U16<LE>,
    /// Step per page click.
    pub dpage: U16<LE>,
    /// Nonzero for a horizontal bar.
    pub horiz: U16<LE>,
    /// Scroll thumb width in pixels.
    pub dx_scroll: U16<LE>,
    pub flags: U16<LE>,
}

subrecord_view!(ScrollBarData, "scroll bar");

impl ScrollBarData {
    /// Payload for a freshly added scroll control.
    pub fn default_payload() -> Vec<u8> {
        let data = Self {
            unused: [0; 4],
            ival: U16::new(0),
            imin: U16::new(0),
            imax: U16::new(100),
            dinc: U16::new(1),
            dpage: U16::new(10),
            horiz: U16::new(0),
            dx_scroll: U16::new(16),
            flags: U16::new(0),
        };
        data.as_bytes().to_vec()
    }
}

/// Check box and option button state (ftCbls payload, 12 bytes).
#[derive(Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct CheckBoxState {
    /// 0 unchecked, 1 checked, 2 mixed.
    pub checked: U16<LE>,
    /// Accelerator key character.
    pub accel: U16<LE>,
    pub accel2: U16<LE>,
    /// Bit 0x0001 clears the 3-D look.
    pub flags: U16<LE>,
    pub reserved: [u8; 4],
}

subrecord_view!(CheckBoxState, "check box");

impl CheckBoxState {
    pub const NO_3D: u16 = 0x0001;

    pub fn default_payload() -> Vec<u8> {
        vec![0; Self::SIZE]
    }

    #[inline]
    pub fn state(&self) -> TriState {
        TriState::from_wire(self.checked.get())
    }

    pub fn set_state(&mut self, state: TriState) {
        self.checked.set(state as u16);
    }
}

/// Option button grouping chain (ftRboData payload, 4 bytes).
#[derive(Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct RadioDataTail {
    /// Object id of the next option button in the group, 0 at the end.
    pub id_rad_next: U16<LE>,
    /// Nonzero on the first button of the group.
    pub f_first_btn: U16<LE>,
}

subrecord_view!(RadioDataTail, "option button");

impl RadioDataTail {
    pub fn default_payload() -> Vec<u8> {
        vec![0; Self::SIZE]
    }
}

/// Group box state (ftGboData payload, 6 bytes).
#[derive(Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct GroupBoxData {
    pub accel: U16<LE>,
    pub reserved: U16<LE>,
    /// Bit 0x0001 clears the 3-D look.
    pub flags: U16<LE>,
}

subrecord_view!(GroupBoxData, "group box");

impl GroupBoxData {
    pub const NO_3D: u16 = 0x0001;

    pub fn default_payload() -> Vec<u8> {
        vec![0; Self::SIZE]
    }
}

/// Edit box state (ftEdoData payload, 8 bytes).
#[derive(Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct EditBoxData {
    /// Validation style of the entered text.
    pub ivt: U16<LE>,
    pub f_multi_line: U16<LE>,
    pub f_vscroll: U16<LE>,
    pub id_edit: U16<LE>,
}

subrecord_view!(EditBoxData, "edit box");

impl EditBoxData {
    pub fn default_payload() -> Vec<u8> {
        vec![0; Self::SIZE]
    }
}

/// Comment identity (ftNts payload, 22 bytes).
#[derive(Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct NoteData {
    pub guid: [u8; 16],
    pub f_shared_note: U16<LE>,
    pub unused: [u8; 4],
}

subrecord_view!(NoteData, "comment");

impl NoteData {
    pub fn default_payload() -> Vec<u8> {
        vec![0; Self::SIZE]
    }
}

/// Fixed head of the ftLbsData after-span, ahead of the variable drop-down
/// tail (8 bytes).
#[derive(Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct ListBoxHeader {
    pub c_lines: U16<LE>,
    /// 1-based index of the selected line, 0 for none.
    pub i_sel: U16<LE>,
    pub flags: U16<LE>,
    pub id_edit: U16<LE>,
}

subrecord_view!(ListBoxHeader, "list box");

impl ListBoxHeader {
    pub const NO_3D: u16 = 0x0008;
    pub const SELECTION_MASK: u16 = 0x0030;

    #[inline]
    pub fn selection(&self) -> ListSelection {
        match self.flags.get() & Self::SELECTION_MASK {
            0x0010 => ListSelection::Multi,
            0x0020 => ListSelection::Extend,
            _ => ListSelection::Single,
        }
    }

    pub fn set_selection(&mut self, selection: ListSelection) {
        let bits = match selection {
            ListSelection::Single => 0x0000,
            ListSelection::Multi => 0x0010,
            ListSelection::Extend => 0x0020,
        };
        self.flags.set((self.flags.get() & !Self::SELECTION_MASK) | bits);
    }
}

/// Drop-down tail of a combo box's ftLbsData, after the list box head
/// (first 6 fixed bytes).
#[derive(Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct DropDownHeader {
    /// Style word; the low byte is the list control type.
    pub w_style: U16<LE>,
    /// Lines shown when dropped.
    pub c_line: U16<LE>,
    /// Minimum drop width in pixels.
    pub dx_min: U16<LE>,
}

subrecord_view!(DropDownHeader, "drop down");

/// List control types carried in the drop-down style word.
pub mod lct {
    /// Plain combo box.
    pub const REGULAR: u8 = 1;
    /// PivotTable page-field dropper.
    pub const PIVOT_PAGE: u8 = 2;
    /// AutoFilter dropper.
    pub const AUTO_FILTER: u8 = 3;
}

impl DropDownHeader {
    #[inline]
    pub fn list_control_type(&self) -> u8 {
        (self.w_style.get() & 0x00FF) as u8
    }

    pub fn set_list_control_type(&mut self, value: u8) {
        self.w_style.set((self.w_style.get() & 0xFF00) | value as u16);
    }
}
