//! Client-side object data: the Obj record and everything inside it.
//!
//! Each drawing shape on a worksheet carries an Obj record holding a list of
//! subrecords: the Cmo identity subrecord first, then kind-specific state
//! (control values, linked cells, macros), then a terminator.
//!
//! # Architecture
//!
//! - `subrecord`: the subrecord list model and the Obj payload codec
//! - `data`: typed views over fixed-layout subrecord payloads
//! - `formula`: object-held formula spans and the reference-rewrite seam
//! - `text`: the TxO record attached to objects that show text
pub mod data;
pub mod formula;
pub mod subrecord;
pub mod text;

pub use formula::{CellPos, FmlaRole, NoopRewriter, ObjFmla, RefAdjust, RefRewriter, RefStyle};
pub use subrecord::{ObjectData, Subrecord, SubrecordKind};
pub use text::TextObject;

use crate::escher::types::shape_type;
use bitflags::bitflags;

/// Object kinds stored in the Cmo subrecord's ot field.
///
/// Worksheet drawing streams contain exactly these kinds; any other value
/// fails the load as corruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ObjectKind {
    Group = 0x00,
    Line = 0x01,
    Rectangle = 0x02,
    Oval = 0x03,
    Arc = 0x04,
    Chart = 0x05,
    Text = 0x06,
    Button = 0x07,
    Picture = 0x08,
    Polygon = 0x09,
    Checkbox = 0x0B,
    OptionButton = 0x0C,
    EditBox = 0x0D,
    Label = 0x0E,
    DialogBox = 0x0F,
    Spinner = 0x10,
    ScrollBar = 0x11,
    ListBox = 0x12,
    GroupBox = 0x13,
    ComboBox = 0x14,
    Comment = 0x19,
}

impl ObjectKind {
    /// Map a Cmo ot value to a kind; `None` for values outside the set.
    pub const fn from_ot(value: u16) -> Option<Self> {
        Some(match value {
            0x00 => Self::Group,
            0x01 => Self::Line,
            0x02 => Self::Rectangle,
            0x03 => Self::Oval,
            0x04 => Self::Arc,
            0x05 => Self::Chart,
            0x06 => Self::Text,
            0x07 => Self::Button,
            0x08 => Self::Picture,
            0x09 => Self::Polygon,
            0x0B => Self::Checkbox,
            0x0C => Self::OptionButton,
            0x0D => Self::EditBox,
            0x0E => Self::Label,
            0x0F => Self::DialogBox,
            0x10 => Self::Spinner,
            0x11 => Self::ScrollBar,
            0x12 => Self::ListBox,
            0x13 => Self::GroupBox,
            0x14 => Self::ComboBox,
            0x19 => Self::Comment,
            _ => return None,
        })
    }

    /// Form controls drawn by the host (check boxes, buttons, scroll bars).
    pub const fn is_form_control(self) -> bool {
        matches!(
            self,
            Self::Button
                | Self::Checkbox
                | Self::OptionButton
                | Self::EditBox
                | Self::Label
                | Self::DialogBox
                | Self::Spinner
                | Self::ScrollBar
                | Self::ListBox
                | Self::GroupBox
                | Self::ComboBox
        )
    }

    /// Kinds that attach a TxO record for caption or body text.
    pub const fn supports_text(self) -> bool {
        matches!(
            self,
            Self::Rectangle
                | Self::Oval
                | Self::Text
                | Self::Button
                | Self::Checkbox
                | Self::OptionButton
                | Self::EditBox
                | Self::Label
                | Self::GroupBox
                | Self::Comment
        )
    }

    /// Whether this kind can hold a formula in the given role.
    pub const fn can_hold(self, role: FmlaRole) -> bool {
        match role {
            FmlaRole::Macro => !matches!(self, Self::Comment | Self::Group),
            FmlaRole::LinkedCell => matches!(
                self,
                Self::Checkbox
                    | Self::OptionButton
                    | Self::EditBox
                    | Self::Spinner
                    | Self::ScrollBar
                    | Self::ListBox
                    | Self::ComboBox
            ),
            FmlaRole::InputRange => matches!(self, Self::ListBox | Self::ComboBox),
            FmlaRole::PictureLink => matches!(self, Self::Picture),
        }
    }

    /// Host naming prefix for freshly added objects ("Check Box 3").
    pub const fn default_name_prefix(self) -> &'static str {
        match self {
            Self::Group => "Group",
            Self::Line => "Line",
            Self::Rectangle => "Rectangle",
            Self::Oval => "Oval",
            Self::Arc => "Arc",
            Self::Chart => "Chart",
            Self::Text => "Text Box",
            Self::Button => "Button",
            Self::Picture => "Picture",
            Self::Polygon => "Freeform",
            Self::Checkbox => "Check Box",
            Self::OptionButton => "Option Button",
            Self::EditBox => "Edit Box",
            Self::Label => "Label",
            Self::DialogBox => "Dialog Frame",
            Self::Spinner => "Spinner",
            Self::ScrollBar => "Scroll Bar",
            Self::ListBox => "List Box",
            Self::GroupBox => "Group Box",
            Self::ComboBox => "Drop Down",
            Self::Comment => "Comment",
        }
    }

    /// Escher shape type (MSOSPT) used when building this kind's shape
    /// container.
    pub const fn escher_shape_type(self) -> u16 {
        match self {
            Self::Group | Self::Polygon => shape_type::NOT_PRIMITIVE,
            Self::Line => shape_type::LINE,
            Self::Rectangle => shape_type::RECTANGLE,
            Self::Oval => shape_type::ELLIPSE,
            Self::Arc => shape_type::ELLIPSE,
            Self::Chart | Self::Picture => shape_type::PICTURE_FRAME,
            Self::Text | Self::Comment => shape_type::TEXT_BOX,
            _ => shape_type::HOST_CONTROL,
        }
    }
}

bitflags! {
    /// Cmo option flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CmoFlags: u16 {
        /// Object is locked when the sheet is protected
        const LOCKED = 0x0001;
        /// Object uses its default size
        const DEFAULT_SIZE = 0x0004;
        /// Object is published
        const PUBLISHED = 0x0008;
        /// Object prints with the sheet
        const PRINT = 0x0010;
        /// Object is disabled
        const DISABLED = 0x0080;
        /// Object is a UI-only element
        const UI_OBJ = 0x0100;
        /// Recalculate before drawing
        const RECALC = 0x0200;
        /// Recalculate on every load
        const RECALC_ALWAYS = 0x1000;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping_is_closed() {
        assert_eq!(ObjectKind::from_ot(0x0B), Some(ObjectKind::Checkbox));
        assert_eq!(ObjectKind::from_ot(0x19), Some(ObjectKind::Comment));
        assert_eq!(ObjectKind::from_ot(0x0A), None);
        assert_eq!(ObjectKind::from_ot(0x20), None);
    }

    #[test]
    fn test_capability_table() {
        assert!(ObjectKind::Checkbox.can_hold(FmlaRole::LinkedCell));
        assert!(ObjectKind::ComboBox.can_hold(FmlaRole::InputRange));
        assert!(ObjectKind::Button.can_hold(FmlaRole::Macro));
        assert!(!ObjectKind::Button.can_hold(FmlaRole::LinkedCell));
        assert!(!ObjectKind::Comment.can_hold(FmlaRole::Macro));
        assert!(!ObjectKind::Checkbox.can_hold(FmlaRole::PictureLink));
        assert!(ObjectKind::Picture.can_hold(FmlaRole::PictureLink));
    }

    #[test]
    fn test_shape_types() {
        assert_eq!(ObjectKind::Checkbox.escher_shape_type(), 201);
        assert_eq!(ObjectKind::Comment.escher_shape_type(), 202);
        assert_eq!(ObjectKind::Picture.escher_shape_type(), 75);
        assert_eq!(ObjectKind::Group.escher_shape_type(), 0);
    }
}
