//! One sheet's drawing: the object facade over its record tree.
//!
//! # Architecture
//!
//! The tree holds a bookkeeping atom and the patriarch group container with
//! one child per top-level object; child order is the z-order. Operations
//! resolve positions through the [`ObjectIndex`], mutate the tree, and
//! rebuild the index after structural changes. Anything that allocates
//! shape ids or touches pictures borrows the workbook's [`DrawingGroup`].
//!
//! Positions at this boundary are 0-based top-level slots. Hidden entries
//! (comments, filter drop-downs) occupy slots too, keeping positions
//! aligned with the stored child order; [`SheetDrawing::visible_order`]
//! narrows to what a user actually sees.

use std::collections::HashSet;

use log::debug;
use smallvec::SmallVec;
use zerocopy::{IntoBytes, LE, U16};

use crate::drawing::group::{BlipKind, DrawingGroup};
use crate::drawing::index::{ObjectIndex, TopLevelEntry};
use crate::drawing::{
    child_anchor_rect, client_anchor, client_anchor_mut, client_data, client_data_mut,
    group_space, head_container, shape_properties, shape_properties_mut, text_object,
    text_object_mut,
};
use crate::edit::{
    transform_anchor, vacated_rects, AnchorOutcome, Axis, EditKind, RangeEdit, SheetRange,
};
use crate::error::{DrawingError, Result};
use crate::escher::anchor::{AnchorAttachment, ClientAnchor, CoordRect};
use crate::escher::node::{DgAtom, EscherNode, NodePayload, SpAtom};
use crate::escher::properties::ShapeProperties;
use crate::escher::read::{read_sheet_drawing, shape_containers};
use crate::escher::tree::{EscherTree, NodeId};
use crate::escher::types::{shape_type, EscherRecordType, ShapeFlags};
use crate::escher::write::write_sheet_drawing;
use crate::obj::data::{
    lct, CheckBoxState, DropDownHeader, EditBoxData, GroupBoxData, ListBoxHeader, ListSelection,
    NoteData, RadioDataTail, ScrollBarData, TriState,
};
use crate::obj::formula::{CellPos, ObjFmla, RefAdjust, RefRewriter, RefStyle};
use crate::obj::subrecord::{role_subrecord, CommonObj, ObjectData, Subrecord, SubrecordKind};
use crate::obj::text::TextObject;
use crate::obj::{FmlaRole, ObjectKind};
use crate::stream::{RecordSink, RecordSource};

/// Column widths and row heights supplied by the host sheet, in pixels.
///
/// Anchors store cell coordinates; resolving them to pixels needs the
/// sheet's current layout, which lives outside the drawing layer.
pub trait SheetMetrics {
    fn col_width_px(&self, col: u32) -> u32;
    fn row_height_px(&self, row: u32) -> u32;
}

/// Axis-aligned pixel rectangle in sheet space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl PixelRect {
    #[inline]
    pub const fn width(&self) -> i64 {
        self.right - self.left
    }

    #[inline]
    pub const fn height(&self) -> i64 {
        self.bottom - self.top
    }
}

/// Effect of selecting an option button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioSelection {
    /// Linked-cell tokens held by the group's first button, when any.
    pub linked_cell: Option<Vec<u8>>,
    /// 1-based slot of the selected button within its group; the value the
    /// linked cell receives.
    pub value: u32,
}

/// Drawing objects of one worksheet.
#[derive(Debug, Clone)]
pub struct SheetDrawing {
    tree: EscherTree,
    dgid: u16,
    next_obj_id: u16,
    index: ObjectIndex,
}

impl SheetDrawing {
    /// Fresh drawing for one sheet: the bookkeeping atom and the patriarch
    /// group, ready for the first object.
    pub fn create(group: &mut DrawingGroup) -> Self {
        let dgid = group.register_drawing();
        let patriarch_spid = group.allocate_shape_id(dgid);

        let mut tree = EscherTree::new();
        let root = tree.alloc(EscherNode::container(EscherRecordType::DgContainer));
        tree.set_root(root);
        let dg = tree.alloc(EscherNode::dg(
            DgAtom {
                csp: 1,
                spid_cur: patriarch_spid,
            },
            dgid,
        ));
        tree.append_child(root, dg);
        let spgr = tree.alloc(EscherNode::container(EscherRecordType::SpgrContainer));
        tree.append_child(root, spgr);

        let head = tree.alloc(EscherNode::container(EscherRecordType::SpContainer));
        tree.append_child(spgr, head);
        let rect = tree.alloc(EscherNode::spgr(CoordRect::default()));
        tree.append_child(head, rect);
        let sp = tree.alloc(EscherNode::sp(
            shape_type::NOT_PRIMITIVE,
            SpAtom {
                spid: patriarch_spid,
                flags: ShapeFlags::GROUP | ShapeFlags::PATRIARCH,
            },
        ));
        tree.append_child(head, sp);

        let mut drawing = Self {
            tree,
            dgid,
            next_obj_id: 1,
            index: ObjectIndex::new(),
        };
        drawing.rebuild_index();
        drawing
    }

    /// Rebuild a sheet's drawing from its record stream.
    pub fn load(source: &mut dyn RecordSource) -> Result<Self> {
        let tree = read_sheet_drawing(source)?;
        let root = tree.root().ok_or(DrawingError::MissingDrawing)?;
        if tree[root].record_type != EscherRecordType::DgContainer {
            return Err(DrawingError::corrupt(format!(
                "sheet drawing stream rooted in {:?}",
                tree[root].record_type
            )));
        }
        let dg = tree
            .find_child(root, EscherRecordType::Dg)
            .ok_or_else(|| DrawingError::corrupt("sheet drawing without a Dg atom"))?;
        let dgid = tree[dg].instance;
        let spgr = tree
            .find_child(root, EscherRecordType::SpgrContainer)
            .ok_or_else(|| DrawingError::corrupt("sheet drawing without a group container"))?;
        if tree.children(spgr).is_empty() {
            return Err(DrawingError::corrupt(
                "sheet drawing group container without a patriarch shape",
            ));
        }

        let mut drawing = Self {
            tree,
            dgid,
            next_obj_id: 1,
            index: ObjectIndex::new(),
        };
        drawing.rebuild_index();
        drawing.next_obj_id = drawing.index.max_object_id().saturating_add(1);
        Ok(drawing)
    }

    /// Serialize as the sheet's drawing record family.
    pub fn save(&self, sink: &mut dyn RecordSink) -> Result<()> {
        write_sheet_drawing(&self.tree, sink)
    }

    /// Drawing id this sheet holds in the workbook-level group.
    #[inline]
    pub fn drawing_id(&self) -> u16 {
        self.dgid
    }

    /// Number of top-level entries, hidden ones included.
    #[inline]
    pub fn object_count(&self) -> usize {
        self.index.top_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.top_count() == 0
    }

    /// Read access to the derived lookups.
    #[inline]
    pub fn index(&self) -> &ObjectIndex {
        &self.index
    }

    // ---- object identity -------------------------------------------------

    pub fn object_kind(&self, position: usize) -> Result<ObjectKind> {
        let head = self.head_at(position)?;
        client_data(&self.tree, head)
            .and_then(ObjectData::object_kind)
            .ok_or_else(|| DrawingError::corrupt("shape container without an object body"))
    }

    pub fn object_id(&self, position: usize) -> Result<u16> {
        let head = self.head_at(position)?;
        client_data(&self.tree, head)
            .and_then(ObjectData::object_id)
            .ok_or_else(|| DrawingError::corrupt("shape container without an object body"))
    }

    pub fn object_name(&self, position: usize) -> Result<Option<String>> {
        let head = self.head_at(position)?;
        Ok(shape_properties(&self.tree, head).and_then(|props| props.name()))
    }

    pub fn set_object_name(&mut self, position: usize, name: &str) -> Result<()> {
        let head = self.head_at(position)?;
        if let Some(props) = shape_properties_mut(&mut self.tree, head) {
            props.set_name(name);
        } else {
            let mut props = ShapeProperties::new();
            props.set_name(name);
            let opt = self.tree.alloc(EscherNode::opt(props));
            let at = self
                .tree
                .find_child(head, EscherRecordType::Sp)
                .and_then(|sp| self.tree.child_index(head, sp))
                .map_or(0, |i| i + 1);
            self.tree.insert_child(head, at, opt);
        }
        self.rebuild_index();
        Ok(())
    }

    /// Top-level position of the object holding a name, groups resolved to
    /// their outermost entry.
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.top_position_of(self.index.by_name(name)?)
    }

    pub fn find_by_object_id(&self, id: u16) -> Option<usize> {
        self.top_position_of(self.index.by_object_id(id)?)
    }

    /// Positions a user can see, back of the z-order first.
    pub fn visible_order(&self) -> Vec<usize> {
        self.index
            .top_level()
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.visible)
            .map(|(position, _)| position)
            .collect()
    }

    // ---- anchors ---------------------------------------------------------

    pub fn anchor(&self, position: usize) -> Result<&ClientAnchor> {
        let head = self.head_at(position)?;
        client_anchor(&self.tree, head)
            .ok_or_else(|| DrawingError::corrupt("shape container without a client anchor"))
    }

    pub fn set_anchor(&mut self, position: usize, anchor: ClientAnchor) -> Result<()> {
        anchor.validate()?;
        let head = self.head_at(position)?;
        if let Some(existing) = client_anchor_mut(&mut self.tree, head) {
            *existing = anchor;
            return Ok(());
        }
        let node = self.tree.alloc(EscherNode::client_anchor(anchor));
        let at = self
            .tree
            .find_child(head, EscherRecordType::ClientData)
            .and_then(|data| self.tree.child_index(head, data))
            .unwrap_or(self.tree.children(head).len());
        self.tree.insert_child(head, at, node);
        Ok(())
    }

    pub fn attachment(&self, position: usize) -> Result<AnchorAttachment> {
        Ok(self.anchor(position)?.attachment())
    }

    pub fn set_attachment(&mut self, position: usize, attachment: AnchorAttachment) -> Result<()> {
        let head = self.head_at(position)?;
        let anchor = client_anchor_mut(&mut self.tree, head)
            .ok_or_else(|| DrawingError::corrupt("shape container without a client anchor"))?;
        anchor.set_attachment(attachment);
        Ok(())
    }

    // ---- adding and removing objects -------------------------------------

    /// Add an object of the given kind over the anchored cells.
    ///
    /// The object gets the next free shape id and object id, a default
    /// name built from its kind, the subrecords that kind starts with, and
    /// for captioned kinds an attached text record. Returns the new
    /// top-level position (always the front of the z-order).
    pub fn add_object(
        &mut self,
        group: &mut DrawingGroup,
        kind: ObjectKind,
        anchor: ClientAnchor,
    ) -> Result<usize> {
        anchor.validate()?;
        let spid = group.allocate_shape_id(self.dgid);
        let id = self.take_object_id();
        let name = format!("{} {}", kind.default_name_prefix(), id);

        let spgr = self.spgr();
        let container = self
            .tree
            .alloc(EscherNode::container(EscherRecordType::SpContainer));
        self.tree.append_child(spgr, container);

        let sp = self.tree.alloc(EscherNode::sp(
            kind.escher_shape_type(),
            SpAtom {
                spid,
                flags: ShapeFlags::HAVE_ANCHOR | ShapeFlags::HAVE_SPT,
            },
        ));
        self.tree.append_child(container, sp);

        let mut props = ShapeProperties::new();
        props.set_name(&name);
        let opt = self.tree.alloc(EscherNode::opt(props));
        self.tree.append_child(container, opt);

        let anchor_node = self.tree.alloc(EscherNode::client_anchor(anchor));
        self.tree.append_child(container, anchor_node);

        let data = self
            .tree
            .alloc(EscherNode::client_data(default_object_data(kind, id)));
        self.tree.append_child(container, data);

        if let Some(caption) = default_caption(kind, &name) {
            let textbox = self
                .tree
                .alloc(EscherNode::client_textbox(TextObject::new(caption)));
            self.tree.append_child(container, textbox);
        }

        self.note_shape_added(spid);
        self.rebuild_index();
        debug!("added {kind:?} object {id} to drawing {}", self.dgid);
        Ok(self.index.top_count() - 1)
    }

    /// Add a picture object backed by the workbook blip store.
    pub fn add_picture(
        &mut self,
        group: &mut DrawingGroup,
        kind: BlipKind,
        data: &[u8],
        anchor: ClientAnchor,
    ) -> Result<usize> {
        let position = self.add_object(group, ObjectKind::Picture, anchor)?;
        let blip_id = group.add_picture(kind, data);
        let head = self.head_at(position)?;
        if let Some(props) = shape_properties_mut(&mut self.tree, head) {
            props.set_blip_id(blip_id);
        }
        Ok(position)
    }

    /// Attach a cell comment: a hidden text shape the grid renders beside
    /// its cell.
    pub fn add_comment(
        &mut self,
        group: &mut DrawingGroup,
        anchor: ClientAnchor,
        text: &str,
    ) -> Result<usize> {
        let units = text.encode_utf16().count();
        if units > u16::MAX as usize {
            return Err(DrawingError::TextTooLong { units });
        }
        let position = self.add_object(group, ObjectKind::Comment, anchor)?;
        self.set_text(position, text)?;
        Ok(position)
    }

    /// Remove the object at a top-level position, its shape ids and
    /// picture references handed back to the group.
    ///
    /// Returns `true` when the last object went with it: the drawing
    /// releases its id and the caller drops this value instead of saving
    /// an empty stream.
    pub fn delete_object(&mut self, group: &mut DrawingGroup, position: usize) -> Result<bool> {
        let entry = self.entry_at(position)?;
        self.remove_entry_subtree(group, entry.node);
        self.rebuild_index();
        Ok(self.release_if_empty(group))
    }

    // ---- z-order ---------------------------------------------------------

    /// Put the object in front of everything on the sheet.
    pub fn bring_to_front(&mut self, position: usize) -> Result<usize> {
        let entry = self.entry_at(position)?;
        if !entry.visible {
            return Ok(position);
        }
        let target = self.index.top_count() - 1;
        self.shift_entry(position, target);
        Ok(target)
    }

    pub fn send_to_back(&mut self, position: usize) -> Result<usize> {
        let entry = self.entry_at(position)?;
        if !entry.visible {
            return Ok(position);
        }
        self.shift_entry(position, 0);
        Ok(0)
    }

    /// Raise the object one visible step; hidden neighbours are stepped
    /// over, not swapped with.
    pub fn bring_forward(&mut self, position: usize) -> Result<usize> {
        let entry = self.entry_at(position)?;
        if !entry.visible {
            return Ok(position);
        }
        let next = self.index.top_level()[position + 1..]
            .iter()
            .position(|entry| entry.visible)
            .map(|offset| position + 1 + offset);
        let Some(target) = next else {
            return Ok(position);
        };
        self.shift_entry(position, target);
        Ok(target)
    }

    pub fn send_backward(&mut self, position: usize) -> Result<usize> {
        let entry = self.entry_at(position)?;
        if !entry.visible {
            return Ok(position);
        }
        let Some(target) = self.index.top_level()[..position]
            .iter()
            .rposition(|entry| entry.visible)
        else {
            return Ok(position);
        };
        self.shift_entry(position, target);
        Ok(target)
    }

    // ---- text ------------------------------------------------------------

    pub fn text(&self, position: usize) -> Result<Option<&str>> {
        let head = self.head_at(position)?;
        Ok(text_object(&self.tree, head).map(|text| text.text.as_str()))
    }

    /// Replace the object's text. Kinds that cannot carry text are
    /// rejected before anything is touched.
    pub fn set_text(&mut self, position: usize, text: &str) -> Result<()> {
        let kind = self.object_kind(position)?;
        if !kind.supports_text() {
            return Err(DrawingError::TextNotSupported { kind });
        }
        let units = text.encode_utf16().count();
        if units > u16::MAX as usize {
            return Err(DrawingError::TextTooLong { units });
        }
        let head = self.head_at(position)?;
        if let Some(existing) = text_object_mut(&mut self.tree, head) {
            existing.text = text.to_string();
            // stale runs would frame the replaced text
            existing.runs.clear();
            return Ok(());
        }
        let node = self
            .tree
            .alloc(EscherNode::client_textbox(TextObject::new(text)));
        self.tree.append_child(head, node);
        Ok(())
    }

    // ---- formulas --------------------------------------------------------

    /// Tokens the object holds for a role, `None` when the kind has no
    /// such slot or the slot is empty.
    pub fn formula(&self, position: usize, role: FmlaRole) -> Result<Option<&[u8]>> {
        let kind = self.object_kind(position)?;
        let head = self.head_at(position)?;
        let Some(slot) = role_subrecord(kind, role) else {
            return Ok(None);
        };
        let tokens = client_data(&self.tree, head)
            .and_then(|data| data.fmla(slot))
            .map(|fmla| fmla.rgce.as_slice())
            .filter(|rgce| !rgce.is_empty());
        Ok(tokens)
    }

    /// Store tokens for a role. A kind without the capability is refused
    /// outright and its subrecords stay untouched.
    pub fn set_formula(&mut self, position: usize, role: FmlaRole, rgce: Vec<u8>) -> Result<()> {
        let kind = self.object_kind(position)?;
        let head = self.head_at(position)?;
        let slot =
            role_subrecord(kind, role).ok_or(DrawingError::CapabilityMismatch { kind, role })?;
        let data = client_data_mut(&mut self.tree, head)
            .ok_or_else(|| DrawingError::corrupt("shape container without an object body"))?;
        if let Some(fmla) = data.fmla_mut(slot) {
            fmla.rgce = rgce;
            return Ok(());
        }
        let after = match slot {
            SubrecordKind::ListBox if kind == ObjectKind::ComboBox => combo_list_tail(),
            SubrecordKind::ListBox => vec![0u8; ListBoxHeader::SIZE],
            _ => Vec::new(),
        };
        data.insert(Subrecord::Fmla {
            kind: slot,
            fmla: ObjFmla::new(rgce),
            after,
        });
        Ok(())
    }

    pub fn remove_formula(&mut self, position: usize, role: FmlaRole) -> Result<()> {
        let kind = self.object_kind(position)?;
        let head = self.head_at(position)?;
        let slot =
            role_subrecord(kind, role).ok_or(DrawingError::CapabilityMismatch { kind, role })?;
        let Some(data) = client_data_mut(&mut self.tree, head) else {
            return Ok(());
        };
        if slot == SubrecordKind::ListBox {
            // the subrecord doubles as the list state block; only the
            // range link dies
            if let Some(fmla) = data.fmla_mut(slot) {
                fmla.rgce.clear();
                fmla.tail.clear();
            }
        } else {
            data.remove(slot);
        }
        Ok(())
    }

    /// Render a role's tokens as formula text through the host rewriter.
    pub fn formula_text(
        &self,
        position: usize,
        role: FmlaRole,
        style: RefStyle,
        rewriter: &dyn RefRewriter,
    ) -> Result<Option<String>> {
        let origin = self.formula_origin(position)?;
        match self.formula(position, role)? {
            Some(rgce) => Ok(Some(rewriter.render(rgce, origin, style)?)),
            None => Ok(None),
        }
    }

    pub fn set_formula_text(
        &mut self,
        position: usize,
        role: FmlaRole,
        text: &str,
        rewriter: &dyn RefRewriter,
    ) -> Result<()> {
        let origin = self.formula_origin(position)?;
        let rgce = rewriter.parse(text, origin)?;
        self.set_formula(position, role, rgce)
    }

    // ---- control state ---------------------------------------------------

    /// Tri-state value of a check box or option button; `None` for kinds
    /// without one.
    pub fn checkbox_state(&self, position: usize) -> Result<Option<TriState>> {
        let head = self.head_at(position)?;
        let state = client_data(&self.tree, head)
            .and_then(|data| data.opaque_payload(SubrecordKind::CheckBox))
            .map(CheckBoxState::view)
            .transpose()?
            .map(CheckBoxState::state);
        Ok(state)
    }

    /// Set a check box or option button's value. Other kinds are left
    /// untouched and report `false`.
    pub fn set_checkbox_state(&mut self, position: usize, state: TriState) -> Result<bool> {
        let kind = self.object_kind(position)?;
        if !matches!(kind, ObjectKind::Checkbox | ObjectKind::OptionButton) {
            return Ok(false);
        }
        let head = self.head_at(position)?;
        let data = client_data_mut(&mut self.tree, head)
            .ok_or_else(|| DrawingError::corrupt("shape container without an object body"))?;
        set_tri_state(data, state)?;
        Ok(true)
    }

    /// Select one option button, addressed by object id so grouped buttons
    /// stay reachable, clearing the rest of its radio group and rewiring
    /// the group's chain fields.
    pub fn select_radio(&mut self, object_id: u16) -> Result<RadioSelection> {
        let target = self
            .index
            .by_object_id(object_id)
            .ok_or(DrawingError::UnknownObjectId { id: object_id })?;
        let parent = self.tree[target]
            .parent
            .ok_or_else(|| DrawingError::corrupt("option button container without a parent"))?;
        let members = self.index.radio_members(parent).to_vec();
        let Some(selected) = members.iter().position(|&member| member == target) else {
            let kind = client_data(&self.tree, target)
                .and_then(ObjectData::object_kind)
                .ok_or_else(|| DrawingError::corrupt("object body lost behind its id"))?;
            return Err(DrawingError::CapabilityMismatch {
                kind,
                role: FmlaRole::LinkedCell,
            });
        };

        // successor ids close the chain with 0 on the last button
        let mut next_ids = Vec::with_capacity(members.len());
        for member in members.iter().skip(1) {
            next_ids.push(
                client_data(&self.tree, *member)
                    .and_then(ObjectData::object_id)
                    .unwrap_or(0),
            );
        }
        next_ids.push(0);

        for (i, &member) in members.iter().enumerate() {
            let data = client_data_mut(&mut self.tree, member)
                .ok_or_else(|| DrawingError::corrupt("option button without an object body"))?;
            let state = if i == selected {
                TriState::Checked
            } else {
                TriState::Unchecked
            };
            set_tri_state(data, state)?;
            if !data.contains(SubrecordKind::RadioData) {
                data.insert(Subrecord::Opaque {
                    kind: SubrecordKind::RadioData,
                    data: RadioDataTail::default_payload(),
                });
            }
            let payload = data
                .opaque_payload_mut(SubrecordKind::RadioData)
                .ok_or_else(|| DrawingError::corrupt("radio chain held in a foreign subrecord"))?;
            let tail = RadioDataTail::view_mut(payload)?;
            tail.id_rad_next.set(next_ids[i]);
            tail.f_first_btn.set((i == 0) as u16);
        }

        let linked_cell = members
            .first()
            .and_then(|&first| client_data(&self.tree, first))
            .and_then(|data| data.fmla(SubrecordKind::CheckBoxFmla))
            .map(|fmla| fmla.rgce.clone())
            .filter(|rgce| !rgce.is_empty());

        Ok(RadioSelection {
            linked_cell,
            value: selected as u32 + 1,
        })
    }

    /// Typed view of a scroll bar or spinner's state; `None` for kinds
    /// without one.
    pub fn scroll_state(&self, position: usize) -> Result<Option<&ScrollBarData>> {
        let head = self.head_at(position)?;
        client_data(&self.tree, head)
            .and_then(|data| data.opaque_payload(SubrecordKind::ScrollBar))
            .map(ScrollBarData::view)
            .transpose()
    }

    pub fn scroll_state_mut(&mut self, position: usize) -> Result<Option<&mut ScrollBarData>> {
        let head = self.head_at(position)?;
        let Some(data) = client_data_mut(&mut self.tree, head) else {
            return Ok(None);
        };
        data.opaque_payload_mut(SubrecordKind::ScrollBar)
            .map(|payload| ScrollBarData::view_mut(payload))
            .transpose()
    }

    /// Fixed head of a list or combo box's state block.
    pub fn list_header(&self, position: usize) -> Result<Option<&ListBoxHeader>> {
        let head = self.head_at(position)?;
        client_data(&self.tree, head)
            .and_then(ObjectData::list_tail)
            .map(ListBoxHeader::view)
            .transpose()
    }

    pub fn list_header_mut(&mut self, position: usize) -> Result<Option<&mut ListBoxHeader>> {
        let head = self.head_at(position)?;
        let Some(data) = client_data_mut(&mut self.tree, head) else {
            return Ok(None);
        };
        data.list_tail_mut()
            .map(|tail| ListBoxHeader::view_mut(tail))
            .transpose()
    }

    /// Drop-down descriptor of a combo box, behind the list head.
    pub fn dropdown(&self, position: usize) -> Result<Option<&DropDownHeader>> {
        let head = self.head_at(position)?;
        client_data(&self.tree, head)
            .and_then(ObjectData::list_tail)
            .and_then(|tail| tail.get(ListBoxHeader::SIZE..))
            .filter(|block| !block.is_empty())
            .map(DropDownHeader::view)
            .transpose()
    }

    pub fn dropdown_mut(&mut self, position: usize) -> Result<Option<&mut DropDownHeader>> {
        let head = self.head_at(position)?;
        let Some(data) = client_data_mut(&mut self.tree, head) else {
            return Ok(None);
        };
        data.list_tail_mut()
            .and_then(|tail| tail.get_mut(ListBoxHeader::SIZE..))
            .filter(|block| !block.is_empty())
            .map(|block| DropDownHeader::view_mut(block))
            .transpose()
    }

    /// Per-line selection bitmap of a multi-select list box, one byte per
    /// line. `None` for single-select boxes.
    pub fn multi_selection(&self, position: usize) -> Result<Option<&[u8]>> {
        let head = self.head_at(position)?;
        let Some(tail) = client_data(&self.tree, head).and_then(ObjectData::list_tail) else {
            return Ok(None);
        };
        let header = ListBoxHeader::view(tail)?;
        if header.selection() == ListSelection::Single {
            return Ok(None);
        }
        let lines = header.c_lines.get() as usize;
        if lines == 0 {
            return Ok(None);
        }
        let at = tail
            .len()
            .checked_sub(lines)
            .filter(|&at| at >= ListBoxHeader::SIZE)
            .ok_or_else(|| {
                DrawingError::corrupt("list box selection bitmap overruns its state block")
            })?;
        Ok(Some(&tail[at..]))
    }

    /// Whether the control draws flat instead of with the 3-D look;
    /// `None` for kinds without the flag.
    pub fn is_flat(&self, position: usize) -> Result<Option<bool>> {
        let kind = self.object_kind(position)?;
        let head = self.head_at(position)?;
        let Some(data) = client_data(&self.tree, head) else {
            return Ok(None);
        };
        let flat = match kind {
            ObjectKind::Checkbox | ObjectKind::OptionButton => data
                .opaque_payload(SubrecordKind::CheckBox)
                .map(CheckBoxState::view)
                .transpose()?
                .map(|state| state.flags.get() & CheckBoxState::NO_3D != 0),
            ObjectKind::GroupBox => data
                .opaque_payload(SubrecordKind::GroupBox)
                .map(GroupBoxData::view)
                .transpose()?
                .map(|state| state.flags.get() & GroupBoxData::NO_3D != 0),
            ObjectKind::ListBox | ObjectKind::ComboBox => data
                .list_tail()
                .map(ListBoxHeader::view)
                .transpose()?
                .map(|header| header.flags.get() & ListBoxHeader::NO_3D != 0),
            _ => None,
        };
        Ok(flat)
    }

    pub fn set_flat(&mut self, position: usize, flat: bool) -> Result<bool> {
        let kind = self.object_kind(position)?;
        let head = self.head_at(position)?;
        let Some(data) = client_data_mut(&mut self.tree, head) else {
            return Ok(false);
        };
        match kind {
            ObjectKind::Checkbox | ObjectKind::OptionButton => {
                let Some(payload) = data.opaque_payload_mut(SubrecordKind::CheckBox) else {
                    return Ok(false);
                };
                set_flag(
                    &mut CheckBoxState::view_mut(payload)?.flags,
                    CheckBoxState::NO_3D,
                    flat,
                );
            }
            ObjectKind::GroupBox => {
                let Some(payload) = data.opaque_payload_mut(SubrecordKind::GroupBox) else {
                    return Ok(false);
                };
                set_flag(
                    &mut GroupBoxData::view_mut(payload)?.flags,
                    GroupBoxData::NO_3D,
                    flat,
                );
            }
            ObjectKind::ListBox | ObjectKind::ComboBox => {
                let Some(tail) = data.list_tail_mut() else {
                    return Ok(false);
                };
                set_flag(
                    &mut ListBoxHeader::view_mut(tail)?.flags,
                    ListBoxHeader::NO_3D,
                    flat,
                );
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    // ---- pixel bounds ----------------------------------------------------

    /// Pixel-space bounds of the object at a top-level position.
    pub fn absolute_bounds(
        &self,
        position: usize,
        metrics: &dyn SheetMetrics,
    ) -> Result<PixelRect> {
        let head = self.head_at(position)?;
        self.node_bounds(head, metrics)
    }

    /// [`Self::absolute_bounds`] addressed by object id, reaching shapes
    /// nested inside groups.
    pub fn absolute_bounds_by_id(
        &self,
        object_id: u16,
        metrics: &dyn SheetMetrics,
    ) -> Result<PixelRect> {
        let container = self
            .index
            .by_object_id(object_id)
            .ok_or(DrawingError::UnknownObjectId { id: object_id })?;
        self.node_bounds(container, metrics)
    }

    /// Resolve a shape container's sheet-space rectangle: directly from
    /// its client anchor, or by mapping its child anchor through the
    /// owning group's coordinate space.
    fn node_bounds(&self, container: NodeId, metrics: &dyn SheetMetrics) -> Result<PixelRect> {
        if let Some(anchor) = client_anchor(&self.tree, container) {
            return Ok(anchor_pixels(anchor, metrics));
        }
        let child = child_anchor_rect(&self.tree, container)
            .copied()
            .ok_or_else(|| DrawingError::corrupt("shape container without any anchor"))?;
        let owner = self
            .owning_group(container)
            .ok_or_else(|| DrawingError::corrupt("child anchor outside a group container"))?;
        let head = self
            .tree
            .children(owner)
            .first()
            .copied()
            .ok_or_else(|| DrawingError::corrupt("group container without a head shape"))?;
        let space = group_space(&self.tree, head).copied().unwrap_or_default();
        let outer = self.node_bounds(head, metrics)?;
        Ok(map_through_group(child, space, outer))
    }

    /// Group container whose coordinate space a child-anchored container
    /// lives in. The head shape of a nested group lives in the space of
    /// the group above its own.
    fn owning_group(&self, container: NodeId) -> Option<NodeId> {
        let parent = self.tree[container].parent?;
        if self.tree[parent].record_type != EscherRecordType::SpgrContainer {
            return None;
        }
        if self.tree.children(parent).first() == Some(&container) {
            let grand = self.tree[parent].parent?;
            (self.tree[grand].record_type == EscherRecordType::SpgrContainer).then_some(grand)
        } else {
            Some(parent)
        }
    }

    // ---- structural grid edits -------------------------------------------

    /// Open `count` new rows or columns ahead of the region, carrying the
    /// drawing layer along with the cells.
    ///
    /// All four edit entry points return `true` when the edit removed the
    /// last object; the caller then drops the drawing as it would after
    /// [`Self::delete_object`].
    pub fn insert_range(
        &mut self,
        group: &mut DrawingGroup,
        region: SheetRange,
        axis: Axis,
        count: u32,
        rewriter: &dyn RefRewriter,
    ) -> Result<bool> {
        let edit = RangeEdit {
            region,
            axis,
            kind: EditKind::Insert { count },
        };
        self.apply_edit(group, edit, rewriter)
    }

    /// Delete the region's rows or columns outright.
    pub fn delete_range(
        &mut self,
        group: &mut DrawingGroup,
        region: SheetRange,
        axis: Axis,
        rewriter: &dyn RefRewriter,
    ) -> Result<bool> {
        let edit = RangeEdit {
            region,
            axis,
            kind: EditKind::Delete,
        };
        self.apply_edit(group, edit, rewriter)
    }

    /// Relocate the region to `dest`, clearing the cells it vacates.
    pub fn move_range(
        &mut self,
        group: &mut DrawingGroup,
        region: SheetRange,
        axis: Axis,
        dest: CellPos,
        rewriter: &dyn RefRewriter,
    ) -> Result<bool> {
        let edit = RangeEdit {
            region,
            axis,
            kind: EditKind::Move { dest },
        };
        self.apply_edit(group, edit, rewriter)
    }

    /// Insert `count` copies of the region after itself, duplicating the
    /// objects it fully contains.
    pub fn copy_range(
        &mut self,
        group: &mut DrawingGroup,
        region: SheetRange,
        axis: Axis,
        count: u32,
        rewriter: &dyn RefRewriter,
    ) -> Result<bool> {
        let edit = RangeEdit {
            region,
            axis,
            kind: EditKind::CopyInsert { count },
        };
        self.apply_edit(group, edit, rewriter)
    }

    /// Run one grid edit over every object: anchors transform first, then
    /// surviving references pass through the host rewriter, then removals
    /// and clones are materialized.
    fn apply_edit(
        &mut self,
        group: &mut DrawingGroup,
        edit: RangeEdit,
        rewriter: &dyn RefRewriter,
    ) -> Result<bool> {
        edit.validate()?;
        let had_objects = self.index.top_count() > 0;

        let entries: Vec<TopLevelEntry> = self.index.top_level().to_vec();
        let mut removed = Vec::new();
        let mut cloned = Vec::new();
        for entry in &entries {
            let holder = head_container(&self.tree, entry.node);
            let Some(anchor) = client_anchor_mut(&mut self.tree, holder) else {
                continue;
            };
            match transform_anchor(anchor, &edit) {
                AnchorOutcome::Keep | AnchorOutcome::Adjusted => {}
                AnchorOutcome::Remove => removed.push(entry.node),
                AnchorOutcome::Clone { copies } => cloned.push((entry.node, copies)),
            }
        }

        // a moved-away region leaves cleared cells behind; objects still
        // sitting wholly on them go the way deleted objects do
        for rect in vacated_rects(&edit) {
            for entry in &entries {
                if removed.contains(&entry.node) {
                    continue;
                }
                let holder = head_container(&self.tree, entry.node);
                let Some(anchor) = client_anchor(&self.tree, holder) else {
                    continue;
                };
                if anchor.attachment() != AnchorAttachment::DontMoveOrSize
                    && rect.contains_anchor(anchor)
                {
                    removed.push(entry.node);
                }
            }
        }

        let mut doomed = HashSet::new();
        for &node in &removed {
            doomed.extend(self.tree.walk(node));
        }
        let root = self.root();
        for container in shape_containers(&self.tree, root) {
            if doomed.contains(&container) {
                continue;
            }
            self.adjust_object_formulas(container, &edit, rewriter)?;
        }

        for &node in &removed {
            self.remove_entry_subtree(group, node);
        }
        for (source, copies) in cloned {
            self.materialize_clones(group, source, copies, &edit, rewriter)?;
        }
        self.rebuild_index();
        if !removed.is_empty() {
            debug!(
                "range edit removed {} objects from drawing {}, {} remain",
                removed.len(),
                self.dgid,
                self.index.top_count()
            );
        }
        if had_objects {
            return Ok(self.release_if_empty(group));
        }
        Ok(false)
    }

    /// Pass every reference an object carries through the host rewriter,
    /// dropping links whose target the edit destroyed.
    fn adjust_object_formulas(
        &mut self,
        container: NodeId,
        edit: &RangeEdit,
        rewriter: &dyn RefRewriter,
    ) -> Result<()> {
        let Some(data) = client_data_mut(&mut self.tree, container) else {
            return Ok(());
        };
        let Some(kind) = data.object_kind() else {
            return Ok(());
        };
        let mut dead = Vec::new();
        for role in [
            FmlaRole::Macro,
            FmlaRole::LinkedCell,
            FmlaRole::InputRange,
            FmlaRole::PictureLink,
        ] {
            let Some(slot) = role_subrecord(kind, role) else {
                continue;
            };
            let Some(fmla) = data.fmla_mut(slot) else {
                continue;
            };
            if fmla.rgce.is_empty() {
                continue;
            }
            if rewriter.adjust_for_edit(&mut fmla.rgce, edit)? == RefAdjust::Deleted {
                dead.push(slot);
            }
        }
        for slot in dead {
            if slot == SubrecordKind::ListBox {
                // the subrecord doubles as the list state block; only the
                // range link dies
                if let Some(fmla) = data.fmla_mut(slot) {
                    fmla.rgce.clear();
                    fmla.tail.clear();
                }
            } else {
                data.remove(slot);
            }
        }
        Ok(())
    }

    /// Insert the copies a copy-insert edit owes for one contained entry,
    /// each one band further down the edited axis.
    fn materialize_clones(
        &mut self,
        group: &mut DrawingGroup,
        source: NodeId,
        copies: u32,
        edit: &RangeEdit,
        rewriter: &dyn RefRewriter,
    ) -> Result<()> {
        let spgr = self.spgr();
        let Some(at) = self.tree.child_index(spgr, source) else {
            return Ok(());
        };
        let extent = edit.region.extent(edit.axis);
        for copy in 1..=copies {
            let clone = self.copy_subtree(source);
            self.tree.insert_child(spgr, at + copy as usize, clone);
            let holder = head_container(&self.tree, clone);
            if let Some(anchor) = client_anchor_mut(&mut self.tree, holder) {
                let delta = (extent * copy) as i32;
                match edit.axis {
                    Axis::Rows => anchor.shift_rows(delta),
                    Axis::Cols => anchor.shift_cols(delta),
                }
            }
            self.adopt_clone(group, clone, copy, edit, rewriter)?;
        }
        Ok(())
    }

    /// Give a cloned subtree its own identity: fresh shape and object
    /// ids, a derived name, retained picture references, and references
    /// translated one further band per copy.
    fn adopt_clone(
        &mut self,
        group: &mut DrawingGroup,
        clone: NodeId,
        copy: u32,
        edit: &RangeEdit,
        rewriter: &dyn RefRewriter,
    ) -> Result<()> {
        let shifted = RangeEdit {
            region: edit.region,
            axis: edit.axis,
            kind: EditKind::Insert { count: copy },
        };
        let containers: Vec<NodeId> = self
            .tree
            .walk(clone)
            .into_iter()
            .filter(|&id| self.tree[id].record_type == EscherRecordType::SpContainer)
            .collect();
        for container in containers {
            let spid = group.allocate_shape_id(self.dgid);
            if let Some(sp) = self.tree.find_child(container, EscherRecordType::Sp) {
                if let NodePayload::Sp(atom) = &mut self.tree[sp].payload {
                    atom.spid = spid;
                }
            }
            self.note_shape_added(spid);

            let id = self.take_object_id();
            if let Some(data) = client_data_mut(&mut self.tree, container) {
                data.set_object_id(id);
            }
            if let Some(props) = shape_properties_mut(&mut self.tree, container) {
                if let Some(name) = props.name() {
                    props.set_name(&format!("{name} ({copy})"));
                }
                if let Some(blip) = props.blip_id() {
                    group.retain_picture(blip);
                }
            }
            self.adjust_object_formulas(container, &shifted, rewriter)?;
        }
        Ok(())
    }

    /// Deep-copy a subtree into fresh slots, detached from any parent.
    fn copy_subtree(&mut self, source: NodeId) -> NodeId {
        let mut node = self.tree[source].clone();
        let children = match &mut node.payload {
            NodePayload::Container(children) => std::mem::take(children),
            _ => SmallVec::new(),
        };
        node.parent = None;
        let copy = self.tree.alloc(node);
        for child in children {
            let grafted = self.copy_subtree(child);
            self.tree.append_child(copy, grafted);
        }
        copy
    }

    // ---- internal plumbing -----------------------------------------------

    fn entry_at(&self, position: usize) -> Result<TopLevelEntry> {
        self.index
            .top_level()
            .get(position)
            .copied()
            .ok_or(DrawingError::IndexOutOfRange {
                what: "object",
                index: position,
                len: self.index.top_count(),
            })
    }

    /// Shape container answering for the entry: the entry itself, or the
    /// head shape of a group entry.
    fn head_at(&self, position: usize) -> Result<NodeId> {
        Ok(head_container(&self.tree, self.entry_at(position)?.node))
    }

    /// Top-level position owning a container anywhere in the tree.
    fn top_position_of(&self, container: NodeId) -> Option<usize> {
        if let Some(position) = self.index.position_of(container) {
            return Some(position);
        }
        let spgr = self.spgr();
        self.tree
            .ancestors(container)
            .into_iter()
            .find(|&ancestor| self.tree[ancestor].parent == Some(spgr))
            .and_then(|top| self.index.position_of(top))
    }

    /// Drop an entry's whole subtree, shape ids and picture references
    /// handed back to the group.
    fn remove_entry_subtree(&mut self, group: &mut DrawingGroup, entry: NodeId) {
        let mut shapes = 0u32;
        for id in self.tree.walk(entry) {
            let node = &self.tree[id];
            if node.record_type == EscherRecordType::SpContainer {
                shapes += 1;
            }
            if let NodePayload::Opt(props) = &node.payload {
                if let Some(blip) = props.blip_id() {
                    group.release_picture(blip);
                }
            }
        }
        self.tree.remove_subtree(entry);
        for _ in 0..shapes {
            group.note_shape_removed();
        }
        let dg = self.dg_atom_mut();
        dg.csp = dg.csp.saturating_sub(shapes);
    }

    /// Hand the drawing's ids back once nothing is left but the
    /// patriarch. The caller discards a released drawing; the next add on
    /// this sheet starts a fresh one.
    fn release_if_empty(&mut self, group: &mut DrawingGroup) -> bool {
        if self.index.top_count() > 0 {
            return false;
        }
        group.note_shape_removed();
        group.release_drawing(self.dgid);
        debug!("drawing {} emptied, ids handed back", self.dgid);
        true
    }

    /// Reorder one top-level entry, tree and cache kept in step. Sibling
    /// order under the patriarch's container is the z-order.
    fn shift_entry(&mut self, from: usize, to: usize) {
        if from == to {
            return;
        }
        let spgr = self.spgr();
        // children offset by one for the patriarch's head shape
        self.tree.move_child(spgr, from + 1, to + 1);
        self.index.move_top_level(from, to);
    }

    fn take_object_id(&mut self) -> u16 {
        let id = self.next_obj_id;
        self.next_obj_id = self.next_obj_id.saturating_add(1);
        id
    }

    fn note_shape_added(&mut self, spid: u32) {
        let dg = self.dg_atom_mut();
        dg.csp += 1;
        dg.spid_cur = spid;
    }

    fn rebuild_index(&mut self) {
        let root = self.root();
        self.index.rebuild(&self.tree, root);
    }

    /// Relative references in object formulas resolve against the
    /// anchor's top-left cell.
    fn formula_origin(&self, position: usize) -> Result<CellPos> {
        let anchor = self.anchor(position)?;
        Ok(CellPos {
            row: anchor.row1 as u32,
            col: anchor.col1 as u32,
        })
    }

    fn root(&self) -> NodeId {
        match self.tree.root() {
            Some(root) => root,
            None => unreachable!("sheet drawing constructed without a root container"),
        }
    }

    fn spgr(&self) -> NodeId {
        match self.tree.find_child(self.root(), EscherRecordType::SpgrContainer) {
            Some(spgr) => spgr,
            None => unreachable!("sheet drawing constructed without a group container"),
        }
    }

    fn dg_atom_mut(&mut self) -> &mut DgAtom {
        let root = self.root();
        let node = match self.tree.find_child(root, EscherRecordType::Dg) {
            Some(node) => node,
            None => unreachable!("sheet drawing constructed without a Dg atom"),
        };
        match &mut self.tree[node].payload {
            NodePayload::Dg(atom) => atom,
            _ => unreachable!("Dg node holds a foreign payload"),
        }
    }
}

/// Subrecord set a fresh object of this kind starts with.
fn default_object_data(kind: ObjectKind, id: u16) -> ObjectData {
    let mut data = ObjectData::new(CommonObj::new(kind, id));
    match kind {
        ObjectKind::Checkbox => {
            data.insert(Subrecord::Opaque {
                kind: SubrecordKind::CheckBox,
                data: CheckBoxState::default_payload(),
            });
            data.insert(Subrecord::Opaque {
                kind: SubrecordKind::CheckBoxData,
                data: vec![0; 8],
            });
        }
        ObjectKind::OptionButton => {
            data.insert(Subrecord::Opaque {
                kind: SubrecordKind::CheckBox,
                data: CheckBoxState::default_payload(),
            });
            data.insert(Subrecord::Opaque {
                kind: SubrecordKind::RadioMarker,
                data: vec![0; 6],
            });
            data.insert(Subrecord::Opaque {
                kind: SubrecordKind::RadioData,
                data: RadioDataTail::default_payload(),
            });
            data.insert(Subrecord::Opaque {
                kind: SubrecordKind::CheckBoxData,
                data: vec![0; 8],
            });
        }
        ObjectKind::Spinner | ObjectKind::ScrollBar => {
            data.insert(Subrecord::Opaque {
                kind: SubrecordKind::ScrollBar,
                data: ScrollBarData::default_payload(),
            });
        }
        ObjectKind::ListBox => {
            data.insert(Subrecord::Opaque {
                kind: SubrecordKind::ScrollBar,
                data: ScrollBarData::default_payload(),
            });
            data.insert(Subrecord::Fmla {
                kind: SubrecordKind::ListBox,
                fmla: ObjFmla::default(),
                after: vec![0u8; ListBoxHeader::SIZE],
            });
        }
        ObjectKind::ComboBox => {
            data.insert(Subrecord::Opaque {
                kind: SubrecordKind::ScrollBar,
                data: ScrollBarData::default_payload(),
            });
            data.insert(Subrecord::Fmla {
                kind: SubrecordKind::ListBox,
                fmla: ObjFmla::default(),
                after: combo_list_tail(),
            });
        }
        ObjectKind::EditBox => {
            data.insert(Subrecord::Opaque {
                kind: SubrecordKind::EditBox,
                data: EditBoxData::default_payload(),
            });
        }
        ObjectKind::GroupBox => {
            data.insert(Subrecord::Opaque {
                kind: SubrecordKind::GroupBox,
                data: GroupBoxData::default_payload(),
            });
        }
        ObjectKind::Comment => {
            data.insert(Subrecord::Opaque {
                kind: SubrecordKind::Note,
                data: NoteData::default_payload(),
            });
        }
        ObjectKind::Picture => {
            data.insert(Subrecord::Opaque {
                kind: SubrecordKind::ClipboardFormat,
                data: vec![0xFF, 0xFF],
            });
            data.insert(Subrecord::Opaque {
                kind: SubrecordKind::PictureFlags,
                data: vec![0x01, 0x00],
            });
        }
        ObjectKind::Group => {
            data.insert(Subrecord::Opaque {
                kind: SubrecordKind::GroupMarker,
                data: vec![0; 2],
            });
        }
        _ => {}
    }
    data
}

/// Captioned kinds start with their name as text; edit surfaces start
/// empty. The rest carry no text record until one is set.
fn default_caption(kind: ObjectKind, name: &str) -> Option<String> {
    match kind {
        ObjectKind::Button
        | ObjectKind::Checkbox
        | ObjectKind::OptionButton
        | ObjectKind::GroupBox
        | ObjectKind::Label => Some(name.to_string()),
        ObjectKind::Text | ObjectKind::EditBox | ObjectKind::Comment => Some(String::new()),
        _ => None,
    }
}

/// List state block of a fresh drop-down: an empty list head and the
/// drop-down descriptor.
fn combo_list_tail() -> Vec<u8> {
    let mut tail = vec![0u8; ListBoxHeader::SIZE];
    let dropdown = DropDownHeader {
        w_style: U16::new(lct::REGULAR as u16),
        c_line: U16::new(8),
        dx_min: U16::new(0),
    };
    tail.extend_from_slice(dropdown.as_bytes());
    tail
}

/// Write a tri-state into the object's check box payload, adding the
/// subrecord when the object never carried one.
fn set_tri_state(data: &mut ObjectData, state: TriState) -> Result<()> {
    if !data.contains(SubrecordKind::CheckBox) {
        data.insert(Subrecord::Opaque {
            kind: SubrecordKind::CheckBox,
            data: CheckBoxState::default_payload(),
        });
    }
    let payload = data
        .opaque_payload_mut(SubrecordKind::CheckBox)
        .ok_or_else(|| DrawingError::corrupt("check box state held in a foreign subrecord"))?;
    CheckBoxState::view_mut(payload)?.set_state(state);
    Ok(())
}

fn set_flag(flags: &mut U16<LE>, bit: u16, on: bool) {
    let value = flags.get();
    flags.set(if on { value | bit } else { value & !bit });
}

/// Sheet pixels of a client anchor: cell sizes summed up to the corner
/// cells, plus the fractional offsets into them.
fn anchor_pixels(anchor: &ClientAnchor, metrics: &dyn SheetMetrics) -> PixelRect {
    let x = |col: u16, dx: u16| -> i64 {
        let cells: i64 = (0..col as u32)
            .map(|c| metrics.col_width_px(c) as i64)
            .sum();
        cells + metrics.col_width_px(col as u32) as i64 * dx as i64 / 1024
    };
    let y = |row: u16, dy: u16| -> i64 {
        let cells: i64 = (0..row as u32)
            .map(|r| metrics.row_height_px(r) as i64)
            .sum();
        cells + metrics.row_height_px(row as u32) as i64 * dy as i64 / 256
    };
    PixelRect {
        left: x(anchor.col1, anchor.dx1),
        top: y(anchor.row1, anchor.dy1),
        right: x(anchor.col2, anchor.dx2),
        bottom: y(anchor.row2, anchor.dy2),
    }
}

/// Place a child rectangle, expressed in a group's coordinate space,
/// inside the group's resolved pixel bounds.
fn map_through_group(child: CoordRect, space: CoordRect, outer: PixelRect) -> PixelRect {
    let map = |value: i32, origin: i32, span: i32, out_origin: i64, out_span: i64| -> i64 {
        if span == 0 {
            return out_origin;
        }
        out_origin + (value - origin) as i64 * out_span / span as i64
    };
    let width = outer.width();
    let height = outer.height();
    PixelRect {
        left: map(child.left, space.left, space.width(), outer.left, width),
        top: map(child.top, space.top, space.height(), outer.top, height),
        right: map(child.right, space.left, space.width(), outer.left, width),
        bottom: map(child.bottom, space.top, space.height(), outer.top, height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::record_id;
    use crate::drawing::sp_atom;
    use crate::obj::formula::NoopRewriter;
    use crate::stream::{SliceSource, VecSink};

    fn order(sheet: &SheetDrawing) -> Vec<u16> {
        (0..sheet.object_count())
            .map(|position| sheet.object_id(position).unwrap())
            .collect()
    }

    #[test]
    fn add_objects_assign_ids_and_names() {
        let mut group = DrawingGroup::new();
        let mut sheet = SheetDrawing::create(&mut group);
        let a = sheet
            .add_object(&mut group, ObjectKind::Checkbox, ClientAnchor::over_cells(1, 1, 3, 2))
            .unwrap();
        let b = sheet
            .add_object(&mut group, ObjectKind::Button, ClientAnchor::over_cells(5, 1, 7, 2))
            .unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(sheet.object_count(), 2);
        assert_eq!(sheet.object_kind(a).unwrap(), ObjectKind::Checkbox);
        assert_eq!(sheet.object_id(a).unwrap(), 1);
        assert_eq!(sheet.object_id(b).unwrap(), 2);
        assert_eq!(sheet.object_name(a).unwrap().as_deref(), Some("Check Box 1"));
        assert_eq!(sheet.find_by_name("Button 2"), Some(b));
        assert_eq!(sheet.find_by_object_id(1), Some(a));
        // captioned kinds carry their name as text from the start
        assert_eq!(sheet.text(b).unwrap(), Some("Button 2"));
        assert!(matches!(
            sheet.object_kind(5),
            Err(DrawingError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn save_load_round_trips_objects() {
        let mut group = DrawingGroup::new();
        let mut sheet = SheetDrawing::create(&mut group);
        sheet
            .add_object(&mut group, ObjectKind::Checkbox, ClientAnchor::over_cells(1, 1, 3, 2))
            .unwrap();
        sheet
            .add_object(&mut group, ObjectKind::ComboBox, ClientAnchor::over_cells(5, 1, 6, 3))
            .unwrap();
        sheet.set_text(0, "Agree").unwrap();

        let mut sink = VecSink::new();
        sheet.save(&mut sink).unwrap();
        let first = sink.into_bytes();

        let mut source = SliceSource::new(first.clone());
        let mut reloaded = SheetDrawing::load(&mut source).unwrap();
        assert_eq!(reloaded.drawing_id(), sheet.drawing_id());
        assert_eq!(reloaded.object_count(), 2);
        assert_eq!(reloaded.object_kind(0).unwrap(), ObjectKind::Checkbox);
        assert_eq!(reloaded.text(0).unwrap(), Some("Agree"));
        assert_eq!(reloaded.anchor(1).unwrap().row1, 5);

        let mut sink = VecSink::new();
        reloaded.save(&mut sink).unwrap();
        assert_eq!(sink.as_slice(), &first[..]);

        // object ids continue past the reloaded maximum
        let c = reloaded
            .add_object(&mut group, ObjectKind::Label, ClientAnchor::over_cells(8, 1, 9, 2))
            .unwrap();
        assert_eq!(reloaded.object_id(c).unwrap(), 3);
    }

    #[test]
    fn long_name_payload_spans_continuations() {
        let mut group = DrawingGroup::new();
        let mut sheet = SheetDrawing::create(&mut group);
        sheet
            .add_object(&mut group, ObjectKind::Rectangle, ClientAnchor::over_cells(1, 1, 8, 6))
            .unwrap();
        let name = "n".repeat(20_000);
        sheet.set_object_name(0, &name).unwrap();

        let mut sink = VecSink::new();
        sheet.save(&mut sink).unwrap();
        let bytes = sink.into_bytes();

        let mut continues = 0;
        let mut at = 0;
        while at + 4 <= bytes.len() {
            let id = u16::from_le_bytes([bytes[at], bytes[at + 1]]);
            let len = u16::from_le_bytes([bytes[at + 2], bytes[at + 3]]) as usize;
            if id == record_id::CONTINUE {
                continues += 1;
            }
            at += 4 + len;
        }
        assert!(continues >= 3, "only {continues} continuation records");

        let mut source = SliceSource::new(bytes);
        let reloaded = SheetDrawing::load(&mut source).unwrap();
        assert_eq!(reloaded.object_name(0).unwrap().as_deref(), Some(&name[..]));
    }

    #[test]
    fn delete_object_releases_ids_and_pictures() {
        let mut group = DrawingGroup::new();
        let mut sheet = SheetDrawing::create(&mut group);
        let pic = sheet
            .add_picture(
                &mut group,
                BlipKind::Png,
                b"picture bytes",
                ClientAnchor::over_cells(1, 1, 4, 3),
            )
            .unwrap();
        sheet
            .add_object(&mut group, ObjectKind::Checkbox, ClientAnchor::over_cells(6, 1, 8, 3))
            .unwrap();
        assert_eq!(group.blip(1).unwrap().c_ref, 1);
        assert_eq!(group.dgg().csp_saved, 3);

        assert!(!sheet.delete_object(&mut group, pic).unwrap());
        assert_eq!(group.blip(1).unwrap().c_ref, 0);
        assert_eq!(group.dgg().csp_saved, 2);
        assert_eq!(sheet.object_count(), 1);
        assert_eq!(sheet.object_kind(0).unwrap(), ObjectKind::Checkbox);

        // the last object takes the whole drawing with it
        assert!(sheet.delete_object(&mut group, 0).unwrap());
        assert_eq!(group.drawing_count(), 0);
        assert_eq!(group.dgg().csp_saved, 0);
        assert!(group.dgg().clusters.is_empty());
    }

    #[test]
    fn z_order_edges_are_idempotent() {
        let mut group = DrawingGroup::new();
        let mut sheet = SheetDrawing::create(&mut group);
        for row in [1u16, 5, 9] {
            sheet
                .add_object(
                    &mut group,
                    ObjectKind::Rectangle,
                    ClientAnchor::over_cells(row, 1, row + 2, 3),
                )
                .unwrap();
        }
        assert_eq!(sheet.send_to_back(0).unwrap(), 0);
        assert_eq!(order(&sheet), vec![1, 2, 3]);
        assert_eq!(sheet.bring_to_front(2).unwrap(), 2);
        assert_eq!(order(&sheet), vec![1, 2, 3]);

        assert_eq!(sheet.bring_to_front(0).unwrap(), 2);
        assert_eq!(order(&sheet), vec![2, 3, 1]);
        assert_eq!(sheet.send_to_back(2).unwrap(), 0);
        assert_eq!(order(&sheet), vec![1, 2, 3]);
    }

    #[test]
    fn z_order_steps_skip_hidden_entries() {
        let mut group = DrawingGroup::new();
        let mut sheet = SheetDrawing::create(&mut group);
        sheet
            .add_object(&mut group, ObjectKind::Checkbox, ClientAnchor::over_cells(1, 1, 3, 2))
            .unwrap();
        sheet
            .add_comment(&mut group, ClientAnchor::over_cells(1, 4, 3, 6), "why")
            .unwrap();
        sheet
            .add_object(&mut group, ObjectKind::Button, ClientAnchor::over_cells(5, 1, 7, 2))
            .unwrap();
        assert_eq!(sheet.visible_order(), vec![0, 2]);

        // one visible step crosses the hidden comment entirely
        assert_eq!(sheet.bring_forward(0).unwrap(), 2);
        assert_eq!(order(&sheet), vec![2, 3, 1]);
        assert_eq!(sheet.send_backward(2).unwrap(), 1);
        assert_eq!(order(&sheet), vec![2, 1, 3]);

        // hidden entries never reorder
        assert_eq!(sheet.bring_forward(0).unwrap(), 0);
        assert_eq!(order(&sheet), vec![2, 1, 3]);
    }

    #[test]
    fn insert_rows_shifts_following_anchors() {
        let mut group = DrawingGroup::new();
        let mut sheet = SheetDrawing::create(&mut group);
        let moved = sheet
            .add_object(&mut group, ObjectKind::Checkbox, ClientAnchor::over_cells(10, 2, 12, 4))
            .unwrap();
        let pinned = sheet
            .add_object(&mut group, ObjectKind::Button, ClientAnchor::over_cells(10, 5, 12, 7))
            .unwrap();
        sheet
            .set_attachment(pinned, AnchorAttachment::DontMoveOrSize)
            .unwrap();

        assert!(!sheet
            .insert_range(&mut group, SheetRange::rows(5, 5), Axis::Rows, 2, &NoopRewriter)
            .unwrap());
        assert_eq!(sheet.anchor(moved).unwrap().row1, 12);
        assert_eq!(sheet.anchor(moved).unwrap().row2, 14);
        assert_eq!(sheet.anchor(pinned).unwrap().row1, 10);

        // an insert past the anchor leaves it alone
        sheet
            .insert_range(&mut group, SheetRange::rows(15, 15), Axis::Rows, 2, &NoopRewriter)
            .unwrap();
        assert_eq!(sheet.anchor(moved).unwrap().row1, 12);
    }

    #[test]
    fn delete_rows_removes_contained_objects() {
        let mut group = DrawingGroup::new();
        let mut sheet = SheetDrawing::create(&mut group);
        sheet
            .add_object(&mut group, ObjectKind::Checkbox, ClientAnchor::over_cells(6, 1, 8, 3))
            .unwrap();
        sheet
            .add_object(&mut group, ObjectKind::Button, ClientAnchor::over_cells(20, 1, 22, 3))
            .unwrap();
        let pinned = sheet
            .add_object(&mut group, ObjectKind::Label, ClientAnchor::over_cells(6, 5, 8, 7))
            .unwrap();
        sheet
            .set_attachment(pinned, AnchorAttachment::DontMoveOrSize)
            .unwrap();

        assert!(!sheet
            .delete_range(&mut group, SheetRange::rows(5, 10), Axis::Rows, &NoopRewriter)
            .unwrap());
        assert_eq!(sheet.object_count(), 2);
        assert_eq!(sheet.find_by_object_id(1), None);
        let kept = sheet.find_by_object_id(2).unwrap();
        assert_eq!(sheet.anchor(kept).unwrap().row1, 14);
        let pinned = sheet.find_by_object_id(3).unwrap();
        assert_eq!(sheet.anchor(pinned).unwrap().row1, 6);
        assert_eq!(group.dgg().csp_saved, 3);
    }

    #[test]
    fn range_delete_can_empty_the_drawing() {
        let mut group = DrawingGroup::new();
        let mut sheet = SheetDrawing::create(&mut group);
        sheet
            .add_object(&mut group, ObjectKind::Checkbox, ClientAnchor::over_cells(6, 1, 8, 3))
            .unwrap();
        assert!(sheet
            .delete_range(&mut group, SheetRange::rows(5, 10), Axis::Rows, &NoopRewriter)
            .unwrap());
        assert_eq!(sheet.object_count(), 0);
        assert_eq!(group.drawing_count(), 0);
        assert!(group.dgg().clusters.is_empty());
    }

    #[test]
    fn move_range_relocates_contained_anchors() {
        let mut group = DrawingGroup::new();
        let mut sheet = SheetDrawing::create(&mut group);
        let inside = sheet
            .add_object(&mut group, ObjectKind::Checkbox, ClientAnchor::over_cells(3, 2, 5, 4))
            .unwrap();
        let partial = sheet
            .add_object(&mut group, ObjectKind::Button, ClientAnchor::over_cells(3, 2, 8, 4))
            .unwrap();
        let pinned = sheet
            .add_object(&mut group, ObjectKind::Label, ClientAnchor::over_cells(3, 2, 5, 4))
            .unwrap();
        sheet
            .set_attachment(pinned, AnchorAttachment::DontMoveOrSize)
            .unwrap();

        let region = SheetRange::new(2, 6, 1, 5);
        assert!(!sheet
            .move_range(
                &mut group,
                region,
                Axis::Rows,
                CellPos { row: 10, col: 3 },
                &NoopRewriter,
            )
            .unwrap());
        assert_eq!(sheet.object_count(), 3);
        // a contained anchor relocates on both axes
        let anchor = sheet.anchor(inside).unwrap();
        assert_eq!((anchor.row1, anchor.col1), (11, 4));
        assert_eq!((anchor.row2, anchor.col2), (13, 6));
        // partial overlap and pinned anchors stay put
        assert_eq!(sheet.anchor(partial).unwrap().row1, 3);
        assert_eq!(sheet.anchor(pinned).unwrap().row1, 3);
    }

    #[test]
    fn copy_range_clones_with_fresh_identity() {
        let mut group = DrawingGroup::new();
        let mut sheet = SheetDrawing::create(&mut group);
        sheet
            .add_picture(
                &mut group,
                BlipKind::Png,
                b"shared picture",
                ClientAnchor::over_cells(5, 1, 6, 3),
            )
            .unwrap();

        assert!(!sheet
            .copy_range(&mut group, SheetRange::rows(5, 6), Axis::Rows, 1, &NoopRewriter)
            .unwrap());
        assert_eq!(sheet.object_count(), 2);
        assert_eq!(sheet.object_id(0).unwrap(), 1);
        assert_eq!(sheet.anchor(0).unwrap().row1, 5);
        assert_eq!(sheet.object_id(1).unwrap(), 2);
        assert_eq!(sheet.object_name(1).unwrap().as_deref(), Some("Picture 1 (1)"));
        assert_eq!(sheet.anchor(1).unwrap().row1, 7);

        // the clone holds its own shape id and a second blip reference
        let first = sheet.index.node_at(0).unwrap();
        let second = sheet.index.node_at(1).unwrap();
        assert_ne!(
            sp_atom(&sheet.tree, first).unwrap().spid,
            sp_atom(&sheet.tree, second).unwrap().spid
        );
        assert_eq!(group.blip(1).unwrap().c_ref, 2);
        assert_eq!(group.dgg().csp_saved, 3);
    }

    #[test]
    fn select_radio_rewires_the_group() {
        let mut group = DrawingGroup::new();
        let mut sheet = SheetDrawing::create(&mut group);
        for row in [1u16, 3, 5] {
            sheet
                .add_object(
                    &mut group,
                    ObjectKind::OptionButton,
                    ClientAnchor::over_cells(row, 1, row + 1, 3),
                )
                .unwrap();
        }
        let tokens = vec![0x44, 4, 0, 2, 0];
        sheet
            .set_formula(0, FmlaRole::LinkedCell, tokens.clone())
            .unwrap();

        let selection = sheet.select_radio(2).unwrap();
        assert_eq!(selection.value, 2);
        assert_eq!(selection.linked_cell.as_deref(), Some(&tokens[..]));
        assert_eq!(sheet.checkbox_state(0).unwrap(), Some(TriState::Unchecked));
        assert_eq!(sheet.checkbox_state(1).unwrap(), Some(TriState::Checked));
        assert_eq!(sheet.checkbox_state(2).unwrap(), Some(TriState::Unchecked));

        // the chain runs first to last and closes with zero
        for (position, &(next, head)) in [(2u16, 1u16), (3, 0), (0, 0)].iter().enumerate() {
            let node = sheet.index.node_at(position).unwrap();
            let data = client_data(&sheet.tree, node).unwrap();
            let tail =
                RadioDataTail::view(data.opaque_payload(SubrecordKind::RadioData).unwrap())
                    .unwrap();
            assert_eq!(tail.id_rad_next.get(), next);
            assert_eq!(tail.f_first_btn.get(), head);
        }

        assert!(matches!(
            sheet.select_radio(99),
            Err(DrawingError::UnknownObjectId { id: 99 })
        ));
        let outsider = sheet
            .add_object(&mut group, ObjectKind::Checkbox, ClientAnchor::over_cells(8, 1, 9, 3))
            .unwrap();
        let id = sheet.object_id(outsider).unwrap();
        assert!(matches!(
            sheet.select_radio(id),
            Err(DrawingError::CapabilityMismatch { .. })
        ));
    }

    #[test]
    fn formula_capability_is_rejected_up_front() {
        let mut group = DrawingGroup::new();
        let mut sheet = SheetDrawing::create(&mut group);
        let comment = sheet
            .add_comment(&mut group, ClientAnchor::over_cells(1, 4, 3, 6), "note")
            .unwrap();
        let checkbox = sheet
            .add_object(&mut group, ObjectKind::Checkbox, ClientAnchor::over_cells(1, 1, 3, 2))
            .unwrap();

        let count_subrecords = |sheet: &SheetDrawing, position: usize| {
            let node = sheet.index.node_at(position).unwrap();
            client_data(&sheet.tree, node).unwrap().subrecords().len()
        };

        let before = count_subrecords(&sheet, comment);
        assert!(matches!(
            sheet.set_formula(comment, FmlaRole::Macro, vec![0x44, 1, 0, 1, 0]),
            Err(DrawingError::CapabilityMismatch { .. })
        ));
        assert_eq!(count_subrecords(&sheet, comment), before);
        assert_eq!(sheet.formula(comment, FmlaRole::Macro).unwrap(), None);

        let before = count_subrecords(&sheet, checkbox);
        assert!(matches!(
            sheet.set_formula(checkbox, FmlaRole::InputRange, vec![0x44, 1, 0, 1, 0]),
            Err(DrawingError::CapabilityMismatch { .. })
        ));
        assert!(matches!(
            sheet.remove_formula(checkbox, FmlaRole::InputRange),
            Err(DrawingError::CapabilityMismatch { .. })
        ));
        assert_eq!(count_subrecords(&sheet, checkbox), before);

        // the same slot through a supported role works
        sheet
            .set_formula(checkbox, FmlaRole::LinkedCell, vec![0x44, 2, 0, 1, 0])
            .unwrap();
        assert!(sheet.formula(checkbox, FmlaRole::LinkedCell).unwrap().is_some());
    }

    #[test]
    fn state_setters_ignore_foreign_kinds() {
        let mut group = DrawingGroup::new();
        let mut sheet = SheetDrawing::create(&mut group);
        let button = sheet
            .add_object(&mut group, ObjectKind::Button, ClientAnchor::over_cells(1, 1, 3, 2))
            .unwrap();
        let checkbox = sheet
            .add_object(&mut group, ObjectKind::Checkbox, ClientAnchor::over_cells(5, 1, 7, 2))
            .unwrap();

        assert!(!sheet.set_checkbox_state(button, TriState::Checked).unwrap());
        assert_eq!(sheet.checkbox_state(button).unwrap(), None);
        assert!(!sheet.set_flat(button, true).unwrap());
        assert_eq!(sheet.is_flat(button).unwrap(), None);

        assert!(sheet.set_checkbox_state(checkbox, TriState::Mixed).unwrap());
        assert_eq!(sheet.checkbox_state(checkbox).unwrap(), Some(TriState::Mixed));
        assert!(sheet.set_flat(checkbox, true).unwrap());
        assert_eq!(sheet.is_flat(checkbox).unwrap(), Some(true));
    }

    #[test]
    fn formula_text_goes_through_the_host() {
        struct EchoRewriter;

        impl RefRewriter for EchoRewriter {
            fn adjust_for_edit(&self, _rgce: &mut Vec<u8>, _edit: &RangeEdit) -> Result<RefAdjust> {
                Ok(RefAdjust::Unchanged)
            }

            fn is_external(&self, _rgce: &[u8]) -> bool {
                false
            }

            fn render(&self, rgce: &[u8], origin: CellPos, _style: RefStyle) -> Result<String> {
                Ok(format!("R{}C{}:{}", origin.row, origin.col, rgce.len()))
            }

            fn parse(&self, text: &str, _origin: CellPos) -> Result<Vec<u8>> {
                Ok(text.as_bytes().to_vec())
            }
        }

        let mut group = DrawingGroup::new();
        let mut sheet = SheetDrawing::create(&mut group);
        let checkbox = sheet
            .add_object(&mut group, ObjectKind::Checkbox, ClientAnchor::over_cells(1, 1, 3, 2))
            .unwrap();
        sheet
            .set_formula_text(checkbox, FmlaRole::LinkedCell, "$A$2", &EchoRewriter)
            .unwrap();
        assert_eq!(
            sheet.formula(checkbox, FmlaRole::LinkedCell).unwrap(),
            Some(&b"$A$2"[..])
        );
        assert_eq!(
            sheet
                .formula_text(checkbox, FmlaRole::LinkedCell, RefStyle::A1, &EchoRewriter)
                .unwrap()
                .as_deref(),
            Some("R1C1:4")
        );
    }

    #[test]
    fn edits_rewrite_and_drop_references() {
        // tokens here are one byte: the referenced row
        struct ByteRowRewriter;

        impl RefRewriter for ByteRowRewriter {
            fn adjust_for_edit(&self, rgce: &mut Vec<u8>, edit: &RangeEdit) -> Result<RefAdjust> {
                let row = rgce[0] as u32;
                match edit.kind {
                    EditKind::Delete if row >= edit.region.first_row && row <= edit.region.last_row => {
                        Ok(RefAdjust::Deleted)
                    }
                    EditKind::Delete if row > edit.region.last_row => {
                        rgce[0] -= edit.region.extent(Axis::Rows) as u8;
                        Ok(RefAdjust::Shifted)
                    }
                    _ => Ok(RefAdjust::Unchanged),
                }
            }

            fn is_external(&self, _rgce: &[u8]) -> bool {
                false
            }

            fn render(&self, _rgce: &[u8], _origin: CellPos, _style: RefStyle) -> Result<String> {
                Err(DrawingError::corrupt("no renderer here"))
            }

            fn parse(&self, _text: &str, _origin: CellPos) -> Result<Vec<u8>> {
                Err(DrawingError::corrupt("no parser here"))
            }
        }

        let mut group = DrawingGroup::new();
        let mut sheet = SheetDrawing::create(&mut group);
        let shifted = sheet
            .add_object(&mut group, ObjectKind::Checkbox, ClientAnchor::over_cells(20, 1, 21, 3))
            .unwrap();
        sheet.set_formula(shifted, FmlaRole::LinkedCell, vec![30]).unwrap();
        let dropped = sheet
            .add_object(&mut group, ObjectKind::Checkbox, ClientAnchor::over_cells(22, 1, 23, 3))
            .unwrap();
        sheet.set_formula(dropped, FmlaRole::LinkedCell, vec![7]).unwrap();
        let list = sheet
            .add_object(&mut group, ObjectKind::ListBox, ClientAnchor::over_cells(24, 1, 27, 3))
            .unwrap();
        sheet.set_formula(list, FmlaRole::InputRange, vec![7]).unwrap();

        assert!(!sheet
            .delete_range(&mut group, SheetRange::rows(5, 10), Axis::Rows, &ByteRowRewriter)
            .unwrap());
        assert_eq!(sheet.object_count(), 3);
        assert_eq!(sheet.anchor(shifted).unwrap().row1, 14);

        // a reference past the deleted band shifts with the grid
        assert_eq!(
            sheet.formula(shifted, FmlaRole::LinkedCell).unwrap(),
            Some(&[24u8][..])
        );
        // a reference into the deleted band takes its subrecord with it
        assert_eq!(sheet.formula(dropped, FmlaRole::LinkedCell).unwrap(), None);
        let node = sheet.index.node_at(dropped).unwrap();
        assert!(!client_data(&sheet.tree, node)
            .unwrap()
            .contains(SubrecordKind::CheckBoxFmla));
        // a dead input range empties but keeps the list state block
        assert_eq!(sheet.formula(list, FmlaRole::InputRange).unwrap(), None);
        let node = sheet.index.node_at(list).unwrap();
        assert!(client_data(&sheet.tree, node)
            .unwrap()
            .contains(SubrecordKind::ListBox));
    }

    #[test]
    fn group_bounds_compose_through_nesting() {
        struct FixedMetrics;

        impl SheetMetrics for FixedMetrics {
            fn col_width_px(&self, _col: u32) -> u32 {
                64
            }

            fn row_height_px(&self, _row: u32) -> u32 {
                20
            }
        }

        let mut group = DrawingGroup::new();
        let mut sheet = SheetDrawing::create(&mut group);
        let spgr = sheet.spgr();

        // outer group anchored over cells, its space 1000 units square
        let g1 = sheet
            .tree
            .alloc(EscherNode::container(EscherRecordType::SpgrContainer));
        sheet.tree.append_child(spgr, g1);
        let head1 = sheet
            .tree
            .alloc(EscherNode::container(EscherRecordType::SpContainer));
        sheet.tree.append_child(g1, head1);
        let nodes = [
            sheet.tree.alloc(EscherNode::spgr(CoordRect::new(0, 0, 1000, 1000))),
            sheet.tree.alloc(EscherNode::sp(
                shape_type::NOT_PRIMITIVE,
                SpAtom {
                    spid: 2001,
                    flags: ShapeFlags::GROUP | ShapeFlags::HAVE_ANCHOR,
                },
            )),
            sheet
                .tree
                .alloc(EscherNode::client_anchor(ClientAnchor::over_cells(0, 0, 4, 4))),
            sheet.tree.alloc(EscherNode::client_data(ObjectData::new(
                CommonObj::new(ObjectKind::Group, 10),
            ))),
        ];
        for node in nodes {
            sheet.tree.append_child(head1, node);
        }

        // nested group placed at the middle half of the outer space
        let g2 = sheet
            .tree
            .alloc(EscherNode::container(EscherRecordType::SpgrContainer));
        sheet.tree.append_child(g1, g2);
        let head2 = sheet
            .tree
            .alloc(EscherNode::container(EscherRecordType::SpContainer));
        sheet.tree.append_child(g2, head2);
        let nodes = [
            sheet.tree.alloc(EscherNode::spgr(CoordRect::new(0, 0, 100, 100))),
            sheet.tree.alloc(EscherNode::sp(
                shape_type::NOT_PRIMITIVE,
                SpAtom {
                    spid: 2002,
                    flags: ShapeFlags::GROUP,
                },
            )),
            sheet
                .tree
                .alloc(EscherNode::child_anchor(CoordRect::new(250, 250, 750, 750))),
            sheet.tree.alloc(EscherNode::client_data(ObjectData::new(
                CommonObj::new(ObjectKind::Group, 11),
            ))),
        ];
        for node in nodes {
            sheet.tree.append_child(head2, node);
        }

        // leaf in the lower quadrant of the nested space
        let leaf = sheet
            .tree
            .alloc(EscherNode::container(EscherRecordType::SpContainer));
        sheet.tree.append_child(g2, leaf);
        let nodes = [
            sheet.tree.alloc(EscherNode::sp(
                shape_type::RECTANGLE,
                SpAtom {
                    spid: 2003,
                    flags: ShapeFlags::HAVE_SPT,
                },
            )),
            sheet
                .tree
                .alloc(EscherNode::child_anchor(CoordRect::new(50, 50, 100, 100))),
            sheet.tree.alloc(EscherNode::client_data(ObjectData::new(
                CommonObj::new(ObjectKind::Checkbox, 12),
            ))),
        ];
        for node in nodes {
            sheet.tree.append_child(leaf, node);
        }
        sheet.rebuild_index();

        let metrics = FixedMetrics;
        let outer = sheet.absolute_bounds(0, &metrics).unwrap();
        assert_eq!(
            outer,
            PixelRect { left: 0, top: 0, right: 256, bottom: 80 }
        );
        let nested = sheet.absolute_bounds_by_id(11, &metrics).unwrap();
        assert_eq!(
            nested,
            PixelRect { left: 64, top: 20, right: 192, bottom: 60 }
        );
        let bounds = sheet.absolute_bounds_by_id(12, &metrics).unwrap();
        assert_eq!(
            bounds,
            PixelRect { left: 128, top: 40, right: 192, bottom: 60 }
        );

        // moving the outer anchor carries the nested shapes along without
        // touching their stored child anchors
        let position = sheet.find_by_object_id(10).unwrap();
        assert_eq!(position, 0);
        sheet
            .set_anchor(position, ClientAnchor::over_cells(0, 5, 4, 9))
            .unwrap();
        let moved = sheet.absolute_bounds_by_id(12, &metrics).unwrap();
        assert_eq!(moved.left, bounds.left + 5 * 64);
        assert_eq!(moved.top, bounds.top);
        let stored = child_anchor_rect(&sheet.tree, sheet.index.by_object_id(12).unwrap());
        assert_eq!(stored, Some(&CoordRect::new(50, 50, 100, 100)));
    }

    #[test]
    fn list_state_views_expose_selection() {
        let mut group = DrawingGroup::new();
        let mut sheet = SheetDrawing::create(&mut group);
        let combo = sheet
            .add_object(&mut group, ObjectKind::ComboBox, ClientAnchor::over_cells(1, 1, 2, 3))
            .unwrap();
        let list = sheet
            .add_object(&mut group, ObjectKind::ListBox, ClientAnchor::over_cells(4, 1, 8, 3))
            .unwrap();

        let dropdown = sheet.dropdown(combo).unwrap().unwrap();
        assert_eq!(dropdown.list_control_type(), lct::REGULAR);
        assert_eq!(dropdown.c_line.get(), 8);
        // a plain list box carries no drop-down block
        assert!(sheet.dropdown(list).unwrap().is_none());

        {
            let node = sheet.index.node_at(list).unwrap();
            let data = client_data_mut(&mut sheet.tree, node).unwrap();
            data.list_tail_mut().unwrap().extend_from_slice(&[0, 1, 0]);
        }
        {
            let header = sheet.list_header_mut(list).unwrap().unwrap();
            header.c_lines.set(3);
            header.i_sel.set(2);
            header.set_selection(ListSelection::Multi);
        }
        assert_eq!(
            sheet.list_header(list).unwrap().unwrap().selection(),
            ListSelection::Multi
        );
        assert_eq!(sheet.multi_selection(list).unwrap(), Some(&[0u8, 1, 0][..]));
        // single-select boxes report no bitmap
        assert_eq!(sheet.multi_selection(combo).unwrap(), None);

        assert!(sheet.set_flat(combo, true).unwrap());
        assert_eq!(sheet.is_flat(combo).unwrap(), Some(true));
    }

    #[test]
    fn scroll_state_view_edits_spin_value() {
        let mut group = DrawingGroup::new();
        let mut sheet = SheetDrawing::create(&mut group);
        let spinner = sheet
            .add_object(&mut group, ObjectKind::Spinner, ClientAnchor::over_cells(1, 1, 3, 2))
            .unwrap();
        let button = sheet
            .add_object(&mut group, ObjectKind::Button, ClientAnchor::over_cells(5, 1, 7, 2))
            .unwrap();

        assert_eq!(sheet.scroll_state(spinner).unwrap().unwrap().imax.get(), 100);
        sheet
            .scroll_state_mut(spinner)
            .unwrap()
            .unwrap()
            .ival
            .set(40);
        assert_eq!(sheet.scroll_state(spinner).unwrap().unwrap().ival.get(), 40);
        assert!(sheet.scroll_state(button).unwrap().is_none());
    }

    #[test]
    fn text_rules_follow_object_kind() {
        let mut group = DrawingGroup::new();
        let mut sheet = SheetDrawing::create(&mut group);
        let line = sheet
            .add_object(&mut group, ObjectKind::Line, ClientAnchor::over_cells(1, 1, 3, 3))
            .unwrap();
        assert!(matches!(
            sheet.set_text(line, "x"),
            Err(DrawingError::TextNotSupported { kind: ObjectKind::Line })
        ));
        assert_eq!(sheet.text(line).unwrap(), None);

        let button = sheet
            .add_object(&mut group, ObjectKind::Button, ClientAnchor::over_cells(5, 1, 7, 2))
            .unwrap();
        sheet.set_text(button, "Run").unwrap();
        assert_eq!(sheet.text(button).unwrap(), Some("Run"));

        let edit = sheet
            .add_object(&mut group, ObjectKind::EditBox, ClientAnchor::over_cells(9, 1, 10, 3))
            .unwrap();
        assert_eq!(sheet.text(edit).unwrap(), Some(""));

        let oversize = "x".repeat(70_000);
        assert!(matches!(
            sheet.set_text(edit, &oversize),
            Err(DrawingError::TextTooLong { units: 70_000 })
        ));
    }
}
