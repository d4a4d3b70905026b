//! Sheet drawings and the workbook drawing group.
//!
//! # Architecture
//!
//! - `group`: workbook-global id clusters and the picture (blip) store
//! - `sheet`: one sheet's drawing, its objects and every mutation on them
//! - `index`: caches over the sheet tree (z-order, id and name lookup,
//!   radio grouping)
//!
//! A [`SheetDrawing`] owns its record tree; the [`DrawingGroup`] is owned
//! by the workbook object and lent to operations that allocate shape ids
//! or picture data. Caches hold stable [`NodeId`]s and are rebuilt after
//! structural mutation.
pub mod group;
pub mod index;
pub mod sheet;

pub use group::{BlipKind, DrawingGroup};
pub use index::ObjectIndex;
pub use sheet::{PixelRect, RadioSelection, SheetDrawing, SheetMetrics};

use crate::escher::anchor::{ClientAnchor, CoordRect};
use crate::escher::node::{NodePayload, SpAtom};
use crate::escher::properties::ShapeProperties;
use crate::escher::tree::{EscherTree, NodeId};
use crate::escher::types::EscherRecordType;
use crate::obj::subrecord::ObjectData;
use crate::obj::text::TextObject;

/// Object body attached to a shape container.
pub(crate) fn client_data(tree: &EscherTree, container: NodeId) -> Option<&ObjectData> {
    let node = tree.find_child(container, EscherRecordType::ClientData)?;
    match &tree[node].payload {
        NodePayload::ClientData(data) => Some(data),
        _ => None,
    }
}

pub(crate) fn client_data_mut(tree: &mut EscherTree, container: NodeId) -> Option<&mut ObjectData> {
    let node = tree.find_child(container, EscherRecordType::ClientData)?;
    match &mut tree[node].payload {
        NodePayload::ClientData(data) => Some(data),
        _ => None,
    }
}

pub(crate) fn sp_atom(tree: &EscherTree, container: NodeId) -> Option<&SpAtom> {
    let node = tree.find_child(container, EscherRecordType::Sp)?;
    match &tree[node].payload {
        NodePayload::Sp(atom) => Some(atom),
        _ => None,
    }
}

pub(crate) fn client_anchor(tree: &EscherTree, container: NodeId) -> Option<&ClientAnchor> {
    let node = tree.find_child(container, EscherRecordType::ClientAnchor)?;
    match &tree[node].payload {
        NodePayload::ClientAnchor(anchor) => Some(anchor),
        _ => None,
    }
}

pub(crate) fn client_anchor_mut(
    tree: &mut EscherTree,
    container: NodeId,
) -> Option<&mut ClientAnchor> {
    let node = tree.find_child(container, EscherRecordType::ClientAnchor)?;
    match &mut tree[node].payload {
        NodePayload::ClientAnchor(anchor) => Some(anchor),
        _ => None,
    }
}

pub(crate) fn shape_properties(tree: &EscherTree, container: NodeId) -> Option<&ShapeProperties> {
    let node = tree.find_child(container, EscherRecordType::Opt)?;
    match &tree[node].payload {
        NodePayload::Opt(props) => Some(props),
        _ => None,
    }
}

pub(crate) fn shape_properties_mut(
    tree: &mut EscherTree,
    container: NodeId,
) -> Option<&mut ShapeProperties> {
    let node = tree.find_child(container, EscherRecordType::Opt)?;
    match &mut tree[node].payload {
        NodePayload::Opt(props) => Some(props),
        _ => None,
    }
}

pub(crate) fn text_object(tree: &EscherTree, container: NodeId) -> Option<&TextObject> {
    let node = tree.find_child(container, EscherRecordType::ClientTextbox)?;
    match &tree[node].payload {
        NodePayload::ClientTextbox(text) => Some(text),
        _ => None,
    }
}

pub(crate) fn text_object_mut(tree: &mut EscherTree, container: NodeId) -> Option<&mut TextObject> {
    let node = tree.find_child(container, EscherRecordType::ClientTextbox)?;
    match &mut tree[node].payload {
        NodePayload::ClientTextbox(text) => Some(text),
        _ => None,
    }
}

/// Shape container holding a top-level entry's client anchor: the entry
/// itself, or the head shape of a group entry.
pub(crate) fn head_container(tree: &EscherTree, entry: NodeId) -> NodeId {
    if tree[entry].record_type == EscherRecordType::SpgrContainer {
        tree[entry].children().first().copied().unwrap_or(entry)
    } else {
        entry
    }
}

/// Relative placement of a grouped shape within its parent's coordinate
/// space.
pub(crate) fn child_anchor_rect(tree: &EscherTree, container: NodeId) -> Option<&CoordRect> {
    let node = tree.find_child(container, EscherRecordType::ChildAnchor)?;
    match &tree[node].payload {
        NodePayload::ChildAnchor(rect) => Some(rect),
        _ => None,
    }
}

/// Coordinate space a group maps its children's child anchors through.
pub(crate) fn group_space(tree: &EscherTree, container: NodeId) -> Option<&CoordRect> {
    let node = tree.find_child(container, EscherRecordType::Spgr)?;
    match &tree[node].payload {
        NodePayload::Spgr(rect) => Some(rect),
        _ => None,
    }
}
