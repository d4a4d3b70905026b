//! Lookup caches over one sheet's record tree.
//!
//! The tree is the single source of truth; the index holds derived views
//! of it. Top-level entries mirror the child order of the patriarch's
//! group container, which is the z-order (last child draws on top). The
//! id and name maps cover every shape container, grouped shapes
//! included. All of it is rebuilt from scratch after a structural
//! mutation; only the z-order swap keeps the index in step by hand,
//! since reordering invalidates no node ids.
use std::collections::HashMap;

use crate::drawing::{client_data, shape_properties, sp_atom};
use crate::escher::read::shape_containers;
use crate::escher::tree::{EscherTree, NodeId};
use crate::escher::types::EscherRecordType;
use crate::obj::data::{lct, DropDownHeader, ListBoxHeader};
use crate::obj::subrecord::ObjectData;
use crate::obj::ObjectKind;

/// One direct child of the patriarch's group container: a shape container
/// or a nested group container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopLevelEntry {
    pub node: NodeId,
    /// False for objects a user never sees in the drawing layer: cell
    /// comments and the list droppers AutoFilter and PivotTable put on
    /// the grid.
    pub visible: bool,
}

/// Caches over one sheet drawing, owned by the drawing and rebuilt after
/// every structural mutation.
#[derive(Debug, Clone, Default)]
pub struct ObjectIndex {
    top: Vec<TopLevelEntry>,
    by_spid: HashMap<u32, NodeId>,
    by_obj_id: HashMap<u16, NodeId>,
    by_name: HashMap<String, NodeId>,
    /// Option button containers keyed by their parent container, in
    /// document order. Buttons under one parent form one radio group.
    radio_groups: HashMap<NodeId, Vec<NodeId>>,
}

impl ObjectIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute every cache from the tree.
    pub fn rebuild(&mut self, tree: &EscherTree, root: NodeId) {
        self.top.clear();
        self.by_spid.clear();
        self.by_obj_id.clear();
        self.by_name.clear();
        self.radio_groups.clear();

        let Some(spgr) = tree.find_descendant(root, EscherRecordType::SpgrContainer) else {
            return;
        };
        for &entry in tree.children(spgr).iter().skip(1) {
            let visible = match tree[entry].record_type {
                EscherRecordType::SpgrContainer => true,
                EscherRecordType::SpContainer => entry_is_visible(tree, entry),
                _ => continue,
            };
            self.top.push(TopLevelEntry {
                node: entry,
                visible,
            });
        }

        for container in shape_containers(tree, root) {
            if let Some(atom) = sp_atom(tree, container) {
                self.by_spid.insert(atom.spid, container);
            }
            if let Some(name) = shape_properties(tree, container).and_then(|p| p.name()) {
                self.by_name.entry(name).or_insert(container);
            }
            let Some(data) = client_data(tree, container) else {
                continue;
            };
            if let Some(id) = data.object_id() {
                self.by_obj_id.insert(id, container);
            }
            if data.object_kind() == Some(ObjectKind::OptionButton) {
                if let Some(parent) = tree[container].parent {
                    self.radio_groups.entry(parent).or_default().push(container);
                }
            }
        }
    }

    /// Top-level entries in z-order, bottom first.
    #[inline]
    pub fn top_level(&self) -> &[TopLevelEntry] {
        &self.top
    }

    #[inline]
    pub fn top_count(&self) -> usize {
        self.top.len()
    }

    pub fn node_at(&self, position: usize) -> Option<NodeId> {
        self.top.get(position).map(|e| e.node)
    }

    pub fn position_of(&self, node: NodeId) -> Option<usize> {
        self.top.iter().position(|e| e.node == node)
    }

    /// Visible top-level entries in z-order.
    pub fn visible(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.top.iter().filter(|e| e.visible).map(|e| e.node)
    }

    pub fn by_object_id(&self, id: u16) -> Option<NodeId> {
        self.by_obj_id.get(&id).copied()
    }

    pub fn by_shape_id(&self, spid: u32) -> Option<NodeId> {
        self.by_spid.get(&spid).copied()
    }

    /// First shape carrying the given wzName, in document order.
    pub fn by_name(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// Largest object id in use, zero when the sheet has none.
    pub fn max_object_id(&self) -> u16 {
        self.by_obj_id.keys().copied().max().unwrap_or(0)
    }

    /// Option buttons directly under `parent`, in document order.
    pub fn radio_members(&self, parent: NodeId) -> &[NodeId] {
        self.radio_groups.get(&parent).map_or(&[], Vec::as_slice)
    }

    /// Mirror of [`EscherTree::move_child`] on the patriarch's container,
    /// applied to the top-level cache.
    pub fn move_top_level(&mut self, from: usize, to: usize) {
        let entry = self.top.remove(from);
        self.top.insert(to, entry);
    }
}

fn entry_is_visible(tree: &EscherTree, container: NodeId) -> bool {
    let Some(data) = client_data(tree, container) else {
        return true;
    };
    match data.object_kind() {
        Some(ObjectKind::Comment) => false,
        Some(ObjectKind::ListBox | ObjectKind::ComboBox) => match list_control_type(data) {
            Some(t) => t == lct::REGULAR,
            None => true,
        },
        _ => true,
    }
}

/// Drop-down style byte of a list control, when its ftLbsData tail is
/// long enough to carry one.
pub(crate) fn list_control_type(data: &ObjectData) -> Option<u8> {
    let tail = data.list_tail()?;
    let block = tail.get(ListBoxHeader::SIZE..)?;
    DropDownHeader::view(block)
        .ok()
        .map(DropDownHeader::list_control_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escher::anchor::ClientAnchor;
    use crate::escher::node::{DgAtom, EscherNode, SpAtom};
    use crate::escher::properties::ShapeProperties;
    use crate::escher::types::{shape_type, ShapeFlags};
    use crate::obj::formula::ObjFmla;
    use crate::obj::subrecord::{CommonObj, Subrecord, SubrecordKind};

    fn plain_object(kind: ObjectKind, id: u16) -> ObjectData {
        ObjectData::new(CommonObj::new(kind, id))
    }

    fn dropper_object(id: u16, control_type: u8) -> ObjectData {
        let mut data = plain_object(ObjectKind::ComboBox, id);
        let mut after = vec![0u8; ListBoxHeader::SIZE + DropDownHeader::SIZE];
        DropDownHeader::view_mut(&mut after[ListBoxHeader::SIZE..])
            .unwrap()
            .set_list_control_type(control_type);
        data.insert(Subrecord::Fmla {
            kind: SubrecordKind::ListBox,
            fmla: ObjFmla::new(Vec::new()),
            after,
        });
        data
    }

    fn add_shape(
        tree: &mut EscherTree,
        parent: NodeId,
        spid: u32,
        data: ObjectData,
        name: Option<&str>,
    ) -> NodeId {
        let container = tree.alloc(EscherNode::container(EscherRecordType::SpContainer));
        tree.append_child(parent, container);
        let sp = tree.alloc(EscherNode::sp(
            shape_type::HOST_CONTROL,
            SpAtom {
                spid,
                flags: ShapeFlags::HAVE_ANCHOR | ShapeFlags::HAVE_SPT,
            },
        ));
        tree.append_child(container, sp);
        if let Some(name) = name {
            let mut props = ShapeProperties::new();
            props.set_name(name);
            let opt = tree.alloc(EscherNode::opt(props));
            tree.append_child(container, opt);
        }
        let anchor = tree.alloc(EscherNode::client_anchor(ClientAnchor::over_cells(
            1, 1, 3, 3,
        )));
        tree.append_child(container, anchor);
        let body = tree.alloc(EscherNode::client_data(data));
        tree.append_child(container, body);
        container
    }

    fn group_head(tree: &mut EscherTree, group: NodeId, spid: u32, id: u16) -> NodeId {
        let head = tree.alloc(EscherNode::container(EscherRecordType::SpContainer));
        tree.append_child(group, head);
        let spgr = tree.alloc(EscherNode::spgr(Default::default()));
        tree.append_child(head, spgr);
        let sp = tree.alloc(EscherNode::sp(
            shape_type::NOT_PRIMITIVE,
            SpAtom {
                spid,
                flags: ShapeFlags::GROUP | ShapeFlags::HAVE_ANCHOR,
            },
        ));
        tree.append_child(head, sp);
        let anchor = tree.alloc(EscherNode::client_anchor(ClientAnchor::over_cells(
            5, 1, 9, 4,
        )));
        tree.append_child(head, anchor);
        let body = tree.alloc(EscherNode::client_data(plain_object(ObjectKind::Group, id)));
        tree.append_child(head, body);
        head
    }

    struct Fixture {
        tree: EscherTree,
        root: NodeId,
        spgr: NodeId,
        checkbox: NodeId,
        dropper: NodeId,
        comment: NodeId,
        group: NodeId,
        grouped_radios: [NodeId; 2],
        lone_radio: NodeId,
    }

    fn fixture() -> Fixture {
        let mut tree = EscherTree::new();
        let root = tree.alloc(EscherNode::container(EscherRecordType::DgContainer));
        tree.set_root(root);
        let dg = tree.alloc(EscherNode::dg(
            DgAtom {
                csp: 8,
                spid_cur: 1031,
            },
            1,
        ));
        tree.append_child(root, dg);
        let spgr = tree.alloc(EscherNode::container(EscherRecordType::SpgrContainer));
        tree.append_child(root, spgr);

        let patriarch = tree.alloc(EscherNode::container(EscherRecordType::SpContainer));
        tree.append_child(spgr, patriarch);
        let pat_spgr = tree.alloc(EscherNode::spgr(Default::default()));
        tree.append_child(patriarch, pat_spgr);
        let pat_sp = tree.alloc(EscherNode::sp(
            shape_type::NOT_PRIMITIVE,
            SpAtom {
                spid: 1024,
                flags: ShapeFlags::GROUP | ShapeFlags::PATRIARCH,
            },
        ));
        tree.append_child(patriarch, pat_sp);

        let checkbox = add_shape(
            &mut tree,
            spgr,
            1025,
            plain_object(ObjectKind::Checkbox, 1),
            Some("Check Box 1"),
        );
        let dropper = add_shape(
            &mut tree,
            spgr,
            1026,
            dropper_object(2, lct::AUTO_FILTER),
            None,
        );
        let comment = add_shape(
            &mut tree,
            spgr,
            1027,
            plain_object(ObjectKind::Comment, 3),
            None,
        );

        let group = tree.alloc(EscherNode::container(EscherRecordType::SpgrContainer));
        tree.append_child(spgr, group);
        group_head(&mut tree, group, 1028, 4);
        let radio_a = add_shape(
            &mut tree,
            group,
            1029,
            plain_object(ObjectKind::OptionButton, 5),
            None,
        );
        let radio_b = add_shape(
            &mut tree,
            group,
            1030,
            plain_object(ObjectKind::OptionButton, 6),
            None,
        );

        let lone_radio = add_shape(
            &mut tree,
            spgr,
            1031,
            plain_object(ObjectKind::OptionButton, 7),
            None,
        );

        Fixture {
            tree,
            root,
            spgr,
            checkbox,
            dropper,
            comment,
            group,
            grouped_radios: [radio_a, radio_b],
            lone_radio,
        }
    }

    fn built_index(fx: &Fixture) -> ObjectIndex {
        let mut index = ObjectIndex::new();
        index.rebuild(&fx.tree, fx.root);
        index
    }

    #[test]
    fn test_top_level_skips_patriarch_and_keeps_order() {
        let fx = fixture();
        let index = built_index(&fx);
        let nodes: Vec<NodeId> = index.top_level().iter().map(|e| e.node).collect();
        assert_eq!(
            nodes,
            vec![fx.checkbox, fx.dropper, fx.comment, fx.group, fx.lone_radio]
        );
    }

    #[test]
    fn test_comments_and_droppers_are_invisible() {
        let fx = fixture();
        let index = built_index(&fx);
        let visible: Vec<NodeId> = index.visible().collect();
        assert_eq!(visible, vec![fx.checkbox, fx.group, fx.lone_radio]);

        let hidden: Vec<NodeId> = index
            .top_level()
            .iter()
            .filter(|e| !e.visible)
            .map(|e| e.node)
            .collect();
        assert_eq!(hidden, vec![fx.dropper, fx.comment]);
    }

    #[test]
    fn test_plain_combo_box_is_visible() {
        let mut fx = fixture();
        let combo = add_shape(
            &mut fx.tree,
            fx.spgr,
            1032,
            dropper_object(8, lct::REGULAR),
            None,
        );
        let index = built_index(&fx);
        assert!(index.visible().any(|n| n == combo));
    }

    #[test]
    fn test_id_and_name_lookup_reach_grouped_shapes() {
        let fx = fixture();
        let index = built_index(&fx);
        assert_eq!(index.by_object_id(5), Some(fx.grouped_radios[0]));
        assert_eq!(index.by_object_id(9), None);
        assert_eq!(index.by_shape_id(1030), Some(fx.grouped_radios[1]));
        assert_eq!(index.by_name("Check Box 1"), Some(fx.checkbox));
        assert_eq!(index.by_name("Check Box 9"), None);
        assert_eq!(index.max_object_id(), 7);
    }

    #[test]
    fn test_radio_groups_split_by_parent() {
        let fx = fixture();
        let index = built_index(&fx);
        assert_eq!(index.radio_members(fx.group), fx.grouped_radios);
        assert_eq!(index.radio_members(fx.spgr), &[fx.lone_radio]);
        assert!(index.radio_members(fx.checkbox).is_empty());
    }

    #[test]
    fn test_move_top_level_mirrors_tree_reorder() {
        let fx = fixture();
        let mut index = built_index(&fx);
        index.move_top_level(0, 4);
        assert_eq!(index.position_of(fx.checkbox), Some(4));
        assert_eq!(index.node_at(0), Some(fx.dropper));

        let mut rebuilt = ObjectIndex::new();
        rebuilt.rebuild(&fx.tree, fx.root);
        assert_eq!(rebuilt.position_of(fx.checkbox), Some(0));
    }
}
