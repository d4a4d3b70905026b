//! Drawing stream saver.
//!
//! # Architecture
//!
//! Saving happens in two passes. The size pass computes every container's
//! declared length bottom-up as a pure function of the tree. The emit pass
//! then serializes the tree into a list of atomic segments (headers, leaf
//! payloads, break markers) and packs them into workbook records.
//!
//! Record boundaries follow the grammar the loader accepts: the first run
//! of drawing bytes carries the root tag, overflow slices carry `Continue`,
//! and a run resuming after an interleaved `Obj` or `TxO` record carries
//! the root tag again. Breaks are forced at every swap point and ahead of
//! each blip store entry; slices elsewhere land on node boundaries, and
//! only a leaf payload larger than a record (an embedded blip) is cut
//! mid-payload.
use crate::consts::{record_id, MAX_RECORD_DATA};
use crate::error::{DrawingError, Result};
use crate::escher::anchor::{ClientAnchor, CoordRect};
use crate::escher::node::{DgAtom, NodePayload, SpAtom};
use crate::escher::tree::{EscherTree, NodeId};
use crate::escher::types::{RawRecordHeader, HEADER_SIZE};
use crate::stream::RecordSink;
use zerocopy::IntoBytes;

/// Writes the workbook-global drawing stream (`MsoDrawingGroup` root).
pub fn write_drawing_group(tree: &EscherTree, sink: &mut dyn RecordSink) -> Result<()> {
    write_stream(tree, sink, record_id::MSO_DRAWING_GROUP)
}

/// Writes one sheet's drawing stream (`MsoDrawing` root).
pub fn write_sheet_drawing(tree: &EscherTree, sink: &mut dyn RecordSink) -> Result<()> {
    write_stream(tree, sink, record_id::MSO_DRAWING)
}

fn write_stream(tree: &EscherTree, sink: &mut dyn RecordSink, root_id: u16) -> Result<()> {
    let root = tree.root().ok_or(DrawingError::MissingDrawing)?;
    let mut segments = Vec::new();
    push_node(tree, root, &mut segments)?;

    let mut emitter = RunEmitter {
        sink,
        root_id,
        current: Vec::new(),
        next_is_root: true,
    };
    for segment in &segments {
        match segment {
            Segment::Atom(bytes) => emitter.push_atom(bytes)?,
            Segment::Sliceable(bytes) => emitter.push_sliceable(bytes)?,
            Segment::Break => emitter.flush()?,
            Segment::SwapObject(id) => {
                emitter.flush()?;
                let NodePayload::ClientData(data) = &tree[*id].payload else {
                    unreachable!("segment built from a client data node");
                };
                emitter.sink.write_record(record_id::OBJ, &data.encode())?;
                emitter.next_is_root = true;
            }
            Segment::SwapText(id) => {
                emitter.flush()?;
                let NodePayload::ClientTextbox(text) = &tree[*id].payload else {
                    unreachable!("segment built from a client textbox node");
                };
                text.write(emitter.sink)?;
                emitter.next_is_root = true;
            }
        }
    }
    emitter.flush()
}

/// Drawing bytes a subtree occupies, header included.
fn subtree_size(tree: &EscherTree, id: NodeId) -> usize {
    let node = &tree[id];
    if node.is_container() {
        HEADER_SIZE
            + node
                .children()
                .iter()
                .map(|&child| subtree_size(tree, child))
                .sum::<usize>()
    } else {
        HEADER_SIZE + node.payload_size()
    }
}

enum Segment {
    /// Header or leaf payload, never split across records.
    Atom(Vec<u8>),
    /// Leaf payload allowed to cross record boundaries.
    Sliceable(Vec<u8>),
    /// Forced record boundary.
    Break,
    /// Flush, then emit the node's object body as an `Obj` record.
    SwapObject(NodeId),
    /// Flush, then emit the node's text as a `TxO` record family.
    SwapText(NodeId),
}

fn header_atom(version: u8, instance: u16, tag: u16, length: usize) -> Segment {
    Segment::Atom(
        RawRecordHeader::new(version, instance, tag, length as u32)
            .as_bytes()
            .to_vec(),
    )
}

fn push_node(tree: &EscherTree, id: NodeId, segments: &mut Vec<Segment>) -> Result<()> {
    let node = &tree[id];
    let tag = u16::from(node.record_type);
    match &node.payload {
        NodePayload::Container(children) => {
            let length = subtree_size(tree, id) - HEADER_SIZE;
            segments.push(header_atom(node.version, node.instance, tag, length));
            for &child in children {
                push_node(tree, child, segments)?;
            }
        }
        NodePayload::ClientData(_) => {
            segments.push(header_atom(node.version, node.instance, tag, 0));
            segments.push(Segment::SwapObject(id));
        }
        NodePayload::ClientTextbox(_) => {
            segments.push(header_atom(node.version, node.instance, tag, 0));
            segments.push(Segment::SwapText(id));
        }
        NodePayload::Bse(entry) => {
            // each blip store entry opens a fresh record
            segments.push(Segment::Break);
            segments.push(header_atom(
                node.version,
                entry.bt_win32 as u16,
                tag,
                entry.wire_size(),
            ));
            let mut payload = Vec::with_capacity(entry.wire_size());
            entry.write_to(&mut payload);
            segments.push(wrap_payload(payload));
        }
        NodePayload::Opt(props) => {
            segments.push(header_atom(
                node.version,
                props.count(),
                tag,
                props.wire_size(),
            ));
            let mut payload = Vec::with_capacity(props.wire_size());
            props.write_to(&mut payload);
            segments.push(wrap_payload(payload));
        }
        NodePayload::Dg(atom) => {
            segments.push(header_atom(node.version, node.instance, tag, DgAtom::SIZE));
            let mut payload = Vec::with_capacity(DgAtom::SIZE);
            atom.write_to(&mut payload);
            segments.push(Segment::Atom(payload));
        }
        NodePayload::Dgg(atom) => {
            segments.push(header_atom(
                node.version,
                node.instance,
                tag,
                atom.wire_size(),
            ));
            let mut payload = Vec::with_capacity(atom.wire_size());
            atom.write_to(&mut payload);
            segments.push(wrap_payload(payload));
        }
        NodePayload::Spgr(rect) | NodePayload::ChildAnchor(rect) => {
            segments.push(header_atom(node.version, node.instance, tag, CoordRect::SIZE));
            let mut payload = Vec::with_capacity(CoordRect::SIZE);
            rect.write_to(&mut payload);
            segments.push(Segment::Atom(payload));
        }
        NodePayload::Sp(atom) => {
            segments.push(header_atom(node.version, node.instance, tag, SpAtom::SIZE));
            let mut payload = Vec::with_capacity(SpAtom::SIZE);
            atom.write_to(&mut payload);
            segments.push(Segment::Atom(payload));
        }
        NodePayload::ClientAnchor(anchor) => {
            segments.push(header_atom(
                node.version,
                node.instance,
                tag,
                ClientAnchor::SIZE,
            ));
            let mut payload = Vec::with_capacity(ClientAnchor::SIZE);
            anchor.write_to(&mut payload);
            segments.push(Segment::Atom(payload));
        }
        NodePayload::Opaque(data) => {
            segments.push(header_atom(node.version, node.instance, tag, data.len()));
            segments.push(wrap_payload(data.to_vec()));
        }
    }
    Ok(())
}

fn wrap_payload(payload: Vec<u8>) -> Segment {
    if payload.len() > MAX_RECORD_DATA {
        Segment::Sliceable(payload)
    } else {
        Segment::Atom(payload)
    }
}

struct RunEmitter<'a> {
    sink: &'a mut dyn RecordSink,
    root_id: u16,
    current: Vec<u8>,
    next_is_root: bool,
}

impl RunEmitter<'_> {
    fn push_atom(&mut self, bytes: &[u8]) -> Result<()> {
        if self.current.len() + bytes.len() > MAX_RECORD_DATA {
            self.flush()?;
        }
        self.current.extend_from_slice(bytes);
        Ok(())
    }

    fn push_sliceable(&mut self, bytes: &[u8]) -> Result<()> {
        let mut rest = bytes;
        while !rest.is_empty() {
            let space = MAX_RECORD_DATA - self.current.len();
            if space == 0 {
                self.flush()?;
                continue;
            }
            let take = space.min(rest.len());
            self.current.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.current.is_empty() {
            return Ok(());
        }
        let id = if self.next_is_root {
            self.root_id
        } else {
            record_id::CONTINUE
        };
        self.sink.write_record(id, &self.current)?;
        self.current.clear();
        self.next_is_root = false;
        Ok(())
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::drawing::{DrawingGroup, SheetDrawing};
    use crate::obj::ObjectKind;
    use crate::stream::{RecordSource, SliceSource, VecSink};
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    struct ObjectSpec {
        kind: ObjectKind,
        row: u16,
        col: u16,
        name: Option<String>,
        text: Option<String>,
    }

    /// Strategy to generate the form-control and shape kinds a sheet holds.
    fn kind_strategy() -> impl Strategy<Value = ObjectKind> {
        prop_oneof![
            Just(ObjectKind::Rectangle),
            Just(ObjectKind::Button),
            Just(ObjectKind::Checkbox),
            Just(ObjectKind::OptionButton),
            Just(ObjectKind::EditBox),
            Just(ObjectKind::Label),
            Just(ObjectKind::GroupBox),
            Just(ObjectKind::ListBox),
            Just(ObjectKind::ComboBox),
            Just(ObjectKind::Spinner),
            Just(ObjectKind::ScrollBar),
            Just(ObjectKind::Comment),
        ]
    }

    /// Strategy to generate one object: kind, in-grid anchor cell, and
    /// optional name and text.
    fn object_strategy() -> impl Strategy<Value = ObjectSpec> {
        (
            kind_strategy(),
            0u16..200,
            0u16..50,
            prop::option::of("[a-zA-Z][a-zA-Z0-9 ]{0,40}"),
            prop::option::of("[a-zA-Z ]{0,24}"),
        )
            .prop_map(|(kind, row, col, name, text)| ObjectSpec {
                kind,
                row,
                col,
                name,
                text: if kind.supports_text() { text } else { None },
            })
    }

    fn continuation_count(stream: &[u8]) -> usize {
        let mut source = SliceSource::new(stream.to_vec());
        let mut continues = 0;
        while let Some(rec) = source.next_record().unwrap() {
            if rec.id == record_id::CONTINUE {
                continues += 1;
            }
        }
        continues
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_continued_streams_round_trip(
            specs in prop::collection::vec(object_strategy(), 1..6),
            padding in 12_400usize..15_000,
        ) {
            let mut group = DrawingGroup::new();
            let mut sheet = SheetDrawing::create(&mut group);
            for spec in &specs {
                let anchor =
                    ClientAnchor::over_cells(spec.row, spec.col, spec.row + 2, spec.col + 1);
                let position = sheet.add_object(&mut group, spec.kind, anchor).unwrap();
                if let Some(name) = &spec.name {
                    sheet.set_object_name(position, name).unwrap();
                }
                if let Some(text) = &spec.text {
                    sheet.set_text(position, text).unwrap();
                }
            }
            // one name wide enough that its drawing run spans several records
            sheet.set_object_name(0, &"w".repeat(padding)).unwrap();

            let mut sink = VecSink::new();
            sheet.save(&mut sink).unwrap();
            let first = sink.into_bytes();
            let continues = continuation_count(&first);
            prop_assert!(continues >= 3, "only {} continuation records", continues);

            let mut source = SliceSource::new(first.clone());
            let reloaded = SheetDrawing::load(&mut source).unwrap();
            prop_assert_eq!(reloaded.object_count(), sheet.object_count());
            for position in 0..sheet.object_count() {
                prop_assert_eq!(
                    reloaded.object_kind(position).unwrap(),
                    sheet.object_kind(position).unwrap()
                );
                prop_assert_eq!(
                    reloaded.object_id(position).unwrap(),
                    sheet.object_id(position).unwrap()
                );
                prop_assert_eq!(
                    reloaded.anchor(position).unwrap(),
                    sheet.anchor(position).unwrap()
                );
                prop_assert_eq!(
                    reloaded.object_name(position).unwrap(),
                    sheet.object_name(position).unwrap()
                );
                prop_assert_eq!(reloaded.text(position).unwrap(), sheet.text(position).unwrap());
            }

            let mut sink = VecSink::new();
            reloaded.save(&mut sink).unwrap();
            prop_assert_eq!(sink.as_slice(), &first[..]);
        }
    }
}
