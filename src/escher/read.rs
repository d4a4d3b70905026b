//! Drawing stream loader.
//!
//! # Architecture
//!
//! Drawing bytes arrive framed in workbook records: a root record
//! (`MsoDrawingGroup` for the workbook-global stream, `MsoDrawing` for a
//! sheet stream) extended by `Continue` records, with `Obj` and `TxO`
//! records interleaved at the points where a shape's client data lives.
//! The loader pulls records lazily while a recursive descent over the
//! Escher headers builds the node tree. Declared record lengths drive the
//! recursion; a child overrunning its parent's extent is corruption and is
//! never repaired.
//!
//! A `ClientData` or `ClientTextbox` header of declared length zero is a
//! swap point: the payload is the next `Obj` (resp. `TxO`) record of the
//! surrounding stream, and the drawing bytes resume afterwards under a
//! fresh root tag.
use crate::consts::record_id;
use crate::error::{DrawingError, Result};
use crate::escher::anchor::{ClientAnchor, CoordRect};
use crate::escher::node::{BlipStoreEntry, DgAtom, DggAtom, EscherNode, NodePayload, SpAtom};
use crate::escher::properties::ShapeProperties;
use crate::escher::tree::{EscherTree, NodeId};
use crate::escher::types::{EscherRecordType, RawRecordHeader, HEADER_SIZE};
use crate::obj::subrecord::ObjectData;
use crate::obj::text::TextObject;
use crate::stream::{PhysicalRecord, RecordSource};
use bytes::Bytes;
use smallvec::SmallVec;

/// Deeper nesting than any workbook produces; guards the descent against
/// corrupt self-referential lengths.
const MAX_DEPTH: usize = 64;

/// Reads the workbook-global drawing stream (`MsoDrawingGroup` root).
pub fn read_drawing_group(source: &mut dyn RecordSource) -> Result<EscherTree> {
    TreeReader::new(source, record_id::MSO_DRAWING_GROUP).read_tree()
}

/// Reads one sheet's drawing stream (`MsoDrawing` root).
pub fn read_sheet_drawing(source: &mut dyn RecordSource) -> Result<EscherTree> {
    TreeReader::new(source, record_id::MSO_DRAWING).read_tree()
}

struct TreeReader<'a> {
    source: &'a mut dyn RecordSource,
    root_id: u16,
    buf: Vec<u8>,
    pos: usize,
    pulled_any: bool,
}

impl<'a> TreeReader<'a> {
    fn new(source: &'a mut dyn RecordSource, root_id: u16) -> Self {
        Self {
            source,
            root_id,
            buf: Vec::new(),
            pos: 0,
            pulled_any: false,
        }
    }

    fn read_tree(mut self) -> Result<EscherTree> {
        let mut tree = EscherTree::new();
        let root = self.parse_node(&mut tree, usize::MAX, 0)?;
        tree.set_root(root);
        if self.pos != self.buf.len() {
            return Err(DrawingError::corrupt(format!(
                "{} drawing bytes beyond the root record",
                self.buf.len() - self.pos
            )));
        }
        if matches!(self.source.peek_id()?, Some(record_id::CONTINUE)) {
            return Err(DrawingError::corrupt(
                "continuation record after the drawing stream closed",
            ));
        }
        Ok(tree)
    }

    #[inline]
    fn available(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Buffers drawing bytes until `need` are readable, pulling further
    /// drawing records off the stream as required.
    fn ensure(&mut self, need: usize) -> Result<()> {
        while self.available() < need {
            let next = self.source.peek_id()?;
            let extends = match next {
                // the stream must open with the root tag
                Some(id) if !self.pulled_any => id == self.root_id,
                Some(id) => id == self.root_id || id == record_id::CONTINUE,
                None => false,
            };
            if !extends {
                return Err(DrawingError::corrupt(format!(
                    "drawing stream ended {} bytes short",
                    need - self.available()
                )));
            }
            let record = self
                .source
                .next_record()?
                .ok_or_else(|| DrawingError::corrupt("record stream ended unexpectedly"))?;
            self.buf.extend_from_slice(&record.data);
            self.pulled_any = true;
        }
        Ok(())
    }

    /// Consumes `n` drawing bytes.
    fn take(&mut self, n: usize) -> Result<&[u8]> {
        self.ensure(n)?;
        let span = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(span)
    }

    fn parse_node(&mut self, tree: &mut EscherTree, limit: usize, depth: usize) -> Result<NodeId> {
        if depth > MAX_DEPTH {
            return Err(DrawingError::corrupt("drawing records nest too deeply"));
        }
        let header = RawRecordHeader::parse(self.take(HEADER_SIZE)?)?;
        let tag = header.rec_type.get();
        let record_type = EscherRecordType::from_tag(tag).ok_or_else(|| {
            DrawingError::corrupt(format!("unknown drawing record type 0x{tag:04X}"))
        })?;
        let length = header.length.get() as usize;
        let end = self
            .pos
            .checked_add(length)
            .ok_or_else(|| DrawingError::corrupt("drawing record length overflows the stream"))?;
        if end > limit {
            return Err(DrawingError::corrupt(format!(
                "record 0x{tag:04X} overruns its parent by {} bytes",
                end - limit
            )));
        }

        if record_type.is_container() {
            let mut node = EscherNode::container(record_type);
            node.version = header.version();
            node.instance = header.instance();
            let id = tree.alloc(node);
            while self.pos < end {
                let child = self.parse_node(tree, end, depth + 1)?;
                tree.append_child(id, child);
            }
            return Ok(id);
        }

        let payload = self.parse_leaf(record_type, header.instance(), length)?;
        let node = EscherNode {
            record_type,
            version: header.version(),
            instance: header.instance(),
            parent: None,
            payload,
        };
        Ok(tree.alloc(node))
    }

    fn parse_leaf(
        &mut self,
        record_type: EscherRecordType,
        instance: u16,
        length: usize,
    ) -> Result<NodePayload> {
        let expect_exact = |size: usize| -> Result<()> {
            if length != size {
                return Err(DrawingError::corrupt(format!(
                    "{record_type:?} record of {length} bytes, expected {size}"
                )));
            }
            Ok(())
        };
        Ok(match record_type {
            EscherRecordType::Dg => {
                expect_exact(DgAtom::SIZE)?;
                NodePayload::Dg(DgAtom::parse(self.take(length)?)?)
            }
            EscherRecordType::Dgg => NodePayload::Dgg(DggAtom::parse(self.take(length)?)?),
            EscherRecordType::Sp => {
                expect_exact(SpAtom::SIZE)?;
                NodePayload::Sp(SpAtom::parse(self.take(length)?)?)
            }
            EscherRecordType::Spgr => {
                expect_exact(CoordRect::SIZE)?;
                NodePayload::Spgr(CoordRect::parse(self.take(length)?)?)
            }
            EscherRecordType::ChildAnchor => {
                expect_exact(CoordRect::SIZE)?;
                NodePayload::ChildAnchor(CoordRect::parse(self.take(length)?)?)
            }
            EscherRecordType::ClientAnchor => {
                expect_exact(ClientAnchor::SIZE)?;
                NodePayload::ClientAnchor(ClientAnchor::parse(self.take(length)?)?)
            }
            EscherRecordType::Opt => {
                NodePayload::Opt(ShapeProperties::parse(instance, self.take(length)?)?)
            }
            EscherRecordType::Bse => NodePayload::Bse(BlipStoreEntry::parse(self.take(length)?)?),
            EscherRecordType::ClientData => {
                if length != 0 {
                    return Err(DrawingError::corrupt(
                        "client data record with an inline payload",
                    ));
                }
                NodePayload::ClientData(self.pull_object()?)
            }
            EscherRecordType::ClientTextbox => {
                if length != 0 {
                    return Err(DrawingError::corrupt(
                        "client textbox record with an inline payload",
                    ));
                }
                NodePayload::ClientTextbox(self.pull_text()?)
            }
            // SplitMenuColors and standalone blips pass through untouched
            _ => NodePayload::Opaque(Bytes::copy_from_slice(self.take(length)?)),
        })
    }

    /// Swap point: the object body is the next record of the stream.
    fn pull_object(&mut self) -> Result<ObjectData> {
        let record = self.pull_swap_record(record_id::OBJ, "Obj")?;
        ObjectData::decode(&record.data)
    }

    fn pull_text(&mut self) -> Result<TextObject> {
        let record = self.pull_swap_record(record_id::TXO, "TxO")?;
        TextObject::read(&record.data, self.source)
    }

    fn pull_swap_record(&mut self, id: u16, name: &str) -> Result<PhysicalRecord> {
        match self.source.peek_id()? {
            Some(found) if found == id => self
                .source
                .next_record()?
                .ok_or_else(|| DrawingError::corrupt("record stream ended unexpectedly")),
            Some(found) => Err(DrawingError::corrupt(format!(
                "client data marker not followed by the {name} record, found 0x{found:04X}"
            ))),
            None => Err(DrawingError::corrupt(format!(
                "record stream ended where the {name} record was expected"
            ))),
        }
    }
}

/// Collects, in document order, the `SpContainer` nodes under a drawing
/// container, descending into nested group containers. A nested group
/// contributes its head container (the group shape itself) followed by its
/// members. The patriarch container is not included.
pub fn shape_containers(tree: &EscherTree, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let Some(spgr) = tree.find_descendant(root, EscherRecordType::SpgrContainer) else {
        return out;
    };
    let mut stack: SmallVec<[NodeId; 8]> =
        tree.children(spgr).iter().skip(1).rev().copied().collect();
    while let Some(id) = stack.pop() {
        let Some(node) = tree.get(id) else { continue };
        match node.record_type {
            EscherRecordType::SpContainer => out.push(id),
            EscherRecordType::SpgrContainer => {
                for &child in tree.children(id).iter().skip(1).rev() {
                    stack.push(child);
                }
                if let Some(&head) = tree.children(id).first() {
                    out.push(head);
                }
            }
            _ => {}
        }
    }
    out
}
