//! Tree nodes: containers plus the typed leaf atoms of a drawing stream.
//!
//! Every record tag a worksheet drawing stream can legally contain maps to
//! exactly one payload variant here. Client data and client textbox leaves
//! have zero wire length; their content travels as separate Obj and TxO
//! records and lives in the node after the loader swaps it in.
use crate::binary::read_u32_le;
use crate::error::{DrawingError, Result};
use crate::escher::anchor::{ClientAnchor, CoordRect};
use crate::escher::properties::ShapeProperties;
use crate::escher::tree::NodeId;
use crate::escher::types::{EscherRecordType, ShapeFlags};
use crate::obj::subrecord::ObjectData;
use crate::obj::text::TextObject;
use bytes::Bytes;
use smallvec::SmallVec;

/// Dg atom: per-drawing shape bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DgAtom {
    /// Number of shapes in the drawing, the patriarch included.
    pub csp: u32,
    /// Last shape id allocated to this drawing.
    pub spid_cur: u32,
}

impl DgAtom {
    pub const SIZE: usize = 8;

    pub fn parse(data: &[u8]) -> Result<Self> {
        Ok(Self {
            csp: read_u32_le(data, 0)?,
            spid_cur: read_u32_le(data, 4)?,
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.csp.to_le_bytes());
        out.extend_from_slice(&self.spid_cur.to_le_bytes());
    }
}

/// One shape-id cluster: 1024 ids reserved for the drawing `dgid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdCluster {
    pub dgid: u32,
    /// Ids used so far in this cluster, 0 to 1024.
    pub cspid: u32,
}

/// Dgg atom: workbook-global shape-id and drawing bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DggAtom {
    /// Upper bound of all allocated shape ids, plus one.
    pub spid_max: u32,
    /// Total shapes saved across all drawings.
    pub csp_saved: u32,
    /// Total drawings saved.
    pub cdg_saved: u32,
    pub clusters: Vec<IdCluster>,
}

impl DggAtom {
    pub const FIXED_SIZE: usize = 16;

    pub fn parse(data: &[u8]) -> Result<Self> {
        let spid_max = read_u32_le(data, 0)?;
        let cidcl = read_u32_le(data, 4)?;
        let csp_saved = read_u32_le(data, 8)?;
        let cdg_saved = read_u32_le(data, 12)?;
        if cidcl == 0 {
            return Err(DrawingError::corrupt("Dgg atom with zero cluster count"));
        }
        let cluster_count = (cidcl - 1) as usize;
        if Self::FIXED_SIZE + cluster_count * 8 > data.len() {
            return Err(DrawingError::corrupt(format!(
                "Dgg atom declares {cluster_count} id clusters but holds {} bytes",
                data.len()
            )));
        }
        let mut clusters = Vec::with_capacity(cluster_count);
        for i in 0..cluster_count {
            let offset = Self::FIXED_SIZE + i * 8;
            clusters.push(IdCluster {
                dgid: read_u32_le(data, offset)?,
                cspid: read_u32_le(data, offset + 4)?,
            });
        }
        Ok(Self {
            spid_max,
            csp_saved,
            cdg_saved,
            clusters,
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.spid_max.to_le_bytes());
        out.extend_from_slice(&(self.clusters.len() as u32 + 1).to_le_bytes());
        out.extend_from_slice(&self.csp_saved.to_le_bytes());
        out.extend_from_slice(&self.cdg_saved.to_le_bytes());
        for cluster in &self.clusters {
            out.extend_from_slice(&cluster.dgid.to_le_bytes());
            out.extend_from_slice(&cluster.cspid.to_le_bytes());
        }
    }

    pub fn wire_size(&self) -> usize {
        Self::FIXED_SIZE + self.clusters.len() * 8
    }
}

/// Sp atom: shape identity. The shape type rides in the record header's
/// instance field, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpAtom {
    pub spid: u32,
    pub flags: ShapeFlags,
}

impl SpAtom {
    pub const SIZE: usize = 8;

    pub fn parse(data: &[u8]) -> Result<Self> {
        Ok(Self {
            spid: read_u32_le(data, 0)?,
            flags: ShapeFlags::from_bits_retain(read_u32_le(data, 4)?),
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.spid.to_le_bytes());
        out.extend_from_slice(&self.flags.bits().to_le_bytes());
    }
}

/// Blip store entry (OfficeArtFBSE): 36 fixed bytes, then the embedded blip
/// record preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlipStoreEntry {
    pub bt_win32: u8,
    pub bt_mac: u8,
    pub rgb_uid: [u8; 16],
    pub tag: u16,
    /// Byte size of the embedded blip record.
    pub size: u32,
    /// Number of picture shapes referencing this entry.
    pub c_ref: u32,
    pub fo_delay: u32,
    pub usage: u8,
    pub cb_name: u8,
    /// The embedded blip record, header included.
    pub blip: Bytes,
}

impl BlipStoreEntry {
    pub const FIXED_SIZE: usize = 36;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::FIXED_SIZE {
            return Err(DrawingError::corrupt(format!(
                "blip store entry needs {} bytes, found {}",
                Self::FIXED_SIZE,
                data.len()
            )));
        }
        let mut rgb_uid = [0u8; 16];
        rgb_uid.copy_from_slice(&data[2..18]);
        Ok(Self {
            bt_win32: data[0],
            bt_mac: data[1],
            rgb_uid,
            tag: u16::from_le_bytes([data[18], data[19]]),
            size: read_u32_le(data, 20)?,
            c_ref: read_u32_le(data, 24)?,
            fo_delay: read_u32_le(data, 28)?,
            usage: data[32],
            cb_name: data[33],
            blip: Bytes::copy_from_slice(&data[Self::FIXED_SIZE..]),
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.bt_win32);
        out.push(self.bt_mac);
        out.extend_from_slice(&self.rgb_uid);
        out.extend_from_slice(&self.tag.to_le_bytes());
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&self.c_ref.to_le_bytes());
        out.extend_from_slice(&self.fo_delay.to_le_bytes());
        out.push(self.usage);
        out.push(self.cb_name);
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&self.blip);
    }

    pub fn wire_size(&self) -> usize {
        Self::FIXED_SIZE + self.blip.len()
    }
}

/// Payload of one tree node.
#[derive(Debug, Clone)]
pub enum NodePayload {
    /// Container: ordered child list.
    Container(SmallVec<[NodeId; 4]>),
    Dg(DgAtom),
    Dgg(DggAtom),
    Spgr(CoordRect),
    Sp(SpAtom),
    Opt(ShapeProperties),
    ClientAnchor(ClientAnchor),
    ChildAnchor(CoordRect),
    /// Object body swapped in from the adjacent Obj record.
    ClientData(ObjectData),
    /// Text body swapped in from the adjacent TxO record.
    ClientTextbox(TextObject),
    Bse(BlipStoreEntry),
    /// Leaf preserved byte for byte (SplitMenuColors, standalone blips).
    Opaque(Bytes),
}

/// One record of the drawing stream, in tree form.
#[derive(Debug, Clone)]
pub struct EscherNode {
    pub record_type: EscherRecordType,
    pub version: u8,
    /// Header instance field. Carries the shape type for Sp atoms and the
    /// property count for Opt atoms (the latter recomputed on save).
    pub instance: u16,
    pub parent: Option<NodeId>,
    pub payload: NodePayload,
}

impl EscherNode {
    pub fn container(record_type: EscherRecordType) -> Self {
        debug_assert!(record_type.is_container());
        Self {
            record_type,
            version: 0x0F,
            instance: 0,
            parent: None,
            payload: NodePayload::Container(SmallVec::new()),
        }
    }

    pub fn sp(shape_type: u16, atom: SpAtom) -> Self {
        Self {
            record_type: EscherRecordType::Sp,
            version: 0x02,
            instance: shape_type,
            parent: None,
            payload: NodePayload::Sp(atom),
        }
    }

    pub fn spgr(rect: CoordRect) -> Self {
        Self {
            record_type: EscherRecordType::Spgr,
            version: 0x01,
            instance: 0,
            parent: None,
            payload: NodePayload::Spgr(rect),
        }
    }

    pub fn dg(atom: DgAtom, dgid: u16) -> Self {
        Self {
            record_type: EscherRecordType::Dg,
            version: 0,
            instance: dgid,
            parent: None,
            payload: NodePayload::Dg(atom),
        }
    }

    pub fn dgg(atom: DggAtom) -> Self {
        Self {
            record_type: EscherRecordType::Dgg,
            version: 0,
            instance: 0,
            parent: None,
            payload: NodePayload::Dgg(atom),
        }
    }

    pub fn opt(properties: ShapeProperties) -> Self {
        let instance = properties.count();
        Self {
            record_type: EscherRecordType::Opt,
            version: 0x03,
            instance,
            parent: None,
            payload: NodePayload::Opt(properties),
        }
    }

    pub fn client_anchor(anchor: ClientAnchor) -> Self {
        Self {
            record_type: EscherRecordType::ClientAnchor,
            version: 0,
            instance: 0,
            parent: None,
            payload: NodePayload::ClientAnchor(anchor),
        }
    }

    pub fn child_anchor(rect: CoordRect) -> Self {
        Self {
            record_type: EscherRecordType::ChildAnchor,
            version: 0,
            instance: 0,
            parent: None,
            payload: NodePayload::ChildAnchor(rect),
        }
    }

    pub fn client_data(data: ObjectData) -> Self {
        Self {
            record_type: EscherRecordType::ClientData,
            version: 0,
            instance: 0,
            parent: None,
            payload: NodePayload::ClientData(data),
        }
    }

    pub fn client_textbox(text: TextObject) -> Self {
        Self {
            record_type: EscherRecordType::ClientTextbox,
            version: 0,
            instance: 0,
            parent: None,
            payload: NodePayload::ClientTextbox(text),
        }
    }

    pub fn bse(entry: BlipStoreEntry) -> Self {
        Self {
            record_type: EscherRecordType::Bse,
            version: 0x02,
            instance: entry.bt_win32 as u16,
            parent: None,
            payload: NodePayload::Bse(entry),
        }
    }

    #[inline]
    pub fn is_container(&self) -> bool {
        matches!(self.payload, NodePayload::Container(_))
    }

    /// Child ids of a container node; empty for leaves.
    pub fn children(&self) -> &[NodeId] {
        match &self.payload {
            NodePayload::Container(children) => children,
            _ => &[],
        }
    }

    /// Wire size of the leaf payload. Containers report 0 here; their
    /// declared length is the sum of their children, computed by the writer.
    pub fn payload_size(&self) -> usize {
        match &self.payload {
            NodePayload::Container(_) => 0,
            NodePayload::Dg(_) => DgAtom::SIZE,
            NodePayload::Dgg(atom) => atom.wire_size(),
            NodePayload::Spgr(_) | NodePayload::ChildAnchor(_) => CoordRect::SIZE,
            NodePayload::Sp(_) => SpAtom::SIZE,
            NodePayload::Opt(props) => props.wire_size(),
            NodePayload::ClientAnchor(_) => ClientAnchor::SIZE,
            // Content travels as a separate record
            NodePayload::ClientData(_) | NodePayload::ClientTextbox(_) => 0,
            NodePayload::Bse(entry) => entry.wire_size(),
            NodePayload::Opaque(data) => data.len(),
        }
    }
}
