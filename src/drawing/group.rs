//! Workbook-wide drawing state: shape-id clusters and the blip store.
//!
//! # Format
//!
//! The `MsoDrawingGroup` stream holds one `DggContainer` with the `Dgg`
//! bookkeeping atom, an optional blip store (`BstoreContainer` of `Bse`
//! entries), a document-default `Opt` record and the `SplitMenuColors`
//! atom. Shape ids are handed out in clusters of 1024 per drawing: cluster
//! at table position `i` (1-based) owns ids `i * 1024 .. i * 1024 + 1023`,
//! so a cluster's position must never change while other drawings hold ids.
//!
//! Owned by the workbook object and passed `&mut` into every sheet-drawing
//! operation that allocates ids or picture data.
use crate::error::{DrawingError, Result};
use crate::escher::node::{BlipStoreEntry, DggAtom, EscherNode, IdCluster, NodePayload};
use crate::escher::properties::ShapeProperties;
use crate::escher::read::read_drawing_group;
use crate::escher::tree::EscherTree;
use crate::escher::types::{EscherRecordType, RawRecordHeader};
use crate::escher::write::write_drawing_group;
use crate::stream::{RecordSink, RecordSource};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use zerocopy::IntoBytes;

/// Shape ids per cluster.
const CLUSTER_SPAN: u32 = 1024;

/// Default drop-down menu colors (fill, line, shadow, 3-D hues).
const SPLIT_MENU_DEFAULTS: [u8; 16] = [
    0x0D, 0x00, 0x00, 0x08, 0x0C, 0x00, 0x00, 0x08, 0x17, 0x00, 0x00, 0x08, 0xF7, 0x00, 0x00, 0x10,
];

/// Picture formats the blip store can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlipKind {
    Emf,
    Wmf,
    Pict,
    Jpeg,
    Png,
    Dib,
    Tiff,
}

impl BlipKind {
    /// Win32 blip type stored in the `Bse` entry.
    pub const fn bt(self) -> u8 {
        match self {
            Self::Emf => 2,
            Self::Wmf => 3,
            Self::Pict => 4,
            Self::Jpeg => 5,
            Self::Png => 6,
            Self::Dib => 7,
            Self::Tiff => 17,
        }
    }

    /// Record type tag of the embedded blip record.
    pub const fn record_tag(self) -> u16 {
        0xF018 + self.bt() as u16
    }

    /// Header instance marking the single-UID form of the blip record.
    pub const fn record_instance(self) -> u16 {
        match self {
            Self::Emf => 0x3D4,
            Self::Wmf => 0x216,
            Self::Pict => 0x542,
            Self::Jpeg => 0x46A,
            Self::Png => 0x6E0,
            Self::Dib => 0x7A8,
            Self::Tiff => 0x6E4,
        }
    }
}

/// Workbook-global drawing bookkeeping, serialized as the
/// `MsoDrawingGroup` stream.
#[derive(Debug, Clone)]
pub struct DrawingGroup {
    dgg: DggAtom,
    /// Drawing ids handed out and not yet released. Clusters only appear on
    /// the first shape allocation, so this list is what keeps a second
    /// registration from reusing a pending id.
    live_drawings: Vec<u16>,
    blips: Vec<BlipStoreEntry>,
    /// Document-default shape properties.
    drawing_opts: ShapeProperties,
    split_menu: Option<Bytes>,
}

impl Default for DrawingGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawingGroup {
    /// Empty group with the host's default drawing options.
    pub fn new() -> Self {
        let mut drawing_opts = ShapeProperties::new();
        drawing_opts.set_simple(0x00BF, 0x0008_0008);
        drawing_opts.set_simple(0x0181, 0x0800_0041);
        drawing_opts.set_simple(0x01C0, 0x0800_0040);
        Self {
            dgg: DggAtom {
                spid_max: CLUSTER_SPAN,
                csp_saved: 0,
                cdg_saved: 0,
                clusters: Vec::new(),
            },
            live_drawings: Vec::new(),
            blips: Vec::new(),
            drawing_opts,
            split_menu: Some(Bytes::from_static(&SPLIT_MENU_DEFAULTS)),
        }
    }

    #[inline]
    pub fn dgg(&self) -> &DggAtom {
        &self.dgg
    }

    /// Number of registered sheet drawings.
    #[inline]
    pub fn drawing_count(&self) -> u32 {
        self.dgg.cdg_saved
    }

    /// Register a fresh sheet drawing and return its drawing id.
    pub fn register_drawing(&mut self) -> u16 {
        let mut dgid = 1u16;
        while self.live_drawings.contains(&dgid)
            || self.dgg.clusters.iter().any(|c| c.dgid == dgid as u32)
        {
            dgid += 1;
        }
        self.live_drawings.push(dgid);
        self.dgg.cdg_saved += 1;
        dgid
    }

    /// Drop a drawing's clusters when its sheet tears the drawing down.
    ///
    /// Tail clusters are removed outright; an interior cluster is only
    /// cleared (dgid 0), keeping later clusters at their table positions so
    /// the shape ids they handed out stay valid.
    pub fn release_drawing(&mut self, dgid: u16) {
        for cluster in &mut self.dgg.clusters {
            if cluster.dgid == dgid as u32 {
                cluster.dgid = 0;
                cluster.cspid = 0;
            }
        }
        while self.dgg.clusters.last().is_some_and(|c| c.dgid == 0) {
            self.dgg.clusters.pop();
        }
        self.live_drawings.retain(|&d| d != dgid);
        self.dgg.cdg_saved = self.dgg.cdg_saved.saturating_sub(1);
    }

    /// Hand out the next shape id for a drawing, growing the cluster table
    /// when the drawing's current cluster is full.
    pub fn allocate_shape_id(&mut self, dgid: u16) -> u32 {
        let dgid = dgid as u32;
        let slot = self
            .dgg
            .clusters
            .iter()
            .position(|c| c.dgid == dgid && c.cspid < CLUSTER_SPAN)
            .or_else(|| {
                // reuse a cleared slot before growing the table
                let free = self.dgg.clusters.iter().position(|c| c.dgid == 0);
                if let Some(i) = free {
                    self.dgg.clusters[i] = IdCluster { dgid, cspid: 0 };
                }
                free
            })
            .unwrap_or_else(|| {
                self.dgg.clusters.push(IdCluster { dgid, cspid: 0 });
                self.dgg.clusters.len() - 1
            });
        let cluster = &mut self.dgg.clusters[slot];
        let spid = (slot as u32 + 1) * CLUSTER_SPAN + cluster.cspid;
        cluster.cspid += 1;
        self.dgg.csp_saved += 1;
        self.dgg.spid_max = self.dgg.spid_max.max(spid + 1);
        spid
    }

    /// Bookkeeping for a deleted shape. Its id is not reusable.
    pub fn note_shape_removed(&mut self) {
        self.dgg.csp_saved = self.dgg.csp_saved.saturating_sub(1);
    }

    #[inline]
    pub fn blip_count(&self) -> usize {
        self.blips.len()
    }

    /// Blip store entry for a 1-based picture index.
    pub fn blip(&self, blip_id: u32) -> Option<&BlipStoreEntry> {
        self.blips.get(blip_id.checked_sub(1)? as usize)
    }

    /// Store picture bytes, returning the 1-based blip id shapes reference
    /// through their `pib` property.
    ///
    /// Identical bytes land on the existing entry with a bumped reference
    /// count rather than a second copy.
    pub fn add_picture(&mut self, kind: BlipKind, data: &[u8]) -> u32 {
        let uid = picture_uid(data);
        if let Some(i) = self.blips.iter().position(|b| b.rgb_uid == uid) {
            self.blips[i].c_ref += 1;
            return i as u32 + 1;
        }
        let mut blip = RawRecordHeader::new(
            0,
            kind.record_instance(),
            kind.record_tag(),
            (uid.len() + 1 + data.len()) as u32,
        )
        .as_bytes()
        .to_vec();
        blip.extend_from_slice(&uid);
        blip.push(0xFF);
        blip.extend_from_slice(data);
        self.blips.push(BlipStoreEntry {
            bt_win32: kind.bt(),
            bt_mac: kind.bt(),
            rgb_uid: uid,
            tag: 0xFF,
            size: blip.len() as u32,
            c_ref: 1,
            fo_delay: 0,
            usage: 0,
            cb_name: 0,
            blip: Bytes::from(blip),
        });
        self.blips.len() as u32
    }

    /// Add one reference to an existing blip, for a new shape sharing it.
    pub fn retain_picture(&mut self, blip_id: u32) {
        if let Some(i) = blip_id.checked_sub(1) {
            if let Some(entry) = self.blips.get_mut(i as usize) {
                entry.c_ref += 1;
            }
        }
    }

    /// Drop one reference to a blip. Entries stay in the store at zero
    /// references so later blip ids keep their positions.
    pub fn release_picture(&mut self, blip_id: u32) {
        if let Some(i) = blip_id.checked_sub(1) {
            if let Some(entry) = self.blips.get_mut(i as usize) {
                entry.c_ref = entry.c_ref.saturating_sub(1);
            }
        }
    }

    /// Serialize as the `MsoDrawingGroup` record family.
    pub fn save(&self, sink: &mut dyn RecordSink) -> Result<()> {
        let mut tree = EscherTree::new();
        let root = tree.alloc(EscherNode::container(EscherRecordType::DggContainer));
        tree.set_root(root);

        let dgg = tree.alloc(EscherNode::dgg(self.dgg.clone()));
        tree.append_child(root, dgg);

        if !self.blips.is_empty() {
            let mut container = EscherNode::container(EscherRecordType::BStoreContainer);
            container.instance = self.blips.len() as u16;
            let store = tree.alloc(container);
            tree.append_child(root, store);
            for entry in &self.blips {
                let bse = tree.alloc(EscherNode::bse(entry.clone()));
                tree.append_child(store, bse);
            }
        }

        if !self.drawing_opts.is_empty() {
            let opt = tree.alloc(EscherNode::opt(self.drawing_opts.clone()));
            tree.append_child(root, opt);
        }

        if let Some(colors) = &self.split_menu {
            let node = EscherNode {
                record_type: EscherRecordType::SplitMenuColors,
                version: 0,
                instance: (colors.len() / 4) as u16,
                parent: None,
                payload: NodePayload::Opaque(colors.clone()),
            };
            let colors = tree.alloc(node);
            tree.append_child(root, colors);
        }

        write_drawing_group(&tree, sink)
    }

    /// Rebuild the group from an `MsoDrawingGroup` record family.
    pub fn load(source: &mut dyn RecordSource) -> Result<Self> {
        let tree = read_drawing_group(source)?;
        let root = tree.root().ok_or(DrawingError::MissingDrawing)?;
        if tree[root].record_type != EscherRecordType::DggContainer {
            return Err(DrawingError::corrupt(format!(
                "drawing group stream rooted at {:?}",
                tree[root].record_type
            )));
        }

        let dgg_node = tree
            .find_child(root, EscherRecordType::Dgg)
            .ok_or_else(|| DrawingError::corrupt("drawing group without a Dgg atom"))?;
        let NodePayload::Dgg(dgg) = &tree[dgg_node].payload else {
            return Err(DrawingError::corrupt("Dgg record with a foreign payload"));
        };

        let mut blips = Vec::new();
        if let Some(store) = tree.find_child(root, EscherRecordType::BStoreContainer) {
            for &child in tree[store].children() {
                match &tree[child].payload {
                    NodePayload::Bse(entry) => blips.push(entry.clone()),
                    // a store may hold bare blip records with no Bse wrapper
                    NodePayload::Opaque(data) => blips.push(synthetic_bse(&tree[child], data)),
                    other => {
                        return Err(DrawingError::corrupt(format!(
                            "blip store entry with payload {other:?}"
                        )))
                    }
                }
            }
        }

        let drawing_opts = match tree.find_child(root, EscherRecordType::Opt) {
            Some(node) => match &tree[node].payload {
                NodePayload::Opt(props) => props.clone(),
                _ => ShapeProperties::new(),
            },
            None => ShapeProperties::new(),
        };

        let split_menu = tree
            .find_child(root, EscherRecordType::SplitMenuColors)
            .and_then(|node| match &tree[node].payload {
                NodePayload::Opaque(data) => Some(data.clone()),
                _ => None,
            });

        let mut live_drawings: Vec<u16> = dgg
            .clusters
            .iter()
            .filter(|c| c.dgid != 0)
            .map(|c| c.dgid as u16)
            .collect();
        live_drawings.sort_unstable();
        live_drawings.dedup();

        Ok(Self {
            dgg: dgg.clone(),
            live_drawings,
            blips,
            drawing_opts,
            split_menu,
        })
    }
}

/// 16-byte content hash identifying a picture for deduplication.
fn picture_uid(data: &[u8]) -> [u8; 16] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut uid = [0u8; 16];
    uid.copy_from_slice(&digest[..16]);
    uid
}

/// Wrap a bare blip record in a store entry so it survives a round trip.
fn synthetic_bse(node: &EscherNode, data: &Bytes) -> BlipStoreEntry {
    let bt = match node.record_type {
        EscherRecordType::BlipEmf => 2,
        EscherRecordType::BlipWmf => 3,
        EscherRecordType::BlipPict => 4,
        EscherRecordType::BlipJpeg => 5,
        EscherRecordType::BlipPng => 6,
        EscherRecordType::BlipDib => 7,
        _ => 17,
    };
    let mut uid = [0u8; 16];
    let span = uid.len().min(data.len());
    uid[..span].copy_from_slice(&data[..span]);
    let mut blip = RawRecordHeader::new(
        node.version,
        node.instance,
        node.record_type.into(),
        data.len() as u32,
    )
    .as_bytes()
    .to_vec();
    blip.extend_from_slice(data);
    BlipStoreEntry {
        bt_win32: bt,
        bt_mac: bt,
        rgb_uid: uid,
        tag: 0xFF,
        size: blip.len() as u32,
        c_ref: 1,
        fo_delay: 0,
        usage: 0,
        cb_name: 0,
        blip: Bytes::from(blip),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{SliceSource, VecSink};

    #[test]
    fn test_shape_ids_come_in_clusters_of_1024() {
        let mut group = DrawingGroup::new();
        let dgid = group.register_drawing();
        assert_eq!(dgid, 1);
        assert_eq!(group.allocate_shape_id(dgid), 1024);
        assert_eq!(group.allocate_shape_id(dgid), 1025);
        assert_eq!(group.dgg().spid_max, 1026);
        assert_eq!(group.dgg().csp_saved, 2);
        assert_eq!(group.dgg().clusters.len(), 1);
    }

    #[test]
    fn test_second_drawing_gets_its_own_cluster() {
        let mut group = DrawingGroup::new();
        let first = group.register_drawing();
        let second = group.register_drawing();
        assert_eq!((first, second), (1, 2));
        assert_eq!(group.allocate_shape_id(first), 1024);
        assert_eq!(group.allocate_shape_id(second), 2048);
        assert_eq!(group.allocate_shape_id(first), 1025);
        assert_eq!(group.drawing_count(), 2);
    }

    #[test]
    fn test_full_cluster_rolls_over() {
        let mut group = DrawingGroup::new();
        let dgid = group.register_drawing();
        for _ in 0..1024 {
            group.allocate_shape_id(dgid);
        }
        assert_eq!(group.allocate_shape_id(dgid), 2048);
        assert_eq!(group.dgg().clusters.len(), 2);
    }

    #[test]
    fn test_release_keeps_other_drawings_ids_stable() {
        let mut group = DrawingGroup::new();
        let first = group.register_drawing();
        let second = group.register_drawing();
        group.allocate_shape_id(first);
        group.allocate_shape_id(second);

        group.note_shape_removed();
        group.release_drawing(first);
        assert_eq!(group.drawing_count(), 1);
        // cluster 1 is cleared, not removed: drawing 2 keeps block 2048
        assert_eq!(group.dgg().clusters.len(), 2);
        assert_eq!(group.allocate_shape_id(second), 2049);

        // a fresh drawing reuses the cleared slot
        let third = group.register_drawing();
        assert_eq!(third, 1);
        assert_eq!(group.allocate_shape_id(third), 1024);
    }

    #[test]
    fn test_release_last_drawing_drops_tail_cluster() {
        let mut group = DrawingGroup::new();
        let dgid = group.register_drawing();
        group.allocate_shape_id(dgid);
        group.note_shape_removed();
        group.release_drawing(dgid);
        assert_eq!(group.drawing_count(), 0);
        assert!(group.dgg().clusters.is_empty());
    }

    #[test]
    fn test_identical_pictures_share_one_entry() {
        let mut group = DrawingGroup::new();
        let image = vec![0x89, b'P', b'N', b'G', 1, 2, 3, 4];
        let first = group.add_picture(BlipKind::Png, &image);
        let second = group.add_picture(BlipKind::Png, &image);
        assert_eq!(first, 1);
        assert_eq!(second, 1);
        assert_eq!(group.blip_count(), 1);
        assert_eq!(group.blip(1).unwrap().c_ref, 2);

        group.release_picture(1);
        assert_eq!(group.blip(1).unwrap().c_ref, 1);
        assert_eq!(group.blip_count(), 1);
    }

    #[test]
    fn test_different_pictures_get_distinct_entries() {
        let mut group = DrawingGroup::new();
        let a = group.add_picture(BlipKind::Png, &[1, 2, 3]);
        let b = group.add_picture(BlipKind::Jpeg, &[4, 5, 6]);
        assert_eq!((a, b), (1, 2));
        assert_eq!(group.blip(2).unwrap().bt_win32, BlipKind::Jpeg.bt());
    }

    #[test]
    fn test_group_save_load_round_trip() {
        let mut group = DrawingGroup::new();
        let dgid = group.register_drawing();
        group.allocate_shape_id(dgid);
        group.add_picture(BlipKind::Png, &[9u8; 64]);

        let mut sink = VecSink::new();
        group.save(&mut sink).unwrap();
        let mut source = SliceSource::new(sink.into_bytes());
        let reloaded = DrawingGroup::load(&mut source).unwrap();

        assert_eq!(reloaded.dgg(), group.dgg());
        assert_eq!(reloaded.blip_count(), 1);
        assert_eq!(reloaded.blip(1).unwrap().rgb_uid, group.blip(1).unwrap().rgb_uid);

        let mut sink2 = VecSink::new();
        reloaded.save(&mut sink2).unwrap();
        let mut sink1 = VecSink::new();
        group.save(&mut sink1).unwrap();
        assert_eq!(sink1.as_slice(), sink2.as_slice());
    }
}
