//! CH graph shard (`.hsgr`)
//!
//! Layout: fingerprint, `checksum: u32`, `node_start: u32`,
//! `num_nodes: u32`, `num_edges: u32`, node table, edge table. The node
//! table holds `num_nodes + 1` first-edge entries; the final entry is a
//! sentinel closing the last node's edge range. Edge entries are 12
//! bytes: `target: u32`, a packed word with the weight in bits 0..=28
//! and the shortcut/forward/backward flags in bits 29..=31, and the
//! payload word (middle node for shortcuts, geometry id otherwise).
//!
//! Shards are consulted lazily: opening one reads the header only, and
//! every node or edge access is an absolute-positioned read.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::Path;

use crate::error::{Error, Result};
use crate::formats::fingerprint::Fingerprint;
use crate::formats::reader::BinaryReader;
use crate::{is_absent_node, EdgeId, GeometryId, NodeId, SPECIAL_NODEID};

const HEADER_BYTES: u64 = 8 + 4 * 4;
const NODE_ENTRY_BYTES: u64 = 4;
const EDGE_ENTRY_BYTES: u64 = 12;

const WEIGHT_BITS: u32 = 29;
/// Largest weight the packed edge word can carry
pub const MAX_EDGE_WEIGHT: u32 = (1 << WEIGHT_BITS) - 1;

const SHORTCUT_BIT: u32 = 1 << 29;
const FORWARD_BIT: u32 = 1 << 30;
const BACKWARD_BIT: u32 = 1 << 31;

/// Payload word of a CH edge, selected by the shortcut flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgePayload {
    /// Middle node of a shortcut; `None` when the stored id is a
    /// sentinel and the shortcut is to be treated as absent
    Middle(Option<NodeId>),
    /// Geometry id of an original edge
    Geometry(GeometryId),
}

/// One edge record of a CH shard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardEdge {
    pub target: NodeId,
    pub weight: u32,
    pub forward: bool,
    pub backward: bool,
    pub payload: EdgePayload,
}

impl ShardEdge {
    pub fn is_shortcut(&self) -> bool {
        matches!(self.payload, EdgePayload::Middle(_))
    }

    /// Middle node, if this is a live shortcut
    pub fn middle_node(&self) -> Option<NodeId> {
        match self.payload {
            EdgePayload::Middle(middle) => middle,
            EdgePayload::Geometry(_) => None,
        }
    }

    /// An entry that must be skipped when materialising adjacency:
    /// sentinel target, or a shortcut whose middle node was voided
    pub fn is_absent(&self) -> bool {
        is_absent_node(self.target) || matches!(self.payload, EdgePayload::Middle(None))
    }

    pub fn encode(&self) -> [u8; 12] {
        let mut packed = self.weight.min(MAX_EDGE_WEIGHT);
        if self.forward {
            packed |= FORWARD_BIT;
        }
        if self.backward {
            packed |= BACKWARD_BIT;
        }
        let payload = match self.payload {
            EdgePayload::Middle(middle) => {
                packed |= SHORTCUT_BIT;
                middle.unwrap_or(SPECIAL_NODEID)
            }
            EdgePayload::Geometry(geometry) => geometry,
        };

        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&self.target.to_le_bytes());
        bytes[4..8].copy_from_slice(&packed.to_le_bytes());
        bytes[8..12].copy_from_slice(&payload.to_le_bytes());
        bytes
    }

    pub fn decode(bytes: [u8; 12]) -> Self {
        let target = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let packed = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let payload_word = u32::from_le_bytes(bytes[8..12].try_into().unwrap());

        let payload = if packed & SHORTCUT_BIT != 0 {
            if is_absent_node(payload_word) {
                EdgePayload::Middle(None)
            } else {
                EdgePayload::Middle(Some(payload_word))
            }
        } else {
            EdgePayload::Geometry(payload_word)
        };

        ShardEdge {
            target,
            weight: packed & MAX_EDGE_WEIGHT,
            forward: packed & FORWARD_BIT != 0,
            backward: packed & BACKWARD_BIT != 0,
            payload,
        }
    }
}

pub struct HsgrFile;

impl HsgrFile {
    /// Write a shard. `node_first_edge` holds one entry per node; the
    /// closing sentinel is appended here.
    pub fn write<P: AsRef<Path>>(
        path: P,
        checksum: u32,
        node_start: NodeId,
        node_first_edge: &[EdgeId],
        edges: &[ShardEdge],
    ) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);

        Fingerprint::valid().write_to(&mut writer)?;
        writer.write_all(&checksum.to_le_bytes())?;
        writer.write_all(&node_start.to_le_bytes())?;
        writer.write_all(&(node_first_edge.len() as u32).to_le_bytes())?;
        writer.write_all(&(edges.len() as u32).to_le_bytes())?;

        for &first_edge in node_first_edge {
            writer.write_all(&first_edge.to_le_bytes())?;
        }
        writer.write_all(&(edges.len() as u32).to_le_bytes())?;

        for edge in edges {
            writer.write_all(&edge.encode())?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Lazily-read CH shard
pub struct HsgrShard {
    reader: BinaryReader<File>,
    checksum: u32,
    node_start: NodeId,
    num_nodes: u32,
    num_edges: u32,
    node_table_offset: u64,
    edge_table_offset: u64,
}

impl HsgrShard {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = BinaryReader::new(File::open(path)?);

        Fingerprint::read_from(&mut reader, "graph shard")?;
        let checksum = reader.read_u32()?;
        let node_start = reader.read_u32()?;
        let num_nodes = reader.read_u32()?;
        let num_edges = reader.read_u32()?;

        let node_table_offset = HEADER_BYTES;
        let edge_table_offset =
            node_table_offset + (num_nodes as u64 + 1) * NODE_ENTRY_BYTES;
        let expected_len = edge_table_offset + num_edges as u64 * EDGE_ENTRY_BYTES;

        let actual_len = reader.len()?;
        if actual_len != expected_len {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("shard length {actual_len} does not match header ({expected_len})"),
            )));
        }

        Ok(Self {
            reader,
            checksum,
            node_start,
            num_nodes,
            num_edges,
            node_table_offset,
            edge_table_offset,
        })
    }

    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn num_edges(&self) -> u32 {
        self.num_edges
    }

    /// Node-id range this shard owns
    pub fn range_of_graph(&self) -> Range<NodeId> {
        self.node_start..self.node_start + self.num_nodes
    }

    pub fn owns(&self, node: NodeId) -> bool {
        self.node_start <= node && node < self.node_start + self.num_nodes
    }

    /// Seek + read with one retry; a failed first attempt leaves the
    /// stream position unspecified, so the retry re-seeks from scratch.
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<()> {
        let first = self
            .reader
            .seek_to(pos)
            .and_then(|_| self.reader.read_into(buf));
        match first {
            Ok(()) => Ok(()),
            Err(_) => {
                tracing::debug!(pos, "resetting stale shard stream");
                self.reader.seek_to(pos)?;
                self.reader.read_into(buf)
            }
        }
    }

    /// Edge-id range adjacent to `node`
    pub fn adjacent_range(&mut self, node: NodeId) -> Result<Range<EdgeId>> {
        debug_assert!(self.owns(node));
        let local = (node - self.node_start) as u64;
        let mut buf = [0u8; 8];
        self.read_at(self.node_table_offset + local * NODE_ENTRY_BYTES, &mut buf)?;
        let first = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let last = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        Ok(first..last)
    }

    pub fn edge(&mut self, edge: EdgeId) -> Result<ShardEdge> {
        let mut buf = [0u8; 12];
        self.read_at(self.edge_table_offset + edge as u64 * EDGE_ENTRY_BYTES, &mut buf)?;
        Ok(ShardEdge::decode(buf))
    }

    /// Materialise the live adjacency of `node` into `edges`
    pub fn adjacent_edges(&mut self, node: NodeId, edges: &mut Vec<ShardEdge>) -> Result<()> {
        if is_absent_node(node) {
            return Ok(());
        }
        for edge_id in self.adjacent_range(node)? {
            let edge = self.edge(edge_id)?;
            if edge.is_absent() {
                continue;
            }
            edges.push(edge);
        }
        Ok(())
    }

    /// Smallest-weight forward edge `from → to`, ties kept first-seen
    pub fn find_smallest_forward(&mut self, from: NodeId, to: NodeId) -> Result<Option<ShardEdge>> {
        self.find_smallest(from, to, |edge| edge.forward)
    }

    /// Smallest-weight backward edge `from → to`, ties kept first-seen
    pub fn find_smallest_backward(&mut self, from: NodeId, to: NodeId) -> Result<Option<ShardEdge>> {
        self.find_smallest(from, to, |edge| edge.backward)
    }

    fn find_smallest(
        &mut self,
        from: NodeId,
        to: NodeId,
        direction: impl Fn(&ShardEdge) -> bool,
    ) -> Result<Option<ShardEdge>> {
        let mut edges = Vec::new();
        self.adjacent_edges(from, &mut edges)?;

        let mut smallest: Option<ShardEdge> = None;
        for edge in edges {
            if edge.target != to || !direction(&edge) {
                continue;
            }
            if smallest.map_or(true, |found| edge.weight < found.weight) {
                smallest = Some(edge);
            }
        }
        Ok(smallest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LEGACY_SPECIAL_NODEID;
    use tempfile::NamedTempFile;

    fn original(target: NodeId, weight: u32, forward: bool, backward: bool) -> ShardEdge {
        ShardEdge {
            target,
            weight,
            forward,
            backward,
            payload: EdgePayload::Geometry(0),
        }
    }

    /// Nodes {10, 11, 12}: 10→11 (w=5, fwd), 10→12 (w=9, fwd),
    /// 11→10 (w=3, bwd); node 12 has no outgoing edges.
    fn write_fixture() -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        let edges = vec![
            original(11, 5, true, false),
            original(12, 9, true, false),
            original(10, 3, false, true),
        ];
        HsgrFile::write(file.path(), 0xC0FFEE, 10, &[0, 2, 3], &edges).unwrap();
        file
    }

    #[test]
    fn test_edge_codec_round_trip() {
        let edge = ShardEdge {
            target: 42,
            weight: 123_456,
            forward: true,
            backward: false,
            payload: EdgePayload::Middle(Some(7)),
        };
        assert_eq!(ShardEdge::decode(edge.encode()), edge);

        let bytes = edge.encode();
        let packed = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        assert_eq!(packed & MAX_EDGE_WEIGHT, 123_456);
        assert_ne!(packed & SHORTCUT_BIT, 0);
        assert_ne!(packed & FORWARD_BIT, 0);
        assert_eq!(packed & BACKWARD_BIT, 0);
    }

    #[test]
    fn test_legacy_middle_sentinel_reads_as_absent() {
        let edge = ShardEdge {
            target: 42,
            weight: 1,
            forward: true,
            backward: false,
            payload: EdgePayload::Middle(Some(LEGACY_SPECIAL_NODEID)),
        };
        let decoded = ShardEdge::decode(edge.encode());
        assert_eq!(decoded.payload, EdgePayload::Middle(None));
        assert!(decoded.is_absent());
    }

    #[test]
    fn test_header_and_ranges() {
        let file = write_fixture();
        let mut shard = HsgrShard::open(file.path()).unwrap();

        assert_eq!(shard.checksum(), 0xC0FFEE);
        assert_eq!(shard.range_of_graph(), 10..13);
        assert!(shard.owns(10));
        assert!(shard.owns(12));
        assert!(!shard.owns(13));
        assert!(!shard.owns(9));

        assert_eq!(shard.adjacent_range(10).unwrap(), 0..2);
        assert_eq!(shard.adjacent_range(11).unwrap(), 2..3);
        // The sentinel closes the last node's range
        assert_eq!(shard.adjacent_range(12).unwrap(), 3..3);
    }

    #[test]
    fn test_find_smallest_directional() {
        let file = write_fixture();
        let mut shard = HsgrShard::open(file.path()).unwrap();

        let forward = shard.find_smallest_forward(10, 11).unwrap().unwrap();
        assert_eq!(forward.weight, 5);

        let backward = shard.find_smallest_backward(11, 10).unwrap().unwrap();
        assert_eq!(backward.weight, 3);

        // The 11→10 edge is backward-only
        assert!(shard.find_smallest_forward(11, 10).unwrap().is_none());
    }

    #[test]
    fn test_adjacent_edges_filters_voided_shortcuts() {
        let file = NamedTempFile::new().unwrap();
        let edges = vec![
            original(1, 4, true, false),
            ShardEdge {
                target: 2,
                weight: 9,
                forward: true,
                backward: false,
                payload: EdgePayload::Middle(None),
            },
            ShardEdge {
                target: SPECIAL_NODEID,
                weight: 2,
                forward: true,
                backward: false,
                payload: EdgePayload::Geometry(0),
            },
        ];
        HsgrFile::write(file.path(), 0, 0, &[0], &edges).unwrap();

        let mut shard = HsgrShard::open(file.path()).unwrap();
        let mut live = Vec::new();
        shard.adjacent_edges(0, &mut live).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].target, 1);
    }

    #[test]
    fn test_truncated_shard_is_rejected() {
        let file = write_fixture();
        let data = std::fs::read(file.path()).unwrap();
        let truncated = NamedTempFile::new().unwrap();
        std::fs::write(truncated.path(), &data[..data.len() - 4]).unwrap();

        assert!(HsgrShard::open(truncated.path()).is_err());
    }
}
