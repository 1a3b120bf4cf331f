//! Node-based graph output (`.osrm`)
//!
//! `fingerprint · max_internal_id: u32 · external nodes · edge count ·
//! edges`. The edge count is streamed as a placeholder and patched once
//! the true total is known. External nodes are 16 bytes
//! (`lon: i32 · lat: i32 · osm_id: u64`); edges are 20 bytes
//! (`source · target · name_id · weight: i32 · flags · pad[3]`).

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::formats::fingerprint::Fingerprint;
use crate::formats::reader::BinaryReader;
use crate::geo::FixedCoord;
use crate::NodeId;

const FLAG_FORWARD: u8 = 1 << 0;
const FLAG_BACKWARD: u8 = 1 << 1;
const FLAG_SPLIT: u8 = 1 << 2;

/// Node record carried through the external-memory pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalMemoryNode {
    pub coord: FixedCoord,
    pub osm_id: u64,
}

impl ExternalMemoryNode {
    fn encode(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[0..4].copy_from_slice(&self.coord.lon.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.coord.lat.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.osm_id.to_le_bytes());
        bytes
    }

    fn decode(bytes: [u8; 16]) -> Self {
        ExternalMemoryNode {
            coord: FixedCoord {
                lon: i32::from_le_bytes(bytes[0..4].try_into().unwrap()),
                lat: i32::from_le_bytes(bytes[4..8].try_into().unwrap()),
            },
            osm_id: u64::from_le_bytes(bytes[8..16].try_into().unwrap()),
        }
    }
}

/// One directed edge of the node-based graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeBasedEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub name_id: u32,
    pub weight: i32,
    pub forward: bool,
    pub backward: bool,
    pub is_split: bool,
}

impl NodeBasedEdge {
    fn encode(&self) -> [u8; 20] {
        let mut flags = 0u8;
        if self.forward {
            flags |= FLAG_FORWARD;
        }
        if self.backward {
            flags |= FLAG_BACKWARD;
        }
        if self.is_split {
            flags |= FLAG_SPLIT;
        }

        let mut bytes = [0u8; 20];
        bytes[0..4].copy_from_slice(&self.source.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.target.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.name_id.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.weight.to_le_bytes());
        bytes[16] = flags;
        bytes
    }

    fn decode(bytes: [u8; 20]) -> Self {
        let flags = bytes[16];
        NodeBasedEdge {
            source: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            target: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
            name_id: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
            weight: i32::from_le_bytes(bytes[12..16].try_into().unwrap()),
            forward: flags & FLAG_FORWARD != 0,
            backward: flags & FLAG_BACKWARD != 0,
            is_split: flags & FLAG_SPLIT != 0,
        }
    }
}

/// Streaming writer for the node-based graph file
pub struct NodeGraphWriter {
    writer: BufWriter<File>,
    edge_count_position: Option<u64>,
    edge_count: u64,
}

impl NodeGraphWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);
        Fingerprint::valid().write_to(&mut writer)?;
        Ok(Self {
            writer,
            edge_count_position: None,
            edge_count: 0,
        })
    }

    pub fn write_node_count(&mut self, max_internal_id: u32) -> Result<()> {
        self.writer.write_all(&max_internal_id.to_le_bytes())?;
        Ok(())
    }

    pub fn write_node(&mut self, node: &ExternalMemoryNode) -> Result<()> {
        self.writer.write_all(&node.encode())?;
        Ok(())
    }

    /// Reserve the edge-count word; the true count is patched in
    /// `finish`
    pub fn begin_edges(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.edge_count_position = Some(self.writer.stream_position()?);
        self.writer.write_all(&0u32.to_le_bytes())?;
        Ok(())
    }

    pub fn write_edge(&mut self, edge: &NodeBasedEdge) -> Result<()> {
        self.writer.write_all(&edge.encode())?;
        self.edge_count += 1;
        Ok(())
    }

    /// Patch the edge count and flush; call once, after the last edge
    pub fn finish(&mut self) -> Result<u64> {
        let position = self
            .edge_count_position
            .expect("begin_edges must run before finish");
        if self.edge_count > u32::MAX as u64 {
            return Err(Error::TooManyEdges(self.edge_count));
        }
        self.writer.flush()?;
        self.writer.seek(SeekFrom::Start(position))?;
        self.writer
            .write_all(&(self.edge_count as u32).to_le_bytes())?;
        self.writer.flush()?;
        Ok(self.edge_count)
    }
}

/// Fully-materialised node-based graph, for tooling and tests
pub struct NodeGraph {
    pub max_internal_id: u32,
    pub nodes: Vec<ExternalMemoryNode>,
    pub edges: Vec<NodeBasedEdge>,
}

impl NodeGraph {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = BinaryReader::new(File::open(path)?);
        Fingerprint::read_from(&mut reader, "node graph")?;

        let max_internal_id = reader.read_u32()?;
        let mut nodes = Vec::with_capacity(max_internal_id as usize);
        for _ in 0..max_internal_id {
            nodes.push(ExternalMemoryNode::decode(reader.read_bytes()?));
        }

        let edge_count = reader.read_u32()?;
        let mut edges = Vec::with_capacity(edge_count as usize);
        for _ in 0..edge_count {
            edges.push(NodeBasedEdge::decode(reader.read_bytes()?));
        }

        Ok(Self {
            max_internal_id,
            nodes,
            edges,
        })
    }
}
