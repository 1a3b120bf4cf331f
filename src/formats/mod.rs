//! Binary file formats of the routing core

pub mod coordinates;
pub mod fingerprint;
pub mod geometry;
pub mod hsgr;
pub mod names;
pub mod node_graph;
pub mod reader;
pub mod restrictions;

pub use coordinates::{CoordinatesFile, CoordinatesShard};
pub use fingerprint::Fingerprint;
pub use geometry::{GeometryFile, GeometryShard};
pub use hsgr::{EdgePayload, HsgrFile, HsgrShard, ShardEdge, MAX_EDGE_WEIGHT};
pub use names::{NameTable, NamesFile};
pub use node_graph::{ExternalMemoryNode, NodeBasedEdge, NodeGraph, NodeGraphWriter};
pub use reader::BinaryReader;
pub use restrictions::{RestrictionsFile, TurnRestriction};
