//! Switchback: segmented contraction-hierarchy routing core
//!
//! Build side:
//! - Extraction: OSM nodes/ways/relations → node-based graph (`.osrm`),
//!   turn restrictions and street names, with per-edge city/country
//!   weighting decided by administrative density trees
//!
//! Query side:
//! - Sharded CH graph access: the contracted graph is partitioned by
//!   node id across `.hsgr` shards plus coordinates/geometry
//!   side-files, consulted lazily with positioned reads
//! - Shortcut unpacking: depth-first expansion of CH shortcut edges
//!   back into original-graph paths
//!
//! Downstream contraction and the query frontends live elsewhere; this
//! crate owns the data model, the file formats, and the two ends of the
//! pipeline around them.

pub mod boundary;
pub mod cli;
pub mod error;
pub mod extract;
pub mod formats;
pub mod geo;
pub mod graph;

pub use error::{Error, Result};

/// Internal node id; dense, assigned at extraction
pub type NodeId = u32;
/// Edge index within a shard
pub type EdgeId = u32;
/// Geometry id within the geometry side-files
pub type GeometryId = u32;

/// Sentinel for "no node"
pub const SPECIAL_NODEID: NodeId = u32::MAX;
/// Historical files also use the 31-bit all-ones value as a sentinel;
/// readers treat it as absent, writers never emit it
pub const LEGACY_SPECIAL_NODEID: NodeId = 0x7FFF_FFFF;
/// Sentinel for "no external node"
pub const SPECIAL_OSM_NODEID: u64 = u64::MAX;
/// Name id of the reserved empty name entry
pub const EMPTY_NAMEID: u32 = 0;

/// True for either node sentinel encoding
pub fn is_absent_node(node: NodeId) -> bool {
    node == SPECIAL_NODEID || node == LEGACY_SPECIAL_NODEID
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_sentinels_are_absent() {
        assert!(is_absent_node(SPECIAL_NODEID));
        assert!(is_absent_node(LEGACY_SPECIAL_NODEID));
        assert!(!is_absent_node(0));
        assert!(!is_absent_node(0x7FFF_FFFE));
    }
}
