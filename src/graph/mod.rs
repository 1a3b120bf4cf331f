//! Sharded CH graph facade
//!
//! The contracted graph is partitioned by node id across `.hsgr`
//! shards, each with matching coordinates and geometry side-files.
//! Lookups are dispatched to the first shard whose ownership window
//! matches. A facade owns its file handles outright; instances are
//! single-threaded, one per query context.

pub mod unpack;

pub use unpack::unpack_ch_path;

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::formats::{CoordinatesShard, GeometryShard, HsgrShard, ShardEdge};
use crate::geo::FixedCoord;
use crate::{is_absent_node, GeometryId, NodeId};

/// Data files making up one sharded graph
#[derive(Debug, Clone, Default)]
pub struct GraphPaths {
    pub hsgr: Vec<PathBuf>,
    pub coordinates: Vec<PathBuf>,
    pub geometries: Vec<PathBuf>,
}

pub struct ShardedGraph {
    shards: Vec<HsgrShard>,
    coordinates: Vec<CoordinatesShard>,
    geometries: Vec<GeometryShard>,
}

impl ShardedGraph {
    /// Open every shard. A shard that fails to open is skipped along
    /// with the coordinates and geometry files sharing its path stem,
    /// so a damaged segment degrades into `NodeNotResolvable` lookups
    /// instead of poisoning the whole graph.
    pub fn open(paths: &GraphPaths) -> Self {
        let mut coordinate_paths: Vec<&PathBuf> = paths.coordinates.iter().collect();
        let mut geometry_paths: Vec<&PathBuf> = paths.geometries.iter().collect();

        let mut shards = Vec::with_capacity(paths.hsgr.len());
        for path in &paths.hsgr {
            match HsgrShard::open(path) {
                Ok(shard) => shards.push(shard),
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "failed to open graph shard");

                    let path_str = path.to_string_lossy();
                    match path_str.strip_suffix("hsgr") {
                        Some(stem) => {
                            coordinate_paths.retain(|p| {
                                let keep = !p.to_string_lossy().starts_with(stem);
                                if !keep {
                                    tracing::warn!(path = %p.display(), "dropping coordinates of failed shard");
                                }
                                keep
                            });
                            geometry_paths.retain(|p| {
                                let keep = !p.to_string_lossy().starts_with(stem);
                                if !keep {
                                    tracing::warn!(path = %p.display(), "dropping geometries of failed shard");
                                }
                                keep
                            });
                        }
                        None => {
                            tracing::warn!(
                                path = %path.display(),
                                "extension is not 'hsgr', cannot match side-files to drop"
                            );
                        }
                    }
                }
            }
        }

        let mut coordinates = Vec::with_capacity(coordinate_paths.len());
        for path in coordinate_paths {
            match CoordinatesShard::open(path) {
                Ok(shard) => coordinates.push(shard),
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "failed to open coordinates file");
                }
            }
        }

        let mut geometries = Vec::with_capacity(geometry_paths.len());
        for path in geometry_paths {
            match GeometryShard::open(path) {
                Ok(shard) => geometries.push(shard),
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "failed to open geometry file");
                }
            }
        }

        Self {
            shards,
            coordinates,
            geometries,
        }
    }

    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    fn shard_for_node(&mut self, node: NodeId) -> Option<&mut HsgrShard> {
        self.shards.iter_mut().find(|shard| shard.owns(node))
    }

    /// Live adjacency of `node`, materialised into `edges`. Unknown or
    /// sentinel nodes contribute nothing.
    pub fn adjacent_edges(&mut self, node: NodeId, edges: &mut Vec<ShardEdge>) -> Result<()> {
        if is_absent_node(node) {
            return Ok(());
        }
        match self.shard_for_node(node) {
            Some(shard) => shard.adjacent_edges(node, edges),
            None => Ok(()),
        }
    }

    /// Smallest forward edge `from → to`, if the owning shard has one
    pub fn find_smallest_forward_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
    ) -> Result<Option<ShardEdge>> {
        if is_absent_node(from) {
            return Ok(None);
        }
        match self.shard_for_node(from) {
            Some(shard) => shard.find_smallest_forward(from, to),
            None => Ok(None),
        }
    }

    /// Smallest backward edge `from → to`, if the owning shard has one
    pub fn find_smallest_backward_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
    ) -> Result<Option<ShardEdge>> {
        if is_absent_node(from) {
            return Ok(None);
        }
        match self.shard_for_node(from) {
            Some(shard) => shard.find_smallest_backward(from, to),
            None => Ok(None),
        }
    }

    /// Fixed-point coordinate of `node`
    pub fn coordinate_of_node(&mut self, node: NodeId) -> Result<FixedCoord> {
        for file in &mut self.coordinates {
            if file.can_resolve(node) {
                return file.coordinate(node);
            }
        }
        Err(Error::NodeNotResolvable(node))
    }

    /// Uncompressed forward geometry of `geometry`; empty when no
    /// shard resolves the id
    pub fn forward_geometry(&mut self, geometry: GeometryId) -> Result<Vec<NodeId>> {
        let mut nodes = Vec::new();
        for file in &mut self.geometries {
            if file.can_resolve(geometry) {
                file.forward_geometry(geometry, &mut nodes)?;
                break;
            }
        }
        Ok(nodes)
    }

    /// Uncompressed reverse geometry of `geometry`; empty when no
    /// shard resolves the id
    pub fn reverse_geometry(&mut self, geometry: GeometryId) -> Result<Vec<NodeId>> {
        let mut nodes = Vec::new();
        for file in &mut self.geometries {
            if file.can_resolve(geometry) {
                file.reverse_geometry(geometry, &mut nodes)?;
                break;
            }
        }
        Ok(nodes)
    }
}
