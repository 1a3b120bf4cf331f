//! Geometry side-file
//!
//! `start: u32 · indices_count: u32`, then `indices_count` offsets into
//! the node pool, then the pool length, then the pool itself. The pool
//! length doubles as the closing offset of the last geometry, so the
//! offset pair for any resolvable id can be read with one 8-byte read.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::formats::reader::BinaryReader;
use crate::{GeometryId, NodeId};

const HEADER_BYTES: u64 = 8;

pub struct GeometryFile;

impl GeometryFile {
    /// Write a geometry shard; `geometries` holds the uncompressed node
    /// run of each geometry in file order.
    pub fn write<P: AsRef<Path>>(
        path: P,
        start: GeometryId,
        geometries: &[Vec<NodeId>],
    ) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&start.to_le_bytes())?;
        writer.write_all(&(geometries.len() as u32).to_le_bytes())?;

        let mut offset = 0u32;
        for geometry in geometries {
            writer.write_all(&offset.to_le_bytes())?;
            offset += geometry.len() as u32;
        }
        writer.write_all(&offset.to_le_bytes())?;

        for geometry in geometries {
            for node in geometry {
                writer.write_all(&node.to_le_bytes())?;
            }
        }
        writer.flush()?;
        Ok(())
    }
}

/// Lazily-read geometry shard
pub struct GeometryShard {
    reader: BinaryReader<File>,
    start: GeometryId,
    indices_count: u32,
    pool_offset: u64,
}

impl GeometryShard {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = BinaryReader::new(File::open(path)?);
        let start = reader.read_u32()?;
        let indices_count = reader.read_u32()?;
        let pool_offset = HEADER_BYTES + (indices_count as u64 + 1) * 4;
        Ok(Self {
            reader,
            start,
            indices_count,
            pool_offset,
        })
    }

    pub fn can_resolve(&self, geometry: GeometryId) -> bool {
        self.start <= geometry && geometry < self.start + self.indices_count
    }

    /// Node run of `geometry` in forward order, appended to `nodes`
    pub fn forward_geometry(&mut self, geometry: GeometryId, nodes: &mut Vec<NodeId>) -> Result<()> {
        debug_assert!(self.can_resolve(geometry));
        let local = (geometry - self.start) as u64;
        let pair_pos = HEADER_BYTES + local * 4;

        let read = |reader: &mut BinaryReader<File>,
                    pool_offset: u64,
                    nodes: &mut Vec<NodeId>|
         -> Result<()> {
            reader.seek_to(pair_pos)?;
            let begin = reader.read_u32()? as u64;
            let end = reader.read_u32()? as u64;

            reader.seek_to(pool_offset + begin * 4)?;
            for _ in begin..end {
                nodes.push(reader.read_u32()?);
            }
            Ok(())
        };

        let before = nodes.len();
        match read(&mut self.reader, self.pool_offset, nodes) {
            Ok(()) => Ok(()),
            Err(_) => {
                tracing::debug!(geometry, "resetting stale geometry stream");
                nodes.truncate(before);
                read(&mut self.reader, self.pool_offset, nodes)
            }
        }
    }

    /// Node run of `geometry` in reverse order
    pub fn reverse_geometry(&mut self, geometry: GeometryId, nodes: &mut Vec<NodeId>) -> Result<()> {
        let before = nodes.len();
        self.forward_geometry(geometry, nodes)?;
        nodes[before..].reverse();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn write_fixture() -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        let geometries = vec![vec![1, 2, 3], vec![], vec![7, 8]];
        GeometryFile::write(file.path(), 50, &geometries).unwrap();
        file
    }

    #[test]
    fn test_forward_and_reverse_lookup() {
        let file = write_fixture();
        let mut shard = GeometryShard::open(file.path()).unwrap();

        assert!(shard.can_resolve(50));
        assert!(shard.can_resolve(52));
        assert!(!shard.can_resolve(53));

        let mut nodes = Vec::new();
        shard.forward_geometry(50, &mut nodes).unwrap();
        assert_eq!(nodes, vec![1, 2, 3]);

        nodes.clear();
        shard.forward_geometry(51, &mut nodes).unwrap();
        assert!(nodes.is_empty());

        nodes.clear();
        shard.reverse_geometry(52, &mut nodes).unwrap();
        assert_eq!(nodes, vec![8, 7]);
    }

    #[test]
    fn test_last_geometry_closed_by_pool_length() {
        // Reading the final id exercises the pair whose second element
        // is the pool-length word.
        let file = write_fixture();
        let mut shard = GeometryShard::open(file.path()).unwrap();
        let mut nodes = Vec::new();
        shard.forward_geometry(52, &mut nodes).unwrap();
        assert_eq!(nodes, vec![7, 8]);
    }
}
