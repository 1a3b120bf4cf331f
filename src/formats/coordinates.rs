//! Coordinates side-file
//!
//! `start: u32 · count: u32` followed by `count` fixed-point lon/lat
//! pairs. A shard resolves node `n` iff `start <= n < start + count`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::formats::reader::BinaryReader;
use crate::geo::FixedCoord;
use crate::NodeId;

const HEADER_BYTES: u64 = 8;
const COORD_BYTES: u64 = 8;

pub struct CoordinatesFile;

impl CoordinatesFile {
    pub fn write<P: AsRef<Path>>(path: P, start: NodeId, coords: &[FixedCoord]) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&start.to_le_bytes())?;
        writer.write_all(&(coords.len() as u32).to_le_bytes())?;
        for coord in coords {
            writer.write_all(&coord.lon.to_le_bytes())?;
            writer.write_all(&coord.lat.to_le_bytes())?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Lazily-read coordinates shard
pub struct CoordinatesShard {
    reader: BinaryReader<File>,
    start: NodeId,
    count: u32,
}

impl CoordinatesShard {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = BinaryReader::new(File::open(path)?);
        let start = reader.read_u32()?;
        let count = reader.read_u32()?;
        Ok(Self { reader, start, count })
    }

    pub fn can_resolve(&self, node: NodeId) -> bool {
        self.start <= node && node < self.start + self.count
    }

    pub fn coordinate(&mut self, node: NodeId) -> Result<FixedCoord> {
        debug_assert!(self.can_resolve(node));
        let local = (node - self.start) as u64;
        let pos = HEADER_BYTES + local * COORD_BYTES;

        let read = |reader: &mut BinaryReader<File>| -> Result<FixedCoord> {
            reader.seek_to(pos)?;
            let lon = reader.read_i32()?;
            let lat = reader.read_i32()?;
            Ok(FixedCoord { lon, lat })
        };
        match read(&mut self.reader) {
            Ok(coord) => Ok(coord),
            Err(_) => {
                tracing::debug!(node, "resetting stale coordinates stream");
                read(&mut self.reader)
            }
        }
    }
}
