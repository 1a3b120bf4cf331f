//! Turn-restriction output (`.osrm.restrictions`)
//!
//! `fingerprint · count: u32 · restriction × count`, the count patched
//! after streaming. Restrictions are 16 bytes
//! (`from · via · to · flags · pad[3]`).

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::Result;
use crate::formats::fingerprint::Fingerprint;
use crate::formats::reader::BinaryReader;
use crate::NodeId;

const FLAG_ONLY: u8 = 1 << 0;

/// Turn restriction with node ids already remapped to internal ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnRestriction {
    pub from: NodeId,
    pub via: NodeId,
    pub to: NodeId,
    pub is_only: bool,
}

impl TurnRestriction {
    fn encode(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[0..4].copy_from_slice(&self.from.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.via.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.to.to_le_bytes());
        bytes[12] = if self.is_only { FLAG_ONLY } else { 0 };
        bytes
    }

    fn decode(bytes: [u8; 16]) -> Self {
        TurnRestriction {
            from: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            via: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
            to: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
            is_only: bytes[12] & FLAG_ONLY != 0,
        }
    }
}

pub struct RestrictionsFile;

impl RestrictionsFile {
    /// Write the fully-valid triples; returns how many were written
    pub fn write<'a, P, I>(path: P, restrictions: I) -> Result<u32>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = &'a TurnRestriction>,
    {
        let mut writer = BufWriter::new(File::create(path)?);
        Fingerprint::valid().write_to(&mut writer)?;

        writer.flush()?;
        let count_position = writer.stream_position()?;
        writer.write_all(&0u32.to_le_bytes())?;

        let mut written = 0u32;
        for restriction in restrictions {
            writer.write_all(&restriction.encode())?;
            written += 1;
        }

        writer.seek(SeekFrom::Start(count_position))?;
        writer.write_all(&written.to_le_bytes())?;
        writer.flush()?;
        Ok(written)
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Vec<TurnRestriction>> {
        let mut reader = BinaryReader::new(File::open(path)?);
        Fingerprint::read_from(&mut reader, "restrictions")?;

        let count = reader.read_u32()?;
        let mut restrictions = Vec::with_capacity(count as usize);
        for _ in 0..count {
            restrictions.push(TurnRestriction::decode(reader.read_bytes()?));
        }
        Ok(restrictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_round_trip() {
        let file = NamedTempFile::new().unwrap();
        let restrictions = vec![
            TurnRestriction {
                from: 1,
                via: 2,
                to: 3,
                is_only: false,
            },
            TurnRestriction {
                from: 7,
                via: 8,
                to: 9,
                is_only: true,
            },
        ];

        let written = RestrictionsFile::write(file.path(), &restrictions).unwrap();
        assert_eq!(written, 2);
        assert_eq!(RestrictionsFile::read(file.path()).unwrap(), restrictions);
    }
}
