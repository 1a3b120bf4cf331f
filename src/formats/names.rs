//! Street-name index (`.osrm.names`)
//!
//! The extractor accumulates one char pool plus cumulative offsets, the
//! last offset being a sentinel equal to the pool length. On write the
//! offsets are converted in place to lengths, the sentinel is dropped,
//! and the file becomes `count: u32 · length × count · pool_len: u32 ·
//! pool bytes`, with the pool streamed in fixed-size blocks.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::formats::reader::BinaryReader;

const WRITE_BLOCK_BUFFER_SIZE: usize = 8000;

/// Convert cumulative offsets to lengths in place and drop the
/// sentinel; returns the total pool length the sentinel carried.
pub fn offsets_to_lengths(offsets: &mut Vec<u32>) -> u32 {
    debug_assert!(!offsets.is_empty());
    for i in 0..offsets.len() - 1 {
        offsets[i] = offsets[i + 1] - offsets[i];
    }
    offsets.pop().unwrap_or(0)
}

pub struct NamesFile;

impl NamesFile {
    /// Serialise the name table. `offsets` is consumed in its raw
    /// cumulative form, sentinel included.
    pub fn write<P: AsRef<Path>>(path: P, mut offsets: Vec<u32>, chars: &[u8]) -> Result<()> {
        let total_length = offsets_to_lengths(&mut offsets);
        debug_assert_eq!(total_length as usize, chars.len());

        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&(offsets.len() as u32).to_le_bytes())?;
        for &length in &offsets {
            writer.write_all(&length.to_le_bytes())?;
        }
        writer.write_all(&total_length.to_le_bytes())?;

        for block in chars.chunks(WRITE_BLOCK_BUFFER_SIZE) {
            writer.write_all(block)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<NameTable> {
        let mut reader = BinaryReader::new(File::open(path)?);
        let count = reader.read_u32()?;
        let mut lengths = Vec::with_capacity(count as usize);
        for _ in 0..count {
            lengths.push(reader.read_u32()?);
        }
        let total_length = reader.read_u32()?;
        let mut chars = vec![0u8; total_length as usize];
        reader.read_into(&mut chars)?;
        Ok(NameTable { lengths, chars })
    }
}

/// In-memory name table, for tooling and tests
pub struct NameTable {
    lengths: Vec<u32>,
    chars: Vec<u8>,
}

impl NameTable {
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        let mut begin = 0usize;
        for (i, &length) in self.lengths.iter().enumerate() {
            if i as u32 == id {
                return std::str::from_utf8(&self.chars[begin..begin + length as usize]).ok();
            }
            begin += length as usize;
        }
        None
    }
}
