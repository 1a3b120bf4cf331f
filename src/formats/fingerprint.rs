//! Data-file fingerprint block
//!
//! Every artifact starts with the same 8 bytes: four magic bytes, the
//! toolchain version triple, and a CRC-8 over the preceding seven bytes.
//! Readers accept any fingerprint whose checksum validates, so data
//! produced by a newer toolchain still opens.

use std::io::{Read, Seek, Write};

use crc::{Crc, CRC_8_SMBUS};

use crate::error::{Error, Result};
use crate::formats::reader::BinaryReader;

const MAGIC: [u8; 4] = *b"SWBK";

const MAJOR_VERSION: u8 = 1;
const MINOR_VERSION: u8 = 0;
const PATCH_VERSION: u8 = 0;

/// CRC-8 algorithm used for the fingerprint checksum
const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// 8-byte fingerprint prefixed to every data file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    magic: [u8; 4],
    major: u8,
    minor: u8,
    patch: u8,
    checksum: u8,
}

impl Fingerprint {
    /// Fingerprint of the running toolchain
    pub fn valid() -> Self {
        let mut fp = Fingerprint {
            magic: MAGIC,
            major: MAJOR_VERSION,
            minor: MINOR_VERSION,
            patch: PATCH_VERSION,
            checksum: 0,
        };
        fp.checksum = fp.compute_checksum();
        fp
    }

    fn compute_checksum(&self) -> u8 {
        CRC8.checksum(&self.leading_bytes())
    }

    fn leading_bytes(&self) -> [u8; 7] {
        [
            self.magic[0],
            self.magic[1],
            self.magic[2],
            self.magic[3],
            self.major,
            self.minor,
            self.patch,
        ]
    }

    pub fn is_valid(&self) -> bool {
        self.checksum == self.compute_checksum()
    }

    pub fn version(&self) -> (u8, u8, u8) {
        (self.major, self.minor, self.patch)
    }

    pub fn to_bytes(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[..7].copy_from_slice(&self.leading_bytes());
        bytes[7] = self.checksum;
        bytes
    }

    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Fingerprint {
            magic: [bytes[0], bytes[1], bytes[2], bytes[3]],
            major: bytes[4],
            minor: bytes[5],
            patch: bytes[6],
            checksum: bytes[7],
        }
    }

    /// Write the fingerprint block
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.to_bytes())
    }

    /// Read a fingerprint and fail with `CorruptHeader` if its checksum
    /// does not validate
    pub fn read_from<R: Read + Seek>(
        reader: &mut BinaryReader<R>,
        context: &'static str,
    ) -> Result<Self> {
        let bytes = reader.read_bytes::<8>()?;
        let fp = Fingerprint::from_bytes(bytes);
        if !fp.is_valid() {
            return Err(Error::CorruptHeader {
                context,
                found: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            });
        }
        Ok(fp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_fingerprint_round_trip() {
        let fp = Fingerprint::valid();
        assert!(fp.is_valid());
        let decoded = Fingerprint::from_bytes(fp.to_bytes());
        assert_eq!(decoded, fp);
        assert!(decoded.is_valid());
    }

    #[test]
    fn test_checksum_detects_single_bit_flips() {
        let fp = Fingerprint::valid();
        let bytes = fp.to_bytes();
        for byte in 0..7 {
            for bit in 0..8 {
                let mut corrupted = bytes;
                corrupted[byte] ^= 1 << bit;
                assert!(
                    !Fingerprint::from_bytes(corrupted).is_valid(),
                    "flip of byte {byte} bit {bit} went undetected"
                );
            }
        }
    }

    #[test]
    fn test_checksum_is_a_function_of_leading_bytes() {
        // Same leading 7 bytes must always produce the same 8th
        let a = Fingerprint::valid();
        let b = Fingerprint::valid();
        assert_eq!(a.to_bytes()[7], b.to_bytes()[7]);
    }

    #[test]
    fn test_foreign_version_accepted_when_checksum_holds() {
        let mut fp = Fingerprint::valid();
        fp.major = 9;
        fp.checksum = fp.compute_checksum();
        assert!(fp.is_valid());
        assert_eq!(fp.version().0, 9);
    }
}
