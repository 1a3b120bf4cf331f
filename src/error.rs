//! Error types for the routing core
//!
//! Build-time failures abort the pipeline; query-time failures are
//! surfaced to the caller and never caught internally.

use std::fmt;

use crate::NodeId;

/// Main error type for switchback operations
#[derive(Debug)]
pub enum Error {
    /// File header magic mismatch
    CorruptHeader { context: &'static str, found: u32 },

    /// Outer-way magic mismatch inside a boundary stream
    CoordHeaderBad { found: u32 },

    /// Read/seek/open failure that survived the one-shot retry
    Io(std::io::Error),

    /// No shard owns the requested node
    NodeNotResolvable(NodeId),

    /// Shortcut unpacking could not locate an edge in either direction;
    /// typically indicates a missing shard
    SegmentationFailure { source: NodeId, target: NodeId },

    /// More usable nodes than a 32-bit id space can address
    TooManyNodes(u64),

    /// More surviving edges than a 32-bit count can address
    TooManyEdges(u64),

    /// Weight type was still INVALID when the weight formula ran
    InvalidWeight { segment: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CorruptHeader { context, found } => {
                write!(f, "{context} header was incorrect (read 0x{found:08X})")
            }
            Error::CoordHeaderBad { found } => {
                write!(f, "outer way header was incorrect (read 0x{found:08X})")
            }
            Error::Io(err) => {
                write!(f, "I/O error: {err}")
            }
            Error::NodeNotResolvable(node) => {
                write!(f, "no shard resolves node {node}")
            }
            Error::SegmentationFailure { source, target } => {
                write!(
                    f,
                    "no edge between {source} and {target} in either direction (missing shard?)"
                )
            }
            Error::TooManyNodes(count) => {
                write!(
                    f,
                    "too many nodes after filtering: {count} exceeds the 32-bit id space"
                )
            }
            Error::TooManyEdges(count) => {
                write!(f, "too many edges: {count} exceeds the 32-bit count")
            }
            Error::InvalidWeight { segment } => {
                write!(f, "encountered invalid weight at segment {segment}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

/// Convenience result type for switchback operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = Error::CorruptHeader {
            context: "boundary",
            found: 0xDEADBEEF,
        };
        assert!(err.to_string().contains("boundary"));
        assert!(err.to_string().contains("DEADBEEF"));
    }

    #[test]
    fn test_io_error_source() {
        use std::error::Error as _;
        let err = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert!(err.source().is_some());
    }
}
