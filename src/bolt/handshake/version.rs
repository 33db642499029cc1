//! Bolt protocol version definitions.

use std::fmt;

/// Bolt protocol versions this crate speaks.
///
/// Versions travel as 4-byte big-endian integers in the handshake. The
/// value 0 is reserved: in a proposal slot it means "unused", in the
/// server's reply it means "none of the proposals".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum BoltVersion {
    /// Bolt 1 (INIT / RUN / PULL_ALL message set)
    V1 = 1,
}

impl BoltVersion {
    /// All supported versions in order of preference (newest first).
    pub const ALL: [BoltVersion; 1] = [BoltVersion::V1];

    /// Create a BoltVersion from a raw u32 value.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(BoltVersion::V1),
            _ => None,
        }
    }

    /// Get the raw u32 value.
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Convert to big-endian bytes.
    pub fn to_bytes(self) -> [u8; 4] {
        self.as_u32().to_be_bytes()
    }

    /// Parse from big-endian bytes.
    pub fn from_bytes(bytes: [u8; 4]) -> Option<Self> {
        Self::from_u32(u32::from_be_bytes(bytes))
    }
}

impl Default for BoltVersion {
    fn default() -> Self {
        BoltVersion::V1
    }
}

impl fmt::Display for BoltVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bolt/{}", self.as_u32())
    }
}
