//! PackStream serialization format.
//!
//! PackStream is the binary serialization format used by the Bolt protocol
//! to encode values for transmission between client and server.
//!
//! # Supported Types
//!
//! - **Null**: Single byte marker
//! - **Boolean**: True/False markers
//! - **Integer**: Narrowest of tiny/8/16/32/64-bit forms (-2^63 to 2^63-1)
//! - **Float**: 64-bit IEEE 754
//! - **String**: UTF-8 encoded, byte length prefix
//! - **List**: Heterogeneous collections
//! - **Map**: String keys to arbitrary values
//! - **Structure**: Signature byte plus fields (messages, nodes, relationships)
//!
//! # Layers
//!
//! - [`PackStreamEncoder`] / [`PackStreamDecoder`] work on [`PackStreamValue`]s
//!   and on individual headers.
//! - [`PackedStruct`] keeps a structure's fields as undecoded bytes.
//! - [`ser`] and [`de`] bridge to serde, which the object mapper is built on.

pub mod de;
pub mod decoder;
pub mod encoder;
pub mod marker;
pub mod ser;
pub mod structures;
pub mod types;

pub use de::{from_bytes, from_value};
pub use decoder::{decode, PackStreamDecoder, MAX_DEPTH};
pub use encoder::{encode, PackStreamEncoder};
pub use marker::MarkerKind;
pub use ser::{to_bytes, PackStreamSerializer};
pub use structures::PackedStruct;
pub use types::{PackStreamStructure, PackStreamValue};

use std::fmt;
use thiserror::Error;

/// PackStream errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PackStreamError {
    /// Unexpected end of input
    #[error("Unexpected end of PackStream data")]
    UnexpectedEof,

    /// Unknown marker byte
    #[error("Unknown PackStream marker: 0x{0:02X}")]
    UnknownMarker(u8),

    /// A value of another kind was found where `expected` was required
    #[error("Expected {expected}, found marker 0x{found:02X}")]
    UnexpectedMarker {
        /// What the caller asked for
        expected: &'static str,
        /// Marker actually present
        found: u8,
    },

    /// Invalid UTF-8 in string
    #[error("Invalid UTF-8 in string: {0}")]
    InvalidUtf8(String),

    /// Invalid map key (must be string)
    #[error("Map keys must be strings")]
    InvalidMapKey,

    /// Integer written with a wider marker than necessary
    #[error("Integer {value} is not canonically encoded with marker 0x{marker:02X}")]
    NonCanonical {
        /// Integer marker used
        marker: u8,
        /// Decoded value
        value: i64,
    },

    /// Structure expected, other marker found
    #[error("Not a structure marker: 0x{0:02X}")]
    NotAStruct(u8),

    /// Lists, maps and structures nested deeper than the decoder allows
    #[error("Nesting deeper than {0} levels")]
    TooDeep(usize),

    /// Invalid structure format
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    /// Value too large to encode
    #[error("{0} too large: {1}")]
    ValueTooLarge(&'static str, usize),

    /// Structure signature outside 0x00..=0x7F
    #[error("Invalid structure signature: 0x{0:02X}")]
    InvalidSignature(u8),

    /// serde could not map between a Rust type and the encoded data
    #[error("{0}")]
    Mapping(String),
}

impl PackStreamError {
    pub(crate) fn unexpected(expected: &'static str, found: u8) -> Self {
        PackStreamError::UnexpectedMarker { expected, found }
    }
}

impl serde::ser::Error for PackStreamError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        PackStreamError::Mapping(msg.to_string())
    }
}

impl serde::de::Error for PackStreamError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        PackStreamError::Mapping(msg.to_string())
    }
}
