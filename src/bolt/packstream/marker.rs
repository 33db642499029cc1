//! PackStream marker bytes.
//!
//! Every value starts with a single marker byte. Small sizes and small
//! integers are folded into the marker itself ("tiny" forms); larger ones
//! use a dedicated marker followed by a big-endian size or payload.

/// Null marker
pub const NULL: u8 = 0xC0;

/// Float marker (64-bit IEEE 754, big-endian)
pub const FLOAT_64: u8 = 0xC1;

/// Boolean false
pub const FALSE: u8 = 0xC2;
/// Boolean true
pub const TRUE: u8 = 0xC3;

// Values in -16..=127 are the marker byte itself.
/// Smallest tiny integer marker (-16)
pub const TINY_INT_MIN: u8 = 0xF0;
/// Largest tiny integer marker (127)
pub const TINY_INT_MAX: u8 = 0x7F;
/// 8-bit integer
pub const INT_8: u8 = 0xC8;
/// 16-bit integer
pub const INT_16: u8 = 0xC9;
/// 32-bit integer
pub const INT_32: u8 = 0xCA;
/// 64-bit integer
pub const INT_64: u8 = 0xCB;

/// Text with the byte length in the low nibble (0x80-0x8F)
pub const TINY_STRING_BASE: u8 = 0x80;
/// Text, 8-bit length
pub const STRING_8: u8 = 0xD0;
/// Text, 16-bit length
pub const STRING_16: u8 = 0xD1;
/// Text, 32-bit length
pub const STRING_32: u8 = 0xD2;

/// List with the element count in the low nibble (0x90-0x9F)
pub const TINY_LIST_BASE: u8 = 0x90;
/// List, 8-bit count
pub const LIST_8: u8 = 0xD4;
/// List, 16-bit count
pub const LIST_16: u8 = 0xD5;
/// List, 32-bit count
pub const LIST_32: u8 = 0xD6;

/// Map with the entry count in the low nibble (0xA0-0xAF)
pub const TINY_MAP_BASE: u8 = 0xA0;
/// Map, 8-bit count
pub const MAP_8: u8 = 0xD8;
/// Map, 16-bit count
pub const MAP_16: u8 = 0xD9;
/// Map, 32-bit count
pub const MAP_32: u8 = 0xDA;

/// Structure with the field count in the low nibble (0xB0-0xBF)
pub const TINY_STRUCT_BASE: u8 = 0xB0;
/// Structure, 8-bit field count
pub const STRUCT_8: u8 = 0xDC;
/// Structure, 16-bit field count
pub const STRUCT_16: u8 = 0xDD;

/// Largest size that still fits into a tiny marker.
pub const TINY_MAX_SIZE: usize = 15;

/// Largest field count a structure header can carry.
pub const MAX_STRUCT_FIELDS: usize = u16::MAX as usize;

/// Structure signatures occupy the low 7 bits.
pub const MAX_SIGNATURE: u8 = 0x7F;

/// Kind of value introduced by a marker byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    /// C0
    Null,
    /// C2, C3
    Boolean,
    /// Tiny integers and C8-CB
    Integer,
    /// C1
    Float,
    /// 80-8F, D0-D2
    String,
    /// 90-9F, D4-D6
    List,
    /// A0-AF, D8-DA
    Map,
    /// B0-BF, DC, DD
    Structure,
}

impl MarkerKind {
    /// Classify a marker byte. Returns `None` for bytes that introduce no
    /// known value (reserved markers, bytes markers of later protocol versions).
    pub fn of(marker: u8) -> Option<MarkerKind> {
        let kind = match marker {
            0x00..=TINY_INT_MAX | TINY_INT_MIN..=0xFF => MarkerKind::Integer,
            INT_8 | INT_16 | INT_32 | INT_64 => MarkerKind::Integer,
            0x80..=0x8F | STRING_8 | STRING_16 | STRING_32 => MarkerKind::String,
            0x90..=0x9F | LIST_8 | LIST_16 | LIST_32 => MarkerKind::List,
            0xA0..=0xAF | MAP_8 | MAP_16 | MAP_32 => MarkerKind::Map,
            0xB0..=0xBF | STRUCT_8 | STRUCT_16 => MarkerKind::Structure,
            NULL => MarkerKind::Null,
            FLOAT_64 => MarkerKind::Float,
            FALSE | TRUE => MarkerKind::Boolean,
            _ => return None,
        };
        Some(kind)
    }
}

/// Check if a byte is a tiny integer marker (-16 to 127)
#[inline]
pub fn is_tiny_int(marker: u8) -> bool {
    marker <= TINY_INT_MAX || marker >= TINY_INT_MIN
}

/// Decode a tiny integer from its marker byte
#[inline]
pub fn decode_tiny_int(marker: u8) -> i64 {
    marker as i8 as i64
}

/// Check if an integer can be encoded as a tiny int
#[inline]
pub fn can_encode_tiny_int(value: i64) -> bool {
    (-16..=127).contains(&value)
}

/// Size carried by a tiny marker, if `marker` is the tiny form of `base`.
#[inline]
pub fn tiny_size(marker: u8, base: u8) -> Option<usize> {
    if marker & 0xF0 == base {
        Some((marker & 0x0F) as usize)
    } else {
        None
    }
}

/// Check if a byte opens a structure (tiny or sized).
#[inline]
pub fn is_struct_marker(marker: u8) -> bool {
    tiny_size(marker, TINY_STRUCT_BASE).is_some() || marker == STRUCT_8 || marker == STRUCT_16
}

/// Check if a byte opens a map (tiny or sized).
#[inline]
pub fn is_map_marker(marker: u8) -> bool {
    matches!(MarkerKind::of(marker), Some(MarkerKind::Map))
}
