//! PackStream decoder.

use bytes::Buf;
use std::collections::HashMap;

use super::marker::*;
use super::types::{PackStreamStructure, PackStreamValue};
use super::PackStreamError;

/// Deepest nesting of lists, maps and structures a decoder accepts.
pub const MAX_DEPTH: usize = 100;

/// PackStream decoder that reads values from a byte slice.
///
/// Values can be decoded whole with [`decode`](Self::decode), or piecewise:
/// read a collection header, then read or [`skip`](Self::skip) its elements.
#[derive(Debug, Clone)]
pub struct PackStreamDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PackStreamDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Get the current position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get remaining bytes count.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Check if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// The bytes not consumed yet.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    /// Look at the next marker byte without consuming it.
    pub fn peek_marker(&self) -> Result<u8, PackStreamError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(PackStreamError::UnexpectedEof)
    }

    /// Decode the next value.
    ///
    /// Fails with [`PackStreamError::TooDeep`] past [`MAX_DEPTH`] levels of
    /// nesting.
    pub fn decode(&mut self) -> Result<PackStreamValue, PackStreamError> {
        self.decode_at(0)
    }

    fn decode_at(&mut self, depth: usize) -> Result<PackStreamValue, PackStreamError> {
        let marker = self.peek_marker()?;
        let kind = MarkerKind::of(marker).ok_or(PackStreamError::UnknownMarker(marker))?;

        let value = match kind {
            MarkerKind::Null => {
                self.pos += 1;
                PackStreamValue::Null
            }
            MarkerKind::Boolean => PackStreamValue::Boolean(self.read_bool()?),
            MarkerKind::Integer => PackStreamValue::Integer(self.read_int()?),
            MarkerKind::Float => PackStreamValue::Float(self.read_float()?),
            MarkerKind::String => PackStreamValue::String(self.read_str()?.to_owned()),
            MarkerKind::List => {
                let len = self.read_list_header()?;
                let depth = nested(depth)?;
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    items.push(self.decode_at(depth)?);
                }
                PackStreamValue::List(items)
            }
            MarkerKind::Map => {
                let len = self.read_map_header()?;
                let depth = nested(depth)?;
                let mut map = HashMap::with_capacity(len.min(1024));
                for _ in 0..len {
                    let key = self.read_key()?;
                    let value = self.decode_at(depth)?;
                    // duplicate keys: the later entry wins
                    map.insert(key, value);
                }
                PackStreamValue::Map(map)
            }
            MarkerKind::Structure => {
                let (field_count, signature) = self.read_struct_header()?;
                let depth = nested(depth)?;
                let mut fields = Vec::with_capacity(field_count.min(64));
                for _ in 0..field_count {
                    fields.push(self.decode_at(depth)?);
                }
                PackStreamValue::Structure(PackStreamStructure::new(signature, fields))
            }
        };
        Ok(value)
    }

    /// Skip the next value without materializing it. Nesting is limited as
    /// for [`decode`](Self::decode).
    pub fn skip(&mut self) -> Result<(), PackStreamError> {
        self.skip_at(0)
    }

    fn skip_at(&mut self, depth: usize) -> Result<(), PackStreamError> {
        let marker = self.peek_marker()?;
        match MarkerKind::of(marker).ok_or(PackStreamError::UnknownMarker(marker))? {
            MarkerKind::Null | MarkerKind::Boolean => self.pos += 1,
            MarkerKind::Integer => {
                self.read_int()?;
            }
            MarkerKind::Float => {
                self.read_float()?;
            }
            MarkerKind::String => {
                let len = self.read_string_len()?;
                self.read_bytes(len)?;
            }
            MarkerKind::List => {
                let len = self.read_list_header()?;
                let depth = nested(depth)?;
                for _ in 0..len {
                    self.skip_at(depth)?;
                }
            }
            MarkerKind::Map => {
                let len = self.read_map_header()?;
                let depth = nested(depth)?;
                for _ in 0..len {
                    self.skip_at(depth)?;
                    self.skip_at(depth)?;
                }
            }
            MarkerKind::Structure => {
                let (field_count, _) = self.read_struct_header()?;
                let depth = nested(depth)?;
                for _ in 0..field_count {
                    self.skip_at(depth)?;
                }
            }
        }
        Ok(())
    }

    /// Read a boolean.
    pub fn read_bool(&mut self) -> Result<bool, PackStreamError> {
        match self.read_u8()? {
            TRUE => Ok(true),
            FALSE => Ok(false),
            other => Err(PackStreamError::unexpected("boolean", other)),
        }
    }

    /// Read an integer. Only the narrowest encoding of a value is accepted.
    pub fn read_int(&mut self) -> Result<i64, PackStreamError> {
        let marker = self.read_u8()?;
        if is_tiny_int(marker) {
            return Ok(decode_tiny_int(marker));
        }

        let (value, fits_narrower) = match marker {
            INT_8 => {
                let v = self.read_i8()? as i64;
                (v, can_encode_tiny_int(v))
            }
            INT_16 => {
                let v = self.read_i16()? as i64;
                (v, i8::try_from(v).is_ok())
            }
            INT_32 => {
                let v = self.read_i32()? as i64;
                (v, i16::try_from(v).is_ok())
            }
            INT_64 => {
                let v = self.read_i64()?;
                (v, i32::try_from(v).is_ok())
            }
            other => return Err(PackStreamError::unexpected("integer", other)),
        };

        if fits_narrower {
            return Err(PackStreamError::NonCanonical { marker, value });
        }
        Ok(value)
    }

    /// Read a 64-bit float.
    pub fn read_float(&mut self) -> Result<f64, PackStreamError> {
        match self.read_u8()? {
            FLOAT_64 => {
                self.ensure(8)?;
                let bits = (&self.data[self.pos..]).get_u64();
                self.pos += 8;
                Ok(f64::from_bits(bits))
            }
            other => Err(PackStreamError::unexpected("float", other)),
        }
    }

    /// Read a text value, borrowing from the input.
    pub fn read_str(&mut self) -> Result<&'a str, PackStreamError> {
        let len = self.read_string_len()?;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes).map_err(|e| PackStreamError::InvalidUtf8(e.to_string()))
    }

    /// Read a list header, returning the element count.
    pub fn read_list_header(&mut self) -> Result<usize, PackStreamError> {
        let marker = self.read_u8()?;
        self.read_size(marker, TINY_LIST_BASE, [LIST_8, LIST_16, LIST_32])?
            .ok_or_else(|| PackStreamError::unexpected("list", marker))
    }

    /// Read a map header, returning the entry count.
    pub fn read_map_header(&mut self) -> Result<usize, PackStreamError> {
        let marker = self.read_u8()?;
        self.read_size(marker, TINY_MAP_BASE, [MAP_8, MAP_16, MAP_32])?
            .ok_or_else(|| PackStreamError::unexpected("map", marker))
    }

    /// Read a structure header, returning `(field_count, signature)`.
    pub fn read_struct_header(&mut self) -> Result<(usize, u8), PackStreamError> {
        let marker = self.read_u8()?;
        let field_count = match marker {
            STRUCT_8 => self.read_u8()? as usize,
            STRUCT_16 => self.read_u16()? as usize,
            _ => tiny_size(marker, TINY_STRUCT_BASE)
                .ok_or(PackStreamError::NotAStruct(marker))?,
        };
        let signature = self.read_u8()?;
        Ok((field_count, signature))
    }

    fn read_key(&mut self) -> Result<String, PackStreamError> {
        match MarkerKind::of(self.peek_marker()?) {
            Some(MarkerKind::String) => Ok(self.read_str()?.to_owned()),
            _ => Err(PackStreamError::InvalidMapKey),
        }
    }

    fn read_string_len(&mut self) -> Result<usize, PackStreamError> {
        let marker = self.read_u8()?;
        self.read_size(marker, TINY_STRING_BASE, [STRING_8, STRING_16, STRING_32])?
            .ok_or_else(|| PackStreamError::unexpected("string", marker))
    }

    /// Size that follows a text/list/map marker, `None` if the marker is of
    /// another kind.
    fn read_size(
        &mut self,
        marker: u8,
        tiny_base: u8,
        [m8, m16, m32]: [u8; 3],
    ) -> Result<Option<usize>, PackStreamError> {
        if let Some(len) = tiny_size(marker, tiny_base) {
            return Ok(Some(len));
        }
        let len = if marker == m8 {
            self.read_u8()? as usize
        } else if marker == m16 {
            self.read_u16()? as usize
        } else if marker == m32 {
            self.read_u32()? as usize
        } else {
            return Ok(None);
        };
        Ok(Some(len))
    }

    // Low-level read methods

    fn ensure(&self, len: usize) -> Result<(), PackStreamError> {
        if self.remaining() < len {
            Err(PackStreamError::UnexpectedEof)
        } else {
            Ok(())
        }
    }

    fn read_u8(&mut self) -> Result<u8, PackStreamError> {
        let value = self.peek_marker()?;
        self.pos += 1;
        Ok(value)
    }

    fn read_i8(&mut self) -> Result<i8, PackStreamError> {
        Ok(self.read_u8()? as i8)
    }

    fn read_u16(&mut self) -> Result<u16, PackStreamError> {
        self.ensure(2)?;
        let value = (&self.data[self.pos..]).get_u16();
        self.pos += 2;
        Ok(value)
    }

    fn read_i16(&mut self) -> Result<i16, PackStreamError> {
        Ok(self.read_u16()? as i16)
    }

    fn read_u32(&mut self) -> Result<u32, PackStreamError> {
        self.ensure(4)?;
        let value = (&self.data[self.pos..]).get_u32();
        self.pos += 4;
        Ok(value)
    }

    fn read_i32(&mut self) -> Result<i32, PackStreamError> {
        Ok(self.read_u32()? as i32)
    }

    fn read_i64(&mut self) -> Result<i64, PackStreamError> {
        self.ensure(8)?;
        let value = (&self.data[self.pos..]).get_i64();
        self.pos += 8;
        Ok(value)
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], PackStreamError> {
        self.ensure(len)?;
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }
}

fn nested(depth: usize) -> Result<usize, PackStreamError> {
    if depth >= MAX_DEPTH {
        return Err(PackStreamError::TooDeep(MAX_DEPTH));
    }
    Ok(depth + 1)
}

/// Convenience function to decode a single value from bytes.
pub fn decode(data: &[u8]) -> Result<PackStreamValue, PackStreamError> {
    PackStreamDecoder::new(data).decode()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_scalars() {
        assert!(decode(&[0xC0]).unwrap().is_null());
        assert_eq!(decode(&[0xC3]).unwrap(), PackStreamValue::Boolean(true));
        assert_eq!(decode(&[0xC2]).unwrap(), PackStreamValue::Boolean(false));
        assert_eq!(
            decode(&[0xC1, 0x3F, 0xF1, 0x99, 0x99, 0x99, 0x99, 0x99, 0x9A]).unwrap(),
            PackStreamValue::Float(1.1)
        );
    }

    #[test]
    fn test_decode_ints() {
        assert_eq!(decode(&[0x00]).unwrap(), PackStreamValue::Integer(0));
        assert_eq!(decode(&[0x7F]).unwrap(), PackStreamValue::Integer(127));
        assert_eq!(decode(&[0xF0]).unwrap(), PackStreamValue::Integer(-16));
        assert_eq!(decode(&[0xC8, 0xEF]).unwrap(), PackStreamValue::Integer(-17));
        assert_eq!(decode(&[0xC9, 0x03, 0xE8]).unwrap(), PackStreamValue::Integer(1000));
        assert_eq!(
            decode(&[0xCA, 0x00, 0x01, 0x86, 0xA0]).unwrap(),
            PackStreamValue::Integer(100_000)
        );
        assert_eq!(
            decode(&[0xCB, 0x80, 0, 0, 0, 0, 0, 0, 0]).unwrap(),
            PackStreamValue::Integer(i64::MIN)
        );
    }

    #[test]
    fn test_non_canonical_int_rejected() {
        assert!(matches!(
            decode(&[0xC8, 0x05]),
            Err(PackStreamError::NonCanonical { marker: 0xC8, value: 5 })
        ));
        assert!(matches!(
            decode(&[0xC9, 0x00, 0x10]),
            Err(PackStreamError::NonCanonical { .. })
        ));
    }

    #[test]
    fn test_decode_strings() {
        assert_eq!(decode(&[0x80]).unwrap(), PackStreamValue::String(String::new()));
        assert_eq!(
            decode(&[0x85, b'h', b'e', b'l', b'l', b'o']).unwrap(),
            PackStreamValue::String("hello".into())
        );
        let mut long = vec![0xD0, 20];
        long.extend(std::iter::repeat(b'z').take(20));
        assert_eq!(decode(&long).unwrap().as_str().map(str::len), Some(20));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        assert!(matches!(
            decode(&[0x82, 0xFF, 0xFE]),
            Err(PackStreamError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn test_decode_list_and_map() {
        assert_eq!(
            decode(&[0x93, 0x01, 0x02, 0x03]).unwrap(),
            PackStreamValue::List(vec![1.into(), 2.into(), 3.into()])
        );

        let value = decode(&[0xA1, 0x81, 0x41, 0xC3]).unwrap();
        assert_eq!(value.as_map().unwrap()["A"], PackStreamValue::Boolean(true));
    }

    #[test]
    fn test_duplicate_keys_later_wins() {
        let value = decode(&[0xA2, 0x81, 0x61, 0x01, 0x81, 0x61, 0x02]).unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["a"], PackStreamValue::Integer(2));
    }

    #[test]
    fn test_non_string_map_key() {
        assert!(matches!(
            decode(&[0xA1, 0x01, 0x02]),
            Err(PackStreamError::InvalidMapKey)
        ));
    }

    #[test]
    fn test_decode_struct() {
        let value = decode(&[0xB3, 0x01, 0x01, 0x02, 0x03]).unwrap();
        let s = value.as_structure().unwrap();
        assert_eq!(s.signature, 0x01);
        assert_eq!(s.fields, vec![1.into(), 2.into(), 3.into()]);
    }

    #[test]
    fn test_unknown_marker_and_eof() {
        assert!(matches!(decode(&[0xE5]), Err(PackStreamError::UnknownMarker(0xE5))));
        assert!(matches!(decode(&[0xCC, 0x00]), Err(PackStreamError::UnknownMarker(0xCC))));
        assert!(matches!(decode(&[]), Err(PackStreamError::UnexpectedEof)));
        assert!(matches!(decode(&[0x93, 0x01]), Err(PackStreamError::UnexpectedEof)));
        assert!(matches!(decode(&[0xD1, 0x00]), Err(PackStreamError::UnexpectedEof)));
    }

    #[test]
    fn test_skip_measures_extent() {
        let bytes = [0xB2, 0x4E, 0x81, 0x31, 0x91, 0x81, 0x41, 0xC0];
        let mut dec = PackStreamDecoder::new(&bytes);
        dec.skip().unwrap();
        assert_eq!(dec.position(), 7);
        assert_eq!(dec.rest(), &[0xC0]);
    }

    #[test]
    fn test_nesting_depth_limit() {
        let mut bytes = vec![0x91; 500_000];
        bytes.push(0x90);
        assert!(matches!(decode(&bytes), Err(PackStreamError::TooDeep(MAX_DEPTH))));
        assert!(matches!(
            PackStreamDecoder::new(&bytes).skip(),
            Err(PackStreamError::TooDeep(MAX_DEPTH))
        ));

        // structures and maps count as levels too
        let mut nested = vec![0xB1, 0x4E, 0xA1, 0x81, b'k'].repeat(MAX_DEPTH);
        nested.push(0xC0);
        assert!(matches!(decode(&nested), Err(PackStreamError::TooDeep(_))));
    }

    #[test]
    fn test_nesting_at_limit_accepted() {
        let mut bytes = vec![0x91; MAX_DEPTH - 1];
        bytes.push(0x90);
        assert!(decode(&bytes).is_ok());

        let mut dec = PackStreamDecoder::new(&bytes);
        dec.skip().unwrap();
        assert!(dec.is_empty());
    }

    #[test]
    fn test_piecewise_reads() {
        let bytes = [0x92, 0x81, 0x61, 0xD4, 0x10];
        let mut dec = PackStreamDecoder::new(&bytes);
        assert_eq!(dec.read_list_header().unwrap(), 2);
        assert_eq!(dec.read_str().unwrap(), "a");
        assert_eq!(dec.read_list_header().unwrap(), 16);
        assert!(dec.is_empty());

        let mut dec = PackStreamDecoder::new(&[0xC0]);
        assert!(matches!(
            dec.read_map_header(),
            Err(PackStreamError::UnexpectedMarker { expected: "map", found: 0xC0 })
        ));
    }
}
