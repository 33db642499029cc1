//! Lazily decoded PackStream structures.
//!
//! Messages and graph entities travel as structures: a field-count marker,
//! a signature byte, then the fields. [`PackedStruct`] decodes the header
//! and keeps the field bytes as-is, so callers decide how to read them
//! (whole values, headers, or straight into a Rust type via serde).

use bytes::{Bytes, BytesMut};

use super::decoder::PackStreamDecoder;
use super::encoder::PackStreamEncoder;
use super::marker::{is_struct_marker, MAX_SIGNATURE};
use super::types::{PackStreamStructure, PackStreamValue};
use super::PackStreamError;

/// A structure whose fields are still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedStruct {
    signature: u8,
    field_count: usize,
    payload: Bytes,
}

impl PackedStruct {
    /// Check whether `bytes` starts with a structure marker.
    pub fn is_struct(bytes: &[u8]) -> bool {
        bytes.first().is_some_and(|&m| is_struct_marker(m))
    }

    /// Unpack the structure at the start of `bytes`.
    ///
    /// Bytes after the last field are not part of the structure and are
    /// ignored; use [`read`](Self::read) to continue past them.
    pub fn unpack(bytes: &[u8]) -> Result<Self, PackStreamError> {
        Self::read(&mut PackStreamDecoder::new(bytes))
    }

    /// Read one structure from `decoder`, leaving it positioned after the
    /// structure's last field.
    pub fn read(decoder: &mut PackStreamDecoder<'_>) -> Result<Self, PackStreamError> {
        let (field_count, signature) = decoder.read_struct_header()?;
        if signature > MAX_SIGNATURE {
            return Err(PackStreamError::InvalidStructure(format!(
                "signature 0x{:02X} has the high bit set",
                signature
            )));
        }
        let fields = decoder.rest();
        let before = decoder.remaining();
        for _ in 0..field_count {
            decoder.skip()?;
        }
        let used = before - decoder.remaining();

        Ok(Self {
            signature,
            field_count,
            payload: Bytes::copy_from_slice(&fields[..used]),
        })
    }

    /// Build a structure from already decoded field values.
    pub fn new(signature: u8, fields: &[PackStreamValue]) -> Result<Self, PackStreamError> {
        let mut encoder = PackStreamEncoder::new();
        for field in fields {
            encoder.encode(field)?;
        }
        Self::from_parts(signature, fields.len(), encoder.into_bytes().freeze())
    }

    /// Assemble a structure from a signature and pre-encoded fields.
    pub fn from_parts(
        signature: u8,
        field_count: usize,
        payload: Bytes,
    ) -> Result<Self, PackStreamError> {
        // header validation happens once here so `to_bytes` cannot fail later
        PackStreamEncoder::with_capacity(4).encode_struct_header(field_count, signature)?;
        Ok(Self {
            signature,
            field_count,
            payload,
        })
    }

    /// Encode `signature` and `fields` as structure bytes.
    pub fn pack(signature: u8, fields: &[PackStreamValue]) -> Result<BytesMut, PackStreamError> {
        Ok(Self::new(signature, fields)?.to_bytes())
    }

    /// Signature byte.
    pub fn signature(&self) -> u8 {
        self.signature
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.field_count
    }

    /// Check if the structure has no fields.
    pub fn is_empty(&self) -> bool {
        self.field_count == 0
    }

    /// The encoded fields, without the header.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// A decoder positioned on the first field.
    pub fn fields(&self) -> PackStreamDecoder<'_> {
        PackStreamDecoder::new(&self.payload)
    }

    /// Decode every field.
    pub fn decode_fields(&self) -> Result<Vec<PackStreamValue>, PackStreamError> {
        let mut decoder = self.fields();
        (0..self.field_count).map(|_| decoder.decode()).collect()
    }

    /// Decode into the eager representation.
    pub fn to_structure(&self) -> Result<PackStreamStructure, PackStreamError> {
        Ok(PackStreamStructure::new(self.signature, self.decode_fields()?))
    }

    /// Header plus payload.
    pub fn to_bytes(&self) -> BytesMut {
        let mut encoder = PackStreamEncoder::with_capacity(self.payload.len() + 4);
        // validated in from_parts/read
        let _ = encoder.encode_struct_header(self.field_count, self.signature);
        encoder.put_raw(&self.payload);
        encoder.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_struct() {
        assert!(PackedStruct::is_struct(&[0xB3, 0x01]));
        assert!(PackedStruct::is_struct(&[0xDC, 0x10, 0x01]));
        assert!(!PackedStruct::is_struct(&[0xA0]));
        assert!(!PackedStruct::is_struct(&[]));
    }

    #[test]
    fn test_pack_three_ints() {
        let bytes = PackedStruct::pack(0x01, &[1.into(), 2.into(), 3.into()]).unwrap();
        assert_eq!(&bytes[..], &[0xB3, 0x01, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_unpack_records_exact_payload() {
        // struct followed by another value
        let bytes = [0xB2, 0x70, 0x81, 0x61, 0x90, 0xC0];
        let s = PackedStruct::unpack(&bytes).unwrap();
        assert_eq!(s.signature(), 0x70);
        assert_eq!(s.len(), 2);
        assert_eq!(&s.payload()[..], &[0x81, 0x61, 0x90]);
        assert_eq!(&s.to_bytes()[..], &bytes[..5]);
    }

    #[test]
    fn test_read_consecutive() {
        let bytes = [0xB0, 0x7E, 0xB1, 0x71, 0x91, 0x01];
        let mut dec = PackStreamDecoder::new(&bytes);
        let first = PackedStruct::read(&mut dec).unwrap();
        let second = PackedStruct::read(&mut dec).unwrap();
        assert!(dec.is_empty());
        assert_eq!(first.signature(), 0x7E);
        assert!(first.is_empty());
        assert_eq!(
            second.decode_fields().unwrap(),
            vec![PackStreamValue::List(vec![1.into()])]
        );
    }

    #[test]
    fn test_unpack_errors() {
        assert!(matches!(
            PackedStruct::unpack(&[0xA0]),
            Err(PackStreamError::NotAStruct(0xA0))
        ));
        assert!(matches!(
            PackedStruct::unpack(&[0xB2, 0x70, 0x01]),
            Err(PackStreamError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_large_field_counts() {
        let fields: Vec<PackStreamValue> = (0..300).map(PackStreamValue::from).collect();
        let bytes = PackedStruct::pack(0x10, &fields).unwrap();
        assert_eq!(&bytes[..4], &[0xDD, 0x01, 0x2C, 0x10]);
        let s = PackedStruct::unpack(&bytes).unwrap();
        assert_eq!(s.len(), 300);
        assert_eq!(s.decode_fields().unwrap(), fields);
    }

    #[test]
    fn test_invalid_signature() {
        assert!(matches!(
            PackedStruct::new(0x80, &[]),
            Err(PackStreamError::InvalidSignature(0x80))
        ));
    }
}
