//! serde serializer writing PackStream bytes.
//!
//! Structs become maps with their fields in declaration order. Sequences
//! and maps of known length are streamed behind their header; those of
//! unknown length are written to a scratch buffer first and the header is
//! prepended once the element count is known.

use bytes::BytesMut;
use serde::ser::{self, Serialize};
use std::mem;

use super::decoder::PackStreamDecoder;
use super::encoder::PackStreamEncoder;
use super::marker::{MarkerKind, MAX_SIGNATURE};
use super::types::PackStreamValue;
use super::PackStreamError;

/// Tuple-struct name used to carry a structure's signature through serde.
pub(crate) const STRUCTURE_TOKEN: &str = "$packstream::Structure";

/// Serialize `value` to PackStream bytes.
pub fn to_bytes<T: Serialize + ?Sized>(value: &T) -> Result<BytesMut, PackStreamError> {
    let mut serializer = PackStreamSerializer::new();
    value.serialize(&mut serializer)?;
    Ok(serializer.into_bytes())
}

/// serde [`Serializer`](ser::Serializer) over a [`PackStreamEncoder`].
#[derive(Debug, Default)]
pub struct PackStreamSerializer {
    encoder: PackStreamEncoder,
}

impl PackStreamSerializer {
    /// Create a serializer with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the serializer and return the bytes written so far.
    pub fn into_bytes(self) -> BytesMut {
        self.encoder.into_bytes()
    }

    fn begin_buffered(&mut self) -> PackStreamEncoder {
        mem::take(&mut self.encoder)
    }

    fn end_buffered(
        &mut self,
        outer: PackStreamEncoder,
        write_header: impl FnOnce(&mut PackStreamEncoder) -> Result<(), PackStreamError>,
    ) -> Result<(), PackStreamError> {
        let body = mem::replace(&mut self.encoder, outer);
        write_header(&mut self.encoder)?;
        self.encoder.put_raw(body.as_bytes());
        Ok(())
    }

    fn variant_header(&mut self, variant: &str) -> Result<(), PackStreamError> {
        self.encoder.encode_map_header(1)?;
        self.encoder.encode_string(variant)
    }
}

impl<'a> ser::Serializer for &'a mut PackStreamSerializer {
    type Ok = ();
    type Error = PackStreamError;

    type SerializeSeq = Collection<'a>;
    type SerializeTuple = Self;
    type SerializeTupleStruct = TupleStruct<'a>;
    type SerializeTupleVariant = Self;
    type SerializeMap = Collection<'a>;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, v: bool) -> Result<(), PackStreamError> {
        self.encoder.encode_bool(v);
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> Result<(), PackStreamError> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i16(self, v: i16) -> Result<(), PackStreamError> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i32(self, v: i32) -> Result<(), PackStreamError> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i64(self, v: i64) -> Result<(), PackStreamError> {
        self.encoder.encode_int(v);
        Ok(())
    }

    fn serialize_u8(self, v: u8) -> Result<(), PackStreamError> {
        self.serialize_i64(v as i64)
    }

    fn serialize_u16(self, v: u16) -> Result<(), PackStreamError> {
        self.serialize_i64(v as i64)
    }

    fn serialize_u32(self, v: u32) -> Result<(), PackStreamError> {
        self.serialize_i64(v as i64)
    }

    fn serialize_u64(self, v: u64) -> Result<(), PackStreamError> {
        let v = i64::try_from(v).map_err(|_| {
            PackStreamError::Mapping(format!("{} does not fit a 64-bit signed integer", v))
        })?;
        self.serialize_i64(v)
    }

    fn serialize_f32(self, v: f32) -> Result<(), PackStreamError> {
        self.serialize_f64(v as f64)
    }

    fn serialize_f64(self, v: f64) -> Result<(), PackStreamError> {
        self.encoder.encode_float(v);
        Ok(())
    }

    fn serialize_char(self, v: char) -> Result<(), PackStreamError> {
        self.encoder.encode_string(v.encode_utf8(&mut [0; 4]))
    }

    fn serialize_str(self, v: &str) -> Result<(), PackStreamError> {
        self.encoder.encode_string(v)
    }

    // no byte-array type in this protocol version
    fn serialize_bytes(self, v: &[u8]) -> Result<(), PackStreamError> {
        self.encoder.encode_list_header(v.len())?;
        for b in v {
            self.encoder.encode_int(*b as i64);
        }
        Ok(())
    }

    fn serialize_none(self) -> Result<(), PackStreamError> {
        self.serialize_unit()
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), PackStreamError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), PackStreamError> {
        self.encoder.encode_null();
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), PackStreamError> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<(), PackStreamError> {
        self.encoder.encode_string(variant)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), PackStreamError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<(), PackStreamError> {
        self.variant_header(variant)?;
        value.serialize(self)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Collection<'a>, PackStreamError> {
        Collection::begin(self, len, PackStreamEncoder::encode_list_header)
    }

    fn serialize_tuple(self, len: usize) -> Result<Self, PackStreamError> {
        self.encoder.encode_list_header(len)?;
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<TupleStruct<'a>, PackStreamError> {
        if name == STRUCTURE_TOKEN {
            // first element is the signature, the rest are fields
            return Ok(TupleStruct {
                ser: self,
                pending_fields: Some(len.saturating_sub(1)),
            });
        }
        self.encoder.encode_list_header(len)?;
        Ok(TupleStruct {
            ser: self,
            pending_fields: None,
        })
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self, PackStreamError> {
        self.variant_header(variant)?;
        self.encoder.encode_list_header(len)?;
        Ok(self)
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Collection<'a>, PackStreamError> {
        Collection::begin(self, len, PackStreamEncoder::encode_map_header)
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<Self, PackStreamError> {
        self.encoder.encode_map_header(len)?;
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self, PackStreamError> {
        self.variant_header(variant)?;
        self.encoder.encode_map_header(len)?;
        Ok(self)
    }
}

/// A list or map being serialized. When the length was unknown up front,
/// `outer` holds the enclosing buffer until `end`.
pub struct Collection<'a> {
    ser: &'a mut PackStreamSerializer,
    outer: Option<PackStreamEncoder>,
    count: usize,
    header: fn(&mut PackStreamEncoder, usize) -> Result<(), PackStreamError>,
}

impl<'a> Collection<'a> {
    fn begin(
        ser: &'a mut PackStreamSerializer,
        len: Option<usize>,
        header: fn(&mut PackStreamEncoder, usize) -> Result<(), PackStreamError>,
    ) -> Result<Self, PackStreamError> {
        let outer = match len {
            Some(len) => {
                header(&mut ser.encoder, len)?;
                None
            }
            None => Some(ser.begin_buffered()),
        };
        Ok(Collection {
            ser,
            outer,
            count: 0,
            header,
        })
    }

    fn finish(self) -> Result<(), PackStreamError> {
        let Collection {
            ser,
            outer,
            count,
            header,
        } = self;
        match outer {
            Some(outer) => ser.end_buffered(outer, |enc| header(enc, count)),
            None => Ok(()),
        }
    }
}

impl ser::SerializeSeq for Collection<'_> {
    type Ok = ();
    type Error = PackStreamError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), PackStreamError> {
        self.count += 1;
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<(), PackStreamError> {
        self.finish()
    }
}

impl ser::SerializeMap for Collection<'_> {
    type Ok = ();
    type Error = PackStreamError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), PackStreamError> {
        self.count += 1;
        let key = to_bytes(key)?;
        match key.first().copied().and_then(MarkerKind::of) {
            Some(MarkerKind::String) => {
                self.ser.encoder.put_raw(&key);
                Ok(())
            }
            _ => Err(PackStreamError::InvalidMapKey),
        }
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), PackStreamError> {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<(), PackStreamError> {
        self.finish()
    }
}

/// Tuple struct in progress. `pending_fields` is set while a structure's
/// signature has not been written yet.
pub struct TupleStruct<'a> {
    ser: &'a mut PackStreamSerializer,
    pending_fields: Option<usize>,
}

impl ser::SerializeTupleStruct for TupleStruct<'_> {
    type Ok = ();
    type Error = PackStreamError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), PackStreamError> {
        let Some(field_count) = self.pending_fields.take() else {
            return value.serialize(&mut *self.ser);
        };

        let packed = to_bytes(value)?;
        let signature = PackStreamDecoder::new(&packed).read_int()?;
        let signature = u8::try_from(signature)
            .ok()
            .filter(|s| *s <= MAX_SIGNATURE)
            .ok_or_else(|| {
                PackStreamError::Mapping(format!("{} is not a structure signature", signature))
            })?;
        self.ser.encoder.encode_struct_header(field_count, signature)
    }

    fn end(self) -> Result<(), PackStreamError> {
        Ok(())
    }
}

impl ser::SerializeTuple for &mut PackStreamSerializer {
    type Ok = ();
    type Error = PackStreamError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), PackStreamError> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<(), PackStreamError> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for &mut PackStreamSerializer {
    type Ok = ();
    type Error = PackStreamError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), PackStreamError> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<(), PackStreamError> {
        Ok(())
    }
}

impl ser::SerializeStruct for &mut PackStreamSerializer {
    type Ok = ();
    type Error = PackStreamError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), PackStreamError> {
        self.encoder.encode_string(key)?;
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<(), PackStreamError> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for &mut PackStreamSerializer {
    type Ok = ();
    type Error = PackStreamError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), PackStreamError> {
        self.encoder.encode_string(key)?;
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<(), PackStreamError> {
        Ok(())
    }
}

impl Serialize for PackStreamValue {
    fn serialize<S: ser::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use ser::SerializeTupleStruct;

        match self {
            PackStreamValue::Null => serializer.serialize_unit(),
            PackStreamValue::Boolean(b) => serializer.serialize_bool(*b),
            PackStreamValue::Integer(i) => serializer.serialize_i64(*i),
            PackStreamValue::Float(f) => serializer.serialize_f64(*f),
            PackStreamValue::String(s) => serializer.serialize_str(s),
            PackStreamValue::List(l) => serializer.collect_seq(l),
            PackStreamValue::Map(m) => serializer.collect_map(m),
            PackStreamValue::Structure(s) => {
                let mut st =
                    serializer.serialize_tuple_struct(STRUCTURE_TOKEN, s.fields.len() + 1)?;
                st.serialize_field(&s.signature)?;
                for field in &s.fields {
                    st.serialize_field(field)?;
                }
                st.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bolt::packstream::{decode, encode, PackStreamStructure};
    use serde::Serialize;
    use std::collections::{BTreeMap, HashMap};

    #[derive(Serialize)]
    struct Flag {
        #[serde(rename = "A")]
        a: bool,
    }

    #[derive(Serialize)]
    struct Person {
        name: String,
        age: u8,
        #[serde(skip)]
        _cache: Vec<u8>,
        nickname: Option<String>,
    }

    #[test]
    fn test_struct_fields_in_declaration_order() {
        let p = Person {
            name: "Ann".into(),
            age: 30,
            _cache: vec![1, 2],
            nickname: None,
        };
        let bytes = to_bytes(&p).unwrap();
        let mut expected = vec![0xA3, 0x84];
        expected.extend_from_slice(b"name");
        expected.extend_from_slice(&[0x83, b'A', b'n', b'n', 0x83]);
        expected.extend_from_slice(b"age");
        expected.push(30);
        expected.push(0x88);
        expected.extend_from_slice(b"nickname");
        expected.push(0xC0);
        assert_eq!(&bytes[..], &expected[..]);
    }

    #[test]
    fn test_single_bool_member() {
        assert_eq!(&to_bytes(&Flag { a: true }).unwrap()[..], &[0xA1, 0x81, 0x41, 0xC3]);
    }

    #[test]
    fn test_map_of_strings() {
        let mut map = BTreeMap::new();
        map.insert("a0", "a0");
        assert_eq!(
            &to_bytes(&map).unwrap()[..],
            &[0xA1, 0x82, 0x61, 0x30, 0x82, 0x61, 0x30]
        );
    }

    #[test]
    fn test_non_string_key_rejected() {
        let mut map = HashMap::new();
        map.insert(1, "x");
        assert!(matches!(to_bytes(&map), Err(PackStreamError::InvalidMapKey)));
    }

    #[test]
    fn test_unknown_length_sequence_is_buffered() {
        struct Unsized(Vec<i64>);
        impl Serialize for Unsized {
            fn serialize<S: ser::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                use ser::SerializeSeq;
                let mut seq = s.serialize_seq(None)?;
                for v in &self.0 {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
        }

        let bytes = to_bytes(&vec![Unsized(vec![1, 2]), Unsized((0..20).collect())]).unwrap();
        assert_eq!(&bytes[..4], &[0x92, 0x92, 0x01, 0x02]);
        assert_eq!(&bytes[4..6], &[0xD4, 20]);
    }

    #[test]
    fn test_u64_out_of_range() {
        assert!(matches!(to_bytes(&u64::MAX), Err(PackStreamError::Mapping(_))));
        assert_eq!(&to_bytes(&200u64).unwrap()[..], &[0xC9, 0x00, 0xC8]);
    }

    #[test]
    fn test_enums() {
        #[derive(Serialize)]
        enum Shape {
            Dot,
            Circle(f64),
        }
        assert_eq!(&to_bytes(&Shape::Dot).unwrap()[..], &[0x83, b'D', b'o', b't']);
        let circle = to_bytes(&Shape::Circle(1.0)).unwrap();
        assert_eq!(&circle[..8], &[0xA1, 0x86, b'C', b'i', b'r', b'c', b'l', b'e']);
        assert_eq!(circle[8], 0xC1);
    }

    #[test]
    fn test_value_serialize_matches_encoder() {
        let value = PackStreamValue::List(vec![
            PackStreamValue::Structure(PackStreamStructure::new(
                0x4E,
                vec!["1".into(), PackStreamValue::List(vec!["A".into()])],
            )),
            1.5.into(),
            PackStreamValue::Null,
        ]);
        let via_serde = to_bytes(&value).unwrap();
        assert_eq!(via_serde, encode(&value).unwrap());
        assert_eq!(decode(&via_serde).unwrap(), value);
    }
}
