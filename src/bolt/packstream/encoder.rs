//! PackStream encoder.

use bytes::{BufMut, BytesMut};
use std::collections::HashMap;

use super::marker::*;
use super::types::{PackStreamStructure, PackStreamValue};
use super::PackStreamError;

/// PackStream encoder that writes values to a byte buffer.
///
/// Besides whole values it exposes the header writers for lists, maps and
/// structures so callers can stream elements behind a header.
#[derive(Debug)]
pub struct PackStreamEncoder {
    buffer: BytesMut,
}

impl PackStreamEncoder {
    /// Create a new encoder with default buffer capacity.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a new encoder with specified buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Consume the encoder and return the bytes.
    pub fn into_bytes(self) -> BytesMut {
        self.buffer
    }

    /// Get the bytes as a slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Append bytes that are already PackStream-encoded.
    pub fn put_raw(&mut self, packed: &[u8]) {
        self.buffer.put_slice(packed);
    }

    /// Encode a PackStreamValue.
    pub fn encode(&mut self, value: &PackStreamValue) -> Result<(), PackStreamError> {
        match value {
            PackStreamValue::Null => self.encode_null(),
            PackStreamValue::Boolean(b) => self.encode_bool(*b),
            PackStreamValue::Integer(i) => self.encode_int(*i),
            PackStreamValue::Float(f) => self.encode_float(*f),
            PackStreamValue::String(s) => return self.encode_string(s),
            PackStreamValue::List(l) => return self.encode_list(l),
            PackStreamValue::Map(m) => return self.encode_map(m),
            PackStreamValue::Structure(s) => return self.encode_structure(s),
        }
        Ok(())
    }

    /// Encode null.
    pub fn encode_null(&mut self) {
        self.buffer.put_u8(NULL);
    }

    /// Encode a boolean.
    pub fn encode_bool(&mut self, value: bool) {
        self.buffer.put_u8(if value { TRUE } else { FALSE });
    }

    /// Encode an integer using the narrowest representation.
    pub fn encode_int(&mut self, value: i64) {
        if can_encode_tiny_int(value) {
            self.buffer.put_u8(value as u8);
        } else if i8::try_from(value).is_ok() {
            self.buffer.put_u8(INT_8);
            self.buffer.put_i8(value as i8);
        } else if i16::try_from(value).is_ok() {
            self.buffer.put_u8(INT_16);
            self.buffer.put_i16(value as i16);
        } else if i32::try_from(value).is_ok() {
            self.buffer.put_u8(INT_32);
            self.buffer.put_i32(value as i32);
        } else {
            self.buffer.put_u8(INT_64);
            self.buffer.put_i64(value);
        }
    }

    /// Encode a float (always 64-bit, NaN and -0.0 bit patterns preserved).
    pub fn encode_float(&mut self, value: f64) {
        self.buffer.put_u8(FLOAT_64);
        self.buffer.put_u64(value.to_bits());
    }

    /// Encode a string.
    pub fn encode_string(&mut self, value: &str) -> Result<(), PackStreamError> {
        let bytes = value.as_bytes();
        self.write_size(
            bytes.len(),
            "string",
            TINY_STRING_BASE,
            [STRING_8, STRING_16, STRING_32],
        )?;
        self.buffer.put_slice(bytes);
        Ok(())
    }

    /// Write a list header announcing `len` elements.
    pub fn encode_list_header(&mut self, len: usize) -> Result<(), PackStreamError> {
        self.write_size(len, "list", TINY_LIST_BASE, [LIST_8, LIST_16, LIST_32])
    }

    /// Write a map header announcing `len` key/value pairs.
    pub fn encode_map_header(&mut self, len: usize) -> Result<(), PackStreamError> {
        self.write_size(len, "map", TINY_MAP_BASE, [MAP_8, MAP_16, MAP_32])
    }

    /// Write a structure header: field-count marker then the signature byte.
    pub fn encode_struct_header(
        &mut self,
        field_count: usize,
        signature: u8,
    ) -> Result<(), PackStreamError> {
        if signature > MAX_SIGNATURE {
            return Err(PackStreamError::InvalidSignature(signature));
        }

        if field_count <= TINY_MAX_SIZE {
            self.buffer.put_u8(TINY_STRUCT_BASE | field_count as u8);
        } else if field_count <= u8::MAX as usize {
            self.buffer.put_u8(STRUCT_8);
            self.buffer.put_u8(field_count as u8);
        } else if field_count <= MAX_STRUCT_FIELDS {
            self.buffer.put_u8(STRUCT_16);
            self.buffer.put_u16(field_count as u16);
        } else {
            return Err(PackStreamError::ValueTooLarge("structure fields", field_count));
        }

        self.buffer.put_u8(signature);
        Ok(())
    }

    /// Encode a list.
    pub fn encode_list(&mut self, values: &[PackStreamValue]) -> Result<(), PackStreamError> {
        self.encode_list_header(values.len())?;
        for value in values {
            self.encode(value)?;
        }
        Ok(())
    }

    /// Encode a map.
    pub fn encode_map(
        &mut self,
        map: &HashMap<String, PackStreamValue>,
    ) -> Result<(), PackStreamError> {
        self.encode_map_header(map.len())?;
        for (key, value) in map {
            self.encode_string(key)?;
            self.encode(value)?;
        }
        Ok(())
    }

    /// Encode a structure.
    pub fn encode_structure(&mut self, s: &PackStreamStructure) -> Result<(), PackStreamError> {
        self.encode_struct_header(s.fields.len(), s.signature)?;
        for field in &s.fields {
            self.encode(field)?;
        }
        Ok(())
    }

    fn write_size(
        &mut self,
        len: usize,
        what: &'static str,
        tiny_base: u8,
        [m8, m16, m32]: [u8; 3],
    ) -> Result<(), PackStreamError> {
        if len <= TINY_MAX_SIZE {
            self.buffer.put_u8(tiny_base | len as u8);
        } else if len <= u8::MAX as usize {
            self.buffer.put_u8(m8);
            self.buffer.put_u8(len as u8);
        } else if len <= u16::MAX as usize {
            self.buffer.put_u8(m16);
            self.buffer.put_u16(len as u16);
        } else if len <= u32::MAX as usize {
            self.buffer.put_u8(m32);
            self.buffer.put_u32(len as u32);
        } else {
            return Err(PackStreamError::ValueTooLarge(what, len));
        }
        Ok(())
    }
}

impl Default for PackStreamEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function to encode a single value.
pub fn encode(value: &PackStreamValue) -> Result<BytesMut, PackStreamError> {
    let mut encoder = PackStreamEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}
