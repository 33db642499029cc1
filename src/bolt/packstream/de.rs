//! serde deserializer over decoded PackStream values.
//!
//! Bytes are decoded into a [`PackStreamValue`] first; the value then drives
//! the target type's `Deserialize` impl. Map keys the target does not know
//! are ignored, as derived impls do by default.

use serde::de::value::StringDeserializer;
use serde::de::{self, DeserializeOwned, DeserializeSeed, IntoDeserializer, Visitor};
use serde::forward_to_deserialize_any;
use std::collections::{hash_map, HashMap};
use std::fmt;
use std::vec;

use super::decoder::decode;
use super::marker::MAX_SIGNATURE;
use super::ser::STRUCTURE_TOKEN;
use super::types::{PackStreamStructure, PackStreamValue};
use super::PackStreamError;

/// Deserialize `T` from an already decoded value.
pub fn from_value<T: DeserializeOwned>(value: PackStreamValue) -> Result<T, PackStreamError> {
    T::deserialize(value)
}

/// Decode one value from `bytes` and deserialize `T` from it.
pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, PackStreamError> {
    from_value(decode(bytes)?)
}

/// Deserialize a struct-shaped `T` from `incoming`, taking every member the
/// incoming map lacks from `defaults`.
///
/// Only the members `T` declares are looked up, so unknown incoming keys are
/// dropped and skipped members never see a value. Map-shaped targets get
/// every incoming entry.
pub fn from_map_with_defaults<T: DeserializeOwned>(
    incoming: HashMap<String, PackStreamValue>,
    defaults: HashMap<String, PackStreamValue>,
) -> Result<T, PackStreamError> {
    T::deserialize(Overlay { incoming, defaults })
}

fn key_deserializer(key: String) -> StringDeserializer<PackStreamError> {
    key.into_deserializer()
}

fn visit_list<'de, V: Visitor<'de>>(
    list: Vec<PackStreamValue>,
    visitor: V,
) -> Result<V::Value, PackStreamError> {
    let len = list.len();
    let mut access = SeqAccess {
        iter: list.into_iter(),
    };
    let value = visitor.visit_seq(&mut access)?;
    if access.iter.len() == 0 {
        Ok(value)
    } else {
        Err(de::Error::invalid_length(len, &"fewer elements in list"))
    }
}

fn visit_map<'de, V: Visitor<'de>>(
    map: HashMap<String, PackStreamValue>,
    visitor: V,
) -> Result<V::Value, PackStreamError> {
    visitor.visit_map(MapAccess {
        iter: map.into_iter(),
        value: None,
    })
}

impl<'de> de::Deserializer<'de> for PackStreamValue {
    type Error = PackStreamError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, PackStreamError> {
        match self {
            PackStreamValue::Null => visitor.visit_unit(),
            PackStreamValue::Boolean(b) => visitor.visit_bool(b),
            PackStreamValue::Integer(i) => visitor.visit_i64(i),
            PackStreamValue::Float(f) => visitor.visit_f64(f),
            PackStreamValue::String(s) => visitor.visit_string(s),
            PackStreamValue::List(l) => visit_list(l, visitor),
            PackStreamValue::Map(m) => visit_map(m, visitor),
            PackStreamValue::Structure(s) => {
                // a single-entry map keyed by the structure token, so that
                // `PackStreamValue`'s own visitor can rebuild it
                let mut parts = Vec::with_capacity(s.fields.len() + 1);
                parts.push(PackStreamValue::Integer(s.signature as i64));
                parts.extend(s.fields);
                let mut map = HashMap::with_capacity(1);
                map.insert(STRUCTURE_TOKEN.to_owned(), PackStreamValue::List(parts));
                visit_map(map, visitor)
            }
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, PackStreamError> {
        match self {
            PackStreamValue::Null => visitor.visit_none(),
            other => visitor.visit_some(other),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, PackStreamError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, PackStreamError> {
        match self {
            PackStreamValue::String(variant) => visitor.visit_enum(key_deserializer(variant)),
            PackStreamValue::Map(map) if map.len() == 1 => {
                let Some((variant, value)) = map.into_iter().next() else {
                    return Err(de::Error::invalid_length(0, &"a single-entry map"));
                };
                visitor.visit_enum(EnumAccess { variant, value })
            }
            other => Err(de::Error::invalid_type(
                de::Unexpected::Other(other.type_name()),
                &"a variant name or a single-entry map",
            )),
        }
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
        identifier ignored_any
    }
}

struct SeqAccess {
    iter: vec::IntoIter<PackStreamValue>,
}

impl<'de> de::SeqAccess<'de> for SeqAccess {
    type Error = PackStreamError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, PackStreamError> {
        match self.iter.next() {
            Some(value) => seed.deserialize(value).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct MapAccess {
    iter: hash_map::IntoIter<String, PackStreamValue>,
    value: Option<PackStreamValue>,
}

impl<'de> de::MapAccess<'de> for MapAccess {
    type Error = PackStreamError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, PackStreamError> {
        match self.iter.next() {
            Some((key, value)) => {
                self.value = Some(value);
                seed.deserialize(key_deserializer(key)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, PackStreamError> {
        match self.value.take() {
            Some(value) => seed.deserialize(value),
            None => Err(de::Error::custom("map value requested before its key")),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct EnumAccess {
    variant: String,
    value: PackStreamValue,
}

impl<'de> de::EnumAccess<'de> for EnumAccess {
    type Error = PackStreamError;
    type Variant = VariantAccess;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, VariantAccess), PackStreamError> {
        let variant = seed.deserialize(key_deserializer(self.variant))?;
        Ok((variant, VariantAccess { value: self.value }))
    }
}

struct VariantAccess {
    value: PackStreamValue,
}

impl<'de> de::VariantAccess<'de> for VariantAccess {
    type Error = PackStreamError;

    fn unit_variant(self) -> Result<(), PackStreamError> {
        de::Deserialize::deserialize(self.value)
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(
        self,
        seed: T,
    ) -> Result<T::Value, PackStreamError> {
        seed.deserialize(self.value)
    }

    fn tuple_variant<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, PackStreamError> {
        de::Deserializer::deserialize_seq(self.value, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, PackStreamError> {
        de::Deserializer::deserialize_map(self.value, visitor)
    }
}

/// Incoming map layered over a map of default member values.
struct Overlay {
    incoming: HashMap<String, PackStreamValue>,
    defaults: HashMap<String, PackStreamValue>,
}

impl<'de> de::Deserializer<'de> for Overlay {
    type Error = PackStreamError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, PackStreamError> {
        visit_map(self.incoming, visitor)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, PackStreamError> {
        let Overlay {
            mut incoming,
            mut defaults,
        } = self;
        let mut members = HashMap::with_capacity(fields.len());
        for field in fields {
            if let Some(value) = incoming.remove(*field).or_else(|| defaults.remove(*field)) {
                members.insert((*field).to_owned(), value);
            }
        }
        visit_map(members, visitor)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map enum identifier ignored_any
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = PackStreamValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a PackStream value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<PackStreamValue, E> {
        Ok(PackStreamValue::Boolean(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<PackStreamValue, E> {
        Ok(PackStreamValue::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<PackStreamValue, E> {
        i64::try_from(v)
            .map(PackStreamValue::Integer)
            .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &"a 64-bit signed integer"))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<PackStreamValue, E> {
        Ok(PackStreamValue::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<PackStreamValue, E> {
        Ok(PackStreamValue::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<PackStreamValue, E> {
        Ok(PackStreamValue::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<PackStreamValue, E> {
        Ok(PackStreamValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<PackStreamValue, E> {
        Ok(PackStreamValue::Null)
    }

    fn visit_some<D: de::Deserializer<'de>>(self, d: D) -> Result<PackStreamValue, D::Error> {
        de::Deserialize::deserialize(d)
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<PackStreamValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(1024));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(PackStreamValue::List(items))
    }

    fn visit_map<A: de::MapAccess<'de>>(self, mut access: A) -> Result<PackStreamValue, A::Error> {
        let mut map = HashMap::with_capacity(access.size_hint().unwrap_or(0).min(1024));
        while let Some(key) = access.next_key::<String>()? {
            if key == STRUCTURE_TOKEN {
                let parts: Vec<PackStreamValue> = access.next_value()?;
                return structure_from_parts(parts).map_err(de::Error::custom);
            }
            let value = access.next_value()?;
            map.insert(key, value);
        }
        Ok(PackStreamValue::Map(map))
    }
}

fn structure_from_parts(parts: Vec<PackStreamValue>) -> Result<PackStreamValue, String> {
    let mut parts = parts.into_iter();
    let signature = match parts.next() {
        Some(PackStreamValue::Integer(s)) => u8::try_from(s)
            .ok()
            .filter(|s| *s <= MAX_SIGNATURE)
            .ok_or_else(|| format!("{} is not a structure signature", s))?,
        _ => return Err("structure without a signature".to_owned()),
    };
    Ok(PackStreamValue::Structure(PackStreamStructure::new(
        signature,
        parts.collect(),
    )))
}

impl<'de> de::Deserialize<'de> for PackStreamValue {
    fn deserialize<D: de::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}
