//! Object mapping between Rust types and PackStream maps.
//!
//! A type's serde impl is its member descriptor: `#[serde(skip)]` keeps a
//! member off the wire in both directions and `#[serde(rename = "...")]`
//! gives it a different wire name. Struct members are packed in
//! declaration order.
//!
//! Unpacking starts from `T::default()`: incoming keys overwrite the members
//! they name, unknown keys are dropped, and members the map does not mention
//! keep their default value.

use bytes::BytesMut;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::message::Signature;
use super::packstream::{
    de, to_bytes, MarkerKind, PackStreamDecoder, PackStreamStructure, PackStreamValue,
    PackedStruct,
};
use super::{BoltError, BoltResult};

/// A graph node with its properties mapped into `T`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node<T> {
    /// Node identity
    pub id: String,
    /// Node labels
    pub labels: Vec<String>,
    /// Mapped properties
    pub data: T,
}

/// A relationship with its properties mapped into `T`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationship<T> {
    /// Relationship identity
    pub id: String,
    /// Identity of the start node
    pub start_id: String,
    /// Identity of the end node
    pub end_id: String,
    /// Relationship type
    pub rel_type: String,
    /// Mapped properties
    pub data: T,
}

/// Pack `object` as a PackStream map.
pub fn pack<T: Serialize + ?Sized>(object: &T) -> BoltResult<BytesMut> {
    let bytes = to_bytes(object)?;
    match bytes.first().copied().and_then(MarkerKind::of) {
        Some(MarkerKind::Map) => Ok(bytes),
        _ => Err(BoltError::mapping(format!(
            "{} does not serialize as a map",
            std::any::type_name::<T>()
        ))),
    }
}

/// Pack `object` and decode it back into its entries.
pub fn to_map<T: Serialize + ?Sized>(object: &T) -> BoltResult<HashMap<String, PackStreamValue>> {
    let bytes = pack(object)?;
    match PackStreamDecoder::new(&bytes).decode()? {
        PackStreamValue::Map(map) => Ok(map),
        other => Err(BoltError::mapping(format!(
            "expected a map, found {}",
            other.type_name()
        ))),
    }
}

/// Unpack a map from `bytes` into `T`.
pub fn unpack<T>(bytes: &[u8]) -> BoltResult<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    unpack_from(&mut PackStreamDecoder::new(bytes))
}

/// Unpack the map at the decoder's position into `T`.
pub fn unpack_from<T>(decoder: &mut PackStreamDecoder<'_>) -> BoltResult<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    from_value(decoder.decode()?)
}

/// Lay the entries of a decoded map over `T::default()`.
fn from_value<T>(value: PackStreamValue) -> BoltResult<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    let incoming = match value {
        PackStreamValue::Map(map) => map,
        other => {
            return Err(BoltError::mapping(format!(
                "expected a map, found {}",
                other.type_name()
            )))
        }
    };
    let defaults = match PackStreamDecoder::new(&to_bytes(&T::default())?).decode()? {
        PackStreamValue::Map(map) => map,
        _ => HashMap::new(),
    };
    Ok(de::from_map_with_defaults(incoming, defaults)?)
}

/// Read a NODE structure: identity, labels, then properties into `T`.
pub fn get_node<T>(packed: &PackedStruct) -> BoltResult<Node<T>>
where
    T: Serialize + DeserializeOwned + Default,
{
    expect_struct(packed, Signature::Node, 3)?;
    let mut fields = packed.fields();

    Ok(Node {
        id: read_identity(&mut fields)?,
        labels: read_text_list(&mut fields)?,
        data: unpack_from(&mut fields)?,
    })
}

/// Read a RELATIONSHIP structure: identity, start and end identities,
/// type, then properties into `T`.
pub fn get_relationship<T>(packed: &PackedStruct) -> BoltResult<Relationship<T>>
where
    T: Serialize + DeserializeOwned + Default,
{
    expect_struct(packed, Signature::Relationship, 5)?;
    let mut fields = packed.fields();

    Ok(Relationship {
        id: read_identity(&mut fields)?,
        start_id: read_identity(&mut fields)?,
        end_id: read_identity(&mut fields)?,
        rel_type: fields.read_str()?.to_owned(),
        data: unpack_from(&mut fields)?,
    })
}

/// Read an already decoded NODE structure.
pub fn node_from_structure<T>(structure: &PackStreamStructure) -> BoltResult<Node<T>>
where
    T: Serialize + DeserializeOwned + Default,
{
    check_shape(structure.signature, structure.len(), Signature::Node, 3)?;
    let (id, labels, properties) = (&structure.fields[0], &structure.fields[1], &structure.fields[2]);

    let id = match id {
        PackStreamValue::String(id) => id.clone(),
        PackStreamValue::Integer(id) => id.to_string(),
        other => return Err(node_field("identity", other)),
    };
    let labels = match labels {
        PackStreamValue::List(labels) => labels
            .iter()
            .map(|label| match label {
                PackStreamValue::String(label) => Ok(label.clone()),
                other => Err(node_field("label", other)),
            })
            .collect::<BoltResult<Vec<_>>>()?,
        other => return Err(node_field("labels", other)),
    };

    Ok(Node {
        id,
        labels,
        data: from_value(properties.clone())?,
    })
}

fn node_field(what: &str, found: &PackStreamValue) -> BoltError {
    BoltError::protocol(format!("NODE {} cannot be {}", what, found.type_name()))
}

fn expect_struct(packed: &PackedStruct, signature: Signature, min_fields: usize) -> BoltResult<()> {
    check_shape(packed.signature(), packed.len(), signature, min_fields)
}

fn check_shape(found: u8, len: usize, signature: Signature, min_fields: usize) -> BoltResult<()> {
    if found != signature.as_u8() {
        return Err(BoltError::protocol(format!(
            "expected {} structure, found signature 0x{:02X}",
            signature, found
        )));
    }
    if len < min_fields {
        return Err(BoltError::protocol(format!(
            "{} structure has {} fields, expected {}",
            signature, len, min_fields
        )));
    }
    Ok(())
}

/// Identities are text on the wire; servers that send integers get them
/// rendered in decimal.
fn read_identity(fields: &mut PackStreamDecoder<'_>) -> BoltResult<String> {
    match MarkerKind::of(fields.peek_marker()?) {
        Some(MarkerKind::Integer) => Ok(fields.read_int()?.to_string()),
        _ => Ok(fields.read_str()?.to_owned()),
    }
}

fn read_text_list(fields: &mut PackStreamDecoder<'_>) -> BoltResult<Vec<String>> {
    let len = fields.read_list_header()?;
    (0..len)
        .map(|_| -> BoltResult<String> { Ok(fields.read_str()?.to_owned()) })
        .collect()
}
