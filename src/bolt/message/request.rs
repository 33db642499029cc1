//! Bolt request messages.
//!
//! A request is a structure whose signature names the message and whose
//! fields come from the request content. The content type decides the
//! field count: text and scalars are one field, a [`Query`] is two
//! (statement and parameters), `()` is none.

use bytes::BytesMut;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use super::Signature;
use crate::bolt::codec::chunk_message;
use crate::bolt::mapper;
use crate::bolt::packstream::{PackStreamEncoder, PackStreamValue};
use crate::bolt::BoltResult;

/// Content that can be packed as the fields of a request structure.
pub trait RequestContent {
    /// Number of structure fields this content occupies.
    fn field_count(&self) -> usize;

    /// Write the fields.
    fn pack_fields(&self, encoder: &mut PackStreamEncoder) -> BoltResult<()>;
}

impl RequestContent for () {
    fn field_count(&self) -> usize {
        0
    }

    fn pack_fields(&self, _encoder: &mut PackStreamEncoder) -> BoltResult<()> {
        Ok(())
    }
}

impl RequestContent for str {
    fn field_count(&self) -> usize {
        1
    }

    fn pack_fields(&self, encoder: &mut PackStreamEncoder) -> BoltResult<()> {
        Ok(encoder.encode_string(self)?)
    }
}

impl RequestContent for String {
    fn field_count(&self) -> usize {
        1
    }

    fn pack_fields(&self, encoder: &mut PackStreamEncoder) -> BoltResult<()> {
        self.as_str().pack_fields(encoder)
    }
}

impl RequestContent for i64 {
    fn field_count(&self) -> usize {
        1
    }

    fn pack_fields(&self, encoder: &mut PackStreamEncoder) -> BoltResult<()> {
        encoder.encode_int(*self);
        Ok(())
    }
}

impl RequestContent for bool {
    fn field_count(&self) -> usize {
        1
    }

    fn pack_fields(&self, encoder: &mut PackStreamEncoder) -> BoltResult<()> {
        encoder.encode_bool(*self);
        Ok(())
    }
}

impl RequestContent for f64 {
    fn field_count(&self) -> usize {
        1
    }

    fn pack_fields(&self, encoder: &mut PackStreamEncoder) -> BoltResult<()> {
        encoder.encode_float(*self);
        Ok(())
    }
}

impl RequestContent for PackStreamValue {
    fn field_count(&self) -> usize {
        1
    }

    fn pack_fields(&self, encoder: &mut PackStreamEncoder) -> BoltResult<()> {
        Ok(encoder.encode(self)?)
    }
}

impl<T: RequestContent + ?Sized> RequestContent for &T {
    fn field_count(&self) -> usize {
        (**self).field_count()
    }

    fn pack_fields(&self, encoder: &mut PackStreamEncoder) -> BoltResult<()> {
        (**self).pack_fields(encoder)
    }
}

/// A Cypher statement with its parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Statement text
    pub cypher: String,
    /// Named parameters
    pub parameters: HashMap<String, PackStreamValue>,
}

impl Query {
    /// Create a query without parameters.
    pub fn new(cypher: impl Into<String>) -> Self {
        Self {
            cypher: cypher.into(),
            parameters: HashMap::new(),
        }
    }

    /// Add a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<PackStreamValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Add every member of a serializable object as a parameter.
    pub fn with_parameters<T: Serialize + ?Sized>(mut self, object: &T) -> BoltResult<Self> {
        self.parameters.extend(mapper::to_map(object)?);
        Ok(self)
    }
}

impl RequestContent for Query {
    fn field_count(&self) -> usize {
        2
    }

    fn pack_fields(&self, encoder: &mut PackStreamEncoder) -> BoltResult<()> {
        encoder.encode_string(&self.cypher)?;
        encoder.encode_map(&self.parameters)?;
        Ok(())
    }
}

/// Authentication token sent with INIT.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct AuthToken {
    /// Authentication scheme ("none", "basic")
    pub scheme: String,
    /// Principal (username)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    /// Credentials (password)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,
}

impl AuthToken {
    /// Create a basic auth token.
    pub fn basic(principal: impl Into<String>, credentials: impl Into<String>) -> Self {
        Self {
            scheme: "basic".to_string(),
            principal: Some(principal.into()),
            credentials: Some(credentials.into()),
        }
    }

    /// Create an anonymous auth token (no auth).
    pub fn none() -> Self {
        Self {
            scheme: "none".to_string(),
            principal: None,
            credentials: None,
        }
    }
}

impl Default for AuthToken {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("scheme", &self.scheme)
            .field("principal", &self.principal)
            .field("credentials", &self.credentials.as_ref().map(|_| "*****"))
            .finish()
    }
}

/// INIT content: client name and authentication token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Init {
    /// Client name and version
    pub user_agent: String,
    /// Authentication token
    pub auth: AuthToken,
}

impl RequestContent for Init {
    fn field_count(&self) -> usize {
        2
    }

    fn pack_fields(&self, encoder: &mut PackStreamEncoder) -> BoltResult<()> {
        encoder.encode_string(&self.user_agent)?;
        encoder.put_raw(&mapper::pack(&self.auth)?);
        Ok(())
    }
}

/// A request envelope: signature plus content.
#[derive(Debug, Clone, PartialEq)]
pub struct Request<C> {
    signature: Signature,
    content: C,
}

impl<C: RequestContent> Request<C> {
    /// Create a request.
    pub fn new(signature: Signature, content: C) -> Self {
        Self { signature, content }
    }

    /// Message signature.
    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// Message content.
    pub fn content(&self) -> &C {
        &self.content
    }

    /// Encode as a structure.
    pub fn to_bytes(&self) -> BoltResult<BytesMut> {
        let mut encoder = PackStreamEncoder::new();
        encoder.encode_struct_header(self.content.field_count(), self.signature.as_u8())?;
        self.content.pack_fields(&mut encoder)?;
        Ok(encoder.into_bytes())
    }

    /// Encode as a structure and frame it into chunks of at most
    /// `max_chunk_size` bytes, end marker included.
    pub fn to_chunks(&self, max_chunk_size: usize) -> BoltResult<BytesMut> {
        let packed = self.to_bytes()?;
        let mut framed = BytesMut::with_capacity(packed.len() + 8);
        chunk_message(&packed, max_chunk_size, &mut framed)?;
        Ok(framed)
    }
}

impl Request<Init> {
    /// INIT with the client name and auth token.
    pub fn init(user_agent: impl Into<String>, auth: AuthToken) -> Self {
        Self::new(
            Signature::Init,
            Init {
                user_agent: user_agent.into(),
                auth,
            },
        )
    }
}

impl Request<Query> {
    /// RUN a statement.
    pub fn run(query: Query) -> Self {
        Self::new(Signature::Run, query)
    }
}

impl Request<()> {
    /// PULL_ALL: stream every remaining record.
    pub fn pull_all() -> Self {
        Self::new(Signature::PullAll, ())
    }

    /// DISCARD_ALL: drop every remaining record.
    pub fn discard_all() -> Self {
        Self::new(Signature::DiscardAll, ())
    }

    /// RESET: return the connection to a clean state.
    pub fn reset() -> Self {
        Self::new(Signature::Reset, ())
    }

    /// ACK_FAILURE: acknowledge a FAILURE so later requests are processed.
    pub fn ack_failure() -> Self {
        Self::new(Signature::AckFailure, ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bolt::codec::MAX_CHUNK_SIZE;
    use crate::bolt::BoltError;

    #[test]
    fn test_pull_all_chunk() {
        let chunk = Request::pull_all().to_chunks(MAX_CHUNK_SIZE).unwrap();
        assert_eq!(&chunk[..], &[0x00, 0x02, 0xB0, 0x3F, 0x00, 0x00]);
    }

    #[test]
    fn test_text_content_is_one_field() {
        let bytes = Request::new(Signature::Init, "MyClient/1.0").to_bytes().unwrap();
        assert_eq!(&bytes[..3], &[0xB1, 0x01, 0x8C]);
        assert_eq!(&bytes[3..], b"MyClient/1.0");
    }

    #[test]
    fn test_query_is_two_fields() {
        let bytes = Request::run(Query::new("RETURN 1")).to_bytes().unwrap();
        let mut expected = vec![0xB2, 0x10, 0x88];
        expected.extend_from_slice(b"RETURN 1");
        expected.push(0xA0);
        assert_eq!(&bytes[..], &expected[..]);
    }

    #[test]
    fn test_query_parameters() {
        #[derive(Serialize)]
        struct Params {
            name: &'static str,
            age: i64,
        }

        let query = Query::new("CREATE (n {name: $name})")
            .with_parameters(&Params { name: "Ann", age: 3 })
            .unwrap()
            .with_param("extra", true);
        assert_eq!(query.parameters.len(), 3);
        assert_eq!(query.parameters["name"], PackStreamValue::from("Ann"));
        assert_eq!(query.parameters["age"], PackStreamValue::Integer(3));

        assert!(matches!(
            Query::new("x").with_parameters(&5),
            Err(BoltError::Mapping(_))
        ));
    }

    #[test]
    fn test_init_packs_auth_map() {
        let request = Request::init("agent", AuthToken::none());
        let bytes = request.to_bytes().unwrap();
        let mut expected = vec![0xB2, 0x01, 0x85];
        expected.extend_from_slice(b"agent");
        expected.extend_from_slice(&[0xA1, 0x86]);
        expected.extend_from_slice(b"scheme");
        expected.push(0x84);
        expected.extend_from_slice(b"none");
        assert_eq!(&bytes[..], &expected[..]);
    }

    #[test]
    fn test_scalar_contents() {
        assert_eq!(
            &Request::new(Signature::Run, 1i64).to_bytes().unwrap()[..],
            &[0xB1, 0x10, 0x01]
        );
        assert_eq!(
            &Request::new(Signature::Run, true).to_bytes().unwrap()[..],
            &[0xB1, 0x10, 0xC3]
        );
    }

    #[test]
    fn test_large_request_spans_chunks() {
        let text = "x".repeat(100);
        let framed = Request::new(Signature::Run, text.as_str()).to_chunks(40).unwrap();
        // B1 10 D0 64 + 100 bytes = 104 bytes -> 40 + 40 + 24
        assert_eq!(framed.len(), 104 + 3 * 2 + 2);
        assert_eq!(&framed[..2], &[0x00, 40]);
        assert!(framed.ends_with(&[0x00, 0x00]));
    }

    #[test]
    fn test_chunk_size_validated() {
        assert!(matches!(
            Request::pull_all().to_chunks(65_536),
            Err(BoltError::Validation(_))
        ));
    }

    #[test]
    fn test_auth_debug_hides_credentials() {
        let debug = format!("{:?}", AuthToken::basic("neo4j", "secret"));
        assert!(debug.contains("neo4j"));
        assert!(!debug.contains("secret"));
    }
}
