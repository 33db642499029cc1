//! Bolt response messages.
//!
//! Responses arrive as chunked messages. Each reassembled message holds one
//! or more structures; SUCCESS and FAILURE carry a metadata map, RECORD
//! carries a list of values.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Signature;
use crate::bolt::codec::dechunk;
use crate::bolt::mapper;
use crate::bolt::packstream::{PackStreamDecoder, PackedStruct};
use crate::bolt::{BoltError, BoltResult};

/// Reassemble the chunked bytes in `bytes` and unpack every structure, in
/// order.
pub fn parse_response(bytes: &[u8]) -> BoltResult<Vec<PackedStruct>> {
    let mut structs = Vec::new();
    for message in dechunk(bytes)? {
        structs.extend(unpack_all(&message)?);
    }
    Ok(structs)
}

/// Unpack structures from one message's content until it is exhausted.
pub(crate) fn unpack_all(message: &[u8]) -> BoltResult<Vec<PackedStruct>> {
    let mut decoder = PackStreamDecoder::new(message);
    let mut structs = Vec::new();
    while !decoder.is_empty() {
        structs.push(PackedStruct::read(&mut decoder)?);
    }
    Ok(structs)
}

/// Metadata of a SUCCESS message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuccessMetadata {
    /// Result column names (reply to RUN)
    pub fields: Vec<String>,
    /// Server agent (reply to INIT)
    pub server: Option<String>,
    /// Milliseconds until the first record was available
    pub result_available_after: Option<i64>,
    /// Milliseconds until the last record was consumed
    pub result_consumed_after: Option<i64>,
    /// Statement type ("r", "rw", "w", "s")
    #[serde(rename = "type")]
    pub query_type: Option<String>,
}

/// Metadata of a FAILURE message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureMetadata {
    /// Neo4j status code
    pub code: String,
    /// Error message
    pub message: String,
}

impl FailureMetadata {
    /// Get error classification from code ("ClientError", "TransientError", ...).
    pub fn classification(&self) -> &str {
        self.code.split('.').nth(1).unwrap_or("Unknown")
    }

    /// Check if this is a client error.
    pub fn is_client_error(&self) -> bool {
        self.classification() == "ClientError"
    }

    /// Check if this is a transient error.
    pub fn is_transient(&self) -> bool {
        self.classification() == "TransientError"
    }
}

impl fmt::Display for FailureMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl From<FailureMetadata> for BoltError {
    fn from(failure: FailureMetadata) -> Self {
        BoltError::Failure {
            code: failure.code,
            message: failure.message,
        }
    }
}

/// A response message.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// SUCCESS - request completed
    Success(SuccessMetadata),
    /// RECORD - one result row, fields still encoded
    Record(PackedStruct),
    /// FAILURE - request failed
    Failure(FailureMetadata),
    /// IGNORED - request skipped because of an earlier failure
    Ignored,
}

impl Response {
    /// Interpret a structure received from the server.
    pub fn from_struct(packed: PackedStruct) -> BoltResult<Self> {
        let signature = Signature::try_from(packed.signature())?;
        let response = match signature {
            Signature::Success => Response::Success(metadata(&packed)?),
            Signature::Failure => Response::Failure(metadata(&packed)?),
            Signature::Record => Response::Record(packed),
            Signature::Ignored => Response::Ignored,
            other => {
                return Err(BoltError::protocol(format!(
                    "{} is not a response message",
                    other
                )))
            }
        };
        Ok(response)
    }

    /// Message signature.
    pub fn signature(&self) -> Signature {
        match self {
            Response::Success(_) => Signature::Success,
            Response::Record(_) => Signature::Record,
            Response::Failure(_) => Signature::Failure,
            Response::Ignored => Signature::Ignored,
        }
    }

    /// Check if this is a success response.
    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success(_))
    }
}

/// Metadata is the single map field; a field-less summary means no metadata.
fn metadata<T>(packed: &PackedStruct) -> BoltResult<T>
where
    T: Serialize + serde::de::DeserializeOwned + Default,
{
    if packed.is_empty() {
        return Ok(T::default());
    }
    mapper::unpack_from(&mut packed.fields())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bolt::codec::{chunk_message, MAX_CHUNK_SIZE};
    use bytes::BytesMut;

    const SUCCESS_FIELDS_X: [u8; 13] = [
        0xB1, 0x70, 0xA1, 0x86, b'f', b'i', b'e', b'l', b'd', b's', 0x91, 0x81, b'x',
    ];

    fn framed(messages: &[&[u8]]) -> BytesMut {
        let mut buf = BytesMut::new();
        for m in messages {
            chunk_message(m, MAX_CHUNK_SIZE, &mut buf).unwrap();
        }
        buf
    }

    #[test]
    fn test_parse_run_pull_exchange() {
        let record = [0xB1, 0x71, 0x91, 0x01];
        let summary = [0xB1, 0x70, 0xA0];
        let bytes = framed(&[&SUCCESS_FIELDS_X, &record, &summary]);

        let structs = parse_response(&bytes).unwrap();
        assert_eq!(structs.len(), 3);
        assert_eq!(structs[0].signature(), 0x70);
        assert_eq!(structs[1].signature(), 0x71);
        assert_eq!(structs[2].signature(), 0x70);

        match Response::from_struct(structs[0].clone()).unwrap() {
            Response::Success(meta) => assert_eq!(meta.fields, vec!["x".to_string()]),
            other => panic!("expected SUCCESS, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_tolerates_small_chunks() {
        let mut buf = BytesMut::new();
        chunk_message(&SUCCESS_FIELDS_X, 3, &mut buf).unwrap();
        let structs = parse_response(&buf).unwrap();
        assert_eq!(structs.len(), 1);
        assert_eq!(structs[0].to_bytes(), BytesMut::from(&SUCCESS_FIELDS_X[..]));
    }

    #[test]
    fn test_failure_response() {
        let mut bytes = vec![0xB1, 0x7F, 0xA2, 0x84];
        bytes.extend_from_slice(b"code");
        bytes.push(0xD0);
        bytes.push(37);
        bytes.extend_from_slice(b"Neo.ClientError.Statement.SyntaxError");
        bytes.push(0x87);
        bytes.extend_from_slice(b"message");
        bytes.push(0x83);
        bytes.extend_from_slice(b"bad");

        let packed = PackedStruct::unpack(&bytes).unwrap();
        match Response::from_struct(packed).unwrap() {
            Response::Failure(failure) => {
                assert!(failure.is_client_error());
                assert!(!failure.is_transient());
                assert_eq!(failure.message, "bad");
                let err: BoltError = failure.into();
                assert!(err.to_string().contains("SyntaxError"));
            }
            other => panic!("expected FAILURE, got {:?}", other),
        }
    }

    #[test]
    fn test_ignored_and_unknown() {
        let ignored = PackedStruct::unpack(&[0xB0, 0x7E]).unwrap();
        assert_eq!(Response::from_struct(ignored).unwrap(), Response::Ignored);

        let node = PackedStruct::unpack(&[0xB0, 0x4E]).unwrap();
        assert!(matches!(
            Response::from_struct(node),
            Err(BoltError::ProtocolViolation(_))
        ));
        let unknown = PackedStruct::unpack(&[0xB0, 0x55]).unwrap();
        assert!(matches!(
            Response::from_struct(unknown),
            Err(BoltError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_unpack_all_rejects_non_struct() {
        assert!(matches!(unpack_all(&[0xC0]), Err(BoltError::Format(_))));
    }
}
