//! Bolt v1 message envelopes.
//!
//! Every request and response is a single PackStream structure whose
//! signature byte names the message. Graph entities inside records use the
//! same structure encoding with their own signatures.

pub mod request;
pub mod response;

pub use request::{AuthToken, Init, Query, Request, RequestContent};
pub use response::{parse_response, FailureMetadata, Response, SuccessMetadata};

use std::fmt;

use super::error::BoltError;

/// Structure signatures known to protocol version 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Signature {
    /// INIT request
    Init = 0x01,
    /// ACK_FAILURE request
    AckFailure = 0x0E,
    /// RESET request
    Reset = 0x0F,
    /// RUN request
    Run = 0x10,
    /// DISCARD_ALL request
    DiscardAll = 0x2F,
    /// PULL_ALL request
    PullAll = 0x3F,
    /// SUCCESS response
    Success = 0x70,
    /// RECORD response
    Record = 0x71,
    /// IGNORED response
    Ignored = 0x7E,
    /// FAILURE response
    Failure = 0x7F,
    /// Node entity ('N')
    Node = 0x4E,
    /// Relationship entity ('R')
    Relationship = 0x52,
    /// Relationship without endpoints, inside a path ('r')
    UnboundRelationship = 0x72,
    /// Path entity ('P')
    Path = 0x50,
}

impl Signature {
    /// Look up a signature byte.
    pub fn from_u8(byte: u8) -> Option<Signature> {
        let signature = match byte {
            0x01 => Signature::Init,
            0x0E => Signature::AckFailure,
            0x0F => Signature::Reset,
            0x10 => Signature::Run,
            0x2F => Signature::DiscardAll,
            0x3F => Signature::PullAll,
            0x70 => Signature::Success,
            0x71 => Signature::Record,
            0x7E => Signature::Ignored,
            0x7F => Signature::Failure,
            0x4E => Signature::Node,
            0x52 => Signature::Relationship,
            0x72 => Signature::UnboundRelationship,
            0x50 => Signature::Path,
            _ => return None,
        };
        Some(signature)
    }

    /// The signature byte.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Protocol name for logging.
    pub fn name(self) -> &'static str {
        match self {
            Signature::Init => "INIT",
            Signature::AckFailure => "ACK_FAILURE",
            Signature::Reset => "RESET",
            Signature::Run => "RUN",
            Signature::DiscardAll => "DISCARD_ALL",
            Signature::PullAll => "PULL_ALL",
            Signature::Success => "SUCCESS",
            Signature::Record => "RECORD",
            Signature::Ignored => "IGNORED",
            Signature::Failure => "FAILURE",
            Signature::Node => "NODE",
            Signature::Relationship => "RELATIONSHIP",
            Signature::UnboundRelationship => "UNBOUND_RELATIONSHIP",
            Signature::Path => "PATH",
        }
    }

    /// Sent by the client.
    pub fn is_request(self) -> bool {
        matches!(
            self,
            Signature::Init
                | Signature::AckFailure
                | Signature::Reset
                | Signature::Run
                | Signature::DiscardAll
                | Signature::PullAll
        )
    }

    /// Sent by the server as a top-level message.
    pub fn is_response(self) -> bool {
        matches!(
            self,
            Signature::Success | Signature::Record | Signature::Ignored | Signature::Failure
        )
    }
}

impl TryFrom<u8> for Signature {
    type Error = BoltError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Signature::from_u8(byte)
            .ok_or_else(|| BoltError::protocol(format!("unknown signature 0x{:02X}", byte)))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
