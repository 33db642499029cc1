//! Client side of the Bolt version negotiation.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use super::{BoltVersion, HandshakeError, BOLT_MAGIC, HANDSHAKE_RESPONSE_SIZE, HANDSHAKE_SIZE};
use crate::bolt::BoltResult;

/// Maximum number of version slots in a handshake.
pub const MAX_PROPOSALS: usize = 4;

/// Bolt handshake proposer.
///
/// The handshake process:
/// 1. Client sends 20 bytes: 4-byte magic + 4 x 4-byte version proposals
/// 2. Server picks the first proposal it supports
/// 3. Server responds with the 4-byte agreed version (or 0x00000000 if none)
///
/// Unused proposal slots are sent as zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Proposed versions, in order of preference
    proposals: Vec<BoltVersion>,
}

impl Handshake {
    /// Propose every supported version.
    pub fn new() -> Self {
        Self {
            proposals: BoltVersion::ALL.to_vec(),
        }
    }

    /// Propose specific versions, most preferred first.
    pub fn with_versions(versions: Vec<BoltVersion>) -> Result<Self, HandshakeError> {
        if versions.is_empty() {
            return Err(HandshakeError::InvalidProposal(
                "at least one version is required".to_string(),
            ));
        }
        if versions.len() > MAX_PROPOSALS {
            return Err(HandshakeError::InvalidProposal(format!(
                "at most {} versions fit in a handshake, got {}",
                MAX_PROPOSALS,
                versions.len()
            )));
        }
        Ok(Self {
            proposals: versions,
        })
    }

    /// Proposed versions.
    pub fn proposals(&self) -> &[BoltVersion] {
        &self.proposals
    }

    /// The 20 bytes sent to the server.
    pub fn request_bytes(&self) -> [u8; HANDSHAKE_SIZE] {
        let mut data = [0u8; HANDSHAKE_SIZE];
        data[0..4].copy_from_slice(&BOLT_MAGIC);

        for (i, version) in self.proposals.iter().take(MAX_PROPOSALS).enumerate() {
            let offset = 4 + i * 4;
            data[offset..offset + 4].copy_from_slice(&version.to_bytes());
        }

        data
    }

    /// Interpret the server's 4-byte reply.
    pub fn interpret_reply(
        &self,
        reply: [u8; HANDSHAKE_RESPONSE_SIZE],
    ) -> Result<BoltVersion, HandshakeError> {
        let raw = u32::from_be_bytes(reply);
        if raw == 0 {
            return Err(HandshakeError::Rejected);
        }
        match BoltVersion::from_u32(raw) {
            Some(version) if self.proposals.contains(&version) => Ok(version),
            _ => Err(HandshakeError::UnsupportedVersion(raw)),
        }
    }

    /// Run the handshake over `stream`.
    pub async fn negotiate<S>(&self, stream: &mut S) -> BoltResult<BoltVersion>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        debug!("Proposing Bolt versions {:?}", self.proposals);
        stream.write_all(&self.request_bytes()).await?;
        stream.flush().await?;

        let mut reply = [0u8; HANDSHAKE_RESPONSE_SIZE];
        if let Err(e) = stream.read_exact(&mut reply).await {
            return Err(match e.kind() {
                io::ErrorKind::UnexpectedEof => HandshakeError::ConnectionClosed.into(),
                _ => e.into(),
            });
        }

        match self.interpret_reply(reply) {
            Ok(version) => {
                debug!("Negotiated {}", version);
                Ok(version)
            }
            Err(e) => {
                warn!("Handshake failed: {}", e);
                Err(e.into())
            }
        }
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}
