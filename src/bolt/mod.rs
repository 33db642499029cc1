//! # Bolt Protocol Implementation
//!
//! Client side of Bolt protocol version 1 as spoken by Neo4j 3.x servers.
//!
//! ## Overview
//!
//! Bolt is a binary request/response protocol. Every message is a single
//! PackStream structure, split into length-prefixed chunks on the wire.
//! This module provides:
//!
//! - **PackStream** - Marker, collection and structure codecs plus a serde bridge
//! - **Message Types** - Request envelopes and response parsing
//! - **Handshake** - Protocol version negotiation
//! - **Codec** - Chunk framing for Tokio
//! - **Mapper** - Rust types to and from PackStream maps
//!
//! ## Submodules
//!
//! - [`packstream`] - Binary serialization/deserialization
//! - [`message`] - Bolt message types (INIT, RUN, PULL_ALL, etc.)
//! - [`handshake`] - Version negotiation
//! - [`codec`] - Tokio codec for async I/O
//! - [`mapper`] - Object mapping
//! - [`bits`] - Hex literal helpers
//! - [`error`] - Protocol error types
//!
//! ## Note
//!
//! Most users should use [`crate::driver::BoltConnection`] instead of
//! interacting with the codecs directly.

pub mod bits;
pub mod codec;
pub mod error;
pub mod handshake;
pub mod mapper;
pub mod message;
pub mod packstream;

pub use codec::{Chunk, ChunkCodec, MessageCodec, MAX_CHUNK_SIZE};
pub use error::{BoltError, BoltResult, HandshakeError};
pub use handshake::{BoltVersion, Handshake, BOLT_MAGIC, HANDSHAKE_RESPONSE_SIZE, HANDSHAKE_SIZE};
pub use mapper::{Node, Relationship};
pub use message::{
    AuthToken, FailureMetadata, Init, Query, Request, RequestContent, Response, Signature,
    SuccessMetadata,
};
pub use packstream::{
    PackStreamDecoder, PackStreamEncoder, PackStreamError, PackStreamStructure, PackStreamValue,
    PackedStruct,
};
