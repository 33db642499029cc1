//! # neo4j-binary
//!
//! A client-side binary protocol stack for Neo4j: the PackStream value
//! format and Bolt protocol version 1.
//!
//! ## Features
//!
//! - **PackStream** - Canonical encoding of scalars, text, lists, maps and structures
//! - **Object Mapping** - Any serde type packs to and unpacks from a PackStream map
//! - **Chunk Framing** - Length-prefixed chunks with `tokio_util` codecs
//! - **Handshake** - Magic preamble and version negotiation
//! - **Async/Await** - A single connection handle built on Tokio
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use neo4j_binary::driver::{BoltConfig, BoltConnection};
//! use neo4j_binary::{AuthToken, Query};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BoltConfig::builder()
//!         .with_auth(AuthToken::basic("neo4j", "password"))
//!         .build()?;
//!     let mut conn = BoltConnection::connect("localhost:7687", config).await?;
//!
//!     let result = conn
//!         .run(Query::new("CREATE (n:Person {name: $name}) RETURN n").with_param("name", "Alice"))
//!         .await?;
//!     for record in result {
//!         println!("{:?}", record.values());
//!     }
//!
//!     conn.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Object Mapping
//!
//! Member policies come from serde attributes:
//!
//! ```rust
//! use neo4j_binary::mapper;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct Person {
//!     name: String,
//!     #[serde(rename = "yearOfBirth")]
//!     born: i64,
//!     #[serde(skip)]
//!     cached_age: Option<i64>,
//! }
//!
//! let bytes = mapper::pack(&Person { name: "Ann".into(), born: 1980, cached_age: Some(44) }).unwrap();
//! let back: Person = mapper::unpack(&bytes).unwrap();
//! assert_eq!(back.born, 1980);
//! assert_eq!(back.cached_age, None);
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`BoltResult`]; a FAILURE from the server surfaces
//! as [`BoltError::Failure`] and the connection waits for `ack_failure()`
//! or `reset()`.
//!
//! ## Modules
//!
//! - [`driver`] - Connection handle, configuration and records
//! - [`bolt`] - Protocol implementation
//!

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod bolt;
pub mod driver;

pub use bolt::{bits, codec, mapper, packstream};

// Re-exports for convenience
pub use bolt::{
    AuthToken, BoltError, BoltResult, BoltVersion, HandshakeError, Node, PackStreamError,
    PackStreamValue, PackedStruct, Query, Relationship, Signature,
};
pub use driver::{BoltConfig, BoltConnection, QueryResult, Record};
