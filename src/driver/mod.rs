//! Driver Module
//!
//! Bolt v1 연결 핸들: 핸드셰이크, INIT, 쿼리 실행
//!
//! # Example
//!
//! ```no_run
//! use neo4j_binary::driver::{BoltConfig, BoltConnection};
//! use neo4j_binary::{AuthToken, Query};
//!
//! # async fn example() -> neo4j_binary::BoltResult<()> {
//! let config = BoltConfig::builder()
//!     .with_auth(AuthToken::basic("neo4j", "password"))
//!     .build()?;
//!
//! // 핸드셰이크 + INIT
//! let mut conn = BoltConnection::connect("localhost:7687", config).await?;
//!
//! // 쿼리 실행 (RUN + PULL_ALL)
//! let result = conn
//!     .run(Query::new("MATCH (n:Person) RETURN n LIMIT $limit").with_param("limit", 10))
//!     .await?;
//! for record in result {
//!     println!("{:?}", record.get("n"));
//! }
//!
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod record;

pub use config::{BoltConfig, BoltConfigBuilder};
pub use connection::{BoltConnection, BoltConnectionState, QueryResult};
pub use record::Record;
