//! Bolt protocol connection for client-side use.
//!
//! Performs the handshake and INIT exchange, then runs queries one exchange
//! at a time: a request is written only after the reply to the previous one
//! has been read.

use futures::{SinkExt, StreamExt};
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, trace, warn};

use super::config::BoltConfig;
use super::record::Record;
use crate::bolt::codec::MessageCodec;
use crate::bolt::message::{Query, Request, RequestContent, Response, SuccessMetadata};
use crate::bolt::{BoltError, BoltResult, BoltVersion};

/// Bolt connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoltConnectionState {
    /// Handshake completed, INIT not yet accepted
    Connected,
    /// Ready for requests
    Ready,
    /// The server answered with FAILURE; ACK_FAILURE or RESET is required
    Failed,
    /// Closed, or the stream can no longer be trusted
    Closed,
}

/// Result of a RUN + PULL_ALL exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Column names from the RUN reply
    pub fields: Vec<String>,
    /// Records in arrival order
    pub records: Vec<Record>,
    /// Metadata of the closing SUCCESS
    pub summary: SuccessMetadata,
}

impl QueryResult {
    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record was returned.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over the records.
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }
}

impl IntoIterator for QueryResult {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// Client-side Bolt connection over any async byte stream.
pub struct BoltConnection<S> {
    /// Chunk-framed stream
    framed: Framed<S, MessageCodec>,
    /// Negotiated protocol version
    version: BoltVersion,
    /// Connection state
    state: BoltConnectionState,
    /// Server agent reported in the INIT reply
    server_agent: Option<String>,
    config: BoltConfig,
}

impl BoltConnection<TcpStream> {
    /// Connect to a Bolt server, negotiate a version and send INIT.
    pub async fn connect(address: &str, config: BoltConfig) -> BoltResult<Self> {
        config.validate()?;

        let stream = tokio::time::timeout(config.connection_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("Connection to {} timed out", address),
                )
            })??;

        // Enable TCP nodelay for lower latency
        stream.set_nodelay(true).ok();
        debug!("Connected to {}", address);

        let mut connection = Self::handshake(stream, config).await?;
        connection.init().await?;
        Ok(connection)
    }
}

impl<S> BoltConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Negotiate a protocol version over an already open stream.
    pub async fn handshake(mut stream: S, config: BoltConfig) -> BoltResult<Self> {
        config.validate()?;

        let version = config.handshake()?.negotiate(&mut stream).await?;
        let codec = MessageCodec::new(config.chunk_codec()?);

        Ok(Self {
            framed: Framed::new(stream, codec),
            version,
            state: BoltConnectionState::Connected,
            server_agent: None,
            config,
        })
    }

    /// Send INIT with the configured user agent and auth token.
    pub async fn init(&mut self) -> BoltResult<SuccessMetadata> {
        self.ensure_state(BoltConnectionState::Connected, "INIT")?;

        let request = Request::init(self.config.user_agent.clone(), self.config.auth.clone());
        self.send(request).await?;
        // a rejected INIT leaves nothing to recover
        let metadata = match self.summary().await {
            Ok(metadata) => metadata,
            Err(e) => {
                self.state = BoltConnectionState::Closed;
                return Err(e);
            }
        };

        self.server_agent = metadata.server.clone();
        self.state = BoltConnectionState::Ready;
        debug!(
            "Initialized {} connection (server: {})",
            self.version,
            self.server_agent.as_deref().unwrap_or("unknown")
        );
        Ok(metadata)
    }

    /// RUN a query and PULL_ALL of its records.
    pub async fn run(&mut self, query: Query) -> BoltResult<QueryResult> {
        self.ensure_state(BoltConnectionState::Ready, "RUN")?;

        self.send(Request::run(query)).await?;
        let fields = self.summary().await?.fields;

        self.send(Request::pull_all()).await?;
        let mut records = Vec::new();
        loop {
            match self.recv().await? {
                Response::Record(packed) => match Record::from_struct(&fields, &packed) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        // the rest of the stream is still unread
                        self.state = BoltConnectionState::Closed;
                        return Err(e);
                    }
                },
                other => {
                    let summary = self.expect_summary(other)?;
                    return Ok(QueryResult {
                        fields,
                        records,
                        summary,
                    });
                }
            }
        }
    }

    /// RUN a query and DISCARD_ALL of its records, returning the closing
    /// summary.
    pub async fn execute(&mut self, query: Query) -> BoltResult<SuccessMetadata> {
        self.ensure_state(BoltConnectionState::Ready, "RUN")?;

        self.send(Request::run(query)).await?;
        self.summary().await?;

        self.send(Request::discard_all()).await?;
        self.summary().await
    }

    /// Acknowledge a FAILURE so the server accepts requests again.
    pub async fn ack_failure(&mut self) -> BoltResult<()> {
        self.ensure_state(BoltConnectionState::Failed, "ACK_FAILURE")?;

        self.send(Request::ack_failure()).await?;
        self.summary().await?;
        self.state = BoltConnectionState::Ready;
        Ok(())
    }

    /// Return the connection to a clean state, discarding any failure.
    pub async fn reset(&mut self) -> BoltResult<()> {
        if !matches!(
            self.state,
            BoltConnectionState::Ready | BoltConnectionState::Failed
        ) {
            return Err(BoltError::protocol(format!(
                "Cannot send RESET in state {:?}",
                self.state
            )));
        }

        self.send(Request::reset()).await?;
        self.summary().await?;
        self.state = BoltConnectionState::Ready;
        Ok(())
    }

    /// Flush pending output and shut the stream down.
    pub async fn close(&mut self) -> BoltResult<()> {
        if self.state == BoltConnectionState::Closed {
            return Ok(());
        }
        self.state = BoltConnectionState::Closed;
        debug!("Closing {} connection", self.version);
        SinkExt::<Request<()>>::close(&mut self.framed).await
    }

    /// Get the negotiated protocol version.
    pub fn version(&self) -> BoltVersion {
        self.version
    }

    /// Get the connection state.
    pub fn state(&self) -> BoltConnectionState {
        self.state
    }

    /// Server agent from the INIT reply.
    pub fn server_agent(&self) -> Option<&str> {
        self.server_agent.as_deref()
    }

    /// Check if connection is ready for messages.
    pub fn is_ready(&self) -> bool {
        self.state == BoltConnectionState::Ready
    }

    fn ensure_state(&self, expected: BoltConnectionState, message: &str) -> BoltResult<()> {
        if self.state != expected {
            return Err(BoltError::protocol(format!(
                "Cannot send {} in state {:?}",
                message, self.state
            )));
        }
        Ok(())
    }

    async fn send<C: RequestContent>(&mut self, request: Request<C>) -> BoltResult<()> {
        trace!("C: {}", request.signature());
        if let Err(e) = self.framed.send(request).await {
            self.state = BoltConnectionState::Closed;
            return Err(e);
        }
        Ok(())
    }

    async fn recv(&mut self) -> BoltResult<Response> {
        let packed = match self.framed.next().await {
            Some(Ok(packed)) => packed,
            Some(Err(e)) => {
                self.state = BoltConnectionState::Closed;
                return Err(e);
            }
            None => {
                self.state = BoltConnectionState::Closed;
                return Err(BoltError::ConnectionClosed);
            }
        };
        trace!("S: signature 0x{:02X}, {} fields", packed.signature(), packed.len());

        match Response::from_struct(packed) {
            Ok(response) => Ok(response),
            Err(e) => {
                self.state = BoltConnectionState::Closed;
                Err(e)
            }
        }
    }

    /// Read the summary closing the current exchange.
    async fn summary(&mut self) -> BoltResult<SuccessMetadata> {
        let response = self.recv().await?;
        self.expect_summary(response)
    }

    fn expect_summary(&mut self, response: Response) -> BoltResult<SuccessMetadata> {
        match response {
            Response::Success(metadata) => Ok(metadata),
            Response::Failure(failure) => {
                warn!("Server failure: {}", failure);
                self.state = BoltConnectionState::Failed;
                Err(failure.into())
            }
            Response::Ignored => {
                self.state = BoltConnectionState::Failed;
                Err(BoltError::protocol("request was IGNORED"))
            }
            Response::Record(_) => {
                self.state = BoltConnectionState::Closed;
                Err(BoltError::protocol("unexpected RECORD outside a PULL_ALL"))
            }
        }
    }
}

impl<S> std::fmt::Debug for BoltConnection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoltConnection")
            .field("version", &self.version)
            .field("state", &self.state)
            .field("server_agent", &self.server_agent)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bolt::codec::ChunkCodec;
    use crate::bolt::handshake::{BOLT_MAGIC, HANDSHAKE_SIZE};
    use crate::bolt::message::Signature;
    use crate::bolt::packstream::{PackStreamValue, PackedStruct};
    use crate::bolt::{AuthToken, HandshakeError};
    use bytes::Bytes;
    use std::collections::HashMap;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
    use tokio::task::JoinHandle;

    fn message(signature: Signature, fields: &[PackStreamValue]) -> Bytes {
        PackedStruct::new(signature.as_u8(), fields)
            .unwrap()
            .to_bytes()
            .freeze()
    }

    fn success(entries: &[(&str, PackStreamValue)]) -> Bytes {
        let map: HashMap<String, PackStreamValue> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        message(Signature::Success, &[PackStreamValue::Map(map)])
    }

    fn failure(code: &str) -> Bytes {
        message(
            Signature::Failure,
            &[PackStreamValue::Map(
                [
                    ("code".to_string(), PackStreamValue::from(code)),
                    ("message".to_string(), PackStreamValue::from("boom")),
                ]
                .into_iter()
                .collect(),
            )],
        )
    }

    fn record(values: Vec<PackStreamValue>) -> Bytes {
        message(Signature::Record, &[PackStreamValue::List(values)])
    }

    /// Fake server: accepts the handshake, then answers each request with
    /// the scripted replies and returns the signatures it received.
    fn serve(stream: DuplexStream, script: Vec<Vec<Bytes>>) -> JoinHandle<Vec<u8>> {
        tokio::spawn(async move {
            let mut stream = stream;
            let mut handshake = [0u8; HANDSHAKE_SIZE];
            stream.read_exact(&mut handshake).await.unwrap();
            assert_eq!(&handshake[..4], &BOLT_MAGIC);
            stream.write_all(&[0, 0, 0, 1]).await.unwrap();

            let mut framed = Framed::new(stream, ChunkCodec::new());
            let mut received = Vec::new();
            for replies in script {
                let request = match framed.next().await {
                    Some(Ok(request)) => request,
                    _ => break,
                };
                received.push(request[1]);
                for reply in replies {
                    framed.send(reply).await.unwrap();
                }
            }
            received
        })
    }

    fn init_reply() -> Vec<Bytes> {
        vec![success(&[("server", "Neo4j/3.5.0".into())])]
    }

    async fn ready(script: Vec<Vec<Bytes>>) -> (BoltConnection<DuplexStream>, JoinHandle<Vec<u8>>) {
        let (client, server) = duplex(4096);
        let server = serve(server, script);
        let mut conn = BoltConnection::handshake(client, BoltConfig::default())
            .await
            .unwrap();
        conn.init().await.unwrap();
        (conn, server)
    }

    #[tokio::test]
    async fn test_init_and_run() {
        let (mut conn, server) = ready(vec![
            init_reply(),
            vec![success(&[(
                "fields",
                PackStreamValue::List(vec!["x".into()]),
            )])],
            vec![
                record(vec![PackStreamValue::Integer(1)]),
                record(vec![PackStreamValue::Integer(2)]),
                success(&[("type", "r".into())]),
            ],
        ])
        .await;

        assert_eq!(conn.version(), BoltVersion::V1);
        assert_eq!(conn.server_agent(), Some("Neo4j/3.5.0"));
        assert!(conn.is_ready());

        let result = conn.run(Query::new("UNWIND [1, 2] AS x RETURN x")).await.unwrap();
        assert_eq!(result.fields, vec!["x".to_string()]);
        assert_eq!(result.len(), 2);
        assert_eq!(result.records[1].get("x"), Some(&PackStreamValue::Integer(2)));
        assert_eq!(result.summary.query_type.as_deref(), Some("r"));

        conn.close().await.unwrap();
        assert_eq!(conn.state(), BoltConnectionState::Closed);
        assert_eq!(server.await.unwrap(), vec![0x01, 0x10, 0x3F]);
    }

    #[tokio::test]
    async fn test_init_carries_auth() {
        let (client, server) = duplex(4096);
        let server = tokio::spawn(async move {
            let mut stream = server;
            let mut handshake = [0u8; HANDSHAKE_SIZE];
            stream.read_exact(&mut handshake).await.unwrap();
            stream.write_all(&[0, 0, 0, 1]).await.unwrap();

            let mut framed = Framed::new(stream, ChunkCodec::new());
            let init = framed.next().await.unwrap().unwrap();
            framed.send(success(&[])).await.unwrap();
            init
        });

        let config = BoltConfig::builder()
            .with_user_agent("test/1.0")
            .with_auth(AuthToken::basic("neo4j", "pw"))
            .build()
            .unwrap();
        let mut conn = BoltConnection::handshake(client, config).await.unwrap();
        conn.init().await.unwrap();

        let init = PackedStruct::unpack(&server.await.unwrap()).unwrap();
        assert_eq!(init.signature(), Signature::Init.as_u8());
        let fields = init.decode_fields().unwrap();
        assert_eq!(fields[0].as_str(), Some("test/1.0"));
        let auth = fields[1].as_map().unwrap();
        assert_eq!(auth["scheme"].as_str(), Some("basic"));
        assert_eq!(auth["principal"].as_str(), Some("neo4j"));
        assert_eq!(auth["credentials"].as_str(), Some("pw"));
    }

    #[tokio::test]
    async fn test_failure_then_ack() {
        let (mut conn, server) = ready(vec![
            init_reply(),
            vec![failure("Neo.ClientError.Statement.SyntaxError")],
            vec![success(&[])],
            vec![success(&[("fields", PackStreamValue::List(vec![]))])],
            vec![success(&[])],
        ])
        .await;

        let err = conn.run(Query::new("RETRN 1")).await.unwrap_err();
        match err {
            BoltError::Failure { code, message } => {
                assert_eq!(code, "Neo.ClientError.Statement.SyntaxError");
                assert_eq!(message, "boom");
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(conn.state(), BoltConnectionState::Failed);

        // no request leaves while the failure is unacknowledged
        assert!(matches!(
            conn.run(Query::new("RETURN 1")).await,
            Err(BoltError::ProtocolViolation(_))
        ));

        conn.ack_failure().await.unwrap();
        assert!(conn.is_ready());

        let result = conn.run(Query::new("RETURN 1")).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(server.await.unwrap(), vec![0x01, 0x10, 0x0E, 0x10, 0x3F]);
    }

    #[tokio::test]
    async fn test_reset_after_failure() {
        let (mut conn, server) = ready(vec![
            init_reply(),
            vec![failure("Neo.TransientError.General.DatabaseUnavailable")],
            vec![success(&[])],
        ])
        .await;

        assert!(conn.run(Query::new("RETURN 1")).await.is_err());
        conn.reset().await.unwrap();
        assert_eq!(conn.state(), BoltConnectionState::Ready);
        assert_eq!(server.await.unwrap(), vec![0x01, 0x10, 0x0F]);
    }

    #[tokio::test]
    async fn test_execute_discards() {
        let (mut conn, server) = ready(vec![
            init_reply(),
            vec![success(&[("fields", PackStreamValue::List(vec![]))])],
            vec![success(&[("type", "w".into())])],
        ])
        .await;

        let summary = conn.execute(Query::new("CREATE ()")).await.unwrap();
        assert_eq!(summary.query_type.as_deref(), Some("w"));
        assert_eq!(server.await.unwrap(), vec![0x01, 0x10, 0x2F]);
    }

    #[tokio::test]
    async fn test_init_failure_is_fatal() {
        let (client, server) = duplex(4096);
        let _server = serve(
            server,
            vec![
                vec![failure("Neo.ClientError.Security.Unauthorized")],
                vec![success(&[])],
            ],
        );
        let mut conn = BoltConnection::handshake(client, BoltConfig::default())
            .await
            .unwrap();

        let err = conn.init().await.unwrap_err();
        assert!(matches!(err, BoltError::Failure { .. }));
        assert_eq!(conn.state(), BoltConnectionState::Closed);
        assert!(!conn.is_ready());

        assert!(matches!(
            conn.ack_failure().await,
            Err(BoltError::ProtocolViolation(_))
        ));
        assert!(matches!(
            conn.reset().await,
            Err(BoltError::ProtocolViolation(_))
        ));
        assert!(matches!(
            conn.run(Query::new("RETURN 1")).await,
            Err(BoltError::ProtocolViolation(_))
        ));
        assert_eq!(conn.state(), BoltConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_malformed_record_closes_connection() {
        let (mut conn, _server) = ready(vec![
            init_reply(),
            vec![success(&[("fields", PackStreamValue::List(vec!["x".into()]))])],
            vec![
                message(Signature::Record, &[PackStreamValue::Integer(1)]),
                record(vec![PackStreamValue::Integer(2)]),
                success(&[]),
            ],
        ])
        .await;

        let err = conn.run(Query::new("RETURN 1 AS x")).await.unwrap_err();
        assert!(matches!(err, BoltError::ProtocolViolation(_)));
        assert_eq!(conn.state(), BoltConnectionState::Closed);

        // the unread tail of the stream is never taken as a new reply
        assert!(matches!(
            conn.run(Query::new("RETURN 2")).await,
            Err(BoltError::ProtocolViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_run_requires_init() {
        let (client, server) = duplex(4096);
        let _server = serve(server, vec![]);
        let mut conn = BoltConnection::handshake(client, BoltConfig::default())
            .await
            .unwrap();

        assert_eq!(conn.state(), BoltConnectionState::Connected);
        assert!(matches!(
            conn.run(Query::new("RETURN 1")).await,
            Err(BoltError::ProtocolViolation(_))
        ));
        assert!(matches!(
            conn.ack_failure().await,
            Err(BoltError::ProtocolViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_handshake_rejected() {
        let (client, mut server) = duplex(64);
        tokio::spawn(async move {
            let mut handshake = [0u8; HANDSHAKE_SIZE];
            server.read_exact(&mut handshake).await.unwrap();
            server.write_all(&[0, 0, 0, 0]).await.unwrap();
        });

        let err = BoltConnection::handshake(client, BoltConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BoltError::Handshake(HandshakeError::Rejected)));
    }

    #[tokio::test]
    async fn test_server_closes_mid_exchange() {
        let (mut conn, _server) = ready(vec![init_reply(), vec![]]).await;

        let err = conn.run(Query::new("RETURN 1")).await.unwrap_err();
        assert!(matches!(err, BoltError::ConnectionClosed));
        assert_eq!(conn.state(), BoltConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let (client, _server) = duplex(64);
        let config = BoltConfig {
            max_chunk_size: 0,
            ..BoltConfig::default()
        };
        assert!(matches!(
            BoltConnection::handshake(client, config).await,
            Err(BoltError::Validation(_))
        ));
    }
}
