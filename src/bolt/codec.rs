//! Chunked message framing for tokio_util.
//!
//! A message travels as a sequence of chunks, each a 2-byte big-endian
//! length followed by that many content bytes, and ends with the zero-length
//! chunk `00 00`. A zero-length chunk with nothing before it is a no-op and
//! is skipped.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::VecDeque;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use super::message::response::unpack_all;
use super::message::{Request, RequestContent};
use super::packstream::{PackStreamError, PackedStruct};
use super::{BoltError, BoltResult};

/// Largest chunk the 2-byte header can describe.
pub const MAX_CHUNK_SIZE: usize = u16::MAX as usize;

/// Default limit for a reassembled message (16MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// End of message marker (0x00 0x00)
pub const END_MARKER: [u8; 2] = [0x00, 0x00];

/// One non-empty chunk of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    content: Bytes,
    is_final: bool,
}

impl Chunk {
    /// The 2-byte length header.
    pub fn header(&self) -> [u8; 2] {
        (self.content.len() as u16).to_be_bytes()
    }

    /// Chunk content.
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Content length.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Always false for chunks produced by [`split_chunks`].
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Whether the end-of-message marker follows this chunk.
    pub fn is_final(&self) -> bool {
        self.is_final
    }
}

fn check_chunk_size(max_chunk_size: usize) -> BoltResult<()> {
    if max_chunk_size == 0 || max_chunk_size > MAX_CHUNK_SIZE {
        return Err(BoltError::validation(format!(
            "chunk size must be between 1 and {}, got {}",
            MAX_CHUNK_SIZE, max_chunk_size
        )));
    }
    Ok(())
}

/// Frame `data` as one message: chunks of at most `max_chunk_size` bytes,
/// then the end marker.
pub fn chunk_message(data: &[u8], max_chunk_size: usize, dst: &mut BytesMut) -> BoltResult<()> {
    check_chunk_size(max_chunk_size)?;

    dst.reserve(data.len() + 2 * (data.len() / max_chunk_size + 2));
    for piece in data.chunks(max_chunk_size) {
        dst.put_u16(piece.len() as u16);
        dst.put_slice(piece);
    }
    dst.put_slice(&END_MARKER);
    Ok(())
}

/// Split complete framed bytes into their non-empty chunks.
pub fn split_chunks(src: &[u8]) -> BoltResult<Vec<Chunk>> {
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut rest = src;

    while !rest.is_empty() {
        if rest.len() < 2 {
            return Err(PackStreamError::UnexpectedEof.into());
        }
        let len = rest.get_u16() as usize;
        if len == 0 {
            if let Some(last) = chunks.last_mut() {
                last.is_final = true;
            }
            continue;
        }
        if rest.len() < len {
            return Err(PackStreamError::UnexpectedEof.into());
        }
        chunks.push(Chunk {
            content: Bytes::copy_from_slice(&rest[..len]),
            is_final: false,
        });
        rest.advance(len);
    }

    Ok(chunks)
}

/// Reassemble every complete message in `src`, in order.
///
/// Fails if `src` ends inside a chunk or a message.
pub fn dechunk(src: &[u8]) -> BoltResult<Vec<Bytes>> {
    let mut codec = ChunkCodec::new();
    let mut buf = BytesMut::from(src);
    let mut messages = Vec::new();

    while let Some(message) = codec.decode(&mut buf)? {
        messages.push(message);
    }
    if !buf.is_empty() || codec.in_message() {
        return Err(PackStreamError::UnexpectedEof.into());
    }
    Ok(messages)
}

/// Chunk framing codec. Decodes to whole message contents and encodes
/// message contents into chunks.
#[derive(Debug)]
pub struct ChunkCodec {
    max_chunk_size: usize,
    max_message_size: usize,
    /// Buffer for accumulating chunks
    message_buffer: BytesMut,
}

impl ChunkCodec {
    /// Create a codec with the largest chunk size and the default message limit.
    pub fn new() -> Self {
        Self {
            max_chunk_size: MAX_CHUNK_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            message_buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Create a codec with custom limits.
    pub fn with_limits(max_chunk_size: usize, max_message_size: usize) -> BoltResult<Self> {
        check_chunk_size(max_chunk_size)?;
        if max_message_size == 0 {
            return Err(BoltError::validation("max message size must be positive"));
        }
        Ok(Self {
            max_chunk_size,
            max_message_size,
            message_buffer: BytesMut::with_capacity(4096),
        })
    }

    /// Chunk size used when encoding.
    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Whether part of a message has been received.
    pub fn in_message(&self) -> bool {
        !self.message_buffer.is_empty()
    }
}

impl Default for ChunkCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChunkCodec {
    type Item = Bytes;
    type Error = BoltError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            // Need at least 2 bytes for chunk header
            if src.len() < 2 {
                return Ok(None);
            }

            let chunk_size = u16::from_be_bytes([src[0], src[1]]) as usize;

            if chunk_size == 0 {
                src.advance(2);

                if self.message_buffer.is_empty() {
                    // no-op between messages
                    continue;
                }

                let message = self.message_buffer.split().freeze();
                trace!(len = message.len(), "reassembled message");
                return Ok(Some(message));
            }

            if src.len() < 2 + chunk_size {
                src.reserve(2 + chunk_size - src.len());
                return Ok(None);
            }

            let size = self.message_buffer.len() + chunk_size;
            if size > self.max_message_size {
                return Err(BoltError::MessageTooLarge {
                    size,
                    max: self.max_message_size,
                });
            }

            src.advance(2);
            self.message_buffer.extend_from_slice(&src[..chunk_size]);
            src.advance(chunk_size);
        }
    }
}

impl Encoder<Bytes> for ChunkCodec {
    type Error = BoltError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        chunk_message(&item, self.max_chunk_size, dst)
    }
}

/// Codec for the client side of a connection: encodes [`Request`]s and
/// decodes response structures.
#[derive(Debug, Default)]
pub struct MessageCodec {
    chunks: ChunkCodec,
    /// Structures already split off a message but not yet handed out
    pending: VecDeque<PackedStruct>,
}

impl MessageCodec {
    /// Create a codec around the given chunk codec.
    pub fn new(chunks: ChunkCodec) -> Self {
        Self {
            chunks,
            pending: VecDeque::new(),
        }
    }
}

impl Decoder for MessageCodec {
    type Item = PackedStruct;
    type Error = BoltError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while self.pending.is_empty() {
            match self.chunks.decode(src)? {
                Some(message) => self.pending.extend(unpack_all(&message)?),
                None => return Ok(None),
            }
        }
        Ok(self.pending.pop_front())
    }
}

impl<C: RequestContent> Encoder<Request<C>> for MessageCodec {
    type Error = BoltError;

    fn encode(&mut self, item: Request<C>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let packed = item.to_bytes()?;
        trace!(message = %item.signature(), len = packed.len(), "encoding request");
        chunk_message(&packed, self.chunks.max_chunk_size(), dst)
    }
}
