//! Message transport
//!
//! Turns a duplex byte stream into a sequence of discrete [`Message`]s and back.
//! The transport has no knowledge of message semantics: correlation and
//! dispatch belong to the connection layer.
//!
//! ## Framing
//!
//! - **Stdio**: newline-delimited JSON over a worker's stdin/stdout
//!   (see [`codec::MessageCodec`])

pub mod codec;
mod stream;


pub use codec::{DEFAULT_MAX_FRAME_LENGTH, MessageCodec};

use crate::error::ConduitResult;
use crate::protocol::Message;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};

/// Which way a message crossed the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Worker → client
    Incoming,
    /// Client → worker
    Outgoing,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incoming => "incoming",
            Self::Outgoing => "outgoing",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracing hook invoked with every raw message in either direction.
///
/// Runs inline on the transport's I/O path, so it must not block.
pub type MessageLogger = Arc<dyn Fn(Direction, &str) + Send + Sync>;

/// Write half of a transport
#[async_trait]
pub trait MessageSink: Send {
    /// Frame and write one message
    async fn send(&mut self, message: Message) -> ConduitResult<()>;

    /// Flush and close the underlying writer
    async fn close(&mut self) -> ConduitResult<()>;
}

/// Read half of a transport
#[async_trait]
pub trait MessageSource: Send {
    /// Read the next message.
    ///
    /// `Ok(None)` means the peer closed the stream. A `ProtocolViolation` error
    /// covers one bad frame only; the source can be polled again afterwards.
    async fn receive(&mut self) -> ConduitResult<Option<Message>>;
}

/// Transport options
#[derive(Clone)]
pub struct TransportOptions {
    /// Longest accepted frame in bytes, newline excluded
    pub max_frame_length: usize,
    /// Optional raw message tracing hook
    pub message_logger: Option<MessageLogger>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            message_logger: None,
        }
    }
}

impl std::fmt::Debug for TransportOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportOptions")
            .field("max_frame_length", &self.max_frame_length)
            .field("message_logger", &self.message_logger.is_some())
            .finish()
    }
}

/// A framed duplex channel, split into its two halves
pub struct Transport {
    sink: Box<dyn MessageSink>,
    source: Box<dyn MessageSource>,
}

impl Transport {
    /// Assemble a transport from arbitrary halves
    pub fn new(sink: Box<dyn MessageSink>, source: Box<dyn MessageSource>) -> Self {
        Self { sink, source }
    }

    /// Newline-delimited JSON over a writer/reader pair (typically a worker's
    /// stdin and stdout)
    pub fn from_stdio<W, R>(writer: W, reader: R, options: &TransportOptions) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncRead + Send + Unpin + 'static,
    {
        let codec = MessageCodec::new(options.max_frame_length)
            .with_logger(options.message_logger.clone());

        Self {
            sink: Box::new(FramedWrite::new(writer, codec.clone())),
            source: Box::new(FramedRead::new(reader, codec)),
        }
    }

    /// Split into the write and read halves
    pub fn into_parts(self) -> (Box<dyn MessageSink>, Box<dyn MessageSource>) {
        (self.sink, self.source)
    }
}
