//! Newline-delimited JSON framing
//!
//! Built on [`LinesCodec`], which buffers partial reads until a newline arrives
//! and, after an over-long line, discards input up to the next newline. Parse
//! failures and lines that are not UTF-8 are yielded as items rather than
//! decoder errors, so the framed stream keeps going after a bad frame.

use super::{Direction, MessageLogger};
use crate::error::ConduitError;
use crate::protocol::Message;
use bytes::BytesMut;
use std::io;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

/// Default frame size limit (16 MiB)
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// One decoded frame: a message, or the reason the frame was rejected
pub type Frame = Result<Message, ConduitError>;

/// JSON-RPC line codec
#[derive(Clone)]
pub struct MessageCodec {
    lines: LinesCodec,
    max_frame_length: usize,
    logger: Option<MessageLogger>,
}

impl MessageCodec {
    pub fn new(max_frame_length: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_frame_length),
            max_frame_length,
            logger: None,
        }
    }

    /// Attach a raw message tracing hook
    pub fn with_logger(mut self, logger: Option<MessageLogger>) -> Self {
        self.logger = logger;
        self
    }

    fn log(&self, direction: Direction, raw: &str) {
        if let Some(logger) = &self.logger {
            logger(direction, raw);
        }
    }

    /// Blank lines yield `None` and are skipped by the caller
    fn parse_line(&self, line: String) -> Option<Frame> {
        let raw = line.trim();
        if raw.is_empty() {
            return None;
        }

        self.log(Direction::Incoming, raw);

        Some(serde_json::from_str::<Message>(raw).map_err(|e| {
            ConduitError::protocol(format!("malformed message: {}", e))
                .with_context(truncate(raw, 200))
        }))
    }

    fn map_error(&self, err: LinesCodecError) -> Result<Option<Frame>, ConduitError> {
        match err {
            LinesCodecError::MaxLineLengthExceeded => Ok(Some(Err(ConduitError::protocol(
                format!("frame exceeds {} bytes, discarding", self.max_frame_length),
            )))),
            // The offending line has already been consumed
            LinesCodecError::Io(e) if e.kind() == io::ErrorKind::InvalidData => Ok(Some(Err(
                ConduitError::protocol(format!("frame is not valid UTF-8: {}", e)),
            ))),
            LinesCodecError::Io(e) => Err(e.into()),
        }
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LENGTH)
    }
}

impl Decoder for MessageCodec {
    type Item = Frame;
    type Error = ConduitError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, ConduitError> {
        loop {
            match self.lines.decode(src) {
                Ok(Some(line)) => {
                    if let Some(frame) = self.parse_line(line) {
                        return Ok(Some(frame));
                    }
                }
                Ok(None) => return Ok(None),
                Err(e) => return self.map_error(e),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, ConduitError> {
        loop {
            match self.lines.decode_eof(src) {
                Ok(Some(line)) => {
                    if let Some(frame) = self.parse_line(line) {
                        return Ok(Some(frame));
                    }
                }
                Ok(None) => return Ok(None),
                Err(e) => return self.map_error(e),
            }
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = ConduitError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), ConduitError> {
        let json = serde_json::to_string(&item)?;
        self.log(Direction::Outgoing, &json);

        self.lines.encode(json, dst).map_err(|e| match e {
            LinesCodecError::Io(e) => e.into(),
            LinesCodecError::MaxLineLengthExceeded => {
                ConduitError::protocol("outgoing frame exceeds the maximum length")
            }
        })
    }
}

fn truncate(raw: &str, max: usize) -> String {
    match raw.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &raw[..idx]),
        None => raw.to_string(),
    }
}
