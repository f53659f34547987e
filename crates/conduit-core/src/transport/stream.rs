//! [`MessageSink`]/[`MessageSource`] over framed async byte streams

use super::codec::MessageCodec;
use super::{MessageSink, MessageSource};
use crate::error::ConduitResult;
use crate::protocol::Message;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};

#[async_trait]
impl<W> MessageSink for FramedWrite<W, MessageCodec>
where
    W: AsyncWrite + Send + Unpin,
{
    async fn send(&mut self, message: Message) -> ConduitResult<()> {
        // `SinkExt::send` flushes after each frame
        SinkExt::send(self, message).await
    }

    async fn close(&mut self) -> ConduitResult<()> {
        SinkExt::close(self).await
    }
}

#[async_trait]
impl<R> MessageSource for FramedRead<R, MessageCodec>
where
    R: AsyncRead + Send + Unpin,
{
    async fn receive(&mut self) -> ConduitResult<Option<Message>> {
        match self.next().await {
            None => Ok(None),
            Some(Ok(frame)) => frame.map(Some),
            Some(Err(e)) => Err(e),
        }
    }
}
