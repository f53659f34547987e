//! Live subscriptions to streaming methods

use super::Shared;
use crate::error::ConduitResult;
use crate::protocol::{Message, Notification, StreamCancel, methods};
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::debug;

/// Values produced by a streaming call.
///
/// Yields `Ok` values until the worker completes the stream, or a single `Err`
/// if the stream fails or the connection closes. Dropping a subscription that
/// is still live tells the worker to stop with a `$/cancel` notification.
pub struct Subscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<ConduitResult<Value>>,
    shared: Arc<Shared>,
    finished: bool,
}

impl Subscription {
    pub(super) fn new(
        id: u64,
        receiver: mpsc::UnboundedReceiver<ConduitResult<Value>>,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            id,
            receiver,
            shared,
            finished: false,
        }
    }

    /// Correlation id of the underlying request
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Stream for Subscription {
    type Item = ConduitResult<Value>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        match self.receiver.poll_recv(cx) {
            Poll::Ready(Some(Err(e))) => {
                self.finished = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Still pending means the worker is still producing values
        if self.shared.pending.take(self.id).is_none() {
            return;
        }

        debug!("Cancelling stream {}", self.id);
        let params = serde_json::to_value(StreamCancel { id: self.id.into() }).ok();
        let cancel = Notification::new(methods::CANCEL).with_params(params);
        if let Err(e) = self.shared.send(Message::Notification(cancel)) {
            debug!("Could not cancel stream {}: {}", self.id, e);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("finished", &self.finished)
            .finish()
    }
}
