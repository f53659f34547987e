//! Background writer task

use super::pending::PendingCalls;
use super::{Outgoing, TransportErrorHook, fail_channel};
use crate::transport::MessageSink;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Drain queued messages onto the transport, one frame at a time
pub(super) async fn message_writer(
    mut sink: Box<dyn MessageSink>,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    pending: Arc<PendingCalls>,
    on_transport_error: Option<TransportErrorHook>,
    shutdown: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!("Message writer shutting down");
                return;
            }
            message = outgoing.recv() => message,
        };

        let message = match message {
            Some(Outgoing::Message(message)) => message,
            Some(Outgoing::Flush(ack)) => {
                let _ = ack.send(());
                continue;
            }
            None => break,
        };

        if let Err(e) = sink.send(message).await {
            if !shutdown.is_cancelled() {
                error!("Error writing to worker: {}", e);
                fail_channel(&pending, on_transport_error.as_ref(), e);
            }
            return;
        }
    }

    // Every sender is gone: close stdin so the worker sees EOF
    if let Err(e) = sink.close().await {
        debug!("Error closing worker input: {}", e);
    }
}
