//! Background message receiver

use super::pending::PendingCall;
use super::{NotificationHandler, Shared, TransportErrorHook, fail_channel};
use crate::error::{ConduitError, ConduitResult};
use crate::protocol::{Message, Notification, Request, Response, RpcError, StreamItem, methods};
use crate::transport::MessageSource;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Background task that receives messages and routes them
pub(super) async fn message_receiver(
    mut source: Box<dyn MessageSource>,
    shared: Arc<Shared>,
    handler: Arc<dyn NotificationHandler>,
    on_transport_error: Option<TransportErrorHook>,
    shutdown: CancellationToken,
) {
    loop {
        let result = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!("Message receiver shutting down");
                return;
            }
            result = source.receive() => result,
        };

        match result {
            Ok(Some(message)) => route(message, &shared, handler.as_ref()),
            Ok(None) => {
                debug!("Worker closed its output stream");
                shared
                    .pending
                    .close(ConduitError::connection_closed("worker closed its output stream"));
                return;
            }
            Err(e) if e.is_recoverable() => {
                warn!("Discarding malformed message from worker: {}", e);
            }
            Err(e) => {
                if !shutdown.is_cancelled() {
                    error!("Error receiving from worker: {}", e);
                    fail_channel(&shared.pending, on_transport_error.as_ref(), e);
                }
                return;
            }
        }
    }
}

fn route(message: Message, shared: &Shared, handler: &dyn NotificationHandler) {
    match message {
        Message::Response(response) => complete(response, shared),
        Message::Notification(notification) if notification.method == methods::NEXT => {
            if let Err(e) = deliver_item(notification, shared) {
                warn!("Discarding stream value: {}", e);
            }
        }
        Message::Notification(notification) => {
            handler.handle(&notification.method, notification.params);
        }
        Message::Request(request) => reject_request(request, shared),
    }
}

fn complete(response: Response, shared: &Shared) {
    let Some(id) = response.id.as_u64() else {
        warn!("Received response with non-numeric id: {}", response.id);
        return;
    };

    let Some(call) = shared.pending.take(id) else {
        warn!("Received response for unknown request: {}", id);
        return;
    };

    match call {
        PendingCall::Call(tx) => {
            let result = response.into_result().map_err(ConduitError::from);
            if tx.send(result).is_err() {
                debug!("Caller stopped waiting for request {}", id);
            }
        }
        PendingCall::Stream(tx) => {
            // Success completes the stream by dropping the sender
            if let Err(e) = response.into_result() {
                let _ = tx.send(Err(e.into()));
            }
        }
    }
}

fn deliver_item(notification: Notification, shared: &Shared) -> ConduitResult<()> {
    let params = notification
        .params
        .ok_or_else(|| ConduitError::protocol("stream value without params"))?;
    let item: StreamItem = serde_json::from_value(params)
        .map_err(|e| ConduitError::protocol(format!("invalid stream value: {}", e)))?;
    let id = item
        .id
        .as_u64()
        .ok_or_else(|| ConduitError::protocol(format!("stream value for request {}", item.id)))?;

    let tx = shared.pending.stream_sender(id)?;
    // The subscriber may have just gone away
    let _ = tx.send(Ok(item.value));
    Ok(())
}

/// Workers cannot call back into the client
fn reject_request(request: Request, shared: &Shared) {
    warn!("Rejecting worker request: {}", request.method);
    let reply = Response::error(
        request.id.clone(),
        RpcError::method_not_found().with_data(request.method.into()),
    );
    if let Err(e) = shared.send(Message::Response(reply)) {
        debug!("Could not reply to worker request {}: {}", request.id, e);
    }
}
