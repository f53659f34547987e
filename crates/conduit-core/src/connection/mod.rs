//! Call multiplexing over a transport
//!
//! A [`Connection`] owns one [`Transport`] and turns it into concurrent remote
//! calls. Outgoing messages go through a single writer task, so calls are
//! serialized onto the wire; a background receiver demultiplexes responses,
//! stream values and notifications by correlation id.
//!
//! # Features
//! - Typed service proxies backed by the [`ServiceRegistry`]
//! - Single-response calls, streaming subscriptions, fire-and-forget notifications
//! - Exactly one terminal outcome per correlation id, including on disposal

mod notification;
mod pending;
mod proxy;
mod receiver;
mod subscription;
mod writer;


pub use notification::{LoggingNotificationHandler, NotificationHandler};
pub use proxy::ServiceProxy;
pub use subscription::Subscription;

use crate::error::{ConduitError, ConduitResult};
use crate::protocol::Message;
use crate::registry::ServiceRegistry;
use crate::transport::Transport;
use pending::PendingCalls;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info_span};

/// Callback told about failures that take the whole channel down
pub type TransportErrorHook = Arc<dyn Fn(&ConduitError) + Send + Sync>;

/// Connection options
#[derive(Clone)]
pub struct ConnectionOptions {
    /// Worker name attached to every log line of the connection tasks
    pub worker: String,
    /// Receives worker notifications that are not stream values
    pub notification_handler: Arc<dyn NotificationHandler>,
    /// Told when a read or write on the transport fails
    pub on_transport_error: Option<TransportErrorHook>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            worker: "unnamed".to_string(),
            notification_handler: Arc::new(LoggingNotificationHandler),
            on_transport_error: None,
        }
    }
}

/// Work queued for the writer task
pub(crate) enum Outgoing {
    Message(Message),
    /// Acknowledged once everything queued before it has been written
    Flush(oneshot::Sender<()>),
}

/// State shared between the connection, its proxies and its tasks
pub(crate) struct Shared {
    pub(crate) pending: Arc<PendingCalls>,
    pub(crate) registry: Arc<ServiceRegistry>,
    outgoing: mpsc::UnboundedSender<Outgoing>,
    next_id: AtomicU64,
}

impl Shared {
    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Queue a message for the writer task
    pub(crate) fn send(&self, message: Message) -> ConduitResult<()> {
        if self.pending.is_closed() {
            return Err(self.pending.closed_error());
        }
        self.outgoing
            .send(Outgoing::Message(message))
            .map_err(|_| self.pending.closed_error())
    }

    /// Wait until every message queued so far has been written
    pub(crate) async fn flush(&self) -> ConduitResult<()> {
        let (tx, rx) = oneshot::channel();
        self.outgoing
            .send(Outgoing::Flush(tx))
            .map_err(|_| self.pending.closed_error())?;
        rx.await.map_err(|_| self.pending.closed_error())
    }
}

/// A live, multiplexed channel to one worker
pub struct Connection {
    shared: Arc<Shared>,
    shutdown: CancellationToken,
    span: Span,
}

impl Connection {
    /// Start the reader and writer tasks over `transport`.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(
        transport: Transport,
        registry: Arc<ServiceRegistry>,
        options: ConnectionOptions,
    ) -> Self {
        let (sink, source) = transport.into_parts();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let pending = Arc::new(PendingCalls::default());
        let shutdown = CancellationToken::new();
        let span = info_span!("connection", worker = %options.worker);

        let shared = Arc::new(Shared {
            pending: Arc::clone(&pending),
            registry,
            outgoing: outgoing_tx,
            next_id: AtomicU64::new(1),
        });

        tokio::spawn(
            writer::message_writer(
                sink,
                outgoing_rx,
                pending,
                options.on_transport_error.clone(),
                shutdown.clone(),
            )
            .instrument(span.clone()),
        );
        tokio::spawn(
            receiver::message_receiver(
                source,
                Arc::clone(&shared),
                options.notification_handler,
                options.on_transport_error,
                shutdown.clone(),
            )
            .instrument(span.clone()),
        );

        Self {
            shared,
            shutdown,
            span,
        }
    }

    /// Get a proxy for a registered service
    pub fn get_service(&self, name: &str) -> ConduitResult<ServiceProxy> {
        self.shared.registry.service(name)?;
        Ok(ServiceProxy::new(name, Arc::clone(&self.shared)))
    }

    /// Stop both tasks and fail every pending call with `reason`.
    ///
    /// Synchronous and idempotent: only the first reason is delivered.
    pub fn dispose(&self, reason: ConduitError) {
        self.shutdown.cancel();
        let failed = self.shared.pending.close(reason);
        if failed > 0 {
            debug!(parent: &self.span, "Failed {} pending calls on connection close", failed);
        }
    }

    /// Whether the connection stopped accepting calls
    pub fn is_closed(&self) -> bool {
        self.shared.pending.is_closed()
    }

    /// Number of calls and streams awaiting the worker
    pub fn pending_calls(&self) -> usize {
        self.shared.pending.len()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.dispose(ConduitError::connection_closed("connection dropped"));
    }
}

/// Fail the whole channel after an I/O failure
pub(crate) fn fail_channel(
    pending: &PendingCalls,
    on_transport_error: Option<&TransportErrorHook>,
    error: ConduitError,
) {
    pending.close(error.clone());
    if let Some(hook) = on_transport_error {
        hook(&error);
    }
}
