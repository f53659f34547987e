//! Remote service proxies

use super::Shared;
use super::pending::{PendingCall, PendingGuard};
use super::subscription::Subscription;
use crate::error::{ConduitError, ConduitResult};
use crate::protocol::{Message, Notification, Request, wire_method};
use crate::registry::MethodKind;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{instrument, trace};

/// Handle for calling the methods of one registered service.
///
/// Cheap to clone. Proxies stay tied to the connection that produced them:
/// once it closes, every call fails with the reason it closed.
#[derive(Clone)]
pub struct ServiceProxy {
    service: String,
    shared: Arc<Shared>,
}

impl ServiceProxy {
    pub(super) fn new(service: &str, shared: Arc<Shared>) -> Self {
        Self {
            service: service.to_string(),
            shared,
        }
    }

    /// Service name
    pub fn name(&self) -> &str {
        &self.service
    }

    /// Call a single-response method.
    ///
    /// `args` is a JSON array (positional), object (named) or `null`.
    /// Dropping the returned future abandons the call and frees its id.
    #[instrument(skip(self, args), fields(service = %self.service))]
    pub async fn call(&self, method: &str, args: Value) -> ConduitResult<Value> {
        let params = self.prepare(method, MethodKind::Call, args)?;

        let id = self.shared.next_id();
        let (tx, rx) = oneshot::channel();
        self.shared.pending.insert(id, PendingCall::Call(tx))?;
        let _guard = PendingGuard::new(&self.shared.pending, id);

        trace!("Sending request {}", id);
        let request = Request::new(id, wire_method(&self.service, method)).with_params(params);
        self.shared.send(Message::Request(request))?;

        rx.await.map_err(|_| self.shared.pending.closed_error())?
    }

    /// Call a single-response method and deserialize its result
    pub async fn call_as<T: DeserializeOwned>(&self, method: &str, args: Value) -> ConduitResult<T> {
        let value = self.call(method, args).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Start a streaming method
    pub fn subscribe(&self, method: &str, args: Value) -> ConduitResult<Subscription> {
        let params = self.prepare(method, MethodKind::Stream, args)?;

        let id = self.shared.next_id();
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.pending.insert(id, PendingCall::Stream(tx))?;
        let subscription = Subscription::new(id, rx, Arc::clone(&self.shared));

        let request = Request::new(id, wire_method(&self.service, method)).with_params(params);
        self.shared.send(Message::Request(request))?;
        Ok(subscription)
    }

    /// Send a fire-and-forget notification
    pub fn notify(&self, method: &str, args: Value) -> ConduitResult<()> {
        let params = self.prepare(method, MethodKind::Notify, args)?;
        let notification =
            Notification::new(wire_method(&self.service, method)).with_params(params);
        self.shared.send(Message::Notification(notification))
    }

    /// Wait until everything sent through this connection has been written
    /// to the worker
    pub async fn flush(&self) -> ConduitResult<()> {
        self.shared.flush().await
    }

    fn prepare(&self, method: &str, kind: MethodKind, args: Value) -> ConduitResult<Option<Value>> {
        let definition = self.shared.registry.method(&self.service, method)?;
        if definition.kind != kind {
            return Err(ConduitError::invalid_call(format!(
                "{}/{} is a {} method, not {}",
                self.service, method, definition.kind, kind
            )));
        }
        definition.marshal_params(args)
    }
}

impl std::fmt::Debug for ServiceProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProxy")
            .field("service", &self.service)
            .finish()
    }
}
