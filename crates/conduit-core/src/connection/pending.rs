//! Pending call table
//!
//! Every id inserted here leaves exactly once: taken by the receiver when the
//! worker answers, taken by the caller side when it gives up, or drained when
//! the connection closes. Once closed, the table refuses new entries.

use crate::error::{ConduitError, ConduitResult};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};

pub(crate) type CallSender = oneshot::Sender<ConduitResult<Value>>;
pub(crate) type StreamSender = mpsc::UnboundedSender<ConduitResult<Value>>;

/// Where the outcome of a call goes
pub(crate) enum PendingCall {
    /// Single response
    Call(CallSender),
    /// Intermediate values; dropping the sender completes the stream
    Stream(StreamSender),
}

impl PendingCall {
    pub(crate) fn fail(self, error: ConduitError) {
        // The caller may already have stopped listening
        match self {
            Self::Call(tx) => {
                let _ = tx.send(Err(error));
            }
            Self::Stream(tx) => {
                let _ = tx.send(Err(error));
            }
        }
    }
}

#[derive(Default)]
struct Table {
    calls: HashMap<u64, PendingCall>,
    closed: Option<ConduitError>,
}

#[derive(Default)]
pub(crate) struct PendingCalls {
    table: Mutex<Table>,
}

impl PendingCalls {
    pub(crate) fn insert(&self, id: u64, call: PendingCall) -> ConduitResult<()> {
        let mut table = self.table.lock();
        if let Some(error) = &table.closed {
            return Err(error.clone());
        }
        table.calls.insert(id, call);
        Ok(())
    }

    pub(crate) fn take(&self, id: u64) -> Option<PendingCall> {
        self.table.lock().calls.remove(&id)
    }

    /// Sender for an in-flight stream, without removing it
    pub(crate) fn stream_sender(&self, id: u64) -> ConduitResult<StreamSender> {
        match self.table.lock().calls.get(&id) {
            Some(PendingCall::Stream(tx)) => Ok(tx.clone()),
            Some(PendingCall::Call(_)) => Err(ConduitError::protocol(format!(
                "stream value for non-stream request {}",
                id
            ))),
            None => Err(ConduitError::protocol(format!(
                "stream value for unknown request {}",
                id
            ))),
        }
    }

    /// Fail every pending call with `error` and refuse new ones.
    ///
    /// Only the first close has any effect. Returns how many calls were failed.
    pub(crate) fn close(&self, error: ConduitError) -> usize {
        let drained: Vec<PendingCall> = {
            let mut table = self.table.lock();
            if table.closed.is_some() {
                return 0;
            }
            table.closed = Some(error.clone());
            table.calls.drain().map(|(_, call)| call).collect()
        };

        let count = drained.len();
        for call in drained {
            call.fail(error.clone());
        }
        count
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.table.lock().closed.is_some()
    }

    /// The error new calls fail with once the table is closed
    pub(crate) fn closed_error(&self) -> ConduitError {
        self.table
            .lock()
            .closed
            .clone()
            .unwrap_or_else(|| ConduitError::connection_closed("connection closed"))
    }

    pub(crate) fn len(&self) -> usize {
        self.table.lock().calls.len()
    }
}

/// Removes a call's entry if the caller stops waiting before it resolves
pub(crate) struct PendingGuard<'a> {
    pending: &'a PendingCalls,
    id: u64,
}

impl<'a> PendingGuard<'a> {
    pub(crate) fn new(pending: &'a PendingCalls, id: u64) -> Self {
        Self { pending, id }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.take(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_close_fails_each_call_once() {
        let pending = PendingCalls::default();
        let (tx1, rx1) = oneshot::channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        pending.insert(1, PendingCall::Call(tx1)).unwrap();
        pending.insert(2, PendingCall::Stream(tx2)).unwrap();

        assert_eq!(pending.close(ConduitError::Disposed), 2);
        assert_eq!(pending.close(ConduitError::connection_closed("again")), 0);

        assert!(matches!(rx1.await.unwrap(), Err(ConduitError::Disposed)));
        assert!(matches!(rx2.recv().await.unwrap(), Err(ConduitError::Disposed)));
        assert!(rx2.recv().await.is_none());
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn test_closed_table_rejects_inserts() {
        let pending = PendingCalls::default();
        pending.close(ConduitError::connection_closed("worker exited"));

        let (tx, _rx) = oneshot::channel();
        let err = pending.insert(7, PendingCall::Call(tx)).unwrap_err();
        assert!(matches!(err, ConduitError::ConnectionClosed { .. }));
        assert!(pending.is_closed());
    }

    #[test]
    fn test_take_is_exactly_once() {
        let pending = PendingCalls::default();
        let (tx, _rx) = oneshot::channel();
        pending.insert(3, PendingCall::Call(tx)).unwrap();

        assert!(pending.take(3).is_some());
        assert!(pending.take(3).is_none());
    }

    #[test]
    fn test_stream_sender_lookup() {
        let pending = PendingCalls::default();
        let (call_tx, _call_rx) = oneshot::channel();
        let (stream_tx, _stream_rx) = mpsc::unbounded_channel();
        pending.insert(1, PendingCall::Call(call_tx)).unwrap();
        pending.insert(2, PendingCall::Stream(stream_tx)).unwrap();

        assert!(pending.stream_sender(1).is_err());
        assert!(pending.stream_sender(2).is_ok());
        assert!(pending.stream_sender(3).is_err());
        // Lookups leave the entry in place
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn test_guard_removes_entry() {
        let pending = PendingCalls::default();
        let (tx, _rx) = oneshot::channel();
        pending.insert(5, PendingCall::Call(tx)).unwrap();

        drop(PendingGuard::new(&pending, 5));
        assert_eq!(pending.len(), 0);
    }
}
