//! One-shot worker exit notification

use crate::process::ProcessExit;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ExitState {
    Pending,
    Exited(ProcessExit),
    /// Disposed before any exit was observed; nothing will ever fire
    Closed,
}

/// Publishing side, owned by the supervisor
#[derive(Debug)]
pub(super) struct ExitPublisher {
    tx: watch::Sender<ExitState>,
}

impl ExitPublisher {
    pub(super) fn new() -> Self {
        let (tx, _rx) = watch::channel(ExitState::Pending);
        Self { tx }
    }

    /// Fire with `exit`. Returns false if the signal already fired or closed.
    pub(super) fn fire(&self, exit: ProcessExit) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == ExitState::Pending {
                *state = ExitState::Exited(exit);
                true
            } else {
                false
            }
        })
    }

    /// Release observers waiting for an exit that will never come
    pub(super) fn close(&self) {
        self.tx.send_if_modified(|state| {
            if *state == ExitState::Pending {
                *state = ExitState::Closed;
                true
            } else {
                false
            }
        });
    }

    pub(super) fn subscribe(&self) -> ExitSignal {
        ExitSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observer of a supervisor's exit signal.
///
/// Any number of observers may exist; all see the same single exit.
#[derive(Debug, Clone)]
pub struct ExitSignal {
    rx: watch::Receiver<ExitState>,
}

impl ExitSignal {
    /// Wait for the worker to exit.
    ///
    /// Returns `None` if the supervisor was disposed or dropped before any
    /// exit was observed.
    pub async fn wait(&mut self) -> Option<ProcessExit> {
        loop {
            match *self.rx.borrow_and_update() {
                ExitState::Exited(exit) => return Some(exit),
                ExitState::Closed => return None,
                ExitState::Pending => {}
            }
            if self.rx.changed().await.is_err() {
                return self.try_get();
            }
        }
    }

    /// The exit, if it already fired
    pub fn try_get(&self) -> Option<ProcessExit> {
        match *self.rx.borrow() {
            ExitState::Exited(exit) => Some(exit),
            ExitState::Pending | ExitState::Closed => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fires_once_for_every_observer() {
        let publisher = ExitPublisher::new();
        let mut first = publisher.subscribe();
        let mut second = publisher.subscribe();

        assert!(publisher.fire(ProcessExit::exited(1)));
        assert!(!publisher.fire(ProcessExit::exited(2)));
        publisher.close();

        assert_eq!(first.wait().await, Some(ProcessExit::exited(1)));
        assert_eq!(second.wait().await, Some(ProcessExit::exited(1)));
        // Late observers still see it
        assert_eq!(publisher.subscribe().try_get(), Some(ProcessExit::exited(1)));
    }

    #[tokio::test]
    async fn test_close_releases_waiters() {
        let publisher = ExitPublisher::new();
        let mut signal = publisher.subscribe();
        let waiter = tokio::spawn(async move { signal.wait().await });

        publisher.close();
        assert!(!publisher.fire(ProcessExit::exited(0)));
        assert_eq!(waiter.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_dropped_publisher_releases_waiters() {
        let publisher = ExitPublisher::new();
        let mut signal = publisher.subscribe();
        drop(publisher);
        assert_eq!(signal.wait().await, None);
    }
}
