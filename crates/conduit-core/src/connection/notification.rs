//! Notification handler traits and implementations

use serde_json::Value;
use tracing::debug;

/// Receives notifications the worker sends outside of any call.
///
/// Called inline on the receiver task, so implementations must not block.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationHandler: Send + Sync {
    /// Handle a notification
    fn handle(&self, method: &str, params: Option<Value>);
}

/// Default notification handler that logs notifications
pub struct LoggingNotificationHandler;

impl NotificationHandler for LoggingNotificationHandler {
    fn handle(&self, method: &str, params: Option<Value>) {
        debug!("Worker notification: {} {:?}", method, params);
    }
}
