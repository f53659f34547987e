//! Output classification for a running worker
//!
//! Spawns a stderr reader and a waiter task and merges what they observe into
//! one [`ProcessEvent`] channel. The waiter owns the [`ProcessControl`]; the
//! supervisor asks it to kill the worker through a [`KillSwitch`].

use super::{BoxedReader, ProcessControl, ProcessEvent};
use crate::error::ConduitError;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Requests forcible termination of a monitored worker
#[derive(Debug, Clone, Default)]
pub(crate) struct KillSwitch(CancellationToken);

impl KillSwitch {
    pub(crate) fn kill(&self) {
        self.0.cancel();
    }
}

/// Start classifying a worker's stderr and exit into `events`.
///
/// Exactly one `Exit` (or an `Error` if waiting fails) is sent per worker.
pub(crate) fn monitor(
    stderr: Option<BoxedReader>,
    mut control: Box<dyn ProcessControl>,
    events: mpsc::UnboundedSender<ProcessEvent>,
) -> KillSwitch {
    let kill_switch = KillSwitch::default();

    if let Some(stderr) = stderr {
        tokio::spawn(read_stderr(stderr, events.clone()));
    }

    let token = kill_switch.0.clone();
    tokio::spawn(async move {
        let status = tokio::select! {
            status = control.wait() => status,
            _ = token.cancelled() => {
                if let Err(e) = control.start_kill() {
                    warn!("Failed to kill worker: {}", e);
                }
                control.wait().await
            }
        };

        let event = match status {
            Ok(exit) => ProcessEvent::Exit(exit),
            Err(e) => ProcessEvent::Error(
                ConduitError::from(e).with_context("waiting for worker to exit"),
            ),
        };
        // The receiver is gone once the supervisor retired this worker
        let _ = events.send(event);
    });

    kill_switch
}

/// One `Stderr` event per line. Lines are split on raw bytes and decoded
/// afterwards, so a bad byte only affects the line it is on.
async fn read_stderr(stderr: BoxedReader, events: mpsc::UnboundedSender<ProcessEvent>) {
    let mut lines = BufReader::new(stderr).split(b'\n');
    loop {
        match lines.next_segment().await {
            Ok(Some(line)) => {
                let line = line.strip_suffix(b"\r").unwrap_or(&line);
                let text = String::from_utf8_lossy(line).into_owned();
                if events.send(ProcessEvent::Stderr(text)).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!("Stopped reading worker stderr: {}", e);
                break;
            }
        }
    }
}
