//! Worker process abstraction
//!
//! A [`WorkerProcess`] is whatever the process factory hands back: the stdio
//! streams of a live worker plus a [`ProcessControl`] to kill and reap it.
//! Real workers come from [`tokio::process::Child`]; tests plug in in-memory
//! pipes.

mod factory;
mod monitor;

#[cfg(test)]
pub(crate) mod fake;

pub use factory::{CommandFactory, ProcessFactory};
pub(crate) use monitor::{KillSwitch, monitor};

use crate::error::{ConduitError, ConduitResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Child;

/// Boxed worker stdin
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
/// Boxed worker stdout/stderr
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// How a worker terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessExit {
    /// Exit code, if the process exited normally
    pub code: Option<i32>,
    /// Terminating signal, if the process was killed by one (Unix)
    pub signal: Option<i32>,
}

impl ProcessExit {
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn killed_by(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ProcessExit {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl std::fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => f.write_str("unknown status"),
        }
    }
}

/// Classification of a running worker's output and lifecycle signals
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    /// Protocol traffic; consumed directly by the transport
    Stdout,
    /// One line of diagnostic output, newline stripped
    Stderr(String),
    /// The process terminated. Terminal: nothing follows for this process.
    Exit(ProcessExit),
    /// The process could not be communicated with
    Error(ConduitError),
}

/// Kill and reap a worker
#[async_trait]
pub trait ProcessControl: Send {
    /// Request forcible termination without waiting for it
    fn start_kill(&mut self) -> io::Result<()>;

    /// Wait for the process to terminate
    async fn wait(&mut self) -> io::Result<ProcessExit>;
}

#[async_trait]
impl ProcessControl for Child {
    fn start_kill(&mut self) -> io::Result<()> {
        Child::start_kill(self)
    }

    async fn wait(&mut self) -> io::Result<ProcessExit> {
        Child::wait(self).await.map(ProcessExit::from)
    }
}

/// A live worker: its stdio plus control
pub struct WorkerProcess {
    pub(crate) pid: Option<u32>,
    pub(crate) stdin: BoxedWriter,
    pub(crate) stdout: BoxedReader,
    pub(crate) stderr: Option<BoxedReader>,
    pub(crate) control: Box<dyn ProcessControl>,
}

impl WorkerProcess {
    /// Assemble a worker from raw parts
    pub fn new(stdin: BoxedWriter, stdout: BoxedReader, control: Box<dyn ProcessControl>) -> Self {
        Self {
            pid: None,
            stdin,
            stdout,
            stderr: None,
            control,
        }
    }

    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    pub fn with_stderr(mut self, stderr: BoxedReader) -> Self {
        self.stderr = Some(stderr);
        self
    }

    /// Wrap a spawned child. stdin and stdout must have been piped.
    pub fn from_child(mut child: Child) -> ConduitResult<Self> {
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ConduitError::spawn("Failed to get stdin handle"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ConduitError::spawn("Failed to get stdout handle"))?;
        let stderr = child.stderr.take();

        Ok(Self {
            pid: child.id(),
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: stderr.map(|s| Box::new(s) as BoxedReader),
            control: Box::new(child),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }
}

impl std::fmt::Debug for WorkerProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerProcess")
            .field("pid", &self.pid)
            .field("stderr", &self.stderr.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_display() {
        assert_eq!(ProcessExit::exited(1).to_string(), "exit code 1");
        assert_eq!(ProcessExit::killed_by(9).to_string(), "signal 9");
        assert!(ProcessExit::exited(0).success());
        assert!(!ProcessExit::killed_by(15).success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_child_control_reports_exit_code() {
        let child = tokio::process::Command::new("sh")
            .args(["-c", "exit 3"])
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .spawn()
            .unwrap();

        let mut worker = WorkerProcess::from_child(child).unwrap();
        assert!(worker.pid().is_some());
        assert_eq!(worker.control.wait().await.unwrap(), ProcessExit::exited(3));
    }
}
