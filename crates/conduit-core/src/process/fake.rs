//! In-memory worker for tests
//!
//! [`fake_process`] returns the [`WorkerProcess`] handed to the supervisor and
//! the [`FakeWorker`] end the test drives: it reads what the client wrote to
//! stdin, writes stdout/stderr, and decides when the process exits.

use super::{ProcessControl, ProcessExit, WorkerProcess};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::{Notify, oneshot};
use tokio_util::codec::{FramedRead, LinesCodec};

const PIPE_CAPACITY: usize = 64 * 1024;
const SIGKILL: i32 = 9;

pub(crate) struct FakeWorker {
    requests: FramedRead<DuplexStream, LinesCodec>,
    stdout: DuplexStream,
    pub(crate) stderr: DuplexStream,
    exit: Option<oneshot::Sender<ProcessExit>>,
    kills: Arc<AtomicUsize>,
}

impl FakeWorker {
    /// Next JSON message the client wrote, or `None` once stdin is closed
    pub(crate) async fn next_message(&mut self) -> Option<Value> {
        let line = self.requests.next().await?.ok()?;
        Some(serde_json::from_str(&line).expect("client wrote invalid JSON"))
    }

    /// Write one JSON message to stdout
    pub(crate) async fn send(&mut self, message: Value) {
        self.send_raw(&message.to_string()).await;
    }

    /// Write a raw line to stdout
    pub(crate) async fn send_raw(&mut self, line: &str) {
        self.send_bytes(line.as_bytes()).await;
    }

    /// Write arbitrary bytes to stdout, followed by a newline
    pub(crate) async fn send_bytes(&mut self, bytes: &[u8]) {
        self.stdout.write_all(bytes).await.unwrap();
        self.stdout.write_all(b"\n").await.unwrap();
    }

    /// Terminate with an exit code
    pub(crate) fn exit(&mut self, code: i32) {
        if let Some(exit) = self.exit.take() {
            let _ = exit.send(ProcessExit::exited(code));
        }
    }

    /// How many times the supervisor asked to kill this worker
    pub(crate) fn kill_count(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }
}

struct FakeControl {
    exit: Option<oneshot::Receiver<ProcessExit>>,
    kills: Arc<AtomicUsize>,
    killed: Arc<Notify>,
}

#[async_trait]
impl ProcessControl for FakeControl {
    fn start_kill(&mut self) -> io::Result<()> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        self.killed.notify_one();
        Ok(())
    }

    async fn wait(&mut self) -> io::Result<ProcessExit> {
        let exited = match self.exit.as_mut() {
            Some(exit) => tokio::select! {
                result = exit => result.ok(),
                _ = self.killed.notified() => return Ok(ProcessExit::killed_by(SIGKILL)),
            },
            None => None,
        };
        if let Some(exit) = exited {
            return Ok(exit);
        }

        // A dropped FakeWorker never exits on its own; only a kill ends it
        self.exit = None;
        self.killed.notified().await;
        Ok(ProcessExit::killed_by(SIGKILL))
    }
}

pub(crate) fn fake_process() -> (WorkerProcess, FakeWorker) {
    let (client_stdin, worker_stdin) = tokio::io::duplex(PIPE_CAPACITY);
    let (worker_stdout, client_stdout) = tokio::io::duplex(PIPE_CAPACITY);
    let (worker_stderr, client_stderr) = tokio::io::duplex(PIPE_CAPACITY);
    let (exit_tx, exit_rx) = oneshot::channel();
    let kills = Arc::new(AtomicUsize::new(0));

    let control = FakeControl {
        exit: Some(exit_rx),
        kills: Arc::clone(&kills),
        killed: Arc::new(Notify::new()),
    };

    let process = WorkerProcess::new(Box::new(client_stdin), Box::new(client_stdout), Box::new(control))
        .with_pid(Some(4242))
        .with_stderr(Box::new(client_stderr));

    let worker = FakeWorker {
        requests: FramedRead::new(worker_stdin, LinesCodec::new()),
        stdout: worker_stdout,
        stderr: worker_stderr,
        exit: Some(exit_tx),
        kills,
    };

    (process, worker)
}
