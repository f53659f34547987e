//! Process supervisor
//!
//! A [`Supervisor`] hides a worker process behind a stable handle. The worker
//! is spawned lazily by the first [`Supervisor::get_service`] call, respawned
//! on demand after it dies, and torn down by [`Supervisor::dispose`].
//!
//! Lifecycle per supervisor:
//!
//! ```text
//! NoProcess -> Spawning -> Active -> (Exited | Failed) -> NoProcess
//!                                 \-> Disposed (terminal)
//! ```

mod exit_signal;


pub use exit_signal::ExitSignal;

use crate::connection::{
    Connection, ConnectionOptions, LoggingNotificationHandler, NotificationHandler, ServiceProxy,
    TransportErrorHook,
};
use crate::error::{ConduitError, ConduitResult};
use crate::process::{KillSwitch, ProcessEvent, ProcessFactory, WorkerProcess, monitor};
use crate::registry::ServiceRegistry;
use crate::transport::{DEFAULT_MAX_FRAME_LENGTH, MessageLogger, Transport, TransportOptions};
use exit_signal::ExitPublisher;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Supervisor options
#[derive(Clone)]
pub struct SupervisorOptions {
    /// Raw message tracing hook passed to every transport
    pub message_logger: Option<MessageLogger>,
    /// Receives worker notifications that are not stream values
    pub notification_handler: Arc<dyn NotificationHandler>,
    /// Longest accepted message frame in bytes
    pub max_frame_length: usize,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            message_logger: None,
            notification_handler: Arc::new(LoggingNotificationHandler),
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

/// The live worker and everything built on top of it
struct Active {
    generation: u64,
    pid: Option<u32>,
    connection: Connection,
    kill_switch: KillSwitch,
    events: CancellationToken,
}

#[derive(Default)]
struct State {
    active: Option<Active>,
    generation: u64,
}

struct Inner {
    name: String,
    registry: Arc<ServiceRegistry>,
    factory: Arc<dyn ProcessFactory>,
    options: SupervisorOptions,
    state: Mutex<State>,
    spawn_lock: tokio::sync::Mutex<()>,
    disposed: AtomicBool,
    exit: ExitPublisher,
}

/// Owns one worker process and the connection to it
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    pub fn new(
        name: impl Into<String>,
        registry: Arc<ServiceRegistry>,
        factory: impl ProcessFactory + 'static,
    ) -> Self {
        Self::with_options(name, registry, factory, SupervisorOptions::default())
    }

    pub fn with_options(
        name: impl Into<String>,
        registry: Arc<ServiceRegistry>,
        factory: impl ProcessFactory + 'static,
        options: SupervisorOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                registry,
                factory: Arc::new(factory),
                options,
                state: Mutex::new(State::default()),
                spawn_lock: tokio::sync::Mutex::new(()),
                disposed: AtomicBool::new(false),
                exit: ExitPublisher::new(),
            }),
        }
    }

    /// Name used to tag this supervisor's log lines
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Get a proxy for `service`, spawning the worker first if none is running.
    ///
    /// A factory failure is reported as [`ConduitError::Spawn`] and leaves no
    /// process behind, so the next call tries again from scratch.
    pub async fn get_service(&self, service: &str) -> ConduitResult<ServiceProxy> {
        if self.is_disposed() {
            return Err(ConduitError::Disposed);
        }

        // Serializes spawning so concurrent callers share one worker
        let _spawning = self.inner.spawn_lock.lock().await;
        if self.is_disposed() {
            return Err(ConduitError::Disposed);
        }

        if let Some(active) = &self.inner.state.lock().active {
            return active.connection.get_service(service);
        }

        self.inner.spawn(service).await
    }

    /// Observe the first exit of the worker
    pub fn observe_exit_signal(&self) -> ExitSignal {
        self.inner.exit.subscribe()
    }

    /// Fail every pending call with `Disposed`, kill the worker if it is still
    /// running, and refuse further use. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(worker = %self.inner.name, "Disposing supervisor");
        self.inner.cleanup(None, true, ConduitError::Disposed);
        self.inner.exit.close();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Process id of the running worker, if any
    pub fn pid(&self) -> Option<u32> {
        self.inner.state.lock().active.as_ref().and_then(|a| a.pid)
    }

    /// Whether a worker is currently running
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().active.is_some()
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("name", &self.inner.name)
            .field("running", &self.is_running())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Inner {
    /// Spawn a worker, wire it up and install it as the active one.
    ///
    /// Caller holds the spawn lock.
    async fn spawn(self: &Arc<Self>, service: &str) -> ConduitResult<ServiceProxy> {
        debug!(worker = %self.name, "Spawning worker");
        let process = match self.factory.spawn().await {
            Ok(process) => process,
            Err(e) => {
                error!(worker = %self.name, "Failed to spawn worker: {}", e);
                return Err(match e {
                    spawn @ ConduitError::Spawn { .. } => spawn,
                    other => ConduitError::spawn(other.to_string())
                        .with_context(format!("spawning worker '{}'", self.name)),
                });
            }
        };

        let WorkerProcess {
            pid,
            stdin,
            stdout,
            stderr,
            control,
        } = process;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let kill_switch = monitor(stderr, control, events_tx.clone());

        let transport = Transport::from_stdio(
            stdin,
            stdout,
            &TransportOptions {
                max_frame_length: self.options.max_frame_length,
                message_logger: self.options.message_logger.clone(),
            },
        );
        // Channel failures are classified alongside the exit events
        let on_transport_error: TransportErrorHook = Arc::new(move |e: &ConduitError| {
            let _ = events_tx.send(ProcessEvent::Error(e.clone()));
        });
        let connection = Connection::new(
            transport,
            Arc::clone(&self.registry),
            ConnectionOptions {
                worker: self.name.clone(),
                notification_handler: Arc::clone(&self.options.notification_handler),
                on_transport_error: Some(on_transport_error),
            },
        );

        let mut state = self.state.lock();
        if self.disposed.load(Ordering::SeqCst) {
            drop(state);
            debug!(worker = %self.name, "Disposed during spawn, killing fresh worker");
            connection.dispose(ConduitError::Disposed);
            kill_switch.kill();
            return Err(ConduitError::Disposed);
        }

        state.generation += 1;
        let generation = state.generation;
        let events = CancellationToken::new();
        let proxy = connection.get_service(service);
        state.active = Some(Active {
            generation,
            pid,
            connection,
            kill_switch,
            events: events.clone(),
        });
        drop(state);

        tokio::spawn(pump_events(Arc::downgrade(self), generation, events_rx, events));
        info!(worker = %self.name, pid = ?pid, generation, "Worker started");

        proxy
    }

    /// Apply one classified event from worker `generation`
    fn on_process_event(&self, generation: u64, event: ProcessEvent) {
        match event {
            ProcessEvent::Stdout => {
                trace!(worker = %self.name, "Worker output");
            }
            ProcessEvent::Stderr(line) => {
                if !line.trim().is_empty() {
                    warn!(worker = %self.name, "stderr: {}", line);
                }
            }
            ProcessEvent::Exit(exit) => {
                if self.disposed.load(Ordering::SeqCst) {
                    debug!(worker = %self.name, "Worker exited with {}", exit);
                } else {
                    let err = ConduitError::UnexpectedExit { exit };
                    error!(worker = %self.name, generation, "{}", err);
                }

                let reason = ConduitError::connection_closed(format!("worker exited with {}", exit));
                if self.cleanup(Some(generation), false, reason) {
                    self.exit.fire(exit);
                }
            }
            ProcessEvent::Error(e) => {
                error!(worker = %self.name, generation, "Worker channel failed: {}", e);
                self.cleanup(Some(generation), true, e);
            }
        }
    }

    /// Retire the active worker.
    ///
    /// With `generation` set, only that generation is retired. Returns whether
    /// anything was torn down; concurrent callers never both see `true`.
    fn cleanup(&self, generation: Option<u64>, should_kill: bool, reason: ConduitError) -> bool {
        let active = {
            let mut state = self.state.lock();
            match (&state.active, generation) {
                (Some(active), Some(generation)) if active.generation != generation => None,
                _ => state.active.take(),
            }
        };
        let Some(active) = active else {
            return false;
        };

        active.events.cancel();
        active.connection.dispose(reason);
        if should_kill {
            active.kill_switch.kill();
        }
        debug!(worker = %self.name, generation = active.generation, "Worker retired");
        true
    }
}

/// Forward classified events of one worker generation to the supervisor
async fn pump_events(
    inner: Weak<Inner>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<ProcessEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            event = events.recv() => event,
        };

        let Some(event) = event else {
            return;
        };
        let terminal = matches!(event, ProcessEvent::Exit(_));

        let Some(inner) = inner.upgrade() else {
            return;
        };
        inner.on_process_event(generation, event);

        if terminal {
            return;
        }
    }
}
