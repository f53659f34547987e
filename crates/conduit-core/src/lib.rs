//! Conduit Core Library
//!
//! Talks to out-of-process workers (language backends, debug adapters, tool
//! servers) over their standard input/output, exposing the worker's
//! capabilities as remotely callable services.
//!
//! ## Layers
//!
//! - [`transport`]: newline-delimited JSON framing over a byte stream
//! - [`registry`]: the catalog of callable services and their signatures
//! - [`connection`]: call multiplexing, streams and notifications
//! - [`supervisor`]: lazy spawning, exit observation and disposal
//!
//! ## Example
//!
//! ```rust,ignore
//! use conduit_core::{ConduitConfig, Supervisor};
//! use serde_json::json;
//!
//! let config = ConduitConfig::load_from_file("conduit.toml".as_ref())?;
//! let registry = Arc::new(config.build_registry()?);
//! let supervisor = Supervisor::new("hack", registry, config.worker("hack")?.factory());
//!
//! let hover = supervisor.get_service("Hover").await?;
//! let result = hover.call("hover", json!({"line": 12})).await?;
//! supervisor.dispose();
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod process;
pub mod protocol;
pub mod registry;
pub mod supervisor;
pub mod transport;

// Re-export commonly used types
pub use config::{ConduitConfig, LoggingConfig, WorkerConfig};
pub use connection::{
    Connection, ConnectionOptions, LoggingNotificationHandler, NotificationHandler, ServiceProxy,
    Subscription,
};
pub use error::{ConduitError, ConduitResult, UnifiedError};
pub use process::{CommandFactory, ProcessEvent, ProcessExit, ProcessFactory, WorkerProcess};
pub use registry::{MethodDefinition, MethodKind, ParamSpec, ServiceDefinition, ServiceRegistry};
pub use supervisor::{ExitSignal, Supervisor, SupervisorOptions};
pub use transport::{Direction, MessageLogger, Transport, TransportOptions};
