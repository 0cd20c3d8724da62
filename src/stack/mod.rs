//! Lifecycle management for the LocalStack emulation container.
//!
//! A [`Stack`] owns at most one container at a time. Starting it:
//! - is a no-op when already started (unless a restart is forced)
//! - pulls the image only when it is not available locally
//! - publishes `4566/tcp` on an ephemeral host port
//! - waits for the readiness marker in the container's stdout
//! - records the host endpoint once the port is known
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                                 Stack                                      │
//! │                                                                            │
//! │   start(force_restart, options)          (exclusive lock held throughout)  │
//! │         │                                                                  │
//! │         ▼                                                                  │
//! │   ┌──────────────┐     ┌──────────────┐     ┌──────────────────────────┐  │
//! │   │ Apply        │────▶│ Ensure Image │────▶│ Create & Start Container │  │
//! │   │ Options      │     │ (pull once)  │     │ (planned mounts + port)  │  │
//! │   └──────────────┘     └──────────────┘     └──────────────────────────┘  │
//! │                                                        │                   │
//! │                                                        ▼                   │
//! │                       ┌──────────────┐     ┌──────────────────────────┐   │
//! │                       │ Resolve Host │◀────│ Poll Logs for Marker     │   │
//! │                       │ Port         │     │ (optional, bounded)      │   │
//! │                       └──────────────┘     └──────────────────────────┘   │
//! │                              │                                            │
//! │                              ▼                                            │
//! │                       ┌──────────────┐     ┌──────────────────────────┐   │
//! │                       │ Started      │────▶│ Exit Watcher (stops on   │   │
//! │                       │              │     │ shutdown token)          │   │
//! │                       └──────────────┘     └──────────────────────────┘   │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use localstack_stack::stack::{Stack, with_container_name, with_init_timeout};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let stack = Stack::new();
//!
//! stack
//!     .start(false, [with_container_name("localstack"), with_init_timeout(120)])
//!     .await?;
//!
//! println!("LocalStack available at: {}", stack.endpoint_url().await);
//!
//! stack.stop().await?;
//! # Ok(())
//! # }
//! ```

mod controller;
pub mod image;
pub mod mounts;
mod options;
pub mod ports;
pub mod probe;
pub mod readiness;

pub use controller::{FaultHandler, Stack, StackBuilder, exit_on_fault};
pub use options::{
    StackOption, StackSettings, with_container_name, with_init_log_line, with_init_timeout,
    with_reuse_existing, with_volume_mounts, with_wait_for_init,
};
pub use probe::{QueueClient, QueueConnector, SqsConnector};

/// Image run by default.
pub const LOCALSTACK_IMAGE: &str = "localstack/localstack:3.0";

/// The port LocalStack listens on inside the container.
pub const FIXED_PORT: &str = "4566/tcp";

/// Docker control socket, mounted into the container so LocalStack can start
/// Lambda and other nested containers.
pub const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Grace period handed to the runtime when stopping the container.
pub const STOP_TIMEOUT_SECS: i64 = 10;
