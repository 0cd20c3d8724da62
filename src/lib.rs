//! Lifecycle management for an ephemeral LocalStack container.
//!
//! [`Stack`] provisions the image, runs the container with `4566/tcp`
//! published on an ephemeral host port, waits for LocalStack to report
//! readiness, and stops it on request or when its shutdown token fires.

pub mod cli;
pub mod config;
pub mod error;
pub mod runtime;
pub mod stack;
pub mod testing;

pub use config::StackConfig;
pub use error::{ConfigError, ProbeError, Result, RuntimeError, StackError};
pub use stack::{Stack, StackBuilder, StackOption};
