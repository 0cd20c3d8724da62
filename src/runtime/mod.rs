//! Container runtime seam.
//!
//! The stack talks to the container runtime only through [`ContainerRuntime`],
//! which exposes the seven operations the lifecycle needs. [`DockerRuntime`]
//! implements it over bollard; tests use
//! [`StubRuntime`](crate::testing::StubRuntime).
//!
//! A fresh runtime handle is acquired through a [`RuntimeConnector`] on every
//! start, mirroring how a Docker client is built from the environment.

mod detect;
mod docker;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::RuntimeError;

pub use detect::{DockerDetection, DockerStatus, Platform, check_docker};
pub use docker::{DockerConnector, DockerRuntime, connect_docker};

/// Progress events of an image pull. Must be drained to completion.
pub type PullStream = BoxStream<'static, Result<PullProgress, RuntimeError>>;

/// Raw chunks of a non-following container log read.
pub type LogStream = BoxStream<'static, Result<Bytes, RuntimeError>>;

/// Port spec (`"4566/tcp"`) to host bindings.
pub type PortMap = HashMap<String, Vec<HostBinding>>;

/// A locally available image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSummary {
    pub repo_tags: Vec<String>,
}

/// One progress record from a pull.
#[derive(Debug, Clone, Default)]
pub struct PullProgress {
    pub status: Option<String>,
}

/// A host-side binding for a container port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostBinding {
    /// Host address, e.g. `0.0.0.0` before start or `localhost` after.
    pub host_ip: String,
    /// Host port. Empty asks the runtime for an ephemeral port.
    pub host_port: String,
}

impl HostBinding {
    pub fn new(host_ip: impl Into<String>, host_port: impl Into<String>) -> Self {
        Self {
            host_ip: host_ip.into(),
            host_port: host_port.into(),
        }
    }
}

/// A bind mount handed to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    /// Path on the host.
    pub source: String,
    /// Path inside the container.
    pub target: String,
    pub read_only: bool,
}

/// Everything needed to create the container.
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    pub image: String,
    /// Optional container name; `None` lets the runtime pick one.
    pub name: Option<String>,
    pub tty: bool,
    pub attach_stdout: bool,
    pub attach_stderr: bool,
    pub port_bindings: PortMap,
    pub mounts: Vec<MountSpec>,
    /// Remove the container once it stops.
    pub auto_remove: bool,
}

/// Result of inspecting a running container.
#[derive(Debug, Clone, Default)]
pub struct ContainerInspection {
    /// Resolved host bindings keyed by container port spec.
    pub ports: PortMap,
}

/// Operations the stack needs from a container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// List local images matching a reference filter.
    async fn list_images(&self, reference: &str) -> Result<Vec<ImageSummary>, RuntimeError>;

    /// Start pulling an image.
    async fn pull_image(&self, reference: &str) -> Result<PullStream, RuntimeError>;

    /// Create a container and return its identifier.
    ///
    /// Must return [`RuntimeError::NameConflict`] when the requested name is
    /// already taken.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError>;

    /// Stop a container, giving it `timeout_secs` before it is killed.
    async fn stop_container(&self, id: &str, timeout_secs: i64) -> Result<(), RuntimeError>;

    async fn inspect_container(&self, id: &str) -> Result<ContainerInspection, RuntimeError>;

    /// Snapshot of the container's stdout so far.
    async fn container_logs(&self, id: &str) -> Result<LogStream, RuntimeError>;
}

/// Builds a runtime handle. Called once per start.
#[async_trait]
pub trait RuntimeConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn ContainerRuntime>, RuntimeError>;
}
