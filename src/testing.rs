//! Test doubles for driving a [`Stack`](crate::Stack) without Docker.
//!
//! Provides:
//! - [`StubRuntime`]: a scripted in-memory container runtime (and connector)
//! - [`StubQueueConnector`]: a scripted queue client for the functional probe
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use localstack_stack::Stack;
//! use localstack_stack::testing::{StubOp, StubRuntime};
//!
//! # async fn example() {
//! let runtime = StubRuntime::new();
//! let stack = Stack::builder().connector(Arc::new(runtime.clone())).build();
//!
//! stack.start(false, []).await.unwrap();
//! assert_eq!(runtime.calls(StubOp::CreateContainer), 1);
//! # }
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream};

use crate::error::{ProbeError, RuntimeError};
use crate::runtime::{
    ContainerInspection, ContainerRuntime, ContainerSpec, HostBinding, ImageSummary, LogStream,
    PortMap, PullProgress, PullStream, RuntimeConnector,
};
use crate::stack::FIXED_PORT;
use crate::stack::probe::{QueueClient, QueueConnector};

/// Operations of the stub runtime, for failure toggles and call counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StubOp {
    Connect,
    ListImages,
    PullImage,
    /// The pull stream itself: fails after the first progress event.
    PullStream,
    CreateContainer,
    StartContainer,
    StopContainer,
    InspectContainer,
    ContainerLogs,
}

const ALL_OPS: [StubOp; 9] = [
    StubOp::Connect,
    StubOp::ListImages,
    StubOp::PullImage,
    StubOp::PullStream,
    StubOp::CreateContainer,
    StubOp::StartContainer,
    StubOp::StopContainer,
    StubOp::InspectContainer,
    StubOp::ContainerLogs,
];

fn op_index(op: StubOp) -> usize {
    ALL_OPS.iter().position(|o| *o == op).unwrap_or(0)
}

#[derive(Debug, Clone)]
struct StubContainer {
    spec: ContainerSpec,
    host_port: String,
    running: bool,
}

#[derive(Debug)]
struct StubState {
    local_images: Vec<String>,
    failing: Vec<StubOp>,
    name_in_use: bool,
    report_bindings: bool,
    pull_events: usize,
    pull_events_drained: usize,
    /// 1-based log fetch at which the marker first shows up; `None` = never.
    ready_after: Option<usize>,
    marker: String,
    latency: Duration,
    next_port: u16,
    next_id: usize,
    containers: HashMap<String, StubContainer>,
    last_spec: Option<ContainerSpec>,
}

impl Default for StubState {
    fn default() -> Self {
        Self {
            local_images: Vec::new(),
            failing: Vec::new(),
            name_in_use: false,
            report_bindings: true,
            pull_events: 2,
            pull_events_drained: 0,
            ready_after: Some(1),
            marker: "Ready.".to_string(),
            latency: Duration::ZERO,
            next_port: 49153,
            next_id: 0,
            containers: HashMap::new(),
            last_spec: None,
        }
    }
}

#[derive(Debug, Default)]
struct StubInner {
    state: Mutex<StubState>,
    calls: [AtomicUsize; 9],
}

/// In-memory container runtime.
///
/// Defaults: image absent (pulled with two progress events), readiness marker
/// `"Ready."` present on the first log fetch, host ports assigned from 49153.
/// Clones share state, so a clone handed to a [`Stack`](crate::Stack) can be
/// inspected and reconfigured from the test.
#[derive(Debug, Clone, Default)]
pub struct StubRuntime {
    inner: Arc<StubInner>,
}

impl StubRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local_image(self, tag: &str) -> Self {
        self.state().local_images.push(tag.to_string());
        self
    }

    fn state(&self) -> MutexGuard<'_, StubState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count the call and report whether it should fail.
    async fn enter(&self, op: StubOp) -> Result<(), RuntimeError> {
        self.inner.calls[op_index(op)].fetch_add(1, Ordering::SeqCst);
        let (latency, failing) = {
            let state = self.state();
            (state.latency, state.failing.contains(&op))
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if failing {
            return Err(RuntimeError::api(format!("stub {op:?} failure")));
        }
        Ok(())
    }

    /// Make an operation fail (or succeed again).
    pub fn set_failing(&self, op: StubOp, failing: bool) {
        let mut state = self.state();
        state.failing.retain(|o| *o != op);
        if failing {
            state.failing.push(op);
        }
    }

    /// Report every named create as a name conflict.
    pub fn set_name_in_use(&self, in_use: bool) {
        self.state().name_in_use = in_use;
    }

    /// Whether inspect reports a host binding for the fixed port.
    pub fn set_report_bindings(&self, report: bool) {
        self.state().report_bindings = report;
    }

    pub fn set_pull_events(&self, events: usize) {
        self.state().pull_events = events;
    }

    pub fn set_ready_after(&self, fetch: Option<usize>) {
        self.state().ready_after = fetch;
    }

    pub fn set_log_marker(&self, marker: &str) {
        self.state().marker = marker.to_string();
    }

    /// Delay every operation, to widen interleavings in concurrency tests.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = latency;
    }

    pub fn calls(&self, op: StubOp) -> usize {
        self.inner.calls[op_index(op)].load(Ordering::SeqCst)
    }

    pub fn pull_events_drained(&self) -> usize {
        self.state().pull_events_drained
    }

    pub fn last_spec(&self) -> Option<ContainerSpec> {
        self.state().last_spec.clone()
    }

    pub fn host_port(&self, id: &str) -> Option<String> {
        self.state().containers.get(id).map(|c| c.host_port.clone())
    }

    /// Ids of containers currently running.
    pub fn running(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .state()
            .containers
            .iter()
            .filter(|(_, c)| c.running)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl RuntimeConnector for StubRuntime {
    async fn connect(&self) -> Result<Arc<dyn ContainerRuntime>, RuntimeError> {
        self.enter(StubOp::Connect)
            .await
            .map_err(|e| RuntimeError::Connect {
                reason: e.to_string(),
            })?;
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl ContainerRuntime for StubRuntime {
    async fn list_images(&self, reference: &str) -> Result<Vec<ImageSummary>, RuntimeError> {
        self.enter(StubOp::ListImages).await?;
        let repo = reference.split(':').next().unwrap_or(reference);
        let tags: Vec<String> = self
            .state()
            .local_images
            .iter()
            .filter(|tag| tag.split(':').next() == Some(repo))
            .cloned()
            .collect();
        Ok(tags
            .into_iter()
            .map(|tag| ImageSummary {
                repo_tags: vec![tag],
            })
            .collect())
    }

    async fn pull_image(&self, reference: &str) -> Result<PullStream, RuntimeError> {
        self.enter(StubOp::PullImage).await?;

        let (events, fail_midway) = {
            let state = self.state();
            (state.pull_events, state.failing.contains(&StubOp::PullStream))
        };

        let runtime = self.clone();
        let reference = reference.to_string();
        let stream = stream::iter(0..events).map(move |n| {
            if fail_midway && n > 0 {
                return Err(RuntimeError::api("stub pull interrupted"));
            }
            let mut state = runtime.state();
            state.pull_events_drained += 1;
            if n + 1 == events {
                state.local_images.push(reference.clone());
            }
            Ok(PullProgress {
                status: Some(format!("Downloading layer {n}")),
            })
        });

        Ok(Box::pin(stream))
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        self.enter(StubOp::CreateContainer).await?;

        let mut state = self.state();
        state.last_spec = Some(spec.clone());

        if state.name_in_use {
            return Err(RuntimeError::NameConflict {
                name: spec.name.clone().unwrap_or_default(),
            });
        }

        state.next_id += 1;
        let id = format!("stub-{:04}", state.next_id);
        let host_port = state.next_port.to_string();
        state.next_port += 1;
        state.containers.insert(
            id.clone(),
            StubContainer {
                spec: spec.clone(),
                host_port,
                running: false,
            },
        );
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.enter(StubOp::StartContainer).await?;
        match self.state().containers.get_mut(id) {
            Some(container) => {
                container.running = true;
                Ok(())
            }
            None => Err(RuntimeError::api(format!("No such container: {id}"))),
        }
    }

    async fn stop_container(&self, id: &str, _timeout_secs: i64) -> Result<(), RuntimeError> {
        self.enter(StubOp::StopContainer).await?;
        let mut state = self.state();
        let auto_remove = match state.containers.get_mut(id) {
            Some(container) => {
                container.running = false;
                container.spec.auto_remove
            }
            None => return Err(RuntimeError::api(format!("No such container: {id}"))),
        };
        if auto_remove {
            state.containers.remove(id);
        }
        Ok(())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerInspection, RuntimeError> {
        self.enter(StubOp::InspectContainer).await?;
        let state = self.state();
        let container = state
            .containers
            .get(id)
            .ok_or_else(|| RuntimeError::api(format!("No such container: {id}")))?;

        let mut ports = PortMap::new();
        ports.insert(
            FIXED_PORT.to_string(),
            if state.report_bindings {
                vec![HostBinding::new("0.0.0.0", container.host_port.clone())]
            } else {
                Vec::new()
            },
        );
        Ok(ContainerInspection { ports })
    }

    async fn container_logs(&self, _id: &str) -> Result<LogStream, RuntimeError> {
        self.enter(StubOp::ContainerLogs).await?;
        let fetch = self.calls(StubOp::ContainerLogs);
        let state = self.state();

        let mut chunks = vec![Ok(Bytes::from_static(b"LocalStack version: 3.0.0\n"))];
        if state.ready_after.is_some_and(|after| fetch >= after) {
            chunks.push(Ok(Bytes::from(format!("{}\n", state.marker))));
        }
        Ok(Box::pin(stream::iter(chunks)))
    }
}

#[derive(Debug)]
struct QueueState {
    fail_connect: bool,
    fail_create: bool,
    fail_delete: bool,
    queue_url: Option<String>,
    last_endpoint: Option<String>,
    created: Vec<String>,
    deleted: Vec<String>,
}

impl Default for QueueState {
    fn default() -> Self {
        Self {
            fail_connect: false,
            fail_create: false,
            fail_delete: false,
            queue_url: Some("http://localhost:4566/000000000000/test-queue".to_string()),
            last_endpoint: None,
            created: Vec::new(),
            deleted: Vec::new(),
        }
    }
}

/// Scripted [`QueueConnector`] recording what the probe did.
#[derive(Debug, Clone, Default)]
pub struct StubQueueConnector {
    state: Arc<Mutex<QueueState>>,
}

impl StubQueueConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.state().fail_connect = fail;
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.state().fail_create = fail;
    }

    pub fn set_fail_delete(&self, fail: bool) {
        self.state().fail_delete = fail;
    }

    /// URL returned by create; `None` simulates a response without one.
    pub fn set_queue_url(&self, url: Option<String>) {
        self.state().queue_url = url;
    }

    pub fn last_endpoint(&self) -> Option<String> {
        self.state().last_endpoint.clone()
    }

    pub fn created(&self) -> Vec<String> {
        self.state().created.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state().deleted.clone()
    }
}

#[async_trait]
impl QueueConnector for StubQueueConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn QueueClient>, ProbeError> {
        let mut state = self.state();
        state.last_endpoint = Some(endpoint.to_string());
        if state.fail_connect || endpoint.is_empty() {
            return Err(ProbeError::Config {
                reason: "stub connect failure".to_string(),
            });
        }
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl QueueClient for StubQueueConnector {
    async fn create_queue(&self, name: &str) -> Result<Option<String>, ProbeError> {
        let mut state = self.state();
        if state.fail_create {
            return Err(ProbeError::Request("stub create failure".to_string()));
        }
        state.created.push(name.to_string());
        Ok(state.queue_url.clone())
    }

    async fn delete_queue(&self, queue_url: &str) -> Result<(), ProbeError> {
        let mut state = self.state();
        if state.fail_delete {
            return Err(ProbeError::Request("stub delete failure".to_string()));
        }
        state.deleted.push(queue_url.to_string());
        Ok(())
    }
}
