//! The stack controller: start/stop state machine and exit watcher.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, RuntimeError, StackError};
use crate::runtime::{ContainerRuntime, ContainerSpec, DockerConnector, PortMap, RuntimeConnector};
use crate::stack::image::ensure_image;
use crate::stack::mounts::build_mounts;
use crate::stack::options::{StackOption, StackSettings};
use crate::stack::ports::{self, ephemeral_binding, resolve_host_binding};
use crate::stack::probe::{QueueConnector, SqsConnector, run_probe};
use crate::stack::readiness::wait_ready;
use crate::stack::{FIXED_PORT, LOCALSTACK_IMAGE, STOP_TIMEOUT_SECS};

/// Receives a stop failure raised by the exit watcher.
pub type FaultHandler = Arc<dyn Fn(StackError) + Send + Sync>;

/// Default fault handler: a container that cannot be stopped at shutdown is
/// treated as fatal, so log and exit the process.
pub fn exit_on_fault() -> FaultHandler {
    Arc::new(|err: StackError| {
        tracing::error!("Could not stop LocalStack container on shutdown: {}", err);
        std::process::exit(1);
    })
}

/// Everything guarded by the stack's exclusive lock.
///
/// `started` implies `container_id.is_some()` and a resolved binding for
/// [`FIXED_PORT`] in `port_map`.
#[derive(Default)]
struct StackState {
    started: bool,
    container_id: Option<String>,
    port_map: PortMap,
    settings: StackSettings,
    runtime: Option<Arc<dyn ContainerRuntime>>,
    /// Cancelled when the container started alongside the current watcher is
    /// stopped, so that watcher exits without touching a later container.
    retire: Option<CancellationToken>,
}

struct StackInner {
    /// Not re-entrant: never lock twice on one call path.
    state: Mutex<StackState>,
    connector: Arc<dyn RuntimeConnector>,
    image: String,
    shutdown: CancellationToken,
    fault_handler: FaultHandler,
}

/// Builder for [`Stack`].
pub struct StackBuilder {
    connector: Arc<dyn RuntimeConnector>,
    image: String,
    shutdown: Option<CancellationToken>,
    fault_handler: Option<FaultHandler>,
}

impl Default for StackBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StackBuilder {
    pub fn new() -> Self {
        Self {
            connector: Arc::new(DockerConnector),
            image: LOCALSTACK_IMAGE.to_string(),
            shutdown: None,
            fault_handler: None,
        }
    }

    /// Use another runtime than the local Docker daemon.
    pub fn connector(mut self, connector: Arc<dyn RuntimeConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Token whose cancellation stops the container. Defaults to a fresh
    /// token, reachable through [`Stack::shutdown_token`].
    pub fn shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Where the exit watcher reports a failed stop. Defaults to
    /// [`exit_on_fault`].
    pub fn fault_handler(mut self, handler: FaultHandler) -> Self {
        self.fault_handler = Some(handler);
        self
    }

    pub fn build(self) -> Stack {
        Stack {
            inner: Arc::new(StackInner {
                state: Mutex::new(StackState::default()),
                connector: self.connector,
                image: self.image,
                shutdown: self.shutdown.unwrap_or_default(),
                fault_handler: self.fault_handler.unwrap_or_else(exit_on_fault),
            }),
        }
    }
}

/// Handle to one LocalStack container lifecycle.
///
/// Cloning is cheap and every clone drives the same container. `start` and
/// `stop` are serialized by one exclusive lock held for the whole call.
#[derive(Clone)]
pub struct Stack {
    inner: Arc<StackInner>,
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("image", &self.inner.image)
            .finish_non_exhaustive()
    }
}

impl Stack {
    /// A stack backed by the local Docker daemon with default settings.
    pub fn new() -> Self {
        StackBuilder::new().build()
    }

    pub fn builder() -> StackBuilder {
        StackBuilder::new()
    }

    pub fn image(&self) -> &str {
        &self.inner.image
    }

    /// The token watched by the exit watcher. Cancel it to stop the container.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Start the container.
    ///
    /// Already started: returns immediately unless `force_restart`, in which
    /// case the current container is stopped first and a stop failure aborts
    /// the restart. Options are applied before anything touches the runtime.
    ///
    /// On failure the stack is left as the failing step found it: a created
    /// container keeps its id but `started` stays false. If the shutdown token
    /// fires during the readiness wait, the container is stopped and
    /// [`StackError::ShutDown`] is returned.
    pub async fn start(
        &self,
        force_restart: bool,
        options: impl IntoIterator<Item = StackOption>,
    ) -> Result<()> {
        let mut state = self.inner.state.lock().await;

        if state.started {
            if !force_restart {
                tracing::debug!("Stack already started");
                return Ok(());
            }
            tracing::info!("Restarting LocalStack container");
            self.stop_locked(&mut state).await?;
        }

        if self.inner.shutdown.is_cancelled() {
            return Err(StackError::ShutDown);
        }

        for option in options {
            option.apply(&mut state.settings);
        }
        tracing::debug!("Stack settings: {:?}", state.settings);

        let runtime = self
            .inner
            .connector
            .connect()
            .await
            .map_err(|e| StackError::ClientInit {
                reason: e.to_string(),
            })?;
        state.runtime = Some(Arc::clone(&runtime));

        self.start_locked(&mut state, runtime).await
    }

    async fn start_locked(
        &self,
        state: &mut StackState,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Result<()> {
        state
            .port_map
            .insert(FIXED_PORT.to_string(), ephemeral_binding());

        ensure_image(runtime.as_ref(), &self.inner.image).await?;

        let spec = ContainerSpec {
            image: self.inner.image.clone(),
            name: state.settings.container_name.clone(),
            tty: true,
            attach_stdout: true,
            attach_stderr: true,
            port_bindings: state.port_map.clone(),
            mounts: build_mounts(&state.settings.volume_mounts),
            auto_remove: true,
        };

        let container_id = match runtime.create_container(&spec).await {
            Ok(id) => id,
            Err(RuntimeError::NameConflict { name })
                if state.settings.reuse_existing
                    && state.settings.container_name.as_deref() == Some(name.as_str()) =>
            {
                // The existing container is assumed healthy; nothing is
                // attached, so the stack stays not started.
                tracing::warn!("Container '{}' already exists, reusing it", name);
                state.container_id = None;
                return Ok(());
            }
            Err(source) => return Err(StackError::Create { source }),
        };

        state.container_id = Some(container_id.clone());
        tracing::info!("Created LocalStack container: {}", container_id);

        runtime
            .start_container(&container_id)
            .await
            .map_err(|e| StackError::Start {
                id: container_id.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!("Started LocalStack container: {}", container_id);

        if state.settings.wait_for_init {
            let marker = state.settings.init_complete_log_line.clone();
            let ready = tokio::select! {
                result = wait_ready(
                    runtime.as_ref(),
                    &container_id,
                    state.settings.init_timeout_secs,
                    marker.as_deref(),
                ) => Some(result),
                _ = self.inner.shutdown.cancelled() => None,
            };

            match ready {
                Some(result) => result?,
                None => {
                    // No watcher exists yet, so the container is stopped here.
                    tracing::info!("Shutdown during readiness wait, stopping {}", container_id);
                    runtime
                        .stop_container(&container_id, STOP_TIMEOUT_SECS)
                        .await
                        .map_err(|e| StackError::Stop {
                            id: container_id.clone(),
                            reason: e.to_string(),
                        })?;
                    state.container_id = None;
                    return Err(StackError::ShutDown);
                }
            }
        }

        let binding = resolve_host_binding(runtime.as_ref(), &container_id).await?;
        state.port_map.insert(FIXED_PORT.to_string(), vec![binding]);
        state.started = true;

        self.spawn_watcher(state);

        tracing::info!(
            "LocalStack ready at {}",
            ports::endpoint_url(&state.port_map).unwrap_or_default()
        );
        Ok(())
    }

    /// Stop the container. No-op when nothing is started.
    ///
    /// On failure the stack stays started so the stop can be retried.
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        self.stop_locked(&mut state).await
    }

    async fn stop_locked(&self, state: &mut StackState) -> Result<()> {
        if !state.started {
            return Ok(());
        }
        let (Some(container_id), Some(runtime)) = (state.container_id.clone(), state.runtime.clone())
        else {
            return Ok(());
        };

        tracing::info!("Stopping LocalStack container: {}", container_id);

        runtime
            .stop_container(&container_id, STOP_TIMEOUT_SECS)
            .await
            .map_err(|e| StackError::Stop {
                id: container_id.clone(),
                reason: e.to_string(),
            })?;

        state.container_id = None;
        state.started = false;
        if let Some(retire) = state.retire.take() {
            retire.cancel();
        }

        tracing::info!("Stopped LocalStack container: {}", container_id);
        Ok(())
    }

    /// Spawn the task that stops this container when the shutdown token fires.
    fn spawn_watcher(&self, state: &mut StackState) {
        let retire = CancellationToken::new();
        if let Some(previous) = state.retire.replace(retire.clone()) {
            previous.cancel();
        }

        let stack = self.clone();
        let shutdown = self.inner.shutdown.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = retire.cancelled() => {}
                _ = shutdown.cancelled() => {
                    tracing::debug!("Shutdown requested, stopping LocalStack");
                    if let Err(e) = stack.stop().await {
                        (stack.inner.fault_handler)(e);
                    }
                }
            }
        });
    }

    /// `http://localhost:<port>` once started, empty otherwise.
    pub async fn endpoint_url(&self) -> String {
        let state = self.inner.state.lock().await;
        if state.container_id.is_none() {
            return String::new();
        }
        ports::endpoint_url(&state.port_map).unwrap_or_default()
    }

    pub async fn is_started(&self) -> bool {
        self.inner.state.lock().await.started
    }

    pub async fn container_id(&self) -> Option<String> {
        self.inner.state.lock().await.container_id.clone()
    }

    /// Create and delete a throwaway SQS queue through the endpoint.
    pub async fn is_functional(&self) -> bool {
        self.is_functional_with(&SqsConnector).await
    }

    /// Like [`is_functional`](Self::is_functional) with another queue client.
    pub async fn is_functional_with(&self, connector: &dyn QueueConnector) -> bool {
        let endpoint = {
            let state = self.inner.state.lock().await;
            if !state.started {
                return false;
            }
            ports::endpoint_url(&state.port_map).unwrap_or_default()
        };

        run_probe(connector, &endpoint).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::{with_container_name, with_reuse_existing};
    use crate::testing::{StubOp, StubRuntime};

    fn stub_stack(runtime: &StubRuntime) -> Stack {
        Stack::builder()
            .connector(Arc::new(runtime.clone()))
            .fault_handler(Arc::new(|err: StackError| panic!("unexpected fault: {err}")))
            .build()
    }

    #[test]
    fn test_initial_state() {
        let runtime = StubRuntime::new();
        let stack = stub_stack(&runtime);

        assert!(!tokio_test::block_on(stack.is_started()));
        assert_eq!(tokio_test::block_on(stack.endpoint_url()), "");
        assert_eq!(tokio_test::block_on(stack.container_id()), None);
        assert_eq!(stack.image(), LOCALSTACK_IMAGE);
    }

    #[tokio::test]
    async fn test_start_records_endpoint() {
        let runtime = StubRuntime::new();
        let stack = stub_stack(&runtime);

        stack.start(false, []).await.unwrap();

        let id = stack.container_id().await.unwrap();
        let port = runtime.host_port(&id).unwrap();
        assert!(stack.is_started().await);
        assert_eq!(stack.endpoint_url().await, format!("http://localhost:{port}"));
    }

    #[tokio::test]
    async fn test_container_spec() {
        let runtime = StubRuntime::new();
        let stack = stub_stack(&runtime);

        stack
            .start(false, [with_container_name("ls-test")])
            .await
            .unwrap();

        let spec = runtime.last_spec().unwrap();
        assert_eq!(spec.image, LOCALSTACK_IMAGE);
        assert_eq!(spec.name.as_deref(), Some("ls-test"));
        assert!(spec.tty && spec.attach_stdout && spec.attach_stderr);
        assert!(spec.auto_remove);
        assert_eq!(spec.port_bindings[FIXED_PORT], ephemeral_binding());
        assert_eq!(spec.mounts.len(), 1);
    }

    #[tokio::test]
    async fn test_client_init_failure() {
        let runtime = StubRuntime::new();
        runtime.set_failing(StubOp::Connect, true);
        let stack = stub_stack(&runtime);

        let err = stack.start(false, []).await.unwrap_err();

        assert!(matches!(err, StackError::ClientInit { .. }));
        assert_eq!(runtime.calls(StubOp::ListImages), 0);
    }

    #[tokio::test]
    async fn test_conflict_on_other_name_is_fatal() {
        let runtime = StubRuntime::new();
        runtime.set_name_in_use(true);
        let stack = stub_stack(&runtime);

        // No name configured: the runtime cannot report our name in use.
        let err = stack
            .start(false, [with_reuse_existing(true)])
            .await
            .unwrap_err();
        assert!(matches!(err, StackError::Create { .. }));
    }

    #[tokio::test]
    async fn test_start_after_shutdown_is_refused() {
        let runtime = StubRuntime::new();
        let stack = stub_stack(&runtime);
        stack.shutdown_token().cancel();

        let err = stack.start(false, []).await.unwrap_err();

        assert!(matches!(err, StackError::ShutDown));
        assert_eq!(runtime.calls(StubOp::Connect), 0);
    }
}
