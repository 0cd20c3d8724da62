//! Readiness polling on container output.

use std::time::Duration;

use futures::StreamExt;
use tokio::time::Instant;

use crate::error::{Result, RuntimeError, StackError};
use crate::runtime::ContainerRuntime;

/// Marker LocalStack prints once all services are up.
pub const DEFAULT_INIT_LOG_LINE: &str = "Ready.";

/// Pause between two log snapshots.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Block until the container's stdout contains `marker`.
///
/// `timeout_secs == 0` waits forever. Log fetch failures only mean "not ready
/// yet"; the only error is [`StackError::InitTimeout`]. Returns at the latest
/// one poll interval after the bound.
pub async fn wait_ready(
    runtime: &dyn ContainerRuntime,
    container_id: &str,
    timeout_secs: u64,
    marker: Option<&str>,
) -> Result<()> {
    let marker = marker
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_INIT_LOG_LINE);
    let bound = Duration::from_secs(timeout_secs);
    let start = Instant::now();

    loop {
        if timeout_secs > 0 && start.elapsed() >= bound {
            return Err(StackError::InitTimeout { timeout_secs });
        }

        match init_complete(runtime, container_id, marker).await {
            Ok(true) => {
                tracing::debug!(
                    "Container {} ready after {:?}",
                    container_id,
                    start.elapsed()
                );
                return Ok(());
            }
            Ok(false) => {}
            Err(e) => tracing::trace!("Readiness check failed: {}", e),
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Read the whole stdout snapshot and look for `marker`.
async fn init_complete(
    runtime: &dyn ContainerRuntime,
    container_id: &str,
    marker: &str,
) -> std::result::Result<bool, RuntimeError> {
    let mut stream = runtime.container_logs(container_id).await?;

    let mut content = Vec::new();
    while let Some(chunk) = stream.next().await {
        content.extend_from_slice(&chunk?);
    }

    Ok(String::from_utf8_lossy(&content).contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubOp, StubRuntime};

    #[tokio::test(start_paused = true)]
    async fn test_marker_on_first_poll() {
        let runtime = StubRuntime::new();
        let start = Instant::now();

        wait_ready(&runtime, "abc", 10, None).await.unwrap();

        assert_eq!(runtime.calls(StubOp::ContainerLogs), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_marker_detected_on_later_poll() {
        let runtime = StubRuntime::new();
        runtime.set_ready_after(Some(3));
        let start = Instant::now();

        wait_ready(&runtime, "abc", 0, None).await.unwrap();

        assert_eq!(runtime.calls(StubOp::ContainerLogs), 3);
        assert_eq!(start.elapsed(), POLL_INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_bounded() {
        let runtime = StubRuntime::new();
        runtime.set_ready_after(None);
        let start = Instant::now();

        let err = wait_ready(&runtime, "abc", 3, None).await.unwrap_err();

        let elapsed = start.elapsed();
        assert_eq!(err.timeout_secs(), Some(3));
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(3) + POLL_INTERVAL);
        assert_eq!(runtime.calls(StubOp::ContainerLogs), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_marker() {
        let runtime = StubRuntime::new();
        runtime.set_log_marker("Booted");

        wait_ready(&runtime, "abc", 5, Some("Booted")).await.unwrap();

        let err = wait_ready(&runtime, "abc", 1, Some("Ready.")).await.unwrap_err();
        assert!(matches!(err, StackError::InitTimeout { timeout_secs: 1 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_marker_falls_back_to_default() {
        let runtime = StubRuntime::new();

        wait_ready(&runtime, "abc", 1, Some("")).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_log_errors_are_soft() {
        let runtime = StubRuntime::new();
        runtime.set_failing(StubOp::ContainerLogs, true);

        let toggler = runtime.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1200)).await;
            toggler.set_failing(StubOp::ContainerLogs, false);
        });

        let start = Instant::now();
        wait_ready(&runtime, "abc", 5, None).await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_millis(1500));
        assert_eq!(runtime.calls(StubOp::ContainerLogs), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_log_errors_only_end_in_timeout() {
        let runtime = StubRuntime::new();
        runtime.set_failing(StubOp::ContainerLogs, true);

        let err = wait_ready(&runtime, "abc", 2, None).await.unwrap_err();

        assert!(matches!(err, StackError::InitTimeout { timeout_secs: 2 }));
    }
}
