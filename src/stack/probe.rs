//! Best-effort functional probe against the emulated SQS API.
//!
//! Container "running" and the readiness marker only say the process booted.
//! The probe creates and deletes a throwaway queue through the resolved
//! endpoint to confirm requests are actually served.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sqs::config::Credentials;
use aws_sdk_sqs::error::DisplayErrorContext;

use crate::error::ProbeError;

pub const PROBE_QUEUE_NAME: &str = "test-queue";
pub const PROBE_REGION: &str = "us-east-1";

/// Queue operations used by the probe.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Create a queue, returning its URL if the service reported one.
    async fn create_queue(&self, name: &str) -> Result<Option<String>, ProbeError>;

    async fn delete_queue(&self, queue_url: &str) -> Result<(), ProbeError>;
}

/// Builds a [`QueueClient`] aimed at an endpoint.
#[async_trait]
pub trait QueueConnector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn QueueClient>, ProbeError>;
}

/// Connector for the AWS SDK SQS client with dummy static credentials.
#[derive(Debug, Clone, Default)]
pub struct SqsConnector;

#[async_trait]
impl QueueConnector for SqsConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn QueueClient>, ProbeError> {
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ProbeError::Config {
                reason: format!("endpoint '{endpoint}' is not an http(s) URL"),
            });
        }

        let credentials = Credentials::new(
            "dummy",
            "dummy",
            Some("dummy".to_string()),
            None,
            "localstack-stack",
        );

        // The endpoint URL is used verbatim: no host prefix, no region rewrite.
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(PROBE_REGION))
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .load()
            .await;

        Ok(Box::new(SqsQueueClient {
            client: aws_sdk_sqs::Client::new(&sdk_config),
        }))
    }
}

pub struct SqsQueueClient {
    client: aws_sdk_sqs::Client,
}

#[async_trait]
impl QueueClient for SqsQueueClient {
    async fn create_queue(&self, name: &str) -> Result<Option<String>, ProbeError> {
        let output = self
            .client
            .create_queue()
            .queue_name(name)
            .send()
            .await
            .map_err(|e| ProbeError::Request(DisplayErrorContext(&e).to_string()))?;

        Ok(output.queue_url().map(str::to_string))
    }

    async fn delete_queue(&self, queue_url: &str) -> Result<(), ProbeError> {
        self.client
            .delete_queue()
            .queue_url(queue_url)
            .send()
            .await
            .map_err(|e| ProbeError::Request(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}

/// Create then delete [`PROBE_QUEUE_NAME`] through `endpoint`.
///
/// True only when creation returned a non-empty queue URL. Deletion is
/// cleanup and its outcome is ignored.
pub async fn run_probe(connector: &dyn QueueConnector, endpoint: &str) -> bool {
    let client = match connector.connect(endpoint).await {
        Ok(client) => client,
        Err(e) => {
            tracing::debug!("Functional probe skipped: {}", e);
            return false;
        }
    };

    let queue_url = match client.create_queue(PROBE_QUEUE_NAME).await {
        Ok(Some(url)) if !url.is_empty() => url,
        Ok(_) => {
            tracing::debug!("Functional probe: create returned no queue URL");
            return false;
        }
        Err(e) => {
            tracing::debug!("Functional probe failed: {}", e);
            return false;
        }
    };

    if let Err(e) = client.delete_queue(&queue_url).await {
        tracing::trace!("Functional probe cleanup failed: {}", e);
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubQueueConnector;

    #[tokio::test]
    async fn test_probe_round_trip() {
        let connector = StubQueueConnector::new();

        assert!(run_probe(&connector, "http://localhost:4566").await);
        assert_eq!(connector.created(), vec![PROBE_QUEUE_NAME.to_string()]);
        assert_eq!(connector.deleted().len(), 1);
        assert_eq!(
            connector.last_endpoint().as_deref(),
            Some("http://localhost:4566")
        );
    }

    #[tokio::test]
    async fn test_delete_failure_is_ignored() {
        let connector = StubQueueConnector::new();
        connector.set_fail_delete(true);

        assert!(run_probe(&connector, "http://localhost:4566").await);
    }

    #[tokio::test]
    async fn test_create_failure() {
        let connector = StubQueueConnector::new();
        connector.set_fail_create(true);

        assert!(!run_probe(&connector, "http://localhost:4566").await);
        assert!(connector.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_missing_queue_url() {
        let connector = StubQueueConnector::new();
        connector.set_queue_url(None);

        assert!(!run_probe(&connector, "http://localhost:4566").await);

        connector.set_queue_url(Some(String::new()));
        assert!(!run_probe(&connector, "http://localhost:4566").await);
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let connector = StubQueueConnector::new();
        connector.set_fail_connect(true);

        assert!(!run_probe(&connector, "http://localhost:4566").await);
        assert!(connector.created().is_empty());
    }

    #[tokio::test]
    async fn test_sqs_connector_rejects_empty_endpoint() {
        let result = SqsConnector.connect("").await;
        assert!(matches!(result, Err(ProbeError::Config { .. })));
    }
}
