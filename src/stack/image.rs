//! Image provisioning.

use futures::StreamExt;

use crate::error::{Result, RuntimeError, StackError};
use crate::runtime::ContainerRuntime;

fn provision_error(image: &str, e: RuntimeError) -> StackError {
    StackError::Provision {
        image: image.to_string(),
        reason: e.to_string(),
    }
}

/// Make sure `image` is available locally, pulling it if no local tag matches
/// exactly.
///
/// The pull's progress stream is drained to completion; the stream is dropped
/// (and its connection closed) on every return path.
pub async fn ensure_image(runtime: &dyn ContainerRuntime, image: &str) -> Result<()> {
    let images = runtime
        .list_images(image)
        .await
        .map_err(|e| provision_error(image, e))?;

    if images
        .iter()
        .flat_map(|summary| summary.repo_tags.iter())
        .any(|tag| tag == image)
    {
        tracing::debug!("Image '{}' exists locally", image);
        return Ok(());
    }

    tracing::info!("Pulling image: {}", image);

    let mut stream = runtime
        .pull_image(image)
        .await
        .map_err(|e| provision_error(image, e))?;

    while let Some(progress) = stream.next().await {
        let progress = progress.map_err(|e| provision_error(image, e))?;
        if let Some(status) = progress.status {
            tracing::trace!("Pull status: {}", status);
        }
    }

    tracing::info!("Pulled image: {}", image);
    Ok(())
}
