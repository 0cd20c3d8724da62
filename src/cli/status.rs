//! `status`: report whether a stack could start on this host.

use crate::config::StackConfig;
use crate::runtime::{DockerConnector, RuntimeConnector, check_docker};
use crate::stack::DOCKER_SOCKET;

/// Run the `status` command.
pub async fn run_status_command() -> anyhow::Result<()> {
    let config = StackConfig::resolve()?;
    let detection = check_docker().await;

    println!("Docker:  {}", detection.status);
    if let Some(hint) = detection.hint() {
        println!("         {hint}");
    }
    if !detection.host_socket_present {
        println!(
            "Warning: {DOCKER_SOCKET} not found; LocalStack will not be able to start nested containers"
        );
    }

    if !detection.status.is_ok() {
        return Ok(());
    }

    let runtime = DockerConnector.connect().await?;
    let cached = runtime
        .list_images(&config.image)
        .await?
        .iter()
        .flat_map(|summary| summary.repo_tags.iter())
        .any(|tag| *tag == config.image);

    println!(
        "Image:   {} ({})",
        config.image,
        if cached { "cached" } else { "will be pulled" }
    );
    Ok(())
}
