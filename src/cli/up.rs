//! `up`: start LocalStack and hold it until Ctrl-C.

use clap::Args;

use crate::config::StackConfig;
use crate::error::StackError;
use crate::stack::Stack;

#[derive(Args, Debug, Clone, Default)]
pub struct UpArgs {
    /// Stop an already running container first
    #[arg(long)]
    pub force_restart: bool,

    /// Container name
    #[arg(long)]
    pub name: Option<String>,

    /// Extra read-only mount, repeatable
    #[arg(long = "mount", value_name = "CONTAINER=HOST", value_parser = parse_mount)]
    pub mounts: Vec<(String, String)>,

    /// Readiness marker to wait for in the container output
    #[arg(long)]
    pub log_line: Option<String>,

    /// Give up waiting for readiness after this many seconds (0 waits forever)
    #[arg(long, value_name = "SECS")]
    pub init_timeout: Option<u64>,

    /// Return as soon as the container runs
    #[arg(long)]
    pub no_wait: bool,

    /// Treat an existing container with the same name as already started
    #[arg(long)]
    pub reuse_existing: bool,

    /// Create and delete an SQS queue to confirm the endpoint serves requests
    #[arg(long)]
    pub probe: bool,
}

fn parse_mount(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((container, host)) if !container.is_empty() && !host.is_empty() => {
            Ok((container.to_string(), host.to_string()))
        }
        _ => Err(format!("expected CONTAINER=HOST, got '{raw}'")),
    }
}

impl UpArgs {
    /// Layer the flags over the environment configuration.
    pub fn apply_to(&self, config: &mut StackConfig) {
        if let Some(ref name) = self.name {
            config.container_name = Some(name.clone());
        }
        for (container, host) in &self.mounts {
            config
                .volume_mounts
                .insert(container.clone(), host.clone());
        }
        if let Some(ref line) = self.log_line {
            config.init_log_line = Some(line.clone());
        }
        if let Some(timeout) = self.init_timeout {
            config.init_timeout_secs = timeout;
        }
        if self.no_wait {
            config.wait_for_init = false;
        }
        if self.reuse_existing {
            config.reuse_existing = true;
        }
    }
}

/// Run the `up` command.
pub async fn run_up_command(args: UpArgs) -> anyhow::Result<()> {
    let mut config = StackConfig::resolve()?;
    args.apply_to(&mut config);

    let stack = Stack::builder().image(config.image.clone()).build();
    let shutdown = stack.shutdown_token();

    let start = stack.start(args.force_restart, config.to_options());
    tokio::pin!(start);
    let started = tokio::select! {
        result = &mut start => result,
        _ = tokio::signal::ctrl_c() => {
            println!("Interrupted, cleaning up");
            shutdown.cancel();
            start.await
        }
    };
    match started {
        Ok(()) => {}
        Err(StackError::ShutDown) => {
            println!("LocalStack start cancelled");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    let endpoint = stack.endpoint_url().await;
    if endpoint.is_empty() {
        println!(
            "Container '{}' already exists; leaving it untouched",
            config.container_name.as_deref().unwrap_or_default()
        );
        return Ok(());
    }
    println!("LocalStack ready at {endpoint}");

    if args.probe {
        if stack.is_functional().await {
            println!("Functional probe: ok");
        } else {
            println!("Functional probe: failed");
        }
    }

    println!("Press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    shutdown.cancel();
    stack.stop().await?;
    println!("LocalStack stopped");
    Ok(())
}
