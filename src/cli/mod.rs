//! CLI command handling.
//!
//! Provides subcommands for:
//! - Running LocalStack until Ctrl-C (`up`)
//! - Checking that Docker and the image are available (`status`)

mod status;
mod up;

pub use status::run_status_command;
pub use up::{UpArgs, run_up_command};

use clap::{ColorChoice, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "localstack-stack")]
#[command(about = "Run an ephemeral LocalStack container for integration tests")]
#[command(
    long_about = "Starts LocalStack in Docker on an ephemeral port and stops it on exit.\nExamples:\n  localstack-stack up --init-timeout 120\n  localstack-stack status"
)]
#[command(version)]
#[command(color = ColorChoice::Auto)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "LOCALSTACK_STACK_LOG_JSON")]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start LocalStack and keep it running until Ctrl-C
    #[command(
        about = "Start LocalStack",
        long_about = "Starts the container, prints the endpoint and stops it on Ctrl-C.\nEnvironment (LOCALSTACK_*) is applied first, flags override it.\nExample: localstack-stack up --name ls --mount /etc/localstack/init/ready.d=./init"
    )]
    Up(UpArgs),

    /// Check Docker availability
    #[command(
        about = "Show Docker status",
        long_about = "Checks that the Docker daemon answers and whether the image is cached.\nExample: localstack-stack status"
    )]
    Status,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_up() {
        let cli = Cli::try_parse_from([
            "localstack-stack",
            "up",
            "--force-restart",
            "--name",
            "ls",
            "--mount",
            "/data=/srv/data",
            "--init-timeout",
            "30",
            "--no-wait",
            "--probe",
        ])
        .unwrap();

        match cli.command {
            Command::Up(args) => {
                assert!(args.force_restart);
                assert_eq!(args.name.as_deref(), Some("ls"));
                assert_eq!(
                    args.mounts,
                    vec![("/data".to_string(), "/srv/data".to_string())]
                );
                assert_eq!(args.init_timeout, Some(30));
                assert!(args.no_wait);
                assert!(args.probe);
                assert!(!args.reuse_existing);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_status_with_global_flag() {
        let cli = Cli::try_parse_from(["localstack-stack", "status", "--log-json"]).unwrap();
        assert!(matches!(cli.command, Command::Status));
        assert!(cli.log_json);
    }

    #[test]
    fn test_bad_mount_rejected() {
        let result = Cli::try_parse_from(["localstack-stack", "up", "--mount", "/data"]);
        assert!(result.is_err());
    }
}
