//! Stack settings resolved from `LOCALSTACK_*` environment variables.

use std::collections::HashMap;

use crate::config::helpers::{optional_env, parse_bool_or, parse_mounts, parse_or};
use crate::error::ConfigError;
use crate::stack::{
    LOCALSTACK_IMAGE, StackOption, with_container_name, with_init_log_line, with_init_timeout,
    with_reuse_existing, with_volume_mounts, with_wait_for_init,
};

/// Stack configuration read from the environment.
///
/// Every field maps to one start option, except `image` which is fixed when
/// the [`Stack`](crate::Stack) is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackConfig {
    /// Image to run (`LOCALSTACK_IMAGE`).
    pub image: String,
    /// Container name (`LOCALSTACK_CONTAINER_NAME`).
    pub container_name: Option<String>,
    /// Extra read-only mounts, container path to host path
    /// (`LOCALSTACK_VOLUMES`, `container=host` pairs separated by commas).
    pub volume_mounts: HashMap<String, String>,
    /// Readiness marker (`LOCALSTACK_INIT_LOG_LINE`).
    pub init_log_line: Option<String>,
    /// Readiness bound in seconds, 0 for none (`LOCALSTACK_INIT_TIMEOUT_SECS`).
    pub init_timeout_secs: u64,
    /// Wait for the readiness marker (`LOCALSTACK_WAIT_FOR_INIT`).
    pub wait_for_init: bool,
    /// Accept an existing container with the same name
    /// (`LOCALSTACK_REUSE_EXISTING`).
    pub reuse_existing: bool,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            image: LOCALSTACK_IMAGE.to_string(),
            container_name: None,
            volume_mounts: HashMap::new(),
            init_log_line: None,
            init_timeout_secs: 0,
            wait_for_init: true,
            reuse_existing: false,
        }
    }
}

impl StackConfig {
    /// Resolve from the process environment.
    pub fn resolve() -> Result<Self, ConfigError> {
        Self::resolve_with(optional_env)
    }

    /// Resolve through an arbitrary lookup (unset and empty are `None`).
    pub fn resolve_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<Option<String>, ConfigError>,
    {
        let defaults = Self::default();

        Ok(Self {
            image: lookup("LOCALSTACK_IMAGE")?.unwrap_or(defaults.image),
            container_name: lookup("LOCALSTACK_CONTAINER_NAME")?,
            volume_mounts: parse_mounts("LOCALSTACK_VOLUMES", lookup("LOCALSTACK_VOLUMES")?)?,
            init_log_line: lookup("LOCALSTACK_INIT_LOG_LINE")?,
            init_timeout_secs: parse_or(
                "LOCALSTACK_INIT_TIMEOUT_SECS",
                lookup("LOCALSTACK_INIT_TIMEOUT_SECS")?,
                defaults.init_timeout_secs,
            )?,
            wait_for_init: parse_bool_or(
                "LOCALSTACK_WAIT_FOR_INIT",
                lookup("LOCALSTACK_WAIT_FOR_INIT")?,
                defaults.wait_for_init,
            )?,
            reuse_existing: parse_bool_or(
                "LOCALSTACK_REUSE_EXISTING",
                lookup("LOCALSTACK_REUSE_EXISTING")?,
                defaults.reuse_existing,
            )?,
        })
    }

    /// Start options equivalent to this configuration.
    pub fn to_options(&self) -> Vec<StackOption> {
        let mut options = Vec::new();
        if let Some(ref name) = self.container_name {
            options.push(with_container_name(name.clone()));
        }
        if !self.volume_mounts.is_empty() {
            options.push(with_volume_mounts(self.volume_mounts.clone()));
        }
        if let Some(ref line) = self.init_log_line {
            options.push(with_init_log_line(line.clone()));
        }
        options.push(with_init_timeout(self.init_timeout_secs));
        options.push(with_wait_for_init(self.wait_for_init));
        options.push(with_reuse_existing(self.reuse_existing));
        options
    }
}
