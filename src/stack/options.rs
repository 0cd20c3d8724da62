//! Start-time options.

use std::collections::HashMap;

/// Settings the options mutate. They persist across restarts of the same
/// [`Stack`](crate::Stack) until another option overrides them.
#[derive(Debug, Clone)]
pub struct StackSettings {
    /// Container name; `None` lets the runtime generate one.
    pub container_name: Option<String>,
    /// Container path to host path, mounted read-only.
    pub volume_mounts: HashMap<String, String>,
    /// Readiness marker; `None` or empty means `"Ready."`.
    pub init_complete_log_line: Option<String>,
    /// Readiness bound in seconds. 0 waits forever.
    pub init_timeout_secs: u64,
    /// Poll the logs for the readiness marker before returning from start.
    pub wait_for_init: bool,
    /// Treat a name collision on create as success.
    pub reuse_existing: bool,
}

impl Default for StackSettings {
    fn default() -> Self {
        Self {
            container_name: None,
            volume_mounts: HashMap::new(),
            init_complete_log_line: None,
            init_timeout_secs: 0,
            wait_for_init: true,
            reuse_existing: false,
        }
    }
}

/// A single configuration step applied at the beginning of
/// [`Stack::start`](crate::Stack::start).
pub struct StackOption(Box<dyn FnOnce(&mut StackSettings) + Send>);

impl StackOption {
    /// Wrap an arbitrary settings mutation.
    pub fn new(apply: impl FnOnce(&mut StackSettings) + Send + 'static) -> Self {
        Self(Box::new(apply))
    }

    pub(crate) fn apply(self, settings: &mut StackSettings) {
        (self.0)(settings)
    }
}

impl std::fmt::Debug for StackOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackOption").finish_non_exhaustive()
    }
}

pub fn with_container_name(name: impl Into<String>) -> StackOption {
    let name = name.into();
    StackOption::new(move |s| s.container_name = Some(name))
}

/// Replace the extra read-only mounts, keyed by container path.
pub fn with_volume_mounts(mounts: HashMap<String, String>) -> StackOption {
    StackOption::new(move |s| s.volume_mounts = mounts)
}

pub fn with_init_log_line(line: impl Into<String>) -> StackOption {
    let line = line.into();
    StackOption::new(move |s| s.init_complete_log_line = Some(line))
}

pub fn with_init_timeout(seconds: u64) -> StackOption {
    StackOption::new(move |s| s.init_timeout_secs = seconds)
}

pub fn with_reuse_existing(reuse: bool) -> StackOption {
    StackOption::new(move |s| s.reuse_existing = reuse)
}

pub fn with_wait_for_init(wait: bool) -> StackOption {
    StackOption::new(move |s| s.wait_for_init = wait)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = StackSettings::default();
        assert!(settings.wait_for_init);
        assert!(!settings.reuse_existing);
        assert_eq!(settings.init_timeout_secs, 0);
        assert!(settings.container_name.is_none());
    }

    #[test]
    fn test_options_apply_in_order() {
        let mut settings = StackSettings::default();
        let mut mounts = HashMap::new();
        mounts.insert("/etc/localstack/init".to_string(), "/tmp/init".to_string());

        for option in [
            with_container_name("first"),
            with_container_name("second"),
            with_volume_mounts(mounts),
            with_init_log_line("Booted"),
            with_init_timeout(45),
            with_reuse_existing(true),
            with_wait_for_init(false),
        ] {
            option.apply(&mut settings);
        }

        assert_eq!(settings.container_name.as_deref(), Some("second"));
        assert_eq!(
            settings.volume_mounts.get("/etc/localstack/init").map(String::as_str),
            Some("/tmp/init")
        );
        assert_eq!(settings.init_complete_log_line.as_deref(), Some("Booted"));
        assert_eq!(settings.init_timeout_secs, 45);
        assert!(settings.reuse_existing);
        assert!(!settings.wait_for_init);
    }

    #[test]
    fn test_volume_mounts_replace_previous() {
        let mut settings = StackSettings::default();
        settings
            .volume_mounts
            .insert("/old".to_string(), "/host/old".to_string());

        with_volume_mounts(HashMap::new()).apply(&mut settings);
        assert!(settings.volume_mounts.is_empty());
    }
}
