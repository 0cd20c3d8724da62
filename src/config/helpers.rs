//! Environment lookup and parsing helpers.

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::ConfigError;

/// Read an environment variable, treating unset and empty as `None`.
pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "value is not valid UTF-8".to_string(),
        }),
    }
}

/// Parse `raw` or fall back to `default` when absent.
pub(crate) fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.trim().parse().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{e}"),
        }),
        None => Ok(default),
    }
}

pub(crate) fn parse_bool_or(
    key: &str,
    raw: Option<String>,
    default: bool,
) -> Result<bool, ConfigError> {
    raw.map(|s| s.trim().parse::<bool>())
        .transpose()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must be 'true' or 'false': {e}"),
        })
        .map(|value| value.unwrap_or(default))
}

/// Parse `container_path=host_path` pairs separated by commas.
pub(crate) fn parse_mounts(
    key: &str,
    raw: Option<String>,
) -> Result<HashMap<String, String>, ConfigError> {
    let mut mounts = HashMap::new();
    let Some(raw) = raw else {
        return Ok(mounts);
    };

    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (container_path, host_path) =
            pair.split_once('=').ok_or_else(|| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected container_path=host_path, got '{pair}'"),
            })?;
        let (container_path, host_path) = (container_path.trim(), host_path.trim());
        if container_path.is_empty() || host_path.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("empty path in '{pair}'"),
            });
        }
        mounts.insert(container_path.to_string(), host_path.to_string());
    }

    Ok(mounts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or() {
        assert_eq!(parse_or("K", Some(" 30 ".to_string()), 0u64).unwrap(), 30);
        assert_eq!(parse_or("K", None, 7u64).unwrap(), 7);
        assert!(parse_or::<u64>("K", Some("soon".to_string()), 0).is_err());
    }

    #[test]
    fn test_parse_bool_or() {
        assert!(parse_bool_or("K", Some("true".to_string()), false).unwrap());
        assert!(!parse_bool_or("K", None, false).unwrap());
        let err = parse_bool_or("K", Some("yes".to_string()), false).unwrap_err();
        assert!(err.to_string().contains("must be 'true' or 'false'"));
    }

    #[test]
    fn test_parse_mounts() {
        let mounts = parse_mounts(
            "K",
            Some("/etc/localstack/init/ready.d=/home/dev/init, /opt/code=/srv/code".to_string()),
        )
        .unwrap();
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts["/opt/code"], "/srv/code");
        assert_eq!(mounts["/etc/localstack/init/ready.d"], "/home/dev/init");

        assert!(parse_mounts("K", None).unwrap().is_empty());
        assert!(parse_mounts("K", Some("/only-one-side".to_string())).is_err());
        assert!(parse_mounts("K", Some("=/host".to_string())).is_err());
    }
}
