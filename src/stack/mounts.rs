//! Mount planning.

use std::collections::HashMap;

use crate::runtime::MountSpec;
use crate::stack::DOCKER_SOCKET;

/// Build the container's bind mounts.
///
/// Every `(container_path, host_path)` pair becomes a read-only bind. The
/// Docker socket is always appended read-write at the same path on both sides.
/// Order of the caller's pairs follows map iteration.
pub fn build_mounts(volume_mounts: &HashMap<String, String>) -> Vec<MountSpec> {
    let mut mounts: Vec<MountSpec> = volume_mounts
        .iter()
        .map(|(container_path, host_path)| MountSpec {
            source: host_path.clone(),
            target: container_path.clone(),
            read_only: true,
        })
        .collect();

    mounts.push(MountSpec {
        source: DOCKER_SOCKET.to_string(),
        target: DOCKER_SOCKET.to_string(),
        read_only: false,
    });

    mounts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_only_without_caller_mounts() {
        let mounts = build_mounts(&HashMap::new());

        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].source, DOCKER_SOCKET);
        assert_eq!(mounts[0].target, DOCKER_SOCKET);
        assert!(!mounts[0].read_only);
    }

    #[test]
    fn test_caller_mounts_are_read_only() {
        let mut volumes = HashMap::new();
        volumes.insert(
            "/etc/localstack/init/ready.d".to_string(),
            "/home/dev/init".to_string(),
        );
        volumes.insert("/opt/code".to_string(), "/home/dev/lambda".to_string());
        volumes.insert("/data".to_string(), "/tmp/data".to_string());

        let mounts = build_mounts(&volumes);

        assert_eq!(mounts.len(), volumes.len() + 1);
        assert_eq!(
            mounts.iter().filter(|m| m.target == DOCKER_SOCKET).count(),
            1
        );
        for mount in mounts.iter().filter(|m| m.target != DOCKER_SOCKET) {
            assert!(mount.read_only, "{} should be read-only", mount.target);
            assert_eq!(volumes.get(&mount.target), Some(&mount.source));
        }
    }
}
