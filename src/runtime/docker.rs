//! Docker-backed container runtime using bollard.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, LogsOptions, StartContainerOptions,
    StopContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::{CreateImageOptions, ListImagesOptions};
use bollard::models::{HostConfig, Mount, MountTypeEnum, PortBinding};
use futures::StreamExt;

use crate::error::RuntimeError;
use crate::runtime::{
    ContainerInspection, ContainerRuntime, ContainerSpec, HostBinding, ImageSummary, LogStream,
    PortMap, PullProgress, PullStream, RuntimeConnector,
};

/// Connect to the Docker daemon and verify it answers a ping.
///
/// Tries bollard's local defaults first (which honor `DOCKER_HOST`), then the
/// per-user sockets used by Docker Desktop, rootless Docker and Colima.
pub async fn connect_docker() -> Result<Docker, RuntimeError> {
    let mut last_error = match Docker::connect_with_local_defaults() {
        Ok(docker) => match docker.ping().await {
            Ok(_) => return Ok(docker),
            Err(e) => e.to_string(),
        },
        Err(e) => e.to_string(),
    };

    for socket in fallback_sockets() {
        if !socket.exists() {
            continue;
        }
        match connect_socket(&socket) {
            Some(Ok(docker)) => match docker.ping().await {
                Ok(_) => {
                    tracing::debug!("Connected to Docker via {}", socket.display());
                    return Ok(docker);
                }
                Err(e) => last_error = e.to_string(),
            },
            Some(Err(e)) => last_error = e.to_string(),
            None => {}
        }
    }

    Err(RuntimeError::Connect { reason: last_error })
}

fn fallback_sockets() -> Vec<PathBuf> {
    let mut sockets = Vec::new();
    if let Some(home) = dirs::home_dir() {
        sockets.push(home.join(".docker/run/docker.sock"));
        sockets.push(home.join(".colima/default/docker.sock"));
    }
    if let Some(runtime_dir) = std::env::var_os("XDG_RUNTIME_DIR") {
        sockets.push(PathBuf::from(runtime_dir).join("docker.sock"));
    }
    sockets
}

#[cfg(unix)]
fn connect_socket(path: &std::path::Path) -> Option<Result<Docker, DockerError>> {
    let path = path.to_str()?;
    Some(Docker::connect_with_unix(
        path,
        120,
        bollard::API_DEFAULT_VERSION,
    ))
}

#[cfg(not(unix))]
fn connect_socket(_path: &std::path::Path) -> Option<Result<Docker, DockerError>> {
    None
}

/// Default connector: builds a [`DockerRuntime`] from the environment.
#[derive(Debug, Clone, Default)]
pub struct DockerConnector;

#[async_trait]
impl RuntimeConnector for DockerConnector {
    async fn connect(&self) -> Result<Arc<dyn ContainerRuntime>, RuntimeError> {
        let docker = connect_docker().await?;
        Ok(Arc::new(DockerRuntime::with_client(docker)))
    }
}

/// [`ContainerRuntime`] over a bollard Docker client.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl std::fmt::Debug for DockerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerRuntime").finish_non_exhaustive()
    }
}

impl DockerRuntime {
    pub fn with_client(docker: Docker) -> Self {
        Self { docker }
    }
}

fn api_error(e: DockerError) -> RuntimeError {
    RuntimeError::api(e.to_string())
}

/// Map a create failure, keeping name conflicts distinguishable.
fn create_error(e: DockerError, name: Option<&str>) -> RuntimeError {
    if let (
        Some(name),
        DockerError::DockerResponseServerError {
            status_code,
            message,
        },
    ) = (name, &e)
        && (*status_code == 409 || message.contains("is already in use"))
    {
        return RuntimeError::NameConflict {
            name: name.to_string(),
        };
    }
    api_error(e)
}

fn to_bollard_bindings(ports: &PortMap) -> HashMap<String, Option<Vec<PortBinding>>> {
    ports
        .iter()
        .map(|(port, bindings)| {
            let bindings = bindings
                .iter()
                .map(|b| PortBinding {
                    host_ip: Some(b.host_ip.clone()),
                    host_port: Some(b.host_port.clone()),
                })
                .collect();
            (port.clone(), Some(bindings))
        })
        .collect()
}

fn from_bollard_bindings(ports: HashMap<String, Option<Vec<PortBinding>>>) -> PortMap {
    ports
        .into_iter()
        .map(|(port, bindings)| {
            let bindings = bindings
                .unwrap_or_default()
                .into_iter()
                .map(|b| HostBinding {
                    host_ip: b.host_ip.unwrap_or_default(),
                    host_port: b.host_port.unwrap_or_default(),
                })
                .collect();
            (port, bindings)
        })
        .collect()
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_images(&self, reference: &str) -> Result<Vec<ImageSummary>, RuntimeError> {
        let mut filters = HashMap::new();
        filters.insert("reference".to_string(), vec![reference.to_string()]);

        let options = ListImagesOptions::<String> {
            filters,
            ..Default::default()
        };

        let images = self
            .docker
            .list_images(Some(options))
            .await
            .map_err(api_error)?;

        Ok(images
            .into_iter()
            .map(|image| ImageSummary {
                repo_tags: image.repo_tags,
            })
            .collect())
    }

    async fn pull_image(&self, reference: &str) -> Result<PullStream, RuntimeError> {
        let options = CreateImageOptions {
            from_image: reference.to_string(),
            ..Default::default()
        };

        let stream = self
            .docker
            .create_image(Some(options), None, None)
            .map(|result| {
                result
                    .map(|info| PullProgress {
                        status: info.status,
                    })
                    .map_err(api_error)
            });

        Ok(Box::pin(stream))
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let mounts = spec
            .mounts
            .iter()
            .map(|m| Mount {
                typ: Some(MountTypeEnum::BIND),
                source: Some(m.source.clone()),
                target: Some(m.target.clone()),
                read_only: Some(m.read_only),
                ..Default::default()
            })
            .collect();

        let exposed_ports: HashMap<String, HashMap<(), ()>> = spec
            .port_bindings
            .keys()
            .map(|port| (port.clone(), HashMap::new()))
            .collect();

        let host_config = HostConfig {
            port_bindings: Some(to_bollard_bindings(&spec.port_bindings)),
            mounts: Some(mounts),
            auto_remove: Some(spec.auto_remove),
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            tty: Some(spec.tty),
            attach_stdout: Some(spec.attach_stdout),
            attach_stderr: Some(spec.attach_stderr),
            exposed_ports: Some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = spec.name.as_ref().map(|name| CreateContainerOptions {
            name: name.clone(),
            platform: None,
        });

        let response = self
            .docker
            .create_container(options, config)
            .await
            .map_err(|e| create_error(e, spec.name.as_deref()))?;

        for warning in &response.warnings {
            tracing::warn!("Container create warning: {}", warning);
        }

        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(api_error)
    }

    async fn stop_container(&self, id: &str, timeout_secs: i64) -> Result<(), RuntimeError> {
        self.docker
            .stop_container(id, Some(StopContainerOptions { t: timeout_secs }))
            .await
            .map_err(api_error)
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerInspection, RuntimeError> {
        let info = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(api_error)?;

        let ports = info
            .network_settings
            .and_then(|settings| settings.ports)
            .map(from_bollard_bindings)
            .unwrap_or_default();

        Ok(ContainerInspection { ports })
    }

    async fn container_logs(&self, id: &str) -> Result<LogStream, RuntimeError> {
        let options = LogsOptions::<String> {
            stdout: true,
            follow: false,
            ..Default::default()
        };

        let stream = self
            .docker
            .logs(id, Some(options))
            .map(|chunk| chunk.map(|output| output.into_bytes()).map_err(api_error));

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_conflict_from_409() {
        let err = DockerError::DockerResponseServerError {
            status_code: 409,
            message: "Conflict. The container name \"/ls\" is already in use by container \"abc\""
                .to_string(),
        };
        let mapped = create_error(err, Some("ls"));
        assert!(mapped.is_name_conflict());
    }

    #[test]
    fn test_unnamed_conflict_is_plain_api_error() {
        let err = DockerError::DockerResponseServerError {
            status_code: 409,
            message: "conflict".to_string(),
        };
        assert!(!create_error(err, None).is_name_conflict());
    }

    #[test]
    fn test_other_server_errors_pass_through() {
        let err = DockerError::DockerResponseServerError {
            status_code: 500,
            message: "boom".to_string(),
        };
        let mapped = create_error(err, Some("ls"));
        assert!(!mapped.is_name_conflict());
    }

    #[test]
    fn test_port_bindings_conversion() {
        let mut ports = PortMap::new();
        ports.insert(
            "4566/tcp".to_string(),
            vec![HostBinding::new("0.0.0.0", "")],
        );

        let converted = to_bollard_bindings(&ports);
        let bindings = converted["4566/tcp"].as_ref().unwrap();
        assert_eq!(bindings[0].host_ip.as_deref(), Some("0.0.0.0"));
        assert_eq!(bindings[0].host_port.as_deref(), Some(""));

        let mut reported = HashMap::new();
        reported.insert(
            "4566/tcp".to_string(),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some("49153".to_string()),
            }]),
        );
        reported.insert("53/udp".to_string(), None);

        let back = from_bollard_bindings(reported);
        assert_eq!(back["4566/tcp"], vec![HostBinding::new("0.0.0.0", "49153")]);
        assert!(back["53/udp"].is_empty());
    }
}
