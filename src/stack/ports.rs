//! Host port bookkeeping for the fixed LocalStack port.

use crate::error::{Result, StackError};
use crate::runtime::{ContainerRuntime, HostBinding, PortMap};
use crate::stack::FIXED_PORT;

/// Binding requested at create time: any interface, ephemeral port.
pub fn ephemeral_binding() -> Vec<HostBinding> {
    vec![HostBinding::new("0.0.0.0", "")]
}

/// Look up the host port the runtime assigned to [`FIXED_PORT`] and return
/// the binding to record, addressed through `localhost`.
pub async fn resolve_host_binding(
    runtime: &dyn ContainerRuntime,
    container_id: &str,
) -> Result<HostBinding> {
    let inspection = runtime
        .inspect_container(container_id)
        .await
        .map_err(|e| StackError::Inspect {
            id: container_id.to_string(),
            reason: e.to_string(),
        })?;

    let host_port = inspection
        .ports
        .get(FIXED_PORT)
        .and_then(|bindings| bindings.first())
        .map(|binding| binding.host_port.clone())
        .filter(|port| !port.is_empty())
        .ok_or_else(|| StackError::Inspect {
            id: container_id.to_string(),
            reason: format!("no host binding reported for {FIXED_PORT}"),
        })?;

    tracing::debug!("Container {} publishes {} on {}", container_id, FIXED_PORT, host_port);

    Ok(HostBinding::new("localhost", host_port))
}

/// `http://<ip>:<port>` for the resolved binding, or `None` while the port is
/// still the ephemeral request.
pub fn endpoint_url(port_map: &PortMap) -> Option<String> {
    let binding = port_map.get(FIXED_PORT)?.first()?;
    if binding.host_port.is_empty() {
        return None;
    }
    Some(format!("http://{}:{}", binding.host_ip, binding.host_port))
}
