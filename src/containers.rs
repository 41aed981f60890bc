//! Container lifecycle management.
//!
//! Containers are always recreated from a clean slate: any pre-existing container with the
//! declared name is force-removed before the new one is created and started, which keeps
//! repeated bootstrap runs from ever leaving two containers with the same name.

use std::collections::HashMap;

use anyhow::{Context, Result};
use bollard::container::{Config as ContainerConfig, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions, StartContainerOptions};
use bollard::models::{HostConfig, PortBinding};
use bollard::Docker;

use crate::error::StepOutcome;

/// The declared desired state of a managed container.
#[derive(Clone, Debug)]
pub struct ContainerSpec {
    /// The container name, which is the unique key for lifecycle management.
    pub name: &'static str,
    /// The image reference to create the container from.
    pub image: &'static str,
    /// Port bindings as `(container port, host port)` pairs, all TCP.
    pub ports: &'static [(u16, u16)],
    /// Environment variable assignments in `KEY=value` form.
    pub env: &'static [&'static str],
}

impl ContainerSpec {
    /// Build the Docker API port bindings map for this spec.
    pub fn port_bindings(&self) -> HashMap<String, Option<Vec<PortBinding>>> {
        self.ports
            .iter()
            .map(|&(container_port, host_port)| {
                let binding = PortBinding {
                    host_ip: None,
                    host_port: Some(host_port.to_string()),
                };
                (format!("{}/tcp", container_port), Some(vec![binding]))
            })
            .collect()
    }
}

/// Ensure a container matching the given spec is running, removing any previous instance.
///
/// This is a best-effort operation: any failure is reported as a recoverable outcome and the
/// caller decides whether orchestration proceeds.
pub async fn ensure_running(docker: &Docker, spec: &ContainerSpec) -> StepOutcome {
    match recreate_and_start(docker, spec).await {
        Ok(()) => StepOutcome::Success,
        Err(err) => StepOutcome::Recoverable(err),
    }
}

async fn recreate_and_start(docker: &Docker, spec: &ContainerSpec) -> Result<()> {
    // List all containers, including stopped ones, and clear out any with our name.
    let containers = docker
        .list_containers(Some(ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        }))
        .await
        .context("error listing containers")?;
    for container in containers.iter().filter(|container| matches_name(container.names.as_deref(), spec.name)) {
        let target = container.id.as_deref().unwrap_or(spec.name);
        tracing::info!(name = spec.name, "removing old container");
        docker
            .remove_container(
                target,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .with_context(|| format!("error removing old container {}", spec.name))?;
    }

    tracing::info!(name = spec.name, image = spec.image, "starting container");
    docker
        .create_container(
            Some(CreateContainerOptions {
                name: spec.name,
                platform: None,
            }),
            ContainerConfig {
                image: Some(spec.image),
                env: Some(spec.env.to_vec()),
                host_config: Some(HostConfig {
                    port_bindings: Some(spec.port_bindings()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .await
        .with_context(|| format!("error creating container {}", spec.name))?;
    docker
        .start_container(spec.name, None::<StartContainerOptions<String>>)
        .await
        .with_context(|| format!("error starting container {}", spec.name))?;
    tracing::info!(name = spec.name, "container started");
    Ok(())
}

/// Check if a listed container's name set includes the given name.
///
/// The Docker API reports names with a leading slash.
pub fn matches_name(names: Option<&[String]>, name: &str) -> bool {
    names
        .map(|names| names.iter().any(|candidate| candidate.trim_start_matches('/') == name))
        .unwrap_or(false)
}
