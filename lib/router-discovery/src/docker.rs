//! Docker Swarm service directory
//!
//! Declarations come from swarm service labels. A service's endpoints on a
//! network are the addresses its running tasks hold on that network.

use crate::client::DockerClient;
use crate::{declaration_from_labels, parse_endpoint_address};
use anyhow::Context;
use async_trait::async_trait;
use router_core::{RawDeclaration, ServiceDirectory};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SwarmService {
    #[serde(rename = "ID")]
    id: String,
    spec: ServiceSpec,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceSpec {
    name: String,
    #[serde(default)]
    labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SwarmTask {
    #[serde(default)]
    networks_attachments: Option<Vec<NetworkAttachment>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkAttachment {
    network: AttachedNetwork,
    #[serde(default)]
    addresses: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AttachedNetwork {
    spec: NetworkSpec,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkSpec {
    name: String,
}

/// DockerDirectory discovers routed services in a Docker Swarm
pub struct DockerDirectory {
    client: DockerClient,
}

impl DockerDirectory {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            client: DockerClient::new(socket),
        }
    }
}

#[async_trait]
impl ServiceDirectory for DockerDirectory {
    async fn list_declarations(&self) -> anyhow::Result<Vec<RawDeclaration>> {
        let services: Vec<SwarmService> = self
            .client
            .get_json("/services")
            .await
            .context("Error getting docker service list")?;

        debug!("Discovered {} swarm services", services.len());
        Ok(declarations_from_services(&services))
    }

    async fn resolve_endpoints(&self, service_id: &str, network: &str) -> anyhow::Result<Vec<IpAddr>> {
        let tasks: Vec<SwarmTask> = self
            .client
            .get_json(&running_tasks_query(service_id))
            .await
            .with_context(|| format!("Error getting docker task list for service id {service_id}"))?;

        task_addresses(&tasks, network).with_context(|| format!("Service id {service_id}"))
    }
}

fn declarations_from_services(services: &[SwarmService]) -> Vec<RawDeclaration> {
    services
        .iter()
        .filter_map(|service| {
            let labels = service.spec.labels.as_ref()?;
            declaration_from_labels(&service.spec.name, &service.id, labels)
        })
        .collect()
}

fn running_tasks_query(service_id: &str) -> String {
    let filters = serde_json::json!({
        "service": [service_id],
        "desired-state": ["running"],
    });
    let encoded: String = url::form_urlencoded::byte_serialize(filters.to_string().as_bytes()).collect();
    format!("/tasks?filters={encoded}")
}

fn task_addresses(tasks: &[SwarmTask], network: &str) -> anyhow::Result<Vec<IpAddr>> {
    tasks
        .iter()
        .flat_map(|task| task.networks_attachments.iter().flatten())
        .filter(|attachment| attachment.network.spec.name == network)
        .flat_map(|attachment| attachment.addresses.iter().flatten())
        .map(|address| parse_endpoint_address(address))
        .collect()
}
