//! Galactic VPC service directory
//!
//! Kubernetes Services opt in with `nginx.*` annotations. A service's
//! endpoints on a network are the addresses of the ready VPCAttachments
//! labelled with the service's name and attached to the VPC of that name.

use crate::{declaration_from_labels, parse_endpoint_address};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use kube::api::ListParams;
use kube::{Api, Client};
use router_api::galactic::VPCAttachment;
use router_api::SERVICE_LABEL;
use router_core::{RawDeclaration, ServiceDirectory};
use std::net::IpAddr;
use tracing::debug;

/// GalacticDirectory discovers routed Kubernetes Services across Galactic VPCs
pub struct GalacticDirectory {
    client: Client,
}

impl GalacticDirectory {
    /// Create a directory from the ambient Kubernetes configuration
    pub async fn new() -> anyhow::Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ServiceDirectory for GalacticDirectory {
    async fn list_declarations(&self) -> anyhow::Result<Vec<RawDeclaration>> {
        let services: Api<Service> = Api::all(self.client.clone());
        let list = services
            .list(&ListParams::default())
            .await
            .context("Error listing Kubernetes services")?;

        debug!("Discovered {} Kubernetes services", list.items.len());
        Ok(list.items.iter().filter_map(declaration_from_service).collect())
    }

    async fn resolve_endpoints(&self, service_id: &str, network: &str) -> anyhow::Result<Vec<IpAddr>> {
        let (namespace, name) = service_id
            .split_once('/')
            .ok_or_else(|| anyhow!("Invalid service id {service_id:?}"))?;

        let attachments: Api<VPCAttachment> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(&format!("{SERVICE_LABEL}={name}"));
        let list = attachments
            .list(&params)
            .await
            .with_context(|| format!("Error listing VPC attachments for service {service_id}"))?;

        debug!("Service {} has {} VPC attachments", service_id, list.items.len());
        attachment_addresses(&list.items, network)
    }
}

fn declaration_from_service(service: &Service) -> Option<RawDeclaration> {
    let name = service.metadata.name.as_deref()?;
    let namespace = service.metadata.namespace.as_deref().unwrap_or("default");
    let annotations = service.metadata.annotations.as_ref()?;

    declaration_from_labels(
        &format!("{name}.{namespace}"),
        &format!("{namespace}/{name}"),
        annotations,
    )
}

fn attachment_addresses(attachments: &[VPCAttachment], network: &str) -> anyhow::Result<Vec<IpAddr>> {
    attachments
        .iter()
        .filter(|attachment| attachment.serves_vpc(network))
        .flat_map(|attachment| attachment.spec.interface.addresses.iter())
        .map(|address| parse_endpoint_address(address))
        .collect()
}
