//! Service directories backing the reconciliation engine
//!
//! - `DockerDirectory`: Docker Swarm services and their running tasks
//! - `GalacticDirectory`: Kubernetes Services and Galactic VPC attachments

pub mod client;
pub mod docker;
pub mod galactic;

pub use client::DockerClient;
pub use docker::DockerDirectory;
pub use galactic::GalacticDirectory;

use anyhow::Context;
use ipnetwork::IpNetwork;
use router_api::DeclarationLabels;
use router_core::RawDeclaration;
use std::net::IpAddr;
use tracing::{debug, warn};

/// Turn a service's labels into a raw declaration.
///
/// Services without routing labels are not candidates. Services whose labels
/// don't parse are skipped with a warning.
pub fn declaration_from_labels<'a, I>(name: &str, id: &str, labels: I) -> Option<RawDeclaration>
where
    I: IntoIterator<Item = (&'a String, &'a String)> + Clone,
{
    if !DeclarationLabels::is_declared(labels.clone().into_iter().map(|(key, _)| key)) {
        debug!("Service {} has no routing labels", name);
        return None;
    }

    match DeclarationLabels::parse(labels) {
        Ok(parsed) => Some(RawDeclaration::from_labels(name, id, parsed)),
        Err(e) => {
            warn!("Skipping service {}: {}", name, e);
            None
        }
    }
}

/// Host address of an endpoint given in CIDR or bare form
pub fn parse_endpoint_address(address: &str) -> anyhow::Result<IpAddr> {
    let network: IpNetwork = address
        .parse()
        .with_context(|| format!("Error parsing address {address:?}"))?;
    Ok(network.ip())
}
