//! Service directory interface

use crate::RawDeclaration;
use async_trait::async_trait;
use std::net::IpAddr;

/// Source of service declarations and their live endpoints
#[async_trait]
pub trait ServiceDirectory: Send + Sync {
    /// Enumerate the declarations of every routed service
    async fn list_declarations(&self) -> anyhow::Result<Vec<RawDeclaration>>;

    /// Resolve the live addresses of a service on one of its networks
    async fn resolve_endpoints(&self, service_id: &str, network: &str) -> anyhow::Result<Vec<IpAddr>>;
}
