//! Routing table construction
//!
//! Rules and backends are sorted by their string keys so that a table built
//! from the same declarations and endpoints is identical regardless of the
//! order the directory reported them in.

use crate::{CoreError, Result, ServiceDeclaration, ServiceDirectory};
use router_api::Protocol;
use serde::Serialize;
use std::net::IpAddr;
use tracing::debug;

/// One concrete endpoint traffic may be routed to
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Backend {
    pub address: IpAddr,
    pub port: u16,
}

impl Backend {
    pub fn sort_key(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// A listen address/port/protocol triple and the backends behind it
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoutingRule {
    pub name: String,
    pub listen_address: IpAddr,
    pub listen_port: u16,
    pub listen_protocol: Protocol,
    pub backends: Vec<Backend>,
}

impl RoutingRule {
    pub fn sort_key(&self) -> String {
        format!(
            "{} {}:{}/{}",
            self.name, self.listen_address, self.listen_port, self.listen_protocol
        )
    }

    fn sort_backends(&mut self) {
        self.backends.sort_by_cached_key(Backend::sort_key);
    }
}

/// Ordered set of routing rules
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RoutingTable {
    rules: Vec<RoutingRule>,
}

impl RoutingTable {
    /// Create a table, putting backends and rules in canonical order
    pub fn new(mut rules: Vec<RoutingRule>) -> Self {
        for rule in &mut rules {
            rule.sort_backends();
        }
        // Backend keys break ties between rules sharing a key
        rules.sort_by_cached_key(|rule| {
            let backends: Vec<String> = rule.backends.iter().map(Backend::sort_key).collect();
            (rule.sort_key(), backends)
        });
        Self { rules }
    }

    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn backend_count(&self) -> usize {
        self.rules.iter().map(|rule| rule.backends.len()).sum()
    }
}

/// Expand one declaration into its routing rules, given its live endpoints
pub fn declaration_rules(declaration: &ServiceDeclaration, endpoints: &[IpAddr]) -> Vec<RoutingRule> {
    (0..declaration.len())
        .map(|i| {
            let port = declaration.ports()[i];
            RoutingRule {
                name: declaration.name().to_string(),
                listen_address: declaration.listen_addresses()[i],
                listen_port: declaration.listen_ports()[i],
                listen_protocol: declaration.listen_protocols()[i],
                backends: endpoints
                    .iter()
                    .map(|&address| Backend { address, port })
                    .collect(),
            }
        })
        .collect()
}

/// Build the routing table for a set of normalized declarations.
///
/// Endpoints are resolved once per declaration. A resolution failure aborts
/// the whole build.
pub async fn build<D>(declarations: &[ServiceDeclaration], directory: &D) -> Result<RoutingTable>
where
    D: ServiceDirectory + ?Sized,
{
    let mut rules = Vec::new();

    for declaration in declarations {
        if declaration.is_empty() {
            debug!("Service {} declares no listeners", declaration.name());
            continue;
        }

        let endpoints = directory
            .resolve_endpoints(declaration.id(), declaration.network())
            .await
            .map_err(|e| CoreError::Resolution {
                service: declaration.name().to_string(),
                network: declaration.network().to_string(),
                reason: format!("{e:#}"),
            })?;

        debug!(
            "Service {} has {} endpoints on network {}",
            declaration.name(),
            endpoints.len(),
            declaration.network()
        );

        rules.extend(declaration_rules(declaration, &endpoints));
    }

    Ok(RoutingTable::new(rules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{normalize, RawDeclaration};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    struct StaticDirectory {
        endpoints: HashMap<String, Vec<IpAddr>>,
        calls: AtomicUsize,
    }

    impl StaticDirectory {
        fn new(entries: &[(&str, &[&str])]) -> Self {
            Self {
                endpoints: entries
                    .iter()
                    .map(|(id, addrs)| (id.to_string(), addrs.iter().map(|a| ip(a)).collect()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ServiceDirectory for StaticDirectory {
        async fn list_declarations(&self) -> anyhow::Result<Vec<RawDeclaration>> {
            Ok(Vec::new())
        }

        async fn resolve_endpoints(&self, service_id: &str, _network: &str) -> anyhow::Result<Vec<IpAddr>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.endpoints
                .get(service_id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no such service {service_id}"))
        }
    }

    fn declaration(name: &str, id: &str, ports: Vec<u16>, listen_ports: Vec<u16>) -> ServiceDeclaration {
        normalize(RawDeclaration {
            name: name.to_string(),
            id: id.to_string(),
            network: "edge".to_string(),
            ports,
            listen_addresses: vec![ip("0.0.0.0")],
            listen_ports,
            listen_protocols: vec![Protocol::Tcp],
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_cross_product_of_ports_and_endpoints() {
        let directory = StaticDirectory::new(&[("svc-web", &["10.0.0.2", "10.0.0.1"])]);
        let decls = vec![declaration("web", "svc-web", vec![80, 443], vec![8080, 8443])];

        let table = build(&decls, &directory).await.unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.backend_count(), 4);

        let first = &table.rules()[0];
        assert_eq!(first.sort_key(), "web 0.0.0.0:8080/tcp");
        let keys: Vec<String> = first.backends.iter().map(Backend::sort_key).collect();
        assert_eq!(keys, vec!["10.0.0.1:80", "10.0.0.2:80"]);
    }

    #[tokio::test]
    async fn test_resolver_called_once_per_declaration() {
        let directory = StaticDirectory::new(&[("svc-dns", &["10.0.0.1"])]);
        let decls = vec![declaration("dns", "svc-dns", vec![53], vec![53, 5353, 5354])];

        let table = build(&decls, &directory).await.unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(directory.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_declaration_skips_resolution() {
        let directory = StaticDirectory::new(&[]);
        let decls = vec![normalize(RawDeclaration {
            name: "idle".to_string(),
            id: "svc-idle".to_string(),
            network: "edge".to_string(),
            ..Default::default()
        })
        .unwrap()];

        let table = build(&decls, &directory).await.unwrap();
        assert!(table.is_empty());
        assert_eq!(directory.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolution_failure_aborts_build() {
        let directory = StaticDirectory::new(&[("svc-web", &["10.0.0.1"])]);
        let decls = vec![
            declaration("web", "svc-web", vec![80], vec![80]),
            declaration("api", "svc-missing", vec![80], vec![81]),
        ];

        let err = build(&decls, &directory).await.unwrap_err();
        match err {
            CoreError::Resolution { service, network, .. } => {
                assert_eq!(service, "api");
                assert_eq!(network, "edge");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_order_independent() {
        let forward = StaticDirectory::new(&[
            ("svc-web", &["10.0.0.10", "10.0.0.2"]),
            ("svc-api", &["10.0.1.1"]),
        ]);
        let reversed = StaticDirectory::new(&[
            ("svc-web", &["10.0.0.2", "10.0.0.10"]),
            ("svc-api", &["10.0.1.1"]),
        ]);

        let web = declaration("web", "svc-web", vec![80], vec![80]);
        let api = declaration("api", "svc-api", vec![9000], vec![9000]);

        let a = build(&[web.clone(), api.clone()], &forward).await.unwrap();
        let b = build(&[api, web], &reversed).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.rules()[0].name, "api");

        // String ordering, not numeric
        let keys: Vec<String> = a.rules()[1].backends.iter().map(Backend::sort_key).collect();
        assert_eq!(keys, vec!["10.0.0.10:80", "10.0.0.2:80"]);
    }

    #[test]
    fn test_rule_sort_key_uses_protocol() {
        let rule = RoutingRule {
            name: "dns".to_string(),
            listen_address: ip("10.0.0.53"),
            listen_port: 53,
            listen_protocol: Protocol::Udp,
            backends: Vec::new(),
        };
        assert_eq!(rule.sort_key(), "dns 10.0.0.53:53/udp");
    }
}
