//! Service declarations and their normalization
//!
//! A raw declaration carries four attribute lists of arbitrary length. A
//! normalized declaration has all four broadcast to a common length `L`,
//! the longest of them; a list of length 1 is repeated `L` times.

use crate::error::ValidationError;
use router_api::labels::{LISTEN_IP_LABEL, LISTEN_PORT_LABEL, LISTEN_PROTO_LABEL, PORT_LABEL};
use router_api::{DeclarationLabels, Protocol};
use serde::Serialize;
use std::net::IpAddr;

/// A service's routing intent as discovered, before normalization
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawDeclaration {
    pub name: String,
    pub id: String,
    pub network: String,
    pub ports: Vec<u16>,
    pub listen_addresses: Vec<IpAddr>,
    pub listen_ports: Vec<u16>,
    pub listen_protocols: Vec<Protocol>,
}

impl RawDeclaration {
    /// Build a raw declaration from a service's parsed routing labels
    pub fn from_labels(name: impl Into<String>, id: impl Into<String>, labels: DeclarationLabels) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            network: labels.network,
            ports: labels.ports,
            listen_addresses: labels.listen_ips,
            listen_ports: labels.listen_ports,
            listen_protocols: labels.listen_protocols,
        }
    }
}

/// A validated declaration whose attribute lists all have the same length
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServiceDeclaration {
    name: String,
    id: String,
    network: String,
    ports: Vec<u16>,
    listen_addresses: Vec<IpAddr>,
    listen_ports: Vec<u16>,
    listen_protocols: Vec<Protocol>,
}

impl ServiceDeclaration {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    pub fn listen_addresses(&self) -> &[IpAddr] {
        &self.listen_addresses
    }

    pub fn listen_ports(&self) -> &[u16] {
        &self.listen_ports
    }

    pub fn listen_protocols(&self) -> &[Protocol] {
        &self.listen_protocols
    }

    /// Number of routing rules this declaration yields
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

/// Validate a raw declaration and broadcast its attribute lists to a common length
pub fn normalize(raw: RawDeclaration) -> Result<ServiceDeclaration, ValidationError> {
    if raw.name.is_empty() {
        return Err(ValidationError::NameRequired);
    }
    if raw.id.is_empty() {
        return Err(ValidationError::IdRequired);
    }
    if raw.network.is_empty() {
        return Err(ValidationError::NetworkRequired);
    }

    let len = [
        raw.ports.len(),
        raw.listen_addresses.len(),
        raw.listen_ports.len(),
        raw.listen_protocols.len(),
    ]
    .into_iter()
    .max()
    .unwrap_or(0);

    Ok(ServiceDeclaration {
        ports: broadcast(PORT_LABEL, raw.ports, len)?,
        listen_addresses: broadcast(LISTEN_IP_LABEL, raw.listen_addresses, len)?,
        listen_ports: broadcast(LISTEN_PORT_LABEL, raw.listen_ports, len)?,
        listen_protocols: broadcast(LISTEN_PROTO_LABEL, raw.listen_protocols, len)?,
        name: raw.name,
        id: raw.id,
        network: raw.network,
    })
}

fn broadcast<T: Clone>(attribute: &'static str, values: Vec<T>, len: usize) -> Result<Vec<T>, ValidationError> {
    match values.len() {
        1 => Ok(vec![values[0].clone(); len]),
        actual if actual == len => Ok(values),
        actual => Err(ValidationError::LengthMismatch {
            attribute,
            expected: len,
            actual,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn raw() -> RawDeclaration {
        RawDeclaration {
            name: "web".to_string(),
            id: "svc-1".to_string(),
            network: "edge".to_string(),
            ports: vec![80, 443],
            listen_addresses: vec![ip("0.0.0.0")],
            listen_ports: vec![8080, 8443],
            listen_protocols: vec![Protocol::Tcp],
        }
    }

    #[test]
    fn test_required_fields() {
        let mut r = raw();
        r.name.clear();
        assert_eq!(normalize(r).unwrap_err(), ValidationError::NameRequired);

        let mut r = raw();
        r.id.clear();
        assert_eq!(normalize(r).unwrap_err(), ValidationError::IdRequired);

        let mut r = raw();
        r.network.clear();
        assert_eq!(normalize(r).unwrap_err(), ValidationError::NetworkRequired);
        assert_eq!(ValidationError::NetworkRequired.to_string(), "network required");
    }

    #[test]
    fn test_singletons_broadcast() {
        let decl = normalize(raw()).unwrap();
        assert_eq!(decl.len(), 2);
        assert_eq!(decl.ports(), &[80, 443]);
        assert_eq!(decl.listen_addresses(), &[ip("0.0.0.0"), ip("0.0.0.0")]);
        assert_eq!(decl.listen_ports(), &[8080, 8443]);
        assert_eq!(decl.listen_protocols(), &[Protocol::Tcp, Protocol::Tcp]);
    }

    #[test]
    fn test_single_singleton_broadcast() {
        let mut r = raw();
        r.ports = vec![53];
        r.listen_addresses = vec![ip("10.0.0.1"), ip("10.0.0.2"), ip("10.0.0.3")];
        r.listen_ports = vec![53, 5353, 53];
        r.listen_protocols = vec![Protocol::Udp, Protocol::Tcp, Protocol::Udp];

        let decl = normalize(r).unwrap();
        assert_eq!(decl.ports(), &[53, 53, 53]);
        assert_eq!(decl.listen_ports(), &[53, 5353, 53]);
    }

    #[test]
    fn test_length_mismatch_names_attribute() {
        let mut r = raw();
        r.ports = vec![80, 443];
        r.listen_ports = vec![8080, 8443, 9090];

        let err = normalize(r).unwrap_err();
        assert_eq!(
            err,
            ValidationError::LengthMismatch {
                attribute: PORT_LABEL,
                expected: 3,
                actual: 2,
            }
        );
        assert_eq!(err.to_string(), "nginx.port length mismatch. Expected 3 or 1, got 2");
    }

    #[test]
    fn test_empty_list_is_mismatch_when_others_are_set() {
        let mut r = raw();
        r.listen_protocols.clear();

        let err = normalize(r).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::LengthMismatch { attribute: LISTEN_PROTO_LABEL, expected: 2, actual: 0 }
        ));
    }

    #[test]
    fn test_zero_length_is_valid() {
        let r = RawDeclaration {
            name: "idle".to_string(),
            id: "svc-2".to_string(),
            network: "edge".to_string(),
            ..Default::default()
        };

        let decl = normalize(r).unwrap();
        assert!(decl.is_empty());
        assert!(decl.listen_addresses().is_empty());
    }

    #[test]
    fn test_from_labels() {
        let labels = DeclarationLabels {
            network: "edge".to_string(),
            ports: vec![80],
            ..Default::default()
        };
        let r = RawDeclaration::from_labels("web", "svc-1", labels);
        assert_eq!(r.network, "edge");
        assert_eq!(r.ports, vec![80]);
        assert!(r.listen_addresses.is_empty());
    }
}
