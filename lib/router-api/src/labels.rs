//! Service labels declaring routing intent
//!
//! A service opts into edge routing by carrying `nginx.*` labels (Docker
//! Swarm) or annotations (Kubernetes). List-valued labels are comma separated
//! and each item is trimmed before parsing.

use crate::Protocol;
use std::net::IpAddr;
use thiserror::Error;

/// Prefix shared by every routing label
pub const LABEL_PREFIX: &str = "nginx.";
/// Network the service's endpoints are resolved on
pub const NETWORK_LABEL: &str = "nginx.network";
/// Backend ports
pub const PORT_LABEL: &str = "nginx.port";
/// Addresses the proxy listens on
pub const LISTEN_IP_LABEL: &str = "nginx.listenIP";
/// Ports the proxy listens on
pub const LISTEN_PORT_LABEL: &str = "nginx.listenPort";
/// Protocols the proxy listens with (`tcp` or `udp`)
pub const LISTEN_PROTO_LABEL: &str = "nginx.listenProto";

/// A label value that could not be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("couldn't parse \"{key}={value}\": {reason}")]
pub struct LabelError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Typed routing labels of a single service, before length normalization
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeclarationLabels {
    pub network: String,
    pub ports: Vec<u16>,
    pub listen_ips: Vec<IpAddr>,
    pub listen_ports: Vec<u16>,
    pub listen_protocols: Vec<Protocol>,
}

impl DeclarationLabels {
    /// Whether any routing label is present among `keys`
    pub fn is_declared<'a, I>(keys: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        keys.into_iter().any(|key| key.starts_with(LABEL_PREFIX))
    }

    /// Parse the routing labels out of a service's label set.
    ///
    /// Missing labels leave the corresponding field empty; unrelated labels
    /// are ignored.
    pub fn parse<'a, I>(labels: I) -> Result<Self, LabelError>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut parsed = Self::default();

        for (key, value) in labels {
            match key.as_str() {
                NETWORK_LABEL => parsed.network = value.clone(),
                PORT_LABEL => parsed.ports = parse_list(PORT_LABEL, value, parse_port)?,
                LISTEN_IP_LABEL => parsed.listen_ips = parse_list(LISTEN_IP_LABEL, value, parse_ip)?,
                LISTEN_PORT_LABEL => {
                    parsed.listen_ports = parse_list(LISTEN_PORT_LABEL, value, parse_port)?
                }
                LISTEN_PROTO_LABEL => {
                    parsed.listen_protocols = parse_list(LISTEN_PROTO_LABEL, value, |item| {
                        item.parse::<Protocol>().map_err(|e| e.to_string())
                    })?
                }
                _ => {}
            }
        }

        Ok(parsed)
    }
}

fn parse_list<T, F>(key: &'static str, value: &str, parse_item: F) -> Result<Vec<T>, LabelError>
where
    F: Fn(&str) -> Result<T, String>,
{
    value
        .split(',')
        .map(|item| {
            parse_item(item.trim()).map_err(|reason| LabelError {
                key,
                value: value.to_string(),
                reason,
            })
        })
        .collect()
}

fn parse_port(item: &str) -> Result<u16, String> {
    item.parse::<u16>().map_err(|e| e.to_string())
}

fn parse_ip(item: &str) -> Result<IpAddr, String> {
    item.parse::<IpAddr>().map_err(|_| "address invalid".to_string())
}
