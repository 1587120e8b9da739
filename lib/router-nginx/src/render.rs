//! Rendering of routing tables into an nginx `stream {}` configuration
//!
//! Each routing rule becomes an upstream holding its backends and a server
//! listening on the rule's address. nginx runs in the foreground and logs to
//! stdout so the supervisor's output carries its logs.
//!
//! nginx refuses upstreams without servers and sockets that are listened on
//! twice, so rules that would produce either are left out of the output
//! rather than failing the whole table.

use router_core::{ConfigRenderer, CoreError, Result, RoutingRule, RoutingTable};
use std::collections::HashSet;
use std::fmt::Write;
use std::net::SocketAddr;
use tracing::{debug, warn};

const PREAMBLE: &str = "daemon off;
error_log /dev/stdout info;

events {
    worker_connections  1024;
}

stream {
    log_format proxy '$time_iso8601  [info] '
        'client: $remote_addr, server: $server_addr:$server_port, '
        'upstream: $upstream_addr/$protocol, '
        'bytes from/to client:$bytes_received/$bytes_sent, '
        'bytes from/to upstream:$upstream_bytes_received/$upstream_bytes_sent';

    access_log /dev/stdout proxy;
";

/// Renders the nginx configuration for a routing table
#[derive(Clone, Copy, Debug, Default)]
pub struct NginxRenderer;

impl NginxRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Name of the upstream block serving `rule`, unique per listen socket
    pub fn upstream_name(rule: &RoutingRule) -> String {
        let address: String = rule
            .listen_address
            .to_string()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!(
            "{}_{}_{}_{}_backend",
            rule.name, rule.listen_protocol, address, rule.listen_port
        )
    }
}

impl ConfigRenderer for NginxRenderer {
    fn render(&self, table: &RoutingTable) -> Result<Vec<u8>> {
        let mut out = String::from(PREAMBLE);
        let mut sockets = HashSet::new();
        let mut rendered = 0;

        for rule in table.rules() {
            check_name(&rule.name)?;

            if rule.backends.is_empty() {
                debug!("Skipping {}: no backends", rule.sort_key());
                continue;
            }

            let socket = (rule.listen_address, rule.listen_port, rule.listen_protocol);
            if !sockets.insert(socket) {
                warn!(
                    "Skipping {}: {} {} is already routed",
                    rule.sort_key(),
                    rule.listen_protocol,
                    SocketAddr::new(rule.listen_address, rule.listen_port)
                );
                continue;
            }

            let upstream = Self::upstream_name(rule);
            write_rule(&mut out, rule, &upstream).map_err(|e| CoreError::Render(e.to_string()))?;
            rendered += 1;
        }
        out.push_str("}\n");

        debug!("Rendered {} of {} rules into {} bytes", rendered, table.len(), out.len());
        Ok(out.into_bytes())
    }
}

fn check_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if valid {
        Ok(())
    } else {
        Err(CoreError::Render(format!("service name {name:?} can't be used in an upstream name")))
    }
}

fn write_rule(out: &mut String, rule: &RoutingRule, upstream: &str) -> std::fmt::Result {
    writeln!(out)?;
    writeln!(out, "    upstream {upstream} {{")?;
    writeln!(out, "        hash $remote_addr;")?;
    for backend in &rule.backends {
        writeln!(out, "        server {};", SocketAddr::new(backend.address, backend.port))?;
    }
    writeln!(out, "    }}")?;
    writeln!(out)?;
    writeln!(out, "    server {{")?;

    let listen = SocketAddr::new(rule.listen_address, rule.listen_port);
    if rule.listen_protocol.is_udp() {
        writeln!(out, "        listen {listen} udp;")?;
    } else {
        writeln!(out, "        listen {listen};")?;
    }
    writeln!(out, "        proxy_pass {upstream};")?;
    writeln!(out, "    }}")
}
