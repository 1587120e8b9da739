//! Reconciler configuration read from the process environment

use anyhow::{bail, Context, Result};
use router_core::SupervisorConfig;
use router_discovery::client::DEFAULT_DOCKER_SOCKET;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_WATCH_INTERVAL_SECS: u64 = 15;

/// Which platform services are discovered from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectoryKind {
    Docker,
    Galactic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug)]
pub struct ReconcilerConfig {
    pub directory: DirectoryKind,
    pub docker_socket: PathBuf,
    pub supervisor: SupervisorConfig,
    pub watch_interval: Duration,
    pub debug: bool,
    pub log_format: LogFormat,
}

impl ReconcilerConfig {
    /// Load from environment variables; command-line arguments are passed
    /// through to the managed process
    pub fn from_env() -> Result<Self> {
        let vars = env::vars_os().filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)));
        let args = env::args_os()
            .skip(1)
            .map(|arg| {
                arg.into_string()
                    .map_err(|arg| anyhow::anyhow!("Argument {arg:?} is not valid UTF-8"))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::from_vars(vars, args)
    }

    pub fn from_vars<V>(vars: V, extra_args: Vec<String>) -> Result<Self>
    where
        V: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let get = |key: &str| vars.get(key).map(String::as_str);

        let directory = match get("ROUTER_DIRECTORY").unwrap_or("docker") {
            "docker" => DirectoryKind::Docker,
            "galactic" => DirectoryKind::Galactic,
            other => bail!("ROUTER_DIRECTORY must be docker or galactic, got {other:?}"),
        };

        let log_format = match get("ROUTER_LOG_FORMAT").unwrap_or("text") {
            "text" => LogFormat::Text,
            "json" => LogFormat::Json,
            other => bail!("ROUTER_LOG_FORMAT must be text or json, got {other:?}"),
        };

        let interval_secs = match get("ROUTER_WATCH_INTERVAL_SECS") {
            Some(value) => value
                .parse::<u64>()
                .with_context(|| format!("Invalid ROUTER_WATCH_INTERVAL_SECS {value:?}"))?,
            None => DEFAULT_WATCH_INTERVAL_SECS,
        };
        if interval_secs == 0 {
            bail!("ROUTER_WATCH_INTERVAL_SECS must be greater than zero");
        }

        let defaults = SupervisorConfig::default();
        let supervisor = SupervisorConfig {
            binary: get("ROUTER_PROXY_BINARY").map_or(defaults.binary, str::to_string),
            config_path: get("ROUTER_CONFIG_PATH").map_or(defaults.config_path, PathBuf::from),
            extra_args,
        };

        // DEBUG=true, matched case-insensitively on both sides
        let debug = vars
            .iter()
            .any(|(key, value)| key.eq_ignore_ascii_case("debug") && value.eq_ignore_ascii_case("true"));

        Ok(Self {
            directory,
            docker_socket: PathBuf::from(get("ROUTER_DOCKER_SOCKET").unwrap_or(DEFAULT_DOCKER_SOCKET)),
            supervisor,
            watch_interval: Duration::from_secs(interval_secs),
            debug,
            log_format,
        })
    }
}
