//! Reconciliation loop
//!
//! ```text
//! list declarations → normalize → build table → render + digest
//!     → (changed) write config → reload
//! ```
//!
//! Bootstrap runs one cycle and treats every failure as fatal. Afterwards
//! each tick's failure is logged and retried on the next tick.

use crate::{
    build, detect_change, normalize, ConfigDigest, ConfigRenderer, CoreError, ExitWatch, ManagedProcess,
    Result, RoutingTable, ServiceDirectory,
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// What a single reconciliation tick did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Configuration matched the last applied one
    Unchanged,
    /// New configuration written and reloaded
    Applied,
    /// New configuration written but the reload signal failed
    ReloadFailed,
}

/// Keeps the managed process's configuration in sync with the directory
pub struct ReconcileEngine<D, R, P> {
    directory: D,
    renderer: R,
    process: P,
    interval: Duration,
    last_digest: Option<ConfigDigest>,
}

impl<D, R, P> ReconcileEngine<D, R, P>
where
    D: ServiceDirectory,
    R: ConfigRenderer,
    P: ManagedProcess,
{
    /// Generate the initial configuration and launch the managed process.
    ///
    /// The process is only launched once a configuration has been written.
    pub async fn bootstrap(directory: D, renderer: R, mut process: P, interval: Duration) -> Result<(Self, ExitWatch)> {
        let table = generate_table(&directory).await?;
        let rendered = detect_change(&table, &renderer, None)?;
        info!("Initial configuration: {}", table_json(&table));

        process.write_config(&rendered.bytes).await?;
        let watch = process.start()?;
        info!("Applied configuration {}", rendered.digest);

        let engine = Self {
            directory,
            renderer,
            process,
            interval,
            last_digest: Some(rendered.digest),
        };
        Ok((engine, watch))
    }

    pub fn last_digest(&self) -> Option<&ConfigDigest> {
        self.last_digest.as_ref()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one reconciliation cycle
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        debug!("Polling service directory");

        let table = generate_table(&self.directory).await?;
        let rendered = detect_change(&table, &self.renderer, self.last_digest.as_ref())?;

        if !rendered.changed {
            debug!("No configuration change; skipping");
            return Ok(TickOutcome::Unchanged);
        }

        info!("New configuration: {}", table_json(&table));

        // A failed write keeps the old digest so the next tick retries
        self.process.write_config(&rendered.bytes).await?;

        let outcome = match self.process.reload().await {
            Ok(()) => {
                debug!("Configuration reloaded");
                TickOutcome::Applied
            }
            Err(e) => {
                warn!("Couldn't reload configuration: {}", e);
                TickOutcome::ReloadFailed
            }
        };

        self.last_digest = Some(rendered.digest);
        info!("Applied configuration {}", rendered.digest);
        Ok(outcome)
    }

    /// Reconcile every interval. Never returns.
    pub async fn run(mut self) {
        info!("Reconciling every {:?}", self.interval);

        loop {
            tokio::time::sleep(self.interval).await;

            if let Err(e) = self.tick().await {
                warn!("Reconciliation cycle failed: {}", e);
            }
        }
    }
}

/// List, normalize and resolve the current declarations into a table.
///
/// Declarations that fail normalization are skipped individually.
pub async fn generate_table<D>(directory: &D) -> Result<RoutingTable>
where
    D: ServiceDirectory + ?Sized,
{
    let raw = directory
        .list_declarations()
        .await
        .map_err(|e| CoreError::Discovery(format!("{e:#}")))?;
    debug!("Directory reported {} declarations", raw.len());

    let mut declarations = Vec::with_capacity(raw.len());
    for declaration in raw {
        let service = if declaration.name.is_empty() {
            declaration.id.clone()
        } else {
            declaration.name.clone()
        };

        match normalize(declaration) {
            Ok(declaration) => declarations.push(declaration),
            Err(source) => warn!("Skipping service: {}", CoreError::Validation { service, source }),
        }
    }

    build(&declarations, directory).await
}

fn table_json(table: &RoutingTable) -> String {
    serde_json::to_string(table).unwrap_or_else(|e| format!("<unserializable table: {e}>"))
}
