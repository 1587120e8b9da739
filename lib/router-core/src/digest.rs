//! Canonical serialization and change detection

use crate::{ConfigRenderer, Result, RoutingTable};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 fingerprint of a rendered configuration
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigDigest([u8; 32]);

impl ConfigDigest {
    pub fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ConfigDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ConfigDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigDigest({self})")
    }
}

/// A rendered configuration and whether it differs from the last applied one
#[derive(Clone, Debug)]
pub struct RenderedConfig {
    pub bytes: Vec<u8>,
    pub digest: ConfigDigest,
    pub changed: bool,
}

/// Render `table` and compare its digest against `last`.
///
/// With no previous digest the configuration always counts as changed.
pub fn detect_change<R>(table: &RoutingTable, renderer: &R, last: Option<&ConfigDigest>) -> Result<RenderedConfig>
where
    R: ConfigRenderer + ?Sized,
{
    let bytes = renderer.render(table)?;
    let digest = ConfigDigest::of(&bytes);
    let changed = last != Some(&digest);

    Ok(RenderedConfig {
        bytes,
        digest,
        changed,
    })
}
