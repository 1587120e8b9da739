//! Config renderer interface

use crate::{Result, RoutingTable};

/// Renders a routing table into the managed process's configuration syntax.
///
/// Output must depend only on the table's data so that equal tables produce
/// equal bytes.
pub trait ConfigRenderer: Send + Sync {
    fn render(&self, table: &RoutingTable) -> Result<Vec<u8>>;
}
