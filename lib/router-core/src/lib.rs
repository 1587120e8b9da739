//! Core reconciliation engine for the edge router
//!
//! This library provides:
//! - Declaration normalization (attribute list broadcasting)
//! - Routing table construction from declarations and live endpoints
//! - Canonical rendering and change detection
//! - Supervision of the managed edge-routing process
//! - The reconciliation loop tying them together

pub mod declaration;
pub mod digest;
pub mod directory;
pub mod engine;
pub mod error;
pub mod render;
pub mod supervisor;
pub mod table;

pub use declaration::{normalize, RawDeclaration, ServiceDeclaration};
pub use digest::{detect_change, ConfigDigest, RenderedConfig};
pub use directory::ServiceDirectory;
pub use engine::{generate_table, ReconcileEngine, TickOutcome};
pub use error::{CoreError, Result, ValidationError};
pub use render::ConfigRenderer;
pub use supervisor::{ExitWatch, ManagedProcess, ProcessState, ProcessSupervisor, SupervisorConfig};
pub use table::{build, Backend, RoutingRule, RoutingTable};
