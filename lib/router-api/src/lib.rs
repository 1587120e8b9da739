//! Declaration API for the edge router
//!
//! This library defines how services declare their routing intent:
//! - `nginx.*` service labels and their typed parsing
//! - Listen protocols
//! - Galactic VPC attachment bindings used to resolve service endpoints

pub mod galactic;
pub mod labels;
pub mod protocol;

pub use labels::{DeclarationLabels, LabelError};
pub use protocol::{ParseProtocolError, Protocol};

/// Label tying a VPCAttachment to the Kubernetes Service it serves
pub const SERVICE_LABEL: &str = "router.datum.net/service";
