/// Bindings to Galactic VPC CRDs from galactic-operator
///
/// Only the VPCAttachment resource is bound: its interface addresses are the
/// endpoints a service exposes on a VPC.

pub mod vpc_attachment;

pub use vpc_attachment::VPCAttachment;
