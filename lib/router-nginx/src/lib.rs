//! nginx configuration for the managed edge proxy
pub mod render;

pub use render::NginxRenderer;
