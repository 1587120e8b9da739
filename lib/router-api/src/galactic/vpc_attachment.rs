use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// VPCAttachment from galactic-operator - attaches a pod to a Galactic VPC
/// and assigns it addresses inside that VPC
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "galactic.datumapis.com",
    version = "v1alpha",
    kind = "VPCAttachment",
    plural = "vpcattachments",
    namespaced,
    derive = "Default",
    status = "VPCAttachmentStatus",
)]
pub struct VPCAttachmentSpec {
    /// VPC this attachment belongs to
    pub vpc: VPCRef,

    /// Interface configuration
    pub interface: InterfaceConfig,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct VPCRef {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct InterfaceConfig {
    #[serde(default)]
    pub name: String,

    /// Addresses assigned inside the VPC, in CIDR or bare form
    #[serde(default)]
    pub addresses: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct VPCAttachmentStatus {
    #[serde(default)]
    pub ready: bool,
}

impl VPCAttachment {
    /// Whether this attachment is ready and attached to the named VPC
    pub fn serves_vpc(&self, vpc_name: &str) -> bool {
        self.spec.vpc.name == vpc_name && self.status.as_ref().is_some_and(|s| s.ready)
    }
}
