//! Validation context
//!
//! Everything one pass over a namespace reads. The context is an owned
//! snapshot: it is built fresh for each pass and never mutated by checkers.

use k8s_openapi::api::core::v1::Service;
use meshcheck_common::inventory::{RegistryStatus, ServiceEntryHosts, WorkloadListItem};
use meshcheck_common::ConfigObject;

/// Peer authentications visible to the mTLS checker
#[derive(Clone, Debug, Default)]
pub struct MtlsDetails {
    /// Mesh-scoped peer authentications (root namespace, no selector)
    pub mesh_peer_authentications: Vec<ConfigObject>,
    /// Namespace-scoped peer authentications (no selector)
    pub peer_authentications: Vec<ConfigObject>,
}

impl MtlsDetails {
    /// Whether a mesh-scoped peer authentication exists
    pub fn has_mesh_policy(&self) -> bool {
        !self.mesh_peer_authentications.is_empty()
    }

    /// Whether a namespace-scoped peer authentication exists in `namespace`
    pub fn has_namespace_policy(&self, namespace: &str) -> bool {
        self.peer_authentications
            .iter()
            .any(|pa| pa.namespace() == namespace)
    }
}

/// Inputs of one validation pass over a namespace
#[derive(Clone, Debug, Default)]
pub struct ValidationContext {
    /// Namespace under validation
    pub namespace: String,
    /// Every namespace known to the caller
    pub namespaces: Vec<String>,
    /// Destination rules of the namespace
    pub destination_rules: Vec<ConfigObject>,
    /// Virtual services of the namespace
    pub virtual_services: Vec<ConfigObject>,
    /// Virtual services of other namespaces exported to this one
    pub exported_virtual_services: Vec<ConfigObject>,
    /// Kubernetes services
    pub services: Vec<Service>,
    /// Workloads and their pod labels
    pub workloads: Vec<WorkloadListItem>,
    /// Hosts declared by service entries
    pub service_entries: ServiceEntryHosts,
    /// Hosts known to the control plane registry
    pub registry_status: Vec<RegistryStatus>,
    /// Peer authentications
    pub mtls_details: MtlsDetails,
}

impl ValidationContext {
    /// Create an empty context for a namespace
    pub fn new(namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            namespaces: vec![namespace.clone()],
            namespace,
            ..Default::default()
        }
    }

    /// Virtual services of the namespace followed by exported ones
    pub fn visible_virtual_services(&self) -> impl Iterator<Item = &ConfigObject> {
        self.virtual_services
            .iter()
            .chain(self.exported_virtual_services.iter())
    }
}
