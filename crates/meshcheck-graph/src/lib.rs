//! Service traffic graph badging
//!
//! A traffic map is a set of nodes (apps, services, workloads) produced by a
//! telemetry backend. Appenders decorate the nodes with metadata; the
//! [`IstioAppender`] marks nodes that Istio configuration affects.

#![deny(missing_docs)]

pub mod istio;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use istio::{GraphInputs, IstioAppender};

/// Version value telemetry reports when it cannot tell
pub const UNKNOWN: &str = "unknown";

/// Kind of graph node
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// An application, optionally versioned
    App,
    /// A service
    Service,
    /// A workload
    Workload,
    /// Traffic source or destination that could not be identified
    #[default]
    Unknown,
}

/// A service a node receives traffic for
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestService {
    /// Service namespace
    pub namespace: String,
    /// Service name
    pub name: String,
}

/// `name → hosts` map recorded by badges
pub type HostsMetadata = BTreeMap<String, Vec<String>>;

/// Decorations attached to a node
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeMetadata {
    /// A destination rule configures a circuit breaker for the node
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub has_cb: bool,
    /// Virtual services declaring the node's host: name → hosts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_vs: Option<HostsMetadata>,
    /// A virtual service routes requests for the node
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub has_request_routing: bool,
    /// A virtual service sets a request timeout
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub has_request_timeout: bool,
    /// A virtual service injects faults
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub has_fault_injection: bool,
    /// A virtual service splits HTTP traffic
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub has_traffic_shifting: bool,
    /// A virtual service splits TCP traffic
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub has_tcp_traffic_shifting: bool,
    /// Ingress gateway node: gateway name → hosts it serves
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_ingress_gateway: Option<HostsMetadata>,
    /// The node is a service entry
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_service_entry: bool,
    /// The node is an egress cluster
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_egress_cluster: bool,
    /// Services the node receives traffic for
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dest_services: Vec<DestService>,
}

/// A node of the traffic graph
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrafficNode {
    /// Node kind
    pub node_type: NodeType,
    /// Namespace
    pub namespace: String,
    /// Service name (service nodes)
    pub service: String,
    /// Application name
    pub app: String,
    /// Application version
    pub version: String,
    /// Workload name
    pub workload: String,
    /// Decorations
    pub metadata: NodeMetadata,
}

impl TrafficNode {
    /// Create a node
    pub fn new(node_type: NodeType, namespace: impl Into<String>) -> Self {
        Self {
            node_type,
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// Whether telemetry reported a usable version
    pub fn has_version(&self) -> bool {
        !self.version.is_empty() && self.version != UNKNOWN
    }
}

/// Traffic graph nodes keyed by node id
pub type TrafficMap = BTreeMap<String, TrafficNode>;
