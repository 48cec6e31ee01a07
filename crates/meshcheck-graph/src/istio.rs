//! Istio badging
//!
//! Marks graph nodes with Istio significance:
//!
//! - circuit breakers from destination rules (`hasCb`)
//! - virtual services declaring a service's host (`hasVs`) and what they do
//!   to the traffic (routing, timeouts, fault injection, traffic shifting)
//! - app labels for service nodes telemetry left without one
//! - ingress gateway nodes and the hosts their Gateway objects serve
//!
//! Lookups are simple and non-correlating: a badge only says some object
//! applies, never whether the object is correct.

use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::api::core::v1::Service;
use meshcheck_common::inventory::{service_labels, service_name, WorkloadListItem};
use meshcheck_common::labels::LabelSelector;
use meshcheck_common::mesh::{INGRESS_GATEWAYS_COMPONENT, ISTIO_COMPONENT_LABEL};
use meshcheck_common::object::{object_field, string_list, Lookup};
use meshcheck_common::routes::{block_has, blocks_for, route_blocks};
use meshcheck_common::{ConfigObject, Host, ValidationConfig};
use serde_json::Value;
use tracing::debug;

use crate::{HostsMetadata, NodeType, TrafficMap, TrafficNode};

const CIRCUIT_BREAKER_FIELDS: [&str; 2] = ["connectionPool", "outlierDetection"];

/// Configuration read while badging one namespace
#[derive(Clone, Copy, Debug)]
pub struct GraphInputs<'a> {
    /// Namespace being badged
    pub namespace: &'a str,
    /// Known namespaces, for host resolution
    pub namespaces: &'a [String],
    /// Destination rules of the namespace
    pub destination_rules: &'a [ConfigObject],
    /// Virtual services of the namespace
    pub virtual_services: &'a [ConfigObject],
    /// Services of the namespace
    pub services: &'a [Service],
    /// Workloads of the accessible namespaces
    pub workloads: &'a [WorkloadListItem],
    /// Gateways of the accessible namespaces
    pub gateways: &'a [ConfigObject],
}

/// Badges nodes with special Istio significance
#[derive(Clone, Debug)]
pub struct IstioAppender {
    accessible_namespaces: BTreeSet<String>,
    app_label: String,
    version_label: String,
}

impl IstioAppender {
    /// Create an appender for the namespaces the caller may read
    pub fn new(config: &ValidationConfig, accessible_namespaces: impl IntoIterator<Item = String>) -> Self {
        Self {
            accessible_namespaces: accessible_namespaces.into_iter().collect(),
            app_label: config.app_label.clone(),
            version_label: config.version_label.clone(),
        }
    }

    /// Decorate the nodes of a traffic map
    pub fn append_graph(&self, traffic_map: &mut TrafficMap, inputs: &GraphInputs<'_>) {
        if traffic_map.is_empty() {
            return;
        }

        self.apply_circuit_breakers(traffic_map, inputs);
        self.apply_virtual_services(traffic_map, inputs);
        self.add_labels(traffic_map, inputs);
        self.decorate_gateways(traffic_map, inputs);
    }

    // =========================================================================
    // Circuit breakers
    // =========================================================================

    fn apply_circuit_breakers(&self, traffic_map: &mut TrafficMap, inputs: &GraphInputs<'_>) {
        for node in traffic_map.values_mut() {
            if node.namespace != inputs.namespace {
                continue;
            }

            let has_cb = match node.node_type {
                NodeType::Service => {
                    self.any_circuit_breaker(inputs, &node.namespace, &node.service, None)
                }
                NodeType::App if !node.has_version() => {
                    node.metadata.dest_services.iter().any(|ds| {
                        self.any_circuit_breaker(inputs, &ds.namespace, &ds.name, None)
                    })
                }
                _ if node.has_version() => node.metadata.dest_services.iter().any(|ds| {
                    self.any_circuit_breaker(inputs, &ds.namespace, &ds.name, Some(&node.version))
                }),
                _ => false,
            };

            if has_cb {
                node.metadata.has_cb = true;
            }
        }
    }

    fn any_circuit_breaker(
        &self,
        inputs: &GraphInputs<'_>,
        namespace: &str,
        service: &str,
        version: Option<&str>,
    ) -> bool {
        inputs
            .destination_rules
            .iter()
            .any(|dr| self.has_circuit_breaker(dr, inputs.namespaces, namespace, service, version))
    }

    /// Whether a rule for `service` configures a circuit breaker, at top level
    /// or in a subset (the subset for `version` when one is given)
    fn has_circuit_breaker(
        &self,
        dr: &ConfigObject,
        namespaces: &[String],
        namespace: &str,
        service: &str,
        version: Option<&str>,
    ) -> bool {
        let Some(raw) = dr.spec_str("host").ok() else {
            return false;
        };
        let host = Host::resolve(raw, dr.namespace(), dr.cluster(), namespaces);
        if !host.targets_service(service, namespace) {
            return false;
        }

        if defines_circuit_breaker(&dr.spec) {
            return true;
        }

        let Some(subsets) = dr.spec_array("subsets").ok() else {
            return false;
        };
        subsets.iter().any(|subset| {
            let version_matches = match version {
                None => true,
                Some(version) => subset
                    .get("labels")
                    .and_then(|labels| labels.get(&self.version_label))
                    .and_then(Value::as_str)
                    == Some(version),
            };
            version_matches && defines_circuit_breaker(subset)
        })
    }

    // =========================================================================
    // Virtual services
    // =========================================================================

    fn apply_virtual_services(&self, traffic_map: &mut TrafficMap, inputs: &GraphInputs<'_>) {
        for node in traffic_map.values_mut() {
            if node.node_type != NodeType::Service || node.namespace != inputs.namespace {
                continue;
            }

            let declaring = inputs.virtual_services.iter().find(|vs| {
                declares_service(vs, inputs.namespaces, &node.namespace, &node.service)
            });
            let Some(vs) = declaring else {
                continue;
            };

            let badges = node.metadata.has_vs.get_or_insert_with(HostsMetadata::new);
            if let Some(hosts) = vs.spec_strings("hosts").ok().filter(|h| !h.is_empty()) {
                badges.insert(vs.name().to_string(), hosts);
            }

            let metadata = &mut node.metadata;
            metadata.has_request_routing |= has_request_routing(vs);
            metadata.has_request_timeout |= has_http_field(vs, "timeout");
            metadata.has_fault_injection |= has_http_field(vs, "fault");
            metadata.has_traffic_shifting |= has_traffic_shifting(vs, "http");
            metadata.has_tcp_traffic_shifting |= has_traffic_shifting(vs, "tcp");
        }
    }

    // =========================================================================
    // Labels
    // =========================================================================

    /// Give service nodes the app label of their service definition
    fn add_labels(&self, traffic_map: &mut TrafficMap, inputs: &GraphInputs<'_>) {
        let services: BTreeMap<&str, &Service> = inputs
            .services
            .iter()
            .map(|svc| (service_name(svc), svc))
            .collect();

        for node in traffic_map.values_mut() {
            if node.node_type != NodeType::Service
                || node.namespace != inputs.namespace
                || !node.app.is_empty()
            {
                continue;
            }
            if node.metadata.is_service_entry || node.metadata.is_egress_cluster {
                continue;
            }

            match services.get(node.service.as_str()) {
                Some(svc) => {
                    if let Some(app) = service_labels(svc).get(&self.app_label) {
                        node.app = app.clone();
                    }
                }
                None => debug!(
                    namespace = %node.namespace,
                    service = %node.service,
                    "service not found, app label not applied"
                ),
            }
        }
    }

    // =========================================================================
    // Ingress gateways
    // =========================================================================

    fn ingress_gateway_workloads<'w>(&self, inputs: &GraphInputs<'w>) -> Vec<&'w WorkloadListItem> {
        inputs
            .workloads
            .iter()
            .filter(|w| self.accessible_namespaces.contains(&w.namespace))
            .filter(|w| w.workload_type == "Deployment")
            .filter(|w| {
                w.labels.get(ISTIO_COMPONENT_LABEL).map(String::as_str)
                    == Some(INGRESS_GATEWAYS_COMPONENT)
            })
            .collect()
    }

    fn decorate_gateways(&self, traffic_map: &mut TrafficMap, inputs: &GraphInputs<'_>) {
        let ingress_workloads = self.ingress_gateway_workloads(inputs);

        // node ids per ingress workload
        let mut mapping: Vec<(&WorkloadListItem, Vec<String>)> = Vec::new();
        for gateway_workload in ingress_workloads {
            let app = gateway_workload.app(&self.app_label);
            let mut ids = Vec::new();
            for (id, node) in traffic_map.iter_mut() {
                if node.metadata.is_ingress_gateway.is_some() {
                    continue;
                }
                if is_gateway_node(node, app, &gateway_workload.namespace) {
                    node.metadata.is_ingress_gateway = Some(HostsMetadata::new());
                    ids.push(id.clone());
                }
            }
            if !ids.is_empty() {
                mapping.push((gateway_workload, ids));
            }
        }

        if mapping.is_empty() {
            return;
        }

        let gateways = inputs
            .gateways
            .iter()
            .filter(|gw| self.accessible_namespaces.contains(gw.namespace()));
        for gateway in gateways {
            let selector = match gateway.spec_path(&["selector"]) {
                Lookup::Found(Value::Object(labels)) => LabelSelector::from_value(labels),
                Lookup::Absent => LabelSelector::default(),
                _ => {
                    debug!(name = %gateway.name(), namespace = %gateway.namespace(), "malformed gateway selector");
                    continue;
                }
            };
            let hostnames = server_hosts(gateway);

            for (gateway_workload, ids) in &mapping {
                if !selector.matches(&gateway_workload.labels) {
                    continue;
                }
                for id in ids {
                    let Some(node) = traffic_map.get_mut(id) else {
                        continue;
                    };
                    node.metadata
                        .is_ingress_gateway
                        .get_or_insert_with(HostsMetadata::new)
                        .insert(gateway.name().to_string(), hostnames.clone());
                }
            }
        }
    }
}

fn defines_circuit_breaker(holder: &Value) -> bool {
    match object_field(holder, "trafficPolicy") {
        Lookup::Found(policy) => CIRCUIT_BREAKER_FIELDS
            .iter()
            .any(|field| policy.get(*field).is_some_and(|v| !v.is_null())),
        _ => false,
    }
}

fn declares_service(vs: &ConfigObject, namespaces: &[String], namespace: &str, service: &str) -> bool {
    vs.spec_strings("hosts").ok().is_some_and(|hosts| {
        hosts.iter().any(|raw| {
            Host::resolve(raw, vs.namespace(), vs.cluster(), namespaces)
                .targets_service(service, namespace)
        })
    })
}

fn has_request_routing(vs: &ConfigObject) -> bool {
    route_blocks(vs).iter().any(|block| !block.destinations.is_empty())
}

fn has_http_field(vs: &ConfigObject, field: &str) -> bool {
    blocks_for(vs, "http").iter().any(|block| block_has(block, field))
}

fn has_traffic_shifting(vs: &ConfigObject, protocol: &'static str) -> bool {
    blocks_for(vs, protocol)
        .iter()
        .any(|block| block.destinations.len() > 1)
}

fn is_gateway_node(node: &TrafficNode, app: Option<&str>, namespace: &str) -> bool {
    matches!(node.node_type, NodeType::App | NodeType::Workload)
        && node.namespace == namespace
        && Some(node.app.as_str()) == app
}

/// Hosts of every server of a Gateway, in declaration order
fn server_hosts(gateway: &ConfigObject) -> Vec<String> {
    let Some(servers) = gateway.spec_array("servers").ok() else {
        return Vec::new();
    };
    servers
        .iter()
        .filter_map(|server| string_list(server, "hosts").ok())
        .flatten()
        .collect()
}
