//! meshcheck - correctness checks for Istio service-mesh configuration
//!
//! Reads a snapshot of cluster manifests and reports, per Istio object, the
//! findings that would make the configuration misbehave at runtime.
//!
//! # Crates
//!
//! - [`common`] - host model, label selectors, config objects, result model,
//!   configuration, logging and YAML parsing
//! - [`checkers`] - the checkers, the validation engine and snapshot loading
//! - [`graph`] - Istio badging for service traffic graphs

#![deny(missing_docs)]

pub use meshcheck_checkers as checkers;
pub use meshcheck_common as common;
pub use meshcheck_graph as graph;

pub use meshcheck_checkers::{Snapshot, ValidationContext, ValidationEngine};
pub use meshcheck_common::{
    Error, IstioCheck, IstioValidation, IstioValidationKey, IstioValidations, MessageKey, Result,
    Severity, ValidationConfig, ValidationSummary,
};

use meshcheck_common::inventory::service_in_namespace;
use meshcheck_graph::{GraphInputs, IstioAppender, TrafficMap};

/// Badge the nodes of a traffic map with the Istio configuration of one
/// namespace of a snapshot. Every snapshot namespace counts as accessible.
pub fn badge_graph(
    snapshot: &Snapshot,
    namespace: &str,
    config: &ValidationConfig,
    traffic_map: &mut TrafficMap,
) {
    let context = snapshot.context_for(namespace, config);
    let services: Vec<_> = context
        .services
        .iter()
        .filter(|svc| service_in_namespace(svc, namespace))
        .cloned()
        .collect();

    let inputs = GraphInputs {
        namespace,
        namespaces: &context.namespaces,
        destination_rules: &context.destination_rules,
        virtual_services: &context.virtual_services,
        services: &services,
        workloads: &snapshot.workloads,
        gateways: &snapshot.gateways,
    };
    IstioAppender::new(config, snapshot.namespace_names()).append_graph(traffic_map, &inputs);
}
