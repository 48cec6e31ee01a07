//! Object builders shared by the checker tests

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Service, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta as KubeMeta;
use meshcheck_common::inventory::WorkloadListItem;
use meshcheck_common::mesh::DEFAULT_CLUSTER_NAME;
use meshcheck_common::{ConfigObject, Labels, ObjectMeta, ObjectType};
use serde_json::{json, Value};

pub fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn object(object_type: ObjectType, name: &str, namespace: &str, spec: Value) -> ConfigObject {
    ConfigObject::new(
        object_type,
        ObjectMeta::new(name, namespace).with_cluster(DEFAULT_CLUSTER_NAME),
        spec,
    )
}

// =============================================================================
// Virtual services
// =============================================================================

pub fn virtual_service(name: &str, namespace: &str, hosts: &[&str]) -> ConfigObject {
    object(
        ObjectType::VirtualService,
        name,
        namespace,
        json!({ "hosts": hosts }),
    )
}

pub fn route(host: &str, subset: Option<&str>, weight: Option<u32>) -> Value {
    let mut destination = json!({ "host": host });
    if let Some(subset) = subset {
        destination["subset"] = json!(subset);
    }
    let mut route = json!({ "destination": destination });
    if let Some(weight) = weight {
        route["weight"] = json!(weight);
    }
    route
}

/// Append a route to the first block of `protocol`, creating it if needed
pub fn add_route(mut vs: ConfigObject, protocol: &str, route: Value) -> ConfigObject {
    let spec = vs.spec.as_object_mut().expect("spec is an object");
    let blocks = spec
        .entry(protocol)
        .or_insert_with(|| json!([{ "route": [] }]));
    blocks[0]["route"]
        .as_array_mut()
        .expect("route is an array")
        .push(route);
    vs
}

pub fn with_gateways(mut vs: ConfigObject, gateways: &[&str]) -> ConfigObject {
    vs.spec["gateways"] = json!(gateways);
    vs
}

pub fn with_export_to(mut vs: ConfigObject, export_to: &[&str]) -> ConfigObject {
    vs.spec["exportTo"] = json!(export_to);
    vs
}

// =============================================================================
// Destination rules
// =============================================================================

pub fn destination_rule(name: &str, namespace: &str, host: &str) -> ConfigObject {
    object(
        ObjectType::DestinationRule,
        name,
        namespace,
        json!({ "host": host }),
    )
}

pub fn with_tls_mode(mut dr: ConfigObject, mode: &str) -> ConfigObject {
    dr.spec["trafficPolicy"] = json!({ "tls": { "mode": mode } });
    dr
}

pub fn add_subset(mut dr: ConfigObject, name: &str, subset_labels: Option<&[(&str, &str)]>) -> ConfigObject {
    let mut subset = json!({ "name": name });
    if let Some(pairs) = subset_labels {
        subset["labels"] = json!(labels(pairs));
    }
    let spec = dr.spec.as_object_mut().expect("spec is an object");
    spec.entry("subsets")
        .or_insert_with(|| json!([]))
        .as_array_mut()
        .expect("subsets is an array")
        .push(subset);
    dr
}

// =============================================================================
// Policies and inventory
// =============================================================================

pub fn peer_authentication(name: &str, namespace: &str, mode: &str) -> ConfigObject {
    object(
        ObjectType::PeerAuthentication,
        name,
        namespace,
        json!({ "mtls": { "mode": mode } }),
    )
}

pub fn service(name: &str, namespace: &str, selector: &[(&str, &str)]) -> Service {
    Service {
        metadata: KubeMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([("app".to_string(), name.to_string())])),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(labels(selector)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn workload(name: &str, namespace: &str, pod_labels: &[(&str, &str)]) -> WorkloadListItem {
    WorkloadListItem::new(name, namespace, "Deployment", labels(pod_labels))
}
