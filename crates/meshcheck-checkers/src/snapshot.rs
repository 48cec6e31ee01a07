//! Snapshot loading
//!
//! A snapshot is a multi-document YAML stream of cluster manifests (Istio
//! config, Services, workloads, Namespaces). [`Snapshot::context_for`] cuts
//! the view one namespace's validation pass needs out of it.

use std::collections::BTreeSet;

use k8s_openapi::api::core::v1::Service;
use meshcheck_common::inventory::{service_entry_hosts, RegistryStatus, WorkloadListItem};
use meshcheck_common::labels::string_labels;
use meshcheck_common::mesh::{DEFAULT_NAMESPACE, WILDCARD_HOST};
use meshcheck_common::object::{path, str_field};
use meshcheck_common::{
    yaml, ConfigObject, Error, Labels, Lookup, ObjectMeta, ObjectType, Result, ValidationConfig,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::context::{MtlsDetails, ValidationContext};

/// Workload kinds whose pod labels come from `spec.template`
const TEMPLATED_WORKLOADS: [&str; 6] = [
    "Deployment",
    "StatefulSet",
    "DaemonSet",
    "ReplicaSet",
    "Job",
    "DeploymentConfig",
];

/// Everything read from a manifest stream
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    /// Namespaces declared or referenced by any object
    pub namespaces: BTreeSet<String>,
    /// Virtual services
    pub virtual_services: Vec<ConfigObject>,
    /// Destination rules
    pub destination_rules: Vec<ConfigObject>,
    /// Peer authentications
    pub peer_authentications: Vec<ConfigObject>,
    /// Gateways
    pub gateways: Vec<ConfigObject>,
    /// Service entries
    pub service_entries: Vec<ConfigObject>,
    /// Kubernetes services
    pub services: Vec<Service>,
    /// Workloads with their pod labels
    pub workloads: Vec<WorkloadListItem>,
    /// Registry records supplied by the caller
    pub registry_status: Vec<RegistryStatus>,
}

fn metadata(doc: &Value, kind: &str) -> Result<ObjectMeta> {
    let name = match path(doc, &["metadata", "name"]) {
        Lookup::Found(Value::String(name)) if !name.is_empty() => name.clone(),
        _ => return Err(Error::invalid_object(kind, "metadata.name is required")),
    };
    let namespace = path(doc, &["metadata", "namespace"])
        .ok()
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_NAMESPACE);
    let cluster = path(doc, &["metadata", "clusterName"])
        .ok()
        .and_then(Value::as_str)
        .unwrap_or_default();

    let mut meta = ObjectMeta::new(name, namespace).with_cluster(cluster);
    meta.labels = labels_at(doc, &["metadata", "labels"]).unwrap_or_default();
    Ok(meta)
}

fn labels_at(doc: &Value, keys: &[&str]) -> Option<Labels> {
    path(doc, keys)
        .ok()
        .and_then(Value::as_object)
        .map(string_labels)
}

/// Whether an object with this `exportTo` is visible from `namespace`
fn exported_to(object: &ConfigObject, namespace: &str) -> bool {
    if object.namespace() == namespace {
        return true;
    }
    match object.spec_strings("exportTo") {
        Lookup::Found(targets) if !targets.is_empty() => targets
            .iter()
            .any(|target| target == WILDCARD_HOST || target == namespace),
        Lookup::Found(_) | Lookup::Absent => true,
        Lookup::Malformed => {
            debug!(name = %object.name(), namespace = %object.namespace(), "malformed exportTo");
            false
        }
    }
}

fn has_selector(pa: &ConfigObject) -> bool {
    !matches!(pa.spec_path(&["selector"]), Lookup::Absent)
}

impl Snapshot {
    /// Parse a multi-document YAML stream
    pub fn from_yaml(input: &str) -> Result<Self> {
        let mut snapshot = Snapshot::default();
        for doc in yaml::parse_yaml_multi(input)? {
            snapshot.add_document(doc)?;
        }
        info!(
            namespaces = snapshot.namespaces.len(),
            virtual_services = snapshot.virtual_services.len(),
            destination_rules = snapshot.destination_rules.len(),
            services = snapshot.services.len(),
            workloads = snapshot.workloads.len(),
            "snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Sort one manifest into the snapshot by `kind`
    pub fn add_document(&mut self, doc: Value) -> Result<()> {
        let kind = match str_field(&doc, "kind") {
            Lookup::Found(kind) => kind.to_string(),
            _ => {
                warn!("skipping document without kind");
                return Ok(());
            }
        };

        if let Some(object_type) = ObjectType::from_kind(&kind) {
            let meta = metadata(&doc, &kind)?;
            self.namespaces.insert(meta.namespace.clone());
            let spec = doc.get("spec").cloned().unwrap_or(Value::Null);
            let object = ConfigObject::new(object_type, meta, spec);
            match object_type {
                ObjectType::VirtualService => self.virtual_services.push(object),
                ObjectType::DestinationRule => self.destination_rules.push(object),
                ObjectType::PeerAuthentication => self.peer_authentications.push(object),
                ObjectType::Gateway => self.gateways.push(object),
                ObjectType::ServiceEntry => self.service_entries.push(object),
            }
            return Ok(());
        }

        match kind.as_str() {
            "Namespace" => {
                let meta = metadata(&doc, &kind)?;
                self.namespaces.insert(meta.name);
            }
            "Service" => {
                let meta = metadata(&doc, &kind)?;
                self.namespaces.insert(meta.namespace.clone());
                match serde_json::from_value::<Service>(doc) {
                    Ok(mut service) => {
                        service.metadata.namespace = Some(meta.namespace);
                        self.services.push(service);
                    }
                    Err(error) => warn!(
                        kind = %kind,
                        name = %meta.name,
                        namespace = %meta.namespace,
                        error = %error,
                        "skipping malformed document"
                    ),
                }
            }
            "Pod" => {
                let meta = metadata(&doc, &kind)?;
                self.add_workload(meta, &kind, None);
            }
            k if TEMPLATED_WORKLOADS.contains(&k) => {
                let meta = metadata(&doc, &kind)?;
                let pod_labels = labels_at(&doc, &["spec", "template", "metadata", "labels"]);
                self.add_workload(meta, &kind, pod_labels);
            }
            other => {
                let name = path(&doc, &["metadata", "name"])
                    .ok()
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                warn!(kind = %other, name = %name, "skipping document of unsupported kind");
            }
        }
        Ok(())
    }

    fn add_workload(&mut self, meta: ObjectMeta, kind: &str, pod_labels: Option<Labels>) {
        self.namespaces.insert(meta.namespace.clone());
        let labels = pod_labels.unwrap_or(meta.labels);
        self.workloads
            .push(WorkloadListItem::new(meta.name, meta.namespace, kind, labels));
    }

    /// Attach registry records
    pub fn with_registry_status(mut self, registry_status: Vec<RegistryStatus>) -> Self {
        self.registry_status = registry_status;
        self
    }

    /// Sorted namespace names
    pub fn namespace_names(&self) -> Vec<String> {
        self.namespaces.iter().cloned().collect()
    }

    /// Build the validation context for one namespace
    pub fn context_for(&self, namespace: &str, config: &ValidationConfig) -> ValidationContext {
        let localize = |object: &ConfigObject| {
            let mut object = object.clone();
            if object.metadata.cluster.is_empty() {
                object.metadata.cluster = config.cluster_name.clone();
            }
            object
        };
        let in_namespace = |objects: &[ConfigObject]| -> Vec<ConfigObject> {
            objects
                .iter()
                .filter(|o| o.namespace() == namespace)
                .map(&localize)
                .collect()
        };

        let exported_virtual_services = self
            .virtual_services
            .iter()
            .filter(|vs| vs.namespace() != namespace && exported_to(vs, namespace))
            .map(&localize)
            .collect();

        let visible_service_entries: Vec<ConfigObject> = self
            .service_entries
            .iter()
            .filter(|se| exported_to(se, namespace))
            .cloned()
            .collect();

        let (mesh, namespaced): (Vec<ConfigObject>, Vec<ConfigObject>) = self
            .peer_authentications
            .iter()
            .filter(|pa| !has_selector(pa))
            .cloned()
            .partition(|pa| pa.namespace() == config.root_namespace);

        let mut namespaces = self.namespace_names();
        if !namespaces.iter().any(|ns| ns == namespace) {
            namespaces.push(namespace.to_string());
        }

        ValidationContext {
            namespace: namespace.to_string(),
            namespaces,
            destination_rules: in_namespace(&self.destination_rules),
            virtual_services: in_namespace(&self.virtual_services),
            exported_virtual_services,
            services: self.services.clone(),
            workloads: self.workloads.clone(),
            service_entries: service_entry_hosts(&visible_service_entries),
            registry_status: self.registry_status.clone(),
            mtls_details: MtlsDetails {
                mesh_peer_authentications: mesh,
                peer_authentications: namespaced,
            },
        }
    }
}
