//! Known services, workloads and registry entries
//!
//! These are the non-Istio inputs of a check pass: what actually runs in the
//! cluster (or is known to the mesh registry) that a destination can resolve to.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Service;
use serde::{Deserialize, Serialize};

use crate::labels::{LabelSelector, Labels};
use crate::object::ConfigObject;
use crate::{yaml, Result};

/// A workload (Deployment, StatefulSet, Pod, ...) and its pod labels
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadListItem {
    /// Workload name
    pub name: String,
    /// Workload namespace
    pub namespace: String,
    /// Workload kind (e.g. "Deployment")
    #[serde(rename = "type")]
    pub workload_type: String,
    /// Labels applied to the workload's pods
    pub labels: Labels,
}

impl WorkloadListItem {
    /// Create a workload item
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        workload_type: impl Into<String>,
        labels: Labels,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            workload_type: workload_type.into(),
            labels,
        }
    }

    /// Value of the app label, under the configured label name
    pub fn app<'a>(&'a self, app_label: &str) -> Option<&'a str> {
        self.labels.get(app_label).map(String::as_str)
    }
}

/// A destination known to the mesh control plane's registry
///
/// Covers destinations that are not visible as local services, e.g. hosts
/// from remote clusters of a multi-cluster mesh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStatus {
    /// Fully-qualified hostname as reported by the registry
    pub hostname: String,
}

impl RegistryStatus {
    /// Create a registry status record
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
        }
    }
}

/// Parse registry records from a YAML (or JSON) list of `hostname` entries.
///
/// Empty input yields no records.
pub fn registry_status_from_yaml(input: &str) -> Result<Vec<RegistryStatus>> {
    let value = yaml::parse_yaml(input)?;
    if value.is_null() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_value(value)?)
}

/// Service-entry hosts: host → names of the service entries declaring it
pub type ServiceEntryHosts = BTreeMap<String, Vec<String>>;

/// Index the hosts declared by a set of ServiceEntry objects
pub fn service_entry_hosts(service_entries: &[ConfigObject]) -> ServiceEntryHosts {
    let mut hosts = ServiceEntryHosts::new();
    for se in service_entries {
        let Some(declared) = se.spec_strings("hosts").ok() else {
            continue;
        };
        for host in declared {
            let names = hosts.entry(host).or_default();
            if !names.iter().any(|n| n == se.name()) {
                names.push(se.name().to_string());
            }
        }
    }
    hosts
}

/// Whether any service entry declares `service` (wildcard entries by suffix)
pub fn has_matching_service_entry(service: &str, hosts: &ServiceEntryHosts) -> bool {
    hosts.keys().any(|host| match host.strip_prefix('*') {
        Some(suffix) => service.ends_with(suffix),
        None => host == service,
    })
}

/// Whether any registry record carries exactly this hostname
pub fn has_matching_registry_status(hostname: &str, registry: &[RegistryStatus]) -> bool {
    registry.iter().any(|r| r.hostname == hostname)
}

// =============================================================================
// Kubernetes Service helpers
// =============================================================================

/// Name of a Kubernetes Service (empty when unset)
pub fn service_name(service: &Service) -> &str {
    service.metadata.name.as_deref().unwrap_or_default()
}

/// Namespace of a Kubernetes Service, if set
pub fn service_namespace(service: &Service) -> Option<&str> {
    service.metadata.namespace.as_deref()
}

/// Whether a Service lives in `namespace` (services without one are accepted)
pub fn service_in_namespace(service: &Service, namespace: &str) -> bool {
    service_namespace(service).map_or(true, |ns| ns == namespace)
}

/// Pod selector of a Kubernetes Service
pub fn service_selector(service: &Service) -> LabelSelector {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.selector.clone())
        .map(LabelSelector::from)
        .unwrap_or_default()
}

/// Labels on a Kubernetes Service object
pub fn service_labels(service: &Service) -> Labels {
    service.metadata.labels.clone().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjectMeta, ObjectType};
    use k8s_openapi::api::core::v1::ServiceSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta as K8sMeta;
    use serde_json::json;

    fn service_entry(name: &str, hosts: &[&str]) -> ConfigObject {
        ConfigObject::new(
            ObjectType::ServiceEntry,
            ObjectMeta::new(name, "bookinfo"),
            json!({ "hosts": hosts }),
        )
    }

    #[test]
    fn test_service_entry_index() {
        let hosts = service_entry_hosts(&[
            service_entry("google", &["www.google.com"]),
            service_entry("wiki", &["*.wikipedia.org", "www.google.com"]),
        ]);
        assert_eq!(hosts["www.google.com"], vec!["google", "wiki"]);
        assert!(has_matching_service_entry("www.google.com", &hosts));
        assert!(has_matching_service_entry("en.wikipedia.org", &hosts));
        assert!(!has_matching_service_entry("reviews", &hosts));
    }

    #[test]
    fn test_service_entry_without_hosts_is_skipped() {
        let malformed = ConfigObject::new(
            ObjectType::ServiceEntry,
            ObjectMeta::new("broken", "bookinfo"),
            json!({ "hosts": "www.google.com" }),
        );
        assert!(service_entry_hosts(&[malformed]).is_empty());
    }

    #[test]
    fn test_registry_status_exact_match() {
        let registry = vec![RegistryStatus::new("reviews.bookinfo.svc.cluster.local")];
        assert!(has_matching_registry_status("reviews.bookinfo.svc.cluster.local", &registry));
        assert!(!has_matching_registry_status("reviews", &registry));
    }

    #[test]
    fn test_registry_status_from_yaml() {
        let records = registry_status_from_yaml(
            "- hostname: details.bookinfo.svc.cluster.local\n- hostname: ratings.remote.svc.cluster.local\n",
        )
        .expect("registry list should parse");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], RegistryStatus::new("details.bookinfo.svc.cluster.local"));

        let json = registry_status_from_yaml(r#"[{"hostname": "reviews.bookinfo.svc.cluster.local"}]"#)
            .expect("json is yaml");
        assert_eq!(json, vec![RegistryStatus::new("reviews.bookinfo.svc.cluster.local")]);

        assert!(registry_status_from_yaml("").expect("empty").is_empty());
    }

    #[test]
    fn test_registry_status_wrong_shape() {
        let err = registry_status_from_yaml("hostname: details").unwrap_err();
        assert!(matches!(err, crate::Error::Serialization { .. }));
    }

    #[test]
    fn test_service_helpers() {
        let service = Service {
            metadata: K8sMeta {
                name: Some("reviews".to_string()),
                namespace: Some("bookinfo".to_string()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                selector: Some(BTreeMap::from([("app".to_string(), "reviews".to_string())])),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(service_name(&service), "reviews");
        assert!(service_in_namespace(&service, "bookinfo"));
        assert!(!service_in_namespace(&service, "eshop"));
        assert!(!service_selector(&service).is_empty());
        assert!(service_labels(&service).is_empty());
    }

    #[test]
    fn test_workload_app_label() {
        let wl = WorkloadListItem::new(
            "reviews-v1",
            "bookinfo",
            "Deployment",
            BTreeMap::from([("app".to_string(), "reviews".to_string())]),
        );
        assert_eq!(wl.app("app"), Some("reviews"));
        assert_eq!(wl.app("k8s-app"), None);
    }
}
