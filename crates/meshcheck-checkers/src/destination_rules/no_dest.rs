//! Destination existence
//!
//! A destination rule only takes effect when its host resolves to something
//! the mesh knows: a workload or service in the host's namespace, a service
//! entry, or a registry record. Subsets must also select at least one
//! workload of that service, otherwise traffic routed to them goes nowhere.

use k8s_openapi::api::core::v1::Service;
use meshcheck_common::inventory::{
    has_matching_registry_status, has_matching_service_entry, service_in_namespace, service_name,
    service_selector, RegistryStatus, ServiceEntryHosts, WorkloadListItem,
};
use meshcheck_common::labels::LabelSelector;
use meshcheck_common::object::{object_field, str_field};
use meshcheck_common::routes::route_blocks;
use meshcheck_common::{ConfigObject, Host, IstioCheck, Lookup, MessageKey, Severity};
use tracing::debug;

use crate::checker::Checker;

/// Flags destination rules (and subsets) that point at nothing
pub struct NoDestinationChecker<'a> {
    /// Known namespaces
    pub namespaces: &'a [String],
    /// Workloads and their pod labels
    pub workloads: &'a [WorkloadListItem],
    /// Rule under check
    pub destination_rule: &'a ConfigObject,
    /// Virtual services that may route to the rule's subsets
    pub virtual_services: Vec<&'a ConfigObject>,
    /// Hosts declared by service entries
    pub service_entries: &'a ServiceEntryHosts,
    /// Kubernetes services
    pub services: &'a [Service],
    /// Registry records
    pub registry_status: &'a [RegistryStatus],
    /// Label naming a workload's application
    pub app_label: &'a str,
}

impl<'a> NoDestinationChecker<'a> {
    /// Service name and namespace to look up in the local inventory.
    ///
    /// An unresolved `svc.ns` host (namespace not among the known ones) still
    /// names a local service, so it is split here.
    fn local_service<'h>(&self, host: &'h Host) -> (&'h str, &'h str) {
        if !host.complete_input {
            if let Some((service, namespace)) = host.service.split_once('.') {
                if !namespace.contains('.') {
                    return (service, namespace);
                }
            }
        }
        (&host.service, &host.namespace)
    }

    fn has_matching_service(&self, host: &Host) -> bool {
        if host.is_wildcard() {
            return true;
        }

        let (service, namespace) = self.local_service(host);

        let has_workload = self
            .workloads
            .iter()
            .any(|w| w.namespace == namespace && w.app(self.app_label) == Some(service));
        if has_workload {
            return true;
        }

        let has_service = self
            .services
            .iter()
            .any(|s| service_name(s) == service && service_in_namespace(s, namespace));
        if has_service {
            return true;
        }

        if has_matching_service_entry(&host.service, self.service_entries)
            || has_matching_service_entry(&host.fqdn(), self.service_entries)
        {
            return true;
        }

        has_matching_registry_status(&host.fqdn(), self.registry_status)
    }

    /// Whether some workload of the host's service also carries the subset labels
    fn has_matching_workload(&self, host: &Host, subset: &LabelSelector) -> bool {
        if host.is_wildcard() {
            return true;
        }

        let (service, namespace) = self.local_service(host);
        let Some(svc) = self
            .services
            .iter()
            .find(|s| service_name(s) == service && service_in_namespace(s, namespace))
        else {
            return false;
        };

        let selector = service_selector(svc);
        if selector.is_empty() {
            return false;
        }

        self.workloads.iter().any(|w| {
            w.namespace == namespace && selector.matches(&w.labels) && subset.matches(&w.labels)
        })
    }

    /// Whether any virtual service routes to `subset` of `host`
    fn is_subset_referenced(&self, host: &Host, subset: &str) -> bool {
        self.virtual_services.iter().any(|vs| {
            route_blocks(vs)
                .iter()
                .flat_map(|block| block.destinations.iter())
                .filter(|d| d.subset == Some(subset))
                .filter_map(|d| d.host)
                .any(|raw| {
                    Host::resolve(raw, vs.namespace(), vs.cluster(), self.namespaces).matches(host)
                })
        })
    }
}

impl Checker for NoDestinationChecker<'_> {
    fn check(&self) -> (Vec<IstioCheck>, bool) {
        let dr = self.destination_rule;
        let mut checks = Vec::new();
        let mut valid = true;

        let raw = match dr.spec_str("host") {
            Lookup::Found(host) => host,
            Lookup::Absent => return (checks, valid),
            Lookup::Malformed => {
                debug!(name = %dr.name(), namespace = %dr.namespace(), "malformed host");
                return (checks, valid);
            }
        };
        let host = Host::resolve(raw, dr.namespace(), dr.cluster(), self.namespaces);

        if !self.has_matching_service(&host) {
            checks.push(IstioCheck::build(MessageKey::NoDestMatchingRegistry, "spec/host"));
            return (checks, false);
        }

        let subsets = match dr.spec_array("subsets") {
            Lookup::Found(subsets) => subsets,
            Lookup::Absent => return (checks, valid),
            Lookup::Malformed => {
                debug!(name = %dr.name(), namespace = %dr.namespace(), "malformed subsets");
                return (checks, valid);
            }
        };

        for (i, subset) in subsets.iter().enumerate() {
            if !subset.is_object() {
                continue;
            }
            let path = format!("spec/subsets[{}]", i);

            match object_field(subset, "labels") {
                Lookup::Found(labels) => {
                    if self.has_matching_workload(&host, &LabelSelector::from_value(labels)) {
                        continue;
                    }
                    let check = IstioCheck::build(MessageKey::NoDestSubsetLabels, path);
                    let referenced = str_field(subset, "name")
                        .ok()
                        .is_some_and(|name| self.is_subset_referenced(&host, name));
                    if referenced {
                        valid = false;
                        checks.push(check);
                    } else {
                        checks.push(check.with_severity(Severity::Info));
                    }
                }
                Lookup::Absent => {
                    checks.push(IstioCheck::build(MessageKey::NoDestSubsetNoLabels, path));
                }
                Lookup::Malformed => {
                    debug!(name = %dr.name(), subset = i, "malformed subset labels");
                }
            }
        }

        (checks, valid)
    }
}
