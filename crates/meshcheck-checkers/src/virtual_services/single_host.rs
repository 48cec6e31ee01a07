//! Single host per mesh
//!
//! Two virtual services declaring the same host for the same traffic are
//! merged unpredictably by the proxies. Colliding objects are grouped into
//! classes (connected components of the collision graph); every member of a
//! class gets a warning referencing all the others.
//!
//! Objects live in an arena indexed by position; collisions are edges between
//! indices and classes are computed with a union-find over those indices.

use std::collections::BTreeSet;

use meshcheck_common::mesh::MESH_GATEWAY;
use meshcheck_common::{
    ConfigObject, Host, IstioCheck, IstioValidationKey, IstioValidations, Lookup, MessageKey,
};
use tracing::debug;

use crate::checker::ObjectChecker;

/// Groups virtual services that declare the same host
pub struct SingleHostChecker<'a> {
    /// Namespace under validation
    pub namespace: &'a str,
    /// Known namespaces
    pub namespaces: &'a [String],
    /// Virtual services of the namespace
    pub virtual_services: &'a [ConfigObject],
    /// Virtual services of other namespaces exported to it
    pub exported_virtual_services: &'a [ConfigObject],
}

/// One virtual service in the arena
struct Entry<'a> {
    object: &'a ConfigObject,
    hosts: Vec<Host>,
    gateways: BTreeSet<String>,
}

impl Entry<'_> {
    fn binds_mesh(&self) -> bool {
        self.gateways.contains(MESH_GATEWAY)
    }

    /// Whether both objects could serve the same traffic
    fn shares_traffic(&self, other: &Entry<'_>) -> bool {
        self.binds_mesh() || other.binds_mesh() || !self.gateways.is_disjoint(&other.gateways)
    }

    fn collides(&self, other: &Entry<'_>) -> bool {
        self.shares_traffic(other)
            && self
                .hosts
                .iter()
                .any(|a| other.hosts.iter().any(|b| a.matches(b)))
    }
}

/// Disjoint sets over arena indices
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    /// Keeps the smaller index as root so classes are ordered by first member
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }
}

impl<'a> SingleHostChecker<'a> {
    /// Gateways an object binds to, qualified as `namespace/name`.
    ///
    /// No `gateways` field means the mesh gateway.
    fn gateways(vs: &ConfigObject) -> BTreeSet<String> {
        let declared = match vs.spec_strings("gateways") {
            Lookup::Found(gateways) => gateways,
            Lookup::Absent => Vec::new(),
            Lookup::Malformed => {
                debug!(name = %vs.name(), namespace = %vs.namespace(), "malformed gateways");
                Vec::new()
            }
        };
        if declared.is_empty() {
            return BTreeSet::from([MESH_GATEWAY.to_string()]);
        }
        declared
            .into_iter()
            .map(|gateway| {
                if gateway == MESH_GATEWAY || gateway.contains('/') {
                    gateway
                } else {
                    format!("{}/{}", vs.namespace(), gateway)
                }
            })
            .collect()
    }

    fn entry(&self, vs: &'a ConfigObject) -> Option<Entry<'a>> {
        let raw_hosts = match vs.spec_strings("hosts") {
            Lookup::Found(hosts) => hosts,
            Lookup::Absent => return None,
            Lookup::Malformed => {
                debug!(name = %vs.name(), namespace = %vs.namespace(), "malformed hosts");
                return None;
            }
        };
        let hosts: Vec<Host> = raw_hosts
            .iter()
            .map(|raw| Host::resolve(raw, vs.namespace(), vs.cluster(), self.namespaces))
            .collect();
        if hosts.is_empty() {
            return None;
        }
        Some(Entry {
            object: vs,
            hosts,
            gateways: Self::gateways(vs),
        })
    }

    /// Arena of distinct objects with at least one host, in input order
    fn arena(&self) -> Vec<Entry<'a>> {
        let mut seen = BTreeSet::new();
        self.virtual_services
            .iter()
            .chain(self.exported_virtual_services.iter())
            .filter(|vs| seen.insert(vs.key()))
            .filter_map(|vs| self.entry(vs))
            .collect()
    }

    /// Collision classes of size two or more, members in arena order
    fn classes(arena: &[Entry<'_>]) -> Vec<Vec<usize>> {
        let edges: Vec<(usize, usize)> = (0..arena.len())
            .flat_map(|i| (i + 1..arena.len()).map(move |j| (i, j)))
            .filter(|&(i, j)| arena[i].collides(&arena[j]))
            .collect();

        let mut sets = UnionFind::new(arena.len());
        for &(i, j) in &edges {
            sets.union(i, j);
        }

        let mut classes: Vec<Vec<usize>> = vec![Vec::new(); arena.len()];
        for i in 0..arena.len() {
            let root = sets.find(i);
            classes[root].push(i);
        }
        classes.retain(|members| members.len() > 1);
        classes
    }
}

impl ObjectChecker for SingleHostChecker<'_> {
    fn check(&self) -> IstioValidations {
        let arena = self.arena();
        let classes = Self::classes(&arena);
        let mut validations = IstioValidations::new();

        for members in &classes {
            let keys: Vec<IstioValidationKey> =
                members.iter().map(|&i| arena[i].object.key()).collect();
            debug!(
                namespace = %self.namespace,
                size = keys.len(),
                first = %keys[0],
                "virtual services share a host"
            );

            for key in &keys {
                validations.add_checks(
                    key,
                    vec![IstioCheck::build(MessageKey::SingleHost, "spec/hosts")],
                    true,
                );
                let validation = validations.entry(key);
                for other in keys.iter().filter(|other| *other != key) {
                    validation.add_reference(other.clone());
                }
            }
        }

        validations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use meshcheck_common::{ObjectType, Severity};

    fn check(vss: &[ConfigObject], exported: &[ConfigObject], namespaces: &[&str]) -> IstioValidations {
        let namespaces: Vec<String> = namespaces.iter().map(|ns| ns.to_string()).collect();
        SingleHostChecker {
            namespace: "bookinfo",
            namespaces: &namespaces,
            virtual_services: vss,
            exported_virtual_services: exported,
        }
        .check()
    }

    fn key(name: &str, namespace: &str) -> IstioValidationKey {
        IstioValidationKey::new(ObjectType::VirtualService, namespace, name)
    }

    fn assert_single_host(validations: &IstioValidations, name: &str, namespace: &str, refs: &[&str]) {
        let validation = &validations[&key(name, namespace)];
        assert!(validation.valid);
        assert_eq!(validation.checks.len(), 1);
        assert_eq!(validation.checks[0].key, MessageKey::SingleHost);
        assert_eq!(validation.checks[0].severity, Severity::Warning);
        assert_eq!(validation.checks[0].path, "spec/hosts");
        let names: Vec<&str> = validation.references.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, refs);
    }

    #[test]
    fn test_one_host_per_object() {
        let vss = vec![
            virtual_service("virtual-1", "bookinfo", &["reviews"]),
            virtual_service("virtual-2", "bookinfo", &["ratings"]),
        ];
        assert!(check(&vss, &[], &["bookinfo"]).is_empty());
    }

    #[test]
    fn test_repeating_simple_host() {
        let vss = vec![
            virtual_service("virtual-1", "bookinfo", &["reviews"]),
            virtual_service("virtual-2", "bookinfo", &["reviews"]),
            virtual_service("virtual-3", "bookinfo", &["reviews"]),
        ];
        let validations = check(&vss, &[], &["bookinfo"]);
        assert_eq!(validations.len(), 3);
        assert_single_host(&validations, "virtual-1", "bookinfo", &["virtual-2", "virtual-3"]);
        assert_single_host(&validations, "virtual-2", "bookinfo", &["virtual-1", "virtual-3"]);
        assert_single_host(&validations, "virtual-3", "bookinfo", &["virtual-1", "virtual-2"]);
    }

    #[test]
    fn test_host_forms_collide() {
        let vss = vec![
            virtual_service("virtual-1", "bookinfo", &["reviews"]),
            virtual_service("virtual-2", "bookinfo", &["reviews.bookinfo"]),
            virtual_service("virtual-3", "bookinfo", &["reviews.bookinfo.svc.cluster.local"]),
        ];
        assert_eq!(check(&vss, &[], &["bookinfo"]).len(), 3);
    }

    #[test]
    fn test_same_short_name_in_different_namespaces() {
        let vss = vec![virtual_service("virtual-1", "bookinfo", &["reviews"])];
        let exported = vec![virtual_service("virtual-2", "bookinfo2", &["reviews"])];
        assert!(check(&vss, &exported, &["bookinfo", "bookinfo2"]).is_empty());
    }

    #[test]
    fn test_exported_object_collides() {
        let vss = vec![virtual_service("virtual-1", "bookinfo", &["reviews.bookinfo.svc.cluster.local"])];
        let exported = vec![virtual_service("virtual-2", "bookinfo2", &["reviews.bookinfo.svc.cluster.local"])];
        let validations = check(&vss, &exported, &["bookinfo", "bookinfo2"]);
        assert_eq!(validations.len(), 2);
        let validation = &validations[&key("virtual-1", "bookinfo")];
        assert_eq!(validation.references, vec![key("virtual-2", "bookinfo2")]);
    }

    #[test]
    fn test_wildcard_collides_with_everything() {
        let vss = vec![
            virtual_service("virtual-1", "bookinfo", &["*"]),
            virtual_service("virtual-2", "bookinfo", &["reviews"]),
            virtual_service("virtual-3", "bookinfo", &["ratings"]),
        ];
        let validations = check(&vss, &[], &["bookinfo"]);
        assert_eq!(validations.len(), 3);
        assert_single_host(&validations, "virtual-2", "bookinfo", &["virtual-1", "virtual-3"]);
    }

    #[test]
    fn test_namespace_wildcard() {
        let vss = vec![
            virtual_service("virtual-1", "bookinfo", &["*.bookinfo.svc.cluster.local"]),
            virtual_service("virtual-2", "bookinfo", &["reviews"]),
            virtual_service("virtual-3", "eshop", &["orders.eshop.svc.cluster.local"]),
        ];
        let validations = check(&vss, &[], &["bookinfo", "eshop"]);
        assert_eq!(validations.len(), 2);
        assert!(!validations.contains_key(&key("virtual-3", "eshop")));
    }

    #[test]
    fn test_multiple_hosts_chain_into_one_class() {
        let vss = vec![
            virtual_service("virtual-1", "bookinfo", &["reviews", "ratings"]),
            virtual_service("virtual-2", "bookinfo", &["ratings", "details"]),
            virtual_service("virtual-3", "bookinfo", &["details"]),
            virtual_service("virtual-4", "bookinfo", &["productpage"]),
        ];
        let validations = check(&vss, &[], &["bookinfo"]);
        assert_eq!(validations.len(), 3);
        assert_single_host(&validations, "virtual-1", "bookinfo", &["virtual-2", "virtual-3"]);
        assert!(!validations.contains_key(&key("virtual-4", "bookinfo")));
    }

    #[test]
    fn test_gateway_bound_collides_with_mesh_bound() {
        let vss = vec![
            with_gateways(virtual_service("virtual-1", "bookinfo", &["reviews"]), &["bookinfo-gateway"]),
            virtual_service("virtual-2", "bookinfo", &["reviews"]),
        ];
        assert_eq!(check(&vss, &[], &["bookinfo"]).len(), 2);
    }

    #[test]
    fn test_same_gateway_collides() {
        let vss = vec![
            with_gateways(virtual_service("virtual-1", "bookinfo", &["reviews"]), &["bookinfo-gateway"]),
            with_gateways(
                virtual_service("virtual-2", "bookinfo", &["reviews"]),
                &["bookinfo/bookinfo-gateway"],
            ),
        ];
        assert_eq!(check(&vss, &[], &["bookinfo"]).len(), 2);
    }

    #[test]
    fn test_disjoint_gateways_do_not_collide() {
        let vss = vec![
            with_gateways(virtual_service("virtual-1", "bookinfo", &["reviews"]), &["gateway-a"]),
            with_gateways(virtual_service("virtual-2", "bookinfo", &["reviews"]), &["gateway-b"]),
        ];
        assert!(check(&vss, &[], &["bookinfo"]).is_empty());
    }

    #[test]
    fn test_explicit_mesh_gateway_collides() {
        let vss = vec![
            with_gateways(virtual_service("virtual-1", "bookinfo", &["reviews"]), &["gateway-a", "mesh"]),
            with_gateways(virtual_service("virtual-2", "bookinfo", &["reviews"]), &["gateway-b"]),
        ];
        assert_eq!(check(&vss, &[], &["bookinfo"]).len(), 2);
    }

    #[test]
    fn test_duplicate_input_counted_once() {
        let vs = virtual_service("virtual-1", "bookinfo", &["reviews"]);
        assert!(check(&[vs.clone()], &[vs], &["bookinfo"]).is_empty());
    }

    #[test]
    fn test_malformed_hosts_are_skipped() {
        let mut broken = virtual_service("virtual-1", "bookinfo", &[]);
        broken.spec["hosts"] = serde_json::json!("reviews");
        let vss = vec![broken, virtual_service("virtual-2", "bookinfo", &["reviews"])];
        assert!(check(&vss, &[], &["bookinfo"]).is_empty());
    }
}
