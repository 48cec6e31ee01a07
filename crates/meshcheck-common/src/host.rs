//! Mesh host resolution
//!
//! Istio objects name destinations with loosely-formatted host strings:
//! `reviews`, `reviews.bookinfo`, `reviews.bookinfo.svc.cluster.local`,
//! `*.bookinfo.svc.cluster.local` or `*`. Every cross-object comparison in the
//! checkers goes through [`Host::resolve`] and [`Host::matches`] so that all of
//! them agree on what "the same destination" means.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::mesh::{self, IDENTITY_DOMAIN};

/// A host resolved against the namespace and cluster of the object declaring it
///
/// Equality compares the `(service, namespace, cluster)` triple only;
/// `complete_input` records whether the namespace came from the raw string.
#[derive(Clone, Debug, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    /// Service name, or the verbatim raw host for wildcards and external names
    pub service: String,
    /// Namespace of the service
    pub namespace: String,
    /// Cluster the host was declared in
    pub cluster: String,
    /// True when the raw host spelled out the namespace itself
    pub complete_input: bool,
}

impl Host {
    /// Resolve a raw host string.
    ///
    /// # Arguments
    /// * `raw` - Host as written in the object spec
    /// * `namespace` - Namespace of the defining object, used when `raw` omits one
    /// * `cluster` - Cluster of the defining object
    /// * `namespaces` - Known namespace names, used to recognise `svc.ns`
    pub fn resolve<S: AsRef<str>>(
        raw: &str,
        namespace: &str,
        cluster: &str,
        namespaces: &[S],
    ) -> Self {
        if raw.starts_with('*') {
            return Self::scoped(raw, namespace, cluster);
        }

        let parts: Vec<&str> = raw.split('.').collect();

        if parts.len() == 2 && namespaces.iter().any(|ns| ns.as_ref() == parts[1]) {
            return Self::complete(parts[0], parts[1], cluster);
        }

        if parts.len() > 2 && parts[2..].join(".") == IDENTITY_DOMAIN {
            return Self::complete(parts[0], parts[1], cluster);
        }

        Self::scoped(raw, namespace, cluster)
    }

    fn complete(service: &str, namespace: &str, cluster: &str) -> Self {
        Self {
            service: service.to_string(),
            namespace: namespace.to_string(),
            cluster: cluster.to_string(),
            complete_input: true,
        }
    }

    fn scoped(service: &str, namespace: &str, cluster: &str) -> Self {
        Self {
            service: service.to_string(),
            namespace: namespace.to_string(),
            cluster: cluster.to_string(),
            complete_input: false,
        }
    }

    /// Whether this host is a wildcard (`*` or `*.suffix`)
    pub fn is_wildcard(&self) -> bool {
        self.service.starts_with('*')
    }

    /// The suffix a wildcard host covers (empty for a bare `*`)
    fn wildcard_suffix(&self) -> &str {
        self.service.strip_prefix('*').unwrap_or(&self.service)
    }

    /// Fully-qualified form of the host.
    ///
    /// In-mesh services become `service.namespace.svc.cluster.local`; wildcards
    /// and external dotted names are returned as written.
    pub fn fqdn(&self) -> String {
        if self.is_wildcard() || (!self.complete_input && self.service.contains('.')) {
            self.service.clone()
        } else {
            mesh::fqdn(&self.service, &self.namespace)
        }
    }

    /// Whether two hosts refer to the same (or an overlapping) destination.
    ///
    /// Wildcards on either side compare by suffix containment; otherwise the
    /// resolved triples must be equal.
    pub fn matches(&self, other: &Host) -> bool {
        match (self.is_wildcard(), other.is_wildcard()) {
            (false, false) => self == other,
            (true, true) => {
                let (a, b) = (self.wildcard_suffix(), other.wildcard_suffix());
                a.ends_with(b) || b.ends_with(a)
            }
            (true, false) => other.fqdn().ends_with(self.wildcard_suffix()),
            (false, true) => self.fqdn().ends_with(other.wildcard_suffix()),
        }
    }

    /// Whether this host names `service` in `namespace`.
    ///
    /// Convenience for lookups that start from a known service rather than a
    /// second raw host.
    pub fn targets_service(&self, service: &str, namespace: &str) -> bool {
        self.matches(&Host::complete(service, namespace, &self.cluster))
    }
}

impl PartialEq for Host {
    fn eq(&self, other: &Self) -> bool {
        self.service == other.service
            && self.namespace == other.namespace
            && self.cluster == other.cluster
    }
}

impl Hash for Host {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.service.hash(state);
        self.namespace.hash(state);
        self.cluster.hash(state);
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fqdn())
    }
}
