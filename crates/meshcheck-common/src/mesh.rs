//! Service mesh constants for Istio
//!
//! Single source of truth for the Istio names the checkers and the graph
//! appender rely on.

// =============================================================================
// Namespaces and Domains
// =============================================================================

/// Root namespace holding mesh-wide policy objects.
pub const DEFAULT_ROOT_NAMESPACE: &str = "istio-system";

/// Istio identity domain appended to `service.namespace` in FQDN hosts.
pub const IDENTITY_DOMAIN: &str = "svc.cluster.local";

/// Default cluster name for objects that do not carry one.
pub const DEFAULT_CLUSTER_NAME: &str = "Kubernetes";

/// Namespace given to snapshot documents that omit one.
pub const DEFAULT_NAMESPACE: &str = "default";

// =============================================================================
// Hosts and Gateways
// =============================================================================

/// Host wildcard matching every destination.
pub const WILDCARD_HOST: &str = "*";

/// Mesh-wide host form used by destination rules (`*.local`).
pub const MESH_WIDE_HOST: &str = "*.local";

/// Reserved gateway name for sidecar (east-west) traffic.
///
/// A virtual service with no `gateways` field binds to this gateway.
pub const MESH_GATEWAY: &str = "mesh";

/// TLS mode enabling Istio-issued mutual TLS in a destination rule.
pub const ISTIO_MUTUAL: &str = "ISTIO_MUTUAL";

/// Route blocks a virtual service may declare.
pub const ROUTE_PROTOCOLS: [&str; 3] = ["http", "tcp", "tls"];

// =============================================================================
// Labels
// =============================================================================

/// Default label key naming an application.
pub const DEFAULT_APP_LABEL: &str = "app";

/// Default label key naming an application version.
pub const DEFAULT_VERSION_LABEL: &str = "version";

/// Label key set by the Istio operator on gateway deployments.
pub const ISTIO_COMPONENT_LABEL: &str = "operator.istio.io/component";

/// Value of [`ISTIO_COMPONENT_LABEL`] for ingress gateways.
pub const INGRESS_GATEWAYS_COMPONENT: &str = "IngressGateways";

// =============================================================================
// Naming Helpers
// =============================================================================

/// Fully-qualified host for a service in a namespace.
///
/// Format: `{service}.{namespace}.svc.cluster.local`
pub fn fqdn(service: &str, namespace: &str) -> String {
    format!("{}.{}.{}", service, namespace, IDENTITY_DOMAIN)
}

/// Namespace targeted by a namespace-wide wildcard host, if `host` is one.
pub fn namespace_of_wildcard(host: &str) -> Option<&str> {
    let rest = host.strip_prefix("*.")?;
    let namespace = rest.strip_suffix(IDENTITY_DOMAIN)?.strip_suffix('.')?;
    if namespace.is_empty() || namespace.contains('.') {
        return None;
    }
    Some(namespace)
}

/// Whether a destination-rule host covers the whole mesh.
pub fn is_mesh_wide_host(host: &str) -> bool {
    host == WILDCARD_HOST || host == MESH_WIDE_HOST
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fqdn_format() {
        assert_eq!(fqdn("reviews", "bookinfo"), "reviews.bookinfo.svc.cluster.local");
    }

    #[test]
    fn namespace_of_wildcard_extracts_namespace() {
        assert_eq!(namespace_of_wildcard("*.bookinfo.svc.cluster.local"), Some("bookinfo"));
    }

    #[test]
    fn namespace_of_wildcard_rejects_other_shapes() {
        assert_eq!(namespace_of_wildcard("*.local"), None);
        assert_eq!(namespace_of_wildcard("*"), None);
        assert_eq!(namespace_of_wildcard("reviews.bookinfo.svc.cluster.local"), None);
        assert_eq!(namespace_of_wildcard("*.svc.cluster.local"), None);
        assert_eq!(namespace_of_wildcard("*.a.b.svc.cluster.local"), None);
    }

    #[test]
    fn mesh_wide_hosts() {
        assert!(is_mesh_wide_host("*"));
        assert!(is_mesh_wide_host("*.local"));
        assert!(!is_mesh_wide_host("*.bookinfo.svc.cluster.local"));
        assert!(!is_mesh_wide_host("reviews"));
    }
}
