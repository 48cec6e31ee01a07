//! Mesh-wide mTLS consistency
//!
//! A destination rule that turns on `ISTIO_MUTUAL` for the whole mesh (or a
//! whole namespace) only works when a peer authentication at that scope makes
//! the receiving side accept mTLS. Any peer authentication mode counts.

use meshcheck_common::mesh::{is_mesh_wide_host, namespace_of_wildcard, ISTIO_MUTUAL};
use meshcheck_common::{ConfigObject, IstioCheck, Lookup, MessageKey};
use tracing::debug;

use crate::checker::Checker;
use crate::context::MtlsDetails;

const TLS_MODE_PATH: [&str; 3] = ["trafficPolicy", "tls", "mode"];

/// Flags mesh or namespace-wide `ISTIO_MUTUAL` rules with no peer authentication
pub struct MeshWideMtlsChecker<'a> {
    /// Rule under check
    pub destination_rule: &'a ConfigObject,
    /// Visible peer authentications
    pub mtls_details: &'a MtlsDetails,
}

impl<'a> MeshWideMtlsChecker<'a> {
    /// Whether a peer authentication governs the scope `host` covers.
    /// Hosts that are neither mesh nor namespace wide are not this checker's concern.
    fn governed(&self, host: &str) -> bool {
        if is_mesh_wide_host(host) {
            return self.mtls_details.has_mesh_policy();
        }
        match namespace_of_wildcard(host) {
            Some(namespace) => {
                self.mtls_details.has_mesh_policy()
                    || self.mtls_details.has_namespace_policy(namespace)
            }
            None => true,
        }
    }
}

impl Checker for MeshWideMtlsChecker<'_> {
    fn check(&self) -> (Vec<IstioCheck>, bool) {
        let dr = self.destination_rule;

        let mode = match dr.spec_path(&TLS_MODE_PATH) {
            Lookup::Found(mode) => mode.as_str(),
            Lookup::Absent => None,
            Lookup::Malformed => {
                debug!(name = %dr.name(), namespace = %dr.namespace(), "malformed trafficPolicy");
                None
            }
        };
        if mode != Some(ISTIO_MUTUAL) {
            return (Vec::new(), true);
        }

        let Some(host) = dr.spec_str("host").ok() else {
            return (Vec::new(), true);
        };

        if self.governed(host) {
            (Vec::new(), true)
        } else {
            let check = IstioCheck::build(
                MessageKey::MeshPolicyMissing,
                format!("spec/{}", TLS_MODE_PATH.join("/")),
            );
            (vec![check], false)
        }
    }
}
