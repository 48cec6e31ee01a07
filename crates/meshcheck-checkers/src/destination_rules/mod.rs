//! Destination rule checks

mod meshwide_mtls;
mod no_dest;

pub use meshwide_mtls::MeshWideMtlsChecker;
pub use no_dest::NoDestinationChecker;

use meshcheck_common::{ConfigObject, IstioValidations, ValidationConfig};

use crate::checker::Checker;
use crate::context::ValidationContext;

/// Runs the destination-rule rule set against the rules of a context
pub struct DestinationRulesChecker<'a> {
    context: &'a ValidationContext,
    config: &'a ValidationConfig,
}

impl<'a> DestinationRulesChecker<'a> {
    /// Create a checker over a context
    pub fn new(context: &'a ValidationContext, config: &'a ValidationConfig) -> Self {
        Self { context, config }
    }

    /// The checkers run against every destination rule, in order
    fn rule_set(&self, destination_rule: &'a ConfigObject) -> Vec<Box<dyn Checker + 'a>> {
        let ctx = self.context;
        vec![
            Box::new(NoDestinationChecker {
                namespaces: &ctx.namespaces,
                workloads: &ctx.workloads,
                destination_rule,
                virtual_services: ctx.visible_virtual_services().collect(),
                service_entries: &ctx.service_entries,
                services: &ctx.services,
                registry_status: &ctx.registry_status,
                app_label: &self.config.app_label,
            }),
            Box::new(MeshWideMtlsChecker {
                destination_rule,
                mtls_details: &ctx.mtls_details,
            }),
        ]
    }

    /// Validate one destination rule
    pub fn check_destination_rule(&self, destination_rule: &'a ConfigObject) -> IstioValidations {
        let key = destination_rule.key();
        let mut validations = IstioValidations::new();
        for checker in self.rule_set(destination_rule) {
            let (checks, valid) = checker.check();
            validations.add_checks(&key, checks, valid);
        }
        validations
    }

    /// Validate every destination rule of the context
    pub fn check(&self) -> IstioValidations {
        let mut validations = IstioValidations::new();
        for destination_rule in &self.context.destination_rules {
            validations.merge(self.check_destination_rule(destination_rule));
        }
        validations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use meshcheck_common::{MessageKey, ObjectType};

    #[test]
    fn test_rule_set_findings_merge_per_rule() {
        let mut ctx = ValidationContext::new("istio-system");
        ctx.destination_rules = vec![
            with_tls_mode(destination_rule("default", "istio-system", "*.local"), "ISTIO_MUTUAL"),
            destination_rule("ratings", "istio-system", "ratings"),
        ];
        let config = ValidationConfig::default();

        let validations = DestinationRulesChecker::new(&ctx, &config).check();
        assert_eq!(validations.len(), 2);

        let default = &validations[&ctx.destination_rules[0].key()];
        assert_eq!(default.object_type, ObjectType::DestinationRule);
        assert!(!default.valid);
        assert_eq!(default.checks[0].key, MessageKey::MeshPolicyMissing);

        let ratings = &validations[&ctx.destination_rules[1].key()];
        assert_eq!(ratings.checks[0].key, MessageKey::NoDestMatchingRegistry);
    }

    #[test]
    fn test_clean_rule_has_no_entry() {
        let mut ctx = ValidationContext::new("bookinfo");
        ctx.services = vec![service("reviews", "bookinfo", &[("app", "reviews")])];
        ctx.destination_rules = vec![destination_rule("reviews", "bookinfo", "reviews")];
        let config = ValidationConfig::default();

        assert!(DestinationRulesChecker::new(&ctx, &config).check().is_empty());
    }
}
