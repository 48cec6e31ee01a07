//! Validation engine
//!
//! Runs the per-object rule sets over a context, then the cross-object
//! checks, and merges everything into one validation set. With more than one
//! worker the per-object results are computed on scoped threads; merging
//! always happens on the calling thread in input order, so the output does
//! not depend on scheduling.

use std::thread;

use meshcheck_common::{ConfigObject, IstioValidations, ValidationConfig};
use tracing::{debug, info};

use crate::context::ValidationContext;
use crate::destination_rules::DestinationRulesChecker;
use crate::snapshot::Snapshot;
use crate::virtual_services::VirtualServiceChecker;

/// One unit of per-object work
#[derive(Clone, Copy)]
enum Target<'a> {
    DestinationRule(&'a ConfigObject),
    VirtualService(&'a ConfigObject),
}

impl<'a> Target<'a> {
    fn check(
        self,
        destination_rules: &DestinationRulesChecker<'a>,
        virtual_services: &VirtualServiceChecker<'a>,
    ) -> IstioValidations {
        match self {
            Target::DestinationRule(dr) => destination_rules.check_destination_rule(dr),
            Target::VirtualService(vs) => virtual_services.check_virtual_service(vs),
        }
    }
}

/// Entry point for validation passes
#[derive(Clone, Debug, Default)]
pub struct ValidationEngine {
    config: ValidationConfig,
}

impl ValidationEngine {
    /// Create an engine
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Engine configuration
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate the objects of one context
    pub fn validate(&self, context: &ValidationContext) -> IstioValidations {
        let destination_rules = DestinationRulesChecker::new(context, &self.config);
        let virtual_services = VirtualServiceChecker::new(context);

        let targets: Vec<Target<'_>> = context
            .destination_rules
            .iter()
            .map(Target::DestinationRule)
            .chain(context.virtual_services.iter().map(Target::VirtualService))
            .collect();

        let per_object: Vec<IstioValidations> = if self.config.workers > 1 && targets.len() > 1 {
            let chunk_size = targets.len().div_ceil(self.config.workers);
            debug!(
                namespace = %context.namespace,
                targets = targets.len(),
                workers = self.config.workers,
                "running checks on worker threads"
            );
            let (dr_checker, vs_checker) = (&destination_rules, &virtual_services);
            thread::scope(|scope| {
                let handles: Vec<_> = targets
                    .chunks(chunk_size)
                    .map(|chunk| {
                        scope.spawn(move || {
                            chunk
                                .iter()
                                .map(|target| target.check(dr_checker, vs_checker))
                                .collect::<Vec<_>>()
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .flat_map(|handle| {
                        handle
                            .join()
                            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                    })
                    .collect()
            })
        } else {
            targets
                .iter()
                .map(|target| target.check(&destination_rules, &virtual_services))
                .collect()
        };

        let mut validations = IstioValidations::new();
        for result in per_object {
            validations.merge(result);
        }
        validations.merge(virtual_services.check_single_host());

        let summary = validations.summary();
        info!(
            namespace = %context.namespace,
            objects = targets.len(),
            flagged = summary.object_count,
            errors = summary.errors,
            warnings = summary.warnings,
            "validation pass complete"
        );
        validations
    }

    /// Validate every namespace of a snapshot, in sorted order
    pub fn validate_snapshot(&self, snapshot: &Snapshot) -> IstioValidations {
        let mut validations = IstioValidations::new();
        for namespace in snapshot.namespace_names() {
            let context = snapshot.context_for(&namespace, &self.config);
            validations.merge(self.validate(&context));
        }
        validations
    }
}
