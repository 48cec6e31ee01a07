//! Virtual service checks

mod route;
mod single_host;

pub use route::RouteChecker;
pub use single_host::SingleHostChecker;

use meshcheck_common::{ConfigObject, IstioValidations};

use crate::checker::{Checker, ObjectChecker};
use crate::context::ValidationContext;

/// Runs the virtual-service rule set and the single-host check over a context
pub struct VirtualServiceChecker<'a> {
    context: &'a ValidationContext,
}

impl<'a> VirtualServiceChecker<'a> {
    /// Create a checker over a context
    pub fn new(context: &'a ValidationContext) -> Self {
        Self { context }
    }

    /// The checkers run against every virtual service, in order
    fn rule_set(&self, virtual_service: &'a ConfigObject) -> Vec<Box<dyn Checker + 'a>> {
        vec![Box::new(RouteChecker {
            virtual_service,
            namespaces: &self.context.namespaces,
        })]
    }

    /// Validate one virtual service on its own
    pub fn check_virtual_service(&self, virtual_service: &'a ConfigObject) -> IstioValidations {
        let key = virtual_service.key();
        let mut validations = IstioValidations::new();
        for checker in self.rule_set(virtual_service) {
            let (checks, valid) = checker.check();
            validations.add_checks(&key, checks, valid);
        }
        validations
    }

    /// Correlate the namespace's virtual services with the exported ones
    pub fn check_single_host(&self) -> IstioValidations {
        let ctx = self.context;
        SingleHostChecker {
            namespace: &ctx.namespace,
            namespaces: &ctx.namespaces,
            virtual_services: &ctx.virtual_services,
            exported_virtual_services: &ctx.exported_virtual_services,
        }
        .check()
    }

    /// Validate every virtual service of the context
    pub fn check(&self) -> IstioValidations {
        let mut validations = IstioValidations::new();
        for virtual_service in &self.context.virtual_services {
            validations.merge(self.check_virtual_service(virtual_service));
        }
        validations.merge(self.check_single_host());
        validations
    }
}
