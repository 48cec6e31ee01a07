//! Route weight and subset duplication checks

use std::collections::HashMap;

use meshcheck_common::routes::{route_blocks, RouteBlock};
use meshcheck_common::{ConfigObject, Host, IstioCheck, Lookup, MessageKey};

use crate::checker::Checker;

/// Warns about partial single-destination weights and repeated subsets
pub struct RouteChecker<'a> {
    /// Virtual service under check
    pub virtual_service: &'a ConfigObject,
    /// Known namespaces, for destination host resolution
    pub namespaces: &'a [String],
}

impl RouteChecker<'_> {
    /// A lone destination with a weight below 100 sends the rest of the traffic nowhere
    fn check_single_weight(block: &RouteBlock<'_>, checks: &mut Vec<IstioCheck>) {
        let [destination] = block.destinations.as_slice() else {
            return;
        };
        if let Lookup::Found(weight) = destination.weight {
            if weight < 100.0 {
                checks.push(IstioCheck::build(
                    MessageKey::RouteSingleWeight,
                    format!("{}/route[{}]/weight", block.path(), destination.index),
                ));
            }
        }
    }

    /// Every occurrence of a `(host, subset)` pair seen more than once in a block.
    /// Hosts are compared resolved, so `reviews` and its FQDN are one destination.
    fn check_repeated_subsets(&self, block: &RouteBlock<'_>, checks: &mut Vec<IstioCheck>) {
        let vs = self.virtual_service;
        let mut occurrences: HashMap<(Host, &str), Vec<usize>> = HashMap::new();
        for destination in &block.destinations {
            let Some(subset) = destination.subset else {
                continue;
            };
            let host = Host::resolve(
                destination.host.unwrap_or_default(),
                vs.namespace(),
                vs.cluster(),
                self.namespaces,
            );
            occurrences
                .entry((host, subset))
                .or_default()
                .push(destination.index);
        }

        let mut repeated: Vec<usize> = occurrences
            .into_values()
            .filter(|indices| indices.len() > 1)
            .flatten()
            .collect();
        repeated.sort_unstable();

        checks.extend(repeated.into_iter().map(|index| {
            IstioCheck::build(
                MessageKey::RouteRepeatedSubset,
                format!("{}/route[{}]/subset", block.path(), index),
            )
        }));
    }
}

impl Checker for RouteChecker<'_> {
    fn check(&self) -> (Vec<IstioCheck>, bool) {
        let mut checks = Vec::new();
        for block in route_blocks(self.virtual_service) {
            Self::check_single_weight(&block, &mut checks);
            self.check_repeated_subsets(&block, &mut checks);
        }
        (checks, true)
    }
}
