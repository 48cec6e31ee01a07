//! Istio configuration checkers
//!
//! Each checker judges one object (or correlates a group of objects) and
//! reports findings as data. The [`ValidationEngine`] runs the fixed rule sets
//! per object kind over a [`ValidationContext`] and merges the results into an
//! [`IstioValidations`](meshcheck_common::IstioValidations) set.
//!
//! # Rule sets
//!
//! - Destination rules: [`NoDestinationChecker`], [`MeshWideMtlsChecker`]
//! - Virtual services: [`RouteChecker`], then [`SingleHostChecker`] across
//!   the namespace and the virtual services exported to it

#![deny(missing_docs)]

pub mod checker;
pub mod context;
pub mod destination_rules;
pub mod engine;
pub mod snapshot;
pub mod virtual_services;

#[cfg(test)]
mod fixtures;

pub use checker::{Checker, ObjectChecker};
pub use context::{MtlsDetails, ValidationContext};
pub use destination_rules::{DestinationRulesChecker, MeshWideMtlsChecker, NoDestinationChecker};
pub use engine::ValidationEngine;
pub use snapshot::Snapshot;
pub use virtual_services::{RouteChecker, SingleHostChecker, VirtualServiceChecker};
