//! Checker traits
//!
//! A checker is a value holding borrowed inputs. Single-object checkers judge
//! one object and report findings plus a verdict; object checkers correlate a
//! group of objects and report a whole validation set.

use meshcheck_common::{IstioCheck, IstioValidations};

/// A check over one configuration object
pub trait Checker: Send + Sync {
    /// Findings and whether the object is valid as far as this checker can tell
    fn check(&self) -> (Vec<IstioCheck>, bool);
}

/// A check correlating several configuration objects
pub trait ObjectChecker {
    /// Findings for every object implicated
    fn check(&self) -> IstioValidations;
}
