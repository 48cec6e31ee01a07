//! Validation result model
//!
//! - [`IstioCheck`]: one finding (message key, severity, path inside the spec)
//! - [`IstioValidation`]: every finding attached to one object, its validity
//!   and the other objects implicated with it
//! - [`IstioValidations`]: the keyed validation set produced by a check pass
//!
//! Message keys form a closed vocabulary ([`MessageKey`]); consumers match on
//! them rather than on display text.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::object::ObjectType;

// =============================================================================
// Severity and Message Keys
// =============================================================================

/// Severity of a finding
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The object is broken; traffic will not behave as configured
    Error,
    /// Likely a mistake, but the platform accepts it
    Warning,
    /// Latent issue with no current effect
    Info,
}

/// Stable identifiers of every finding the engine can emit
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageKey {
    /// A destination rule enables mesh mTLS but no peer authentication governs it
    MeshPolicyMissing,
    /// A destination rule host has no matching service or registry entry
    NoDestMatchingRegistry,
    /// A subset's labels select no workload of the host's service
    NoDestSubsetLabels,
    /// A subset declares no labels
    NoDestSubsetNoLabels,
    /// A route block sends less than 100% of traffic to its only destination
    RouteSingleWeight,
    /// A route block names the same host and subset more than once
    RouteRepeatedSubset,
    /// Several virtual services declare the same host
    SingleHost,
}

impl MessageKey {
    /// Stable key string
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKey::MeshPolicyMissing => "destinationrules.mtls.meshpolicymissing",
            MessageKey::NoDestMatchingRegistry => "destinationrules.nodest.matchingregistry",
            MessageKey::NoDestSubsetLabels => "destinationrules.nodest.subsetlabels",
            MessageKey::NoDestSubsetNoLabels => "destinationrules.nodest.subsetnolabels",
            MessageKey::RouteSingleWeight => "virtualservices.route.singleweight",
            MessageKey::RouteRepeatedSubset => "virtualservices.route.repeatedsubset",
            MessageKey::SingleHost => "virtualservices.singlehost",
        }
    }

    /// Severity a finding with this key carries unless a checker overrides it
    pub fn default_severity(&self) -> Severity {
        match self {
            MessageKey::MeshPolicyMissing
            | MessageKey::NoDestMatchingRegistry
            | MessageKey::NoDestSubsetLabels => Severity::Error,
            MessageKey::NoDestSubsetNoLabels
            | MessageKey::RouteSingleWeight
            | MessageKey::RouteRepeatedSubset
            | MessageKey::SingleHost => Severity::Warning,
        }
    }

    /// Human readable description
    pub fn description(&self) -> &'static str {
        match self {
            MessageKey::MeshPolicyMissing => "PeerAuthentication enabling mTLS is missing",
            MessageKey::NoDestMatchingRegistry => {
                "This host has no matching entry in the service registry"
            }
            MessageKey::NoDestSubsetLabels => {
                "This subset's labels are not found in any matching host"
            }
            MessageKey::NoDestSubsetNoLabels => "This subset has no labels",
            MessageKey::RouteSingleWeight => "Weight sum should be 100",
            MessageKey::RouteRepeatedSubset => {
                "This subset is already referenced in another route destination"
            }
            MessageKey::SingleHost => "More than one Virtual Service for same host",
        }
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MessageKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// =============================================================================
// Findings
// =============================================================================

/// One finding attached to a location inside an object's spec
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct IstioCheck {
    /// Stable message key
    #[serde(rename = "code")]
    pub key: MessageKey,
    /// Human readable message
    pub message: &'static str,
    /// Severity
    pub severity: Severity,
    /// Path of the offending field, e.g. `spec/http[0]/route[1]/weight`
    pub path: String,
}

impl IstioCheck {
    /// Build a finding with the key's default severity
    pub fn build(key: MessageKey, path: impl Into<String>) -> Self {
        Self {
            key,
            message: key.description(),
            severity: key.default_severity(),
            path: path.into(),
        }
    }

    /// Override the severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

// =============================================================================
// Validations
// =============================================================================

/// Identity of a validated object: (type, namespace, name)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IstioValidationKey {
    /// Object type
    pub object_type: ObjectType,
    /// Namespace
    pub namespace: String,
    /// Name
    pub name: String,
}

impl IstioValidationKey {
    /// Create a key
    pub fn new(
        object_type: ObjectType,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            object_type,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for IstioValidationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.object_type, self.namespace, self.name)
    }
}

/// Findings, validity and cross-references of one object
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IstioValidation {
    /// Object name
    pub name: String,
    /// Object type
    pub object_type: ObjectType,
    /// False when any checker judged the object invalid
    pub valid: bool,
    /// Findings in emission order
    pub checks: Vec<IstioCheck>,
    /// Other objects implicated in a multi-object finding
    pub references: Vec<IstioValidationKey>,
}

impl IstioValidation {
    /// Create an empty, valid validation for a key
    pub fn new(key: &IstioValidationKey) -> Self {
        Self {
            name: key.name.clone(),
            object_type: key.object_type,
            valid: true,
            checks: Vec::new(),
            references: Vec::new(),
        }
    }

    /// Append checks that are not already present
    pub fn add_checks(&mut self, checks: impl IntoIterator<Item = IstioCheck>) {
        for check in checks {
            if !self.checks.contains(&check) {
                self.checks.push(check);
            }
        }
    }

    /// Append a reference if it is not already present
    pub fn add_reference(&mut self, reference: IstioValidationKey) {
        if !self.references.contains(&reference) {
            self.references.push(reference);
        }
    }

    /// Fold another validation of the same object into this one
    pub fn merge(&mut self, other: IstioValidation) {
        self.valid = self.valid && other.valid;
        self.add_checks(other.checks);
        for reference in other.references {
            self.add_reference(reference);
        }
    }

    /// Number of findings with the given severity
    pub fn count(&self, severity: Severity) -> usize {
        self.checks.iter().filter(|c| c.severity == severity).count()
    }
}

/// Error and warning totals over a validation set
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    /// Findings with Error severity
    pub errors: usize,
    /// Findings with Warning severity
    pub warnings: usize,
    /// Objects carrying a validation entry
    pub object_count: usize,
}

/// Validation set keyed by object identity
///
/// Backed by an ordered map so iteration and serialization are stable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IstioValidations(BTreeMap<IstioValidationKey, IstioValidation>);

impl IstioValidations {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one checker's findings and verdict for an object.
    ///
    /// A valid verdict with no findings leaves no trace: absence of a key
    /// means the object has nothing to report.
    pub fn add_checks(&mut self, key: &IstioValidationKey, checks: Vec<IstioCheck>, valid: bool) {
        if checks.is_empty() && valid {
            return;
        }
        let entry = self.entry(key);
        entry.valid = entry.valid && valid;
        entry.add_checks(checks);
    }

    /// Get or create the entry for a key
    pub fn entry(&mut self, key: &IstioValidationKey) -> &mut IstioValidation {
        self.0
            .entry(key.clone())
            .or_insert_with(|| IstioValidation::new(key))
    }

    /// Merge another set into this one
    pub fn merge(&mut self, other: IstioValidations) {
        for (key, validation) in other.0 {
            match self.0.get_mut(&key) {
                Some(existing) => existing.merge(validation),
                None => {
                    self.0.insert(key, validation);
                }
            }
        }
    }

    /// Whether an object has a validation entry
    pub fn contains_key(&self, key: &IstioValidationKey) -> bool {
        self.0.contains_key(key)
    }

    /// Number of objects with an entry
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no object has an entry
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&IstioValidationKey, &IstioValidation)> {
        self.0.iter()
    }

    /// Totals over the whole set
    pub fn summary(&self) -> ValidationSummary {
        summarize(self.0.values())
    }

    /// Totals over one namespace
    pub fn summary_for(&self, namespace: &str) -> ValidationSummary {
        summarize(
            self.iter()
                .filter(|(k, _)| k.namespace == namespace)
                .map(|(_, v)| v),
        )
    }
}

fn summarize<'a>(validations: impl Iterator<Item = &'a IstioValidation>) -> ValidationSummary {
    validations.fold(ValidationSummary::default(), |mut acc, v| {
        acc.errors += v.count(Severity::Error);
        acc.warnings += v.count(Severity::Warning);
        acc.object_count += 1;
        acc
    })
}

impl Index<&IstioValidationKey> for IstioValidations {
    type Output = IstioValidation;

    fn index(&self, key: &IstioValidationKey) -> &Self::Output {
        &self.0[key]
    }
}

/// Serialized as `{ objectType: { "namespace/name": validation } }`
impl Serialize for IstioValidations {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut nested: BTreeMap<&str, BTreeMap<String, &IstioValidation>> = BTreeMap::new();
        for (key, validation) in self.iter() {
            nested
                .entry(key.object_type.as_str())
                .or_default()
                .insert(format!("{}/{}", key.namespace, key.name), validation);
        }
        let mut map = serializer.serialize_map(Some(nested.len()))?;
        for (object_type, entries) in &nested {
            map.serialize_entry(object_type, entries)?;
        }
        map.end()
    }
}
