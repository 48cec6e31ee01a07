//! Generic Istio configuration objects
//!
//! Istio specs are navigated untyped: schema validation happens upstream and
//! the checkers only look at the few fields each rule needs. All downcasting
//! goes through [`Lookup`] so a field of the wrong shape is reported as
//! [`Lookup::Malformed`] instead of failing the whole check pass.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::labels::Labels;
use crate::models::IstioValidationKey;

// =============================================================================
// Object Types
// =============================================================================

/// Kinds of Istio configuration objects the engine understands
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    /// networking.istio.io VirtualService
    VirtualService,
    /// networking.istio.io DestinationRule
    DestinationRule,
    /// networking.istio.io Gateway
    Gateway,
    /// networking.istio.io ServiceEntry
    ServiceEntry,
    /// security.istio.io PeerAuthentication
    PeerAuthentication,
}

impl ObjectType {
    /// Stable lowercase name used in validation keys
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::VirtualService => "virtualservice",
            ObjectType::DestinationRule => "destinationrule",
            ObjectType::Gateway => "gateway",
            ObjectType::ServiceEntry => "serviceentry",
            ObjectType::PeerAuthentication => "peerauthentication",
        }
    }

    /// Map a manifest `kind` to an object type
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "VirtualService" => Some(ObjectType::VirtualService),
            "DestinationRule" => Some(ObjectType::DestinationRule),
            "Gateway" => Some(ObjectType::Gateway),
            "ServiceEntry" => Some(ObjectType::ServiceEntry),
            "PeerAuthentication" => Some(ObjectType::PeerAuthentication),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Field Lookups
// =============================================================================

/// Outcome of reading one field out of an untyped spec
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Lookup<T> {
    /// The field exists and has the expected shape
    Found(T),
    /// The field is not set
    Absent,
    /// The field is set but has an unexpected shape
    Malformed,
}

impl<T> Lookup<T> {
    /// Convert to an `Option`, folding absent and malformed together
    pub fn ok(self) -> Option<T> {
        match self {
            Lookup::Found(v) => Some(v),
            Lookup::Absent | Lookup::Malformed => None,
        }
    }
}

fn lookup<'a, T>(
    parent: &'a Value,
    key: &str,
    cast: impl FnOnce(&'a Value) -> Option<T>,
) -> Lookup<T> {
    match parent.get(key) {
        None | Some(Value::Null) => Lookup::Absent,
        Some(v) => cast(v).map_or(Lookup::Malformed, Lookup::Found),
    }
}

/// Read a string field
pub fn str_field<'a>(parent: &'a Value, key: &str) -> Lookup<&'a str> {
    lookup(parent, key, Value::as_str)
}

/// Read an array field
pub fn array_field<'a>(parent: &'a Value, key: &str) -> Lookup<&'a Vec<Value>> {
    lookup(parent, key, Value::as_array)
}

/// Read an object field
pub fn object_field<'a>(parent: &'a Value, key: &str) -> Lookup<&'a Map<String, Value>> {
    lookup(parent, key, Value::as_object)
}

/// Read a numeric field as `f64`
pub fn number_field(parent: &Value, key: &str) -> Lookup<f64> {
    lookup(parent, key, Value::as_f64)
}

/// Read an array of strings, skipping non-string entries
pub fn string_list(parent: &Value, key: &str) -> Lookup<Vec<String>> {
    match array_field(parent, key) {
        Lookup::Found(items) => Lookup::Found(
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
        ),
        Lookup::Absent => Lookup::Absent,
        Lookup::Malformed => Lookup::Malformed,
    }
}

/// Walk a path of object keys
pub fn path<'a>(parent: &'a Value, keys: &[&str]) -> Lookup<&'a Value> {
    let mut current = parent;
    for key in keys {
        if current.is_null() {
            return Lookup::Absent;
        }
        if !current.is_object() {
            return Lookup::Malformed;
        }
        match current.get(*key) {
            None | Some(Value::Null) => return Lookup::Absent,
            Some(next) => current = next,
        }
    }
    Lookup::Found(current)
}

// =============================================================================
// Config Object
// =============================================================================

/// Identity metadata of a configuration object
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name
    pub name: String,
    /// Resource namespace
    pub namespace: String,
    /// Cluster the object was read from
    pub cluster: String,
    /// Labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,
}

impl ObjectMeta {
    /// Create metadata for an object
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            cluster: String::new(),
            labels: Labels::new(),
        }
    }

    /// Set the cluster
    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self
    }
}

/// An Istio configuration object with an untyped spec
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConfigObject {
    /// Kind of object
    #[serde(rename = "objectType")]
    pub object_type: ObjectType,
    /// Identity metadata
    pub metadata: ObjectMeta,
    /// Spec tree as written by the user
    pub spec: Value,
}

impl ConfigObject {
    /// Create a config object
    pub fn new(object_type: ObjectType, metadata: ObjectMeta, spec: Value) -> Self {
        Self {
            object_type,
            metadata,
            spec,
        }
    }

    /// Object name
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Object namespace
    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// Object cluster
    pub fn cluster(&self) -> &str {
        &self.metadata.cluster
    }

    /// Read a top-level string field of the spec
    pub fn spec_str(&self, key: &str) -> Lookup<&str> {
        str_field(&self.spec, key)
    }

    /// Read a top-level array field of the spec
    pub fn spec_array(&self, key: &str) -> Lookup<&Vec<Value>> {
        array_field(&self.spec, key)
    }

    /// Read a top-level string list of the spec
    pub fn spec_strings(&self, key: &str) -> Lookup<Vec<String>> {
        string_list(&self.spec, key)
    }

    /// Walk a path of keys inside the spec
    pub fn spec_path(&self, keys: &[&str]) -> Lookup<&Value> {
        path(&self.spec, keys)
    }

    /// Identity of this object in a validation set
    pub fn key(&self) -> IstioValidationKey {
        IstioValidationKey::new(self.object_type, self.namespace(), self.name())
    }
}
