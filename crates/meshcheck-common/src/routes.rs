//! Traversal of virtual-service route blocks
//!
//! A virtual service declares `http`, `tcp` and `tls` blocks, each with a
//! `route` list of weighted destinations. Entries of the wrong shape are
//! skipped but keep their index so finding paths point at the right element.

use serde_json::Value;
use tracing::debug;

use crate::mesh::ROUTE_PROTOCOLS;
use crate::object::{array_field, number_field, object_field, ConfigObject, Lookup};

/// One weighted destination inside a route block
#[derive(Clone, Debug, PartialEq)]
pub struct RouteDestination<'a> {
    /// Index inside the block's `route` list
    pub index: usize,
    /// `destination.host`
    pub host: Option<&'a str>,
    /// `destination.subset`
    pub subset: Option<&'a str>,
    /// `weight`
    pub weight: Lookup<f64>,
}

/// One `http`/`tcp`/`tls` block
#[derive(Clone, Debug)]
pub struct RouteBlock<'a> {
    /// Protocol key the block was declared under
    pub protocol: &'static str,
    /// Index inside the protocol list
    pub index: usize,
    /// Raw block, for protocol-specific fields (timeout, fault, ...)
    pub spec: &'a Value,
    /// Destinations of the block's `route` list
    pub destinations: Vec<RouteDestination<'a>>,
}

impl<'a> RouteBlock<'a> {
    /// Path of this block inside the object, e.g. `spec/http[0]`
    pub fn path(&self) -> String {
        format!("spec/{}[{}]", self.protocol, self.index)
    }
}

/// Route blocks of one protocol
pub fn blocks_for<'a>(vs: &'a ConfigObject, protocol: &'static str) -> Vec<RouteBlock<'a>> {
    let blocks = match vs.spec_array(protocol) {
        Lookup::Found(blocks) => blocks,
        Lookup::Absent => return Vec::new(),
        Lookup::Malformed => {
            debug!(
                name = %vs.name(),
                namespace = %vs.namespace(),
                protocol,
                "skipping malformed route list"
            );
            return Vec::new();
        }
    };

    blocks
        .iter()
        .enumerate()
        .filter(|(_, block)| block.is_object())
        .map(|(index, block)| RouteBlock {
            protocol,
            index,
            spec: block,
            destinations: destinations(block),
        })
        .collect()
}

/// Route blocks of every protocol, `http` first, then `tcp`, then `tls`
pub fn route_blocks(vs: &ConfigObject) -> Vec<RouteBlock<'_>> {
    ROUTE_PROTOCOLS
        .iter()
        .flat_map(|protocol| blocks_for(vs, protocol))
        .collect()
}

fn destinations(block: &Value) -> Vec<RouteDestination<'_>> {
    let Some(routes) = array_field(block, "route").ok() else {
        return Vec::new();
    };

    routes
        .iter()
        .enumerate()
        .filter(|(_, route)| route.is_object())
        .map(|(index, route)| {
            let destination = object_field(route, "destination").ok();
            let field = |key: &str| {
                destination
                    .and_then(|d| d.get(key))
                    .and_then(Value::as_str)
            };
            RouteDestination {
                index,
                host: field("host"),
                subset: field("subset"),
                weight: number_field(route, "weight"),
            }
        })
        .collect()
}

/// Whether a block sets a field (e.g. `timeout`, `fault`)
pub fn block_has(block: &RouteBlock<'_>, key: &str) -> bool {
    block.spec.get(key).is_some_and(|value| !value.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjectMeta, ObjectType};
    use serde_json::json;

    fn vs(spec: Value) -> ConfigObject {
        ConfigObject::new(
            ObjectType::VirtualService,
            ObjectMeta::new("reviews", "bookinfo"),
            spec,
        )
    }

    #[test]
    fn test_blocks_in_protocol_order() {
        let vs = vs(json!({
            "tls": [{"route": [{"destination": {"host": "a"}}]}],
            "http": [{"route": [{"destination": {"host": "b", "subset": "v1"}, "weight": 45}]}],
            "tcp": [{"route": [{"destination": {"host": "c"}}]}]
        }));
        let blocks = route_blocks(&vs);
        let protocols: Vec<_> = blocks.iter().map(|b| b.protocol).collect();
        assert_eq!(protocols, vec!["http", "tcp", "tls"]);

        let http = &blocks[0].destinations[0];
        assert_eq!(http.host, Some("b"));
        assert_eq!(http.subset, Some("v1"));
        assert_eq!(http.weight, Lookup::Found(45.0));
        assert_eq!(blocks[1].destinations[0].weight, Lookup::Absent);
    }

    #[test]
    fn test_malformed_entries_keep_indices() {
        let vs = vs(json!({
            "http": [
                "garbage",
                {"route": ["garbage", {"destination": {"host": "reviews"}}]}
            ]
        }));
        let blocks = route_blocks(&vs);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].index, 1);
        assert_eq!(blocks[0].path(), "spec/http[1]");
        assert_eq!(blocks[0].destinations.len(), 1);
        assert_eq!(blocks[0].destinations[0].index, 1);
    }

    #[test]
    fn test_malformed_protocol_list_is_skipped() {
        let vs = vs(json!({"http": {"route": []}}));
        assert!(route_blocks(&vs).is_empty());
    }

    #[test]
    fn test_block_has() {
        let vs = vs(json!({"http": [{"timeout": "2s", "route": []}]}));
        let blocks = route_blocks(&vs);
        assert!(block_has(&blocks[0], "timeout"));
        assert!(!block_has(&blocks[0], "fault"));
    }
}
