//! Canonical topology model and wire-shape normalization.
//!
//! Backends speak one of two shapes on the `topo` channel:
//!
//! ```text
//! graph (current):  {"nodes": [{"id","name","val","color"?}], "links": [{"source","target","color"?}]}
//! routing table:    {"id": "A", "table": {"B": {"cost": 1, ...}, ...}}
//! ```
//!
//! Both are detected explicitly at the boundary and normalized into
//! [`TopologySnapshot`]. Nothing downstream of [`TopologySnapshot::from_wire`]
//! ever sees the routing-table shape.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DecodeError;

/// Weight given to the table owner when normalizing the routing-table shape.
pub const SELF_NODE_WEIGHT: f64 = 10.0;
/// Weight given to every destination of a routing table.
pub const PEER_NODE_WEIGHT: f64 = 5.0;

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    #[serde(rename = "val")]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<String>, weight: f64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            weight,
            color: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Link {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            color: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// One complete topology update in canonical form.
///
/// `self_id` is only known for the routing-table shape; graph-shaped payloads
/// describe the whole network and have no owner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopologySnapshot {
    pub self_id: Option<String>,
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
}

/// Which wire shape a `topo` payload uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireShape {
    Graph,
    RoutingTable,
}

impl WireShape {
    /// Feature-detect the shape of a raw payload.
    ///
    /// A `nodes` array wins over everything else; otherwise an `id` plus a
    /// `table` object is the routing-table shape.
    pub fn detect(data: &Value) -> Option<Self> {
        let obj = data.as_object()?;
        if obj.get("nodes").is_some_and(Value::is_array) {
            return Some(Self::Graph);
        }
        if obj.contains_key("id") && obj.get("table").is_some_and(Value::is_object) {
            return Some(Self::RoutingTable);
        }
        None
    }
}

#[derive(Deserialize)]
struct WireNode {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default = "default_weight")]
    val: f64,
    #[serde(default)]
    color: Option<String>,
}

impl From<WireNode> for Node {
    fn from(w: WireNode) -> Self {
        Self {
            name: w.name.unwrap_or_else(|| w.id.clone()),
            id: w.id,
            weight: w.val,
            color: w.color,
        }
    }
}

#[derive(Deserialize)]
struct WireGraph {
    nodes: Vec<WireNode>,
    #[serde(default)]
    links: Vec<Link>,
}

/// Routing-table payload: the owner's id and one entry per known destination.
///
/// Entry values are opaque cost information and are not interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingTableTopology {
    pub id: String,
    pub table: BTreeMap<String, Value>,
}

impl RoutingTableTopology {
    /// Self node plus one node and one `self -> dest` link per table key.
    /// The owner's own row (cost 0) is skipped.
    pub fn normalize(self) -> TopologySnapshot {
        let mut nodes = Vec::with_capacity(self.table.len() + 1);
        let mut links = Vec::with_capacity(self.table.len());

        nodes.push(
            Node::new(self.id.clone(), SELF_NODE_WEIGHT).with_name(format!("{} (Me)", self.id)),
        );

        for dest in self.table.into_keys() {
            if dest == self.id {
                continue;
            }
            links.push(Link::new(self.id.clone(), dest.clone()));
            nodes.push(Node::new(dest, PEER_NODE_WEIGHT));
        }

        TopologySnapshot {
            self_id: Some(self.id),
            nodes,
            links,
        }
    }
}

impl TopologySnapshot {
    /// Normalize a raw `topo` payload of either shape.
    pub fn from_wire(data: Value) -> Result<Self, DecodeError> {
        match WireShape::detect(&data) {
            Some(WireShape::Graph) => {
                let graph: WireGraph = serde_json::from_value(data)?;
                Ok(Self {
                    self_id: None,
                    nodes: graph.nodes.into_iter().map(Node::from).collect(),
                    links: graph.links,
                })
            }
            Some(WireShape::RoutingTable) => {
                let table: RoutingTableTopology = serde_json::from_value(data)?;
                Ok(table.normalize())
            }
            None => Err(DecodeError::UnknownTopologyShape),
        }
    }

    /// Serialize in the graph shape.
    pub fn to_wire(&self) -> Value {
        serde_json::json!({
            "nodes": self.nodes,
            "links": self.links,
        })
    }

    pub fn node_ids(&self) -> HashSet<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detect_graph_shape() {
        let data = json!({"nodes": [], "links": []});
        assert_eq!(WireShape::detect(&data), Some(WireShape::Graph));
    }

    #[test]
    fn detect_routing_table_shape() {
        let data = json!({"id": "A", "table": {}});
        assert_eq!(WireShape::detect(&data), Some(WireShape::RoutingTable));
    }

    #[test]
    fn detect_rejects_other_shapes() {
        assert_eq!(WireShape::detect(&json!("text")), None);
        assert_eq!(WireShape::detect(&json!({"id": "A"})), None);
        assert_eq!(WireShape::detect(&json!({"id": "A", "table": []})), None);
        assert_eq!(WireShape::detect(&json!({"nodes": {}})), None);
    }

    #[test]
    fn graph_shape_defaults() {
        let snap = TopologySnapshot::from_wire(json!({
            "nodes": [{"id": "A"}, {"id": "B", "name": "Bravo", "val": 10, "color": "#4CAF50"}]
        }))
        .unwrap();

        assert_eq!(snap.self_id, None);
        assert_eq!(snap.nodes[0].name, "A");
        assert_eq!(snap.nodes[0].weight, 1.0);
        assert_eq!(snap.nodes[0].color, None);
        assert_eq!(snap.nodes[1].name, "Bravo");
        assert_eq!(snap.nodes[1].weight, 10.0);
        assert_eq!(snap.nodes[1].color.as_deref(), Some("#4CAF50"));
        assert!(snap.links.is_empty());
    }

    #[test]
    fn graph_shape_links_keep_color() {
        let snap = TopologySnapshot::from_wire(json!({
            "nodes": [{"id": "A"}, {"id": "B"}],
            "links": [{"source": "A", "target": "B", "color": "#FFF"}]
        }))
        .unwrap();
        assert_eq!(snap.links, vec![Link::new("A", "B").with_color("#FFF")]);
    }

    #[test]
    fn routing_table_normalizes_to_self_plus_peers() {
        let snap = TopologySnapshot::from_wire(json!({
            "id": "A",
            "table": {"B": {"cost": 1, "next_hop": "B"}}
        }))
        .unwrap();

        assert_eq!(snap.self_id.as_deref(), Some("A"));
        let ids: Vec<&str> = snap.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert_eq!(snap.nodes[0].name, "A (Me)");
        assert_eq!(snap.nodes[0].weight, SELF_NODE_WEIGHT);
        assert_eq!(snap.nodes[1].weight, PEER_NODE_WEIGHT);
        assert_eq!(snap.links, vec![Link::new("A", "B")]);
    }

    #[test]
    fn routing_table_skips_own_row() {
        let snap = TopologySnapshot::from_wire(json!({
            "id": "A",
            "table": {
                "A": {"cost": 0, "next_hop_port": "LOCAL"},
                "C": {"cost": 2},
                "B": {"cost": 1}
            },
            "neighbors": {}
        }))
        .unwrap();

        let ids: Vec<&str> = snap.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(snap.links.len(), 2);
        assert!(snap.links.iter().all(|l| l.source == "A"));
    }

    #[test]
    fn graph_shape_with_bad_node_is_decode_error() {
        let err = TopologySnapshot::from_wire(json!({"nodes": [{"name": "no id"}]})).unwrap_err();
        assert_eq!(err.error_code(), "invalid_json");
    }

    #[test]
    fn unknown_shape_is_decode_error() {
        let err = TopologySnapshot::from_wire(json!({"edges": []})).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownTopologyShape));
    }

    #[test]
    fn to_wire_uses_graph_shape() {
        let snap = TopologySnapshot {
            self_id: None,
            nodes: vec![Node::new("A", 10.0).with_color("#4CAF50")],
            links: vec![Link::new("A", "B")],
        };
        let wire = snap.to_wire();
        assert_eq!(wire["nodes"][0]["id"], "A");
        assert_eq!(wire["nodes"][0]["val"], 10.0);
        assert_eq!(wire["nodes"][0]["color"], "#4CAF50");
        assert!(wire["links"][0].get("color").is_none());

        let back = TopologySnapshot::from_wire(wire).unwrap();
        assert_eq!(back, snap);
    }
}
