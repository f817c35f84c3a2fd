//! Synthetic routed network behind the development backend.
//!
//! Nodes are named `A`, `B`, … and wired in a ring, with a chord from every
//! even node to the node opposite it. Every tick one node flips between up
//! and down. Routing is plain hop-count BFS over the nodes that are up.

use std::collections::{BTreeMap, HashMap, VecDeque};

use rand::Rng;
use serde_json::{Value, json};

pub const MAX_NODES: usize = 26;

const ACTIVE_COLOR: &str = "#4CAF50";
const INACTIVE_COLOR: &str = "#9E9E9E";
const LINK_COLOR: &str = "#FFF";
const ACTIVE_WEIGHT: u32 = 10;
const INACTIVE_WEIGHT: u32 = 5;
/// Ticks a node may stay down before it drops out of the topology payload.
/// Links from its neighbors keep pointing at it.
const STALE_TICKS: u32 = 3;

#[derive(Debug, Clone)]
struct SimNode {
    id: String,
    neighbors: Vec<usize>,
    up: bool,
    down_ticks: u32,
    queued: VecDeque<String>,
}

/// One row of a node's routing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub destination: String,
    pub cost: u32,
    pub next_hop: String,
    pub interface: String,
}

#[derive(Debug, Clone)]
pub struct Network {
    nodes: Vec<SimNode>,
    ticks: u64,
}

fn node_id(index: usize) -> String {
    char::from(b'A' + index as u8).to_string()
}

impl Network {
    /// `count` is clamped to `1..=26`.
    pub fn new(count: usize) -> Self {
        let count = count.clamp(1, MAX_NODES);
        let mut nodes: Vec<SimNode> = (0..count)
            .map(|i| SimNode {
                id: node_id(i),
                neighbors: Vec::new(),
                up: true,
                down_ticks: 0,
                queued: VecDeque::new(),
            })
            .collect();

        let mut connect = |a: usize, b: usize| {
            if a != b && !nodes[a].neighbors.contains(&b) {
                nodes[a].neighbors.push(b);
                nodes[b].neighbors.push(a);
            }
        };
        for i in 0..count {
            connect(i, (i + 1) % count);
        }
        if count >= 4 {
            for i in (0..count).step_by(2) {
                connect(i, (i + count / 2) % count);
            }
        }

        Self { nodes, ticks: 0 }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn index(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id.eq_ignore_ascii_case(id))
    }

    pub fn is_up(&self, id: &str) -> bool {
        self.index(id).is_some_and(|i| self.nodes[i].up)
    }

    /// Advance one tick: flip one random node. Returns the id that flipped.
    pub fn tick(&mut self, rng: &mut impl Rng) -> String {
        self.ticks += 1;
        for node in self.nodes.iter_mut().filter(|n| !n.up) {
            node.down_ticks += 1;
        }
        let i = rng.random_range(0..self.nodes.len());
        let node = &mut self.nodes[i];
        node.up = !node.up;
        node.down_ticks = 0;
        node.id.clone()
    }

    /// Shortest path from `from` to every reachable node, as predecessor links.
    fn bfs(&self, from: usize) -> HashMap<usize, usize> {
        let mut prev = HashMap::new();
        if !self.nodes[from].up {
            return prev;
        }
        prev.insert(from, from);
        let mut queue = VecDeque::from([from]);
        while let Some(at) = queue.pop_front() {
            for &next in &self.nodes[at].neighbors {
                if self.nodes[next].up && !prev.contains_key(&next) {
                    prev.insert(next, at);
                    queue.push_back(next);
                }
            }
        }
        prev
    }

    /// Hop-by-hop path `from → to`, both ends included. `None` when unreachable.
    pub fn path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let (from, to) = (self.index(from)?, self.index(to)?);
        let prev = self.bfs(from);
        if !prev.contains_key(&to) {
            return None;
        }
        let mut path = vec![to];
        let mut at = to;
        while at != from {
            at = prev[&at];
            path.push(at);
        }
        path.reverse();
        Some(path.into_iter().map(|i| self.nodes[i].id.clone()).collect())
    }

    /// Distance-vector view from `id`: one row per reachable node, self first.
    pub fn routing_table(&self, id: &str) -> Vec<Route> {
        let Some(from) = self.index(id) else {
            return Vec::new();
        };
        let mut routes: Vec<Route> = self
            .bfs(from)
            .keys()
            .filter_map(|&dest| {
                let path = self.path(&self.nodes[from].id, &self.nodes[dest].id)?;
                let (next_hop, interface) = match path.get(1) {
                    None => (self.nodes[from].id.clone(), "LOCAL".to_string()),
                    Some(hop) => {
                        let hop_index = self.index(hop)?;
                        let port = self.nodes[from]
                            .neighbors
                            .iter()
                            .position(|&n| n == hop_index)?;
                        (hop.clone(), format!("port{port}"))
                    }
                };
                Some(Route {
                    destination: self.nodes[dest].id.clone(),
                    cost: (path.len() - 1) as u32,
                    next_hop,
                    interface,
                })
            })
            .collect();
        routes.sort_by(|a, b| (a.cost, &a.destination).cmp(&(b.cost, &b.destination)));
        routes
    }

    /// Graph-shaped `topo` payload. Nodes that have been down for a while are
    /// left out; links are listed per node from its neighbor list.
    pub fn graph_payload(&self) -> Value {
        let nodes: Vec<Value> = self
            .nodes
            .iter()
            .filter(|n| n.up || n.down_ticks < STALE_TICKS)
            .map(|n| {
                let (val, color) = if n.up {
                    (ACTIVE_WEIGHT, ACTIVE_COLOR)
                } else {
                    (INACTIVE_WEIGHT, INACTIVE_COLOR)
                };
                json!({"id": n.id, "name": n.id, "val": val, "color": color})
            })
            .collect();

        let links: Vec<Value> = self
            .nodes
            .iter()
            .flat_map(|n| {
                n.neighbors.iter().map(move |&peer| {
                    json!({"source": n.id, "target": self.nodes[peer].id, "color": LINK_COLOR})
                })
            })
            .collect();

        json!({"nodes": nodes, "links": links})
    }

    /// Routing-table `topo` payload as reported by one node. The reporter
    /// rotates through the nodes that are up, one per tick.
    pub fn legacy_payload(&self) -> Option<Value> {
        let up: Vec<&SimNode> = self.nodes.iter().filter(|n| n.up).collect();
        if up.is_empty() {
            return None;
        }
        let reporter = up[(self.ticks as usize) % up.len()];
        let table: BTreeMap<String, Value> = self
            .routing_table(&reporter.id)
            .into_iter()
            .map(|r| {
                let entry = json!({
                    "cost": r.cost,
                    "next_hop": r.next_hop,
                    "interface": r.interface,
                });
                (r.destination, entry)
            })
            .collect();
        Some(json!({"id": reporter.id, "table": table}))
    }

    pub fn queue_command(&mut self, id: &str, command: String) -> usize {
        match self.index(id) {
            Some(i) => {
                self.nodes[i].queued.push_back(command);
                self.nodes[i].queued.len()
            }
            None => 0,
        }
    }

    /// Queue `command` on every node. Returns how many nodes got it.
    pub fn queue_broadcast(&mut self, command: &str) -> usize {
        for node in &mut self.nodes {
            node.queued.push_back(command.to_string());
        }
        self.nodes.len()
    }

    pub fn queued(&self, id: &str) -> usize {
        self.index(id).map_or(0, |i| self.nodes[i].queued.len())
    }

    pub fn ids(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    /// Everything queued for `id`, oldest first. Empty while the node is down.
    pub fn drain_commands(&mut self, id: &str) -> Vec<String> {
        match self.index(id) {
            Some(i) if self.nodes[i].up => self.nodes[i].queued.drain(..).collect(),
            _ => Vec::new(),
        }
    }

    /// Canonical id for a case-insensitive lookup.
    pub fn canonical_id(&self, id: &str) -> Option<String> {
        self.index(id).map(|i| self.nodes[i].id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    impl Network {
        pub(crate) fn set_up(&mut self, id: &str, up: bool) {
            if let Some(i) = self.index(id) {
                self.nodes[i].up = up;
                self.nodes[i].down_ticks = 0;
            }
        }
    }

    #[test]
    fn broadcast_queues_on_every_node() {
        let mut net = Network::new(4);
        net.set_up("B", false);
        assert_eq!(net.queue_broadcast("table"), 4);
        assert_eq!(net.queued("A"), 1);
        assert_eq!(net.queued("b"), 1);
        assert!(net.drain_commands("B").is_empty());
        assert_eq!(net.drain_commands("A"), vec!["table"]);
        assert_eq!(net.queued("A"), 0);
        assert_eq!(net.ids(), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn ring_with_chords() {
        let net = Network::new(6);
        assert_eq!(net.len(), 6);
        // A: ring neighbors B and F, chord to D.
        assert_eq!(net.path("A", "D").unwrap(), vec!["A", "D"]);
        assert_eq!(net.path("A", "C").unwrap().len(), 3);
        assert_eq!(net.path("A", "A").unwrap(), vec!["A"]);
    }

    #[test]
    fn node_count_is_clamped() {
        assert_eq!(Network::new(0).len(), 1);
        assert_eq!(Network::new(100).len(), MAX_NODES);
    }

    #[test]
    fn down_nodes_are_routed_around() {
        let mut net = Network::new(5);
        assert_eq!(net.path("A", "B").unwrap(), vec!["A", "B"]);
        net.set_up("B", false);
        let path = net.path("A", "C").unwrap();
        assert!(!path.contains(&"B".to_string()));
        assert!(net.path("A", "B").is_none());
    }

    #[test]
    fn routing_table_rows() {
        let net = Network::new(3);
        let table = net.routing_table("A");
        assert_eq!(
            table[0],
            Route {
                destination: "A".into(),
                cost: 0,
                next_hop: "A".into(),
                interface: "LOCAL".into(),
            }
        );
        assert_eq!(table.len(), 3);
        assert!(table[1..].iter().all(|r| r.cost == 1));
        assert!(net.routing_table("Q").is_empty());
    }

    #[test]
    fn tick_flips_one_node() {
        let mut net = Network::new(4);
        let mut rng = StdRng::seed_from_u64(7);
        let flipped = net.tick(&mut rng);
        assert!(!net.is_up(&flipped));
        assert_eq!(net.ticks(), 1);
    }

    #[test]
    fn graph_payload_shape() {
        let mut net = Network::new(4);
        net.set_up("C", false);
        let payload = net.graph_payload();
        let nodes = payload["nodes"].as_array().unwrap();
        assert_eq!(nodes.len(), 4);
        let c = nodes.iter().find(|n| n["id"] == "C").unwrap();
        assert_eq!(c["val"], 5);
        assert_eq!(c["color"], "#9E9E9E");
        let a = nodes.iter().find(|n| n["id"] == "A").unwrap();
        assert_eq!(a["val"], 10);
        assert_eq!(payload["links"][0]["color"], "#FFF");
    }

    #[test]
    fn stale_nodes_leave_dangling_links() {
        let mut net = Network::new(4);
        net.set_up("C", false);
        net.nodes[2].down_ticks = STALE_TICKS;
        let payload = net.graph_payload();
        let ids: Vec<&str> = payload["nodes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["id"].as_str().unwrap())
            .collect();
        assert!(!ids.contains(&"C"));
        let dangling = payload["links"]
            .as_array()
            .unwrap()
            .iter()
            .any(|l| l["target"] == "C");
        assert!(dangling);
    }

    #[test]
    fn legacy_payload_has_self_row() {
        let net = Network::new(3);
        let payload = net.legacy_payload().unwrap();
        assert_eq!(payload["id"], "A");
        assert_eq!(payload["table"]["A"]["cost"], 0);
        assert_eq!(payload["table"]["B"]["cost"], 1);
    }

    #[test]
    fn legacy_payload_none_when_all_down() {
        let mut net = Network::new(2);
        net.set_up("A", false);
        net.set_up("B", false);
        assert!(net.legacy_payload().is_none());
    }

    #[test]
    fn commands_wait_for_node() {
        let mut net = Network::new(3);
        net.set_up("B", false);
        assert_eq!(net.queue_command("b", "table".into()), 1);
        assert_eq!(net.queue_command("B", "ping A".into()), 2);
        assert!(net.drain_commands("B").is_empty());
        net.set_up("B", true);
        assert_eq!(net.drain_commands("B"), vec!["table", "ping A"]);
        assert_eq!(net.queue_command("Q", "table".into()), 0);
    }
}
