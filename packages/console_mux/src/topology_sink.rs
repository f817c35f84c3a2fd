//! Replace-semantics topology cache feeding the graph renderer.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::topology::{Link, Node, TopologySnapshot};

/// The node/link set a graph renderer draws. Every link references two nodes
/// of the same view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphView {
    pub self_id: Option<String>,
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
}

impl GraphView {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

pub struct TopologySink {
    view: Arc<GraphView>,
    revision: u64,
}

impl TopologySink {
    pub fn new() -> Self {
        Self {
            view: Arc::new(GraphView::default()),
            revision: 0,
        }
    }

    /// Replace the whole view with a sanitized copy of `snapshot`.
    ///
    /// Links whose endpoints are not both present in `snapshot.nodes` are
    /// dropped. Returns how many were dropped.
    pub fn apply(&mut self, snapshot: TopologySnapshot) -> usize {
        let TopologySnapshot {
            self_id,
            nodes,
            links,
        } = snapshot;

        let total = links.len();
        let links: Vec<Link> = {
            let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
            links
                .into_iter()
                .filter(|l| ids.contains(l.source.as_str()) && ids.contains(l.target.as_str()))
                .collect()
        };
        let dropped = total - links.len();
        if dropped > 0 {
            debug!(dropped, "dropped links referencing unknown nodes");
        }

        // Built fully before the swap; readers see either the old view or this one.
        self.view = Arc::new(GraphView {
            self_id,
            nodes,
            links,
        });
        self.revision += 1;
        dropped
    }

    /// Cheap handle to the current view. Later `apply` calls do not mutate it.
    pub fn view(&self) -> Arc<GraphView> {
        Arc::clone(&self.view)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn reset(&mut self) {
        self.view = Arc::new(GraphView::default());
        self.revision += 1;
    }
}

impl Default for TopologySink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(nodes: &[&str], links: &[(&str, &str)]) -> TopologySnapshot {
        TopologySnapshot {
            self_id: None,
            nodes: nodes.iter().map(|id| Node::new(*id, 1.0)).collect(),
            links: links.iter().map(|(s, t)| Link::new(*s, *t)).collect(),
        }
    }

    #[test]
    fn drops_links_to_missing_nodes() {
        let mut sink = TopologySink::new();
        let dropped = sink.apply(snapshot(&["A", "B", "C"], &[("A", "B"), ("A", "Z")]));

        let view = sink.view();
        assert_eq!(dropped, 1);
        assert_eq!(view.links, vec![Link::new("A", "B")]);
        assert_eq!(view.nodes.len(), 3);
        assert!(view.node("Z").is_none());
    }

    #[test]
    fn drops_links_with_missing_source() {
        let mut sink = TopologySink::new();
        sink.apply(snapshot(&["A"], &[("Q", "A"), ("A", "A")]));
        assert_eq!(sink.view().links, vec![Link::new("A", "A")]);
    }

    #[test]
    fn apply_replaces_wholesale() {
        let mut sink = TopologySink::new();
        sink.apply(snapshot(&["A", "B", "C"], &[("A", "B"), ("B", "C")]));
        sink.apply(snapshot(&["A", "D"], &[("A", "D")]));

        let view = sink.view();
        let ids: Vec<&str> = view.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "D"]);
        assert_eq!(view.links, vec![Link::new("A", "D")]);
    }

    #[test]
    fn held_view_is_not_mutated_by_apply() {
        let mut sink = TopologySink::new();
        sink.apply(snapshot(&["A", "B"], &[("A", "B")]));
        let before = sink.view();

        sink.apply(snapshot(&["C"], &[]));

        assert_eq!(before.nodes.len(), 2);
        assert_eq!(before.links.len(), 1);
        assert_eq!(sink.view().nodes.len(), 1);
    }

    #[test]
    fn revision_and_reset() {
        let mut sink = TopologySink::new();
        assert_eq!(sink.revision(), 0);
        sink.apply(snapshot(&["A"], &[]));
        assert_eq!(sink.revision(), 1);
        sink.reset();
        assert_eq!(sink.revision(), 2);
        assert_eq!(*sink.view(), GraphView::default());
    }
}
