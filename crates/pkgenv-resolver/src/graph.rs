//! Provenance graph: why each package was added, narrowed, or rejected.
//!
//! Nodes are request or package labels (`foo-1+`, `!bar-3`, `foo-1.2`), each
//! tagged with the family it constrains. Edges are typed and only used for
//! diagnostics, cycle detection and ordering.

use std::collections::HashMap;
use std::fmt::{self, Write};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

/// Label of the synthetic node every top-level request hangs from.
pub const ROOT_LABEL: &str = "<root>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// A package (or the root) requires a request.
    Requires,
    /// A request narrowed an existing node.
    Reduce,
    /// A range was pinned to a concrete version.
    Resolve,
    /// Two requests could not both be satisfied.
    Conflict,
    /// A request hoisted from, or a path confirmed by, a variant.
    Variant,
    /// Part of a dependency cycle.
    Cyclic,
    /// A requirement inferred from the earliest and latest candidates.
    Transitive,
}

impl EdgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Requires => "requires",
            EdgeKind::Reduce => "reduce",
            EdgeKind::Resolve => "resolve",
            EdgeKind::Conflict => "conflict",
            EdgeKind::Variant => "variant",
            EdgeKind::Cyclic => "cyclic",
            EdgeKind::Transitive => "transitive",
        }
    }

    /// Edges that make their source depend on their target's family.
    pub fn is_dependency(self) -> bool {
        matches!(self, EdgeKind::Requires | EdgeKind::Variant)
    }

    fn dot_style(self) -> &'static str {
        match self {
            EdgeKind::Requires => "",
            EdgeKind::Reduce => ", style=dashed",
            EdgeKind::Resolve => ", style=bold",
            EdgeKind::Conflict => ", color=red",
            EdgeKind::Variant => ", color=blue",
            EdgeKind::Cyclic => ", color=red, style=bold",
            EdgeKind::Transitive => ", style=dotted",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct GraphNode {
    label: String,
    /// Family a non-anti node constrains; `None` for the root and anti requests.
    family: Option<String>,
    /// Added by transitive inference rather than by a declared requirement.
    inferred: bool,
}

/// Family constrained by a non-anti label (`foo-1+` -> `foo`).
fn family_of(label: &str) -> Option<&str> {
    if label == ROOT_LABEL || label.starts_with('!') {
        return None;
    }
    label.split('-').next()
}

/// A typed diagnostic graph backed by petgraph.
#[derive(Debug, Clone, Default)]
pub struct ProvenanceGraph {
    graph: DiGraph<GraphNode, EdgeKind>,
    /// Lookup from label to node index.
    index: HashMap<String, NodeIndex>,
}

impl ProvenanceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or retrieve a node by label.
    pub fn add_node(&mut self, label: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(label) {
            return idx;
        }
        let idx = self.graph.add_node(GraphNode {
            label: label.to_string(),
            family: family_of(label).map(str::to_string),
            inferred: false,
        });
        self.index.insert(label.to_string(), idx);
        idx
    }

    /// Add a typed edge; the same edge is never added twice.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, kind: EdgeKind) {
        if !self
            .graph
            .edges(from)
            .any(|e| e.target() == to && *e.weight() == kind)
        {
            self.graph.add_edge(from, to, kind);
        }
    }

    /// Add both labels if needed and connect them. Self-edges are skipped.
    pub fn link(&mut self, from: &str, to: &str, kind: EdgeKind) {
        let from = self.add_node(from);
        let to = self.add_node(to);
        if from != to {
            self.add_edge(from, to, kind);
        }
    }

    /// Flag a node as introduced by transitive inference.
    pub fn mark_inferred(&mut self, label: &str) {
        let idx = self.add_node(label);
        self.graph[idx].inferred = true;
    }

    pub fn is_inferred(&self, label: &str) -> bool {
        self.find(label).is_some_and(|idx| self.graph[idx].inferred)
    }

    pub fn find(&self, label: &str) -> Option<NodeIndex> {
        self.index.get(label).copied()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    pub fn label(&self, idx: NodeIndex) -> &str {
        &self.graph[idx].label
    }

    /// Every edge as `(from, to, kind)`, in insertion order.
    pub fn edges(&self) -> Vec<(&str, &str, EdgeKind)> {
        self.graph
            .edge_references()
            .map(|e| {
                (
                    self.graph[e.source()].label.as_str(),
                    self.graph[e.target()].label.as_str(),
                    *e.weight(),
                )
            })
            .collect()
    }

    pub fn has_edge(&self, from: &str, to: &str, kind: EdgeKind) -> bool {
        let (Some(from), Some(to)) = (self.find(from), self.find(to)) else {
            return false;
        };
        self.graph
            .edges_directed(from, Direction::Outgoing)
            .any(|e| e.target() == to && *e.weight() == kind)
    }

    /// Family-level dependency edges `(dependent, dependency)`, deduplicated,
    /// self-edges dropped.
    pub fn family_dependencies(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = Vec::new();
        for e in self.graph.edge_references() {
            if !e.weight().is_dependency() {
                continue;
            }
            let (Some(from), Some(to)) = (
                &self.graph[e.source()].family,
                &self.graph[e.target()].family,
            ) else {
                continue;
            };
            if from != to && !out.iter().any(|(a, b)| a == from && b == to) {
                out.push((from.clone(), to.clone()));
            }
        }
        out
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Render as Graphviz dot text.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph provenance {\n");
        out.push_str("    node [shape=box, fontsize=10];\n");
        for idx in self.graph.node_indices() {
            let node = &self.graph[idx];
            let shape = if node.label == ROOT_LABEL {
                " [shape=ellipse]"
            } else if node.label.starts_with('!') {
                " [style=filled, fillcolor=mistyrose]"
            } else if node.inferred {
                " [style=dashed]"
            } else {
                ""
            };
            let _ = writeln!(out, "    \"{}\"{shape};", escape(&node.label));
        }
        for e in self.graph.edge_references() {
            let kind = *e.weight();
            let _ = writeln!(
                out,
                "    \"{}\" -> \"{}\" [label=\"{kind}\"{}];",
                escape(&self.graph[e.source()].label),
                escape(&self.graph[e.target()].label),
                kind.dot_style()
            );
        }
        out.push_str("}\n");
        out
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_find() {
        let mut g = ProvenanceGraph::new();
        let idx = g.add_node("foo-1");
        assert_eq!(g.find("foo-1"), Some(idx));
        assert_eq!(g.label(idx), "foo-1");
        assert!(!g.contains("bar"));
    }

    #[test]
    fn duplicate_add_returns_same_index() {
        let mut g = ProvenanceGraph::new();
        let a = g.add_node("foo-1");
        let b = g.add_node("foo-1");
        assert_eq!(a, b);
        assert_eq!(g.node_count(), 1);
    }

    #[test]
    fn duplicate_edges_are_dropped_per_kind() {
        let mut g = ProvenanceGraph::new();
        g.link("a-1", "b", EdgeKind::Requires);
        g.link("a-1", "b", EdgeKind::Requires);
        g.link("a-1", "b", EdgeKind::Conflict);
        g.link("b", "b", EdgeKind::Reduce);
        assert_eq!(g.edge_count(), 2);
        assert!(g.has_edge("a-1", "b", EdgeKind::Conflict));
        assert!(!g.has_edge("b", "a-1", EdgeKind::Requires));
    }

    #[test]
    fn family_of_labels() {
        assert_eq!(family_of("foo-1.2+<2"), Some("foo"));
        assert_eq!(family_of("foo"), Some("foo"));
        assert_eq!(family_of("!foo-3"), None);
        assert_eq!(family_of(ROOT_LABEL), None);
    }

    #[test]
    fn family_dependencies_skip_root_anti_and_non_dependency_edges() {
        let mut g = ProvenanceGraph::new();
        g.link(ROOT_LABEL, "a-1", EdgeKind::Requires);
        g.link("a-1", "b-2+", EdgeKind::Requires);
        g.link("a-1", "!c-3", EdgeKind::Requires);
        g.link("b-2+", "b-2.1", EdgeKind::Resolve);
        g.link("b-2.1", "a-1", EdgeKind::Conflict);
        g.link("b-2.1", "d-1", EdgeKind::Variant);
        assert_eq!(
            g.family_dependencies(),
            vec![
                ("a".to_string(), "b".to_string()),
                ("b".to_string(), "d".to_string()),
            ]
        );
    }

    #[test]
    fn dot_output() {
        let mut g = ProvenanceGraph::new();
        g.link(ROOT_LABEL, "a-1", EdgeKind::Requires);
        g.link("a-1", "!b-2", EdgeKind::Conflict);
        let dot = g.to_dot();
        assert!(dot.starts_with("digraph provenance {"));
        assert!(dot.contains("\"<root>\" [shape=ellipse];"));
        assert!(dot.contains("\"<root>\" -> \"a-1\" [label=\"requires\"];"));
        assert!(dot.contains("\"a-1\" -> \"!b-2\" [label=\"conflict\", color=red];"));
        assert!(dot.contains("\"!b-2\" [style=filled, fillcolor=mistyrose];"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn inferred_nodes_render_dashed() {
        let mut g = ProvenanceGraph::new();
        g.link("a-1", "b-1+<3", EdgeKind::Transitive);
        g.mark_inferred("b-1+<3");
        assert!(g.is_inferred("b-1+<3"));
        assert!(!g.is_inferred("a-1"));
        assert!(!g.is_inferred("missing"));

        let dot = g.to_dot();
        assert!(dot.contains("\"b-1+<3\" [style=dashed];"));
        assert!(dot.contains("    \"a-1\";"));
    }
}
