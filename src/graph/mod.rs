//! Typed semantic graph
//!
//! A [`Dag`] stores typed nodes in an arena addressed by [`DagIndex`], with
//! a string id → index map kept in insertion order. Edges are typed and
//! refer to their target by index only. Every insertion goes through
//! [`Dag::add_edge`], which enforces:
//! - both endpoints exist and are live
//! - the `(source type, target type, edge type)` triple is in the
//!   compatibility table (Hierarchical is always allowed)
//! - at most one edge per `(target, edge type)`
//! - no cycles along Hierarchical edges
//!
//! Removing a node tombstones its slot. Edges that pointed at it dangle and
//! are skipped by every algorithm; [`Dag::validate`] reports them.

mod analysis;
mod builder;
mod export;
mod rules;
mod types;

pub use analysis::{
    BridgingConcept, CentralityResult, CitationAnalysis, PaperStructure, SectionRole, Theme,
    ValidationReport,
};
pub use builder::{build_from_ast, citation_id, node_id, GraphBuilder, DOCUMENT_ID};
pub(crate) use builder::{citation_keys, reference_edge};
pub use export::{KnowledgeGraph, KnowledgeGraphEdge, KnowledgeGraphNode};
pub use rules::{allowed_edges, is_compatible, EdgeRule, RULES};
pub use types::{
    DagIndex, DagNode, Edge, EdgeEvent, EdgeFamily, EdgeType, IncomingEdge, NodeType, PathInfo,
    RelationshipMetadata, SemanticInfo,
};

use std::fmt;

use fxhash::FxHashSet;
use indexmap::IndexMap;
use tracing::debug;

use crate::core::ast::NodeId;
use crate::utils::error::EdgeRejection;

/// Receives notifications when typed relationships change.
pub trait RelationshipObserver {
    fn on_relationship_changed(
        &mut self,
        event: EdgeEvent,
        source: &DagNode,
        target: &DagNode,
        edge: EdgeType,
    );
}

/// The semantic graph.
#[derive(Default)]
pub struct Dag {
    nodes: Vec<Option<DagNode>>,
    index: IndexMap<String, DagIndex>,
    observers: Vec<Box<dyn RelationshipObserver>>,
}

impl fmt::Debug for Dag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dag")
            .field("nodes", &self.len())
            .field("edges", &self.edge_count())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Dag {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    /// Return the node with `id`, creating it if absent. An existing node
    /// keeps its type and content.
    pub fn add_node(
        &mut self,
        id: impl Into<String>,
        node_type: NodeType,
        content: impl Into<String>,
    ) -> DagIndex {
        let id = id.into();
        if let Some(existing) = self.index.get(&id) {
            return *existing;
        }
        let idx = DagIndex(self.nodes.len());
        self.nodes.push(Some(DagNode::new(id.clone(), node_type, content)));
        self.index.insert(id, idx);
        idx
    }

    /// Record which AST node a graph node came from.
    pub fn link_ast(&mut self, idx: DagIndex, ast: NodeId) {
        if let Some(node) = self.node_mut(idx) {
            node.ast_node = Some(ast);
        }
    }

    pub fn set_semantic(&mut self, idx: DagIndex, info: SemanticInfo) {
        if let Some(node) = self.node_mut(idx) {
            node.semantic = Some(info);
        }
    }

    /// Remove a node. Edges pointing at it are left dangling.
    pub fn remove_node(&mut self, id: &str) -> Option<DagNode> {
        let idx = self.index.shift_remove(id)?;
        self.nodes.get_mut(idx.0).and_then(Option::take)
    }

    pub fn node(&self, idx: DagIndex) -> Option<&DagNode> {
        self.nodes.get(idx.0).and_then(Option::as_ref)
    }

    pub fn node_mut(&mut self, idx: DagIndex) -> Option<&mut DagNode> {
        self.nodes.get_mut(idx.0).and_then(Option::as_mut)
    }

    pub fn lookup(&self, id: &str) -> Option<DagIndex> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&DagNode> {
        self.lookup(id).and_then(|idx| self.node(idx))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn id_of(&self, idx: DagIndex) -> Option<&str> {
        self.node(idx).map(|n| n.id.as_str())
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (DagIndex, &DagNode)> {
        self.index
            .values()
            .filter_map(move |idx| self.node(*idx).map(|n| (*idx, n)))
    }

    pub fn indices(&self) -> impl Iterator<Item = DagIndex> + '_ {
        self.nodes().map(|(idx, _)| idx)
    }

    /// Upper bound on slot indices, for dense per-node tables.
    pub(crate) fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn index_entries(&self) -> impl Iterator<Item = (&str, DagIndex)> {
        self.index.iter().map(|(k, v)| (k.as_str(), *v))
    }

    // =========================================================================
    // Edges
    // =========================================================================

    /// Outgoing edges whose target is still live.
    pub fn live_edges(&self, idx: DagIndex) -> impl Iterator<Item = &Edge> {
        self.node(idx)
            .map(|n| n.outgoing.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter(move |e| self.node(e.target).is_some())
    }

    /// Incoming edges whose source is still live.
    pub fn live_incoming(&self, idx: DagIndex) -> impl Iterator<Item = &IncomingEdge> {
        self.node(idx)
            .map(|n| n.incoming.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter(move |e| self.node(e.source).is_some())
    }

    pub fn hierarchical_children(&self, idx: DagIndex) -> impl Iterator<Item = DagIndex> + '_ {
        self.live_edges(idx)
            .filter(|e| e.edge_type.is_hierarchical())
            .map(|e| e.target)
    }

    pub fn edge_count(&self) -> usize {
        self.nodes().map(|(idx, _)| self.live_edges(idx).count()).sum()
    }

    pub fn has_edge(&self, source: DagIndex, target: DagIndex, edge_type: EdgeType) -> bool {
        self.node(source).map_or(false, |n| n.has_edge(target, edge_type))
    }

    fn live(&self, idx: DagIndex) -> Result<&DagNode, EdgeRejection> {
        match self.nodes.get(idx.0) {
            None => Err(EdgeRejection::UnknownNode(idx.to_string())),
            Some(None) => Err(EdgeRejection::RemovedNode(idx.to_string())),
            Some(Some(node)) => Ok(node),
        }
    }

    /// Insert a typed edge after checking every graph invariant.
    pub fn add_edge(
        &mut self,
        source: DagIndex,
        target: DagIndex,
        edge_type: EdgeType,
        label: Option<String>,
    ) -> Result<(), EdgeRejection> {
        let src = self.live(source)?;
        let tgt = self.live(target)?;
        if source == target {
            return Err(EdgeRejection::SelfLink(src.id.clone()));
        }
        if !is_compatible(src.node_type, tgt.node_type, edge_type) {
            return Err(EdgeRejection::Incompatible {
                source_type: src.node_type,
                target_type: tgt.node_type,
                edge: edge_type,
            });
        }
        if src.has_edge(target, edge_type) {
            return Err(EdgeRejection::Duplicate {
                source_id: src.id.clone(),
                target: tgt.id.clone(),
                edge: edge_type,
            });
        }
        if edge_type.is_hierarchical() && self.reaches_hierarchically(target, source) {
            return Err(EdgeRejection::Cycle {
                source_id: src.id.clone(),
                target: tgt.id.clone(),
            });
        }

        debug!(source = %src.id, target = %tgt.id, edge = %edge_type, "edge added");
        if let Some(node) = self.node_mut(source) {
            node.outgoing.push(Edge {
                target,
                edge_type,
                label: label.clone(),
            });
        }
        if let Some(node) = self.node_mut(target) {
            node.incoming.push(IncomingEdge {
                source,
                edge_type,
                label,
            });
        }
        self.notify(EdgeEvent::Added, source, target, edge_type);
        Ok(())
    }

    /// [`Dag::add_edge`] addressed by string ids.
    pub fn add_edge_by_id(
        &mut self,
        source: &str,
        target: &str,
        edge_type: EdgeType,
        label: Option<String>,
    ) -> Result<(), EdgeRejection> {
        let s = self
            .lookup(source)
            .ok_or_else(|| EdgeRejection::UnknownNode(source.to_string()))?;
        let t = self
            .lookup(target)
            .ok_or_else(|| EdgeRejection::UnknownNode(target.to_string()))?;
        self.add_edge(s, t, edge_type, label)
    }

    /// Insert an edge and record its provenance on the source node. When
    /// the edge already exists only the metadata is updated.
    pub fn add_edge_with_metadata(
        &mut self,
        source: DagIndex,
        target: DagIndex,
        edge_type: EdgeType,
        label: Option<String>,
        metadata: RelationshipMetadata,
    ) -> Result<(), EdgeRejection> {
        let event = match self.add_edge(source, target, edge_type, label) {
            Ok(()) => None,
            Err(rejection) if rejection.is_duplicate() => Some(EdgeEvent::Modified),
            Err(rejection) => return Err(rejection),
        };
        if let Some(node) = self.node_mut(source) {
            node.set_relationship(edge_type, target, metadata);
        }
        if let Some(event) = event {
            self.notify(event, source, target, edge_type);
        }
        Ok(())
    }

    /// Remove one edge. Returns false if it did not exist.
    pub fn remove_edge(&mut self, source: DagIndex, target: DagIndex, edge_type: EdgeType) -> bool {
        let removed = match self.node_mut(source) {
            Some(node) => {
                let before = node.outgoing.len();
                node.outgoing
                    .retain(|e| !(e.target == target && e.edge_type == edge_type));
                node.relationships.retain(|(key, _)| *key != (edge_type, target));
                node.outgoing.len() != before
            }
            None => false,
        };
        if removed {
            if let Some(node) = self.node_mut(target) {
                node.incoming
                    .retain(|e| !(e.source == source && e.edge_type == edge_type));
            }
            self.notify(EdgeEvent::Removed, source, target, edge_type);
        }
        removed
    }

    /// Whether `to` is reachable from `from` along hierarchical edges.
    pub fn reaches_hierarchically(&self, from: DagIndex, to: DagIndex) -> bool {
        let mut stack = vec![from];
        let mut seen = FxHashSet::default();
        while let Some(next) = stack.pop() {
            if next == to {
                return true;
            }
            if !seen.insert(next) {
                continue;
            }
            stack.extend(self.hierarchical_children(next));
        }
        false
    }

    // =========================================================================
    // Observers
    // =========================================================================

    pub fn add_observer(&mut self, observer: Box<dyn RelationshipObserver>) {
        self.observers.push(observer);
    }

    fn notify(&mut self, event: EdgeEvent, source: DagIndex, target: DagIndex, edge: EdgeType) {
        if self.observers.is_empty() {
            return;
        }
        let mut observers = std::mem::take(&mut self.observers);
        if let (Some(s), Some(t)) = (self.node(source), self.node(target)) {
            for observer in observers.iter_mut() {
                observer.on_relationship_changed(event, s, t, edge);
            }
        }
        self.observers = observers;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn sections(n: usize) -> (Dag, Vec<DagIndex>) {
        let mut dag = Dag::new();
        let ids = (0..n)
            .map(|i| dag.add_node(format!("s{}", i), NodeType::Section, format!("Section {}", i)))
            .collect();
        (dag, ids)
    }

    #[test]
    fn test_add_node_is_get_or_create() {
        let mut dag = Dag::new();
        let a = dag.add_node("a", NodeType::Text, "first");
        let b = dag.add_node("a", NodeType::Section, "second");
        assert_eq!(a, b);
        assert_eq!(dag.get("a").unwrap().content, "first");
        assert_eq!(dag.len(), 1);
    }

    #[test]
    fn test_cycle_rejected() {
        let (mut dag, s) = sections(3);
        dag.add_edge(s[0], s[1], EdgeType::Hierarchical, None).unwrap();
        dag.add_edge(s[1], s[2], EdgeType::Hierarchical, None).unwrap();
        let err = dag.add_edge(s[2], s[0], EdgeType::Hierarchical, None).unwrap_err();
        assert!(matches!(err, EdgeRejection::Cycle { .. }));
        assert!(dag.live_edges(s[2]).next().is_none());
    }

    #[test]
    fn test_non_hierarchical_cycles_allowed() {
        let (mut dag, s) = sections(2);
        dag.add_edge(s[0], s[1], EdgeType::ArgumentFlow, None).unwrap();
        dag.add_edge(s[1], s[0], EdgeType::CounterArgument, None).unwrap();
        assert_eq!(dag.edge_count(), 2);
    }

    #[test]
    fn test_self_link_and_incompatible() {
        let mut dag = Dag::new();
        let author = dag.add_node("author:a", NodeType::Author, "A");
        let math = dag.add_node("m", NodeType::Math, "$x$");
        assert!(matches!(
            dag.add_edge(author, author, EdgeType::Hierarchical, None),
            Err(EdgeRejection::SelfLink(_))
        ));
        assert!(matches!(
            dag.add_edge(math, author, EdgeType::Citation, None),
            Err(EdgeRejection::Incompatible { .. })
        ));
    }

    #[test]
    fn test_duplicate_is_noop() {
        let (mut dag, s) = sections(2);
        dag.add_edge(s[0], s[1], EdgeType::MethodologyFlow, None).unwrap();
        let err = dag.add_edge(s[0], s[1], EdgeType::MethodologyFlow, None).unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(dag.node(s[0]).unwrap().outgoing().len(), 1);
        assert_eq!(dag.node(s[1]).unwrap().incoming().len(), 1);
    }

    #[test]
    fn test_removed_node_dangles() {
        let (mut dag, s) = sections(2);
        dag.add_edge(s[0], s[1], EdgeType::Hierarchical, None).unwrap();
        assert!(dag.remove_node("s1").is_some());
        assert_eq!(dag.live_edges(s[0]).count(), 0);
        assert!(matches!(
            dag.add_edge(s[0], s[1], EdgeType::Hierarchical, None),
            Err(EdgeRejection::RemovedNode(_))
        ));
        assert!(!dag.contains("s1"));
    }

    #[test]
    fn test_metadata_and_remove_edge() {
        let (mut dag, s) = sections(2);
        let meta = RelationshipMetadata::new(0.75, "Table 2").with_context("results");
        dag.add_edge_with_metadata(s[0], s[1], EdgeType::ResultSupports, None, meta)
            .unwrap();
        let stored = dag.node(s[0]).unwrap().relationship(EdgeType::ResultSupports, s[1]).unwrap();
        assert_eq!(stored.confidence, 0.75);
        assert!(dag.remove_edge(s[0], s[1], EdgeType::ResultSupports));
        assert!(!dag.remove_edge(s[0], s[1], EdgeType::ResultSupports));
        assert!(dag.node(s[0]).unwrap().relationship(EdgeType::ResultSupports, s[1]).is_none());
        assert!(dag.node(s[1]).unwrap().incoming().is_empty());
    }

    struct Recorder(Rc<RefCell<Vec<(EdgeEvent, String, String)>>>);

    impl RelationshipObserver for Recorder {
        fn on_relationship_changed(
            &mut self,
            event: EdgeEvent,
            source: &DagNode,
            target: &DagNode,
            _: EdgeType,
        ) {
            self.0.borrow_mut().push((event, source.id.clone(), target.id.clone()));
        }
    }

    #[test]
    fn test_observers_notified() {
        let (mut dag, s) = sections(2);
        let log = Rc::new(RefCell::new(Vec::new()));
        dag.add_observer(Box::new(Recorder(log.clone())));
        dag.add_edge(s[0], s[1], EdgeType::ArgumentFlow, None).unwrap();
        let meta = RelationshipMetadata::new(0.5, "");
        dag.add_edge_with_metadata(s[0], s[1], EdgeType::ArgumentFlow, None, meta).unwrap();
        dag.remove_edge(s[0], s[1], EdgeType::ArgumentFlow);
        let events: Vec<EdgeEvent> = log.borrow().iter().map(|(e, _, _)| *e).collect();
        assert_eq!(events, vec![EdgeEvent::Added, EdgeEvent::Modified, EdgeEvent::Removed]);
        assert_eq!(log.borrow()[0].1, "s0");
    }
}
