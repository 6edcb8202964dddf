//! Tree-plus-graph traversal shared by chunking and the state machine.
//!
//! The walk visits a node, then its AST children, then any AST nodes
//! reachable through the node's DAG hierarchical children that were not
//! reached yet. A single visited set spans both sources so nothing is
//! emitted twice. Everything is driven by an explicit stack.

use fxhash::FxHashSet;

use super::ast::{Ast, NodeId};
use crate::graph::Dag;

/// Event yielded by [`LinkedWalk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEvent {
    Enter(NodeId),
    Exit(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Enter(NodeId),
    Links(NodeId),
    Exit(NodeId),
}

/// Resumable dual-worklist walk.
///
/// The walk does not borrow the tree or graph between steps, so the caller
/// may mutate the graph while walking; DAG links of a node are resolved
/// only after its tree children have been handled.
#[derive(Debug)]
pub struct LinkedWalk {
    stack: Vec<Step>,
    visited: FxHashSet<NodeId>,
    follow_links: bool,
}

impl LinkedWalk {
    pub fn new(root: NodeId) -> Self {
        LinkedWalk {
            stack: vec![Step::Enter(root)],
            visited: FxHashSet::default(),
            follow_links: true,
        }
    }

    /// Restrict the walk to the tree.
    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    pub fn is_visited(&self, id: NodeId) -> bool {
        self.visited.contains(&id)
    }

    pub fn next_event(&mut self, ast: &Ast, graph: Option<&Dag>) -> Option<WalkEvent> {
        while let Some(step) = self.stack.pop() {
            match step {
                Step::Enter(id) => {
                    if ast.get(id).is_none() || !self.visited.insert(id) {
                        continue;
                    }
                    self.stack.push(Step::Exit(id));
                    self.stack.push(Step::Links(id));
                    for child in ast.children(id).iter().rev() {
                        if !self.visited.contains(child) {
                            self.stack.push(Step::Enter(*child));
                        }
                    }
                    return Some(WalkEvent::Enter(id));
                }
                Step::Links(id) => {
                    if !self.follow_links {
                        continue;
                    }
                    let (graph, dag) = match (graph, ast.dag_node(id)) {
                        (Some(graph), Some(dag)) => (graph, dag),
                        _ => continue,
                    };
                    let linked: Vec<NodeId> = graph
                        .hierarchical_children(dag)
                        .filter_map(|child| graph.node(child).and_then(|n| n.ast_node()))
                        .filter(|ast_id| !self.visited.contains(ast_id))
                        .collect();
                    for ast_id in linked.into_iter().rev() {
                        self.stack.push(Step::Enter(ast_id));
                    }
                }
                Step::Exit(id) => return Some(WalkEvent::Exit(id)),
            }
        }
        None
    }

    /// Drop the pending children, links and exit of a node that was just
    /// entered. The skipped children may still be reached through links
    /// from elsewhere.
    pub fn skip_subtree(&mut self, id: NodeId) {
        while let Some(step) = self.stack.pop() {
            if step == Step::Exit(id) {
                break;
            }
        }
    }
}
