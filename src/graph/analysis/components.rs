use fxhash::FxHashSet;

use super::super::types::DagIndex;
use super::super::Dag;

const UNVISITED: usize = usize::MAX;

impl Dag {
    /// Tarjan's strongly connected components over every live edge.
    /// Components come out in reverse topological order; singletons are
    /// included.
    pub fn strongly_connected_components(&self) -> Vec<Vec<DagIndex>> {
        let n = self.capacity();
        let adjacency: Vec<Vec<DagIndex>> = (0..n)
            .map(|i| self.live_edges(DagIndex(i)).map(|e| e.target).collect())
            .collect();

        let mut index = vec![UNVISITED; n];
        let mut lowlink = vec![0usize; n];
        let mut on_stack = vec![false; n];
        let mut stack: Vec<usize> = Vec::new();
        let mut next_index = 0usize;
        let mut components = Vec::new();

        for start in self.indices() {
            if index[start.0] != UNVISITED {
                continue;
            }
            // (node, position of the next successor to look at)
            let mut frames: Vec<(usize, usize)> = vec![(start.0, 0)];
            index[start.0] = next_index;
            lowlink[start.0] = next_index;
            next_index += 1;
            stack.push(start.0);
            on_stack[start.0] = true;

            while let Some(frame) = frames.last_mut() {
                let (v, pos) = *frame;
                if pos < adjacency[v].len() {
                    frame.1 += 1;
                    let w = adjacency[v][pos].0;
                    if index[w] == UNVISITED {
                        index[w] = next_index;
                        lowlink[w] = next_index;
                        next_index += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        frames.push((w, 0));
                    } else if on_stack[w] {
                        lowlink[v] = lowlink[v].min(index[w]);
                    }
                    continue;
                }

                frames.pop();
                if let Some(&(parent, _)) = frames.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[v]);
                }
                if lowlink[v] == index[v] {
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component.push(DagIndex(w));
                        if w == v {
                            break;
                        }
                    }
                    components.push(component);
                }
            }
        }
        components
    }

    /// Components of the graph with edge direction ignored.
    pub fn weakly_connected_components(&self) -> Vec<Vec<DagIndex>> {
        let mut seen = FxHashSet::default();
        let mut components = Vec::new();
        for start in self.indices() {
            if seen.contains(&start) {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![start];
            while let Some(next) = stack.pop() {
                if !seen.insert(next) {
                    continue;
                }
                component.push(next);
                stack.extend(self.live_edges(next).map(|e| e.target));
                stack.extend(self.live_incoming(next).map(|e| e.source));
            }
            components.push(component);
        }
        components
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{Dag, EdgeType, NodeType};

    #[test]
    fn test_scc_finds_argument_cycle() {
        let mut dag = Dag::new();
        let ids: Vec<_> = (0..4)
            .map(|i| dag.add_node(format!("s{}", i), NodeType::Section, ""))
            .collect();
        dag.add_edge(ids[0], ids[1], EdgeType::Hierarchical, None).unwrap();
        dag.add_edge(ids[1], ids[2], EdgeType::ArgumentFlow, None).unwrap();
        dag.add_edge(ids[2], ids[3], EdgeType::ArgumentFlow, None).unwrap();
        dag.add_edge(ids[3], ids[1], EdgeType::CounterArgument, None).unwrap();

        let components = dag.strongly_connected_components();
        assert_eq!(components.len(), 2);
        let mut cycle = components.iter().find(|c| c.len() == 3).unwrap().clone();
        cycle.sort();
        assert_eq!(cycle, vec![ids[1], ids[2], ids[3]]);
        assert_eq!(dag.weakly_connected_components().len(), 1);
    }

    #[test]
    fn test_scc_on_long_chain_does_not_recurse() {
        let mut dag = Dag::new();
        let mut prev = dag.add_node("n0", NodeType::Section, "");
        for i in 1..20_000 {
            let next = dag.add_node(format!("n{}", i), NodeType::Section, "");
            dag.add_edge(prev, next, EdgeType::MethodologyFlow, None).unwrap();
            prev = next;
        }
        assert_eq!(dag.strongly_connected_components().len(), 20_000);
    }
}
