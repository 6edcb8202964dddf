//! Label symbol table.

use indexmap::IndexMap;
use tracing::warn;

use crate::core::ast::NodeId;

/// Label → node bindings, in definition order.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    labels: IndexMap<String, NodeId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `label` to `node`. Returns the previous binding when the label
    /// was already defined; the new binding wins.
    pub fn define(&mut self, label: &str, node: NodeId) -> Option<NodeId> {
        let previous = self.labels.insert(label.to_string(), node);
        if let Some(prev) = previous {
            warn!(label, previous = %prev, current = %node, "label redefined");
        }
        previous
    }

    pub fn resolve(&self, label: &str) -> Option<NodeId> {
        self.labels.get(label).copied()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.labels.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redefinition_overwrites() {
        let mut table = SymbolTable::new();
        assert_eq!(table.define("fig:a", NodeId(1)), None);
        assert_eq!(table.define("fig:a", NodeId(2)), Some(NodeId(1)));
        assert_eq!(table.resolve("fig:a"), Some(NodeId(2)));
        assert_eq!(table.resolve("missing"), None);
    }
}
