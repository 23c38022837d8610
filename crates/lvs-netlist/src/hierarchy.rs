use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::parser::Netlist;

/// A subcircuit in the instantiation tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyNode {
    /// Instance name in the parent; `None` for the root.
    pub instance: Option<String>,
    pub cell: String,
    /// False when the netlist has no `.SUBCKT` for this cell.
    pub defined: bool,
    /// Set when the cell already appears on the path from the root; its
    /// children are not expanded.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub recursive: bool,
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    /// Number of nodes in the tree, root included.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(|c| c.size()).sum::<usize>()
    }
}

impl Netlist {
    /// Subcircuits never instantiated by another subcircuit, in file order.
    pub fn top_cells(&self) -> Vec<&str> {
        let instantiated: HashSet<&str> = self
            .subcircuits
            .values()
            .flat_map(|s| s.instances().map(|(_, target)| target))
            .collect();
        self.names().filter(|n| !instantiated.contains(n)).collect()
    }

    /// Instantiation tree rooted at `top`.
    pub fn hierarchy(&self, top: &str) -> HierarchyNode {
        let mut path = Vec::new();
        self.node(None, top, &mut path)
    }

    fn node(&self, instance: Option<&str>, cell: &str, path: &mut Vec<String>) -> HierarchyNode {
        let mut node = HierarchyNode {
            instance: instance.map(|s| s.to_string()),
            cell: cell.to_string(),
            defined: self.subcircuits.contains_key(cell),
            recursive: false,
            children: Vec::new(),
        };
        if path.iter().any(|p| p == cell) {
            log::warn!("recursive instantiation of '{}' cut", cell);
            node.recursive = true;
            return node;
        }
        let Some(sub) = self.subcircuits.get(cell) else {
            return node;
        };
        path.push(cell.to_string());
        node.children = sub
            .instances()
            .map(|(inst, target)| self.node(Some(inst), target, path))
            .collect();
        path.pop();
        node
    }
}
