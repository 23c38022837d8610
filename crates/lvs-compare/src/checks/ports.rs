use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::canonical::Signature;

/// Port names declared on only one side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDiff {
    pub schematic_only: Vec<String>,
    pub layout_only: Vec<String>,
}

impl PortDiff {
    pub fn is_empty(&self) -> bool {
        self.schematic_only.is_empty() && self.layout_only.is_empty()
    }

    pub fn count(&self) -> usize {
        self.schematic_only.len() + self.layout_only.len()
    }
}

pub fn check_ports(schematic: &Signature, layout: &Signature) -> PortDiff {
    let s: BTreeSet<&String> = schematic.ports.iter().collect();
    let l: BTreeSet<&String> = layout.ports.iter().collect();
    PortDiff {
        schematic_only: s.difference(&l).map(|p| p.to_string()).collect(),
        layout_only: l.difference(&s).map(|p| p.to_string()).collect(),
    }
}
