use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};

use ena::unify::InPlaceUnificationTable;

use crate::geometry::PolygonId;

/// Polygon → net name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetMap {
    names: BTreeMap<PolygonId, String>,
}

impl NetMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name a polygon. Returns false, leaving the existing name, when the
    /// polygon is already named.
    pub fn assign(&mut self, id: PolygonId, name: &str) -> bool {
        if self.names.contains_key(&id) {
            return false;
        }
        self.names.insert(id, name.to_string());
        true
    }

    pub fn get(&self, id: PolygonId) -> Option<&str> {
        self.names.get(&id).map(|s| s.as_str())
    }

    pub fn contains(&self, id: PolygonId) -> bool {
        self.names.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PolygonId, &str)> {
        self.names.iter().map(|(id, n)| (*id, n.as_str()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Every name in use.
    pub fn net_names(&self) -> HashSet<&str> {
        self.names.values().map(|s| s.as_str()).collect()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
struct NetKey(u32);

/// The preferred member of a class. The maximum wins a merge: a declared
/// port over a non-port, then the lexicographically smaller name.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
struct NetRoot {
    is_port: bool,
    name: Reverse<String>,
}

impl ena::unify::UnifyKey for NetKey {
    type Value = NetRoot;

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        Self(u)
    }

    fn tag() -> &'static str {
        "NetKey"
    }
}

impl ena::unify::UnifyValue for NetRoot {
    type Error = ena::unify::NoError;

    fn unify_values(value1: &Self, value2: &Self) -> Result<Self, Self::Error> {
        Ok(std::cmp::max(value1.clone(), value2.clone()))
    }
}

/// Union-find over net names.
///
/// Every class is named after its preferred member, so the resulting names
/// do not depend on the order of the unions.
#[derive(Clone)]
pub struct NetUnionFind {
    keys: HashMap<String, NetKey>,
    table: InPlaceUnificationTable<NetKey>,
    ports: HashSet<String>,
}

impl NetUnionFind {
    pub fn new(ports: impl IntoIterator<Item = String>) -> Self {
        Self {
            keys: HashMap::new(),
            table: InPlaceUnificationTable::new(),
            ports: ports.into_iter().collect(),
        }
    }

    pub fn is_port(&self, name: &str) -> bool {
        self.ports.contains(name)
    }

    fn key(&mut self, name: &str) -> NetKey {
        if let Some(key) = self.keys.get(name) {
            return *key;
        }
        let key = self.table.new_key(NetRoot {
            is_port: self.ports.contains(name),
            name: Reverse(name.to_string()),
        });
        self.keys.insert(name.to_string(), key);
        key
    }

    /// Name of `name`'s class, registering `name` on first sight.
    pub fn find(&mut self, name: &str) -> String {
        let key = self.key(name);
        self.table.probe_value(key).name.0
    }

    /// Merge the classes of `a` and `b`. Returns true if they were distinct.
    pub fn union(&mut self, a: &str, b: &str) -> bool {
        let ka = self.key(a);
        let kb = self.key(b);
        if self.table.unioned(ka, kb) {
            return false;
        }
        self.table.union(ka, kb);
        true
    }

    /// Rewrite every polygon's name to its class name.
    pub fn resolve(&mut self, netmap: &NetMap) -> NetMap {
        let mut resolved = NetMap::new();
        for (id, name) in netmap.iter() {
            let root = self.find(name);
            resolved.assign(id, &root);
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports() -> Vec<String> {
        vec!["VDD".into(), "A".into()]
    }

    #[test]
    fn test_port_wins_over_placeholder() {
        let mut uf = NetUnionFind::new(ports());
        uf.union("net1", "net2");
        uf.union("net2", "VDD");
        assert_eq!(uf.find("net1"), "VDD");
        assert_eq!(uf.find("net2"), "VDD");
    }

    #[test]
    fn test_result_independent_of_merge_order() {
        let pairs = [("net3", "net10"), ("net10", "A"), ("net7", "net3"), ("VDD", "net20")];
        let mut forward = NetUnionFind::new(ports());
        let mut backward = NetUnionFind::new(ports());
        for (a, b) in pairs {
            forward.union(a, b);
        }
        for (a, b) in pairs.iter().rev() {
            backward.union(b, a);
        }
        for name in ["net3", "net10", "net7", "A", "VDD", "net20"] {
            assert_eq!(forward.find(name), backward.find(name));
        }
        assert_eq!(forward.find("net7"), "A");
        assert_eq!(forward.find("net20"), "VDD");
    }

    #[test]
    fn test_two_ports_pick_smaller_name() {
        let mut uf = NetUnionFind::new(ports());
        assert!(uf.union("VDD", "A"));
        assert!(!uf.union("A", "VDD"));
        assert_eq!(uf.find("VDD"), "A");
    }

    #[test]
    fn test_netmap_first_name_wins() {
        let mut map = NetMap::new();
        assert!(map.assign(PolygonId(0), "A"));
        assert!(!map.assign(PolygonId(0), "B"));
        assert_eq!(map.get(PolygonId(0)), Some("A"));

        let mut uf = NetUnionFind::new(ports());
        map.assign(PolygonId(1), "net1");
        uf.union("net1", "A");
        let resolved = uf.resolve(&map);
        assert_eq!(resolved.get(PolygonId(1)), Some("A"));
    }
}
