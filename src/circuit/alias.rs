//! Net alias table: union-find over net names.
//!
//! Every name a circuit uses for a net is a key. Names are unified only by
//! ground declarations; two references to `v_out` share a net because the
//! key is the same, not because of any connection inference.

use indexmap::IndexMap;

/// Union-find over string keys with path compression.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    /// Parent of each name; roots point at themselves.
    parents: IndexMap<String, String>,
    ground: Option<String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a name as its own net if it is not known yet.
    pub fn insert(&mut self, name: &str) {
        if !self.parents.contains_key(name) {
            self.parents.insert(name.to_string(), name.to_string());
        }
    }

    /// Canonical name of the net `name` belongs to, compressing the path.
    pub fn find(&mut self, name: &str) -> Option<String> {
        let mut root = self.parents.get(name)?.clone();
        loop {
            let parent = &self.parents[&root];
            if *parent == root {
                break;
            }
            root = parent.clone();
        }

        let mut current = name.to_string();
        while current != root {
            let next = std::mem::replace(&mut self.parents[&current], root.clone());
            current = next;
        }
        Some(root)
    }

    /// Merge the nets of `a` and `b`. The root of `a` survives.
    pub fn union(&mut self, a: &str, b: &str) -> Option<String> {
        self.insert(a);
        self.insert(b);
        let root_a = self.find(a)?;
        let root_b = self.find(b)?;
        if root_a != root_b {
            self.parents[&root_b] = root_a.clone();
            if self.ground.as_deref() == Some(root_b.as_str()) {
                self.ground = Some(root_a.clone());
            }
        }
        Some(root_a)
    }

    /// Declare `name` a ground alias. The first ground name becomes the
    /// canonical ground net; later ones are unified with it.
    pub fn declare_ground(&mut self, name: &str) -> String {
        self.insert(name);
        match self.ground.clone() {
            Some(ground) => self.union(&ground, name).unwrap_or(ground),
            None => {
                let root = self.find(name).unwrap_or_else(|| name.to_string());
                self.ground = Some(root.clone());
                root
            }
        }
    }

    /// Canonical ground net, if any ground has been declared.
    pub fn ground(&mut self) -> Option<String> {
        let ground = self.ground.clone()?;
        self.find(&ground)
    }

    /// Whether `name` is a known ground alias.
    pub fn is_ground(&mut self, name: &str) -> bool {
        match (self.ground(), self.find(name)) {
            (Some(ground), Some(root)) => ground == root,
            _ => false,
        }
    }

    /// Group names by canonical net, both in first-seen order.
    pub fn groups(&mut self) -> IndexMap<String, Vec<String>> {
        let names: Vec<String> = self.parents.keys().cloned().collect();
        let mut groups: IndexMap<String, Vec<String>> = IndexMap::new();
        for name in names {
            if let Some(root) = self.find(&name) {
                groups.entry(root).or_default().push(name);
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_is_idempotent() {
        let mut table = AliasTable::new();
        table.insert("v_out");
        let first = table.find("v_out");
        let second = table.find("v_out");
        assert_eq!(first, second);
        assert_eq!(first.as_deref(), Some("v_out"));
        assert_eq!(table.find("missing"), None);
    }

    #[test]
    fn test_ground_aliases_unify() {
        let mut table = AliasTable::new();
        table.declare_ground("GND");
        table.insert("v_in");
        table.declare_ground("0");
        table.declare_ground("AGND");

        assert_eq!(table.find("0").as_deref(), Some("GND"));
        assert_eq!(table.find("AGND").as_deref(), Some("GND"));
        assert!(table.is_ground("AGND"));
        assert!(!table.is_ground("v_in"));

        let groups = table.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["GND"], vec!["GND", "0", "AGND"]);
    }

    #[test]
    fn test_path_compression() {
        let mut table = AliasTable::new();
        table.union("a", "b");
        table.union("b", "c");
        table.union("c", "d");
        assert_eq!(table.find("d").as_deref(), Some("a"));
        assert_eq!(table.parents["d"], "a");
    }

    #[test]
    fn test_ground_survives_union_with_other_root() {
        let mut table = AliasTable::new();
        table.declare_ground("GND");
        table.union("chassis", "GND");
        assert_eq!(table.ground().as_deref(), Some("chassis"));
        assert!(table.is_ground("GND"));
    }
}
