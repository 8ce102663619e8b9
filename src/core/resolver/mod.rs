// ─── Dependency Resolver ───
// Expands requested mod ids into their transitive closure over the registry.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::core::error::AssemblerError;
use crate::core::registry::{ModDescriptor, ModRegistry};

/// Ordered, id-unique set of mods produced for one assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedModSet {
    mods: Vec<ModDescriptor>,
}

impl ResolvedModSet {
    pub fn ids(&self) -> Vec<&str> {
        self.mods.iter().map(|m| m.id.as_str()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.mods.iter().any(|m| m.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModDescriptor> {
        self.mods.iter()
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }
}

impl IntoIterator for ResolvedModSet {
    type Item = ModDescriptor;
    type IntoIter = std::vec::IntoIter<ModDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.mods.into_iter()
    }
}

pub struct DependencyResolver<'a> {
    registry: &'a ModRegistry,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(registry: &'a ModRegistry) -> Self {
        Self { registry }
    }

    /// Resolve `requested` into a pre-order depth-first closure.
    ///
    /// Each mod is emitted the first time it is reached, before its own
    /// dependencies, which are walked in declaration order. Unknown ids are
    /// logged and skipped. The visited set bounds the walk by registry size,
    /// so cyclic graphs terminate.
    pub fn resolve<S: AsRef<str>>(&self, requested: &[S]) -> ResolvedModSet {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut mods = Vec::new();

        // Reversed so the first requested id is popped first.
        let mut stack: Vec<&str> = requested.iter().rev().map(AsRef::as_ref).collect();

        while let Some(id) = stack.pop() {
            if visited.contains(id) {
                continue;
            }

            let Some(descriptor) = self.registry.get(id) else {
                warn!("{}", AssemblerError::RegistryLookup(id.to_string()));
                continue;
            };

            visited.insert(descriptor.id.as_str());
            mods.push(descriptor.clone());

            for dep in descriptor.dependencies.iter().rev() {
                if !visited.contains(dep.id.as_str()) {
                    stack.push(dep.id.as_str());
                }
            }
        }

        debug!("Resolved {} requested ids into {} mods", requested.len(), mods.len());
        ResolvedModSet { mods }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(edges: &[(&str, &[&str])]) -> ModRegistry {
        ModRegistry::from_descriptors(
            edges
                .iter()
                .map(|(id, deps)| {
                    deps.iter().fold(ModDescriptor::new(*id, format!("owner/{id}")), |m, dep| {
                        m.with_dependency(dep, "*")
                    })
                })
                .collect(),
        )
    }

    fn assert_unique(set: &ResolvedModSet) {
        let ids = set.ids();
        let unique: HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(ids.len(), unique.len(), "duplicate ids in {:?}", ids);
    }

    #[test]
    fn mutual_cycle_resolves_to_both_once() {
        let reg = registry(&[("A", &["B"]), ("B", &["A"])]);
        let set = DependencyResolver::new(&reg).resolve(&["A"]);
        assert_eq!(set.ids(), vec!["A", "B"]);
    }

    #[test]
    fn self_reference_terminates() {
        let reg = registry(&[("A", &["A"])]);
        let set = DependencyResolver::new(&reg).resolve(&["A", "A"]);
        assert_eq!(set.ids(), vec!["A"]);
    }

    #[test]
    fn unknown_id_yields_empty_set() {
        let reg = registry(&[("A", &[])]);
        let set = DependencyResolver::new(&reg).resolve(&["X"]);
        assert!(set.is_empty());
    }

    #[test]
    fn missing_dependency_is_skipped_without_aborting_siblings() {
        let reg = registry(&[("A", &["ghost", "B"]), ("B", &[]), ("C", &[])]);
        let set = DependencyResolver::new(&reg).resolve(&["A", "nope", "C"]);
        assert_eq!(set.ids(), vec!["A", "B", "C"]);
    }

    #[test]
    fn order_is_preorder_in_declaration_order() {
        let reg = registry(&[
            ("A", &["B", "C"]),
            ("B", &["C", "D"]),
            ("C", &[]),
            ("D", &["A"]),
            ("E", &["D"]),
        ]);
        let resolver = DependencyResolver::new(&reg);
        let set = resolver.resolve(&["A", "E"]);
        assert_eq!(set.ids(), vec!["A", "B", "C", "D", "E"]);

        // Identical inputs, identical output.
        assert_eq!(resolver.resolve(&["A", "E"]), set);
    }

    #[test]
    fn dense_cyclic_graph_has_no_duplicates() {
        let ids = ["a", "b", "c", "d", "e", "f"];
        let edges: Vec<(&str, &[&str])> = ids.iter().map(|id| (*id, &ids[..])).collect();
        let reg = registry(&edges);
        let set = DependencyResolver::new(&reg).resolve(&["d", "a", "f"]);
        assert_unique(&set);
        assert_eq!(set.len(), ids.len());
        assert_eq!(set.ids()[0], "d");
    }
}
