//! The reference graph — module versions connected by version-pinned
//! references.
//!
//! The graph is built incrementally by discovery code and is append-only:
//! vertices and edges are only ever added. Per-vertex adjacency lists are
//! lazily allocated, since many vertices are roots or leaves with edges in
//! one direction only. No visitation state lives on the vertices; each
//! traversal tracks its own, so independent read-only traversals of a
//! finished graph do not interfere.

use indexmap::{IndexMap, IndexSet};
use tracing::trace;

use dragom_model::NodePath;

use crate::error::{GraphError, Result};
use crate::reference::{Reference, ReferencePath, Referrer};
use crate::version::ModuleVersion;

/// Per-vertex record. Both lists are insertion-ordered and allocated on
/// first edge.
#[derive(Debug, Default)]
pub(crate) struct GraphNode {
    pub references: Option<Vec<Reference>>,
    pub referrers: Option<Vec<Referrer>>,
}

/// Mutable directed graph of module versions.
#[derive(Debug, Default)]
pub struct ReferenceGraph {
    pub(crate) nodes: IndexMap<ModuleVersion, GraphNode>,
    roots: Vec<ModuleVersion>,
    pub(crate) matched: IndexSet<ModuleVersion>,
}

impl ReferenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Construction ──────────────────────────────────────────────────

    /// Register a module version as a root, creating its vertex if absent.
    /// Idempotent.
    pub fn add_root_module_version(&mut self, module_version: ModuleVersion) {
        self.ensure_vertex(&module_version);
        if !self.roots.contains(&module_version) {
            trace!(root = %module_version, "root module version added");
            self.roots.push(module_version);
        }
    }

    /// Register the edge `referrer → reference`, creating both vertices if
    /// absent. The forward and inverse adjacency entries are added
    /// together, or not at all when an equal edge already exists.
    pub fn add_reference(&mut self, referrer: ModuleVersion, reference: Reference) {
        self.ensure_vertex(&referrer);
        self.ensure_vertex(reference.module_version());

        let outgoing = self.nodes[&referrer].references.get_or_insert_default();
        if outgoing.contains(&reference) {
            return;
        }
        trace!(from = %referrer, to = %reference, "reference added");
        outgoing.push(reference.clone());

        let target = reference.module_version().clone();
        let incoming = self.nodes[&target].referrers.get_or_insert_default();
        incoming.push(Referrer::new(referrer, reference));
    }

    /// Register a complete root-to-leaf reference path: the path's root
    /// becomes a graph root, each step becomes an edge, and the leaf joins
    /// the matched set. This is the incremental-construction entry point
    /// for discovery code walking outward from known roots.
    pub fn add_matched_reference_path(&mut self, path: &ReferencePath) {
        self.add_root_module_version(path.root().clone());
        let mut current = path.root().clone();
        for reference in path.references() {
            let next = reference.module_version().clone();
            self.add_reference(current, reference.clone());
            current = next;
        }
        self.matched.insert(path.leaf().clone());
    }

    fn ensure_vertex(&mut self, module_version: &ModuleVersion) {
        if !self.nodes.contains_key(module_version) {
            self.nodes
                .insert(module_version.clone(), GraphNode::default());
        }
    }

    // ── Queries ───────────────────────────────────────────────────────

    /// Whether a module version is a known vertex.
    pub fn contains(&self, module_version: &ModuleVersion) -> bool {
        self.nodes.contains_key(module_version)
    }

    /// Outgoing references of a vertex, in insertion order.
    pub fn references_of(&self, module_version: &ModuleVersion) -> Result<&[Reference]> {
        let node = self.node(module_version)?;
        Ok(node.references.as_deref().unwrap_or_default())
    }

    /// Incoming referrers of a vertex, in insertion order.
    pub fn referrers_of(&self, module_version: &ModuleVersion) -> Result<&[Referrer]> {
        let node = self.node(module_version)?;
        Ok(node.referrers.as_deref().unwrap_or_default())
    }

    /// Whether a known vertex is in the root set.
    pub fn is_root(&self, module_version: &ModuleVersion) -> Result<bool> {
        self.node(module_version)?;
        Ok(self.roots.contains(module_version))
    }

    /// Whether a known vertex is in the matched set.
    pub fn is_matched(&self, module_version: &ModuleVersion) -> Result<bool> {
        self.node(module_version)?;
        Ok(self.matched.contains(module_version))
    }

    /// The root set, in registration order.
    pub fn roots(&self) -> &[ModuleVersion] {
        &self.roots
    }

    /// All known module versions, optionally filtered to those of one
    /// module. An unmatched filter yields an empty list, not an error.
    pub fn module_versions(&self, module_path: Option<&NodePath>) -> Vec<&ModuleVersion> {
        self.nodes
            .keys()
            .filter(|mv| module_path.is_none_or(|path| mv.module_path() == path))
            .collect()
    }

    fn node(&self, module_version: &ModuleVersion) -> Result<&GraphNode> {
        self.nodes
            .get(module_version)
            .ok_or_else(|| GraphError::UnknownModuleVersion(module_version.clone()))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(literal: &str) -> ModuleVersion {
        literal.parse().unwrap()
    }

    #[test]
    fn edge_symmetry() {
        let mut graph = ReferenceGraph::new();
        let reference = Reference::new(mv("b:S/1"));
        graph.add_reference(mv("a:S/1"), reference.clone());

        assert_eq!(graph.references_of(&mv("a:S/1")).unwrap(), [reference.clone()]);
        let referrers = graph.referrers_of(&mv("b:S/1")).unwrap();
        assert_eq!(referrers.len(), 1);
        assert_eq!(referrers[0].module_version(), &mv("a:S/1"));
        assert_eq!(referrers[0].reference(), &reference);
    }

    #[test]
    fn edge_insertion_is_idempotent() {
        let mut graph = ReferenceGraph::new();
        let reference = Reference::new(mv("b:S/1"));
        graph.add_reference(mv("a:S/1"), reference.clone());
        graph.add_reference(mv("a:S/1"), reference.clone());

        assert_eq!(graph.references_of(&mv("a:S/1")).unwrap().len(), 1);
        assert_eq!(graph.referrers_of(&mv("b:S/1")).unwrap().len(), 1);

        // A reference to the same target with different metadata is a
        // distinct edge.
        let declared =
            Reference::with_artifact(mv("b:S/1"), "com.acme:widget".parse().unwrap());
        graph.add_reference(mv("a:S/1"), declared);
        assert_eq!(graph.references_of(&mv("a:S/1")).unwrap().len(), 2);
        assert_eq!(graph.referrers_of(&mv("b:S/1")).unwrap().len(), 2);
    }

    #[test]
    fn matched_path_membership() {
        let mut graph = ReferenceGraph::new();
        let path = ReferencePath::with_references(
            mv("r:D/main"),
            vec![Reference::new(mv("mid:S/1")), Reference::new(mv("leaf:S/2"))],
        );
        graph.add_matched_reference_path(&path);

        assert!(graph.is_root(&mv("r:D/main")).unwrap());
        assert!(!graph.is_root(&mv("mid:S/1")).unwrap());
        assert!(graph.is_matched(&mv("leaf:S/2")).unwrap());
        assert!(!graph.is_matched(&mv("mid:S/1")).unwrap());
        assert_eq!(
            graph.references_of(&mv("r:D/main")).unwrap()[0].module_version(),
            &mv("mid:S/1")
        );
        assert_eq!(
            graph.references_of(&mv("mid:S/1")).unwrap()[0].module_version(),
            &mv("leaf:S/2")
        );
    }

    #[test]
    fn queries_fail_on_unknown_vertices() {
        let graph = ReferenceGraph::new();
        let unknown = mv("nope:S/1");
        assert!(!graph.contains(&unknown));
        assert!(matches!(
            graph.references_of(&unknown),
            Err(GraphError::UnknownModuleVersion(_))
        ));
        assert!(graph.referrers_of(&unknown).is_err());
        assert!(graph.is_root(&unknown).is_err());
        assert!(graph.is_matched(&unknown).is_err());
    }

    #[test]
    fn module_version_listing_with_filter() {
        let mut graph = ReferenceGraph::new();
        graph.add_reference(mv("a:S/1"), Reference::new(mv("b:S/1")));
        graph.add_reference(mv("a:S/2"), Reference::new(mv("b:S/1")));

        assert_eq!(graph.module_versions(None).len(), 3);
        let a_path: NodePath = "a".parse().unwrap();
        let versions = graph.module_versions(Some(&a_path));
        assert_eq!(versions, [&mv("a:S/1"), &mv("a:S/2")]);
        let elsewhere: NodePath = "zzz".parse().unwrap();
        assert!(graph.module_versions(Some(&elsewhere)).is_empty());
    }

    #[test]
    fn root_registration_is_idempotent() {
        let mut graph = ReferenceGraph::new();
        graph.add_root_module_version(mv("r:D/main"));
        graph.add_root_module_version(mv("r:D/main"));
        assert_eq!(graph.roots().len(), 1);
        assert!(graph.references_of(&mv("r:D/main")).unwrap().is_empty());
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    const POOL: usize = 6;

    fn mv(index: usize) -> ModuleVersion {
        format!("m{index}:S/1").parse().unwrap()
    }

    fn edges() -> impl Strategy<Value = Vec<(usize, usize)>> {
        prop::collection::vec((0..POOL, 0..POOL), 0..32)
    }

    proptest! {
        #[test]
        fn edge_symmetry_holds_for_arbitrary_graphs(edges in edges()) {
            let mut graph = ReferenceGraph::new();
            for &(from, to) in &edges {
                graph.add_reference(mv(from), Reference::new(mv(to)));
            }
            for &(from, to) in &edges {
                let forward = graph.references_of(&mv(from)).unwrap();
                prop_assert!(forward.iter().any(|r| r.module_version() == &mv(to)));
                let backward = graph.referrers_of(&mv(to)).unwrap();
                prop_assert!(backward.iter().any(|r| r.module_version() == &mv(from)));
            }
        }

        #[test]
        fn double_insertion_changes_nothing(edges in edges()) {
            let mut graph = ReferenceGraph::new();
            for &(from, to) in &edges {
                graph.add_reference(mv(from), Reference::new(mv(to)));
            }
            let sizes: Vec<(usize, usize)> = (0..POOL)
                .filter(|&i| graph.contains(&mv(i)))
                .map(|i| {
                    (
                        graph.references_of(&mv(i)).unwrap().len(),
                        graph.referrers_of(&mv(i)).unwrap().len(),
                    )
                })
                .collect();
            for &(from, to) in &edges {
                graph.add_reference(mv(from), Reference::new(mv(to)));
            }
            let after: Vec<(usize, usize)> = (0..POOL)
                .filter(|&i| graph.contains(&mv(i)))
                .map(|i| {
                    (
                        graph.references_of(&mv(i)).unwrap().len(),
                        graph.referrers_of(&mv(i)).unwrap().len(),
                    )
                })
                .collect();
            prop_assert_eq!(sizes, after);
        }
    }
}
