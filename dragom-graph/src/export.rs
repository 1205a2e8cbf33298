//! JSON export of a reference graph for downstream tooling and
//! visualization.
//!
//! One entry per vertex, in insertion order, with root/matched flags and
//! the outgoing reference list. Module versions use their literal form so
//! the document round-trips through the same parsers as configuration.

use serde_json::{json, Value};

use crate::graph::ReferenceGraph;
use crate::reference::Reference;

impl ReferenceGraph {
    /// Serialize the graph to a JSON document.
    pub fn to_json(&self) -> Value {
        let module_versions: Vec<Value> = self
            .nodes
            .iter()
            .map(|(module_version, node)| {
                let references: Vec<Value> = node
                    .references
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .map(reference_to_json)
                    .collect();
                json!({
                    "module-version": module_version.to_string(),
                    "module-path": module_version.module_path().to_string(),
                    "root": self.roots().contains(module_version),
                    "matched": self.matched.contains(module_version),
                    "references": references,
                })
            })
            .collect();
        json!({ "module-versions": module_versions })
    }
}

fn reference_to_json(reference: &Reference) -> Value {
    match reference.artifact_coordinate() {
        Some(coordinate) => json!({
            "module-version": reference.module_version().to_string(),
            "artifact": coordinate.to_string(),
        }),
        None => json!({
            "module-version": reference.module_version().to_string(),
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferencePath;
    use crate::version::ModuleVersion;

    fn mv(literal: &str) -> ModuleVersion {
        literal.parse().unwrap()
    }

    #[test]
    fn exports_vertices_in_insertion_order() {
        let mut graph = ReferenceGraph::new();
        let path = ReferencePath::with_references(
            mv("root:D/main"),
            vec![Reference::with_artifact(
                mv("leaf:S/1"),
                "com.acme:widget:1.0".parse().unwrap(),
            )],
        );
        graph.add_matched_reference_path(&path);

        let document = graph.to_json();
        let vertices = document["module-versions"].as_array().unwrap();
        assert_eq!(vertices.len(), 2);

        assert_eq!(vertices[0]["module-version"], "root:D/main");
        assert_eq!(vertices[0]["root"], true);
        assert_eq!(vertices[0]["matched"], false);
        let references = vertices[0]["references"].as_array().unwrap();
        assert_eq!(references[0]["module-version"], "leaf:S/1");
        assert_eq!(references[0]["artifact"], "com.acme:widget:1.0");

        assert_eq!(vertices[1]["module-version"], "leaf:S/1");
        assert_eq!(vertices[1]["root"], false);
        assert_eq!(vertices[1]["matched"], true);
        assert!(vertices[1]["references"].as_array().unwrap().is_empty());
    }
}
