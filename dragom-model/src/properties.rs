//! Inheritance-based property resolution.
//!
//! Resolution order for `property(node, name)`:
//!
//! 1. Init-property overrides, most specific dotted key first. A hit is
//!    returned verbatim — no inheritance walk, no `$parent$` expansion.
//! 2. Ancestor walk from the node to the root. The first ancestor defining
//!    the name wins, subject to the only-this-node suppression rule; an
//!    explicit null value blocks further inheritance.
//! 3. `$parent$` markers in the winning value expand to the property
//!    resolved on the *defining* node's parent (empty string at the root),
//!    which lets list-like properties accumulate across levels.
//!
//! "Defined as null" and "not defined at all" both observe as `None` from
//! [`Model::property`]; [`Model::property_defined`] tells them apart.

use tracing::trace;

use crate::error::Result;
use crate::model::Model;
use crate::node::NodeId;

/// Literal marker replaced by the value inherited from the defining node's
/// parent.
pub const PARENT_PROPERTY_MARKER: &str = "$parent$";

impl Model {
    /// Resolve a property for a node. `Ok(None)` means the property is
    /// undefined for this node, explicitly null, or suppressed by an
    /// only-this-node definition on an ancestor.
    pub fn property(&self, node: NodeId, name: &str) -> Result<Option<String>> {
        let data = self.ensure_readable(node, "resolve property")?;
        if let Some(cached) = data.property_cache.borrow().get(name) {
            return Ok(cached.clone());
        }
        let resolved = self.resolve_property(node, name)?;
        data.property_cache
            .borrow_mut()
            .insert(name.to_string(), resolved.clone());
        Ok(resolved)
    }

    /// Whether some definition (including an explicit null) applies to this
    /// node — distinguishes "explicitly null" from "undefined".
    pub fn property_defined(&self, node: NodeId, name: &str) -> Result<bool> {
        self.ensure_readable(node, "resolve property")?;
        if !self.init_properties.is_empty() {
            let path = self.node_path(node)?;
            if self.init_properties.lookup(&path, name).is_some() {
                return Ok(true);
            }
        }
        let mut current = node;
        loop {
            let data = self.data(current);
            if let Some(def) = data.properties.get(name) {
                return Ok(!(def.only_this_node && current != node));
            }
            match data.parent {
                Some(parent) => current = parent,
                None => return Ok(false),
            }
        }
    }

    fn resolve_property(&self, node: NodeId, name: &str) -> Result<Option<String>> {
        if !self.init_properties.is_empty() {
            let path = self.node_path(node)?;
            if let Some(value) = self.init_properties.lookup(&path, name) {
                trace!(%path, name, "property resolved from init overrides");
                return Ok(Some(value.to_string()));
            }
        }
        let mut current = node;
        loop {
            let data = self.data(current);
            if let Some(def) = data.properties.get(name) {
                if def.only_this_node && current != node {
                    trace!(name, "property suppressed by only-this-node ancestor");
                    return Ok(None);
                }
                let Some(raw) = &def.value else {
                    // Explicit null: inheritance stops here.
                    return Ok(None);
                };
                if raw.contains(PARENT_PROPERTY_MARKER) {
                    let inherited = match data.parent {
                        Some(parent) => self.property(parent, name)?.unwrap_or_default(),
                        None => String::new(),
                    };
                    return Ok(Some(raw.replace(PARENT_PROPERTY_MARKER, &inherited)));
                }
                return Ok(Some(raw.clone()));
            }
            match data.parent {
                Some(parent) => current = parent,
                None => return Ok(None),
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InitProperties, ModelConfig, INIT_PROPERTY_PREFIX};
    use crate::plugin::PluginRegistry;

    fn model(toml: &str) -> Model {
        Model::new(
            ModelConfig::from_toml_str(toml).unwrap(),
            PluginRegistry::new(),
        )
        .unwrap()
    }

    fn node(model: &mut Model, path: &str) -> NodeId {
        model.node_at(&path.parse().unwrap()).unwrap().unwrap()
    }

    #[test]
    fn inherits_from_ancestor() {
        let mut m = model(
            r#"
            [[root.properties]]
            name = "P"
            value = "1"

            [[root.children]]
            name = "child"
            module = true
            "#,
        );
        let child = node(&mut m, "child");
        assert_eq!(m.property(child, "P").unwrap().as_deref(), Some("1"));
        assert!(m.property_defined(child, "P").unwrap());
    }

    #[test]
    fn explicit_null_blocks_inheritance() {
        let mut m = model(
            r#"
            [[root.properties]]
            name = "P"
            value = "1"

            [[root.children]]
            name = "mid"
            [[root.children.properties]]
            name = "P"

            [[root.children.children]]
            name = "leaf"
            module = true
            "#,
        );
        let mid = node(&mut m, "mid/");
        let leaf = node(&mut m, "mid/leaf");
        assert_eq!(m.property(mid, "P").unwrap(), None);
        assert_eq!(m.property(leaf, "P").unwrap(), None);
        // Blocked, not undefined: the null definition still applies.
        assert!(m.property_defined(leaf, "P").unwrap());
    }

    #[test]
    fn only_this_node_does_not_inherit() {
        let mut m = model(
            r#"
            [[root.properties]]
            name = "P"
            value = "1"
            only_this_node = true

            [[root.children]]
            name = "child"
            module = true
            "#,
        );
        let root = m.root();
        let child = node(&mut m, "child");
        assert_eq!(m.property(root, "P").unwrap().as_deref(), Some("1"));
        assert_eq!(m.property(child, "P").unwrap(), None);
        assert!(!m.property_defined(child, "P").unwrap());
    }

    #[test]
    fn parent_marker_concatenates_levels() {
        let mut m = model(
            r#"
            [[root.properties]]
            name = "LIST"
            value = "a,b"

            [[root.children]]
            name = "child"
            [[root.children.properties]]
            name = "LIST"
            value = "$parent$,c"

            [[root.children.children]]
            name = "leaf"
            module = true
            [[root.children.children.properties]]
            name = "LIST"
            value = "$parent$,d"
            "#,
        );
        let child = node(&mut m, "child/");
        let leaf = node(&mut m, "child/leaf");
        assert_eq!(m.property(child, "LIST").unwrap().as_deref(), Some("a,b,c"));
        assert_eq!(
            m.property(leaf, "LIST").unwrap().as_deref(),
            Some("a,b,c,d")
        );
    }

    #[test]
    fn parent_marker_at_root_is_empty() {
        let mut m = model(
            r#"
            [[root.properties]]
            name = "LIST"
            value = "$parent$x"

            [[root.children]]
            name = "child"
            module = true
            "#,
        );
        let root = m.root();
        // Defined at the root: no parent, marker expands to the empty string.
        assert_eq!(m.property(root, "LIST").unwrap().as_deref(), Some("x"));
        let child = node(&mut m, "child");
        // Inherited by the child, expansion still happens against the
        // defining node's (absent) parent.
        assert_eq!(m.property(child, "LIST").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn init_override_most_specific_wins() {
        let config = ModelConfig::from_toml_str(
            r#"
            [[root.properties]]
            name = "P"
            value = "from-config"

            [[root.children]]
            name = "a"
            [[root.children.children]]
            name = "b"
            module = true
            "#,
        )
        .unwrap();
        let mut init = InitProperties::new();
        init.set(format!("{INIT_PROPERTY_PREFIX}P"), "generic");
        init.set(format!("{INIT_PROPERTY_PREFIX}a.b.P"), "specific");
        let mut m =
            Model::with_init_properties(config, PluginRegistry::new(), init).unwrap();
        let b = node(&mut m, "a/b");
        assert_eq!(m.property(b, "P").unwrap().as_deref(), Some("specific"));
        let a = node(&mut m, "a/");
        assert_eq!(m.property(a, "P").unwrap().as_deref(), Some("generic"));
        assert!(m.property_defined(a, "P").unwrap());
    }

    #[test]
    fn undefined_everywhere_is_none() {
        let mut m = model(
            r#"
            [[root.children]]
            name = "child"
            module = true
            "#,
        );
        let child = node(&mut m, "child");
        assert_eq!(m.property(child, "nope").unwrap(), None);
        assert!(!m.property_defined(child, "nope").unwrap());
    }

    #[test]
    fn cache_is_dropped_by_clean_caches() {
        let mut m = model(
            r#"
            [[root.properties]]
            name = "P"
            value = "1"

            [[root.children]]
            name = "child"
            module = true
            "#,
        );
        let child = node(&mut m, "child");
        assert_eq!(m.property(child, "P").unwrap().as_deref(), Some("1"));
        assert!(m
            .data(child)
            .property_cache
            .borrow()
            .contains_key("P"));
        m.clean_caches(m.root());
        assert!(!m
            .data(child)
            .property_cache
            .borrow()
            .contains_key("P"));
    }
}
