//! Static model configuration — the tree the node hierarchy is lazily
//! materialized from, plus the init-property override store.
//!
//! Matches a TOML document of nested node tables:
//!
//! ```toml
//! [[root.children]]
//! name = "domain"
//!
//! [[root.children.properties]]
//! name = "builder"
//! value = "maven"
//!
//! [[root.children.children]]
//! name = "my-module"
//! module = true
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::path::NodePath;
use crate::plugin::Capability;

/// One property definition on a node.
///
/// `value == None` is an *explicit null*: it blocks further inheritance
/// rather than leaving the property undefined. `only_this_node` suppresses
/// inheritance to descendants entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyConfig {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub only_this_node: bool,
}

/// One plugin binding on a node, keyed by `(capability, plugin_id)`.
///
/// `implementation == None` explicitly removes the capability for this
/// subtree (blocks inheritance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfig {
    pub capability: Capability,
    #[serde(default)]
    pub plugin_id: Option<String>,
    #[serde(default)]
    pub implementation: Option<String>,
    #[serde(default)]
    pub only_this_node: bool,
}

/// Configuration for one node of the tree. `module = true` marks a leaf
/// module; everything else is a classification node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub module: bool,
    #[serde(default)]
    pub properties: Vec<PropertyConfig>,
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
    #[serde(default)]
    pub children: Vec<NodeConfig>,
}

/// The whole model configuration. The root table configures the root
/// classification node; its name is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub root: NodeConfig,
}

impl ModelConfig {
    /// Parse a model configuration from a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }
}

/// Key prefix for init-property overrides. The full key is the prefix
/// followed by the node's dotted path segments and the property name.
pub const INIT_PROPERTY_PREFIX: &str = "dragom.model-property.";

/// Initialization-property overrides, checked before the inheritance walk.
///
/// Keys are [`INIT_PROPERTY_PREFIX`] followed by
/// `<dotted node path>.<property name>` (just `<property name>` after the
/// prefix for the root). When resolving a property for a node, the most
/// specific key present wins: the full path is tried first, then each
/// shorter path prefix, then the path-less key. An override value is
/// returned as-is — no `$parent$` expansion and no inheritance walk.
/// Unprefixed keys never match.
#[derive(Debug, Clone, Default)]
pub struct InitProperties {
    entries: HashMap<String, String>,
}

impl InitProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the most specific override for `name` at `path`.
    pub fn lookup(&self, path: &NodePath, name: &str) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let segments = path.segments();
        for prefix_len in (0..=segments.len()).rev() {
            let key = if prefix_len == 0 {
                format!("{INIT_PROPERTY_PREFIX}{name}")
            } else {
                format!(
                    "{INIT_PROPERTY_PREFIX}{}.{name}",
                    segments[..prefix_len].join(".")
                )
            };
            if let Some(value) = self.entries.get(&key) {
                return Some(value);
            }
        }
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_tree() {
        let config = ModelConfig::from_toml_str(
            r#"
            [[root.properties]]
            name = "builder"
            value = "maven"

            [[root.children]]
            name = "domain"

            [[root.children.children]]
            name = "app"
            module = true
            "#,
        )
        .unwrap();

        assert_eq!(config.root.properties.len(), 1);
        assert_eq!(config.root.children.len(), 1);
        let domain = &config.root.children[0];
        assert_eq!(domain.name, "domain");
        assert!(!domain.module);
        assert!(domain.children[0].module);
    }

    #[test]
    fn parses_plugin_bindings() {
        let config = ModelConfig::from_toml_str(
            r#"
            [[root.plugins]]
            capability = "node-init"
            implementation = "default-init"
            "#,
        )
        .unwrap();

        let plugin = &config.root.plugins[0];
        assert_eq!(plugin.capability, Capability::NodeInit);
        assert_eq!(plugin.implementation.as_deref(), Some("default-init"));
        assert_eq!(plugin.plugin_id, None);
    }

    #[test]
    fn init_property_specificity() {
        let mut init = InitProperties::new();
        init.set(format!("{INIT_PROPERTY_PREFIX}builder"), "root-level");
        init.set(format!("{INIT_PROPERTY_PREFIX}a.b.builder"), "node-level");

        let deep: NodePath = "a/b/c".parse().unwrap();
        // a.b.c.builder absent, a.b.builder present: longer prefix wins.
        assert_eq!(init.lookup(&deep, "builder"), Some("node-level"));

        let elsewhere: NodePath = "x/y".parse().unwrap();
        assert_eq!(init.lookup(&elsewhere, "builder"), Some("root-level"));
        assert_eq!(init.lookup(&elsewhere, "other"), None);
    }

    #[test]
    fn init_property_keys_require_the_prefix() {
        let mut init = InitProperties::new();
        init.set("builder", "unprefixed");
        init.set("a.builder", "unprefixed");

        let path: NodePath = "a/b".parse().unwrap();
        assert_eq!(init.lookup(&path, "builder"), None);
    }
}
