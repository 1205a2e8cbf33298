//! Configuration transfer objects and the optimistic-lock mutation
//! protocol.
//!
//! A read returns the node's configuration as a DTO plus a [`LockHandle`]
//! capturing the node's revision. A later apply validates first and
//! mutates only when everything passes — a stale handle or a sibling name
//! collision leaves the node untouched. Every successful apply bumps the
//! revision by exactly one.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::{PluginConfig, PropertyConfig};
use crate::error::{ConfigurationError, ModelError, Result};
use crate::model::{build_plugin_map, build_property_map, Model};
use crate::node::{NodeId, NodeState};
use crate::path;

/// Opaque optimistic-lock handle obtained from a configuration read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHandle {
    revision: u64,
}

impl LockHandle {
    pub(crate) fn new(revision: u64) -> Self {
        Self { revision }
    }

    pub fn revision(self) -> u64 {
        self.revision
    }
}

/// In-memory DTO carrying a node's name, ordered property list, and
/// ordered plugin-binding list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfigTransfer {
    pub name: String,
    pub properties: Vec<PropertyConfig>,
    pub plugins: Vec<PluginConfig>,
}

impl Model {
    /// Read a node's configuration, together with a fresh lock handle for
    /// a later [`apply_config_transfer`](Model::apply_config_transfer).
    pub fn config_transfer(&self, node: NodeId) -> Result<(NodeConfigTransfer, LockHandle)> {
        let data = self.ensure_live(node, "read configuration")?;
        let properties = data
            .properties
            .iter()
            .map(|(name, def)| PropertyConfig {
                name: name.clone(),
                value: def.value.clone(),
                only_this_node: def.only_this_node,
            })
            .collect();
        let plugins = data
            .plugins
            .iter()
            .map(|((capability, plugin_id), def)| PluginConfig {
                capability: *capability,
                plugin_id: plugin_id.clone(),
                implementation: def.implementation.clone(),
                only_this_node: def.only_this_node,
            })
            .collect();
        let transfer = NodeConfigTransfer {
            name: data.name.clone(),
            properties,
            plugins,
        };
        Ok((transfer, LockHandle::new(data.revision)))
    }

    /// Apply a configuration transfer to a node.
    ///
    /// Validation order: lock freshness, name validity, sibling duplicate
    /// check, property/plugin list consistency. Nothing is mutated unless
    /// all of it passes. On the first successful apply a `ConfigNew` node
    /// is committed to its parent's child map and transitions to `Config`
    /// (running the node-init chain); a dynamically created node is
    /// promoted to `Config`.
    #[instrument(level = "debug", skip(self, transfer, lock))]
    pub fn apply_config_transfer(
        &mut self,
        node: NodeId,
        transfer: &NodeConfigTransfer,
        lock: Option<LockHandle>,
    ) -> Result<LockHandle> {
        let data = self.ensure_live(node, "apply configuration")?;
        let state = data.state;
        let parent = data.parent;
        let old_name = data.name.clone();

        if let Some(lock) = lock {
            if lock.revision != data.revision {
                return Err(ModelError::OptimisticLock {
                    path: self.path_of(node),
                    held: lock.revision,
                    current: data.revision,
                });
            }
        }

        let renaming = transfer.name != old_name;
        if renaming || state == NodeState::ConfigNew {
            let Some(parent) = parent else {
                return Err(ConfigurationError::Invalid(
                    "the root node cannot be renamed".to_string(),
                )
                .into());
            };
            if !path::is_valid_name(&transfer.name) {
                return Err(ConfigurationError::Invalid(format!(
                    "invalid node name {:?}",
                    transfer.name
                ))
                .into());
            }
            if self.data(parent).children.contains_key(&transfer.name) {
                return Err(ModelError::DuplicateNode {
                    parent: self.path_of(parent),
                    name: transfer.name.clone(),
                });
            }
        }

        let path = self.path_of(node);
        let kind = self.data(node).kind;
        let properties = build_property_map(&path, &transfer.properties)?;
        let plugins = build_plugin_map(&path, kind, &transfer.plugins)?;

        // Validation passed — mutate.
        {
            let data = self.data_mut(node);
            data.name = transfer.name.clone();
            data.properties = properties;
            data.plugins = plugins;
            data.revision += 1;
        }

        match state {
            NodeState::ConfigNew => {
                // Commit to the tree: appended after existing children.
                if let Some(parent) = parent {
                    self.data_mut(parent)
                        .children
                        .insert(transfer.name.clone(), node);
                }
            }
            _ if renaming => {
                // Re-key the parent's child map, preserving the position.
                if let Some(parent) = parent {
                    let children = &mut self.data_mut(parent).children;
                    if let Some(index) = children.get_index_of(&old_name) {
                        children.shift_remove(&old_name);
                        children.insert(transfer.name.clone(), node);
                        let last = children.len() - 1;
                        children.move_index(last, index);
                    }
                }
            }
            _ => {}
        }

        // Identity-relevant state changed; cached paths and resolutions in
        // the subtree are stale.
        self.clean_caches(node);

        if matches!(state, NodeState::ConfigNew | NodeState::DynamicallyCreated) {
            self.data_mut(node).state = NodeState::Config;
            debug!(node = %self.path_of(node), ?state, "node transitioned to Config");
            if state == NodeState::ConfigNew {
                self.run_init_plugins(node)?;
            }
        }

        Ok(LockHandle::new(self.data(node).revision))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::node::NodeKind;
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

    const TWO_SIBLINGS: &str = r#"
        [[root.children]]
        name = "x"
        module = true
        [[root.children.properties]]
        name = "P"
        value = "1"

        [[root.children]]
        name = "y"
        module = true
    "#;

    #[test]
    fn stale_lock_is_rejected_without_mutation() {
        let mut m = model(TWO_SIBLINGS);
        let x = node(&mut m, "x");
        let (mut transfer, stale) = m.config_transfer(x).unwrap();

        // External mutation bumps the revision.
        let (other, fresh) = m.config_transfer(x).unwrap();
        m.apply_config_transfer(x, &other, Some(fresh)).unwrap();

        transfer.properties[0].value = Some("2".to_string());
        let err = m
            .apply_config_transfer(x, &transfer, Some(stale))
            .unwrap_err();
        assert!(matches!(err, ModelError::OptimisticLock { .. }));
        // Visible state unchanged by the failed apply.
        assert_eq!(m.property(x, "P").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn revision_bumps_by_one_per_apply() {
        let mut m = model(TWO_SIBLINGS);
        let x = node(&mut m, "x");
        let (transfer, lock) = m.config_transfer(x).unwrap();
        assert_eq!(lock.revision(), 0);
        let lock = m.apply_config_transfer(x, &transfer, Some(lock)).unwrap();
        assert_eq!(lock.revision(), 1);
        let lock = m.apply_config_transfer(x, &transfer, Some(lock)).unwrap();
        assert_eq!(lock.revision(), 2);
    }

    #[test]
    fn rename_to_sibling_name_fails_atomically() {
        let mut m = model(TWO_SIBLINGS);
        let x = node(&mut m, "x");
        let (mut transfer, lock) = m.config_transfer(x).unwrap();
        transfer.name = "y".to_string();
        transfer.properties[0].value = Some("2".to_string());
        let err = m
            .apply_config_transfer(x, &transfer, Some(lock))
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateNode { .. }));
        assert_eq!(m.name(x), "x");
        // The property change was part of the failed transfer.
        assert_eq!(m.property(x, "P").unwrap().as_deref(), Some("1"));
        assert_eq!(m.revision(x), 0);
    }

    #[test]
    fn rename_preserves_child_order() {
        let mut m = model(TWO_SIBLINGS);
        let x = node(&mut m, "x");
        let (mut transfer, lock) = m.config_transfer(x).unwrap();
        transfer.name = "renamed".to_string();
        m.apply_config_transfer(x, &transfer, Some(lock)).unwrap();

        let root = m.root();
        let names: Vec<String> = m
            .children(root)
            .unwrap()
            .into_iter()
            .map(|id| m.name(id).to_string())
            .collect();
        assert_eq!(names, ["renamed", "y"]);
        assert_eq!(
            m.node_path(x).unwrap().to_string(),
            "renamed",
            "cached path must be invalidated by the rename"
        );
    }

    #[test]
    fn config_new_commits_on_first_apply() {
        let mut m = model(TWO_SIBLINGS);
        let root = m.root();
        let fresh = m.new_child_node(root, NodeKind::Module).unwrap();
        assert_eq!(m.state(fresh), NodeState::ConfigNew);
        // Not committed yet: reads fail, the tree does not list it.
        assert!(m.property(fresh, "P").is_err());
        assert_eq!(m.children(root).unwrap().len(), 2);

        let transfer = NodeConfigTransfer {
            name: "z".to_string(),
            ..NodeConfigTransfer::default()
        };
        m.apply_config_transfer(fresh, &transfer, None).unwrap();
        assert_eq!(m.state(fresh), NodeState::Config);
        assert_eq!(m.children(root).unwrap().len(), 3);
        assert_eq!(m.node_path(fresh).unwrap().to_string(), "z");
    }

    #[test]
    fn config_new_duplicate_name_is_rejected() {
        let mut m = model(TWO_SIBLINGS);
        let root = m.root();
        let fresh = m.new_child_node(root, NodeKind::Module).unwrap();
        let transfer = NodeConfigTransfer {
            name: "x".to_string(),
            ..NodeConfigTransfer::default()
        };
        let err = m.apply_config_transfer(fresh, &transfer, None).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateNode { .. }));
        assert_eq!(m.state(fresh), NodeState::ConfigNew);
    }

    #[test]
    fn deleted_node_rejects_everything_but_introspection() {
        let mut m = model(TWO_SIBLINGS);
        let x = node(&mut m, "x");
        m.delete(x).unwrap();
        assert_eq!(m.state(x), NodeState::Deleted);
        assert!(m.config_transfer(x).is_err());
        assert!(m.property(x, "P").is_err());
        assert!(m.node_path(x).is_err());
        let root = m.root();
        assert_eq!(m.children(root).unwrap().len(), 1);
    }
}
