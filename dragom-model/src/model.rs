//! The model — an arena of classification and module nodes.
//!
//! The tree is materialized lazily from a [`ModelConfig`]: a classification
//! node's children are created the first time they are listed or looked up.
//! Children absent from configuration can be fabricated at runtime through
//! the `UndefinedDescendant` capability (typically by probing the SCM).
//!
//! The model is a single-threaded, cooperatively used structure: callers
//! serialize mutation against reads. Nothing here blocks on I/O — plugins
//! invoked during materialization may, but that is their business.

use std::cell::RefCell;
use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;

use crate::artifact::ArtifactCoordinate;
use crate::config::{InitProperties, ModelConfig, NodeConfig, PluginConfig, PropertyConfig};
use crate::error::{ConfigurationError, ModelError, Result};
use crate::node::{NodeData, NodeId, NodeKind, NodeState, PluginDef, PluginKey, PropertyDef};
use crate::path::{self, NodePath};
use crate::plugin::{Capability, PluginRegistry};

/// The node hierarchy plus everything resolution needs: the plugin
/// registry, init-property overrides, and the artifact reverse index.
#[derive(Debug)]
pub struct Model {
    pub(crate) nodes: Vec<NodeData>,
    pub(crate) root: NodeId,
    pub(crate) registry: PluginRegistry,
    pub(crate) init_properties: InitProperties,
    /// Artifact coordinate → module node, populated by
    /// [`Model::module_for_artifact`] and dropped by [`Model::clean_caches`].
    pub(crate) artifact_index: RefCell<HashMap<ArtifactCoordinate, NodeId>>,
}

impl Model {
    /// Build a model from configuration with no init-property overrides.
    pub fn new(config: ModelConfig, registry: PluginRegistry) -> Result<Self> {
        Self::with_init_properties(config, registry, InitProperties::new())
    }

    /// Build a model from configuration plus init-property overrides.
    pub fn with_init_properties(
        config: ModelConfig,
        registry: PluginRegistry,
        init_properties: InitProperties,
    ) -> Result<Self> {
        let root_path = NodePath::root();
        let mut root_data = NodeData::new(
            String::new(),
            None,
            NodeKind::Classification,
            NodeState::Config,
        );
        root_data.properties = build_property_map(&root_path, &config.root.properties)?;
        root_data.plugins =
            build_plugin_map(&root_path, NodeKind::Classification, &config.root.plugins)?;
        root_data.config_children = config.root.children;

        let mut model = Self {
            nodes: vec![root_data],
            root: NodeId(0),
            registry,
            init_properties,
            artifact_index: RefCell::new(HashMap::new()),
        };
        model.run_init_plugins(model.root)?;
        Ok(model)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    // ── Introspection (allowed in every lifecycle state) ──────────────

    pub fn state(&self, id: NodeId) -> NodeState {
        self.data(id).state
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.data(id).kind
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.data(id).name
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).parent
    }

    pub fn revision(&self, id: NodeId) -> u64 {
        self.data(id).revision
    }

    /// Resolved path of a node, cached until the next identity-relevant
    /// mutation.
    pub fn node_path(&self, id: NodeId) -> Result<NodePath> {
        let data = self.ensure_live(id, "resolve node path")?;
        if data.state == NodeState::ConfigNew {
            return Err(self.illegal_state(id, "resolve node path"));
        }
        if let Some(path) = data.path_cache.borrow().clone() {
            return Ok(path);
        }
        let path = match data.parent {
            None => NodePath::root(),
            Some(parent) => {
                let parent_path = self.node_path(parent)?;
                match data.kind {
                    NodeKind::Classification => parent_path.child_partial(&data.name)?,
                    NodeKind::Module => parent_path.child_module(&data.name)?,
                }
            }
        };
        *data.path_cache.borrow_mut() = Some(path.clone());
        Ok(path)
    }

    // ── Children ──────────────────────────────────────────────────────

    /// Ordered child list: configuration-declared children first, then
    /// dynamically created ones in creation order. Triggers one-time
    /// materialization from configuration. Modules have no children.
    pub fn children(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        self.ensure_readable(id, "list children")?;
        if self.data(id).kind == NodeKind::Module {
            return Ok(Vec::new());
        }
        self.materialize_children(id)?;
        Ok(self.data(id).children.values().copied().collect())
    }

    /// Look up a child by name among configuration-backed and already
    /// materialized children. Never consults the undefined-descendant
    /// capability; absence is `Ok(None)`.
    pub fn child(&mut self, id: NodeId, name: &str) -> Result<Option<NodeId>> {
        self.ensure_readable(id, "look up child")?;
        if self.data(id).kind == NodeKind::Module {
            return Ok(None);
        }
        self.materialize_children(id)?;
        Ok(self.data(id).children.get(name).copied())
    }

    /// Look up a classification-node child, fabricating it through the
    /// `UndefinedDescendant` capability if configuration does not declare
    /// it. `Ok(None)` means "no such descendant" — a normal outcome.
    pub fn classification_child_dynamic(
        &mut self,
        parent: NodeId,
        name: &str,
    ) -> Result<Option<NodeId>> {
        self.dynamic_child(parent, name, NodeKind::Classification)
    }

    /// Module flavor of [`Model::classification_child_dynamic`].
    pub fn module_child_dynamic(&mut self, parent: NodeId, name: &str) -> Result<Option<NodeId>> {
        self.dynamic_child(parent, name, NodeKind::Module)
    }

    fn dynamic_child(
        &mut self,
        parent: NodeId,
        name: &str,
        kind: NodeKind,
    ) -> Result<Option<NodeId>> {
        self.ensure_readable(parent, "look up child")?;
        if self.data(parent).kind == NodeKind::Module {
            return Ok(None);
        }
        self.materialize_children(parent)?;
        if let Some(&child) = self.data(parent).children.get(name) {
            // A child of the other kind masks the name; it is not an error.
            return Ok((self.data(child).kind == kind).then_some(child));
        }
        if !self.plugin_exists(parent, Capability::UndefinedDescendant, None)? {
            return Ok(None);
        }
        let instance = self.plugin(parent, Capability::UndefinedDescendant, None)?;
        let Some(handler) = instance.as_undefined_descendant() else {
            // plugin() validates the capability; a mismatch here means the
            // registry entry lied about what it constructs.
            return Err(ConfigurationError::CapabilityMismatch {
                path: self.path_of(parent),
                implementation: String::from("<constructed>"),
                declared: instance.capability(),
                requested: Capability::UndefinedDescendant,
            }
            .into());
        };
        let created = match kind {
            NodeKind::Classification => handler.request_classification_node(self, parent, name)?,
            NodeKind::Module => handler.request_module(self, parent, name)?,
        };
        if let Some(id) = created {
            self.complete_dynamic(id)?;
            debug!(node = %self.path_of(id), "dynamically created node");
        }
        Ok(created)
    }

    /// Walk a path from the root using only configuration-backed children.
    pub fn node_at(&mut self, path: &NodePath) -> Result<Option<NodeId>> {
        self.walk_path(path, false)
    }

    /// Walk a path from the root, fabricating undefined descendants along
    /// the way where a handler is bound.
    pub fn node_at_dynamic(&mut self, path: &NodePath) -> Result<Option<NodeId>> {
        self.walk_path(path, true)
    }

    fn walk_path(&mut self, path: &NodePath, dynamic: bool) -> Result<Option<NodeId>> {
        let mut current = self.root;
        let last = path.len().checked_sub(1);
        for (index, segment) in path.segments().iter().enumerate() {
            let expected = if Some(index) == last && !path.is_partial() {
                NodeKind::Module
            } else {
                NodeKind::Classification
            };
            let next = if dynamic {
                self.dynamic_child(current, segment, expected)?
            } else {
                self.child(current, segment)?
                    .filter(|&id| self.data(id).kind == expected)
            };
            match next {
                Some(id) => current = id,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    // ── Authoring and dynamic creation ────────────────────────────────

    /// Create a new node in the `ConfigNew` state. It is not part of the
    /// tree until its first successful
    /// [`apply_config_transfer`](Model::apply_config_transfer).
    pub fn new_child_node(&mut self, parent: NodeId, kind: NodeKind) -> Result<NodeId> {
        self.ensure_readable(parent, "author child node")?;
        if self.data(parent).kind != NodeKind::Classification {
            return Err(self.illegal_state(parent, "author child node"));
        }
        // The commit-time duplicate check needs the sibling map populated.
        self.materialize_children(parent)?;
        Ok(self.push(NodeData::new(
            String::new(),
            Some(parent),
            kind,
            NodeState::ConfigNew,
        )))
    }

    /// Create a dynamic classification node under `parent`. Called by
    /// `UndefinedDescendant` handlers; the node starts in
    /// `DynamicallyBeingCompleted` and the model finishes the transition
    /// once the handler returns it.
    pub fn create_dynamic_classification(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        self.create_dynamic(parent, name, NodeKind::Classification)
    }

    /// Module flavor of [`Model::create_dynamic_classification`].
    pub fn create_dynamic_module(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        self.create_dynamic(parent, name, NodeKind::Module)
    }

    fn create_dynamic(&mut self, parent: NodeId, name: &str, kind: NodeKind) -> Result<NodeId> {
        self.ensure_readable(parent, "create dynamic child")?;
        if self.data(parent).kind != NodeKind::Classification {
            return Err(self.illegal_state(parent, "create dynamic child"));
        }
        if !path::is_valid_name(name) {
            return Err(ConfigurationError::Invalid(format!("invalid node name {name:?}")).into());
        }
        self.materialize_children(parent)?;
        if self.data(parent).children.contains_key(name) {
            return Err(ModelError::DuplicateNode {
                parent: self.path_of(parent),
                name: name.to_string(),
            });
        }
        let id = self.push(NodeData::new(
            name.to_string(),
            Some(parent),
            kind,
            NodeState::DynamicallyBeingCompleted,
        ));
        // Appended after configuration-derived children.
        self.data_mut(parent).children.insert(name.to_string(), id);
        Ok(id)
    }

    fn complete_dynamic(&mut self, id: NodeId) -> Result<()> {
        let data = self.data_mut(id);
        if data.state == NodeState::DynamicallyBeingCompleted {
            data.state = NodeState::DynamicallyCreated;
            self.run_init_plugins(id)?;
        }
        Ok(())
    }

    // ── Deletion and cache invalidation ───────────────────────────────

    /// Delete a node: remove it from its parent's child map and mark every
    /// materialized descendant deleted, children before parents, so
    /// dangling handles cannot be used.
    pub fn delete(&mut self, id: NodeId) -> Result<()> {
        let data = self.ensure_live(id, "delete")?;
        let Some(parent) = data.parent else {
            return Err(self.illegal_state(id, "delete the root node"));
        };
        debug!(node = %self.path_of(id), "deleting node");
        if data.state != NodeState::ConfigNew {
            let name = data.name.clone();
            self.data_mut(parent).children.shift_remove(&name);
        }
        self.mark_deleted(id);
        self.artifact_index.borrow_mut().clear();
        Ok(())
    }

    fn mark_deleted(&mut self, id: NodeId) {
        let children: Vec<NodeId> = self.data(id).children.values().copied().collect();
        for child in children {
            self.mark_deleted(child);
        }
        let data = self.data_mut(id);
        data.state = NodeState::Deleted;
        data.children.clear();
        data.config_children.clear();
        data.clear_caches();
    }

    /// Invalidate cached derived data for a node and all its materialized
    /// descendants (descendants first — their cached paths depend on
    /// ancestor identity), then drop the model-level artifact index.
    pub fn clean_caches(&self, id: NodeId) {
        self.clean_caches_subtree(id);
        self.artifact_index.borrow_mut().clear();
    }

    fn clean_caches_subtree(&self, id: NodeId) {
        for &child in self.data(id).children.values() {
            self.clean_caches_subtree(child);
        }
        self.data(id).clear_caches();
    }

    // ── Materialization ───────────────────────────────────────────────

    fn materialize_children(&mut self, id: NodeId) -> Result<()> {
        if self.data(id).children_materialized {
            return Ok(());
        }
        // Flag first: init plugins running below may list children again.
        self.data_mut(id).children_materialized = true;
        let configs = std::mem::take(&mut self.data_mut(id).config_children);
        debug!(node = %self.path_of(id), count = configs.len(), "materializing children");
        let mut created = Vec::with_capacity(configs.len());
        for config in configs {
            created.push(self.insert_config_child(id, config)?);
        }
        for child in created {
            self.run_init_plugins(child)?;
        }
        Ok(())
    }

    fn insert_config_child(&mut self, parent: NodeId, config: NodeConfig) -> Result<NodeId> {
        if config.name.is_empty() {
            return Err(ConfigurationError::Invalid(format!(
                "unnamed child node under {}",
                self.path_of(parent)
            ))
            .into());
        }
        if self.data(parent).children.contains_key(&config.name) {
            return Err(ModelError::DuplicateNode {
                parent: self.path_of(parent),
                name: config.name,
            });
        }
        let kind = if config.module {
            NodeKind::Module
        } else {
            NodeKind::Classification
        };
        if config.module && !config.children.is_empty() {
            return Err(ConfigurationError::Invalid(format!(
                "module {:?} declares children",
                config.name
            ))
            .into());
        }
        let child_path = match kind {
            NodeKind::Classification => self.path_of(parent).child_partial(&config.name)?,
            NodeKind::Module => self.path_of(parent).child_module(&config.name)?,
        };
        let mut data = NodeData::new(config.name.clone(), Some(parent), kind, NodeState::Config);
        data.properties = build_property_map(&child_path, &config.properties)?;
        data.plugins = build_plugin_map(&child_path, kind, &config.plugins)?;
        data.config_children = config.children;
        let id = self.push(data);
        self.data_mut(parent).children.insert(config.name, id);
        Ok(id)
    }

    /// Run the node-initialization chain in declared plugin-id order.
    pub(crate) fn run_init_plugins(&mut self, node: NodeId) -> Result<()> {
        for plugin_id in self.plugin_ids(node, Capability::NodeInit)? {
            let instance = self.plugin(node, Capability::NodeInit, plugin_id.as_deref())?;
            if let Some(plugin) = instance.as_node_init() {
                plugin.init(self, node)?;
            }
        }
        Ok(())
    }

    // ── Internal helpers ──────────────────────────────────────────────

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).expect("node arena exceeds u32::MAX"));
        self.nodes.push(data);
        id
    }

    pub(crate) fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0 as usize]
    }

    pub(crate) fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0 as usize]
    }

    /// Best-effort path for diagnostics; works in any lifecycle state.
    pub(crate) fn path_of(&self, id: NodeId) -> NodePath {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            let data = self.data(node);
            if !data.name.is_empty() {
                segments.push(data.name.clone());
            }
            current = data.parent;
        }
        segments.reverse();
        NodePath::from_parts(segments, self.data(id).kind == NodeKind::Classification)
    }

    pub(crate) fn illegal_state(&self, id: NodeId, operation: &'static str) -> ModelError {
        ModelError::IllegalState {
            path: self.path_of(id),
            state: self.data(id).state,
            operation,
        }
    }

    /// Everything except lifecycle introspection fails on deleted nodes.
    pub(crate) fn ensure_live(&self, id: NodeId, operation: &'static str) -> Result<&NodeData> {
        let data = self.data(id);
        if data.state == NodeState::Deleted {
            return Err(self.illegal_state(id, operation));
        }
        Ok(data)
    }

    /// Reads additionally fail on nodes still being authored.
    pub(crate) fn ensure_readable(&self, id: NodeId, operation: &'static str) -> Result<&NodeData> {
        let data = self.ensure_live(id, operation)?;
        if data.state == NodeState::ConfigNew {
            return Err(self.illegal_state(id, operation));
        }
        Ok(data)
    }
}

pub(crate) fn build_property_map(
    path: &NodePath,
    list: &[PropertyConfig],
) -> Result<IndexMap<String, PropertyDef>> {
    let mut map = IndexMap::with_capacity(list.len());
    for entry in list {
        let def = PropertyDef {
            value: entry.value.clone(),
            only_this_node: entry.only_this_node,
        };
        if map.insert(entry.name.clone(), def).is_some() {
            return Err(ConfigurationError::DuplicateEntry {
                path: path.clone(),
                what: "property",
                key: entry.name.clone(),
            }
            .into());
        }
    }
    Ok(map)
}

pub(crate) fn build_plugin_map(
    path: &NodePath,
    kind: NodeKind,
    list: &[PluginConfig],
) -> Result<IndexMap<PluginKey, PluginDef>> {
    let mut map = IndexMap::with_capacity(list.len());
    for entry in list {
        if !entry.capability.supports(kind) {
            return Err(ConfigurationError::CapabilityKindMismatch {
                path: path.clone(),
                kind,
                capability: entry.capability,
            }
            .into());
        }
        let key = (entry.capability, entry.plugin_id.clone());
        let def = PluginDef {
            implementation: entry.implementation.clone(),
            only_this_node: entry.only_this_node,
        };
        if map.insert(key, def).is_some() {
            return Err(ConfigurationError::DuplicateEntry {
                path: path.clone(),
                what: "plugin binding",
                key: format!("{:?}/{:?}", entry.capability, entry.plugin_id),
            }
            .into());
        }
    }
    Ok(map)
}

// ── Tests ─────────────────────────────────────────────────────────────
