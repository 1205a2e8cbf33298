//! Node records of the arena-backed tree.
//!
//! Algorithms hold [`NodeId`] handles, never owning references; parent and
//! child links are ids into the model's arena, so the cyclic
//! parent-and-child structure has no ownership cycles.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::NodeConfig;
use crate::path::NodePath;
use crate::plugin::{Capability, PluginInstance};

/// Opaque handle to a node in a [`Model`](crate::model::Model) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node kind — a closed two-variant choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// Interior node with an ordered, lazily materialized child map.
    Classification,
    /// Leaf node; corresponds to a source-control module.
    Module,
}

/// Node lifecycle states.
///
/// `ConfigNew` nodes are being authored and are not yet committed to the
/// tree; `Config` nodes are backed by persisted configuration;
/// `DynamicallyCreated` nodes were materialized at runtime (typically by
/// probing the SCM) and can later be promoted to `Config` by attaching
/// configuration. `Deleted` nodes reject everything except lifecycle
/// introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    ConfigNew,
    Config,
    DynamicallyBeingCompleted,
    DynamicallyCreated,
    Deleted,
}

/// A property definition held on a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PropertyDef {
    pub value: Option<String>,
    pub only_this_node: bool,
}

/// Key of a plugin binding: capability plus optional plugin id.
pub(crate) type PluginKey = (Capability, Option<String>);

/// A plugin binding held on a node. `implementation == None` blocks
/// inheritance of the capability for this subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PluginDef {
    pub implementation: Option<String>,
    pub only_this_node: bool,
}

/// Per-node record in the arena.
///
/// Caches are interior-mutable so read paths stay `&self`; the model is a
/// single-threaded structure by contract, so `RefCell` is sufficient.
#[derive(Debug)]
pub(crate) struct NodeData {
    pub name: String,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
    pub state: NodeState,
    /// Bumped by exactly one on every successful configuration mutation.
    pub revision: u64,
    pub properties: IndexMap<String, PropertyDef>,
    pub plugins: IndexMap<PluginKey, PluginDef>,
    /// Ordered child map; configuration-declared children first, then
    /// dynamically created ones in creation order. Always empty for modules.
    pub children: IndexMap<String, NodeId>,
    /// Whether `config_children` has been turned into real child nodes.
    pub children_materialized: bool,
    /// Configuration entries pending lazy materialization.
    pub config_children: Vec<NodeConfig>,
    // Caches, invalidated by `Model::clean_caches`.
    pub path_cache: RefCell<Option<NodePath>>,
    pub property_cache: RefCell<HashMap<String, Option<String>>>,
    pub plugin_cache: RefCell<HashMap<String, PluginInstance>>,
}

impl NodeData {
    pub fn new(name: String, parent: Option<NodeId>, kind: NodeKind, state: NodeState) -> Self {
        Self {
            name,
            parent,
            kind,
            state,
            revision: 0,
            properties: IndexMap::new(),
            plugins: IndexMap::new(),
            children: IndexMap::new(),
            // Modules are leaves; nothing to materialize.
            children_materialized: kind == NodeKind::Module,
            config_children: Vec::new(),
            path_cache: RefCell::new(None),
            property_cache: RefCell::new(HashMap::new()),
            plugin_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Drop all cached derived data for this node.
    pub fn clear_caches(&self) {
        self.path_cache.borrow_mut().take();
        self.property_cache.borrow_mut().clear();
        self.plugin_cache.borrow_mut().clear();
    }
}
