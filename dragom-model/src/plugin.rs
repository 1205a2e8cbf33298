//! Plugin capabilities, instances, and the implementation registry.
//!
//! A node's configuration binds `(capability, plugin id)` keys to
//! implementation *names*. The registry maps each name to its declared
//! capability and a constructor, resolved once at registration time —
//! configuration never names Rust types directly. Constructors come in two
//! flavors: `Direct` implementations are built from the node id and cached
//! one instance per node per implementation name; `Factory` constructors
//! run on every resolution and are never cached, since a factory may return
//! different instances depending on runtime context.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactCoordinate;
use crate::error::Result;
use crate::model::Model;
use crate::node::{NodeId, NodeKind};

/// The closed set of plugin capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// Fabricate child nodes that are absent from configuration, e.g. by
    /// probing the SCM. Classification nodes only.
    UndefinedDescendant,
    /// Initialize a node right after materialization or configuration
    /// attachment. Any node kind.
    NodeInit,
    /// Answer whether a module produces a given build artifact. Modules
    /// only.
    ArtifactInfo,
}

impl Capability {
    /// Whether this capability is applicable to the given node kind.
    pub fn supports(self, kind: NodeKind) -> bool {
        match self {
            Capability::UndefinedDescendant => kind == NodeKind::Classification,
            Capability::NodeInit => true,
            Capability::ArtifactInfo => kind == NodeKind::Module,
        }
    }
}

/// Resolves child nodes that configuration does not declare.
///
/// Invoked only when a lookup misses the materialized child map. Returning
/// `Ok(None)` means "no such descendant" — absence is a normal outcome,
/// never an error. Implementations create the node through
/// [`Model::create_dynamic_classification`] /
/// [`Model::create_dynamic_module`] and return its id; the model completes
/// the lifecycle transition and runs the init chain afterwards.
pub trait UndefinedDescendantHandler: fmt::Debug {
    fn request_classification_node(
        &self,
        model: &mut Model,
        parent: NodeId,
        name: &str,
    ) -> Result<Option<NodeId>>;

    fn request_module(
        &self,
        model: &mut Model,
        parent: NodeId,
        name: &str,
    ) -> Result<Option<NodeId>>;
}

/// Initializes a node once, immediately after materialization or after
/// configuration is attached; invoked in declared plugin-id order.
pub trait NodeInitPlugin: fmt::Debug {
    fn init(&self, model: &mut Model, node: NodeId) -> Result<()>;
}

/// Bridges a module node to the build-artifact namespace.
pub trait ArtifactInfoPlugin: fmt::Debug {
    /// Exact answer: this module produces the coordinate.
    fn is_artifact_coordinate_produced(
        &self,
        model: &Model,
        node: NodeId,
        coordinate: &ArtifactCoordinate,
    ) -> bool;

    /// Heuristic answer: this module may produce the coordinate.
    fn is_artifact_coordinate_possibly_produced(
        &self,
        model: &Model,
        node: NodeId,
        coordinate: &ArtifactCoordinate,
    ) -> bool;
}

/// A resolved plugin instance, one variant per capability.
#[derive(Debug, Clone)]
pub enum PluginInstance {
    UndefinedDescendant(Arc<dyn UndefinedDescendantHandler>),
    NodeInit(Arc<dyn NodeInitPlugin>),
    ArtifactInfo(Arc<dyn ArtifactInfoPlugin>),
}

impl PluginInstance {
    pub fn capability(&self) -> Capability {
        match self {
            PluginInstance::UndefinedDescendant(_) => Capability::UndefinedDescendant,
            PluginInstance::NodeInit(_) => Capability::NodeInit,
            PluginInstance::ArtifactInfo(_) => Capability::ArtifactInfo,
        }
    }

    pub fn as_undefined_descendant(&self) -> Option<Arc<dyn UndefinedDescendantHandler>> {
        match self {
            PluginInstance::UndefinedDescendant(h) => Some(Arc::clone(h)),
            _ => None,
        }
    }

    pub fn as_node_init(&self) -> Option<Arc<dyn NodeInitPlugin>> {
        match self {
            PluginInstance::NodeInit(p) => Some(Arc::clone(p)),
            _ => None,
        }
    }

    pub fn as_artifact_info(&self) -> Option<Arc<dyn ArtifactInfoPlugin>> {
        match self {
            PluginInstance::ArtifactInfo(p) => Some(Arc::clone(p)),
            _ => None,
        }
    }
}

/// Constructs plugin instances on every resolution.
pub trait PluginFactory: fmt::Debug {
    fn create(&self, model: &Model, node: NodeId) -> PluginInstance;
}

/// How an implementation name is turned into an instance.
#[derive(Debug, Clone)]
pub enum PluginConstructor {
    /// Built from the node id; one cached instance per node per
    /// implementation name.
    Direct(fn(NodeId) -> PluginInstance),
    /// Invoked per resolution; never cached.
    Factory(Arc<dyn PluginFactory>),
}

#[derive(Debug, Clone)]
pub(crate) struct RegistryEntry {
    pub capability: Capability,
    pub constructor: PluginConstructor,
}

/// Implementation-name → constructor table, populated at startup.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a direct implementation. Later registrations replace
    /// earlier ones under the same name.
    pub fn register_direct(
        &mut self,
        name: impl Into<String>,
        capability: Capability,
        constructor: fn(NodeId) -> PluginInstance,
    ) {
        self.entries.insert(
            name.into(),
            RegistryEntry {
                capability,
                constructor: PluginConstructor::Direct(constructor),
            },
        );
    }

    /// Register a factory implementation.
    pub fn register_factory(
        &mut self,
        name: impl Into<String>,
        capability: Capability,
        factory: Arc<dyn PluginFactory>,
    ) {
        self.entries.insert(
            name.into(),
            RegistryEntry {
                capability,
                constructor: PluginConstructor::Factory(factory),
            },
        );
    }

    pub(crate) fn entry(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }
}

// ── Resolution ────────────────────────────────────────────────────────

use crate::error::ConfigurationError;

impl Model {
    /// Resolve and instantiate the plugin backing `(capability, plugin_id)`
    /// for a node. Fails with a configuration error when no binding
    /// resolves or the capability does not apply to the node's kind.
    pub fn plugin(
        &self,
        node: NodeId,
        capability: Capability,
        plugin_id: Option<&str>,
    ) -> Result<PluginInstance> {
        let data = self.ensure_readable(node, "resolve plugin")?;
        if !capability.supports(data.kind) {
            return Err(ConfigurationError::CapabilityKindMismatch {
                path: self.path_of(node),
                kind: data.kind,
                capability,
            }
            .into());
        }
        let Some(implementation) = self.resolve_plugin_binding(node, capability, plugin_id)
        else {
            return Err(ConfigurationError::PluginNotResolved {
                path: self.path_of(node),
                capability,
                plugin_id: plugin_id.map(str::to_string),
            }
            .into());
        };
        let Some(entry) = self.registry.entry(&implementation) else {
            return Err(ConfigurationError::UnknownImplementation {
                path: self.path_of(node),
                implementation,
            }
            .into());
        };
        if entry.capability != capability {
            return Err(ConfigurationError::CapabilityMismatch {
                path: self.path_of(node),
                implementation,
                declared: entry.capability,
                requested: capability,
            }
            .into());
        }
        match &entry.constructor {
            PluginConstructor::Direct(construct) => {
                if let Some(instance) = data.plugin_cache.borrow().get(&implementation) {
                    return Ok(instance.clone());
                }
                let instance = construct(node);
                data.plugin_cache
                    .borrow_mut()
                    .insert(implementation, instance.clone());
                Ok(instance)
            }
            PluginConstructor::Factory(factory) => Ok(factory.create(self, node)),
        }
    }

    /// Whether a binding resolves for `(capability, plugin_id)` on this
    /// node. A capability inapplicable to the node's kind reports `false`
    /// rather than an error, so callers can probe.
    pub fn plugin_exists(
        &self,
        node: NodeId,
        capability: Capability,
        plugin_id: Option<&str>,
    ) -> Result<bool> {
        let data = self.ensure_readable(node, "resolve plugin")?;
        if !capability.supports(data.kind) {
            return Ok(false);
        }
        Ok(self
            .resolve_plugin_binding(node, capability, plugin_id)
            .is_some())
    }

    /// Ordered plugin ids available for a capability on this node.
    ///
    /// The ancestor chain is walked node-first; the first occurrence of an
    /// id masks any deeper definition, even when that first occurrence is
    /// itself suppressed (only-this-node on an ancestor) or blocked (null
    /// implementation) — masked ids are not reconsidered.
    pub fn plugin_ids(
        &self,
        node: NodeId,
        capability: Capability,
    ) -> Result<Vec<Option<String>>> {
        let data = self.ensure_readable(node, "list plugin ids")?;
        if !capability.supports(data.kind) {
            return Ok(Vec::new());
        }
        let mut seen: std::collections::HashSet<Option<String>> = std::collections::HashSet::new();
        let mut ids = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            let data = self.data(id);
            for ((bound_capability, plugin_id), def) in &data.plugins {
                if *bound_capability != capability || !seen.insert(plugin_id.clone()) {
                    continue;
                }
                let suppressed = def.only_this_node && id != node;
                if !suppressed && def.implementation.is_some() {
                    ids.push(plugin_id.clone());
                }
            }
            current = data.parent;
        }
        Ok(ids)
    }

    /// First-ancestor-wins binding resolution. Returns the implementation
    /// name, or `None` when the binding is absent, suppressed by
    /// only-this-node, or explicitly blocked (null implementation).
    fn resolve_plugin_binding(
        &self,
        node: NodeId,
        capability: Capability,
        plugin_id: Option<&str>,
    ) -> Option<String> {
        let key: (Capability, Option<String>) = (capability, plugin_id.map(str::to_string));
        let mut current = node;
        loop {
            let data = self.data(current);
            if let Some(def) = data.plugins.get(&key) {
                if def.only_this_node && current != node {
                    return None;
                }
                return def.implementation.clone();
            }
            current = data.parent?;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
