//! Dragom model library — the classification/module node hierarchy with
//! inheritance-based property and plugin resolution.
//!
//! The main entry point is [`model::Model`], built from a
//! [`config::ModelConfig`] and a [`plugin::PluginRegistry`]. Nodes are
//! addressed by [`path::NodePath`] literals and handled through opaque
//! [`node::NodeId`] ids; configuration mutations go through the
//! optimistic-lock protocol in [`transfer`].

pub mod artifact;
pub mod config;
pub mod error;
pub mod model;
pub mod node;
pub mod path;
pub mod plugin;
pub mod properties;
pub mod transfer;

pub use artifact::{ArtifactCoordinate, ARTIFACT_GROUPS_PROPERTY};
pub use config::{
    InitProperties, ModelConfig, NodeConfig, PluginConfig, PropertyConfig, INIT_PROPERTY_PREFIX,
};
pub use error::{ConfigurationError, ModelError, Result};
pub use model::Model;
pub use node::{NodeId, NodeKind, NodeState};
pub use path::NodePath;
pub use plugin::{
    ArtifactInfoPlugin, Capability, NodeInitPlugin, PluginFactory, PluginInstance, PluginRegistry,
    UndefinedDescendantHandler,
};
pub use properties::PARENT_PROPERTY_MARKER;
pub use transfer::{LockHandle, NodeConfigTransfer};
