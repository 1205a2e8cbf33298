//! Model error taxonomy.
//!
//! `DuplicateNode` and `OptimisticLock` are recoverable — callers performing
//! a mutation catch them and retry (fresh read) or pick another name. All
//! other variants propagate to the driver of the current operation. The
//! model never logs or swallows errors; every variant carries the offending
//! path so failures are diagnosable at the top level.

use crate::node::{NodeKind, NodeState};
use crate::path::NodePath;
use crate::plugin::Capability;

/// Top-level error type for the node/configuration model.
#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    /// A node would be named/renamed to a name already used by a sibling.
    #[error("duplicate node name {name:?} under {parent}")]
    DuplicateNode { parent: NodePath, name: String },

    /// A configuration mutation carried a stale optimistic-lock handle.
    #[error("stale lock for {path}: held revision {held}, node is at {current}")]
    OptimisticLock {
        path: NodePath,
        held: u64,
        current: u64,
    },

    /// Plugin or configuration data does not resolve to something usable.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// An operation was invoked on a node in an incompatible lifecycle state.
    #[error("cannot {operation} on {path}: node is {state:?}")]
    IllegalState {
        path: NodePath,
        state: NodeState,
        operation: &'static str,
    },

    /// Model configuration could not be parsed (TOML error).
    #[error("configuration parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A node path literal in configuration or input was malformed.
    #[error("node path error: {0}")]
    Path(#[from] crate::path::NodePathParseError),

    /// An artifact coordinate literal was malformed.
    #[error("artifact coordinate error: {0}")]
    Artifact(#[from] crate::artifact::ArtifactCoordinateParseError),
}

/// Errors in plugin-binding and configuration-data resolution.
///
/// Fatal for the requested operation; other nodes and operations are
/// unaffected.
#[derive(thiserror::Error, Debug)]
pub enum ConfigurationError {
    /// No plugin binding resolves for the requested capability on this node.
    #[error("no {capability:?} plugin binding (id {plugin_id:?}) resolves for {path}")]
    PluginNotResolved {
        path: NodePath,
        capability: Capability,
        plugin_id: Option<String>,
    },

    /// The requested capability is incompatible with the node's kind.
    #[error("capability {capability:?} is not applicable to {kind:?} node {path}")]
    CapabilityKindMismatch {
        path: NodePath,
        kind: NodeKind,
        capability: Capability,
    },

    /// A binding names an implementation that is not in the registry.
    #[error("unknown plugin implementation {implementation:?} bound on {path}")]
    UnknownImplementation {
        path: NodePath,
        implementation: String,
    },

    /// A registered implementation serves a different capability than the
    /// binding that names it.
    #[error(
        "plugin implementation {implementation:?} serves {declared:?}, \
         but is bound for {requested:?} on {path}"
    )]
    CapabilityMismatch {
        path: NodePath,
        implementation: String,
        declared: Capability,
        requested: Capability,
    },

    /// An artifact coordinate is plausibly produced by more than one module.
    #[error("artifact {coordinate} matches multiple modules: {first} and {second}")]
    AmbiguousArtifact {
        coordinate: String,
        first: NodePath,
        second: NodePath,
    },

    /// A transfer object or configuration entry repeats a property name or
    /// plugin-binding key.
    #[error("duplicate {what} entry {key:?} for {path}")]
    DuplicateEntry {
        path: NodePath,
        what: &'static str,
        key: String,
    },

    /// Configuration data is structurally invalid.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Convenience alias for `Result<T, ModelError>`.
pub type Result<T> = std::result::Result<T, ModelError>;
