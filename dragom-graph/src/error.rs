//! Graph error taxonomy.
//!
//! All variants are structural and fatal for the operation that raised
//! them: the graph is append-only, so nothing here is retried. Variants
//! carry the offending module version or reference path so a failure deep
//! in a traversal is diagnosable at the top level.

use crate::reference::{Reference, ReferencePath};
use crate::traversal::VisitControl;
use crate::version::{ModuleVersion, ModuleVersionParseError, VersionParseError};

/// Top-level error type for the reference graph.
#[derive(thiserror::Error, Debug)]
pub enum GraphError {
    /// A query named a module version absent from the graph.
    #[error("module version {0} is not in the graph")]
    UnknownModuleVersion(ModuleVersion),

    /// A traversal pushed a reference whose target is already on the
    /// current reference path. Construction does not prevent cycles; only
    /// traversal catches them, and a cycle is never recoverable.
    #[error("reference cycle: {reference} re-enters path {path}")]
    ReferenceCycle {
        path: ReferencePath,
        reference: Reference,
    },

    /// The visitor answered a callback with a control signal that is not
    /// legal for that event (e.g. skip-children on step-in).
    #[error("visitor returned {control:?} in response to {event}")]
    InvalidVisitorControl {
        control: VisitControl,
        event: &'static str,
    },

    /// A version literal was malformed.
    #[error(transparent)]
    Version(#[from] VersionParseError),

    /// A module version literal was malformed.
    #[error(transparent)]
    ModuleVersion(#[from] ModuleVersionParseError),
}

/// Convenience alias for `Result<T, GraphError>`.
pub type Result<T> = std::result::Result<T, GraphError>;
