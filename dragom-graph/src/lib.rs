//! Dragom reference graph library — module versions connected by
//! version-pinned references.
//!
//! The main entry point is [`graph::ReferenceGraph`], populated
//! incrementally by discovery code and consumed through the cycle-safe
//! traversal protocol in [`traversal`] and the upward reference-path
//! enumeration in [`enumerate`]. Vertex identity is
//! [`version::ModuleVersion`], a module [`NodePath`] paired with a typed
//! [`version::Version`].

pub mod enumerate;
pub mod error;
pub mod export;
pub mod graph;
pub mod reference;
pub mod traversal;
pub mod version;

pub use dragom_model::NodePath;

pub use enumerate::PathVisitor;
pub use error::{GraphError, Result};
pub use graph::ReferenceGraph;
pub use reference::{Reference, ReferencePath, Referrer};
pub use traversal::{ReentryMode, Traversal, TraversalOrder, VisitControl, VisitEvent, Visitor};
pub use version::{ModuleVersion, Version, VersionType};
