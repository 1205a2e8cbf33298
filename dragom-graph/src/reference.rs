//! References, referrers, and reference paths.

use std::fmt;

use serde::{Deserialize, Serialize};

use dragom_model::ArtifactCoordinate;

use crate::version::ModuleVersion;

/// A directed edge: the referred module version plus the declaring artifact
/// coordinate, when the source construct expressing the dependency is
/// known. Equality is by value over both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    module_version: ModuleVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    artifact_coordinate: Option<ArtifactCoordinate>,
}

impl Reference {
    /// An edge with no declaring-coordinate metadata.
    pub fn new(module_version: ModuleVersion) -> Self {
        Self {
            module_version,
            artifact_coordinate: None,
        }
    }

    /// An edge declared by a known artifact coordinate.
    pub fn with_artifact(module_version: ModuleVersion, coordinate: ArtifactCoordinate) -> Self {
        Self {
            module_version,
            artifact_coordinate: Some(coordinate),
        }
    }

    /// The referred module version (the edge target).
    pub fn module_version(&self) -> &ModuleVersion {
        &self.module_version
    }

    pub fn artifact_coordinate(&self) -> Option<&ArtifactCoordinate> {
        self.artifact_coordinate.as_ref()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.artifact_coordinate {
            Some(coordinate) => write!(f, "{} (declared by {coordinate})", self.module_version),
            None => write!(f, "{}", self.module_version),
        }
    }
}

/// Inverse-edge view: who refers, and through which reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Referrer {
    module_version: ModuleVersion,
    reference: Reference,
}

impl Referrer {
    pub fn new(module_version: ModuleVersion, reference: Reference) -> Self {
        Self {
            module_version,
            reference,
        }
    }

    /// The referring module version (the edge source).
    pub fn module_version(&self) -> &ModuleVersion {
        &self.module_version
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }
}

impl fmt::Display for Referrer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.module_version, self.reference)
    }
}

/// An ordered path of references from a root module version down to a leaf.
///
/// The degenerate path is a root with no references (the root is its own
/// leaf).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferencePath {
    root: ModuleVersion,
    references: Vec<Reference>,
}

impl ReferencePath {
    pub fn new(root: ModuleVersion) -> Self {
        Self {
            root,
            references: Vec::new(),
        }
    }

    pub fn with_references(root: ModuleVersion, references: Vec<Reference>) -> Self {
        Self { root, references }
    }

    pub fn root(&self) -> &ModuleVersion {
        &self.root
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// The final module version of the path; the root itself when the path
    /// has no references.
    pub fn leaf(&self) -> &ModuleVersion {
        self.references
            .last()
            .map_or(&self.root, Reference::module_version)
    }

    /// Number of module versions on the path (references + the root). A
    /// path is never empty: the degenerate case is the root alone.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.references.len() + 1
    }

    /// Whether a module version occurs anywhere on the path. Used by the
    /// traversal engine for cycle detection.
    pub fn contains(&self, module_version: &ModuleVersion) -> bool {
        self.root == *module_version
            || self
                .references
                .iter()
                .any(|reference| reference.module_version() == module_version)
    }

    /// The module versions on the path, root first.
    pub fn module_versions(&self) -> impl Iterator<Item = &ModuleVersion> {
        std::iter::once(&self.root)
            .chain(self.references.iter().map(Reference::module_version))
    }

    pub(crate) fn push(&mut self, reference: Reference) {
        self.references.push(reference);
    }

    pub(crate) fn pop(&mut self) {
        self.references.pop();
    }
}

impl fmt::Display for ReferencePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for reference in &self.references {
            write!(f, " -> {}", reference.module_version())?;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
