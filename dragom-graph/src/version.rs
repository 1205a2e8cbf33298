//! Versions and module versions — the vertex identity of the reference
//! graph.
//!
//! A version is typed: `Static` versions are immutable, tag-like; `Dynamic`
//! versions are mutable, branch-like. The literal form prefixes the
//! identifier with the type (`S/1.2.3`, `D/develop`). A module version
//! pairs a complete node path with a version; its literal form joins the
//! two with a colon: `Domain/Sub/my-module:S/1.2.3`.

use std::fmt;

use serde::{Deserialize, Serialize};

use dragom_model::path::NodePathParseError;
use dragom_model::NodePath;

/// Error parsing a version literal.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid version literal {0:?}, expected S/<id> or D/<id>")]
pub struct VersionParseError(String);

/// Error parsing a module version literal.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleVersionParseError {
    #[error("invalid module version literal {0:?}, expected <module path>:<version>")]
    MissingSeparator(String),

    #[error("module version {literal:?} must use a complete module path")]
    PartialPath { literal: String },

    #[error("invalid module path in {literal:?}: {source}")]
    Path {
        literal: String,
        source: NodePathParseError,
    },

    #[error("invalid version in {literal:?}: {source}")]
    Version {
        literal: String,
        source: VersionParseError,
    },
}

/// Whether a version is immutable (tag-like) or mutable (branch-like).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionType {
    Static,
    Dynamic,
}

/// A typed version of a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Version {
    version_type: VersionType,
    id: String,
}

impl Version {
    /// An immutable, tag-like version.
    pub fn r#static(id: impl Into<String>) -> Self {
        Self {
            version_type: VersionType::Static,
            id: id.into(),
        }
    }

    /// A mutable, branch-like version.
    pub fn dynamic(id: impl Into<String>) -> Self {
        Self {
            version_type: VersionType::Dynamic,
            id: id.into(),
        }
    }

    pub fn version_type(&self) -> VersionType {
        self.version_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.version_type {
            VersionType::Static => 'S',
            VersionType::Dynamic => 'D',
        };
        write!(f, "{prefix}/{}", self.id)
    }
}

impl std::str::FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, id) = s
            .split_once('/')
            .ok_or_else(|| VersionParseError(s.to_string()))?;
        if id.is_empty() {
            return Err(VersionParseError(s.to_string()));
        }
        let version_type = match prefix {
            "S" => VersionType::Static,
            "D" => VersionType::Dynamic,
            _ => return Err(VersionParseError(s.to_string())),
        };
        Ok(Self {
            version_type,
            id: id.to_string(),
        })
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

impl TryFrom<String> for Version {
    type Error = VersionParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A module at a specific version — the graph's vertex identity.
///
/// The path must be complete (denote a module, not a classification node).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ModuleVersion {
    module_path: NodePath,
    version: Version,
}

impl ModuleVersion {
    /// Pair a complete module path with a version. A partial path is a
    /// construction error, caught at the boundary rather than deep inside
    /// graph algorithms.
    pub fn new(module_path: NodePath, version: Version) -> Result<Self, ModuleVersionParseError> {
        if module_path.is_partial() {
            return Err(ModuleVersionParseError::PartialPath {
                literal: format!("{module_path}:{version}"),
            });
        }
        Ok(Self {
            module_path,
            version,
        })
    }

    pub fn module_path(&self) -> &NodePath {
        &self.module_path
    }

    pub fn version(&self) -> &Version {
        &self.version
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module_path, self.version)
    }
}

impl std::str::FromStr for ModuleVersion {
    type Err = ModuleVersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, version) = s
            .split_once(':')
            .ok_or_else(|| ModuleVersionParseError::MissingSeparator(s.to_string()))?;
        let module_path: NodePath =
            path.parse().map_err(|source| ModuleVersionParseError::Path {
                literal: s.to_string(),
                source,
            })?;
        let version: Version =
            version
                .parse()
                .map_err(|source| ModuleVersionParseError::Version {
                    literal: s.to_string(),
                    source,
                })?;
        Self::new(module_path, version)
    }
}

impl From<ModuleVersion> for String {
    fn from(module_version: ModuleVersion) -> Self {
        module_version.to_string()
    }
}

impl TryFrom<String> for ModuleVersion {
    type Error = ModuleVersionParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
