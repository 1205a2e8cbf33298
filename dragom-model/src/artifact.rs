//! Build-artifact coordinates and the artifact → module reverse lookup.
//!
//! Modules do not know their own artifact coordinates; bound `ArtifactInfo`
//! plugins answer for them. The lookup walks the tree in document order,
//! pruned by the `artifact-group-ids` property: a classification node that
//! resolves the property to a list excluding the wanted group id cannot
//! contain the producing module, so its subtree is skipped. An exact
//! "produced" answer wins immediately; otherwise a single "possibly
//! produced" module resolves, and two or more are a configuration error
//! rather than an arbitrary pick.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::error::{ConfigurationError, Result};
use crate::model::Model;
use crate::node::{NodeId, NodeKind};
use crate::plugin::Capability;

/// Property listing, comma-separated, the artifact group ids modules under
/// a classification node may produce. Undefined means "no claim" and the
/// subtree is always searched.
pub const ARTIFACT_GROUPS_PROPERTY: &str = "artifact-group-ids";

/// Error parsing an artifact coordinate literal.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid artifact coordinate {0:?}, expected group:artifact[:version]")]
pub struct ArtifactCoordinateParseError(String);

/// A build-artifact coordinate: group id, artifact id, and an optional
/// version. The literal form is `group:artifact` or `group:artifact:version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ArtifactCoordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
}

impl ArtifactCoordinate {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// The coordinate without its version component.
    pub fn versionless(&self) -> ArtifactCoordinate {
        ArtifactCoordinate {
            group_id: self.group_id.clone(),
            artifact_id: self.artifact_id.clone(),
            version: None,
        }
    }
}

impl fmt::Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)?;
        if let Some(version) = &self.version {
            write!(f, ":{version}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for ArtifactCoordinate {
    type Err = ArtifactCoordinateParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let (Some(group_id), Some(artifact_id)) = (parts.next(), parts.next()) else {
            return Err(ArtifactCoordinateParseError(s.to_string()));
        };
        let version = parts.next();
        if parts.next().is_some() || group_id.is_empty() || artifact_id.is_empty() {
            return Err(ArtifactCoordinateParseError(s.to_string()));
        }
        if version.is_some_and(str::is_empty) {
            return Err(ArtifactCoordinateParseError(s.to_string()));
        }
        Ok(Self {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: version.map(str::to_string),
        })
    }
}

impl From<ArtifactCoordinate> for String {
    fn from(coordinate: ArtifactCoordinate) -> Self {
        coordinate.to_string()
    }
}

impl TryFrom<String> for ArtifactCoordinate {
    type Error = ArtifactCoordinateParseError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

// ── Lookup ────────────────────────────────────────────────────────────

impl Model {
    /// Find the module producing an artifact coordinate.
    ///
    /// `Ok(None)` means no module claims the coordinate. Resolutions are
    /// cached per coordinate until the next mutation drops the index.
    #[instrument(level = "debug", skip(self))]
    pub fn module_for_artifact(
        &mut self,
        coordinate: &ArtifactCoordinate,
    ) -> Result<Option<NodeId>> {
        if let Some(&cached) = self.artifact_index.borrow().get(coordinate) {
            trace!(%coordinate, node = %cached, "artifact lookup served from index");
            return Ok(Some(cached));
        }
        let mut candidates: Vec<NodeId> = Vec::new();
        let resolved = match self.search_artifact(self.root(), coordinate, &mut candidates)? {
            Some(exact) => Some(exact),
            None => match candidates.as_slice() {
                [] => None,
                [only] => Some(*only),
                [first, second, ..] => {
                    return Err(ConfigurationError::AmbiguousArtifact {
                        coordinate: coordinate.to_string(),
                        first: self.node_path(*first)?,
                        second: self.node_path(*second)?,
                    }
                    .into());
                }
            },
        };
        if let Some(node) = resolved {
            debug!(%coordinate, module = %self.path_of(node), "artifact resolved");
            self.artifact_index
                .borrow_mut()
                .insert(coordinate.clone(), node);
        }
        Ok(resolved)
    }

    /// Document-order walk. Returns the first exactly-producing module;
    /// possibly-producing modules accumulate in `candidates`.
    fn search_artifact(
        &mut self,
        node: NodeId,
        coordinate: &ArtifactCoordinate,
        candidates: &mut Vec<NodeId>,
    ) -> Result<Option<NodeId>> {
        match self.kind(node) {
            NodeKind::Classification => {
                if let Some(groups) = self.property(node, ARTIFACT_GROUPS_PROPERTY)? {
                    let claimed = groups
                        .split(',')
                        .map(str::trim)
                        .any(|group| group == coordinate.group_id);
                    if !claimed {
                        trace!(node = %self.path_of(node), %coordinate, "subtree pruned by group ids");
                        return Ok(None);
                    }
                }
                for child in self.children(node)? {
                    if let Some(exact) = self.search_artifact(child, coordinate, candidates)? {
                        return Ok(Some(exact));
                    }
                }
                Ok(None)
            }
            NodeKind::Module => {
                if !self.plugin_exists(node, Capability::ArtifactInfo, None)? {
                    return Ok(None);
                }
                let instance = self.plugin(node, Capability::ArtifactInfo, None)?;
                let Some(plugin) = instance.as_artifact_info() else {
                    return Ok(None);
                };
                if plugin.is_artifact_coordinate_produced(self, node, coordinate) {
                    return Ok(Some(node));
                }
                if plugin.is_artifact_coordinate_possibly_produced(self, node, coordinate) {
                    candidates.push(node);
                }
                Ok(None)
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
