//! Upward reference-path enumeration.
//!
//! Answers "who ultimately depends on this module version": starting from a
//! leaf, walk backward through referrer edges and report every simple path
//! from a referrer-less top vertex down to the leaf. Downstream tooling
//! uses the enumerated paths to determine which top-level artifacts must be
//! rebuilt when the leaf changes.

use tracing::trace;

use crate::error::{GraphError, Result};
use crate::graph::ReferenceGraph;
use crate::reference::{Reference, ReferencePath, Referrer};
use crate::traversal::{Traversal, VisitControl};
use crate::version::ModuleVersion;

/// Callback invoked once per enumerated root-to-leaf path. Only
/// [`VisitControl::Continue`] and [`VisitControl::Abort`] are legal
/// answers.
pub trait PathVisitor {
    fn visit_path(&mut self, path: &ReferencePath, matched: bool) -> VisitControl;
}

impl<F> PathVisitor for F
where
    F: FnMut(&ReferencePath, bool) -> VisitControl,
{
    fn visit_path(&mut self, path: &ReferencePath, matched: bool) -> VisitControl {
        self(path, matched)
    }
}

enum Ascent {
    Continue,
    Abort,
}

impl ReferenceGraph {
    /// Enumerate every simple path down to `leaf` that starts at a
    /// root-set vertex or at a referrer-less top vertex, in referrer
    /// insertion order. A root that itself has referrers starts its own
    /// path in addition to the longer paths continuing above it. Each path
    /// is tagged with the leaf's matched-set membership. A leaf with no
    /// referrers yields the degenerate single-vertex path. A cycle among
    /// referrers is the same fatal structural error as in downward
    /// traversal.
    pub fn visit_leaf_reference_paths(
        &self,
        leaf: &ModuleVersion,
        visitor: &mut dyn PathVisitor,
    ) -> Result<Traversal> {
        if !self.contains(leaf) {
            return Err(GraphError::UnknownModuleVersion(leaf.clone()));
        }
        let matched = self.is_matched(leaf)?;
        let mut chain: Vec<Referrer> = Vec::new();
        match self.ascend(leaf, leaf, matched, &mut chain, visitor)? {
            Ascent::Continue => Ok(Traversal::Completed),
            Ascent::Abort => Ok(Traversal::Aborted),
        }
    }

    /// `chain` runs from the leaf upward; `current` is the vertex the
    /// chain has reached.
    fn ascend(
        &self,
        current: &ModuleVersion,
        leaf: &ModuleVersion,
        matched: bool,
        chain: &mut Vec<Referrer>,
        visitor: &mut dyn PathVisitor,
    ) -> Result<Ascent> {
        let referrers = self.referrers_of(current)?;
        if referrers.is_empty() || self.is_root(current)? {
            // A path starts here: the chain, reversed, runs down to the
            // leaf.
            let references: Vec<Reference> = chain
                .iter()
                .rev()
                .map(|referrer| referrer.reference().clone())
                .collect();
            let path = ReferencePath::with_references(current.clone(), references);
            trace!(%path, "reference path enumerated");
            match visitor.visit_path(&path, matched) {
                VisitControl::Continue => {}
                VisitControl::Abort => return Ok(Ascent::Abort),
                control @ (VisitControl::SkipChildren | VisitControl::SkipCurrentRoot) => {
                    return Err(GraphError::InvalidVisitorControl {
                        control,
                        event: "reference-path",
                    });
                }
            }
        }
        for referrer in referrers {
            let above = referrer.module_version();
            if above == leaf
                || chain
                    .iter()
                    .any(|entry| entry.module_version() == above)
            {
                // The downward view of the chain built so far, for the
                // diagnostic.
                let references: Vec<Reference> = chain
                    .iter()
                    .rev()
                    .map(|entry| entry.reference().clone())
                    .collect();
                return Err(GraphError::ReferenceCycle {
                    path: ReferencePath::with_references(current.clone(), references),
                    reference: referrer.reference().clone(),
                });
            }
            chain.push(referrer.clone());
            let ascent = self.ascend(above, leaf, matched, chain, visitor)?;
            chain.pop();
            if matches!(ascent, Ascent::Abort) {
                return Ok(Ascent::Abort);
            }
        }
        Ok(Ascent::Continue)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
