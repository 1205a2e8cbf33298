//! Cycle-safe traversal of the reference graph.
//!
//! A traversal starts from one given vertex or from every root, visiting
//! parent-first (pre-order) or depth-first (post-order). Visitation state
//! lives in a per-traversal processed set, never on the graph, and the
//! current root-to-vertex reference path is tracked explicitly: pushing a
//! reference whose target is already on the path is a fatal structural
//! error. The visitor steers the traversal through [`VisitControl`]; an
//! abort is honored within one recursion frame, with no further callbacks.

use std::collections::HashSet;

use tracing::{instrument, trace};

use crate::error::{GraphError, Result};
use crate::graph::ReferenceGraph;
use crate::reference::ReferencePath;
use crate::version::ModuleVersion;

/// When a vertex is visited relative to its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalOrder {
    /// Pre-order: a vertex is visited before its references.
    ParentFirst,
    /// Post-order: a vertex is visited after its references.
    DepthFirst,
}

/// What happens when a traversal encounters a vertex it has already
/// processed (convergent paths).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReentryMode {
    /// Already-processed vertices are silently skipped.
    NoReentry,
    /// Already-processed vertices emit a `Visit` tagged repeated; their
    /// children are never re-traversed.
    Reentry,
}

/// Visitor's answer to a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitControl {
    Continue,
    /// Stop the whole traversal immediately.
    Abort,
    /// Do not recurse into the current vertex's references. Only legal in
    /// response to a `Visit` event.
    SkipChildren,
    /// Abandon the remainder of the current root's sub-traversal and
    /// continue with the next root.
    SkipCurrentRoot,
}

/// How a traversal ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    Completed,
    Aborted,
}

/// A traversal callback. The carried path always runs from the traversal
/// origin to the vertex the event concerns.
#[derive(Debug)]
pub enum VisitEvent<'a> {
    /// About to recurse into the references of the path's leaf. Emitted
    /// only for vertices that have references.
    StepIn { path: &'a ReferencePath },
    /// Done recursing into the references of the path's leaf.
    StepOut { path: &'a ReferencePath },
    /// The path's leaf itself.
    Visit {
        path: &'a ReferencePath,
        /// The vertex was already processed earlier in this traversal.
        repeated: bool,
        /// The vertex is in the graph's matched set.
        matched: bool,
    },
}

pub trait Visitor {
    fn visit(&mut self, event: &VisitEvent<'_>) -> VisitControl;
}

impl<F> Visitor for F
where
    F: FnMut(&VisitEvent<'_>) -> VisitControl,
{
    fn visit(&mut self, event: &VisitEvent<'_>) -> VisitControl {
        self(event)
    }
}

/// Outcome of one recursion frame.
enum Flow {
    Continue,
    Abort,
    SkipRoot,
}

impl ReferenceGraph {
    /// Traverse from `origin`, or from every root in registration order
    /// when `origin` is `None`. The processed set spans the whole call, so
    /// a vertex reachable from several roots is processed once.
    #[instrument(level = "debug", skip(self, visitor))]
    pub fn traverse(
        &self,
        origin: Option<&ModuleVersion>,
        order: TraversalOrder,
        reentry: ReentryMode,
        visitor: &mut dyn Visitor,
    ) -> Result<Traversal> {
        let mut processed: HashSet<ModuleVersion> = HashSet::new();
        match origin {
            Some(module_version) => {
                if !self.contains(module_version) {
                    return Err(GraphError::UnknownModuleVersion(module_version.clone()));
                }
                let mut path = ReferencePath::new(module_version.clone());
                match self.traverse_vertex(&mut path, order, reentry, &mut processed, visitor)? {
                    Flow::Abort => Ok(Traversal::Aborted),
                    Flow::Continue | Flow::SkipRoot => Ok(Traversal::Completed),
                }
            }
            None => {
                for root in self.roots() {
                    trace!(%root, "traversing from root");
                    let mut path = ReferencePath::new(root.clone());
                    match self.traverse_vertex(&mut path, order, reentry, &mut processed, visitor)?
                    {
                        Flow::Abort => return Ok(Traversal::Aborted),
                        Flow::Continue | Flow::SkipRoot => {}
                    }
                }
                Ok(Traversal::Completed)
            }
        }
    }

    fn traverse_vertex(
        &self,
        path: &mut ReferencePath,
        order: TraversalOrder,
        reentry: ReentryMode,
        processed: &mut HashSet<ModuleVersion>,
        visitor: &mut dyn Visitor,
    ) -> Result<Flow> {
        let current = path.leaf().clone();
        if processed.contains(&current) {
            if reentry == ReentryMode::NoReentry {
                return Ok(Flow::Continue);
            }
            let event = VisitEvent::Visit {
                path,
                repeated: true,
                matched: self.is_matched(&current)?,
            };
            return Ok(match visitor.visit(&event) {
                VisitControl::Abort => Flow::Abort,
                VisitControl::SkipCurrentRoot => Flow::SkipRoot,
                // The references of a repeated vertex are never
                // re-traversed; skip-children is a no-op here.
                VisitControl::Continue | VisitControl::SkipChildren => Flow::Continue,
            });
        }
        processed.insert(current.clone());
        let matched = self.is_matched(&current)?;
        let references = self.references_of(&current)?;

        if order == TraversalOrder::ParentFirst {
            let event = VisitEvent::Visit {
                path,
                repeated: false,
                matched,
            };
            match visitor.visit(&event) {
                VisitControl::Continue => {}
                VisitControl::Abort => return Ok(Flow::Abort),
                VisitControl::SkipChildren => return Ok(Flow::Continue),
                VisitControl::SkipCurrentRoot => return Ok(Flow::SkipRoot),
            }
        }

        if !references.is_empty() {
            match step(visitor, &VisitEvent::StepIn { path }, "step-in")? {
                Flow::Continue => {}
                other => return Ok(other),
            }
            for reference in references {
                if path.contains(reference.module_version()) {
                    return Err(GraphError::ReferenceCycle {
                        path: path.clone(),
                        reference: reference.clone(),
                    });
                }
                path.push(reference.clone());
                let flow = self.traverse_vertex(path, order, reentry, processed, visitor)?;
                path.pop();
                match flow {
                    Flow::Continue => {}
                    // Abandon promptly: no step-out callback on the way up.
                    other => return Ok(other),
                }
            }
            match step(visitor, &VisitEvent::StepOut { path }, "step-out")? {
                Flow::Continue => {}
                other => return Ok(other),
            }
        }

        if order == TraversalOrder::DepthFirst {
            let event = VisitEvent::Visit {
                path,
                repeated: false,
                matched,
            };
            match visitor.visit(&event) {
                // References were already traversed; skip-children is
                // meaningless after the fact and treated as continue.
                VisitControl::Continue | VisitControl::SkipChildren => {}
                VisitControl::Abort => return Ok(Flow::Abort),
                VisitControl::SkipCurrentRoot => return Ok(Flow::SkipRoot),
            }
        }
        Ok(Flow::Continue)
    }

}

fn step(visitor: &mut dyn Visitor, event: &VisitEvent<'_>, name: &'static str) -> Result<Flow> {
    match visitor.visit(event) {
        VisitControl::Continue => Ok(Flow::Continue),
        VisitControl::Abort => Ok(Flow::Abort),
        VisitControl::SkipCurrentRoot => Ok(Flow::SkipRoot),
        VisitControl::SkipChildren => Err(GraphError::InvalidVisitorControl {
            control: VisitControl::SkipChildren,
            event: name,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
