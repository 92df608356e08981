//! Guard routing: which successor steps run after a completed action
//!
//! This is a pure function of the graph, the completed step and the emitted
//! guard set. The scheduler relies on it being deterministic and free of
//! side effects.

use std::collections::BTreeSet;

use uuid::Uuid;

use openactions_contracts::ProcessStep;

use super::ProcessGraph;

/// Computes the successor-step set from a completed step's outcome guards
pub struct GuardRouter;

impl GuardRouter {
    /// Determine which steps run next
    ///
    /// Outgoing links partition into guarded links (mandatory or optional)
    /// and unconditional fallbacks (`guard == None`). Every guarded link
    /// whose guard is in `emitted_guards` fires; matching links fan out
    /// together with no precedence between mandatory and optional. The
    /// fallbacks fire only when no guarded link matched.
    ///
    /// An empty result is not an error: a step with no outgoing links, or
    /// with no match and no fallback, silently ends its process branch.
    pub fn next_steps<'a>(
        graph: &'a ProcessGraph,
        step_guid: Uuid,
        emitted_guards: &BTreeSet<String>,
    ) -> Vec<&'a ProcessStep> {
        let links = graph.outgoing_links(step_guid);

        let fired: Vec<Uuid> = links
            .iter()
            .filter(|link| {
                link.guard
                    .as_ref()
                    .is_some_and(|guard| emitted_guards.contains(guard))
            })
            .map(|link| link.target_step_guid)
            .collect();

        let targets = if fired.is_empty() {
            links
                .iter()
                .filter(|link| link.guard.is_none())
                .map(|link| link.target_step_guid)
                .collect()
        } else {
            fired
        };

        // Two links may name the same target; each step runs once.
        let mut seen = BTreeSet::new();
        targets
            .into_iter()
            .filter(|guid| seen.insert(*guid))
            .filter_map(|guid| graph.step(guid))
            .collect()
    }
}
