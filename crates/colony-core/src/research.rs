//! Research lookup collaborator.
//!
//! The research tree itself lives in the `colony-research` crate; the core
//! only needs to ask whether an id counts as "researched" for a colony.

use crate::fixed::{Fixed64, is_positive};
use crate::id::{ColonyId, ResourceId};

/// Read-only view of the global research tree and per-colony progress.
pub trait ResearchView {
    /// A research effect with this id is registered in the global tree.
    fn has_research_effect(&self, id: &ResourceId) -> bool;

    /// A research node with this id exists in the global tree.
    fn has_research(&self, id: &ResourceId) -> bool;

    /// Current strength of an effect in a colony. Zero when absent.
    fn effect_strength(&self, colony: ColonyId, id: &ResourceId) -> Fixed64;

    /// The colony has completed the research node with this id.
    fn has_completed_research(&self, colony: ColonyId, id: &ResourceId) -> bool;
}

/// Whether `id` counts as researched in `colony`.
///
/// Satisfied by either a registered effect with positive strength or a
/// registered node the colony completed. An id registered as neither is
/// never researched.
pub fn is_researched(view: &dyn ResearchView, colony: ColonyId, id: &ResourceId) -> bool {
    let has_effect = view.has_research_effect(id);
    let has_node = view.has_research(id);
    if !has_effect && !has_node {
        return false;
    }
    if has_effect && is_positive(view.effect_strength(colony, id)) {
        return true;
    }
    has_node && view.has_completed_research(colony, id)
}

/// A research view with nothing registered. Every id is unresearched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResearch;

impl ResearchView for NoResearch {
    fn has_research_effect(&self, _id: &ResourceId) -> bool {
        false
    }

    fn has_research(&self, _id: &ResourceId) -> bool {
        false
    }

    fn effect_strength(&self, _colony: ColonyId, _id: &ResourceId) -> Fixed64 {
        Fixed64::ZERO
    }

    fn has_completed_research(&self, _colony: ColonyId, _id: &ResourceId) -> bool {
        false
    }
}
