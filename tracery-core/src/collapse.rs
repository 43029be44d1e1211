//! Collapse walk over the lineage graph
//!
//! Collapsing hides the branch of lineage that hangs off a selected event.
//! Starting from the identities the event declares as children, the walk
//! repeatedly removes matching nodes and links, folding any newly discovered
//! adjacent identity into the working set until a fixed point is reached.
//!
//! The walk is pure: it produces a [`CollapsePlan`] of node and link ids
//! which the caller applies to the store as a single batch
//! ([`LineageGraph::apply_removals`]). Link targets are resolved against the
//! graph as it stood when the plan was computed, so removal order inside the
//! walk cannot change the outcome.

use std::collections::BTreeSet;

use crate::graph::LineageGraph;
use crate::model::{ProvenanceLink, ProvenanceNode};

/// Direction of a collapse relative to the selected event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollapseDirection {
    /// The event is itself a merge point: its own identity appears among its
    /// declared children. Collapsing folds the merged-in branches away.
    FanIn,

    /// The event spawned new identities; collapsing folds the spawned
    /// branches away while keeping the event and its direct descendants.
    FanOut,
}

impl CollapseDirection {
    /// Determine the direction from an event's identity and declared children.
    pub fn detect(event_uuid: &str, child_uuids: &[String]) -> Self {
        if child_uuids.iter().any(|uuid| uuid == event_uuid) {
            CollapseDirection::FanIn
        } else {
            CollapseDirection::FanOut
        }
    }
}

/// The outcome of a collapse walk: which nodes and links to remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollapsePlan {
    pub direction: CollapseDirection,
    pub node_ids: BTreeSet<String>,
    pub link_ids: BTreeSet<String>,
}

impl CollapsePlan {
    /// Whether the plan removes nothing.
    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty() && self.link_ids.is_empty()
    }
}

/// Compute the collapse plan for the given event.
///
/// # Arguments
///
/// * `graph` - the current visible graph
/// * `event_id` - id of the selected event node
/// * `event_uuid` - the selected event's flowfile identity
/// * `child_uuids` - the identities the event declares as children
pub fn plan_collapse(
    graph: &LineageGraph,
    event_id: &str,
    event_uuid: &str,
    child_uuids: &[String],
) -> CollapsePlan {
    let direction = CollapseDirection::detect(event_uuid, child_uuids);

    let mut uuids: BTreeSet<String> = child_uuids.iter().cloned().collect();
    let mut node_ids: BTreeSet<String> = BTreeSet::new();
    let mut link_ids: BTreeSet<String> = BTreeSet::new();

    loop {
        let mut new_uuids = false;

        // Consider each remaining node for removal; a removed node folds the
        // identities on its outgoing links into the working set.
        for node in graph.nodes() {
            if node_ids.contains(&node.id) || !uuids.contains(&node.flow_file_uuid) {
                continue;
            }
            if !node_removable(direction, node, event_id, event_uuid) {
                continue;
            }
            node_ids.insert(node.id.clone());

            for link in graph.outgoing(&node.id) {
                if uuids.insert(link.flow_file_uuid.clone()) {
                    new_uuids = true;
                }
            }
        }

        // Consider each remaining link; a removed link folds its target's
        // identity into the working set.
        for link in graph.links() {
            if link_ids.contains(&link.id) || !uuids.contains(&link.flow_file_uuid) {
                continue;
            }
            if !link_removable(direction, link, event_uuid) {
                continue;
            }
            link_ids.insert(link.id.clone());

            if let Some(target) = graph.node(&link.target_id) {
                if uuids.insert(target.flow_file_uuid.clone()) {
                    new_uuids = true;
                }
            }
        }

        if !new_uuids {
            break;
        }
    }

    CollapsePlan {
        direction,
        node_ids,
        link_ids,
    }
}

/// Whether a node may be removed.
///
/// The selected event itself must survive a fan-in collapse; a fan-out
/// collapse must keep the origin identity's own node and every node that
/// lists the origin among its parents, so the user's selection and its direct
/// flow-of-identity chain never disappear.
fn node_removable(
    direction: CollapseDirection,
    node: &ProvenanceNode,
    event_id: &str,
    event_uuid: &str,
) -> bool {
    match direction {
        CollapseDirection::FanIn => node.id != event_id,
        CollapseDirection::FanOut => {
            node.flow_file_uuid != event_uuid
                && !node.parent_uuids.iter().any(|uuid| uuid == event_uuid)
        }
    }
}

/// Whether a link may be removed once its identity is targeted.
fn link_removable(direction: CollapseDirection, link: &ProvenanceLink, event_uuid: &str) -> bool {
    match direction {
        CollapseDirection::FanIn => true,
        CollapseDirection::FanOut => link.flow_file_uuid != event_uuid,
    }
}
