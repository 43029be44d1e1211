//! Incremental lineage graph store
//!
//! The store is the single mutable structure shared by the query client, the
//! collapse engine and the layout engine. All mutation goes through merge and
//! remove operations; adjacency and the event-time range are derived caches
//! rebuilt eagerly after every mutation batch rather than patched in place,
//! so they can never drift from the link set.
//!
//! Nodes and links live in ordered maps keyed by their stable ids. Links
//! store ids, not references, which keeps ownership flat and makes iteration
//! order (and therefore layout) deterministic for any insertion order.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::collapse::CollapsePlan;
use crate::model::{LineageResults, LinkPayload, ProvenanceLink, ProvenanceNode};
use crate::{Error, Result};

/// Minimum and maximum event time over all nodes in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeRange {
    /// Earliest event time in milliseconds
    pub min_millis: i64,

    /// Server-formatted timestamp of the earliest event
    pub min_timestamp: String,

    /// Latest event time in milliseconds
    pub max_millis: i64,
}

/// The set of visible lineage nodes and links.
#[derive(Debug, Default)]
pub struct LineageGraph {
    nodes: BTreeMap<String, ProvenanceNode>,
    links: BTreeMap<String, ProvenanceLink>,

    // Derived caches, rebuilt by `rebuild()` after every mutation batch.
    incoming: HashMap<String, Vec<String>>,
    outgoing: HashMap<String, Vec<String>>,
    time_range: Option<TimeRange>,
}

impl LineageGraph {
    /// Create a new empty lineage graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge nodes into the store.
    ///
    /// Merging is idempotent by id: a node already present is left untouched
    /// and the duplicate payload is silently dropped (first write wins).
    pub fn merge_nodes<I>(&mut self, nodes: I)
    where
        I: IntoIterator<Item = ProvenanceNode>,
    {
        for node in nodes {
            if self.nodes.contains_key(&node.id) {
                debug!(node_id = %node.id, "dropping duplicate node payload");
                continue;
            }
            self.nodes.insert(node.id.clone(), node);
        }
        self.rebuild();
    }

    /// Merge links into the store.
    ///
    /// A link whose source or target id is not present is silently ignored:
    /// partial and out-of-order payload merges are expected. A link whose id
    /// is already present is rejected as a duplicate, not merged.
    pub fn merge_links<I>(&mut self, links: I)
    where
        I: IntoIterator<Item = LinkPayload>,
    {
        for payload in links {
            let link = ProvenanceLink::from(payload);
            if !self.nodes.contains_key(&link.source_id) || !self.nodes.contains_key(&link.target_id)
            {
                debug!(link_id = %link.id, "ignoring link with unknown endpoint");
                continue;
            }
            if self.links.contains_key(&link.id) {
                debug!(link_id = %link.id, "dropping duplicate link payload");
                continue;
            }
            self.links.insert(link.id.clone(), link);
        }
        self.rebuild();
    }

    /// Merge a finished lineage result payload as one batch.
    pub fn merge_results(&mut self, results: &LineageResults) {
        for node in &results.nodes {
            if self.nodes.contains_key(&node.id) {
                debug!(node_id = %node.id, "dropping duplicate node payload");
                continue;
            }
            self.nodes.insert(node.id.clone(), node.clone());
        }
        self.merge_links(results.links.iter().cloned());
    }

    /// Remove a node by id.
    pub fn remove_node(&mut self, id: &str) -> Result<ProvenanceNode> {
        let node = self
            .nodes
            .remove(id)
            .ok_or_else(|| Error::NodeNotFound(id.to_string()))?;
        self.rebuild();
        Ok(node)
    }

    /// Remove a link by id.
    pub fn remove_link(&mut self, id: &str) -> Result<ProvenanceLink> {
        let link = self
            .links
            .remove(id)
            .ok_or_else(|| Error::LinkNotFound(id.to_string()))?;
        self.rebuild();
        Ok(link)
    }

    /// Apply a collapse plan as a single removal batch.
    ///
    /// Ids that are no longer present are skipped; the derived caches are
    /// rebuilt once at the end.
    pub fn apply_removals(&mut self, plan: &CollapsePlan) {
        for id in &plan.node_ids {
            self.nodes.remove(id);
        }
        for id in &plan.link_ids {
            self.links.remove(id);
        }
        self.rebuild();
    }

    /// Drop all nodes and links.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.links.clear();
        self.rebuild();
    }

    /// Iterate all nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &ProvenanceNode> {
        self.nodes.values()
    }

    /// Iterate all links in id order.
    pub fn links(&self) -> impl Iterator<Item = &ProvenanceLink> {
        self.links.values()
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&ProvenanceNode> {
        self.nodes.get(id)
    }

    /// Look up a link by id.
    pub fn link(&self, id: &str) -> Option<&ProvenanceLink> {
        self.links.get(id)
    }

    /// Total number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total number of links
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Links arriving at the given node, in link-id order.
    pub fn incoming(&self, node_id: &str) -> impl Iterator<Item = &ProvenanceLink> {
        self.incoming
            .get(node_id)
            .map(|ids| ids.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.links.get(id))
    }

    /// Links leaving the given node, in link-id order.
    pub fn outgoing(&self, node_id: &str) -> impl Iterator<Item = &ProvenanceLink> {
        self.outgoing
            .get(node_id)
            .map(|ids| ids.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.links.get(id))
    }

    /// Number of links arriving at the given node.
    pub fn incoming_count(&self, node_id: &str) -> usize {
        self.incoming.get(node_id).map(Vec::len).unwrap_or(0)
    }

    /// Number of links leaving the given node.
    pub fn outgoing_count(&self, node_id: &str) -> usize {
        self.outgoing.get(node_id).map(Vec::len).unwrap_or(0)
    }

    /// Ids of all nodes with zero incoming links, in id order.
    pub fn roots(&self) -> Vec<String> {
        self.nodes
            .keys()
            .filter(|id| self.incoming_count(id) == 0)
            .cloned()
            .collect()
    }

    /// Minimum/maximum event time over all nodes, if the graph is non-empty.
    pub fn time_range(&self) -> Option<&TimeRange> {
        self.time_range.as_ref()
    }

    /// Recompute the derived caches from the current node and link sets.
    fn rebuild(&mut self) {
        self.incoming.clear();
        self.outgoing.clear();
        for link in self.links.values() {
            self.outgoing
                .entry(link.source_id.clone())
                .or_default()
                .push(link.id.clone());
            self.incoming
                .entry(link.target_id.clone())
                .or_default()
                .push(link.id.clone());
        }

        self.time_range = None;
        for node in self.nodes.values() {
            match &mut self.time_range {
                None => {
                    self.time_range = Some(TimeRange {
                        min_millis: node.millis,
                        min_timestamp: node.timestamp.clone(),
                        max_millis: node.millis,
                    });
                }
                Some(range) => {
                    if node.millis < range.min_millis {
                        range.min_millis = node.millis;
                        range.min_timestamp = node.timestamp.clone();
                    }
                    if node.millis > range.max_millis {
                        range.max_millis = node.millis;
                    }
                }
            }
        }
    }
}
