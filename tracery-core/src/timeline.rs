//! Event timeline over the visible graph
//!
//! The rendering boundary drives a time slider across the graph's event-time
//! range: dragging it back hides the nodes and links that happened after the
//! cutoff. The slider has a fixed number of ticks between the earliest and
//! latest event.

use crate::graph::LineageGraph;

/// Number of slider ticks between the earliest and latest event.
pub const DEFAULT_TICK_COUNT: u32 = 75;

/// The slider range for the current graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeline {
    /// Earliest event time in milliseconds
    pub min_millis: i64,

    /// Latest event time in milliseconds
    pub max_millis: i64,

    /// Number of ticks across the range
    pub tick_count: u32,
}

impl Timeline {
    /// Build the timeline for the given graph, if it has any nodes.
    pub fn for_graph(graph: &LineageGraph) -> Option<Self> {
        graph.time_range().map(|range| Self {
            min_millis: range.min_millis,
            max_millis: range.max_millis,
            tick_count: DEFAULT_TICK_COUNT,
        })
    }

    /// Milliseconds per slider tick.
    pub fn step(&self) -> f64 {
        (self.max_millis - self.min_millis) as f64 / self.tick_count as f64
    }

    /// Whether an element with the given event time is visible at the cutoff.
    pub fn is_visible(&self, cutoff_millis: i64, millis: i64) -> bool {
        millis <= cutoff_millis
    }

    /// Ids of the nodes visible at the cutoff, in id order.
    pub fn visible_node_ids(&self, graph: &LineageGraph, cutoff_millis: i64) -> Vec<String> {
        graph
            .nodes()
            .filter(|node| self.is_visible(cutoff_millis, node.millis))
            .map(|node| node.id.clone())
            .collect()
    }
}
