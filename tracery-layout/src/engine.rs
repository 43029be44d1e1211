//! Level-by-level layout engine
//!
//! The engine walks the graph top-down from its roots. At each level it
//! defers any frontier node that is also a descendant of another frontier
//! node (which naturally skips levels for long edges), orders the remaining
//! nodes so ancestor/descendant chains stay visually coherent, spreads them
//! around the mean x of their parents, and pushes apart any pair closer than
//! the minimum node spacing.
//!
//! `compute_layout` is a pure function: it returns a fresh position map and
//! threads the current depth, parent order and level separation through the
//! recursion as explicit parameters. Worklists are sorted by id before the
//! ordering heuristics run, so identical graph content yields identical
//! positions for any insertion order.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::debug;

use tracery_core::LineageGraph;

use crate::config::LayoutConfig;

/// Position of a single node, in layout units.
#[derive(Debug, Clone, PartialEq)]
pub struct NodePosition {
    pub x: f64,
    pub y: f64,

    /// Position within the level's final left-to-right order; used as a
    /// tie-break key when ordering the next level.
    pub index: usize,
}

/// The computed layout: one position per node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    positions: BTreeMap<String, NodePosition>,
}

impl Layout {
    /// Position of the given node, if it was laid out.
    pub fn position(&self, node_id: &str) -> Option<&NodePosition> {
        self.positions.get(node_id)
    }

    /// Iterate all positions in node-id order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &NodePosition)> {
        self.positions.iter()
    }

    /// Number of positioned nodes
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether no node was positioned
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Compute positions for every node in the graph.
pub fn compute_layout(graph: &LineageGraph, config: &LayoutConfig) -> Layout {
    let mut positions = BTreeMap::new();
    let roots = graph.roots();
    position_level(
        graph,
        config,
        &mut positions,
        &roots,
        0.0,
        &[],
        config.root_gap,
    );
    debug!(
        nodes = positions.len(),
        roots = roots.len(),
        "Computed lineage layout"
    );
    Layout { positions }
}

/// Immediate (1-hop) children of the given nodes.
fn immediate_children(graph: &LineageGraph, node_ids: &[String]) -> BTreeSet<String> {
    let mut children = BTreeSet::new();
    for id in node_ids {
        for link in graph.outgoing(id) {
            children.insert(link.target_id.clone());
        }
    }
    children
}

/// Full transitive descendant set of the given nodes.
fn descendants(graph: &LineageGraph, node_ids: &[String]) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let mut queue: VecDeque<&str> = node_ids.iter().map(String::as_str).collect();
    while let Some(id) = queue.pop_front() {
        for link in graph.outgoing(id) {
            if found.insert(link.target_id.clone()) {
                queue.push_back(&link.target_id);
            }
        }
    }
    found
}

/// Position one level of the graph and recurse into its children.
///
/// `depth` is the accumulated y of the parent level, `level_gap` the
/// separation chosen for this level by its parent (widened here if this
/// level's fan-in warrants it).
fn position_level(
    graph: &LineageGraph,
    config: &LayoutConfig,
    positions: &mut BTreeMap<String, NodePosition>,
    frontier: &[String],
    depth: f64,
    parents: &[String],
    mut level_gap: f64,
) {
    let children_set = immediate_children(graph, frontier);
    let descendant_set = descendants(graph, frontier);

    // Defer a node to its deepest point: anything that is also a descendant
    // of another frontier node belongs to a later level.
    let mut immediate: Vec<String> = frontier
        .iter()
        .filter(|id| !descendant_set.contains(*id))
        .cloned()
        .collect();
    immediate.sort();
    immediate.dedup();
    if immediate.is_empty() {
        return;
    }

    // The children list used for index lookups below, ordered descending.
    let children: Vec<String> = children_set.iter().rev().cloned().collect();

    // Dense merges need breathing room: widen this level's separation when a
    // node has heavy fan-in or too many nodes have multiple parents.
    let mut crowded = 0;
    for id in &immediate {
        let incoming = graph.incoming_count(id);
        if incoming > config.fan_edge_threshold {
            level_gap = config.level_gap;
        } else if incoming >= 2 {
            crowded += 1;
        }
    }
    if crowded > config.crowded_node_threshold {
        level_gap = config.level_gap;
    }

    // Order the frontier. With a single parent group, children alignment
    // leads; with multiple parent groups, parent alignment leads so fan-in
    // settles under its sources. All ties fall through to node kind, event
    // type and time; the pre-sort by id above makes the stable sort total.
    {
        let placed: &BTreeMap<String, NodePosition> = positions;
        let child_key = |id: &str| -> Option<usize> {
            graph
                .outgoing(id)
                .next()
                .and_then(|link| children.iter().position(|c| *c == link.target_id))
        };
        let parent_key = |id: &str| -> Option<usize> {
            graph
                .incoming(id)
                .next()
                .and_then(|link| placed.get(&link.source_id))
                .map(|p| p.index)
        };
        let by_child = |one: &str, two: &str| match (child_key(one), child_key(two)) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => Ordering::Equal,
        };
        let by_parent = |one: &str, two: &str| match (parent_key(one), parent_key(two)) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => Ordering::Equal,
        };
        let tail = |one: &str, two: &str| match (graph.node(one), graph.node(two)) {
            (Some(a), Some(b)) => a
                .kind
                .cmp(&b.kind)
                .then(a.event_type.cmp(&b.event_type))
                .then(a.millis.cmp(&b.millis)),
            _ => Ordering::Equal,
        };

        if parents.len() == 1 {
            immediate.sort_by(|one, two| {
                by_child(one, two)
                    .then_with(|| by_parent(one, two))
                    .then_with(|| tail(one, two))
            });
        } else if parents.len() > 1 {
            immediate.sort_by(|one, two| {
                by_parent(one, two)
                    .then_with(|| by_child(one, two))
                    .then_with(|| tail(one, two))
            });
        }
    }

    // Place the level: evenly spaced around the mean x of its parents, with
    // two exceptions when the level is no wider than its parents. A
    // one-parent-one-child node sits directly under its parent (straight
    // chains stay vertical), and a multi-parent node sits at the mean x of
    // the parents in the adjacent level band.
    let origin_x = if parents.is_empty() {
        config.origin_x
    } else {
        let sum: f64 = parents
            .iter()
            .filter_map(|id| positions.get(id))
            .map(|p| p.x)
            .sum();
        sum / parents.len() as f64
    };
    let y = depth + level_gap;
    let level_width = (immediate.len() - 1) as f64 * config.node_spacing;

    for (i, id) in immediate.iter().enumerate() {
        let mut x = i as f64 * config.node_spacing + origin_x - level_width / 2.0;

        if immediate.len() <= parents.len() {
            let incoming: Vec<_> = graph.incoming(id).collect();
            if incoming.len() == 1 {
                let source_id = incoming[0].source_id.as_str();
                if graph.outgoing_count(source_id) == 1 {
                    if let Some(parent) = positions.get(source_id) {
                        x = parent.x;
                    }
                }
            } else if incoming.len() > 1 {
                let band: Vec<f64> = incoming
                    .iter()
                    .filter_map(|link| positions.get(&link.source_id))
                    .filter(|p| y - p.y <= config.level_gap)
                    .map(|p| p.x)
                    .collect();
                if !band.is_empty() {
                    x = band.iter().sum::<f64>() / band.len() as f64;
                }
            }
        }

        positions.insert(id.clone(), NodePosition { x, y, index: 0 });
    }

    // Push apart overlapping neighbors, left to right. Only x matters: every
    // node on this level shares the same y.
    let mut by_x = immediate.clone();
    by_x.sort_by(|one, two| {
        let a = positions.get(one).map_or(0.0, |p| p.x);
        let b = positions.get(two).map_or(0.0, |p| p.x);
        a.partial_cmp(&b).unwrap_or(Ordering::Equal)
    });
    for i in 1..by_x.len() {
        let first_x = match positions.get(&by_x[i - 1]) {
            Some(p) => p.x,
            None => continue,
        };
        let difference = match positions.get(&by_x[i]) {
            Some(p) => p.x - first_x,
            None => continue,
        };
        if difference < config.node_spacing {
            if let Some(p) = positions.get_mut(&by_x[i]) {
                p.x += config.node_spacing - difference;
            }
        }
    }

    // Record each node's final left-to-right index; the next level's
    // ordering keys read it through the position map.
    let mut ordered = immediate;
    ordered.sort_by(|one, two| {
        let a = positions.get(one).map_or(0.0, |p| p.x);
        let b = positions.get(two).map_or(0.0, |p| p.x);
        a.partial_cmp(&b).unwrap_or(Ordering::Equal)
    });
    for (i, id) in ordered.iter().enumerate() {
        if let Some(p) = positions.get_mut(id) {
            p.index = i;
        }
    }

    if children.is_empty() {
        return;
    }

    // Pick the next level's separation from this level's fan-out, the mirror
    // of the fan-in widening above.
    let mut child_gap = config.narrow_gap();
    let mut crowded = 0;
    for id in &ordered {
        let outgoing = graph.outgoing_count(id);
        if outgoing > config.fan_edge_threshold {
            child_gap = config.level_gap;
        } else if outgoing >= 2 {
            crowded += 1;
        }
    }
    if crowded > config.crowded_node_threshold {
        child_gap = config.level_gap;
    }

    let next_frontier: Vec<String> = children_set.into_iter().collect();
    position_level(graph, config, positions, &next_frontier, y, &ordered, child_gap);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracery_core::{LinkPayload, NodeKind, ProvenanceNode};

    fn node(id: &str, kind: NodeKind, uuid: &str, millis: i64) -> ProvenanceNode {
        ProvenanceNode {
            id: id.to_string(),
            kind,
            event_type: None,
            flow_file_uuid: uuid.to_string(),
            parent_uuids: Vec::new(),
            child_uuids: Vec::new(),
            timestamp: String::new(),
            millis,
        }
    }

    fn link(source: &str, target: &str, uuid: &str, millis: i64) -> LinkPayload {
        LinkPayload {
            source_id: source.to_string(),
            target_id: target.to_string(),
            flow_file_uuid: uuid.to_string(),
            millis,
        }
    }

    /// Every pair of nodes sharing a y must be at least `node_spacing` apart.
    fn assert_no_overlap(layout: &Layout, config: &LayoutConfig) {
        let all: Vec<_> = layout.iter().collect();
        for (i, (id_a, a)) in all.iter().enumerate() {
            for (id_b, b) in all.iter().skip(i + 1) {
                if a.y == b.y {
                    assert!(
                        (a.x - b.x).abs() >= config.node_spacing - 1e-9,
                        "{} and {} overlap: x {} vs {}",
                        id_a,
                        id_b,
                        a.x,
                        b.x
                    );
                }
            }
        }
    }

    #[test]
    fn test_empty_graph_produces_empty_layout() {
        let graph = LineageGraph::new();
        let layout = compute_layout(&graph, &LayoutConfig::default());
        assert!(layout.is_empty());
    }

    #[test]
    fn test_straight_chain_stays_vertical() {
        let mut graph = LineageGraph::new();
        graph.merge_nodes(vec![
            node("a", NodeKind::Event, "u", 100),
            node("b", NodeKind::FlowFile, "u", 200),
            node("c", NodeKind::Event, "u", 300),
        ]);
        graph.merge_links(vec![link("a", "b", "u", 200), link("b", "c", "u", 300)]);

        let config = LayoutConfig::default();
        let layout = compute_layout(&graph, &config);

        let a = layout.position("a").unwrap();
        let b = layout.position("b").unwrap();
        let c = layout.position("c").unwrap();

        // Roots sit at the root gap; each narrow level adds level_gap / 3.
        assert_eq!(a.y, 50.0);
        assert_eq!(b.y, 90.0);
        assert_eq!(c.y, 130.0);

        // One-parent-one-child nodes inherit their parent's x.
        assert_eq!(a.x, b.x);
        assert_eq!(b.x, c.x);
    }

    #[test]
    fn test_fan_out_widens_the_next_level() {
        let mut graph = LineageGraph::new();
        graph.merge_nodes(vec![node("r", NodeKind::Event, "p", 100)]);
        let children: Vec<ProvenanceNode> = (0..5)
            .map(|i| node(&format!("c{}", i), NodeKind::Event, &format!("u{}", i), 200 + i))
            .collect();
        graph.merge_nodes(children);
        graph.merge_links(
            (0..5)
                .map(|i| link("r", &format!("c{}", i), &format!("u{}", i), 200 + i))
                .collect::<Vec<_>>(),
        );

        let config = LayoutConfig::default();
        let layout = compute_layout(&graph, &config);

        let root_y = layout.position("r").unwrap().y;
        let child_y = layout.position("c0").unwrap().y;
        // 5 outgoing edges exceed the fan threshold: wide gap, not narrow.
        assert_eq!(child_y - root_y, config.level_gap);

        assert_no_overlap(&layout, &config);
    }

    #[test]
    fn test_heavy_fan_in_widens_the_merge_level() {
        let mut graph = LineageGraph::new();
        let parents: Vec<ProvenanceNode> = (0..5)
            .map(|i| node(&format!("p{}", i), NodeKind::Event, &format!("u{}", i), 100 + i))
            .collect();
        graph.merge_nodes(parents);
        graph.merge_nodes(vec![node("m", NodeKind::Event, "m", 500)]);
        graph.merge_links(
            (0..5)
                .map(|i| link(&format!("p{}", i), "m", &format!("u{}", i), 500))
                .collect::<Vec<_>>(),
        );

        let config = LayoutConfig::default();
        let layout = compute_layout(&graph, &config);

        let parent_y = layout.position("p0").unwrap().y;
        let merge = layout.position("m").unwrap();
        // The merge node has 5 incoming edges: the gap to its level is the
        // wide default, not the narrow one.
        assert_eq!(merge.y - parent_y, config.level_gap);

        // It also centers on the mean x of its in-band parents.
        let mean_x: f64 = (0..5)
            .map(|i| layout.position(&format!("p{}", i)).unwrap().x)
            .sum::<f64>()
            / 5.0;
        assert_eq!(merge.x, mean_x);
    }

    #[test]
    fn test_long_edge_defers_node_to_deepest_level() {
        // a -> b -> c plus a long edge a -> c: c must land below b, not
        // beside it.
        let mut graph = LineageGraph::new();
        graph.merge_nodes(vec![
            node("a", NodeKind::Event, "u", 100),
            node("b", NodeKind::Event, "u", 200),
            node("c", NodeKind::Event, "u", 300),
        ]);
        graph.merge_links(vec![
            link("a", "b", "u", 200),
            link("b", "c", "u", 300),
            link("a", "c", "u", 300),
        ]);

        let config = LayoutConfig::default();
        let layout = compute_layout(&graph, &config);

        let a = layout.position("a").unwrap();
        let b = layout.position("b").unwrap();
        let c = layout.position("c").unwrap();
        assert!(b.y > a.y);
        assert!(c.y > b.y);
    }

    #[test]
    fn test_layout_is_deterministic_across_insertion_orders() {
        let nodes = vec![
            node("a", NodeKind::Event, "u", 100),
            node("b", NodeKind::FlowFile, "u", 200),
            node("c", NodeKind::Event, "v", 250),
            node("d", NodeKind::Event, "u", 300),
            node("e", NodeKind::Event, "v", 350),
        ];
        let links = vec![
            link("a", "b", "u", 200),
            link("a", "c", "v", 250),
            link("b", "d", "u", 300),
            link("c", "e", "v", 350),
        ];

        let mut forward = LineageGraph::new();
        forward.merge_nodes(nodes.clone());
        forward.merge_links(links.clone());

        let mut reversed = LineageGraph::new();
        reversed.merge_nodes(nodes.into_iter().rev().collect::<Vec<_>>());
        reversed.merge_links(links.into_iter().rev().collect::<Vec<_>>());

        let config = LayoutConfig::default();
        let one = compute_layout(&forward, &config);
        let two = compute_layout(&reversed, &config);
        assert_eq!(one, two);
    }

    #[test]
    fn test_overlapping_branches_get_pushed_apart() {
        // Two roots whose children would collide around the same origin.
        let mut graph = LineageGraph::new();
        graph.merge_nodes(vec![
            node("r1", NodeKind::Event, "a", 100),
            node("r2", NodeKind::Event, "b", 100),
            node("x", NodeKind::Event, "a", 200),
            node("y", NodeKind::Event, "b", 200),
            node("z", NodeKind::Event, "b", 210),
        ]);
        graph.merge_links(vec![
            link("r1", "x", "a", 200),
            link("r2", "y", "b", 200),
            link("r2", "z", "b", 210),
        ]);

        let config = LayoutConfig::default();
        let layout = compute_layout(&graph, &config);
        assert_no_overlap(&layout, &config);
        assert_eq!(layout.len(), 5);
    }

    #[test]
    fn test_indices_follow_final_x_order() {
        let mut graph = LineageGraph::new();
        graph.merge_nodes(vec![
            node("r", NodeKind::Event, "p", 100),
            node("a", NodeKind::Event, "u1", 200),
            node("b", NodeKind::Event, "u2", 300),
        ]);
        graph.merge_links(vec![link("r", "a", "u1", 200), link("r", "b", "u2", 300)]);

        let layout = compute_layout(&graph, &LayoutConfig::default());
        let a = layout.position("a").unwrap();
        let b = layout.position("b").unwrap();
        if a.x < b.x {
            assert!(a.index < b.index);
        } else {
            assert!(b.index < a.index);
        }
    }
}
