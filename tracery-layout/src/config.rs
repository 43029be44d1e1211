//! Layout configuration
//!
//! All spacing is in layout units, not device pixels. The fan thresholds are
//! a UX tuning choice rather than a correctness requirement, so they are
//! fields here instead of hard-coded constants.

/// Tunable spacing and fan heuristics for the layout engine.
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// Minimum horizontal gap between two nodes on the same level
    pub node_spacing: f64,

    /// Vertical separation used where fan-in/fan-out needs breathing room
    pub level_gap: f64,

    /// Separation above the root level
    pub root_gap: f64,

    /// Narrow separation is `level_gap / narrow_gap_divisor`
    pub narrow_gap_divisor: f64,

    /// A node with strictly more than this many edges on one side forces the
    /// wide separation for its level
    pub fan_edge_threshold: usize,

    /// Strictly more than this many nodes with two or more edges on one side
    /// forces the wide separation for their level
    pub crowded_node_threshold: usize,

    /// Horizontal center of a level that has no parents
    pub origin_x: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_spacing: 100.0,
            level_gap: 120.0,
            root_gap: 50.0,
            narrow_gap_divisor: 3.0,
            fan_edge_threshold: 3,
            crowded_node_threshold: 2,
            origin_x: 0.0,
        }
    }
}

impl LayoutConfig {
    /// The narrow separation used when a level is not fanning.
    pub fn narrow_gap(&self) -> f64 {
        self.level_gap / self.narrow_gap_divisor
    }
}
