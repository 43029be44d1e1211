//! # Tracery Layout
//!
//! Deterministic level-by-level layout for provenance lineage graphs.
//!
//! Given the current [`LineageGraph`](tracery_core::LineageGraph), the engine
//! assigns every node a 2D position in layout units: roots at the top, each
//! level below its parents by a separation that widens where fan-in or
//! fan-out is heavy. Layout is a pure function of the graph content: two runs
//! over identical content produce identical positions regardless of insertion
//! order, which the rendering boundary relies on for stable
//! enter/update/exit animation.

pub mod config;
pub mod engine;

// Re-export commonly used types
pub use config::LayoutConfig;
pub use engine::{compute_layout, Layout, NodePosition};
